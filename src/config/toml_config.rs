use crate::config::{Settings, MANIFEST_FORMATS, MAX_LINE_WIDTH};
use crate::core::encoding::Encoding;
use crate::core::template::Template;
use crate::utils::error::{Img2BaseError, Result};
use crate::utils::validation::{self, Validate};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    pub input: InputConfig,
    pub encoding: EncodingConfig,
    pub output: OutputConfig,
    pub performance: PerformanceConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct InputConfig {
    pub paths: Vec<String>,
    pub strict_format: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EncodingConfig {
    pub alphabet: Option<Encoding>,
    pub line_width: Option<usize>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub template: Option<Template>,
    pub path: Option<String>,
    pub manifest: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PerformanceConfig {
    pub concurrency: Option<usize>,
    pub request_timeout: Option<u64>,
}

impl TomlConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(Img2BaseError::IoError)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content);

        toml::from_str(&processed_content).map_err(|e| Img2BaseError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 替換環境變數 (例如 ${ASSET_DIR})，未定義的變數保持原樣
    fn substitute_env_vars(content: &str) -> String {
        let re = Regex::new(r"\$\{([^}]+)\}").expect("static regex");

        re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        })
        .into_owned()
    }

    pub fn to_settings(&self) -> Settings {
        Settings::from_toml(self)
    }
}

impl Validate for TomlConfig {
    fn validate(&self) -> Result<()> {
        if let Some(path) = &self.output.path {
            validation::validate_path("output.path", path)?;
        }
        if let Some(width) = self.encoding.line_width {
            validation::validate_range("encoding.line_width", width, 0, MAX_LINE_WIDTH)?;
        }
        if let Some(concurrency) = self.performance.concurrency {
            validation::validate_positive_number("performance.concurrency", concurrency, 1)?;
        }
        if let Some(manifest) = &self.output.manifest {
            validation::validate_one_of("output.manifest", manifest, &MANIFEST_FORMATS)?;
        }
        if let Some(template) = &self.output.template {
            template.validate()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config = TomlConfig::from_toml_str("").unwrap();
        let settings = config.to_settings();
        assert!(settings.inputs.is_empty());
        assert_eq!(settings.template, Template::Markdown);
        assert_eq!(settings.encoding, Encoding::Standard);
    }

    #[test]
    fn test_full_config() {
        let toml_content = r#"
[input]
paths = ["assets/logo.png", "https://example.com/banner.jpg"]
strict_format = true

[encoding]
alphabet = "url-safe-no-pad"
line_width = 76

[output]
template = "<img alt=\"{stem}\" src=\"{uri}\">"
path = "./encoded"
manifest = "json"

[performance]
concurrency = 8
request_timeout = 15
"#;

        let config = TomlConfig::from_toml_str(toml_content).unwrap();
        assert!(config.validate().is_ok());

        let settings = config.to_settings();
        assert_eq!(settings.inputs.len(), 2);
        assert!(settings.strict_format);
        assert_eq!(settings.encoding, Encoding::UrlSafeNoPad);
        assert_eq!(
            settings.template,
            Template::Custom("<img alt=\"{stem}\" src=\"{uri}\">".to_string())
        );
        assert_eq!(settings.concurrency, 8);
        assert_eq!(settings.request_timeout, Some(15));
        assert_eq!(settings.manifest_format.as_deref(), Some("json"));
    }

    #[test]
    fn test_env_var_substitution() {
        std::env::set_var("IMG2BASE_TEST_ASSET_DIR", "/srv/assets");

        let toml_content = r#"
[input]
paths = ["${IMG2BASE_TEST_ASSET_DIR}/logo.png", "${IMG2BASE_TEST_UNDEFINED}/x.png"]
"#;

        let config = TomlConfig::from_toml_str(toml_content).unwrap();
        assert_eq!(config.input.paths[0], "/srv/assets/logo.png");
        assert_eq!(config.input.paths[1], "${IMG2BASE_TEST_UNDEFINED}/x.png");

        std::env::remove_var("IMG2BASE_TEST_ASSET_DIR");
    }

    #[test]
    fn test_config_validation() {
        let config = TomlConfig::from_toml_str(
            r#"
[performance]
concurrency = 0
"#,
        )
        .unwrap();
        assert!(config.validate().is_err());

        assert!(TomlConfig::from_toml_str("[encoding]\nalphabet = \"base32\"").is_err());
    }

    #[test]
    fn test_config_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file
            .write_all(b"[output]\ntemplate = \"css\"\n")
            .unwrap();

        let config = TomlConfig::from_file(temp_file.path()).unwrap();
        assert_eq!(config.output.template, Some(Template::Css));
    }
}

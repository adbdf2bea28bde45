pub mod cli;
pub mod toml_config;

use crate::core::encoding::Encoding;
use crate::core::source::parse_input;
use crate::core::template::Template;
use crate::core::ConfigProvider;
use crate::domain::model::ImageSource;
use crate::utils::error::Result;
use crate::utils::validation::{self, Validate};
use serde::{Deserialize, Serialize};
use toml_config::TomlConfig;

#[cfg(feature = "cli")]
use clap::Parser;

pub const DEFAULT_CONCURRENCY: usize = 4;
pub const MAX_LINE_WIDTH: usize = 4096;
pub const MANIFEST_FORMATS: [&str; 3] = ["csv", "tsv", "json"];

#[cfg(feature = "cli")]
#[derive(Debug, Clone, Default, Parser)]
#[command(name = "img2base")]
#[command(about = "Convert images into embeddable base64 text")]
#[command(version)]
pub struct CliConfig {
    /// Image files, directories, zip archives (`a.zip` or `a.zip!entry`), URLs, or `-` for stdin
    pub inputs: Vec<String>,

    /// Write one `<name>.txt` per image into this directory instead of printing
    #[arg(short, long)]
    pub output: Option<String>,

    /// Base64 alphabet: standard, standard-no-pad, url-safe, url-safe-no-pad
    #[arg(short, long)]
    pub encoding: Option<Encoding>,

    /// raw, data-uri, markdown, html, css, json, or a custom pattern such as '{name}: {uri}'
    #[arg(short, long)]
    pub template: Option<Template>,

    /// Wrap the encoded payload every N characters (0 disables, 76 is MIME style)
    #[arg(short, long)]
    pub wrap: Option<usize>,

    /// Number of images encoded in parallel
    #[arg(short = 'j', long)]
    pub concurrency: Option<usize>,

    /// Reject files whose content does not match a known image signature
    #[arg(long)]
    pub strict: bool,

    /// Also write a manifest (csv, tsv or json) into the output directory
    #[arg(long)]
    pub manifest: Option<String>,

    /// Path to a TOML configuration file
    #[arg(short, long)]
    pub config: Option<String>,

    #[arg(short, long, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, help = "Emit logs as JSON")]
    pub json_logs: bool,
}

/// Effective settings after merging the TOML file and command line flags.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    pub inputs: Vec<String>,
    pub output_path: Option<String>,
    pub encoding: Encoding,
    pub template: Template,
    pub line_width: usize,
    pub concurrency: usize,
    pub strict_format: bool,
    pub manifest_format: Option<String>,
    pub request_timeout: Option<u64>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            inputs: Vec::new(),
            output_path: None,
            encoding: Encoding::default(),
            template: Template::default(),
            line_width: 0,
            concurrency: DEFAULT_CONCURRENCY,
            strict_format: false,
            manifest_format: None,
            request_timeout: None,
        }
    }
}

impl Settings {
    pub fn with_inputs<I, T>(inputs: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        Self {
            inputs: inputs.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    pub fn from_toml(config: &TomlConfig) -> Self {
        let defaults = Self::default();
        Self {
            inputs: config.input.paths.clone(),
            output_path: config.output.path.clone(),
            encoding: config.encoding.alphabet.unwrap_or(defaults.encoding),
            template: config.output.template.clone().unwrap_or(defaults.template),
            line_width: config.encoding.line_width.unwrap_or(defaults.line_width),
            concurrency: config.performance.concurrency.unwrap_or(defaults.concurrency),
            strict_format: config.input.strict_format.unwrap_or(defaults.strict_format),
            manifest_format: config.output.manifest.clone(),
            request_timeout: config.performance.request_timeout,
        }
    }

    /// Loads the TOML file named by `--config` (if any) and applies flags on top.
    #[cfg(feature = "cli")]
    pub fn resolve(cli: &CliConfig) -> Result<Self> {
        let mut settings = match &cli.config {
            Some(path) => {
                tracing::info!("📁 Loading configuration from: {}", path);
                let file = TomlConfig::from_file(path)?;
                file.validate()?;
                Self::from_toml(&file)
            }
            None => Self::default(),
        };

        // 命令列參數優先於設定檔
        if !cli.inputs.is_empty() {
            settings.inputs = cli.inputs.clone();
        }
        if let Some(output) = &cli.output {
            settings.output_path = Some(output.clone());
        }
        if let Some(encoding) = cli.encoding {
            settings.encoding = encoding;
        }
        if let Some(template) = &cli.template {
            settings.template = template.clone();
        }
        if let Some(wrap) = cli.wrap {
            settings.line_width = wrap;
        }
        if let Some(concurrency) = cli.concurrency {
            settings.concurrency = concurrency;
        }
        if cli.strict {
            settings.strict_format = true;
        }
        if let Some(manifest) = &cli.manifest {
            settings.manifest_format = Some(manifest.to_ascii_lowercase());
        }

        Ok(settings)
    }
}

impl Validate for Settings {
    fn validate(&self) -> Result<()> {
        validation::validate_non_empty_list("file list", &self.inputs)?;

        for input in &self.inputs {
            match parse_input(input) {
                ImageSource::Url(url) => validation::validate_url("inputs", &url)?,
                ImageSource::File(path) => validation::validate_path("inputs", &path.to_string_lossy())?,
                _ => {}
            }
        }

        if let Some(output) = &self.output_path {
            validation::validate_path("output_path", output)?;
        }
        validation::validate_positive_number("concurrency", self.concurrency, 1)?;
        validation::validate_range("line_width", self.line_width, 0, MAX_LINE_WIDTH)?;
        self.template.validate()?;

        if let Some(manifest) = &self.manifest_format {
            validation::validate_one_of("manifest_format", manifest, &MANIFEST_FORMATS)?;
            validation::validate_required_field("output_path", &self.output_path)?;
        }

        Ok(())
    }
}

impl ConfigProvider for Settings {
    fn inputs(&self) -> &[String] {
        &self.inputs
    }

    fn output_path(&self) -> Option<&str> {
        self.output_path.as_deref()
    }

    fn encoding(&self) -> Encoding {
        self.encoding
    }

    fn template(&self) -> &Template {
        &self.template
    }

    fn line_width(&self) -> usize {
        self.line_width
    }

    fn concurrency(&self) -> usize {
        self.concurrency
    }

    fn strict_format(&self) -> bool {
        self.strict_format
    }

    fn manifest_format(&self) -> Option<&str> {
        self.manifest_format.as_deref()
    }

    fn request_timeout(&self) -> Option<u64> {
        self.request_timeout
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::error::Img2BaseError;

    #[test]
    fn test_empty_inputs_rejected() {
        let err = Settings::default().validate().unwrap_err();
        assert!(matches!(err, Img2BaseError::EmptyInput { .. }));
    }

    #[test]
    fn test_manifest_requires_output_directory() {
        let mut settings = Settings::with_inputs(["logo.png"]);
        settings.manifest_format = Some("csv".to_string());
        assert!(matches!(
            settings.validate(),
            Err(Img2BaseError::MissingConfigError { .. })
        ));

        settings.output_path = Some("out".to_string());
        assert!(settings.validate().is_ok());

        settings.manifest_format = Some("xml".to_string());
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_invalid_values_rejected() {
        let mut settings = Settings::with_inputs(["logo.png"]);
        settings.concurrency = 0;
        assert!(settings.validate().is_err());

        let mut settings = Settings::with_inputs(["logo.png"]);
        settings.template = Template::Custom("{nope}".to_string());
        assert!(matches!(settings.validate(), Err(Img2BaseError::TemplateError { .. })));
    }

    #[cfg(feature = "cli")]
    #[test]
    fn test_cli_flags_override_file() {
        use std::io::Write;
        use tempfile::NamedTempFile;

        let mut file = NamedTempFile::new().unwrap();
        file.write_all(
            br#"
[input]
paths = ["from-file.png"]

[encoding]
alphabet = "url-safe"
line_width = 76

[output]
template = "css"
"#,
        )
        .unwrap();

        let cli = CliConfig::parse_from([
            "img2base",
            "--config",
            file.path().to_str().unwrap(),
            "--template",
            "html",
            "cli.png",
        ]);
        let settings = Settings::resolve(&cli).unwrap();

        assert_eq!(settings.inputs, vec!["cli.png".to_string()]);
        assert_eq!(settings.template, Template::Html);
        assert_eq!(settings.encoding, Encoding::UrlSafe);
        assert_eq!(settings.line_width, 76);
        assert_eq!(settings.concurrency, DEFAULT_CONCURRENCY);
    }

    #[cfg(feature = "cli")]
    #[test]
    fn test_invalid_config_file_rejected() {
        use std::io::Write;
        use tempfile::NamedTempFile;

        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"[performance]\nconcurrency = 0\n").unwrap();

        let cli = CliConfig::parse_from([
            "img2base",
            "--config",
            file.path().to_str().unwrap(),
            "--concurrency",
            "2",
            "logo.png",
        ]);
        let err = Settings::resolve(&cli).unwrap_err();
        assert!(matches!(err, Img2BaseError::InvalidConfigValueError { ref field, .. } if field == "performance.concurrency"));
    }
}

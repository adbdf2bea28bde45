//! Output templates that wrap an encoded payload for embedding.
//!
//! Custom templates support these placeholders:
//!
//! | placeholder | value                                  |
//! |-------------|----------------------------------------|
//! | `{name}`    | source file name, e.g. `logo.png`      |
//! | `{stem}`    | file name without extension            |
//! | `{mime}`    | MIME type, e.g. `image/png`            |
//! | `{data}`    | encoded payload                        |
//! | `{uri}`     | `data:{mime};base64,{data}`            |
//! | `{size}`    | original size in bytes                 |
//!
//! `{{` and `}}` produce literal braces.

use crate::domain::model::file_stem;
use crate::utils::error::{Img2BaseError, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

const PLACEHOLDERS: [&str; 6] = ["name", "stem", "mime", "data", "uri", "size"];

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Template {
    Raw,
    DataUri,
    #[default]
    Markdown,
    Html,
    Css,
    Json,
    Custom(String),
}

#[derive(Debug, Clone)]
pub struct TemplateContext<'a> {
    pub name: &'a str,
    pub mime: &'a str,
    pub data: &'a str,
    pub size: usize,
}

impl TemplateContext<'_> {
    pub fn data_uri(&self) -> String {
        format!("data:{};base64,{}", self.mime, self.data)
    }

    fn stem(&self) -> &str {
        file_stem(self.name)
    }
}

impl Template {
    pub const BUILTIN: [&'static str; 6] = ["raw", "data-uri", "markdown", "html", "css", "json"];

    /// Checks a custom template once, before any image is rendered.
    pub fn validate(&self) -> Result<()> {
        if let Template::Custom(pattern) = self {
            let sample = TemplateContext {
                name: "",
                mime: "",
                data: "",
                size: 0,
            };
            render_custom(pattern, &sample)?;
        }
        Ok(())
    }

    pub fn render(&self, ctx: &TemplateContext<'_>) -> Result<String> {
        let rendered = match self {
            Template::Raw => ctx.data.to_string(),
            Template::DataUri => ctx.data_uri(),
            Template::Markdown => format!("![{}]({})", ctx.stem(), ctx.data_uri()),
            Template::Html => format!(
                "<img src=\"{}\" alt=\"{}\">",
                ctx.data_uri(),
                escape_html(ctx.stem())
            ),
            Template::Css => format!("background-image: url(\"{}\");", ctx.data_uri()),
            Template::Json => serde_json::json!({
                "name": ctx.name,
                "mime": ctx.mime,
                "data": ctx.data,
            })
            .to_string(),
            Template::Custom(pattern) => render_custom(pattern, ctx)?,
        };
        Ok(rendered)
    }
}

fn token_regex() -> &'static Regex {
    static TOKEN: OnceLock<Regex> = OnceLock::new();
    TOKEN.get_or_init(|| Regex::new(r"\{\{|\}\}|\{([^{}]*)\}").expect("static regex"))
}

fn render_custom(pattern: &str, ctx: &TemplateContext<'_>) -> Result<String> {
    let mut out = String::with_capacity(pattern.len() + ctx.data.len() * 2);
    let mut last = 0;

    for caps in token_regex().captures_iter(pattern) {
        let whole = caps.get(0).expect("group 0 always matches");
        push_literal(&mut out, &pattern[last..whole.start()])?;
        last = whole.end();

        match (whole.as_str(), caps.get(1)) {
            ("{{", _) => out.push('{'),
            ("}}", _) => out.push('}'),
            (_, Some(name)) => match name.as_str().trim() {
                "name" => out.push_str(ctx.name),
                "stem" => out.push_str(ctx.stem()),
                "mime" => out.push_str(ctx.mime),
                "data" => out.push_str(ctx.data),
                "uri" => out.push_str(&ctx.data_uri()),
                "size" => out.push_str(&ctx.size.to_string()),
                other => {
                    return Err(Img2BaseError::template(format!(
                        "unknown placeholder '{{{}}}', expected one of: {}",
                        other,
                        PLACEHOLDERS.join(", ")
                    )))
                }
            },
            _ => unreachable!("regex only matches escapes or placeholders"),
        }
    }
    push_literal(&mut out, &pattern[last..])?;
    Ok(out)
}

fn push_literal(out: &mut String, literal: &str) -> Result<()> {
    if literal.contains(['{', '}']) {
        return Err(Img2BaseError::template(format!(
            "unbalanced brace in '{}'",
            literal
        )));
    }
    out.push_str(literal);
    Ok(())
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

impl fmt::Display for Template {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Template::Raw => f.write_str("raw"),
            Template::DataUri => f.write_str("data-uri"),
            Template::Markdown => f.write_str("markdown"),
            Template::Html => f.write_str("html"),
            Template::Css => f.write_str("css"),
            Template::Json => f.write_str("json"),
            Template::Custom(pattern) => f.write_str(pattern),
        }
    }
}

impl FromStr for Template {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        if s.contains('{') {
            return Ok(Template::Custom(s.to_string()));
        }
        match s.trim().to_ascii_lowercase().as_str() {
            "raw" => Ok(Template::Raw),
            "data-uri" | "datauri" | "uri" => Ok(Template::DataUri),
            "markdown" | "md" => Ok(Template::Markdown),
            "html" | "img" => Ok(Template::Html),
            "css" => Ok(Template::Css),
            "json" => Ok(Template::Json),
            other => Err(format!(
                "unknown template '{}', expected one of {} or a custom pattern containing placeholders",
                other,
                Self::BUILTIN.join(", ")
            )),
        }
    }
}

impl TryFrom<String> for Template {
    type Error = String;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Template> for String {
    fn from(template: Template) -> Self {
        template.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> TemplateContext<'static> {
        TemplateContext {
            name: "logo.png",
            mime: "image/png",
            data: "iVBORw0K",
            size: 6,
        }
    }

    #[test]
    fn test_builtin_templates() {
        let c = ctx();
        assert_eq!(Template::Raw.render(&c).unwrap(), "iVBORw0K");
        assert_eq!(Template::DataUri.render(&c).unwrap(), "data:image/png;base64,iVBORw0K");
        assert_eq!(
            Template::Markdown.render(&c).unwrap(),
            "![logo](data:image/png;base64,iVBORw0K)"
        );
        assert_eq!(
            Template::Html.render(&c).unwrap(),
            "<img src=\"data:image/png;base64,iVBORw0K\" alt=\"logo\">"
        );
        assert_eq!(
            Template::Css.render(&c).unwrap(),
            "background-image: url(\"data:image/png;base64,iVBORw0K\");"
        );
    }

    #[test]
    fn test_json_template_is_valid_json() {
        let rendered = Template::Json.render(&ctx()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&rendered).unwrap();
        assert_eq!(value["mime"], "image/png");
        assert_eq!(value["data"], "iVBORw0K");
    }

    #[test]
    fn test_markdown_with_empty_name_matches_legacy_output() {
        let c = TemplateContext { name: "", ..ctx() };
        assert_eq!(
            Template::Markdown.render(&c).unwrap(),
            "![](data:image/png;base64,iVBORw0K)"
        );
    }

    #[test]
    fn test_html_alt_is_escaped() {
        let c = TemplateContext {
            name: "\"><script>.png",
            ..ctx()
        };
        let rendered = Template::Html.render(&c).unwrap();
        assert!(rendered.ends_with("alt=\"&quot;&gt;&lt;script&gt;\">"));
    }

    #[test]
    fn test_custom_template() {
        let t: Template = ".icon-{stem} {{ background: url({uri}); }} /* {size} bytes */"
            .parse()
            .unwrap();
        assert_eq!(
            t.render(&ctx()).unwrap(),
            ".icon-logo { background: url(data:image/png;base64,iVBORw0K); } /* 6 bytes */"
        );
    }

    #[test]
    fn test_escaped_braces_next_to_placeholders() {
        let c = ctx();
        let render = |pattern: &str| Template::Custom(pattern.to_string()).render(&c).unwrap();

        assert_eq!(render("a {{{uri}}}"), "a {data:image/png;base64,iVBORw0K}");
        assert_eq!(render("{{uri}}"), "{uri}");
        assert_eq!(render("{{{{name}}}}"), "{{name}}");
        assert_eq!(
            render(r#"{{"src": "{uri}", "alt": "{stem}"}}"#),
            r#"{"src": "data:image/png;base64,iVBORw0K", "alt": "logo"}"#
        );
        assert_eq!(
            render(".i{{background:url({uri})}}"),
            ".i{background:url(data:image/png;base64,iVBORw0K)}"
        );
    }

    #[test]
    fn test_custom_template_errors() {
        let unknown = Template::Custom("{path}".to_string());
        assert!(matches!(unknown.validate(), Err(Img2BaseError::TemplateError { .. })));

        let unbalanced = Template::Custom("{data".to_string());
        assert!(unbalanced.validate().is_err());

        let stray = Template::Custom("data} {data}".to_string());
        assert!(stray.validate().is_err());
    }

    #[test]
    fn test_parse_template_names() {
        assert_eq!("MD".parse::<Template>(), Ok(Template::Markdown));
        assert_eq!("data-uri".parse::<Template>(), Ok(Template::DataUri));
        assert!("yaml".parse::<Template>().is_err());
        assert_eq!(Template::default(), Template::Markdown);
    }
}

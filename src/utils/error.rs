use thiserror::Error;

#[derive(Error, Debug)]
pub enum Img2BaseError {
    #[error("Zip operation failed: {0}")]
    ZipError(#[from] zip::result::ZipError),

    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("CSV processing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Configuration validation failed for '{field}': {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Invalid value '{value}' for '{field}': {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required configuration: {field}")]
    MissingConfigError { field: String },

    #[error("Unsupported image format for '{source_name}': {reason}")]
    UnsupportedFormat { source_name: String, reason: String },

    #[error("Empty input: {message}")]
    EmptyInput { message: String },

    #[error("Not found: {what}")]
    NotFound { what: String },

    #[error("HTTP {status} while fetching {url}")]
    HttpStatus { url: String, status: u16 },

    #[error("Template error: {message}")]
    TemplateError { message: String },

    #[error("Processing error: {message}")]
    ProcessingError { message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Input,
    Network,
    Format,
    Configuration,
    Output,
    Internal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl Img2BaseError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::IoError(_) | Self::EmptyInput { .. } | Self::NotFound { .. } | Self::ZipError(_) => {
                ErrorCategory::Input
            }
            Self::HttpError(_) | Self::HttpStatus { .. } => ErrorCategory::Network,
            Self::UnsupportedFormat { .. } => ErrorCategory::Format,
            Self::ConfigValidationError { .. }
            | Self::InvalidConfigValueError { .. }
            | Self::MissingConfigError { .. }
            | Self::TemplateError { .. } => ErrorCategory::Configuration,
            Self::CsvError(_) | Self::SerializationError(_) => ErrorCategory::Output,
            Self::ProcessingError { .. } => ErrorCategory::Internal,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self {
            // 網路錯誤通常可重試
            Self::HttpError(_) | Self::HttpStatus { .. } => ErrorSeverity::Medium,
            Self::IoError(e) if e.kind() == std::io::ErrorKind::PermissionDenied => ErrorSeverity::Critical,
            Self::ProcessingError { .. } => ErrorSeverity::Critical,
            _ => ErrorSeverity::High,
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            Self::IoError(_) | Self::NotFound { .. } => {
                "Check that the input path exists and is readable"
            }
            Self::EmptyInput { .. } => "Pass at least one image file, directory, URL or '-' for stdin",
            Self::HttpError(_) | Self::HttpStatus { .. } => {
                "Check the URL and your network connection, then retry"
            }
            Self::ZipError(_) => "Make sure the archive is a valid zip file",
            Self::UnsupportedFormat { .. } => {
                "Use a PNG, JPEG, GIF, BMP, WebP, ICO, TIFF, AVIF or SVG image, or disable strict format detection"
            }
            Self::TemplateError { .. } => {
                "Custom templates may only use {name}, {stem}, {mime}, {data}, {uri} and {size}; escape braces as {{ and }}"
            }
            Self::ConfigValidationError { .. }
            | Self::InvalidConfigValueError { .. }
            | Self::MissingConfigError { .. } => "Review the command line flags and configuration file",
            Self::CsvError(_) | Self::SerializationError(_) => {
                "Check that the output directory is writable"
            }
            Self::ProcessingError { .. } => "Re-run with --verbose to see per-image errors",
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            Self::EmptyInput { .. } => "File list is empty".to_string(),
            Self::UnsupportedFormat { source_name, .. } => {
                format!("'{}' does not look like a supported image", source_name)
            }
            Self::HttpStatus { url, status } => format!("Server returned {} for {}", status, url),
            other => other.to_string(),
        }
    }

    pub fn template(message: impl Into<String>) -> Self {
        Self::TemplateError {
            message: message.into(),
        }
    }

    pub fn processing(message: impl Into<String>) -> Self {
        Self::ProcessingError {
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Img2BaseError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_input_message_matches_status_bar() {
        let err = Img2BaseError::EmptyInput {
            message: "file list is empty".to_string(),
        };
        assert_eq!(err.user_friendly_message(), "File list is empty");
        assert_eq!(err.category(), ErrorCategory::Input);
        assert_eq!(err.severity(), ErrorSeverity::High);
    }

    #[test]
    fn test_network_errors_are_retryable() {
        let err = Img2BaseError::HttpStatus {
            url: "https://example.com/a.png".to_string(),
            status: 503,
        };
        assert_eq!(err.category(), ErrorCategory::Network);
        assert_eq!(err.severity(), ErrorSeverity::Medium);
    }
}

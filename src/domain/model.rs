use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    Png,
    Jpeg,
    Gif,
    Bmp,
    WebP,
    Ico,
    Tiff,
    Svg,
    Avif,
}

impl ImageFormat {
    pub fn mime_type(self) -> &'static str {
        match self {
            ImageFormat::Png => "image/png",
            ImageFormat::Jpeg => "image/jpeg",
            ImageFormat::Gif => "image/gif",
            ImageFormat::Bmp => "image/bmp",
            ImageFormat::WebP => "image/webp",
            ImageFormat::Ico => "image/x-icon",
            ImageFormat::Tiff => "image/tiff",
            ImageFormat::Svg => "image/svg+xml",
            ImageFormat::Avif => "image/avif",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ImageFormat::Png => "png",
            ImageFormat::Jpeg => "jpeg",
            ImageFormat::Gif => "gif",
            ImageFormat::Bmp => "bmp",
            ImageFormat::WebP => "webp",
            ImageFormat::Ico => "ico",
            ImageFormat::Tiff => "tiff",
            ImageFormat::Svg => "svg",
            ImageFormat::Avif => "avif",
        }
    }

    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "png" => Some(ImageFormat::Png),
            "jpg" | "jpeg" | "jpe" => Some(ImageFormat::Jpeg),
            "gif" => Some(ImageFormat::Gif),
            "bmp" => Some(ImageFormat::Bmp),
            "webp" => Some(ImageFormat::WebP),
            "ico" | "cur" => Some(ImageFormat::Ico),
            "tif" | "tiff" => Some(ImageFormat::Tiff),
            "svg" | "svgz" => Some(ImageFormat::Svg),
            "avif" => Some(ImageFormat::Avif),
            _ => None,
        }
    }

    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(Self::from_extension)
    }
}

impl fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ImageFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::from_extension(s).ok_or_else(|| format!("unknown image format: {}", s))
    }
}

/// Where the bytes of an image come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageSource {
    File(PathBuf),
    Url(String),
    Archive { path: PathBuf, entry: String },
    Stdin,
    Bytes { name: String, data: Vec<u8> },
}

impl ImageSource {
    pub fn display_name(&self) -> String {
        match self {
            ImageSource::File(path) => path.display().to_string(),
            ImageSource::Url(url) => url.clone(),
            ImageSource::Archive { path, entry } => format!("{}!{}", path.display(), entry),
            ImageSource::Stdin => "stdin".to_string(),
            ImageSource::Bytes { name, .. } => name.clone(),
        }
    }

    /// Name used for alt text and output file names.
    pub fn file_name(&self) -> String {
        let raw = match self {
            ImageSource::File(path) => {
                return path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default()
            }
            ImageSource::Url(url) => url
                .split(['?', '#'])
                .next()
                .unwrap_or_default()
                .rsplit('/')
                .next()
                .unwrap_or_default(),
            ImageSource::Archive { entry, .. } => entry.rsplit('/').next().unwrap_or_default(),
            ImageSource::Stdin => "stdin",
            ImageSource::Bytes { name, .. } => name.as_str(),
        };
        raw.to_string()
    }
}

#[derive(Debug, Clone)]
pub struct SourceImage {
    pub source: ImageSource,
    pub name: String,
    pub data: Vec<u8>,
}

impl SourceImage {
    pub fn new(source: ImageSource, data: Vec<u8>) -> Self {
        let name = source.file_name();
        Self { source, name, data }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncodedImage {
    pub name: String,
    pub source: String,
    pub format: ImageFormat,
    pub mime_type: String,
    pub original_size: usize,
    pub encoded: String,
    pub output: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversionFailure {
    pub source: String,
    pub error: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversionReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub images: Vec<EncodedImage>,
    pub failures: Vec<ConversionFailure>,
}

impl ConversionReport {
    pub fn new() -> Self {
        Self {
            started_at: Utc::now(),
            finished_at: None,
            images: Vec::new(),
            failures: Vec::new(),
        }
    }

    pub fn succeeded(&self) -> usize {
        self.images.len()
    }

    pub fn failed(&self) -> usize {
        self.failures.len()
    }

    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }
}

impl Default for ConversionReport {
    fn default() -> Self {
        Self::new()
    }
}

pub fn file_stem(name: &str) -> &str {
    match name.rfind('.') {
        Some(0) | None => name,
        Some(idx) => &name[..idx],
    }
}

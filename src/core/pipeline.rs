use crate::core::encoding::{self, Encoding};
use crate::core::format;
use crate::core::source::SourceReader;
use crate::core::template::{Template, TemplateContext};
use crate::core::{ConfigProvider, Pipeline, Storage};
use crate::domain::model::{ConversionFailure, ConversionReport, EncodedImage, SourceImage};
use crate::utils::error::{Img2BaseError, Result};
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Serialize;
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

/// Per-image conversion settings.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConvertOptions {
    pub encoding: Encoding,
    pub template: Template,
    pub line_width: usize,
    pub strict_format: bool,
}

impl ConvertOptions {
    pub fn from_config<C: ConfigProvider>(config: &C) -> Self {
        Self {
            encoding: config.encoding(),
            template: config.template().clone(),
            line_width: config.line_width(),
            strict_format: config.strict_format(),
        }
    }
}

/// Encodes one image held in memory. `name` is used for format fallback,
/// alt text and the `{name}` placeholder.
pub fn convert_bytes(data: &[u8], name: &str, options: &ConvertOptions) -> Result<EncodedImage> {
    convert(data, name, name, options)
}

pub fn convert_image(image: &SourceImage, options: &ConvertOptions) -> Result<EncodedImage> {
    convert(&image.data, &image.name, &image.source.display_name(), options)
}

fn convert(data: &[u8], name: &str, source: &str, options: &ConvertOptions) -> Result<EncodedImage> {
    let format = format::resolve(data, name, options.strict_format)?;
    let mime = format.mime_type();

    let encoded = encoding::encode(data, options.encoding);
    debug_assert_eq!(encoded.len(), encoding::encoded_len(data.len(), options.encoding));
    let payload = encoding::wrap_lines(&encoded, options.line_width);

    let output = options.template.render(&TemplateContext {
        name,
        mime,
        data: &payload,
        size: data.len(),
    })?;

    Ok(EncodedImage {
        name: name.to_string(),
        source: source.to_string(),
        format,
        mime_type: mime.to_string(),
        original_size: data.len(),
        encoded,
        output,
    })
}

pub struct ConversionPipeline<S: Storage, C: ConfigProvider> {
    reader: SourceReader<S>,
    config: C,
    options: ConvertOptions,
}

impl<S: Storage, C: ConfigProvider> ConversionPipeline<S, C> {
    pub fn new(storage: S, config: C) -> Result<Self> {
        let mut builder = Client::builder();
        if let Some(secs) = config.request_timeout() {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let client = builder.build()?;

        let options = ConvertOptions::from_config(&config);
        Ok(Self {
            reader: SourceReader::with_client(storage, client),
            config,
            options,
        })
    }

    pub fn options(&self) -> &ConvertOptions {
        &self.options
    }

    async fn write_outputs(&self, dir: &str, report: &ConversionReport) -> Result<Vec<ManifestRow>> {
        let mut used = HashSet::new();
        let mut rows = Vec::with_capacity(report.images.len());

        for image in &report.images {
            let file_name = unique_output_name(image, &mut used);
            let path = Path::new(dir).join(&file_name);
            self.reader
                .storage()
                .write_file(&path.to_string_lossy(), image.output.as_bytes())
                .await?;
            tracing::debug!("💾 Wrote {}", path.display());

            rows.push(ManifestRow {
                name: image.name.clone(),
                source: image.source.clone(),
                mime_type: image.mime_type.clone(),
                original_size: image.original_size,
                encoded_length: image.encoded.len(),
                output_file: file_name,
            });
        }
        Ok(rows)
    }

    async fn write_manifest(
        &self,
        dir: &str,
        manifest_format: &str,
        rows: &[ManifestRow],
        report: &ConversionReport,
    ) -> Result<()> {
        let (file_name, data) = match manifest_format {
            "csv" => ("manifest.csv", delimited(rows, b',')?),
            "tsv" => ("manifest.tsv", delimited(rows, b'\t')?),
            "json" => {
                let manifest = JsonManifest {
                    started_at: report.started_at,
                    finished_at: report.finished_at,
                    succeeded: report.succeeded(),
                    failed: report.failed(),
                    images: rows,
                    failures: &report.failures,
                };
                ("manifest.json", serde_json::to_vec_pretty(&manifest)?)
            }
            other => {
                return Err(Img2BaseError::InvalidConfigValueError {
                    field: "manifest_format".to_string(),
                    value: other.to_string(),
                    reason: "Valid values: csv, tsv, json".to_string(),
                })
            }
        };

        let path = Path::new(dir).join(file_name);
        self.reader
            .storage()
            .write_file(&path.to_string_lossy(), &data)
            .await?;
        tracing::info!("📋 Manifest saved to: {}", path.display());
        Ok(())
    }
}

#[async_trait::async_trait]
impl<S: Storage, C: ConfigProvider> Pipeline for ConversionPipeline<S, C> {
    async fn extract(&self) -> Result<(Vec<SourceImage>, ConversionReport)> {
        let expanded = self.reader.expand(self.config.inputs()).await?;
        let mut report = ConversionReport::new();
        let mut images = Vec::with_capacity(expanded.sources.len());
        let mut first_error = None;

        for (input, e) in expanded.failures {
            report.failures.push(ConversionFailure {
                source: input,
                error: e.to_string(),
            });
            first_error.get_or_insert(e);
        }

        for source in expanded.sources {
            match self.reader.read(&source).await {
                Ok(data) => {
                    tracing::debug!("Read {} bytes from {}", data.len(), source.display_name());
                    images.push(SourceImage::new(source, data));
                }
                Err(e) => {
                    tracing::warn!("⚠️ Failed to read {}: {}", source.display_name(), e);
                    report.failures.push(ConversionFailure {
                        source: source.display_name(),
                        error: e.to_string(),
                    });
                    first_error.get_or_insert(e);
                }
            }
        }

        if images.is_empty() {
            if let Some(e) = first_error {
                return Err(e);
            }
        }
        Ok((images, report))
    }

    async fn transform(
        &self,
        images: Vec<SourceImage>,
        mut report: ConversionReport,
    ) -> Result<ConversionReport> {
        let total = images.len();
        let semaphore = Arc::new(Semaphore::new(self.config.concurrency().max(1)));
        let mut tasks = JoinSet::new();

        for (idx, image) in images.into_iter().enumerate() {
            let semaphore = Arc::clone(&semaphore);
            let options = self.options.clone();
            tasks.spawn(async move {
                let _permit = semaphore.acquire_owned().await;
                let source = image.source.display_name();
                // 編碼屬於 CPU 密集工作，移出 async 執行緒
                let result = tokio::task::spawn_blocking(move || convert_image(&image, &options))
                    .await
                    .map_err(|e| Img2BaseError::processing(format!("encoder task failed: {}", e)))
                    .and_then(|r| r);
                (idx, source, result)
            });
        }

        let mut slots: Vec<Option<(String, Result<EncodedImage>)>> = (0..total).map(|_| None).collect();
        while let Some(joined) = tasks.join_next().await {
            let (idx, source, result) =
                joined.map_err(|e| Img2BaseError::processing(format!("conversion task failed: {}", e)))?;
            slots[idx] = Some((source, result));
        }

        let mut first_error = None;
        for (source, result) in slots.into_iter().flatten() {
            match result {
                Ok(image) => {
                    tracing::debug!(
                        "✅ {} -> {} ({} bytes, {} chars)",
                        source,
                        image.mime_type,
                        image.original_size,
                        image.encoded.len()
                    );
                    report.images.push(image);
                }
                Err(e) => {
                    tracing::warn!("⚠️ Failed to convert {}: {}", source, e);
                    report.failures.push(ConversionFailure {
                        source,
                        error: e.to_string(),
                    });
                    first_error.get_or_insert(e);
                }
            }
        }

        report.finish();
        if report.images.is_empty() {
            if let Some(e) = first_error {
                return Err(e);
            }
        }
        Ok(report)
    }

    async fn load(&self, report: &ConversionReport) -> Result<String> {
        let Some(dir) = self.config.output_path() else {
            let outputs: Vec<&str> = report.images.iter().map(|i| i.output.as_str()).collect();
            return Ok(outputs.join("\n"));
        };

        let rows = self.write_outputs(dir, report).await?;
        if let Some(manifest_format) = self.config.manifest_format() {
            self.write_manifest(dir, manifest_format, &rows, report).await?;
        }
        Ok(dir.to_string())
    }
}

#[derive(Debug, Serialize)]
struct ManifestRow {
    name: String,
    source: String,
    mime_type: String,
    original_size: usize,
    encoded_length: usize,
    output_file: String,
}

#[derive(Serialize)]
struct JsonManifest<'a> {
    started_at: DateTime<Utc>,
    finished_at: Option<DateTime<Utc>>,
    succeeded: usize,
    failed: usize,
    images: &'a [ManifestRow],
    failures: &'a [ConversionFailure],
}

fn delimited(rows: &[ManifestRow], delimiter: u8) -> Result<Vec<u8>> {
    let mut writer = csv::WriterBuilder::new()
        .delimiter(delimiter)
        .from_writer(Vec::new());
    for row in rows {
        writer.serialize(row)?;
    }
    writer
        .into_inner()
        .map_err(|e| Img2BaseError::processing(format!("failed to flush manifest: {}", e)))
}

/// `<name>.txt`; on collisions `-2`, `-3`, ... goes after the full name
/// (`pixel.gif-2.txt`).
fn unique_output_name(image: &EncodedImage, used: &mut HashSet<String>) -> String {
    let base = if image.name.is_empty() {
        "image".to_string()
    } else {
        image.name.clone()
    };

    let mut candidate = format!("{}.txt", base);
    let mut n = 2;
    while !used.insert(candidate.clone()) {
        candidate = format!("{}-{}.txt", base, n);
        n += 1;
    }
    candidate
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::ImageFormat;

    const GIF_1X1: &[u8] = b"GIF89a\x01\x00\x01\x00\x80\x00\x00\xff\xff\xff\x00\x00\x00!\xf9\x04\x01\x00\x00\x00\x00,\x00\x00\x00\x00\x01\x00\x01\x00\x00\x02\x02D\x01\x00;";

    #[test]
    fn test_convert_bytes_default_is_markdown_data_uri() {
        let image = convert_bytes(GIF_1X1, "pixel.gif", &ConvertOptions::default()).unwrap();
        assert_eq!(image.format, ImageFormat::Gif);
        assert_eq!(image.mime_type, "image/gif");
        assert_eq!(image.original_size, GIF_1X1.len());
        assert!(image.output.starts_with("![pixel](data:image/gif;base64,R0lGODlh"));
        assert!(image.output.ends_with(')'));
    }

    #[test]
    fn test_wrapping_only_affects_rendered_output() {
        let options = ConvertOptions {
            template: Template::Raw,
            line_width: 16,
            ..ConvertOptions::default()
        };
        let image = convert_bytes(GIF_1X1, "pixel.gif", &options).unwrap();
        assert!(!image.encoded.contains('\n'));
        assert!(image.output.lines().all(|line| line.len() <= 16));
        assert_eq!(image.output.replace('\n', ""), image.encoded);
    }

    #[test]
    fn test_unknown_bytes_rejected() {
        let err = convert_bytes(b"plain text", "notes.txt", &ConvertOptions::default()).unwrap_err();
        assert!(matches!(err, Img2BaseError::UnsupportedFormat { .. }));
    }

    #[test]
    fn test_unique_output_names() {
        let image = convert_bytes(GIF_1X1, "pixel.gif", &ConvertOptions::default()).unwrap();
        let mut used = HashSet::new();
        assert_eq!(unique_output_name(&image, &mut used), "pixel.gif.txt");
        assert_eq!(unique_output_name(&image, &mut used), "pixel.gif-2.txt");
        assert_eq!(unique_output_name(&image, &mut used), "pixel.gif-3.txt");
    }
}

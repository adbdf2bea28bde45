use crate::core::Pipeline;
use crate::domain::model::ConversionReport;
use crate::utils::error::{Img2BaseError, Result};

#[derive(Debug, Clone)]
pub struct EngineOutput {
    /// Rendered text, or the output directory when results were written to disk.
    pub output: String,
    pub report: ConversionReport,
}

pub struct Img2BaseEngine<P: Pipeline> {
    pipeline: P,
}

impl<P: Pipeline> Img2BaseEngine<P> {
    pub fn new(pipeline: P) -> Self {
        Self { pipeline }
    }

    pub async fn run(&self) -> Result<EngineOutput> {
        tracing::info!("🚀 Starting conversion");

        tracing::debug!("Reading sources...");
        let (images, report) = self.pipeline.extract().await?;
        tracing::info!("📥 Read {} image(s)", images.len());

        tracing::debug!("Encoding images...");
        let report = self.pipeline.transform(images, report).await?;
        if report.images.is_empty() {
            return Err(Img2BaseError::processing("no image could be converted"));
        }
        tracing::info!(
            "🔄 Encoded {} image(s), {} failed",
            report.succeeded(),
            report.failed()
        );

        tracing::debug!("Rendering output...");
        let output = self.pipeline.load(&report).await?;

        Ok(EngineOutput { output, report })
    }
}

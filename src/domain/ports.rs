use crate::core::encoding::Encoding;
use crate::core::template::Template;
use crate::domain::model::{ConversionReport, SourceImage};
use crate::utils::error::Result;
use async_trait::async_trait;

pub trait Storage: Send + Sync {
    fn read_file(&self, path: &str) -> impl std::future::Future<Output = Result<Vec<u8>>> + Send;
    fn write_file(
        &self,
        path: &str,
        data: &[u8],
    ) -> impl std::future::Future<Output = Result<()>> + Send;
    /// Entry names of a directory, not recursive.
    fn list_dir(&self, path: &str) -> impl std::future::Future<Output = Result<Vec<String>>> + Send;
    fn is_dir(&self, path: &str) -> impl std::future::Future<Output = bool> + Send;
}

pub trait ConfigProvider: Send + Sync {
    fn inputs(&self) -> &[String];
    fn output_path(&self) -> Option<&str>;
    fn encoding(&self) -> Encoding;
    fn template(&self) -> &Template;
    fn line_width(&self) -> usize;
    fn concurrency(&self) -> usize;
    fn strict_format(&self) -> bool;
    fn manifest_format(&self) -> Option<&str>;
    /// Timeout in seconds for URL sources.
    fn request_timeout(&self) -> Option<u64>;
}

#[async_trait]
pub trait Pipeline: Send + Sync {
    async fn extract(&self) -> Result<(Vec<SourceImage>, ConversionReport)>;
    async fn transform(
        &self,
        images: Vec<SourceImage>,
        report: ConversionReport,
    ) -> Result<ConversionReport>;
    async fn load(&self, report: &ConversionReport) -> Result<String>;
}

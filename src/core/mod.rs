pub mod encoding;
pub mod engine;
pub mod format;
pub mod pipeline;
pub mod source;
pub mod template;

pub use crate::domain::model::{ConversionReport, EncodedImage, ImageFormat, SourceImage};
pub use crate::domain::ports::{ConfigProvider, Pipeline, Storage};
pub use crate::utils::error::Result;

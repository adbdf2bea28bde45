pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::CliConfig;
pub use config::{cli::LocalStorage, Settings};

pub use core::encoding::Encoding;
pub use core::engine::{EngineOutput, Img2BaseEngine};
pub use core::pipeline::{convert_bytes, ConversionPipeline, ConvertOptions};
pub use core::template::Template;
pub use domain::model::{EncodedImage, ImageFormat, ImageSource};
pub use utils::error::{Img2BaseError, Result};

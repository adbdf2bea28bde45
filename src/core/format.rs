//! Image format detection by content sniffing, with an extension fallback.

use crate::domain::model::ImageFormat;
use crate::utils::error::{Img2BaseError, Result};
use std::path::Path;

const PNG_MAGIC: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];
const SVG_SNIFF_WINDOW: usize = 1024;

pub fn detect(bytes: &[u8]) -> Option<ImageFormat> {
    if bytes.starts_with(PNG_MAGIC) {
        return Some(ImageFormat::Png);
    }
    if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
        return Some(ImageFormat::Jpeg);
    }
    if bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a") {
        return Some(ImageFormat::Gif);
    }
    if bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
        return Some(ImageFormat::WebP);
    }
    if bytes.starts_with(b"II*\0") || bytes.starts_with(b"MM\0*") {
        return Some(ImageFormat::Tiff);
    }
    if bytes.len() >= 12 && &bytes[4..8] == b"ftyp" && matches!(&bytes[8..12], b"avif" | b"avis") {
        return Some(ImageFormat::Avif);
    }
    if bytes.starts_with(&[0x00, 0x00, 0x01, 0x00]) || bytes.starts_with(&[0x00, 0x00, 0x02, 0x00]) {
        return Some(ImageFormat::Ico);
    }
    // BM 只有兩個位元組，放在較長的簽章之後
    if bytes.len() >= 14 && bytes.starts_with(b"BM") {
        return Some(ImageFormat::Bmp);
    }
    if looks_like_svg(bytes) {
        return Some(ImageFormat::Svg);
    }
    None
}

fn looks_like_svg(bytes: &[u8]) -> bool {
    let window = &bytes[..bytes.len().min(SVG_SNIFF_WINDOW)];
    let window = window.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(window);
    let text = String::from_utf8_lossy(window);
    let text = text.trim_start();

    if text.starts_with("<svg") {
        return true;
    }
    (text.starts_with("<?xml") || text.starts_with("<!--") || text.starts_with("<!DOCTYPE svg"))
        && text.contains("<svg")
}

/// Picks the format for `bytes`: sniffed content first, then the extension
/// of `name_hint` unless `strict` is set.
pub fn resolve(bytes: &[u8], name_hint: &str, strict: bool) -> Result<ImageFormat> {
    if bytes.is_empty() {
        return Err(Img2BaseError::EmptyInput {
            message: format!("'{}' contains no data", name_hint),
        });
    }

    let by_extension = ImageFormat::from_path(Path::new(name_hint));

    match (detect(bytes), by_extension) {
        (Some(sniffed), Some(ext)) if sniffed != ext => {
            tracing::warn!(
                "⚠️ '{}' has a .{} extension but its content is {}; using {}",
                name_hint,
                ext,
                sniffed,
                sniffed
            );
            Ok(sniffed)
        }
        (Some(sniffed), _) => Ok(sniffed),
        (None, Some(ext)) if !strict => {
            tracing::debug!("No signature matched for '{}', falling back to extension ({})", name_hint, ext);
            Ok(ext)
        }
        (None, _) => Err(Img2BaseError::UnsupportedFormat {
            source_name: name_hint.to_string(),
            reason: if strict {
                "content does not match any known image signature".to_string()
            } else {
                "unknown signature and no recognised file extension".to_string()
            },
        }),
    }
}

/// Whether a directory entry should be picked up when expanding a folder input.
pub fn is_image_path(path: &Path) -> bool {
    ImageFormat::from_path(path).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn png_header() -> Vec<u8> {
        let mut bytes = PNG_MAGIC.to_vec();
        bytes.extend_from_slice(&[0, 0, 0, 13, b'I', b'H', b'D', b'R']);
        bytes
    }

    #[test]
    fn test_detect_known_signatures() {
        assert_eq!(detect(&png_header()), Some(ImageFormat::Png));
        assert_eq!(detect(&[0xFF, 0xD8, 0xFF, 0xE0, 0, 16]), Some(ImageFormat::Jpeg));
        assert_eq!(detect(b"GIF89a\x01\x00\x01\x00"), Some(ImageFormat::Gif));
        assert_eq!(detect(b"RIFF\x24\x00\x00\x00WEBPVP8 "), Some(ImageFormat::WebP));
        assert_eq!(detect(b"II*\0\x08\0\0\0"), Some(ImageFormat::Tiff));
        assert_eq!(detect(b"\0\0\0\x1cftypavif\0\0\0\0"), Some(ImageFormat::Avif));
        assert_eq!(detect(&[0, 0, 1, 0, 1, 0, 16, 16]), Some(ImageFormat::Ico));
        assert_eq!(detect(b"BM\x46\0\0\0\0\0\0\0\x36\0\0\0"), Some(ImageFormat::Bmp));
    }

    #[test]
    fn test_detect_alternate_signatures() {
        assert_eq!(detect(&[0, 0, 2, 0, 1, 0, 32, 32]), Some(ImageFormat::Ico));
        assert_eq!(detect(b"MM\0*\0\0\0\x08"), Some(ImageFormat::Tiff));
        assert_eq!(detect(b"\0\0\0\x20ftypavis\0\0\0\0"), Some(ImageFormat::Avif));
        assert_eq!(detect(b"\0\0\0\x20ftypheic\0\0\0\0"), None);
    }

    #[test]
    fn test_short_bm_prefix_is_not_bmp() {
        // 少於 14 位元組的檔頭不算 BMP
        let short = b"BM hello";
        assert_eq!(detect(short), None);
        assert!(matches!(
            resolve(short, "notes.txt", false),
            Err(Img2BaseError::UnsupportedFormat { .. })
        ));
        assert_eq!(resolve(short, "tiny.bmp", false).unwrap(), ImageFormat::Bmp);
        assert!(resolve(short, "tiny.bmp", true).is_err());
    }

    #[test]
    fn test_detect_svg_variants() {
        assert_eq!(detect(b"<svg xmlns=\"http://www.w3.org/2000/svg\"/>"), Some(ImageFormat::Svg));
        assert_eq!(
            detect(b"\xEF\xBB\xBF  \n<?xml version=\"1.0\"?>\n<svg></svg>"),
            Some(ImageFormat::Svg)
        );
        assert_eq!(detect(b"<?xml version=\"1.0\"?><html></html>"), None);
        assert_eq!(detect(b"hello world"), None);
    }

    #[test]
    fn test_resolve_prefers_content_over_extension() {
        assert_eq!(resolve(&png_header(), "photo.jpg", true).unwrap(), ImageFormat::Png);
    }

    #[test]
    fn test_resolve_extension_fallback_respects_strict() {
        let unknown = b"not really an image";
        assert_eq!(resolve(unknown, "raw.webp", false).unwrap(), ImageFormat::WebP);
        assert!(matches!(
            resolve(unknown, "raw.webp", true),
            Err(Img2BaseError::UnsupportedFormat { .. })
        ));
        assert!(matches!(
            resolve(unknown, "notes.txt", false),
            Err(Img2BaseError::UnsupportedFormat { .. })
        ));
    }

    #[test]
    fn test_resolve_empty_input() {
        assert!(matches!(resolve(&[], "empty.png", false), Err(Img2BaseError::EmptyInput { .. })));
    }
}

use base64::engine::general_purpose::{STANDARD, STANDARD_NO_PAD, URL_SAFE, URL_SAFE_NO_PAD};
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// MIME (RFC 2045) line length.
pub const MIME_LINE_WIDTH: usize = 76;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Encoding {
    #[default]
    Standard,
    StandardNoPad,
    UrlSafe,
    UrlSafeNoPad,
}

impl Encoding {
    pub const VARIANTS: [&'static str; 4] = ["standard", "standard-no-pad", "url-safe", "url-safe-no-pad"];

    fn padded(self) -> bool {
        matches!(self, Encoding::Standard | Encoding::UrlSafe)
    }
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Encoding::Standard => "standard",
            Encoding::StandardNoPad => "standard-no-pad",
            Encoding::UrlSafe => "url-safe",
            Encoding::UrlSafeNoPad => "url-safe-no-pad",
        };
        f.write_str(name)
    }
}

impl FromStr for Encoding {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "standard" | "base64" => Ok(Encoding::Standard),
            "standard-no-pad" => Ok(Encoding::StandardNoPad),
            "url-safe" | "base64url" => Ok(Encoding::UrlSafe),
            "url-safe-no-pad" => Ok(Encoding::UrlSafeNoPad),
            other => Err(format!(
                "unknown encoding '{}', expected one of: {}",
                other,
                Self::VARIANTS.join(", ")
            )),
        }
    }
}

pub fn encode(bytes: &[u8], encoding: Encoding) -> String {
    match encoding {
        Encoding::Standard => STANDARD.encode(bytes),
        Encoding::StandardNoPad => STANDARD_NO_PAD.encode(bytes),
        Encoding::UrlSafe => URL_SAFE.encode(bytes),
        Encoding::UrlSafeNoPad => URL_SAFE_NO_PAD.encode(bytes),
    }
}

/// Exact length of `encode` output for `input_len` bytes.
pub fn encoded_len(input_len: usize, encoding: Encoding) -> usize {
    if encoding.padded() {
        input_len.div_ceil(3) * 4
    } else {
        let full = input_len / 3 * 4;
        match input_len % 3 {
            0 => full,
            1 => full + 2,
            _ => full + 3,
        }
    }
}

/// Breaks `encoded` into lines of `width` characters. `0` disables wrapping.
pub fn wrap_lines(encoded: &str, width: usize) -> String {
    if width == 0 || encoded.len() <= width {
        return encoded.to_string();
    }

    let mut out = String::with_capacity(encoded.len() + encoded.len() / width);
    for (i, c) in encoded.chars().enumerate() {
        if i > 0 && i % width == 0 {
            out.push('\n');
        }
        out.push(c);
    }
    out
}

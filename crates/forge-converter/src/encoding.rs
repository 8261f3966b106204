//! BOM-based text encoding detection.
//!
//! Exported JSON is rewritten in the same encoding it was read in, BOM
//! included, so downstream runtimes see byte-compatible files.

use std::fmt;

/// Text encodings recognised by their byte order mark.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextEncoding {
    /// UTF-8 without a BOM (the fallback).
    Utf8,
    /// UTF-8 with `EF BB BF`.
    Utf8Bom,
    /// UTF-16 little endian, `FF FE`.
    Utf16Le,
    /// UTF-16 big endian, `FE FF`.
    Utf16Be,
    /// UTF-32 little endian, `FF FE 00 00`.
    Utf32Le,
}

/// Text could not be decoded in the detected encoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodeError {
    pub encoding: TextEncoding,
    pub reason: String,
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid {} text: {}", self.encoding, self.reason)
    }
}

impl std::error::Error for DecodeError {}

impl fmt::Display for TextEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Utf8 => "UTF-8",
            Self::Utf8Bom => "UTF-8 (BOM)",
            Self::Utf16Le => "UTF-16LE",
            Self::Utf16Be => "UTF-16BE",
            Self::Utf32Le => "UTF-32LE",
        };
        f.write_str(name)
    }
}

impl TextEncoding {
    /// Detect the encoding from the leading bytes.
    ///
    /// UTF-32LE must be tested before UTF-16LE since its BOM starts with the
    /// UTF-16LE BOM.
    pub fn detect(bytes: &[u8]) -> Self {
        if bytes.starts_with(&[0xFF, 0xFE, 0x00, 0x00]) {
            Self::Utf32Le
        } else if bytes.starts_with(&[0xEF, 0xBB, 0xBF]) {
            Self::Utf8Bom
        } else if bytes.starts_with(&[0xFF, 0xFE]) {
            Self::Utf16Le
        } else if bytes.starts_with(&[0xFE, 0xFF]) {
            Self::Utf16Be
        } else {
            Self::Utf8
        }
    }

    /// The byte order mark written for this encoding.
    pub fn bom(self) -> &'static [u8] {
        match self {
            Self::Utf8 => &[],
            Self::Utf8Bom => &[0xEF, 0xBB, 0xBF],
            Self::Utf16Le => &[0xFF, 0xFE],
            Self::Utf16Be => &[0xFE, 0xFF],
            Self::Utf32Le => &[0xFF, 0xFE, 0x00, 0x00],
        }
    }

    /// Decode `bytes` (BOM included) into a string.
    pub fn decode(self, bytes: &[u8]) -> Result<String, DecodeError> {
        let body = bytes.get(self.bom().len()..).unwrap_or_default();
        let err = |reason: String| DecodeError {
            encoding: self,
            reason,
        };

        match self {
            Self::Utf8 | Self::Utf8Bom => {
                String::from_utf8(body.to_vec()).map_err(|e| err(e.to_string()))
            }
            Self::Utf16Le | Self::Utf16Be => {
                if body.len() % 2 != 0 {
                    return Err(err("odd number of bytes".to_string()));
                }
                let units: Vec<u16> = body
                    .chunks_exact(2)
                    .map(|c| {
                        let pair = [c[0], c[1]];
                        if self == Self::Utf16Le {
                            u16::from_le_bytes(pair)
                        } else {
                            u16::from_be_bytes(pair)
                        }
                    })
                    .collect();
                String::from_utf16(&units).map_err(|e| err(e.to_string()))
            }
            Self::Utf32Le => {
                if body.len() % 4 != 0 {
                    return Err(err("length is not a multiple of 4".to_string()));
                }
                body.chunks_exact(4)
                    .map(|c| {
                        let code = u32::from_le_bytes([c[0], c[1], c[2], c[3]]);
                        char::from_u32(code)
                            .ok_or_else(|| err(format!("invalid code point {:#x}", code)))
                    })
                    .collect()
            }
        }
    }

    /// Encode `text` with this encoding, BOM first.
    pub fn encode(self, text: &str) -> Vec<u8> {
        let mut out = self.bom().to_vec();
        match self {
            Self::Utf8 | Self::Utf8Bom => out.extend_from_slice(text.as_bytes()),
            Self::Utf16Le => {
                for unit in text.encode_utf16() {
                    out.extend_from_slice(&unit.to_le_bytes());
                }
            }
            Self::Utf16Be => {
                for unit in text.encode_utf16() {
                    out.extend_from_slice(&unit.to_be_bytes());
                }
            }
            Self::Utf32Le => {
                for ch in text.chars() {
                    out.extend_from_slice(&(ch as u32).to_le_bytes());
                }
            }
        }
        out
    }
}

/// Decode a byte buffer, returning the text and the detected encoding.
pub fn decode_text(bytes: &[u8]) -> Result<(String, TextEncoding), DecodeError> {
    let encoding = TextEncoding::detect(bytes);
    encoding.decode(bytes).map(|text| (text, encoding))
}

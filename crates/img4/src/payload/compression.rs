//! Payload compression schemes
//!
//! Kernelcaches and most other IM4P payloads are compressed with one of two
//! schemes. Detection is purely by magic; anything unrecognised is treated
//! as uncompressed.
//!
//! Whatever follows the compressed stream is returned untouched as the
//! trailing region. Kernelcaches use it to carry a second IM4P (the
//! hypervisor image) or other companion data.

use super::lzss;
use crate::{Error, Result};
use std::fmt;
use std::str::FromStr;

/// LZFSE block magics a stream may start with
const LZFSE_BLOCK_MAGICS: [&[u8; 4]; 4] = [b"bvx1", b"bvx2", b"bvxn", b"bvx-"];

/// LZFSE end-of-stream marker
const LZFSE_END_MAGIC: &[u8; 4] = b"bvx$";

/// Supported compression schemes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Compression {
    /// Apple `complzss`: 0x180-byte header plus an LZSS stream
    Lzss,
    /// LZFSE (`bvx2` block stream)
    Lzfse,
}

impl Compression {
    /// Canonical scheme name.
    pub fn name(self) -> &'static str {
        match self {
            Compression::Lzss => "complzss",
            Compression::Lzfse => "bvx2",
        }
    }

    /// Identify the scheme `data` is compressed with.
    pub fn detect(data: &[u8]) -> Option<Self> {
        if lzss::is_complzss(data) {
            Some(Compression::Lzss)
        } else if data.len() >= 4 && LZFSE_BLOCK_MAGICS.iter().any(|m| &data[..4] == *m) {
            Some(Compression::Lzfse)
        } else {
            None
        }
    }
}

impl fmt::Display for Compression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Compression {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "complzss" | "lzss" => Ok(Compression::Lzss),
            "bvx2" | "lzfse" => Ok(Compression::Lzfse),
            other => Err(Error::Value(format!(
                "unknown compression '{other}', expected complzss or bvx2"
            ))),
        }
    }
}

/// Output of [`decompress`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decompressed<'a> {
    pub data: Vec<u8>,
    /// Bytes after the end of the compressed stream.
    pub trailing: &'a [u8],
}

/// Decompress `data` with `scheme`.
///
/// # Errors
///
/// Returns [`Error::Decompression`] for a corrupt or truncated stream.
pub fn decompress(scheme: Compression, data: &[u8]) -> Result<Decompressed<'_>> {
    match scheme {
        Compression::Lzss => {
            let (data, trailing) = lzss::unpack(data)?;
            Ok(Decompressed { data, trailing })
        }
        Compression::Lzfse => decompress_lzfse(data),
    }
}

/// Decode an LZFSE stream that may be followed by unrelated bytes.
///
/// The stream ends at a `bvx$` marker, but those four bytes can also occur
/// inside compressed blocks, so every candidate is tried in order.
fn decompress_lzfse(data: &[u8]) -> Result<Decompressed<'_>> {
    let mut last_error = None;
    let mut start = 0;

    while let Some(found) = find(&data[start..], LZFSE_END_MAGIC) {
        let end = start + found + LZFSE_END_MAGIC.len();
        let mut out = Vec::new();
        match lzfse_rust::decode_bytes(&data[..end], &mut out) {
            Ok(_) => {
                return Ok(Decompressed {
                    data: out,
                    trailing: &data[end..],
                })
            }
            Err(e) => {
                tracing::debug!(offset = end, error = %e, "LZFSE end marker candidate rejected");
                last_error = Some(e.to_string());
            }
        }
        start = end;
    }

    Err(Error::Decompression(match last_error {
        Some(e) => format!("invalid LZFSE stream: {e}"),
        None => "LZFSE stream has no end-of-stream marker".into(),
    }))
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

/// Compress `data` with `scheme`, appending `trailing` after the stream.
pub fn compress(scheme: Compression, data: &[u8], trailing: &[u8]) -> Result<Vec<u8>> {
    match scheme {
        Compression::Lzss => lzss::pack(data, trailing),
        Compression::Lzfse => {
            let mut out = Vec::new();
            lzfse_rust::encode_bytes(data, &mut out)
                .map_err(|e| Error::Decompression(format!("LZFSE encoding failed: {e}")))?;
            out.extend_from_slice(trailing);
            Ok(out)
        }
    }
}

/// Detect the scheme of `data` and decompress it.
///
/// Returns `Ok(None)` when `data` is not compressed.
pub fn detect_and_decompress(data: &[u8]) -> Result<Option<(Compression, Decompressed<'_>)>> {
    let Some(scheme) = Compression::detect(data) else {
        return Ok(None);
    };
    tracing::debug!(%scheme, len = data.len(), "detected compressed payload");
    decompress(scheme, data).map(|out| Some((scheme, out)))
}

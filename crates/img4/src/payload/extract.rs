//! Payload extraction
//!
//! Extraction runs in three stages: locate the payload OCTET STRING, decrypt
//! it when an IV and key are supplied, then undo the compression the bytes
//! announce by their magic.

use super::compression::{detect_and_decompress, Compression};
use crate::container::im4p::{payload_element, PAYLOAD_INDEX};
use crate::container::kind::is_im4p;
use crate::crypto::aes_cbc_decrypt;
use crate::der::{DerElement, Tag};
use crate::{Error, Result};

/// Decoded contents of an IM4P.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedPayload {
    /// Decrypted and decompressed payload bytes
    pub data: Vec<u8>,
    /// Scheme the payload was compressed with, if any
    pub compression: Option<Compression>,
    /// IM4P found after the compressed stream
    pub hypervisor: Option<DerElement>,
    /// Other non-padding bytes found after the compressed stream
    pub companion: Option<Vec<u8>>,
}

/// Payload extraction with optional decryption.
///
/// # Example
///
/// ```
/// use img4::container::{get_empty_im4p_container, FourCc};
/// use img4::payload::{append_payload_to_im4p, Compression, PayloadExtractor};
///
/// let im4p = get_empty_im4p_container(FourCc(*b"krnl"), "KernelCache");
/// let im4p = append_payload_to_im4p(&im4p, b"kernel", Some(Compression::Lzss), None)?;
///
/// let payload = PayloadExtractor::new(&im4p).extract()?;
/// assert_eq!(payload.data, b"kernel");
/// assert_eq!(payload.compression, Some(Compression::Lzss));
/// # Ok::<(), img4::Error>(())
/// ```
#[derive(Debug, Clone)]
pub struct PayloadExtractor<'a> {
    im4p: &'a DerElement,
    keys: Option<(String, String)>,
    decompress: bool,
}

impl<'a> PayloadExtractor<'a> {
    pub fn new(im4p: &'a DerElement) -> Self {
        Self {
            im4p,
            keys: None,
            decompress: true,
        }
    }

    /// Decrypt the payload with a hex IV and key before decompressing.
    pub fn decrypt_with(mut self, iv: impl Into<String>, key: impl Into<String>) -> Self {
        self.keys = Some((iv.into(), key.into()));
        self
    }

    /// Whether to undo compression. Defaults to `true`.
    pub fn decompress(mut self, decompress: bool) -> Self {
        self.decompress = decompress;
        self
    }

    /// Run the extraction.
    ///
    /// # Errors
    ///
    /// - [`Error::TypeMismatch`] if the element is not an IM4P
    /// - [`Error::NotFound`] if the IM4P has no payload
    /// - [`Error::Value`] for malformed hex or bad key/IV lengths
    /// - [`Error::Decompression`] for a corrupt compressed stream
    pub fn extract(&self) -> Result<ExtractedPayload> {
        let element = payload_element(self.im4p)?
            .ok_or_else(|| Error::NotFound("payload in IM4P".into()))?;

        let decrypted;
        let raw = match &self.keys {
            Some((iv, key)) => {
                decrypted = decrypt_payload(element, iv, key)?;
                decrypted.payload()?
            }
            None => element.payload()?,
        };

        if !self.decompress {
            return Ok(ExtractedPayload {
                data: raw.to_vec(),
                compression: None,
                hypervisor: None,
                companion: None,
            });
        }

        let Some((scheme, out)) = detect_and_decompress(raw)? else {
            tracing::debug!(len = raw.len(), "payload is not compressed");
            return Ok(ExtractedPayload {
                data: raw.to_vec(),
                compression: None,
                hypervisor: None,
                companion: None,
            });
        };

        if scheme == Compression::Lzfse {
            check_declared_size(self.im4p, out.data.len())?;
        }

        let (hypervisor, companion) = split_trailing(out.trailing);
        Ok(ExtractedPayload {
            data: out.data,
            compression: Some(scheme),
            hypervisor,
            companion,
        })
    }
}

/// Classify the bytes after a compressed stream.
fn split_trailing(trailing: &[u8]) -> (Option<DerElement>, Option<Vec<u8>>) {
    if trailing.iter().all(|&b| b == 0) {
        if !trailing.is_empty() {
            tracing::debug!(len = trailing.len(), "skipping zero padding after payload");
        }
        return (None, None);
    }

    match DerElement::parse_prefix(trailing) {
        Ok((element, consumed)) if is_im4p(&element) => {
            tracing::debug!(len = consumed, "found hypervisor IM4P after payload");
            if trailing[consumed..].iter().any(|&b| b != 0) {
                tracing::debug!(
                    len = trailing.len() - consumed,
                    "ignoring bytes after hypervisor IM4P"
                );
            }
            (Some(element), None)
        }
        _ => {
            tracing::debug!(len = trailing.len(), "found companion data after payload");
            (None, Some(trailing.to_vec()))
        }
    }
}

/// The `SEQUENCE { INTEGER 1, INTEGER size }` compression-info element.
pub(crate) fn compression_info(im4p: &DerElement) -> Result<Option<&DerElement>> {
    Ok(im4p
        .children()?
        .iter()
        .skip(PAYLOAD_INDEX + 1)
        .find(|element| element.tag() == Tag::SEQUENCE))
}

/// Build the compression-info element for an LZFSE payload of `size` bytes.
pub(crate) fn build_compression_info(size: u64) -> DerElement {
    DerElement::sequence(vec![DerElement::integer(1), DerElement::integer(size)])
}

fn check_declared_size(im4p: &DerElement, actual: usize) -> Result<()> {
    let Some(info) = compression_info(im4p)? else {
        return Ok(());
    };
    let declared = info.child(1)?.as_u64()?;
    if declared != actual as u64 {
        tracing::warn!(declared, actual, "LZFSE payload size disagrees with compression info");
    }
    Ok(())
}

fn decode_hex(value: &str, what: &str) -> Result<Vec<u8>> {
    hex::decode(value.trim()).map_err(|e| Error::Value(format!("invalid {what} hex: {e}")))
}

/// Decrypt a payload OCTET STRING with a hex IV and key.
///
/// Returns a new OCTET STRING; the input is left untouched. A wrong key
/// produces garbage rather than an error.
pub fn decrypt_payload(payload: &DerElement, iv: &str, key: &str) -> Result<DerElement> {
    if payload.tag() != Tag::OCTET_STRING {
        return Err(Error::mismatch("payload OCTET STRING", payload.tag().to_string()));
    }
    let iv = decode_hex(iv, "IV")?;
    let key = decode_hex(key, "key")?;
    let plain = aes_cbc_decrypt(payload.payload()?, &key, &iv)?;
    Ok(DerElement::octet_string(plain))
}

/// Extract the payload of an IM4P, decrypting when both `iv` and `key` are
/// given.
///
/// # Errors
///
/// Returns [`Error::Value`] when only one of `iv` and `key` is supplied, plus
/// everything [`PayloadExtractor::extract`] can return.
pub fn get_payload_from_im4p(
    im4p: &DerElement,
    iv: Option<&str>,
    key: Option<&str>,
) -> Result<ExtractedPayload> {
    let extractor = PayloadExtractor::new(im4p);
    match (iv, key) {
        (Some(iv), Some(key)) => extractor.decrypt_with(iv, key).extract(),
        (None, None) => extractor.extract(),
        _ => Err(Error::Value("IV and key must be supplied together".into())),
    }
}

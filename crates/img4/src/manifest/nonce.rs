//! Nonce generator binding
//!
//! A personalized manifest carries `BNCH`, the hash of the boot nonce. The
//! device derives that nonce from the generator stored in IM4R (`BNCN`) by
//! hashing its little-endian bytes; the nonce length identifies the hash.

use super::body::manifest_properties;
use crate::container::property::find_property;
use crate::container::FourCc;
use crate::crypto::digest::{SHA1_LEN, SHA384_LEN};
use crate::crypto::{sha1, sha384};
use crate::der::DerElement;
use crate::{Error, Result};

/// Truncated SHA-384 nonce length used by newer devices
const SHA384_TRUNCATED_LEN: usize = 32;

/// Parse a generator written as hex, with or without `0x`.
pub fn parse_generator(value: &str) -> Result<u64> {
    let trimmed = value.trim();
    let digits = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);
    u64::from_str_radix(digits, 16)
        .map_err(|e| Error::Value(format!("invalid generator {value:?}: {e}")))
}

/// Nonce a device would derive from `generator`, sized like `nonce_len`.
fn nonce_for_generator(generator: u64, nonce_len: usize) -> Option<Vec<u8>> {
    let bytes = generator.to_le_bytes();
    match nonce_len {
        SHA1_LEN => Some(sha1(&bytes)),
        SHA384_TRUNCATED_LEN => {
            let mut digest = sha384(&bytes);
            digest.truncate(SHA384_TRUNCATED_LEN);
            Some(digest)
        }
        SHA384_LEN => Some(sha384(&bytes)),
        _ => None,
    }
}

/// Whether `generator` produces the nonce the manifest is bound to.
///
/// Returns `Ok(false)` for a manifest without `MANP` or `BNCH`.
pub fn is_generator_valid_for_im4m(im4m: &DerElement, generator: u64) -> Result<bool> {
    let properties = match manifest_properties(im4m) {
        Ok(properties) => properties,
        Err(Error::NotFound(what)) => {
            tracing::debug!(%what, "manifest has no nonce binding");
            return Ok(false);
        }
        Err(e) => return Err(e),
    };
    let Some(bnch) = find_property(properties, FourCc::BNCH)? else {
        tracing::debug!("manifest has no BNCH");
        return Ok(false);
    };
    let nonce = bnch.payload()?;

    let Some(expected) = nonce_for_generator(generator, nonce.len()) else {
        tracing::debug!(len = nonce.len(), "unsupported BNCH length");
        return Ok(false);
    };
    Ok(expected == nonce)
}

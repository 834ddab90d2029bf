//! Error types for img4 operations.
//!
//! This module defines the [`enum@Error`] enum covering every failure case of
//! the DER engine, the container algebra, the payload codec and the manifest
//! validator.
//!
//! # See Also
//!
//! - [`crate::Result`] - Convenience type alias using this error

use thiserror::Error;

/// Error type for img4 operations.
///
/// All fallible public functions in this crate return [`crate::Result<T>`].
/// Boolean predicates keep a narrower contract: they only fail when the input
/// is too malformed to evaluate, and answer `false` for well-formed input that
/// simply does not match.
///
/// # Examples
///
/// ```
/// use img4::{container, Error};
///
/// let img4 = container::get_empty_img4_container();
/// match container::get_im4p_from_img4(&img4) {
///     Ok(im4p) => println!("found {} bytes", im4p.encoded_len()),
///     Err(Error::NotFound(what)) => eprintln!("missing: {what}"),
///     Err(e) => eprintln!("other error: {e}"),
/// }
/// ```
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    /// Malformed or truncated DER input.
    ///
    /// Raised for indefinite or non-minimal lengths, lengths that run past
    /// the end of the buffer, broken tag octets and trailing garbage.
    #[error("DER parse error at offset {offset}: {reason}")]
    Parse { offset: usize, reason: String },

    /// The element is not of the kind the operation requires.
    #[error("type mismatch: expected {expected}, found {found}")]
    TypeMismatch { expected: String, found: String },

    /// A required child element or manifest property is absent.
    #[error("not found: {0}")]
    NotFound(String),

    /// An argument was rejected.
    ///
    /// Covers bad key or IV lengths, duplicate sub-containers and
    /// out-of-range KBAG indices.
    #[error("invalid value: {0}")]
    Value(String),

    /// The crypto backend failed.
    ///
    /// Digest, AES and signature primitives are deterministic, so this is
    /// never worth retrying.
    #[error("crypto error: {0}")]
    Crypto(String),

    /// A compressed payload could not be decoded or encoded.
    #[error("decompression error: {0}")]
    Decompression(String),
}

impl Error {
    pub(crate) fn parse(offset: usize, reason: impl Into<String>) -> Self {
        Error::Parse {
            offset,
            reason: reason.into(),
        }
    }

    pub(crate) fn mismatch(expected: impl Into<String>, found: impl Into<String>) -> Self {
        Error::TypeMismatch {
            expected: expected.into(),
            found: found.into(),
        }
    }
}

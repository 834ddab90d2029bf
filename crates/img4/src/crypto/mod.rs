//! Cryptographic primitives consumed by the payload codec and the manifest
//! validator.
//!
//! Everything here is a thin wrapper over RustCrypto crates; nothing is
//! implemented from scratch.

pub mod cipher;
pub mod digest;
pub mod verify;

pub use cipher::aes_cbc_decrypt;
pub use digest::{sha1, sha384};
pub use verify::{RsaVerifier, SignatureVerifier};

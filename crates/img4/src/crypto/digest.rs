//! Message digests used by manifests

use sha1::{Digest, Sha1};
use sha2::Sha384;

/// SHA-1 digest length in bytes
pub const SHA1_LEN: usize = 20;

/// SHA-384 digest length in bytes
pub const SHA384_LEN: usize = 48;

pub fn sha1(data: &[u8]) -> Vec<u8> {
    Sha1::digest(data).to_vec()
}

pub fn sha384(data: &[u8]) -> Vec<u8> {
    Sha384::digest(data).to_vec()
}

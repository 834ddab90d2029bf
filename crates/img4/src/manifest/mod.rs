//! IM4M manifest validation
//!
//! Property lookup, IM4P digest matching, nonce generator binding and
//! signature verification.

pub mod body;
pub mod digest;
pub mod nonce;
pub mod signature;

pub use body::{
    certificate_chain, get_object_property, get_val_from_im4m, manifest_body,
    manifest_objects, manifest_properties, manifest_signature, manifest_version,
};
pub use digest::{dgst_name_for_hash, get_im4p_sha1, get_im4p_sha384, im4m_contains_hash};
pub use nonce::{is_generator_valid_for_im4m, parse_generator};
pub use signature::{is_im4m_signature_valid, is_im4m_signature_valid_with};

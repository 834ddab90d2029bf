//! IM4P payload codec
//!
//! Decryption, compression detection, the `complzss` and LZFSE codecs, key
//! bag access and payload rewrapping.

pub mod compression;
pub mod extract;
pub mod kbag;
pub mod lzss;
pub mod wrap;

pub use compression::{detect_and_decompress, Compression, Decompressed};
pub use extract::{decrypt_payload, get_payload_from_im4p, ExtractedPayload, PayloadExtractor};
pub use kbag::{build_kbag, get_kbag, im4p_contains_kbag, keybags, KeyBag};
pub use wrap::append_payload_to_im4p;

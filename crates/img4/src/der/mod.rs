//! DER (Distinguished Encoding Rules) engine
//!
//! Parses raw bytes into an owned tree of [`DerElement`]s and re-encodes trees
//! back to bytes. Only the DER subset of BER is supported: definite lengths in
//! their shortest form, minimal tag numbers, and no constructed strings.
//! Anything the reader accepts re-encodes to the identical bytes.

pub mod element;
mod reader;
pub mod tag;
mod writer;

pub use element::{Content, DerElement};
pub use tag::{Tag, TagClass};
pub use writer::{read_be, write_be};

//! DER encoder
//!
//! Serializes a [`DerElement`] tree back to bytes. Lengths always use the
//! shortest form so that `encode(parse(bytes)) == bytes` holds for every
//! buffer the reader accepts.

use super::element::{Content, DerElement};

/// Number of octets `encode_length` emits for `length`.
pub(crate) fn length_len(length: usize) -> usize {
    match length {
        0..=0x7f => 1,
        _ => 1 + significant_bytes(length as u64),
    }
}

/// Append the shortest DER length octets for `length` to `output`.
pub(crate) fn encode_length(output: &mut Vec<u8>, length: usize) {
    let width = length_len(length) - 1;
    if width == 0 {
        output.push(length as u8);
    } else {
        output.push(0x80 | width as u8);
        output.extend(write_be(length as u64, width));
    }
}

/// Minimum number of bytes needed to hold `value` (at least one).
pub(crate) fn significant_bytes(value: u64) -> usize {
    (64 - value.leading_zeros() as usize).div_ceil(8).max(1)
}

/// Read a big-endian unsigned integer of up to eight bytes.
pub fn read_be(bytes: &[u8]) -> u64 {
    bytes.iter().fold(0u64, |acc, b| (acc << 8) | *b as u64)
}

/// Write the low `width` bytes of `value` in big-endian order.
pub fn write_be(value: u64, width: usize) -> Vec<u8> {
    (0..width)
        .rev()
        .map(|i| if i >= 8 { 0 } else { (value >> (i * 8)) as u8 })
        .collect()
}

/// Length of the content octets of `element`.
pub(crate) fn content_len(element: &DerElement) -> usize {
    match element.content() {
        Content::Primitive(bytes) => bytes.len(),
        Content::Constructed(children) => children.iter().map(encoded_len).sum(),
    }
}

/// Total encoded length of `element` including header.
pub(crate) fn encoded_len(element: &DerElement) -> usize {
    let len = content_len(element);
    element.tag().encoded_len() + length_len(len) + len
}

/// Append the DER encoding of `element` to `output`.
pub(crate) fn encode_into(element: &DerElement, output: &mut Vec<u8>) {
    element.tag().encode(element.is_constructed(), output);
    encode_length(output, content_len(element));

    match element.content() {
        Content::Primitive(bytes) => output.extend_from_slice(bytes),
        Content::Constructed(children) => {
            for child in children {
                encode_into(child, output);
            }
        }
    }
}

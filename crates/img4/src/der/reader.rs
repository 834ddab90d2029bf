//! DER decoder
//!
//! Only the definite-length, shortest-form subset of BER is accepted. Every
//! rejected input maps to [`Error::Parse`] carrying the absolute byte offset of
//! the offending octet.

use super::element::{Content, DerElement};
use super::tag::{Tag, TagClass, CONSTRUCTED_BIT, HIGH_TAG_NUMBER};
use super::writer::read_be;
use crate::{Error, Result};

/// Nesting limit for constructed elements.
///
/// IMG4 trees are at most a dozen levels deep; the limit keeps hostile input
/// from exhausting the stack.
const MAX_DEPTH: usize = 64;

/// Cursor over a DER buffer.
pub(crate) struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
    /// Offset of `data[0]` in the outermost buffer, for error reporting.
    base: usize,
    depth: usize,
}

impl<'a> Reader<'a> {
    pub(crate) fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            pos: 0,
            base: 0,
            depth: 0,
        }
    }

    pub(crate) fn position(&self) -> usize {
        self.pos
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.pos >= self.data.len()
    }

    fn offset(&self) -> usize {
        self.base + self.pos
    }

    fn byte(&mut self) -> Result<u8> {
        let b = *self
            .data
            .get(self.pos)
            .ok_or_else(|| Error::parse(self.offset(), "unexpected end of data"))?;
        self.pos += 1;
        Ok(b)
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8]> {
        let remaining = self.data.len() - self.pos;
        if len > remaining {
            return Err(Error::parse(
                self.offset(),
                format!("length {len} exceeds remaining {remaining} bytes"),
            ));
        }
        let slice = &self.data[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    fn read_tag(&mut self) -> Result<(Tag, bool)> {
        let first = self.byte()?;
        let class = TagClass::from_bits(first >> 6);
        let constructed = first & CONSTRUCTED_BIT != 0;

        if first & HIGH_TAG_NUMBER != HIGH_TAG_NUMBER {
            return Ok((Tag::new(class, (first & HIGH_TAG_NUMBER) as u64), constructed));
        }

        let start = self.offset();
        let mut number: u64 = 0;
        loop {
            let octet = self.byte()?;
            if number == 0 && octet == 0x80 {
                return Err(Error::parse(start, "tag number has leading zero octet"));
            }
            if number > (u64::MAX >> 7) {
                return Err(Error::parse(start, "tag number overflows 64 bits"));
            }
            number = (number << 7) | (octet & 0x7f) as u64;
            if octet & 0x80 == 0 {
                break;
            }
        }

        if number < HIGH_TAG_NUMBER as u64 {
            return Err(Error::parse(
                start,
                format!("tag number {number} must use the single-octet form"),
            ));
        }

        Ok((Tag::new(class, number), constructed))
    }

    fn read_length(&mut self) -> Result<usize> {
        let start = self.offset();
        let first = self.byte()?;

        if first < 0x80 {
            return Ok(first as usize);
        }
        if first == 0x80 {
            return Err(Error::parse(start, "indefinite length is not allowed in DER"));
        }
        if first == 0xff {
            return Err(Error::parse(start, "reserved length octet 0xff"));
        }

        let count = (first & 0x7f) as usize;
        if count > std::mem::size_of::<usize>() {
            return Err(Error::parse(start, format!("{count} length octets is too many")));
        }

        let octets = self.take(count)?;
        if octets[0] == 0 {
            return Err(Error::parse(start, "length has leading zero octet"));
        }

        let length = read_be(octets) as usize;
        if length < 0x80 {
            return Err(Error::parse(start, format!("length {length} must use the short form")));
        }

        Ok(length)
    }

    /// Read one complete element at the cursor.
    pub(crate) fn read_element(&mut self) -> Result<DerElement> {
        let start = self.offset();
        let (tag, constructed) = self.read_tag()?;
        let length = self.read_length()?;
        let body_offset = self.offset();
        let body = self.take(length)?;

        if constructed && tag.must_be_primitive() {
            return Err(Error::parse(start, format!("{tag} must be primitive")));
        }
        if !constructed && tag.must_be_constructed() {
            return Err(Error::parse(start, format!("{tag} must be constructed")));
        }

        if !constructed {
            return Ok(DerElement::new(tag, Content::Primitive(body.to_vec())));
        }

        if self.depth + 1 > MAX_DEPTH {
            return Err(Error::parse(start, "nesting too deep"));
        }

        let mut inner = Reader {
            data: body,
            pos: 0,
            base: body_offset,
            depth: self.depth + 1,
        };
        let mut children = Vec::new();
        while !inner.is_empty() {
            children.push(inner.read_element()?);
        }

        Ok(DerElement::new(tag, Content::Constructed(children)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_err(data: &[u8]) -> Error {
        Reader::new(data).read_element().unwrap_err()
    }

    #[test]
    fn test_reject_indefinite_length() {
        let err = parse_err(&[0x30, 0x80, 0x00, 0x00]);
        assert!(matches!(err, Error::Parse { offset: 1, .. }));
    }

    #[test]
    fn test_reject_non_minimal_length() {
        assert!(matches!(parse_err(&[0x04, 0x81, 0x01, 0xaa]), Error::Parse { .. }));
        assert!(matches!(
            parse_err(&[0x04, 0x82, 0x00, 0x81, 0xaa]),
            Error::Parse { .. }
        ));
    }

    #[test]
    fn test_reject_truncated() {
        assert!(matches!(parse_err(&[0x04, 0x05, 0x01, 0x02]), Error::Parse { .. }));
        assert!(matches!(parse_err(&[0x04]), Error::Parse { .. }));
        assert!(matches!(parse_err(&[]), Error::Parse { offset: 0, .. }));
    }

    #[test]
    fn test_reject_child_overrunning_parent() {
        // SEQUENCE of length 3 containing an OCTET STRING claiming 4 bytes
        let err = parse_err(&[0x30, 0x03, 0x04, 0x04, 0x00]);
        assert!(matches!(err, Error::Parse { offset: 4, .. }));
    }

    #[test]
    fn test_reject_primitive_sequence() {
        assert!(matches!(parse_err(&[0x10, 0x00]), Error::Parse { .. }));
        assert!(matches!(parse_err(&[0x24, 0x00]), Error::Parse { .. }));
    }

    #[test]
    fn test_reject_non_minimal_high_tag() {
        assert!(matches!(parse_err(&[0x9f, 0x05, 0x00]), Error::Parse { .. }));
        assert!(matches!(parse_err(&[0x9f, 0x80, 0x20, 0x00]), Error::Parse { .. }));
    }

    #[test]
    fn test_reads_high_tag() {
        let mut reader = Reader::new(&[0xdf, 0x84, 0x92, 0xb9, 0x86, 0x4e, 0x01, 0x07]);
        let element = reader.read_element().unwrap();
        assert_eq!(element.tag(), Tag::private(0x424e_434e));
        assert_eq!(element.payload().unwrap(), &[0x07]);
        assert!(reader.is_empty());
    }

    #[test]
    fn test_reject_excessive_nesting() {
        // built from the inside out so every level is well formed
        let mut encoded = vec![0x05, 0x00];
        for _ in 0..(MAX_DEPTH + 2) {
            let mut outer = vec![0x30];
            crate::der::writer::encode_length(&mut outer, encoded.len());
            outer.extend(encoded);
            encoded = outer;
        }
        assert!(matches!(parse_err(&encoded), Error::Parse { .. }));
    }
}

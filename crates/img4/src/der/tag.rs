//! ASN.1 tag identifiers
//!
//! A DER identifier octet packs three fields:
//!
//! ```text
//!   8   7   6   5   4   3   2   1
//! ┌───────┬───┬───────────────────┐
//! │ class │ C │ number (0..=30)   │   number 31 = high-tag-number form,
//! └───────┴───┴───────────────────┘   base-128 octets follow
//! ```
//!
//! The constructed bit (C) is not stored on [`Tag`]; it is derived from the
//! element content so the two can never disagree.

use std::fmt;

/// Universal tag number for BOOLEAN
pub const TAG_BOOLEAN: u64 = 0x01;

/// Universal tag number for INTEGER
pub const TAG_INTEGER: u64 = 0x02;

/// Universal tag number for BIT STRING
pub const TAG_BIT_STRING: u64 = 0x03;

/// Universal tag number for OCTET STRING
pub const TAG_OCTET_STRING: u64 = 0x04;

/// Universal tag number for NULL
pub const TAG_NULL: u64 = 0x05;

/// Universal tag number for OBJECT IDENTIFIER
pub const TAG_OID: u64 = 0x06;

/// Universal tag number for UTF8String
pub const TAG_UTF8_STRING: u64 = 0x0c;

/// Universal tag number for SEQUENCE
pub const TAG_SEQUENCE: u64 = 0x10;

/// Universal tag number for SET
pub const TAG_SET: u64 = 0x11;

/// Universal tag number for PrintableString
pub const TAG_PRINTABLE_STRING: u64 = 0x13;

/// Universal tag number for IA5String
pub const TAG_IA5_STRING: u64 = 0x16;

/// Universal tag number for UTCTime
pub const TAG_UTC_TIME: u64 = 0x17;

/// Universal tag number for GeneralizedTime
pub const TAG_GENERALIZED_TIME: u64 = 0x18;

/// Identifier octet value that switches to the high-tag-number form.
pub(crate) const HIGH_TAG_NUMBER: u8 = 0x1f;

/// Constructed bit of the identifier octet.
pub(crate) const CONSTRUCTED_BIT: u8 = 0x20;

/// The four ASN.1 tag classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TagClass {
    Universal,
    Application,
    ContextSpecific,
    Private,
}

impl TagClass {
    pub(crate) fn from_bits(bits: u8) -> Self {
        match bits & 0x03 {
            0 => TagClass::Universal,
            1 => TagClass::Application,
            2 => TagClass::ContextSpecific,
            _ => TagClass::Private,
        }
    }

    pub(crate) fn bits(self) -> u8 {
        match self {
            TagClass::Universal => 0,
            TagClass::Application => 1,
            TagClass::ContextSpecific => 2,
            TagClass::Private => 3,
        }
    }
}

/// Tag class plus tag number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Tag {
    pub class: TagClass,
    pub number: u64,
}

impl Tag {
    pub const BOOLEAN: Tag = Tag::universal(TAG_BOOLEAN);
    pub const INTEGER: Tag = Tag::universal(TAG_INTEGER);
    pub const BIT_STRING: Tag = Tag::universal(TAG_BIT_STRING);
    pub const OCTET_STRING: Tag = Tag::universal(TAG_OCTET_STRING);
    pub const NULL: Tag = Tag::universal(TAG_NULL);
    pub const OID: Tag = Tag::universal(TAG_OID);
    pub const UTF8_STRING: Tag = Tag::universal(TAG_UTF8_STRING);
    pub const SEQUENCE: Tag = Tag::universal(TAG_SEQUENCE);
    pub const SET: Tag = Tag::universal(TAG_SET);
    pub const PRINTABLE_STRING: Tag = Tag::universal(TAG_PRINTABLE_STRING);
    pub const IA5_STRING: Tag = Tag::universal(TAG_IA5_STRING);
    pub const UTC_TIME: Tag = Tag::universal(TAG_UTC_TIME);
    pub const GENERALIZED_TIME: Tag = Tag::universal(TAG_GENERALIZED_TIME);

    pub const fn new(class: TagClass, number: u64) -> Self {
        Self { class, number }
    }

    pub const fn universal(number: u64) -> Self {
        Self::new(TagClass::Universal, number)
    }

    pub const fn application(number: u64) -> Self {
        Self::new(TagClass::Application, number)
    }

    pub const fn context(number: u64) -> Self {
        Self::new(TagClass::ContextSpecific, number)
    }

    pub const fn private(number: u64) -> Self {
        Self::new(TagClass::Private, number)
    }

    /// Universal types DER only allows in primitive form.
    pub(crate) fn must_be_primitive(&self) -> bool {
        self.class == TagClass::Universal
            && matches!(
                self.number,
                TAG_BOOLEAN
                    | TAG_INTEGER
                    | TAG_BIT_STRING
                    | TAG_OCTET_STRING
                    | TAG_NULL
                    | TAG_OID
                    | TAG_UTF8_STRING
                    | TAG_PRINTABLE_STRING
                    | TAG_IA5_STRING
                    | TAG_UTC_TIME
                    | TAG_GENERALIZED_TIME
            )
    }

    /// Universal types DER only allows in constructed form.
    pub(crate) fn must_be_constructed(&self) -> bool {
        self.class == TagClass::Universal && matches!(self.number, TAG_SEQUENCE | TAG_SET)
    }

    /// Number of identifier octets this tag occupies.
    pub(crate) fn encoded_len(&self) -> usize {
        if self.number < HIGH_TAG_NUMBER as u64 {
            1
        } else {
            let bits = 64 - self.number.leading_zeros() as usize;
            1 + bits.div_ceil(7)
        }
    }

    /// Append the identifier octets to `output`.
    pub(crate) fn encode(&self, constructed: bool, output: &mut Vec<u8>) {
        let mut first = self.class.bits() << 6;
        if constructed {
            first |= CONSTRUCTED_BIT;
        }

        if self.number < HIGH_TAG_NUMBER as u64 {
            output.push(first | self.number as u8);
            return;
        }

        output.push(first | HIGH_TAG_NUMBER);
        let groups = self.encoded_len() - 1;
        for i in (0..groups).rev() {
            let mut octet = ((self.number >> (i * 7)) & 0x7f) as u8;
            if i != 0 {
                octet |= 0x80;
            }
            output.push(octet);
        }
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.class {
            TagClass::Universal => match self.number {
                TAG_BOOLEAN => f.write_str("BOOLEAN"),
                TAG_INTEGER => f.write_str("INTEGER"),
                TAG_BIT_STRING => f.write_str("BIT STRING"),
                TAG_OCTET_STRING => f.write_str("OCTET STRING"),
                TAG_NULL => f.write_str("NULL"),
                TAG_OID => f.write_str("OBJECT IDENTIFIER"),
                TAG_UTF8_STRING => f.write_str("UTF8String"),
                TAG_SEQUENCE => f.write_str("SEQUENCE"),
                TAG_SET => f.write_str("SET"),
                TAG_PRINTABLE_STRING => f.write_str("PrintableString"),
                TAG_IA5_STRING => f.write_str("IA5String"),
                TAG_UTC_TIME => f.write_str("UTCTime"),
                TAG_GENERALIZED_TIME => f.write_str("GeneralizedTime"),
                n => write!(f, "[UNIVERSAL {n}]"),
            },
            TagClass::Application => write!(f, "[APPLICATION {}]", self.number),
            TagClass::ContextSpecific => write!(f, "[{}]", self.number),
            TagClass::Private => {
                let bytes = (self.number as u32).to_be_bytes();
                if self.number <= u32::MAX as u64 && bytes.iter().all(u8::is_ascii_graphic) {
                    write!(f, "[PRIVATE '{}']", String::from_utf8_lossy(&bytes))
                } else {
                    write!(f, "[PRIVATE {}]", self.number)
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_low_tag() {
        let mut buf = Vec::new();
        Tag::SEQUENCE.encode(true, &mut buf);
        assert_eq!(buf, vec![0x30]);

        buf.clear();
        Tag::context(1).encode(true, &mut buf);
        assert_eq!(buf, vec![0xa1]);
    }

    #[test]
    fn test_encode_high_tag_fourcc() {
        // 'BNCN' = 0x424e434e, private constructed
        let mut buf = Vec::new();
        Tag::private(0x424e_434e).encode(true, &mut buf);
        assert_eq!(buf, vec![0xff, 0x84, 0x92, 0xb9, 0x86, 0x4e]);
        assert_eq!(Tag::private(0x424e_434e).encoded_len(), 6);
    }

    #[test]
    fn test_encode_tag_31_uses_high_form() {
        let mut buf = Vec::new();
        Tag::context(31).encode(false, &mut buf);
        assert_eq!(buf, vec![0x9f, 0x1f]);
    }

    #[test]
    fn test_display() {
        assert_eq!(Tag::IA5_STRING.to_string(), "IA5String");
        assert_eq!(Tag::context(0).to_string(), "[0]");
        assert_eq!(Tag::private(0x4d41_4e42).to_string(), "[PRIVATE 'MANB']");
    }
}

//! DER element tree
//!
//! A [`DerElement`] is a tag plus either primitive content octets or an
//! ordered list of child elements. Each element owns its data outright;
//! nothing in the tree borrows from the buffer it was parsed from.

use super::reader::Reader;
use super::tag::Tag;
use super::writer;
use crate::{Error, Result};

/// Content of a DER element.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Content {
    /// Raw content octets of a primitive element.
    Primitive(Vec<u8>),
    /// Ordered children of a constructed element.
    Constructed(Vec<DerElement>),
}

/// A parsed or built DER element.
///
/// # Example
///
/// ```
/// use img4::der::{DerElement, Tag};
///
/// let seq = DerElement::sequence(vec![
///     DerElement::ia5_string("IM4R"),
///     DerElement::set(vec![]),
/// ]);
/// let bytes = seq.encode();
/// let parsed = DerElement::parse(&bytes)?;
/// assert_eq!(parsed, seq);
/// assert_eq!(parsed.child(0)?.as_str()?, "IM4R");
/// assert!(parsed.contains_path(&[Tag::SET]));
/// # Ok::<(), img4::Error>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DerElement {
    tag: Tag,
    content: Content,
}

impl DerElement {
    /// Build an element from a tag and its content.
    pub fn new(tag: Tag, content: Content) -> Self {
        Self { tag, content }
    }

    pub fn primitive(tag: Tag, bytes: impl Into<Vec<u8>>) -> Self {
        Self::new(tag, Content::Primitive(bytes.into()))
    }

    pub fn constructed(tag: Tag, children: Vec<DerElement>) -> Self {
        Self::new(tag, Content::Constructed(children))
    }

    pub fn sequence(children: Vec<DerElement>) -> Self {
        Self::constructed(Tag::SEQUENCE, children)
    }

    pub fn set(children: Vec<DerElement>) -> Self {
        Self::constructed(Tag::SET, children)
    }

    pub fn ia5_string(value: &str) -> Self {
        Self::primitive(Tag::IA5_STRING, value.as_bytes())
    }

    pub fn octet_string(bytes: impl Into<Vec<u8>>) -> Self {
        Self::primitive(Tag::OCTET_STRING, bytes)
    }

    /// Build a non-negative INTEGER.
    ///
    /// A leading zero octet is added when the most significant bit of the
    /// value is set, so the result never reads back as negative.
    pub fn integer(value: u64) -> Self {
        let bytes_needed = writer::significant_bytes(value);
        let mut bytes = writer::write_be(value, bytes_needed);
        if bytes[0] & 0x80 != 0 {
            bytes.insert(0, 0x00);
        }
        Self::primitive(Tag::INTEGER, bytes)
    }

    /// Wrap `inner` in an explicit context-specific tag `[number]`.
    pub fn explicit(number: u64, inner: DerElement) -> Self {
        Self::constructed(Tag::context(number), vec![inner])
    }

    /// Wrap `inner` in a private-class constructed tag.
    pub fn private(number: u64, inner: DerElement) -> Self {
        Self::constructed(Tag::private(number), vec![inner])
    }

    /// Parse a buffer holding exactly one DER element.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Parse`] for malformed input or trailing bytes.
    pub fn parse(data: &[u8]) -> Result<Self> {
        let (element, consumed) = Self::parse_prefix(data)?;
        if consumed != data.len() {
            return Err(Error::parse(
                consumed,
                format!("{} trailing bytes after element", data.len() - consumed),
            ));
        }
        Ok(element)
    }

    /// Parse the first DER element of `data`, returning it together with the
    /// number of bytes it occupied.
    pub fn parse_prefix(data: &[u8]) -> Result<(Self, usize)> {
        let mut reader = Reader::new(data);
        let element = reader.read_element()?;
        Ok((element, reader.position()))
    }

    pub fn tag(&self) -> Tag {
        self.tag
    }

    pub fn content(&self) -> &Content {
        &self.content
    }

    pub fn is_constructed(&self) -> bool {
        matches!(self.content, Content::Constructed(_))
    }

    /// Content octets of a primitive element.
    pub fn payload(&self) -> Result<&[u8]> {
        match &self.content {
            Content::Primitive(bytes) => Ok(bytes),
            Content::Constructed(_) => Err(Error::mismatch(
                "primitive element",
                format!("constructed {}", self.tag),
            )),
        }
    }

    /// Children of a constructed element.
    pub fn children(&self) -> Result<&[DerElement]> {
        match &self.content {
            Content::Constructed(children) => Ok(children),
            Content::Primitive(_) => Err(Error::mismatch(
                "constructed element",
                format!("primitive {}", self.tag),
            )),
        }
    }

    pub fn child(&self, index: usize) -> Result<&DerElement> {
        let children = self.children()?;
        children.get(index).ok_or_else(|| {
            Error::NotFound(format!(
                "child {index} of {} with {} children",
                self.tag,
                children.len()
            ))
        })
    }

    /// Consume a constructed element, returning its children.
    pub fn into_children(self) -> Result<Vec<DerElement>> {
        match self.content {
            Content::Constructed(children) => Ok(children),
            Content::Primitive(_) => Err(Error::mismatch(
                "constructed element",
                format!("primitive {}", self.tag),
            )),
        }
    }

    /// Text of an IA5String, UTF8String or PrintableString.
    pub fn as_str(&self) -> Result<&str> {
        if self.tag != Tag::IA5_STRING
            && self.tag != Tag::UTF8_STRING
            && self.tag != Tag::PRINTABLE_STRING
        {
            return Err(Error::mismatch("string", self.tag.to_string()));
        }
        std::str::from_utf8(self.payload()?)
            .map_err(|e| Error::mismatch("valid string", format!("invalid UTF-8: {e}")))
    }

    /// Value of a non-negative INTEGER that fits in 64 bits.
    pub fn as_u64(&self) -> Result<u64> {
        if self.tag != Tag::INTEGER {
            return Err(Error::mismatch("INTEGER", self.tag.to_string()));
        }
        let bytes = self.payload()?;
        match bytes {
            [] => Err(Error::Value("empty INTEGER".into())),
            [first, ..] if first & 0x80 != 0 => Err(Error::Value("negative INTEGER".into())),
            [0, rest @ ..] if rest.len() <= 8 => Ok(writer::read_be(rest)),
            _ if bytes.len() <= 8 => Ok(writer::read_be(bytes)),
            _ => Err(Error::Value(format!("{}-byte INTEGER exceeds 64 bits", bytes.len()))),
        }
    }

    /// Encode this element to DER.
    pub fn encode(&self) -> Vec<u8> {
        let mut output = Vec::with_capacity(self.encoded_len());
        writer::encode_into(self, &mut output);
        output
    }

    /// Size of [`encode`](Self::encode) output without encoding.
    pub fn encoded_len(&self) -> usize {
        writer::encoded_len(self)
    }

    /// Whether a chain of descendants with the given tags exists.
    ///
    /// `path[0]` is matched against direct children, `path[1]` against their
    /// children, and so on. An empty path always matches.
    pub fn contains_path(&self, path: &[Tag]) -> bool {
        let Some((first, rest)) = path.split_first() else {
            return true;
        };
        match &self.content {
            Content::Primitive(_) => false,
            Content::Constructed(children) => children
                .iter()
                .any(|child| child.tag == *first && child.contains_path(rest)),
        }
    }
}

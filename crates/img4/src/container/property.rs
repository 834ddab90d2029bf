//! FourCC-keyed property entries
//!
//! IM4M and IM4R store their properties as
//! `[PRIVATE fourcc] SEQUENCE { IA5String fourcc, value }` inside a SET.

use super::fourcc::FourCc;
use crate::der::{DerElement, Tag, TagClass};
use crate::{Error, Result};

/// Build a property entry for `fourcc` holding `value`.
pub fn property_entry(fourcc: FourCc, value: DerElement) -> DerElement {
    DerElement::private(
        fourcc.as_u32() as u64,
        DerElement::sequence(vec![
            DerElement::primitive(Tag::IA5_STRING, fourcc.as_bytes().to_vec()),
            value,
        ]),
    )
}

/// Split a property entry into its key and value.
pub fn parse_property(entry: &DerElement) -> Result<(FourCc, &DerElement)> {
    if entry.tag().class != TagClass::Private {
        return Err(Error::mismatch("private-tagged property", entry.tag().to_string()));
    }
    let inner = entry.child(0)?;
    if inner.tag() != Tag::SEQUENCE {
        return Err(Error::mismatch("property SEQUENCE", inner.tag().to_string()));
    }
    let key = FourCc::try_from(inner.child(0)?.payload()?)?;
    if key.as_u32() as u64 != entry.tag().number {
        tracing::debug!(%key, tag = entry.tag().number, "property key disagrees with its tag");
    }
    Ok((key, inner.child(1)?))
}

/// Find the value of `fourcc` in a property SET.
///
/// Returns `Ok(None)` when the set is well formed but lacks the key.
pub fn find_property(set: &DerElement, fourcc: FourCc) -> Result<Option<&DerElement>> {
    for entry in set.children()? {
        let (key, value) = parse_property(entry)?;
        if key == fourcc {
            return Ok(Some(value));
        }
    }
    Ok(None)
}

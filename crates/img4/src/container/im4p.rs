//! IM4P header fields
//!
//! ```text
//! IM4P ::= SEQUENCE {
//!     magic       IA5String ("IM4P"),
//!     type        IA5String,        -- FourCC, e.g. "krnl"
//!     description IA5String,
//!     payload     OCTET STRING      OPTIONAL,
//!     kbag        OCTET STRING      OPTIONAL,
//!     compression SEQUENCE          OPTIONAL
//! }
//! ```

use super::fourcc::FourCc;
use super::kind::{require, ContainerKind};
use crate::der::{DerElement, Tag};
use crate::{Error, Result};

pub(crate) const TYPE_INDEX: usize = 1;
pub(crate) const DESC_INDEX: usize = 2;
pub(crate) const PAYLOAD_INDEX: usize = 3;

/// Build an IM4P with a type and description but no payload.
pub fn get_empty_im4p_container(im4p_type: FourCc, desc: &str) -> DerElement {
    DerElement::sequence(vec![
        DerElement::ia5_string(ContainerKind::Im4p.magic()),
        DerElement::primitive(Tag::IA5_STRING, im4p_type.as_bytes().to_vec()),
        DerElement::ia5_string(desc),
    ])
}

/// Type code of an IM4P.
pub fn get_type_from_im4p(im4p: &DerElement) -> Result<FourCc> {
    require(im4p, ContainerKind::Im4p)?;
    FourCc::try_from(im4p.child(TYPE_INDEX)?.payload()?)
}

/// Free-text description of an IM4P.
pub fn get_desc_from_im4p(im4p: &DerElement) -> Result<String> {
    require(im4p, ContainerKind::Im4p)?;
    Ok(im4p.child(DESC_INDEX)?.as_str()?.to_owned())
}

/// Return a copy of `im4p` with its type code replaced.
pub fn rename_im4p(im4p: &DerElement, im4p_type: FourCc) -> Result<DerElement> {
    require(im4p, ContainerKind::Im4p)?;
    let mut children = im4p.children()?.to_vec();
    let slot = children
        .get_mut(TYPE_INDEX)
        .ok_or_else(|| Error::NotFound("IM4P type".into()))?;
    *slot = DerElement::primitive(Tag::IA5_STRING, im4p_type.as_bytes().to_vec());
    Ok(DerElement::constructed(im4p.tag(), children))
}

/// The payload OCTET STRING, if the IM4P has one.
pub(crate) fn payload_element(im4p: &DerElement) -> Result<Option<&DerElement>> {
    require(im4p, ContainerKind::Im4p)?;
    match im4p.children()?.get(PAYLOAD_INDEX) {
        Some(element) if element.tag() == Tag::OCTET_STRING => Ok(Some(element)),
        Some(element) => Err(Error::mismatch("IM4P payload OCTET STRING", element.tag().to_string())),
        None => Ok(None),
    }
}

//! IM4M structure
//!
//! ```text
//! IM4M ::= SEQUENCE {
//!     magic     IA5String ("IM4M"),
//!     version   INTEGER,
//!     body      SET { [PRIVATE MANB] property },
//!     signature OCTET STRING,
//!     certs     SEQUENCE OF Certificate
//! }
//!
//! MANB value ::= SET {
//!     [PRIVATE MANP] property,         -- manifest-wide properties
//!     [PRIVATE fourcc] property ...    -- one per signed object
//! }
//! ```
//!
//! Each object property holds a SET of its own properties, among them the
//! `DGST` digest of the IM4P it authorizes.

use crate::container::kind::{require, ContainerKind};
use crate::container::property::{find_property, parse_property};
use crate::container::FourCc;
use crate::der::{DerElement, Tag};
use crate::{Error, Result};

const VERSION_INDEX: usize = 1;
const BODY_INDEX: usize = 2;
const SIGNATURE_INDEX: usize = 3;
const CHAIN_INDEX: usize = 4;

fn expect_tag<'a>(element: &'a DerElement, tag: Tag, what: &str) -> Result<&'a DerElement> {
    if element.tag() == tag {
        Ok(element)
    } else {
        Err(Error::mismatch(format!("{what} {tag}"), element.tag().to_string()))
    }
}

/// Manifest format version.
pub fn manifest_version(im4m: &DerElement) -> Result<u64> {
    require(im4m, ContainerKind::Im4m)?;
    im4m.child(VERSION_INDEX)?.as_u64()
}

/// The signed body SET.
pub fn manifest_body(im4m: &DerElement) -> Result<&DerElement> {
    require(im4m, ContainerKind::Im4m)?;
    expect_tag(im4m.child(BODY_INDEX)?, Tag::SET, "IM4M body")
}

/// Raw signature bytes.
pub fn manifest_signature(im4m: &DerElement) -> Result<&[u8]> {
    require(im4m, ContainerKind::Im4m)?;
    expect_tag(im4m.child(SIGNATURE_INDEX)?, Tag::OCTET_STRING, "IM4M signature")?.payload()
}

/// DER encodings of the embedded certificates, in manifest order.
pub fn certificate_chain(im4m: &DerElement) -> Result<Vec<Vec<u8>>> {
    require(im4m, ContainerKind::Im4m)?;
    let chain = expect_tag(im4m.child(CHAIN_INDEX)?, Tag::SEQUENCE, "IM4M certificate chain")?;
    Ok(chain.children()?.iter().map(DerElement::encode).collect())
}

/// The SET held by the `MANB` property.
fn manb(im4m: &DerElement) -> Result<&DerElement> {
    let body = manifest_body(im4m)?;
    let manb = find_property(body, FourCc::MANB)?
        .ok_or_else(|| Error::NotFound("MANB in IM4M".into()))?;
    expect_tag(manb, Tag::SET, "MANB")
}

/// The SET of manifest-wide `MANP` properties.
pub fn manifest_properties(im4m: &DerElement) -> Result<&DerElement> {
    let manp = find_property(manb(im4m)?, FourCc::MANP)?
        .ok_or_else(|| Error::NotFound("MANP in IM4M".into()))?;
    expect_tag(manp, Tag::SET, "MANP")
}

/// Every signed object of the manifest with its property SET.
pub fn manifest_objects(im4m: &DerElement) -> Result<Vec<(FourCc, &DerElement)>> {
    let mut objects = Vec::new();
    for entry in manb(im4m)?.children()? {
        let (name, value) = parse_property(entry)?;
        if name == FourCc::MANP {
            continue;
        }
        objects.push((name, expect_tag(value, Tag::SET, "manifest object")?));
    }
    Ok(objects)
}

/// Value of the `MANP` property `fourcc`.
///
/// # Errors
///
/// - [`Error::TypeMismatch`] if `im4m` is not an IM4M
/// - [`Error::NotFound`] if the property is absent
pub fn get_val_from_im4m(im4m: &DerElement, fourcc: FourCc) -> Result<DerElement> {
    find_property(manifest_properties(im4m)?, fourcc)?
        .cloned()
        .ok_or_else(|| Error::NotFound(format!("{fourcc} in IM4M properties")))
}

/// Value of property `fourcc` of the signed object `object`.
pub fn get_object_property(im4m: &DerElement, object: FourCc, fourcc: FourCc) -> Result<DerElement> {
    let (_, properties) = manifest_objects(im4m)?
        .into_iter()
        .find(|(name, _)| *name == object)
        .ok_or_else(|| Error::NotFound(format!("object {object} in IM4M")))?;
    find_property(properties, fourcc)?
        .cloned()
        .ok_or_else(|| Error::NotFound(format!("{fourcc} of object {object}")))
}

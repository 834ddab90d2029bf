//! IM4R restore info
//!
//! ```text
//! IM4R ::= SEQUENCE {
//!     magic IA5String ("IM4R"),
//!     props SET OF [PRIVATE fourcc] SEQUENCE { IA5String, OCTET STRING }
//! }
//! ```
//!
//! The `BNCN` property carries the 8-byte big-endian nonce generator.

use super::fourcc::FourCc;
use super::kind::{require, ContainerKind};
use super::property::{find_property, property_entry};
use crate::der::{read_be, DerElement, Tag};
use crate::{Error, Result};
use std::collections::BTreeMap;

/// Build an IM4R holding arbitrary byte-valued properties.
pub fn get_im4r_with_elements(elements: &BTreeMap<FourCc, Vec<u8>>) -> DerElement {
    let props = elements
        .iter()
        .map(|(key, value)| property_entry(*key, DerElement::octet_string(value.clone())))
        .collect();

    DerElement::sequence(vec![
        DerElement::ia5_string(ContainerKind::Im4r.magic()),
        DerElement::set(props),
    ])
}

/// Build an IM4R whose `BNCN` holds `generator`.
pub fn get_im4r_from_generator(generator: u64) -> DerElement {
    let mut elements = BTreeMap::new();
    elements.insert(FourCc::BNCN, generator.to_be_bytes().to_vec());
    get_im4r_with_elements(&elements)
}

/// Extract the `BNCN` OCTET STRING from an IM4R.
///
/// # Errors
///
/// - [`Error::TypeMismatch`] if `im4r` is not an IM4R
/// - [`Error::NotFound`] if it has no `BNCN`
pub fn get_bncn_from_im4r(im4r: &DerElement) -> Result<DerElement> {
    require(im4r, ContainerKind::Im4r)?;
    let props = im4r.child(1)?;
    if props.tag() != Tag::SET {
        return Err(Error::mismatch("IM4R property SET", props.tag().to_string()));
    }
    find_property(props, FourCc::BNCN)?
        .cloned()
        .ok_or_else(|| Error::NotFound("BNCN in IM4R".into()))
}

/// Decode the generator held by an IM4R.
pub fn generator_from_im4r(im4r: &DerElement) -> Result<u64> {
    let bncn = get_bncn_from_im4r(im4r)?;
    let bytes = bncn.payload()?;
    if bytes.len() != 8 {
        return Err(Error::Value(format!("BNCN is {} bytes, expected 8", bytes.len())));
    }
    Ok(read_be(bytes))
}

/// Wrap `payload` in a private-class tag numbered `number`.
pub fn gen_priv_tag_for_number_with_payload(number: u64, payload: &DerElement) -> DerElement {
    DerElement::private(number, payload.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::kind::is_im4r;
    use crate::der::TagClass;

    #[test]
    fn test_generator_round_trip() {
        for generator in [0u64, 0x1111_1111_1111_1111, u64::MAX] {
            let im4r = get_im4r_from_generator(generator);
            assert!(is_im4r(&im4r));

            let bncn = get_bncn_from_im4r(&im4r).unwrap();
            assert_eq!(bncn.tag(), Tag::OCTET_STRING);
            assert_eq!(bncn.payload().unwrap(), generator.to_be_bytes());
            assert_eq!(generator_from_im4r(&im4r).unwrap(), generator);

            let reparsed = DerElement::parse(&im4r.encode()).unwrap();
            assert_eq!(generator_from_im4r(&reparsed).unwrap(), generator);
        }
    }

    #[test]
    fn test_missing_bncn() {
        let im4r = get_im4r_with_elements(&BTreeMap::new());
        assert!(matches!(get_bncn_from_im4r(&im4r), Err(Error::NotFound(_))));
    }

    #[test]
    fn test_with_elements() {
        let mut elements = BTreeMap::new();
        elements.insert(FourCc(*b"snon"), vec![0xaa; 20]);
        elements.insert(FourCc::BNCN, vec![0; 8]);
        let im4r = get_im4r_with_elements(&elements);

        let props = im4r.child(1).unwrap();
        assert_eq!(props.children().unwrap().len(), 2);
        let snon = find_property(props, FourCc(*b"snon")).unwrap().unwrap();
        assert_eq!(snon.payload().unwrap(), &[0xaa; 20]);
    }

    #[test]
    fn test_priv_tag() {
        let payload = DerElement::octet_string(vec![1, 2]);
        let wrapped = gen_priv_tag_for_number_with_payload(0x494d_3443, &payload);
        assert_eq!(wrapped.tag().class, TagClass::Private);
        assert_eq!(wrapped.tag().number, 0x494d_3443);
        assert_eq!(wrapped.child(0).unwrap(), &payload);
        assert_eq!(DerElement::parse(&wrapped.encode()).unwrap(), wrapped);
    }
}

//! IM4P key bags
//!
//! ```text
//! KBAG ::= OCTET STRING containing
//!     SEQUENCE OF SEQUENCE {
//!         kind INTEGER,      -- 1 = production, 2 = development
//!         iv   OCTET STRING,
//!         key  OCTET STRING
//!     }
//! ```
//!
//! Key bags are themselves encrypted with a device-specific key; this module
//! only exposes them.

use crate::container::im4p::PAYLOAD_INDEX;
use crate::container::kind::{require, ContainerKind};
use crate::der::{DerElement, Tag};
use crate::{Error, Result};

/// Index of the KBAG element within an IM4P.
pub(crate) const KBAG_INDEX: usize = PAYLOAD_INDEX + 1;

/// One wrapped IV/key pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyBag {
    pub kind: u64,
    pub iv: Vec<u8>,
    pub key: Vec<u8>,
}

impl KeyBag {
    /// `hex(iv) || hex(key)`, the form key tools print.
    pub fn to_hex(&self) -> String {
        format!("{}{}", hex::encode(&self.iv), hex::encode(&self.key))
    }

    fn from_element(element: &DerElement) -> Result<Self> {
        if element.tag() != Tag::SEQUENCE {
            return Err(Error::mismatch("KBAG entry SEQUENCE", element.tag().to_string()));
        }
        Ok(Self {
            kind: element.child(0)?.as_u64()?,
            iv: element.child(1)?.payload()?.to_vec(),
            key: element.child(2)?.payload()?.to_vec(),
        })
    }

    fn to_element(&self) -> DerElement {
        DerElement::sequence(vec![
            DerElement::integer(self.kind),
            DerElement::octet_string(self.iv.clone()),
            DerElement::octet_string(self.key.clone()),
        ])
    }
}

/// The KBAG OCTET STRING of an IM4P, if present.
pub(crate) fn kbag_element(im4p: &DerElement) -> Result<Option<&DerElement>> {
    require(im4p, ContainerKind::Im4p)?;
    Ok(im4p
        .children()?
        .get(KBAG_INDEX)
        .filter(|element| element.tag() == Tag::OCTET_STRING))
}

/// Whether the IM4P carries a KBAG.
pub fn im4p_contains_kbag(im4p: &DerElement) -> Result<bool> {
    Ok(kbag_element(im4p)?.is_some())
}

/// Decode every key bag of an IM4P. Empty when there is no KBAG.
pub fn keybags(im4p: &DerElement) -> Result<Vec<KeyBag>> {
    let Some(kbag) = kbag_element(im4p)? else {
        return Ok(Vec::new());
    };
    let list = DerElement::parse(kbag.payload()?)?;
    if list.tag() != Tag::SEQUENCE {
        return Err(Error::mismatch("KBAG SEQUENCE", list.tag().to_string()));
    }
    list.children()?.iter().map(KeyBag::from_element).collect()
}

/// Key bag `n` as `hex(iv) || hex(key)`.
///
/// # Errors
///
/// Returns [`Error::Value`] if the IM4P has no KBAG or fewer than `n + 1`
/// entries.
pub fn get_kbag(im4p: &DerElement, n: usize) -> Result<String> {
    if !im4p_contains_kbag(im4p)? {
        return Err(Error::Value("IM4P has no KBAG".into()));
    }
    let bags = keybags(im4p)?;
    bags.get(n)
        .map(KeyBag::to_hex)
        .ok_or_else(|| Error::Value(format!("KBAG index {n} out of range ({} entries)", bags.len())))
}

/// Build the KBAG OCTET STRING for `bags`.
pub fn build_kbag(bags: &[KeyBag]) -> DerElement {
    let list = DerElement::sequence(bags.iter().map(KeyBag::to_element).collect());
    DerElement::octet_string(list.encode())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::{get_empty_im4p_container, FourCc};

    fn im4p_with_kbag(bags: &[KeyBag]) -> DerElement {
        let mut children = get_empty_im4p_container(FourCc(*b"ibot"), "iBoot")
            .into_children()
            .unwrap();
        children.push(DerElement::octet_string(vec![0u8; 32]));
        children.push(build_kbag(bags));
        DerElement::sequence(children)
    }

    fn bags() -> Vec<KeyBag> {
        vec![
            KeyBag {
                kind: 1,
                iv: vec![0x11; 16],
                key: vec![0x22; 32],
            },
            KeyBag {
                kind: 2,
                iv: vec![0x33; 16],
                key: vec![0x44; 32],
            },
        ]
    }

    #[test]
    fn test_no_kbag() {
        let im4p = get_empty_im4p_container(FourCc(*b"ibot"), "iBoot");
        assert!(!im4p_contains_kbag(&im4p).unwrap());
        assert!(keybags(&im4p).unwrap().is_empty());
        assert!(matches!(get_kbag(&im4p, 0), Err(Error::Value(_))));
    }

    #[test]
    fn test_two_keybags() {
        let im4p = im4p_with_kbag(&bags());
        assert!(im4p_contains_kbag(&im4p).unwrap());

        let first = get_kbag(&im4p, 0).unwrap();
        assert_eq!(first, format!("{}{}", "11".repeat(16), "22".repeat(32)));
        let second = get_kbag(&im4p, 1).unwrap();
        assert!(!second.is_empty() && second.len() % 2 == 0);
        assert!(second.starts_with("33"));

        assert!(matches!(get_kbag(&im4p, 2), Err(Error::Value(_))));
        assert_eq!(keybags(&im4p).unwrap(), bags());
    }

    #[test]
    fn test_corrupt_kbag() {
        let mut children = get_empty_im4p_container(FourCc(*b"ibot"), "iBoot")
            .into_children()
            .unwrap();
        children.push(DerElement::octet_string(vec![]));
        children.push(DerElement::octet_string(vec![0x30, 0x05, 0x02]));
        let im4p = DerElement::sequence(children);
        assert!(im4p_contains_kbag(&im4p).unwrap());
        assert!(matches!(get_kbag(&im4p, 0), Err(Error::Parse { .. })));
    }
}

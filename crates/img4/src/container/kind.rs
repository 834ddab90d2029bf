//! Container classification
//!
//! Every IMG4 container is a SEQUENCE whose first element is an IA5String
//! magic. Classification looks only at that magic, so callers never have to
//! hardcode tag layouts.

use crate::der::{DerElement, Tag, TagClass};
use crate::{Error, Result};
use std::fmt;

/// Known container kinds and their magics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContainerKind {
    /// Top-level firmware container.
    Img4,
    /// Payload.
    Im4p,
    /// Signing manifest.
    Im4m,
    /// Restore info carrying the nonce generator.
    Im4r,
    /// Certificate container.
    Im4c,
}

impl ContainerKind {
    pub const ALL: [ContainerKind; 5] = [
        ContainerKind::Img4,
        ContainerKind::Im4p,
        ContainerKind::Im4m,
        ContainerKind::Im4r,
        ContainerKind::Im4c,
    ];

    pub fn magic(self) -> &'static str {
        match self {
            ContainerKind::Img4 => "IMG4",
            ContainerKind::Im4p => "IM4P",
            ContainerKind::Im4m => "IM4M",
            ContainerKind::Im4r => "IM4R",
            ContainerKind::Im4c => "IM4C",
        }
    }

    /// Look up a kind by its magic bytes.
    pub fn from_magic(magic: &[u8]) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.magic().as_bytes() == magic)
    }

    /// Classify a sequence by its leading magic.
    pub fn of(element: &DerElement) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.matches(element))
    }

    /// Whether `element` is a container of this kind.
    pub fn matches(self, element: &DerElement) -> bool {
        if has_magic(element, self.magic()) {
            return true;
        }
        // IM4C may also travel inside a private-class wrapper
        self == ContainerKind::Im4c
            && element.tag().class == TagClass::Private
            && element
                .children()
                .ok()
                .and_then(|children| children.first())
                .is_some_and(|inner| has_magic(inner, self.magic()))
    }
}

impl fmt::Display for ContainerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.magic())
    }
}

fn has_magic(element: &DerElement, magic: &str) -> bool {
    if element.tag() != Tag::SEQUENCE {
        return false;
    }
    let Ok(children) = element.children() else {
        return false;
    };
    match children.first().map(DerElement::payload) {
        Some(Ok(bytes)) => bytes == magic.as_bytes(),
        _ => false,
    }
}

/// Short description of an element for error messages.
pub(crate) fn describe(element: &DerElement) -> String {
    match ContainerKind::of(element) {
        Some(kind) => kind.to_string(),
        None => element.tag().to_string(),
    }
}

/// Fail with [`Error::TypeMismatch`] unless `element` is of `kind`.
pub(crate) fn require(element: &DerElement, kind: ContainerKind) -> Result<()> {
    if kind.matches(element) {
        Ok(())
    } else {
        Err(Error::mismatch(kind.magic(), describe(element)))
    }
}

pub fn is_img4(element: &DerElement) -> bool {
    ContainerKind::Img4.matches(element)
}

pub fn is_im4p(element: &DerElement) -> bool {
    ContainerKind::Im4p.matches(element)
}

pub fn is_im4m(element: &DerElement) -> bool {
    ContainerKind::Im4m.matches(element)
}

pub fn is_im4r(element: &DerElement) -> bool {
    ContainerKind::Im4r.matches(element)
}

pub fn is_im4c(element: &DerElement) -> bool {
    ContainerKind::Im4c.matches(element)
}

/// Classify the DER sequence at the start of `data` by its magic.
///
/// # Errors
///
/// - [`Error::Parse`] if `data` does not start with a DER element
/// - [`Error::TypeMismatch`] if it is not a sequence led by a known magic
pub fn get_name_for_sequence(data: &[u8]) -> Result<ContainerKind> {
    let (element, _) = DerElement::parse_prefix(data)?;
    if element.tag() != Tag::SEQUENCE {
        return Err(Error::mismatch("SEQUENCE", element.tag().to_string()));
    }
    let magic = element
        .children()?
        .first()
        .ok_or_else(|| Error::mismatch("container magic", "empty SEQUENCE"))?
        .payload()?;
    ContainerKind::from_magic(magic).ok_or_else(|| {
        Error::mismatch(
            "known container magic",
            format!("{:?}", String::from_utf8_lossy(magic)),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn container(magic: &str) -> DerElement {
        DerElement::sequence(vec![DerElement::ia5_string(magic), DerElement::integer(0)])
    }

    #[test]
    fn test_predicates() {
        assert!(is_img4(&container("IMG4")));
        assert!(is_im4p(&container("IM4P")));
        assert!(is_im4m(&container("IM4M")));
        assert!(is_im4r(&container("IM4R")));
        assert!(is_im4c(&container("IM4C")));
        assert!(!is_im4p(&container("IMG4")));
        assert!(!is_img4(&container("IMG")));
    }

    #[test]
    fn test_predicates_on_non_containers() {
        assert!(!is_img4(&DerElement::ia5_string("IMG4")));
        assert!(!is_img4(&DerElement::sequence(vec![])));
        assert!(!is_img4(&DerElement::set(vec![DerElement::ia5_string("IMG4")])));
        assert!(!is_img4(&DerElement::sequence(vec![DerElement::sequence(vec![])])));
    }

    #[test]
    fn test_im4c_private_wrapper() {
        let wrapped = DerElement::private(0x494d_3443, container("IM4C"));
        assert!(is_im4c(&wrapped));
        assert!(!is_im4p(&DerElement::private(1, container("IM4P"))));
    }

    #[test]
    fn test_get_name_for_sequence() {
        let bytes = container("IM4M").encode();
        assert_eq!(get_name_for_sequence(&bytes).unwrap(), ContainerKind::Im4m);

        let unknown = container("ABCD").encode();
        assert!(matches!(
            get_name_for_sequence(&unknown),
            Err(Error::TypeMismatch { .. })
        ));

        let not_seq = DerElement::octet_string(vec![1]).encode();
        assert!(matches!(
            get_name_for_sequence(&not_seq),
            Err(Error::TypeMismatch { .. })
        ));

        assert!(matches!(
            get_name_for_sequence(&[0x30, 0x05]),
            Err(Error::Parse { .. })
        ));
    }
}

//! IM4P payload construction

use super::compression::{compress, Compression};
use super::extract::{build_compression_info, compression_info};
use super::kbag::kbag_element;
use crate::container::im4p::PAYLOAD_INDEX;
use crate::container::kind::{require, ContainerKind};
use crate::der::{DerElement, Tag};
use crate::{Error, Result};
use std::ptr;

/// Return a copy of `im4p` carrying `data` as its payload.
///
/// With a `compression` scheme the data is compressed first and `companion`
/// bytes, if any, are placed right after the compressed stream. LZFSE
/// payloads also get a compression-info element recording the uncompressed
/// size. An existing payload is replaced and an existing KBAG is kept. A
/// previous compression-info element is dropped; any other trailing elements
/// are carried over after the rebuilt ones.
///
/// # Errors
///
/// - [`Error::TypeMismatch`] if `im4p` is not an IM4P
/// - [`Error::Value`] if `companion` is given without a compression scheme
pub fn append_payload_to_im4p(
    im4p: &DerElement,
    data: &[u8],
    compression: Option<Compression>,
    companion: Option<&[u8]>,
) -> Result<DerElement> {
    require(im4p, ContainerKind::Im4p)?;

    let payload = match (compression, companion) {
        (Some(scheme), companion) => compress(scheme, data, companion.unwrap_or_default())?,
        (None, Some(_)) => {
            return Err(Error::Value(
                "companion data requires a compression scheme".into(),
            ))
        }
        (None, None) => data.to_vec(),
    };
    tracing::debug!(
        compression = compression.map(Compression::name),
        raw = data.len(),
        stored = payload.len(),
        "setting IM4P payload"
    );

    let existing = im4p.children()?;
    if existing.len() < PAYLOAD_INDEX {
        return Err(Error::NotFound("IM4P type or description".into()));
    }
    let kbag = kbag_element(im4p)?;
    let old_info = compression_info(im4p)?;
    let is_same = |known: Option<&DerElement>, element: &DerElement| {
        known.is_some_and(|known| ptr::eq(known, element))
    };
    let unknown: Vec<DerElement> = existing
        .iter()
        .enumerate()
        .skip(PAYLOAD_INDEX)
        .filter(|(index, element)| {
            let old_payload = *index == PAYLOAD_INDEX && element.tag() == Tag::OCTET_STRING;
            !old_payload && !is_same(kbag, element) && !is_same(old_info, element)
        })
        .map(|(_, element)| element.clone())
        .collect();
    if !unknown.is_empty() {
        tracing::debug!(count = unknown.len(), "keeping unrecognised IM4P elements");
    }

    let mut children = existing[..PAYLOAD_INDEX].to_vec();
    children.push(DerElement::octet_string(payload));
    children.extend(kbag.cloned());
    if compression == Some(Compression::Lzfse) {
        children.push(build_compression_info(data.len() as u64));
    }
    children.extend(unknown);
    Ok(DerElement::constructed(im4p.tag(), children))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::{get_empty_im4p_container, get_type_from_im4p, FourCc};
    use crate::payload::kbag::{build_kbag, get_kbag, KeyBag};
    use crate::payload::PayloadExtractor;

    fn kernel() -> Vec<u8> {
        b"\xcf\xfa\xed\xfe kernel text section ".repeat(300)
    }

    fn empty() -> DerElement {
        get_empty_im4p_container(FourCc(*b"krnl"), "KernelCache")
    }

    #[test]
    fn test_uncompressed() {
        let im4p = append_payload_to_im4p(&empty(), b"data", None, None).unwrap();
        let out = PayloadExtractor::new(&im4p).extract().unwrap();
        assert_eq!(out.data, b"data");
        assert_eq!(get_type_from_im4p(&im4p).unwrap(), FourCc(*b"krnl"));
    }

    #[test]
    fn test_lzss_with_companion() {
        let im4p =
            append_payload_to_im4p(&empty(), &kernel(), Some(Compression::Lzss), Some(b"KPP data"))
                .unwrap();
        let out = PayloadExtractor::new(&im4p).extract().unwrap();
        assert_eq!(out.data, kernel());
        assert_eq!(out.compression, Some(Compression::Lzss));
        assert_eq!(out.companion.as_deref(), Some(&b"KPP data"[..]));
        assert!(compression_info(&im4p).unwrap().is_none());
    }

    #[test]
    fn test_lzfse_with_hypervisor() {
        let hypervisor = append_payload_to_im4p(
            &get_empty_im4p_container(FourCc(*b"hypr"), "Hypervisor"),
            b"hyp",
            None,
            None,
        )
        .unwrap();
        let encoded = hypervisor.encode();

        let im4p =
            append_payload_to_im4p(&empty(), &kernel(), Some(Compression::Lzfse), Some(&encoded))
                .unwrap();
        let info = compression_info(&im4p).unwrap().unwrap();
        assert_eq!(info.child(1).unwrap().as_u64().unwrap(), kernel().len() as u64);

        let out = PayloadExtractor::new(&im4p).extract().unwrap();
        assert_eq!(out.data, kernel());
        assert_eq!(out.compression, Some(Compression::Lzfse));
        assert_eq!(out.hypervisor, Some(hypervisor));
        assert_eq!(out.companion, None);
    }

    #[test]
    fn test_companion_requires_compression() {
        assert!(matches!(
            append_payload_to_im4p(&empty(), b"data", None, Some(b"extra")),
            Err(Error::Value(_))
        ));
    }

    #[test]
    fn test_replace_keeps_kbag() {
        let bag = KeyBag {
            kind: 1,
            iv: vec![1; 16],
            key: vec![2; 32],
        };
        let mut children = empty().into_children().unwrap();
        children.push(DerElement::octet_string(b"old".to_vec()));
        children.push(build_kbag(&[bag.clone()]));
        let im4p = DerElement::sequence(children);

        let replaced = append_payload_to_im4p(&im4p, b"new", None, None).unwrap();
        assert_eq!(PayloadExtractor::new(&replaced).extract().unwrap().data, b"new");
        assert_eq!(get_kbag(&replaced, 0).unwrap(), bag.to_hex());
        assert_eq!(replaced.children().unwrap().len(), 5);
    }

    #[test]
    fn test_rewrap_keeps_unknown_elements() {
        let bag = KeyBag {
            kind: 1,
            iv: vec![1; 16],
            key: vec![2; 32],
        };
        let unknown = DerElement::explicit(2, DerElement::integer(7));
        let lzfse = append_payload_to_im4p(&empty(), &kernel(), Some(Compression::Lzfse), None)
            .unwrap()
            .into_children()
            .unwrap();
        let mut children = lzfse[..4].to_vec();
        children.push(build_kbag(&[bag.clone()]));
        children.push(lzfse[4].clone());
        children.push(unknown.clone());
        let im4p = DerElement::sequence(children);

        let replaced =
            append_payload_to_im4p(&im4p, &kernel(), Some(Compression::Lzss), None).unwrap();
        let children = replaced.children().unwrap();
        assert_eq!(children.len(), 6);
        assert_eq!(children[5], unknown);
        assert!(compression_info(&replaced).unwrap().is_none());
        assert_eq!(get_kbag(&replaced, 0).unwrap(), bag.to_hex());
        assert_eq!(PayloadExtractor::new(&replaced).extract().unwrap().data, kernel());
    }

    #[test]
    fn test_requires_im4p() {
        let not_im4p = DerElement::sequence(vec![DerElement::ia5_string("IM4R")]);
        assert!(matches!(
            append_payload_to_im4p(&not_im4p, b"x", None, None),
            Err(Error::TypeMismatch { .. })
        ));
    }
}

//! IM4P digests and their manifest entries

use super::body::manifest_objects;
use crate::container::kind::{require, ContainerKind};
use crate::container::property::find_property;
use crate::container::FourCc;
use crate::crypto::{sha1, sha384};
use crate::der::DerElement;
use crate::{Error, Result};

/// Object properties that may hold an IM4P digest, probed in order.
const DIGEST_PROPERTIES: &[FourCc] = &[FourCc::DGST];

/// SHA-1 over the full DER encoding of `im4p`.
pub fn get_im4p_sha1(im4p: &DerElement) -> Result<Vec<u8>> {
    require(im4p, ContainerKind::Im4p)?;
    Ok(sha1(&im4p.encode()))
}

/// SHA-384 over the full DER encoding of `im4p`.
pub fn get_im4p_sha384(im4p: &DerElement) -> Result<Vec<u8>> {
    require(im4p, ContainerKind::Im4p)?;
    Ok(sha384(&im4p.encode()))
}

/// Name of the manifest object whose digest equals `hash`.
///
/// # Errors
///
/// - [`Error::NotFound`] if no object carries that digest
/// - [`Error::Parse`] / [`Error::TypeMismatch`] for a manifest that cannot
///   be walked
pub fn dgst_name_for_hash(im4m: &DerElement, hash: &[u8]) -> Result<FourCc> {
    for (name, properties) in manifest_objects(im4m)? {
        for &property in DIGEST_PROPERTIES {
            let Some(digest) = find_property(properties, property)? else {
                continue;
            };
            if digest.payload()? == hash {
                tracing::debug!(object = %name, %property, "manifest digest matched");
                return Ok(name);
            }
        }
    }
    Err(Error::NotFound(format!(
        "manifest object with digest {}",
        hex::encode(hash)
    )))
}

/// Whether any object of the manifest carries the digest `hash`.
pub fn im4m_contains_hash(im4m: &DerElement, hash: &[u8]) -> Result<bool> {
    match dgst_name_for_hash(im4m, hash) {
        Ok(_) => Ok(true),
        Err(Error::NotFound(_)) => Ok(false),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::get_empty_im4p_container;
    use crate::manifest::fixtures::{test_manifest, KERNEL_DIGEST};

    #[test]
    fn test_digest_covers_full_encoding() {
        let im4p = get_empty_im4p_container(FourCc(*b"krnl"), "KernelCache");
        let encoded = im4p.encode();
        assert_eq!(get_im4p_sha1(&im4p).unwrap(), sha1(&encoded));
        assert_eq!(get_im4p_sha384(&im4p).unwrap(), sha384(&encoded));
        assert_ne!(get_im4p_sha1(&im4p).unwrap(), sha1(b""));
    }

    #[test]
    fn test_requires_im4p() {
        let img4 = crate::container::get_empty_img4_container();
        assert!(matches!(
            get_im4p_sha384(&img4),
            Err(Error::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_name_for_hash() {
        let im4m = test_manifest();
        assert_eq!(
            dgst_name_for_hash(&im4m, &KERNEL_DIGEST).unwrap(),
            FourCc(*b"krnl")
        );
        assert!(matches!(
            dgst_name_for_hash(&im4m, &[0; 48]),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn test_contains_hash() {
        let im4m = test_manifest();
        assert!(im4m_contains_hash(&im4m, &KERNEL_DIGEST).unwrap());
        assert!(!im4m_contains_hash(&im4m, &[0; 48]).unwrap());
    }
}

//! Manifest signature verification
//!
//! An IM4M is signed with RSA PKCS#1 v1.5 by the leaf certificate of the
//! chain it carries. Older manifests use SHA-1, current ones SHA-384.
//! Verification of the chain itself (trust anchors, validity periods) is left
//! to the caller.

use super::digest::{sha1, sha384};
use crate::der::DerElement;
use crate::{Error, Result};
use rsa::pkcs1::DecodeRsaPublicKey;
use rsa::{Pkcs1v15Sign, RsaPublicKey};
use sha1::Sha1;
use sha2::Sha384;
use x509_certificate::X509Certificate;

/// sha1WithRSAEncryption: 1.2.840.113549.1.1.5
const SHA1_WITH_RSA_OID: &[u8] = &[0x2a, 0x86, 0x48, 0x86, 0xf7, 0x0d, 0x01, 0x01, 0x05];

/// Checks a signature over a manifest body.
///
/// Implement this to plug in another crypto backend. `cert_chain` holds the
/// DER certificates in manifest order, leaf last.
pub trait SignatureVerifier {
    /// Returns `Ok(false)` for a well-formed signature that does not verify.
    fn verify(&self, body: &[u8], signature: &[u8], cert_chain: &[Vec<u8>]) -> Result<bool>;
}

/// RustCrypto-backed RSA verifier.
#[derive(Debug, Default, Clone, Copy)]
pub struct RsaVerifier;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DigestKind {
    Sha1,
    Sha384,
}

impl DigestKind {
    fn other(self) -> Self {
        match self {
            DigestKind::Sha1 => DigestKind::Sha384,
            DigestKind::Sha384 => DigestKind::Sha1,
        }
    }
}

/// Digest suggested by the certificate's own signature algorithm.
fn preferred_digest(cert_der: &[u8]) -> DigestKind {
    let oid = DerElement::parse(cert_der)
        .and_then(|cert| cert.child(1)?.child(0)?.payload().map(<[u8]>::to_vec));
    match oid {
        Ok(oid) if oid == SHA1_WITH_RSA_OID => DigestKind::Sha1,
        _ => DigestKind::Sha384,
    }
}

impl SignatureVerifier for RsaVerifier {
    fn verify(&self, body: &[u8], signature: &[u8], cert_chain: &[Vec<u8>]) -> Result<bool> {
        let leaf = cert_chain
            .last()
            .ok_or_else(|| Error::NotFound("certificate in manifest chain".into()))?;

        let cert = X509Certificate::from_der(leaf)
            .map_err(|e| Error::Crypto(format!("invalid manifest certificate: {e}")))?;
        let public_key = RsaPublicKey::from_pkcs1_der(&cert.public_key_data())
            .map_err(|e| Error::Crypto(format!("manifest certificate key is not RSA: {e}")))?;

        let preferred = preferred_digest(leaf);
        for digest in [preferred, preferred.other()] {
            let verified = match digest {
                DigestKind::Sha1 => {
                    public_key.verify(Pkcs1v15Sign::new::<Sha1>(), &sha1(body), signature)
                }
                DigestKind::Sha384 => {
                    public_key.verify(Pkcs1v15Sign::new::<Sha384>(), &sha384(body), signature)
                }
            };
            if verified.is_ok() {
                tracing::debug!(?digest, "manifest signature verified");
                return Ok(true);
            }
        }

        tracing::debug!("manifest signature did not verify");
        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_chain() {
        assert!(matches!(
            RsaVerifier.verify(b"body", b"sig", &[]),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn test_garbage_certificate() {
        assert!(matches!(
            RsaVerifier.verify(b"body", b"sig", &[vec![0x30, 0x00]]),
            Err(Error::Crypto(_))
        ));
    }

    #[test]
    fn test_preferred_digest_defaults_to_sha384() {
        assert_eq!(preferred_digest(&[0x30, 0x00]), DigestKind::Sha384);

        let sha1_cert = DerElement::sequence(vec![
            DerElement::sequence(vec![]),
            DerElement::sequence(vec![DerElement::primitive(
                crate::der::Tag::OID,
                SHA1_WITH_RSA_OID.to_vec(),
            )]),
        ]);
        assert_eq!(preferred_digest(&sha1_cert.encode()), DigestKind::Sha1);
    }
}

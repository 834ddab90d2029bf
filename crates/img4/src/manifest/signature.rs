//! Manifest signature checks

use super::body::{certificate_chain, manifest_body, manifest_signature};
use crate::crypto::{RsaVerifier, SignatureVerifier};
use crate::der::DerElement;
use crate::Result;

/// Verify the manifest signature with the built-in RSA verifier.
///
/// The signed data is the DER encoding of the body SET; the signer is the
/// last certificate of the embedded chain. Trust in the chain itself is not
/// evaluated.
///
/// # Errors
///
/// Fails when the body, signature or chain cannot be located, or the leaf
/// certificate cannot be parsed. A signature that simply does not verify is
/// `Ok(false)`.
pub fn is_im4m_signature_valid(im4m: &DerElement) -> Result<bool> {
    is_im4m_signature_valid_with(im4m, &RsaVerifier)
}

/// Verify the manifest signature with a caller-supplied verifier.
pub fn is_im4m_signature_valid_with<V: SignatureVerifier + ?Sized>(
    im4m: &DerElement,
    verifier: &V,
) -> Result<bool> {
    let body = manifest_body(im4m)?.encode();
    let signature = manifest_signature(im4m)?;
    let chain = certificate_chain(im4m)?;
    tracing::debug!(
        body = body.len(),
        signature = signature.len(),
        certificates = chain.len(),
        "verifying manifest signature"
    );
    verifier.verify(&body, signature, &chain)
}

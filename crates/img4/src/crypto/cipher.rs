//! AES-CBC payload decryption
//!
//! IM4P payloads are encrypted with AES-CBC and no padding. Only complete
//! 16-byte blocks are decrypted; a trailing partial block is passed through.

use crate::{Error, Result};
use aes::{Aes128, Aes192, Aes256};
use cbc::cipher::{block_padding::NoPadding, BlockDecryptMut, KeyIvInit};

/// AES block and IV size in bytes
pub const AES_BLOCK_SIZE: usize = 16;

/// Decrypt `data` with AES-CBC.
///
/// The key length selects AES-128, AES-192 or AES-256.
///
/// # Errors
///
/// Returns [`Error::Value`] for an IV that is not 16 bytes or a key that is
/// not 16, 24 or 32 bytes.
pub fn aes_cbc_decrypt(data: &[u8], key: &[u8], iv: &[u8]) -> Result<Vec<u8>> {
    if iv.len() != AES_BLOCK_SIZE {
        return Err(Error::Value(format!("IV must be 16 bytes, got {}", iv.len())));
    }

    let mut output = data.to_vec();
    let aligned = data.len() - data.len() % AES_BLOCK_SIZE;
    let blocks = &mut output[..aligned];

    let result = match key.len() {
        16 => cbc::Decryptor::<Aes128>::new_from_slices(key, iv)
            .map_err(|e| Error::Crypto(e.to_string()))?
            .decrypt_padded_mut::<NoPadding>(blocks)
            .map(|_| ()),
        24 => cbc::Decryptor::<Aes192>::new_from_slices(key, iv)
            .map_err(|e| Error::Crypto(e.to_string()))?
            .decrypt_padded_mut::<NoPadding>(blocks)
            .map(|_| ()),
        32 => cbc::Decryptor::<Aes256>::new_from_slices(key, iv)
            .map_err(|e| Error::Crypto(e.to_string()))?
            .decrypt_padded_mut::<NoPadding>(blocks)
            .map(|_| ()),
        n => {
            return Err(Error::Value(format!(
                "AES key must be 16, 24 or 32 bytes, got {n}"
            )))
        }
    };
    result.map_err(|e| Error::Crypto(format!("AES-CBC decryption failed: {e:?}")))?;

    Ok(output)
}

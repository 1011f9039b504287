//! Decryption hook for encrypted entries
//!
//! Entries flagged `ENCRYPTED` are decrypted in place before decompression.
//! The archive carries no cipher of its own; callers that ship encrypted
//! archives plug one in through [`ArchiveOptions::with_cipher`].
//!
//! [`ArchiveOptions::with_cipher`]: crate::ArchiveOptions::with_cipher

use thiserror::Error;

use crate::hash::HashKey;

/// Error reported by a [`PayloadCipher`]
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct CipherError(pub String);

/// Decrypts stored payload bytes in place
///
/// Implementations must be usable from several reader threads at once.
///
/// # Example
///
/// ```
/// use resarc_archive::{CipherError, HashKey, PayloadCipher};
///
/// struct XorCipher(u8);
///
/// impl PayloadCipher for XorCipher {
///     fn decrypt(&self, _hash: &HashKey, payload: &mut [u8]) -> Result<(), CipherError> {
///         for byte in payload.iter_mut() {
///             *byte ^= self.0;
///         }
///         Ok(())
///     }
/// }
/// ```
pub trait PayloadCipher: Send + Sync {
    /// Decrypt `payload`, the stored bytes of entry `hash`
    fn decrypt(&self, hash: &HashKey, payload: &mut [u8]) -> Result<(), CipherError>;
}

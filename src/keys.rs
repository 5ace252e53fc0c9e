//! Session key ownership.
//!
//! A vault holds at most one symmetric key. The key type is opaque,
//! non-cloneable, and wiped when dropped. Raw bytes are only reachable from
//! inside the crate.

use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::crypto::KEY_LEN;
use crate::error::VaultError;
use crate::rng::RandomSource;

/// A 128-bit AES-GCM key bound to one vault.
///
/// - Not `Clone`. It cannot leave the vault by accident.
/// - Zeroised on drop.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct SessionKey {
    bytes: [u8; KEY_LEN],
}

impl SessionKey {
    /// Draw a fresh key from `rng`.
    ///
    /// This is the only place key material is produced. It is never derived
    /// from plaintext or IVs.
    pub(crate) fn generate<R: RandomSource + ?Sized>(rng: &R) -> Result<Self, VaultError> {
        let mut bytes = [0u8; KEY_LEN];
        rng.fill(&mut bytes)?;
        Ok(Self { bytes })
    }

    /// The all-zero key a vault falls back to before `crypto_init`.
    ///
    /// Encrypting with it is defined behaviour but provides no secrecy.
    pub(crate) fn unset() -> Self {
        Self {
            bytes: [0u8; KEY_LEN],
        }
    }

    /// `pub(crate)`: raw bytes never leave the crate.
    pub(crate) fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.bytes
    }
}

impl std::fmt::Debug for SessionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SessionKey(..)")
    }
}

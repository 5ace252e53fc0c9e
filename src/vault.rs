//! Trusted vault state and its call surface.
//!
//! A [`Vault`] owns every piece of protected state: a fixed-capacity buffer,
//! at most one dynamically sized buffer, and at most one session key. The
//! only way in or out is through the methods below. Each one is a single
//! synchronous boundary crossing.
//!
//! The `Vault` value itself is the handle. Whoever owns it may issue calls,
//! and `&mut self` receivers make concurrent calls on one vault impossible.

use tracing::{debug, warn};
use zeroize::{Zeroize, Zeroizing};

use crate::boundary::{self, Direction, Transfer};
use crate::crypto::{self, Decrypted};
use crate::error::VaultError;
use crate::keys::SessionKey;
use crate::rng::{RandomSource, SystemRandomSource};

/// Capacity of the fixed buffer. Copies must be strictly shorter.
pub const FIXED_CAPACITY: usize = 1000;

/// Upper bound on the dynamic buffer. Allocations must be strictly shorter.
pub const DYNAMIC_CAPACITY: usize = 10_000;

/// The protected state behind the boundary.
pub struct Vault<R = SystemRandomSource> {
    id: u64,
    fixed: Box<[u8]>,
    dynamic: Option<Zeroizing<Vec<u8>>>,
    key: Option<SessionKey>,
    rng: R,
}

impl<R: RandomSource> Vault<R> {
    /// Set up a vault: zero-filled fixed buffer, no dynamic buffer, no key.
    pub fn init(id: u64, rng: R) -> Result<Self, VaultError> {
        let mut fixed = Vec::new();
        fixed
            .try_reserve_exact(FIXED_CAPACITY)
            .map_err(|_| VaultError::AllocationFailure {
                requested: FIXED_CAPACITY,
            })?;
        fixed.resize(FIXED_CAPACITY, 0u8);

        Ok(Self {
            id,
            fixed: fixed.into_boxed_slice(),
            dynamic: None,
            key: None,
            rng,
        })
    }

    /// Scatter indices across the fixed buffer.
    ///
    /// Draws `FIXED_CAPACITY` random positions `r` and stores `r` at each.
    /// Cells hold bytes, so the stored value is `r` truncated to 8 bits.
    /// Positions never drawn keep their previous content.
    pub fn random_fill(&mut self) -> Result<(), VaultError> {
        for _ in 0..FIXED_CAPACITY {
            let r = self.rng.below(FIXED_CAPACITY)?;
            self.fixed[r] = r as u8;
        }
        Ok(())
    }

    /// Read the byte at one random position of the fixed buffer.
    pub fn random_read(&self) -> Result<u8, VaultError> {
        let r = self.rng.below(FIXED_CAPACITY)?;
        Ok(self.fixed[r])
    }

    /// Overwrite the first `length` bytes of the fixed buffer.
    pub fn copy_in(&mut self, bytes: &[u8], length: usize) -> Transfer {
        boundary::copy_in(&mut self.fixed, bytes, length, FIXED_CAPACITY)
    }

    /// Copy the first `length` bytes of the fixed buffer out.
    pub fn copy_out(&self, length: usize) -> Transfer<Vec<u8>> {
        boundary::copy_out(&self.fixed, length, FIXED_CAPACITY)
    }

    /// Replace the dynamic buffer with a copy of the first `length` bytes.
    ///
    /// The new buffer is allocated before the old one is released, so an
    /// allocation failure leaves the previous buffer in place.
    pub fn alloc_copy_in(&mut self, bytes: &[u8], length: usize) -> Result<Transfer, VaultError> {
        if let Err(rejection) =
            boundary::check(Direction::Inbound, length, DYNAMIC_CAPACITY, bytes.len())
        {
            return Ok(Transfer::Rejected(rejection));
        }

        let mut fresh = Vec::new();
        fresh
            .try_reserve_exact(length)
            .map_err(|_| VaultError::AllocationFailure { requested: length })?;
        fresh.extend_from_slice(&bytes[..length]);

        // Dropping the previous buffer wipes it.
        if self.dynamic.replace(Zeroizing::new(fresh)).is_some() {
            debug!(vault = self.id, "dynamic buffer replaced");
        }
        Ok(Transfer::Applied(()))
    }

    /// Copy `length` bytes out of the dynamic buffer.
    ///
    /// Bounded by both `DYNAMIC_CAPACITY` and the buffer's actual length;
    /// with no buffer present every non-trivial read is rejected.
    pub fn alloc_copy_out(&self, length: usize) -> Transfer<Vec<u8>> {
        let src: &[u8] = match &self.dynamic {
            Some(buf) => buf.as_slice(),
            None => &[],
        };
        boundary::copy_out(src, length, DYNAMIC_CAPACITY)
    }

    /// Release the dynamic buffer. A no-op when none is held.
    pub fn free_dynamic(&mut self) {
        if self.dynamic.take().is_some() {
            debug!(vault = self.id, "dynamic buffer released");
        }
    }

    /// Draw a fresh session key, replacing any previous one.
    pub fn crypto_init(&mut self) -> Result<(), VaultError> {
        self.key = Some(SessionKey::generate(&self.rng)?);
        debug!(vault = self.id, "session key initialised");
        Ok(())
    }

    /// Seal the first `length` bytes of `plaintext` into a frame of
    /// `length + FRAME_OVERHEAD` bytes.
    pub fn encrypt(&self, plaintext: &[u8], length: usize) -> Result<Vec<u8>, VaultError> {
        if length > plaintext.len() {
            return Err(VaultError::LengthOutOfRange {
                requested: length,
                available: plaintext.len(),
            });
        }
        self.with_key(|key| crypto::seal(key, &plaintext[..length], &self.rng))
    }

    /// Open a frame holding `length` bytes of ciphertext.
    pub fn decrypt(&self, frame: &[u8], length: usize) -> Result<Decrypted, VaultError> {
        self.with_key(|key| crypto::open(key, frame, length))
    }

    /// Cross the boundary and do nothing.
    #[inline(never)]
    pub fn noop(&self) {}

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn has_dynamic(&self) -> bool {
        self.dynamic.is_some()
    }

    /// Length of the dynamic buffer, if one is held.
    pub fn dynamic_len(&self) -> Option<usize> {
        self.dynamic.as_ref().map(|buf| buf.len())
    }

    pub fn has_session_key(&self) -> bool {
        self.key.is_some()
    }

    fn with_key<T>(&self, f: impl FnOnce(&SessionKey) -> T) -> T {
        match &self.key {
            Some(key) => f(key),
            None => {
                warn!(vault = self.id, "session key not initialised, using all-zero key");
                f(&SessionKey::unset())
            }
        }
    }
}

impl<R> Drop for Vault<R> {
    fn drop(&mut self) {
        self.fixed.zeroize();
        // Zeroizing wipes the dynamic buffer; SessionKey wipes itself.
        self.dynamic = None;
    }
}

impl<R> std::fmt::Debug for Vault<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Vault")
            .field("id", &self.id)
            .field("dynamic_len", &self.dynamic.as_ref().map(|buf| buf.len()))
            .field("has_session_key", &self.key.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A source that always fails.
    struct Broken;

    impl RandomSource for Broken {
        fn fill(&self, _dest: &mut [u8]) -> Result<(), VaultError> {
            Err(VaultError::RandomnessFailure)
        }
    }

    fn vault() -> Vault {
        Vault::init(1, SystemRandomSource::new()).unwrap()
    }

    #[test]
    fn test_init_is_zeroed_and_empty() {
        let vault = vault();
        let contents = vault.copy_out(FIXED_CAPACITY - 1).applied().unwrap();
        assert!(contents.iter().all(|&b| b == 0));
        assert!(!vault.has_dynamic());
        assert!(!vault.has_session_key());
    }

    #[test]
    fn test_random_fill_writes_truncated_indices() {
        let mut vault = vault();
        vault.random_fill().unwrap();
        for (i, &b) in vault.fixed.iter().enumerate() {
            assert!(b == 0 || b == i as u8, "cell {} holds {}", i, b);
        }
        assert!(vault.fixed.iter().any(|&b| b != 0));
    }

    #[test]
    fn test_alloc_copy_in_replaces_previous_buffer() {
        let mut vault = vault();
        assert!(vault.alloc_copy_in(&[1u8; 50], 50).unwrap().is_applied());
        assert!(vault.alloc_copy_in(&[2u8; 20], 20).unwrap().is_applied());
        assert_eq!(vault.dynamic_len(), Some(20));
        assert_eq!(vault.alloc_copy_out(20).applied().unwrap(), vec![2u8; 20]);
    }

    #[test]
    fn test_rejected_alloc_keeps_previous_buffer() {
        let mut vault = vault();
        let _ = vault.alloc_copy_in(&[3u8; 10], 10).unwrap();
        let big = vec![0u8; DYNAMIC_CAPACITY];
        assert!(vault
            .alloc_copy_in(&big, DYNAMIC_CAPACITY)
            .unwrap()
            .is_rejected());
        assert_eq!(vault.alloc_copy_out(10).applied().unwrap(), vec![3u8; 10]);
    }

    #[test]
    fn test_rng_failure_is_loud() {
        let mut vault = Vault::init(2, Broken).unwrap();
        assert_eq!(vault.random_fill(), Err(VaultError::RandomnessFailure));
        assert_eq!(vault.random_read(), Err(VaultError::RandomnessFailure));
        assert_eq!(vault.crypto_init(), Err(VaultError::RandomnessFailure));
        assert!(!vault.has_session_key());
    }

    #[test]
    fn test_encrypt_length_beyond_plaintext() {
        let vault = vault();
        assert_eq!(
            vault.encrypt(b"abc", 4),
            Err(VaultError::LengthOutOfRange {
                requested: 4,
                available: 3
            })
        );
    }

    #[test]
    fn test_unset_key_still_round_trips() {
        let vault = vault();
        let frame = vault.encrypt(b"insecure default", 16).unwrap();
        let opened = vault.decrypt(&frame, 16).unwrap();
        assert_eq!(opened.into_result().unwrap(), b"insecure default");
    }

    #[test]
    fn test_crypto_init_rotates_only_when_called() {
        let mut vault = vault();
        vault.crypto_init().unwrap();
        let frame = vault.encrypt(b"pinned", 6).unwrap();
        assert!(vault.decrypt(&frame, 6).unwrap().is_authentic());

        vault.crypto_init().unwrap();
        assert!(!vault.decrypt(&frame, 6).unwrap().is_authentic());
    }
}

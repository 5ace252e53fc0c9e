//! Secure random source.
//!
//! Both the vault's random read/write calls and the crypto engine draw from
//! a [`RandomSource`]. The production implementation wraps
//! `ring::rand::SystemRandom`; tests substitute their own sources through
//! the same trait.

use ring::rand::{SecureRandom, SystemRandom};

use crate::error::VaultError;

/// A capability that produces cryptographically secure random bytes.
pub trait RandomSource {
    /// Fill `dest` entirely with random bytes.
    fn fill(&self, dest: &mut [u8]) -> Result<(), VaultError>;

    /// Draw a uniformly distributed integer in `[0, bound)`.
    ///
    /// Uses rejection sampling over 32-bit draws so that no value is
    /// favoured when `bound` does not divide 2^32.
    fn below(&self, bound: usize) -> Result<usize, VaultError> {
        let bound = u32::try_from(bound).map_err(|_| VaultError::InvalidBound)?;
        if bound == 0 {
            return Err(VaultError::InvalidBound);
        }

        // Largest multiple of `bound` representable in a u32 draw.
        let zone = (u64::from(u32::MAX) + 1) / u64::from(bound) * u64::from(bound);
        loop {
            let mut buf = [0u8; 4];
            self.fill(&mut buf)?;
            let value = u64::from(u32::from_le_bytes(buf));
            if value < zone {
                return Ok((value % u64::from(bound)) as usize);
            }
        }
    }
}

/// The operating system CSPRNG, via `ring`.
#[derive(Debug)]
pub struct SystemRandomSource {
    rng: SystemRandom,
}

impl SystemRandomSource {
    pub fn new() -> Self {
        Self {
            rng: SystemRandom::new(),
        }
    }
}

impl Default for SystemRandomSource {
    fn default() -> Self {
        Self::new()
    }
}

impl RandomSource for SystemRandomSource {
    fn fill(&self, dest: &mut [u8]) -> Result<(), VaultError> {
        self.rng.fill(dest).map_err(|_| VaultError::RandomnessFailure)
    }
}

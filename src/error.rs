//! Error types for vaultbench.
//!
//! Every error variant is a distinct failure mode of a vault call. Messages
//! are intentionally minimal: they signal *what* failed without exposing key
//! material or buffer contents.
//!
//! Boundary length violations are deliberately absent here. A copy call that
//! asks for too many bytes is not an error; it is reported as
//! [`crate::boundary::Transfer::Rejected`].

use thiserror::Error;

/// The single error type for all vault calls.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VaultError {
    /// The random source failed to produce bytes.
    #[error("randomness source failed")]
    RandomnessFailure,

    /// A random integer was requested with an empty or oversized range.
    #[error("invalid random bound")]
    InvalidBound,

    /// The session key was rejected by the AEAD primitive.
    #[error("invalid key")]
    InvalidKey,

    /// Encryption failed inside the AEAD primitive.
    #[error("encryption failed")]
    EncryptionFailure,

    /// Decryption failed: wrong key, tampered ciphertext, or corrupted tag.
    ///
    /// `Vault::decrypt` itself never returns this; it reports the verdict on
    /// `Decrypted`. This variant exists for `Decrypted::into_result`.
    #[error("authentication failed")]
    AuthenticationFailure,

    /// A frame was shorter than the tag, IV and requested plaintext length.
    #[error("malformed frame: expected at least {expected} bytes, got {actual}")]
    MalformedFrame { expected: usize, actual: usize },

    /// A length argument exceeded the bytes actually supplied by the caller.
    #[error("length {requested} exceeds {available} available bytes")]
    LengthOutOfRange { requested: usize, available: usize },

    /// The dynamic buffer could not be allocated. Existing vault state is
    /// left untouched.
    #[error("allocation of {requested} bytes failed")]
    AllocationFailure { requested: usize },
}

//! Frame sealing and opening.
//!
//! This is the only module that touches `ring::aead`. The vault performs
//! encryption and decryption exclusively through [`seal`] and [`open`].
//!
//! Primitive choices:
//! - **Cipher**: AES-128-GCM, no associated data
//! - **IV**: 96-bit, drawn fresh from the vault's random source per frame
//! - **Tag**: 128-bit, stored detached at the head of the frame
//!
//! There is no IV counter. Uniqueness rests entirely on the random source.
//!
//! # Frame layout
//! ```text
//! [ tag (16 bytes) ][ iv (12 bytes) ][ ciphertext (L bytes) ]
//! ```

use ring::aead::{self, Aad, LessSafeKey, Nonce, UnboundKey, AES_128_GCM};
use tracing::warn;

use crate::error::VaultError;
use crate::keys::SessionKey;
use crate::rng::RandomSource;

/// The AEAD algorithm used for every frame.
const ALGORITHM: &aead::Algorithm = &AES_128_GCM;

/// Size of a session key in bytes (128 bits).
pub const KEY_LEN: usize = 16;

/// Size of the GCM authentication tag in bytes.
pub const TAG_LEN: usize = 16;

/// Size of the IV in bytes (96 bits).
pub const IV_LEN: usize = 12;

/// Bytes a frame adds on top of its plaintext.
pub const FRAME_OVERHEAD: usize = TAG_LEN + IV_LEN;

const IV_OFFSET: usize = TAG_LEN;
const CIPHERTEXT_OFFSET: usize = TAG_LEN + IV_LEN;

/// Result of opening a frame.
///
/// Authentication failure is reported here rather than as an error so a
/// caller always gets a plaintext-shaped buffer back. When the tag does not
/// verify, `plaintext` is all zeroes; unauthenticated output is never
/// released.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decrypted {
    plaintext: Vec<u8>,
    authentic: bool,
}

impl Decrypted {
    /// Whether the tag verified.
    pub fn is_authentic(&self) -> bool {
        self.authentic
    }

    pub fn plaintext(&self) -> &[u8] {
        &self.plaintext
    }

    pub fn len(&self) -> usize {
        self.plaintext.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plaintext.is_empty()
    }

    /// Convert into a hard result, turning a failed tag into an error.
    pub fn into_result(self) -> Result<Vec<u8>, VaultError> {
        if self.authentic {
            Ok(self.plaintext)
        } else {
            Err(VaultError::AuthenticationFailure)
        }
    }
}

fn aead_key(key: &SessionKey) -> Result<LessSafeKey, VaultError> {
    let unbound = UnboundKey::new(ALGORITHM, key.as_bytes()).map_err(|_| VaultError::InvalidKey)?;
    Ok(LessSafeKey::new(unbound))
}

/// Seal `plaintext` into a frame of exactly `plaintext.len() + FRAME_OVERHEAD`
/// bytes.
pub(crate) fn seal<R: RandomSource + ?Sized>(
    key: &SessionKey,
    plaintext: &[u8],
    rng: &R,
) -> Result<Vec<u8>, VaultError> {
    let key = aead_key(key)?;

    let mut iv = [0u8; IV_LEN];
    rng.fill(&mut iv)?;

    let mut frame = vec![0u8; FRAME_OVERHEAD + plaintext.len()];
    frame[IV_OFFSET..CIPHERTEXT_OFFSET].copy_from_slice(&iv);
    frame[CIPHERTEXT_OFFSET..].copy_from_slice(plaintext);

    // Encrypts the ciphertext region in place; the tag is returned detached
    // and written into the head of the frame.
    let tag = key
        .seal_in_place_separate_tag(
            Nonce::assume_unique_for_key(iv),
            Aad::empty(),
            &mut frame[CIPHERTEXT_OFFSET..],
        )
        .map_err(|_| VaultError::EncryptionFailure)?;
    frame[..TAG_LEN].copy_from_slice(tag.as_ref());

    Ok(frame)
}

/// Open the first `len` ciphertext bytes of `frame`.
///
/// Bytes beyond `FRAME_OVERHEAD + len` are ignored. A frame too short to hold
/// `len` bytes of ciphertext is a hard error; a tag mismatch is not.
pub(crate) fn open(key: &SessionKey, frame: &[u8], len: usize) -> Result<Decrypted, VaultError> {
    let expected = FRAME_OVERHEAD
        .checked_add(len)
        .ok_or(VaultError::MalformedFrame {
            expected: usize::MAX,
            actual: frame.len(),
        })?;
    if frame.len() < expected {
        return Err(VaultError::MalformedFrame {
            expected,
            actual: frame.len(),
        });
    }

    let key = aead_key(key)?;

    let tag = &frame[..TAG_LEN];
    let iv: [u8; IV_LEN] = frame[IV_OFFSET..CIPHERTEXT_OFFSET]
        .try_into()
        .map_err(|_| VaultError::MalformedFrame {
            expected,
            actual: frame.len(),
        })?;

    // `ring` opens `ciphertext || tag` in place.
    let mut payload = Vec::with_capacity(len + TAG_LEN);
    payload.extend_from_slice(&frame[CIPHERTEXT_OFFSET..expected]);
    payload.extend_from_slice(tag);

    match key.open_in_place(Nonce::assume_unique_for_key(iv), Aad::empty(), &mut payload) {
        Ok(plaintext) => Ok(Decrypted {
            plaintext: plaintext.to_vec(),
            authentic: true,
        }),
        Err(_) => {
            warn!(len, "frame failed authentication");
            Ok(Decrypted {
                plaintext: vec![0u8; len],
                authentic: false,
            })
        }
    }
}

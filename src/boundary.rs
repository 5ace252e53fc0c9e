//! The boundary-crossing copy discipline.
//!
//! Every vault call that moves bytes across the trust boundary goes through
//! this module. A single length check runs before any copy; if it fails the
//! call does nothing at all. Nothing is ever copied partially.
//!
//! A failed check is not an error. It is a [`Transfer::Rejected`] outcome, so
//! callers can see which branch was taken without the vault surfacing a
//! fault.

use std::fmt;

use tracing::debug;

/// Direction of a copy relative to the vault.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Untrusted caller to vault.
    Inbound,
    /// Vault to untrusted caller.
    Outbound,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Inbound => write!(f, "inbound"),
            Self::Outbound => write!(f, "outbound"),
        }
    }
}

/// Why a transfer was dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rejection {
    /// The length the caller asked for.
    pub requested: usize,
    /// The bound that was violated. For capacity checks this is the
    /// capacity itself (the requested length must be strictly below it);
    /// for source or allocation checks it is the number of bytes present.
    pub limit: usize,
}

/// Outcome of a boundary copy.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use]
pub enum Transfer<T = ()> {
    /// The whole requested region was copied.
    Applied(T),
    /// The length check failed; no state changed.
    Rejected(Rejection),
}

impl<T> Transfer<T> {
    pub fn is_applied(&self) -> bool {
        matches!(self, Self::Applied(_))
    }

    pub fn is_rejected(&self) -> bool {
        matches!(self, Self::Rejected(_))
    }

    /// Return the copied value, discarding a rejection.
    pub fn applied(self) -> Option<T> {
        match self {
            Self::Applied(value) => Some(value),
            Self::Rejected(_) => None,
        }
    }

    /// Return the rejection, if any.
    pub fn rejection(&self) -> Option<Rejection> {
        match self {
            Self::Applied(_) => None,
            Self::Rejected(rejection) => Some(*rejection),
        }
    }
}

/// Validate `length` against a strict capacity bound and the bytes actually
/// present on the readable side.
///
/// The capacity check is `length < capacity`: a length exactly equal to the
/// capacity is rejected.
pub(crate) fn check(
    direction: Direction,
    length: usize,
    capacity: usize,
    available: usize,
) -> Result<(), Rejection> {
    let rejection = if length >= capacity {
        Rejection {
            requested: length,
            limit: capacity,
        }
    } else if length > available {
        Rejection {
            requested: length,
            limit: available,
        }
    } else {
        return Ok(());
    };

    debug!(
        %direction,
        requested = rejection.requested,
        limit = rejection.limit,
        "boundary transfer rejected"
    );
    Err(rejection)
}

/// Copy the first `length` bytes of `src` over the start of `dst`.
pub(crate) fn copy_in(dst: &mut [u8], src: &[u8], length: usize, capacity: usize) -> Transfer {
    if let Err(rejection) = check(Direction::Inbound, length, capacity, src.len()) {
        return Transfer::Rejected(rejection);
    }
    // `capacity` never exceeds the destination, so this cannot go out of bounds.
    dst[..length].copy_from_slice(&src[..length]);
    Transfer::Applied(())
}

/// Copy the first `length` bytes of `src` out to a fresh caller-owned buffer.
pub(crate) fn copy_out(src: &[u8], length: usize, capacity: usize) -> Transfer<Vec<u8>> {
    if let Err(rejection) = check(Direction::Outbound, length, capacity, src.len()) {
        return Transfer::Rejected(rejection);
    }
    Transfer::Applied(src[..length].to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_is_strict_at_capacity() {
        assert!(check(Direction::Inbound, 9, 10, 100).is_ok());
        assert_eq!(
            check(Direction::Inbound, 10, 10, 100),
            Err(Rejection {
                requested: 10,
                limit: 10
            })
        );
    }

    #[test]
    fn test_check_source_shorter_than_length() {
        assert_eq!(
            check(Direction::Inbound, 5, 10, 4),
            Err(Rejection {
                requested: 5,
                limit: 4
            })
        );
    }

    #[test]
    fn test_copy_in_never_partial() {
        let mut dst = [7u8; 10];
        let outcome = copy_in(&mut dst, &[1, 2, 3], 4, 10);
        assert!(outcome.is_rejected());
        assert_eq!(dst, [7u8; 10]);

        assert!(copy_in(&mut dst, &[1, 2, 3], 3, 10).is_applied());
        assert_eq!(&dst[..4], &[1, 2, 3, 7]);
    }

    #[test]
    fn test_copy_out_zero_length() {
        let src = [9u8; 10];
        assert_eq!(copy_out(&src, 0, 10), Transfer::Applied(Vec::new()));
    }
}

//! Vault creation and teardown.
//!
//! Loading an isolated vault is an external concern. The harness only sees
//! the [`Loader`] capability: `create` hands back a vault or a platform
//! [`StatusCode`], and `destroy` tears one down. [`LocalLoader`] is the
//! in-process implementation used by the binary and the tests.

use std::fmt;

use tracing::info;

use crate::error::VaultError;
use crate::rng::{RandomSource, SystemRandomSource};
use crate::vault::Vault;

/// Platform status codes a vault load can fail with.
///
/// The known codes form a fixed table, each with a message and an optional
/// remediation hint. Anything else is carried through as `Unknown`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusCode {
    Unexpected,
    InvalidParameter,
    OutOfMemory,
    EnclaveLost,
    InvalidEnclave,
    InvalidEnclaveId,
    InvalidSignature,
    OutOfEpc,
    NoDevice,
    MemoryMapConflict,
    InvalidMetadata,
    DeviceBusy,
    InvalidVersion,
    InvalidAttribute,
    EnclaveFileAccess,
    Unknown(u32),
}

impl StatusCode {
    /// Map a raw platform code onto the table.
    pub fn from_raw(raw: u32) -> Self {
        match raw {
            0x0001 => Self::Unexpected,
            0x0002 => Self::InvalidParameter,
            0x0003 => Self::OutOfMemory,
            0x0004 => Self::EnclaveLost,
            0x2001 => Self::InvalidEnclave,
            0x2002 => Self::InvalidEnclaveId,
            0x2003 => Self::InvalidSignature,
            0x2005 => Self::OutOfEpc,
            0x2006 => Self::NoDevice,
            0x2007 => Self::MemoryMapConflict,
            0x2008 => Self::InvalidAttribute,
            0x2009 => Self::InvalidMetadata,
            0x200c => Self::DeviceBusy,
            0x200d => Self::InvalidVersion,
            0x200f => Self::EnclaveFileAccess,
            other => Self::Unknown(other),
        }
    }

    /// The raw platform code.
    pub fn raw(&self) -> u32 {
        match self {
            Self::Unexpected => 0x0001,
            Self::InvalidParameter => 0x0002,
            Self::OutOfMemory => 0x0003,
            Self::EnclaveLost => 0x0004,
            Self::InvalidEnclave => 0x2001,
            Self::InvalidEnclaveId => 0x2002,
            Self::InvalidSignature => 0x2003,
            Self::OutOfEpc => 0x2005,
            Self::NoDevice => 0x2006,
            Self::MemoryMapConflict => 0x2007,
            Self::InvalidAttribute => 0x2008,
            Self::InvalidMetadata => 0x2009,
            Self::DeviceBusy => 0x200c,
            Self::InvalidVersion => 0x200d,
            Self::EnclaveFileAccess => 0x200f,
            Self::Unknown(raw) => *raw,
        }
    }

    /// Human-readable message, or `None` for codes outside the table.
    pub fn message(&self) -> Option<&'static str> {
        let msg = match self {
            Self::Unexpected => "Unexpected error occurred.",
            Self::InvalidParameter => "Invalid parameter.",
            Self::OutOfMemory => "Out of memory.",
            Self::EnclaveLost => "Power transition occurred.",
            Self::InvalidEnclave => "Invalid enclave image.",
            Self::InvalidEnclaveId => "Invalid enclave identification.",
            Self::InvalidSignature => "Invalid enclave signature.",
            Self::OutOfEpc => "Out of EPC memory.",
            Self::NoDevice => "Invalid isolation device.",
            Self::MemoryMapConflict => "Memory map conflicted.",
            Self::InvalidMetadata => "Invalid enclave metadata.",
            Self::DeviceBusy => "Isolation device was busy.",
            Self::InvalidVersion => "Enclave version was invalid.",
            Self::InvalidAttribute => "Enclave was not authorized.",
            Self::EnclaveFileAccess => "Can't open enclave file.",
            Self::Unknown(_) => return None,
        };
        Some(msg)
    }

    /// Remediation hint, for the few codes that have one.
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::EnclaveLost => Some("Re-create the vault after a power transition."),
            Self::NoDevice => Some(
                "Make sure the isolation module is enabled in firmware, then install its driver.",
            ),
            _ => None,
        }
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.message() {
            Some(msg) => {
                if let Some(hint) = self.hint() {
                    writeln!(f, "Info: {}", hint)?;
                }
                write!(f, "Error: {}", msg)
            }
            None => write!(
                f,
                "Error code is 0x{:X}. Please refer to the platform developer reference for more details.",
                self.raw()
            ),
        }
    }
}

impl From<VaultError> for StatusCode {
    fn from(err: VaultError) -> Self {
        match err {
            VaultError::AllocationFailure { .. } => Self::OutOfMemory,
            _ => Self::Unexpected,
        }
    }
}

/// Creates and destroys vaults.
pub trait Loader {
    /// Random source handed to every vault this loader creates.
    type Rng: RandomSource;

    fn create(&mut self) -> Result<Vault<Self::Rng>, StatusCode>;

    /// Tear `vault` down. Its buffers and key are wiped as it drops.
    fn destroy(&mut self, vault: Vault<Self::Rng>) -> Result<(), StatusCode>;
}

/// Builds vaults in the current process, backed by the system CSPRNG.
#[derive(Debug, Default)]
pub struct LocalLoader {
    next_id: u64,
}

impl LocalLoader {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Loader for LocalLoader {
    type Rng = SystemRandomSource;

    fn create(&mut self) -> Result<Vault<SystemRandomSource>, StatusCode> {
        self.next_id += 1;
        let vault = Vault::init(self.next_id, SystemRandomSource::new())?;
        info!(vault = vault.id(), "vault created");
        Ok(vault)
    }

    fn destroy(&mut self, vault: Vault<SystemRandomSource>) -> Result<(), StatusCode> {
        info!(vault = vault.id(), "vault destroyed");
        drop(vault);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TABLE: [u32; 15] = [
        0x0001, 0x0002, 0x0003, 0x0004, 0x2001, 0x2002, 0x2003, 0x2005, 0x2006, 0x2007, 0x2008,
        0x2009, 0x200c, 0x200d, 0x200f,
    ];

    #[test]
    fn test_table_codes_round_trip() {
        for raw in TABLE {
            let code = StatusCode::from_raw(raw);
            assert!(!matches!(code, StatusCode::Unknown(_)), "0x{:X}", raw);
            assert_eq!(code.raw(), raw);
            assert!(code.message().is_some());
        }
    }

    #[test]
    fn test_unknown_code_generic_report() {
        let code = StatusCode::from_raw(0x3001);
        assert_eq!(code, StatusCode::Unknown(0x3001));
        assert!(code.message().is_none());
        assert_eq!(
            code.to_string(),
            "Error code is 0x3001. Please refer to the platform developer reference for more details."
        );
    }

    #[test]
    fn test_hint_precedes_message() {
        let rendered = StatusCode::NoDevice.to_string();
        let mut lines = rendered.lines();
        assert!(lines.next().unwrap().starts_with("Info: "));
        assert_eq!(lines.next().unwrap(), "Error: Invalid isolation device.");

        assert_eq!(StatusCode::OutOfMemory.to_string(), "Error: Out of memory.");
    }

    #[test]
    fn test_local_loader_assigns_fresh_ids() {
        let mut loader = LocalLoader::new();
        let a = loader.create().unwrap();
        let b = loader.create().unwrap();
        assert_ne!(a.id(), b.id());
        loader.destroy(a).unwrap();
        loader.destroy(b).unwrap();
    }
}

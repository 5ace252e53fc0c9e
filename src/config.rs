//! Harness configuration.
//!
//! A run is described by how many times each call is repeated and how many
//! bytes the data-moving calls carry. A zero data length selects the
//! lifecycle family of scenarios; anything larger selects the data family.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::harness::{HarnessError, ScenarioFamily};

/// Repetitions per call kind when nothing else is configured.
pub const DEFAULT_ITERATIONS: usize = 10;

/// Byte used to build payloads.
pub const DEFAULT_FILL_BYTE: u8 = 0x41;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HarnessConfig {
    /// Repetitions of each call kind. Must be non-zero.
    pub iterations: usize,
    /// Bytes moved by copy and crypto calls. Zero selects the lifecycle family.
    pub data_len: usize,
    /// Every payload byte is set to this value.
    pub fill_byte: u8,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            iterations: DEFAULT_ITERATIONS,
            data_len: 0,
            fill_byte: DEFAULT_FILL_BYTE,
        }
    }
}

impl HarnessConfig {
    /// Load a configuration from a JSON file. Missing fields take defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, HarnessError> {
        let raw = fs::read_to_string(path)?;
        Self::from_json(&raw)
    }

    pub fn from_json(raw: &str) -> Result<Self, HarnessError> {
        let config: Self = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), HarnessError> {
        if self.iterations == 0 {
            return Err(HarnessError::ZeroRepetitions);
        }
        Ok(())
    }

    pub fn family(&self) -> ScenarioFamily {
        ScenarioFamily::select(self.data_len)
    }

    /// The bytes handed to every data-moving call.
    pub fn payload(&self) -> Vec<u8> {
        vec![self.fill_byte; self.data_len]
    }
}

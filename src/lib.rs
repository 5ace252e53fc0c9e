//! # vaultbench
//!
//! Micro-benchmark harness for a boundary-isolated data vault.
//!
//! A [`Vault`] holds a small amount of protected state: a fixed-capacity
//! buffer, at most one dynamically sized buffer and at most one AES-128-GCM
//! session key. It is only reachable through narrow, length-checked calls.
//! The [`Harness`] drives a vault through those calls and records the
//! elapsed time of every single invocation.
//!
//! ## Public API
//!
//! - [`Vault`] and its call surface, plus the capacities it enforces.
//! - [`Transfer`] / [`Rejection`]: the outcome of every boundary copy. An
//!   oversize request is a silent no-op, reported as `Rejected`.
//! - [`Decrypted`]: an opened frame plus its authentication verdict.
//! - [`Loader`] / [`LocalLoader`] / [`StatusCode`]: vault creation and
//!   teardown.
//! - [`Harness`], [`CallKind`], [`TimingSeries`], [`Scenario`] and
//!   [`run_suite`]: the measurement side.
//! - [`report`]: JSON-lines output of finished series.

pub mod boundary;
pub mod config;
pub mod crypto;
pub mod error;
pub mod harness;
pub(crate) mod keys;
pub mod lifecycle;
pub mod report;
pub mod rng;
pub mod vault;

pub use boundary::{Direction, Rejection, Transfer};
pub use config::HarnessConfig;
pub use crypto::{Decrypted, FRAME_OVERHEAD, IV_LEN, KEY_LEN, TAG_LEN};
pub use error::VaultError;
pub use harness::{
    run_suite, CallKind, CallRecord, Harness, HarnessError, HarnessState, Scenario,
    ScenarioFamily, TimingSeries,
};
pub use lifecycle::{Loader, LocalLoader, StatusCode};
pub use rng::{RandomSource, SystemRandomSource};
pub use vault::{Vault, DYNAMIC_CAPACITY, FIXED_CAPACITY};

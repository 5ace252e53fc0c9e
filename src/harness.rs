//! The untrusted-side benchmark driver.
//!
//! A [`Harness`] owns one vault at a time and walks it through a small state
//! machine:
//!
//! ```text
//! Uninitialized --create--> Created --run--> Running(kind) --destroy--> Destroyed
//!                                    ^            |
//!                                    +----run-----+
//! ```
//!
//! Every call issued by `run` is timed on its own with a monotonic clock and
//! folded into a [`TimingSeries`] for its call kind. Lifecycle churn
//! (create + destroy, repeated) is measured separately while no vault is
//! held.

use std::fmt;
use std::hint::black_box;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::boundary::Transfer;
use crate::config::HarnessConfig;
use crate::error::VaultError;
use crate::lifecycle::{Loader, StatusCode};
use crate::rng::RandomSource;
use crate::vault::Vault;

// ---------------------------------------------------------------------------
// Call kinds and state
// ---------------------------------------------------------------------------

/// Every kind of call the harness can time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallKind {
    Noop,
    RandomWrite,
    RandomRead,
    CopyIn,
    CopyOut,
    AllocCopyIn,
    AllocCopyOut,
    FreeDynamic,
    CryptoInit,
    Encrypt,
    Decrypt,
    /// A create + destroy pair. Only measured by [`Harness::churn`].
    Lifecycle,
}

impl CallKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Noop => "noop",
            Self::RandomWrite => "random_write",
            Self::RandomRead => "random_read",
            Self::CopyIn => "copy_in",
            Self::CopyOut => "copy_out",
            Self::AllocCopyIn => "alloc_copy_in",
            Self::AllocCopyOut => "alloc_copy_out",
            Self::FreeDynamic => "free_dynamic",
            Self::CryptoInit => "crypto_init",
            Self::Encrypt => "encrypt",
            Self::Decrypt => "decrypt",
            Self::Lifecycle => "lifecycle",
        }
    }

    /// Whether this kind is a call on a live vault.
    pub fn is_vault_call(&self) -> bool {
        !matches!(self, Self::Lifecycle)
    }
}

impl fmt::Display for CallKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Where the harness is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HarnessState {
    Uninitialized,
    Created,
    Running(CallKind),
    Destroyed,
}

impl fmt::Display for HarnessState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Uninitialized => write!(f, "uninitialized"),
            Self::Created => write!(f, "created"),
            Self::Running(kind) => write!(f, "running {}", kind),
            Self::Destroyed => write!(f, "destroyed"),
        }
    }
}

#[derive(Debug, Error)]
pub enum HarnessError {
    /// Vault creation failed. Fatal to the run.
    #[error("vault creation failed: {0}")]
    Create(StatusCode),

    /// Vault teardown failed. Fatal to the run, never retried.
    #[error("vault destruction failed with code 0x{:X}", .0.raw())]
    Destroy(StatusCode),

    #[error("harness is {found}, expected {expected}")]
    InvalidState {
        expected: &'static str,
        found: HarnessState,
    },

    #[error("repetition count must be greater than zero")]
    ZeroRepetitions,

    #[error("no call kinds given")]
    EmptySequence,

    #[error("{0} cannot be issued against a live vault")]
    UnsupportedCall(CallKind),

    #[error("invalid configuration: {0}")]
    Config(#[from] serde_json::Error),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Vault(#[from] VaultError),
}

// ---------------------------------------------------------------------------
// Measurement
// ---------------------------------------------------------------------------

/// Start and end of a single call.
#[derive(Debug, Clone, Copy)]
pub struct CallRecord {
    start: Instant,
    end: Instant,
}

impl CallRecord {
    /// Time exactly one invocation of `call`.
    ///
    /// The result is passed through `black_box` before the end timestamp so
    /// the call cannot be hoisted out or elided.
    pub fn measure<T>(call: impl FnOnce() -> T) -> (Self, T) {
        let start = Instant::now();
        let out = black_box(call());
        let end = Instant::now();
        (Self { start, end }, out)
    }

    pub fn elapsed(&self) -> Duration {
        self.end.saturating_duration_since(self.start)
    }
}

/// Elapsed time of every repetition of one call kind, in issue order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimingSeries {
    kind: CallKind,
    samples: Vec<Duration>,
}

impl TimingSeries {
    fn new(kind: CallKind, samples: Vec<Duration>) -> Self {
        Self { kind, samples }
    }

    pub fn kind(&self) -> CallKind {
        self.kind
    }

    pub fn samples(&self) -> &[Duration] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Duration> {
        self.samples.iter()
    }
}

// ---------------------------------------------------------------------------
// Scenarios
// ---------------------------------------------------------------------------

/// A named benchmark built from one or more stages of interleaved calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scenario {
    Noop,
    RandomReadWrite,
    Churn,
    CopyRoundTrip,
    AllocRoundTrip,
    CryptoRoundTrip,
}

impl Scenario {
    /// Stages run in order against one vault. Each stage is a call sequence
    /// repeated as a unit.
    pub fn stages(&self) -> &'static [&'static [CallKind]] {
        match self {
            Self::Noop => &[&[CallKind::Noop]],
            Self::RandomReadWrite => &[&[CallKind::RandomWrite, CallKind::RandomRead]],
            Self::Churn => &[],
            Self::CopyRoundTrip => &[&[CallKind::CopyIn, CallKind::CopyOut]],
            Self::AllocRoundTrip => &[&[
                CallKind::AllocCopyIn,
                CallKind::AllocCopyOut,
                CallKind::FreeDynamic,
            ]],
            Self::CryptoRoundTrip => &[
                &[CallKind::CryptoInit],
                &[CallKind::Encrypt, CallKind::Decrypt],
            ],
        }
    }

    /// Whether the scenario needs a live vault.
    pub fn needs_vault(&self) -> bool {
        !matches!(self, Self::Churn)
    }
}

/// Which group of scenarios a run executes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScenarioFamily {
    /// Fixed boundary costs: no-op calls, random read/write, create/destroy.
    Lifecycle,
    /// Data-moving costs: copies, dynamic allocation, encryption.
    Data,
}

impl ScenarioFamily {
    /// A zero data length selects `Lifecycle`, anything else `Data`.
    pub fn select(data_len: usize) -> Self {
        if data_len == 0 {
            Self::Lifecycle
        } else {
            Self::Data
        }
    }

    pub fn scenarios(&self) -> &'static [Scenario] {
        match self {
            Self::Lifecycle => &[Scenario::Noop, Scenario::RandomReadWrite, Scenario::Churn],
            Self::Data => &[
                Scenario::CopyRoundTrip,
                Scenario::AllocRoundTrip,
                Scenario::CryptoRoundTrip,
            ],
        }
    }
}

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

/// Drives one vault at a time through timed calls.
pub struct Harness<L: Loader> {
    loader: L,
    vault: Option<Vault<L::Rng>>,
    state: HarnessState,
    payload: Vec<u8>,
}

impl<L: Loader> Harness<L> {
    /// `payload` is the byte string every data-moving call carries.
    pub fn new(loader: L, payload: Vec<u8>) -> Self {
        Self {
            loader,
            vault: None,
            state: HarnessState::Uninitialized,
            payload,
        }
    }

    pub fn state(&self) -> HarnessState {
        self.state
    }

    /// The live vault, for inspection between runs.
    pub fn vault(&self) -> Option<&Vault<L::Rng>> {
        self.vault.as_ref()
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Create the vault. Allowed from `Uninitialized` or `Destroyed`.
    pub fn create(&mut self) -> Result<(), HarnessError> {
        match self.state {
            HarnessState::Uninitialized | HarnessState::Destroyed => {}
            found => {
                return Err(HarnessError::InvalidState {
                    expected: "uninitialized or destroyed",
                    found,
                })
            }
        }

        let vault = self.loader.create().map_err(|code| {
            warn!(code = code.raw(), "vault creation failed");
            HarnessError::Create(code)
        })?;
        self.vault = Some(vault);
        self.state = HarnessState::Created;
        Ok(())
    }

    /// Issue `kinds` in order, `repetitions` times, and time every call.
    ///
    /// Returns one series per entry in `kinds`, each of length
    /// `repetitions`. Call failures other than lifecycle failures are logged
    /// and the sample is still recorded.
    pub fn run(
        &mut self,
        kinds: &[CallKind],
        repetitions: usize,
    ) -> Result<Vec<TimingSeries>, HarnessError> {
        if repetitions == 0 {
            return Err(HarnessError::ZeroRepetitions);
        }
        if kinds.is_empty() {
            return Err(HarnessError::EmptySequence);
        }
        if let Some(&kind) = kinds.iter().find(|kind| !kind.is_vault_call()) {
            return Err(HarnessError::UnsupportedCall(kind));
        }
        let vault = match (self.state, self.vault.as_mut()) {
            (HarnessState::Created | HarnessState::Running(_), Some(vault)) => vault,
            (found, _) => {
                return Err(HarnessError::InvalidState {
                    expected: "created or running",
                    found,
                })
            }
        };

        let payload = self.payload.as_slice();
        let mut frame = None;
        if kinds.contains(&CallKind::Decrypt) {
            // Decrypt needs something to open even before the first Encrypt.
            frame = Some(vault.encrypt(payload, payload.len())?);
        }

        debug!(vault = vault.id(), ?kinds, repetitions, "running calls");
        let mut samples: Vec<Vec<Duration>> = kinds
            .iter()
            .map(|_| Vec::with_capacity(repetitions))
            .collect();

        for _ in 0..repetitions {
            for (slot, &kind) in kinds.iter().enumerate() {
                self.state = HarnessState::Running(kind);
                samples[slot].push(issue(vault, kind, payload, &mut frame));
            }
        }

        Ok(kinds
            .iter()
            .zip(samples)
            .map(|(&kind, samples)| TimingSeries::new(kind, samples))
            .collect())
    }

    /// Run every stage of `scenario`, or churn if that is the scenario.
    pub fn run_scenario(
        &mut self,
        scenario: Scenario,
        repetitions: usize,
    ) -> Result<Vec<TimingSeries>, HarnessError> {
        if !scenario.needs_vault() {
            return Ok(vec![self.churn(repetitions)?]);
        }

        let mut series = Vec::new();
        for stage in scenario.stages() {
            series.extend(self.run(stage, repetitions)?);
        }
        Ok(series)
    }

    /// Tear down the vault. Exactly one attempt; failure is fatal.
    pub fn destroy(&mut self) -> Result<(), HarnessError> {
        let vault = match (self.state, self.vault.take()) {
            (HarnessState::Created | HarnessState::Running(_), Some(vault)) => vault,
            (found, vault) => {
                self.vault = vault;
                return Err(HarnessError::InvalidState {
                    expected: "created or running",
                    found,
                });
            }
        };

        // The vault is gone whether or not the loader reports success.
        self.state = HarnessState::Destroyed;
        self.loader.destroy(vault).map_err(HarnessError::Destroy)
    }

    /// Time `repetitions` create + destroy pairs.
    ///
    /// Only valid while no vault is held. Any lifecycle failure aborts.
    pub fn churn(&mut self, repetitions: usize) -> Result<TimingSeries, HarnessError> {
        if repetitions == 0 {
            return Err(HarnessError::ZeroRepetitions);
        }
        match self.state {
            HarnessState::Uninitialized | HarnessState::Destroyed => {}
            found => {
                return Err(HarnessError::InvalidState {
                    expected: "uninitialized or destroyed",
                    found,
                })
            }
        }

        let loader = &mut self.loader;
        let mut samples = Vec::with_capacity(repetitions);
        for _ in 0..repetitions {
            let (record, outcome) = CallRecord::measure(|| -> Result<(), HarnessError> {
                let vault = loader.create().map_err(HarnessError::Create)?;
                loader.destroy(vault).map_err(HarnessError::Destroy)
            });
            outcome?;
            samples.push(record.elapsed());
        }

        self.state = HarnessState::Destroyed;
        Ok(TimingSeries::new(CallKind::Lifecycle, samples))
    }
}

impl<L: Loader> Drop for Harness<L> {
    fn drop(&mut self) {
        if let Some(vault) = self.vault.take() {
            if let Err(code) = self.loader.destroy(vault) {
                warn!(code = code.raw(), "vault destruction failed during harness drop");
            }
        }
    }
}

/// Issue one call and return its elapsed time.
fn issue<R: RandomSource>(
    vault: &mut Vault<R>,
    kind: CallKind,
    payload: &[u8],
    frame: &mut Option<Vec<u8>>,
) -> Duration {
    let len = payload.len();
    let record = match kind {
        CallKind::Noop => CallRecord::measure(|| vault.noop()).0,
        CallKind::RandomWrite => {
            let (record, out) = CallRecord::measure(|| vault.random_fill());
            note(kind, out);
            record
        }
        CallKind::RandomRead => {
            let (record, out) = CallRecord::measure(|| vault.random_read());
            note(kind, out);
            record
        }
        CallKind::CopyIn => {
            let (record, out) = CallRecord::measure(|| vault.copy_in(payload, len));
            note_transfer(kind, &out);
            record
        }
        CallKind::CopyOut => {
            let (record, out) = CallRecord::measure(|| vault.copy_out(len));
            note_transfer(kind, &out);
            record
        }
        CallKind::AllocCopyIn => {
            let (record, out) = CallRecord::measure(|| vault.alloc_copy_in(payload, len));
            if let Some(transfer) = note(kind, out) {
                note_transfer(kind, &transfer);
            }
            record
        }
        CallKind::AllocCopyOut => {
            let (record, out) = CallRecord::measure(|| vault.alloc_copy_out(len));
            note_transfer(kind, &out);
            record
        }
        CallKind::FreeDynamic => CallRecord::measure(|| vault.free_dynamic()).0,
        CallKind::CryptoInit => {
            let (record, out) = CallRecord::measure(|| vault.crypto_init());
            note(kind, out);
            record
        }
        CallKind::Encrypt => {
            let (record, out) = CallRecord::measure(|| vault.encrypt(payload, len));
            if let Some(sealed) = note(kind, out) {
                *frame = Some(sealed);
            }
            record
        }
        CallKind::Decrypt => {
            let sealed = frame.as_deref().unwrap_or(&[]);
            // Authentication failures are logged by the crypto layer.
            let (record, out) = CallRecord::measure(|| vault.decrypt(sealed, len));
            note(kind, out);
            record
        }
        // Rejected by `Harness::run` before any call is issued.
        CallKind::Lifecycle => return Duration::ZERO,
    };
    record.elapsed()
}

/// Log a failed call without aborting the run.
fn note<T>(kind: CallKind, outcome: Result<T, VaultError>) -> Option<T> {
    match outcome {
        Ok(value) => Some(value),
        Err(err) => {
            warn!(%kind, error = %err, "call failed");
            None
        }
    }
}

fn note_transfer<T>(kind: CallKind, transfer: &Transfer<T>) {
    if let Some(rejection) = transfer.rejection() {
        debug!(
            %kind,
            requested = rejection.requested,
            limit = rejection.limit,
            "call rejected at boundary"
        );
    }
}

/// Run every scenario of the configured family, each against a fresh vault.
pub fn run_suite<L: Loader>(
    loader: L,
    config: &HarnessConfig,
) -> Result<Vec<TimingSeries>, HarnessError> {
    config.validate()?;
    let family = config.family();
    info!(
        ?family,
        iterations = config.iterations,
        data_len = config.data_len,
        "starting suite"
    );

    let mut harness = Harness::new(loader, config.payload());
    let mut series = Vec::new();
    for &scenario in family.scenarios() {
        info!(?scenario, "running scenario");
        if !scenario.needs_vault() {
            series.extend(harness.run_scenario(scenario, config.iterations)?);
            continue;
        }

        harness.create()?;
        let outcome = harness.run_scenario(scenario, config.iterations);
        harness.destroy()?;
        series.extend(outcome?);
    }
    Ok(series)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::LocalLoader;

    fn harness(payload: Vec<u8>) -> Harness<LocalLoader> {
        Harness::new(LocalLoader::new(), payload)
    }

    #[test]
    fn test_call_record_elapsed_is_monotonic() {
        let (record, value) = CallRecord::measure(|| 42);
        assert_eq!(value, 42);
        assert!(record.end >= record.start);
    }

    #[test]
    fn test_state_transitions() {
        let mut h = harness(vec![1u8; 8]);
        assert_eq!(h.state(), HarnessState::Uninitialized);

        h.create().unwrap();
        assert_eq!(h.state(), HarnessState::Created);

        h.run(&[CallKind::CopyIn, CallKind::CopyOut], 3).unwrap();
        assert_eq!(h.state(), HarnessState::Running(CallKind::CopyOut));

        h.destroy().unwrap();
        assert_eq!(h.state(), HarnessState::Destroyed);
        assert!(h.vault().is_none());
    }

    #[test]
    fn test_lifecycle_kind_rejected_in_run() {
        let mut h = harness(Vec::new());
        h.create().unwrap();
        assert!(matches!(
            h.run(&[CallKind::Lifecycle], 1),
            Err(HarnessError::UnsupportedCall(CallKind::Lifecycle))
        ));
    }

    #[test]
    fn test_empty_sequence_rejected() {
        let mut h = harness(Vec::new());
        h.create().unwrap();
        assert!(matches!(h.run(&[], 1), Err(HarnessError::EmptySequence)));
    }

    #[test]
    fn test_decrypt_alone_uses_presealed_frame() {
        let mut h = harness(vec![9u8; 32]);
        h.create().unwrap();
        let series = h.run(&[CallKind::Decrypt], 4).unwrap();
        assert_eq!(series.len(), 1);
        assert_eq!(series[0].len(), 4);
    }

    #[test]
    fn test_family_selection() {
        assert_eq!(ScenarioFamily::select(0), ScenarioFamily::Lifecycle);
        assert_eq!(ScenarioFamily::select(1), ScenarioFamily::Data);
        assert!(ScenarioFamily::Lifecycle
            .scenarios()
            .contains(&Scenario::Churn));
    }
}

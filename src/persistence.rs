//! Persistence manager.
//!
//! Stores [`TuningConfig`] and [`FuelCounters`] as postcard records through
//! the [`StoragePort`].  Each record starts with its layout version; a
//! record written by a different firmware layout is discarded and replaced
//! with defaults rather than reinterpreted.
//!
//! Saves are requested by marking a record dirty and performed by
//! [`PersistenceManager::flush`] at the end of a control tick, so several
//! writes in the same tick cost one flash commit.

use core::fmt;

use log::{info, warn};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::app::ports::{StorageError, StoragePort};
use crate::config::{TUNING_VERSION, TuningConfig};
use crate::error::RejectReason;
use crate::fuel::{FUEL_VERSION, FuelCounters};

pub const CONFIG_NAMESPACE: &str = "config";
pub const TUNING_KEY: &str = "tuning";
pub const FUEL_NAMESPACE: &str = "fuel";
pub const FUEL_KEY: &str = "counters";

/// Both records encode well below this.
const RECORD_BUF: usize = 64;

/// Records that carry a layout version as their first field.
pub trait Versioned {
    const VERSION: u32;
    const NAME: &'static str;
}

impl Versioned for TuningConfig {
    const VERSION: u32 = TUNING_VERSION;
    const NAME: &'static str = "tuning";
}

impl Versioned for FuelCounters {
    const VERSION: u32 = FUEL_VERSION;
    const NAME: &'static str = "fuel counters";
}

/// How a load attempt went.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadStatus {
    Loaded,
    Missing,
    VersionMismatch { found: u32 },
    Corrupt,
    StorageFailed(StorageError),
}

impl LoadStatus {
    /// Whether defaults should be written back.
    pub fn needs_save(self) -> bool {
        matches!(
            self,
            Self::Missing | Self::VersionMismatch { .. } | Self::Corrupt
        )
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Loaded<T> {
    pub value: T,
    pub status: LoadStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PersistError {
    Storage(StorageError),
    Encode,
    Invalid(RejectReason),
}

impl fmt::Display for PersistError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Storage(e) => write!(f, "storage: {e}"),
            Self::Encode => write!(f, "record encoding failed"),
            Self::Invalid(r) => write!(f, "refusing to persist: {r}"),
        }
    }
}

impl From<StorageError> for PersistError {
    fn from(e: StorageError) -> Self {
        Self::Storage(e)
    }
}

/// Outcome of [`PersistenceManager::flush`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushReport {
    pub tuning_saved: bool,
    pub fuel_saved: bool,
    pub failures: u8,
}

#[derive(Debug, Default)]
pub struct PersistenceManager {
    tuning_dirty: bool,
    fuel_dirty: bool,
}

impl PersistenceManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load tuning, falling back to `seed` when nothing usable is stored.
    pub fn load_tuning<S: StoragePort>(
        &mut self,
        storage: &S,
        seed: TuningConfig,
    ) -> Loaded<TuningConfig> {
        let mut loaded = load_record(storage, CONFIG_NAMESPACE, TUNING_KEY, seed);
        if loaded.status == LoadStatus::Loaded {
            if let Err(reason) = loaded.value.validate() {
                warn!("Stored tuning rejected ({}), using defaults", reason);
                loaded = Loaded {
                    value: seed,
                    status: LoadStatus::Corrupt,
                };
            }
        }
        self.tuning_dirty |= loaded.status.needs_save();
        loaded
    }

    pub fn load_fuel<S: StoragePort>(&mut self, storage: &S) -> Loaded<FuelCounters> {
        let loaded = load_record(storage, FUEL_NAMESPACE, FUEL_KEY, FuelCounters::default());
        self.fuel_dirty |= loaded.status.needs_save();
        loaded
    }

    pub fn mark_tuning_dirty(&mut self) {
        self.tuning_dirty = true;
    }

    pub fn mark_fuel_dirty(&mut self) {
        self.fuel_dirty = true;
    }

    pub fn is_dirty(&self) -> bool {
        self.tuning_dirty || self.fuel_dirty
    }

    /// Write every dirty record.  Failed saves stay dirty and are retried
    /// on the next flush.
    pub fn flush<S: StoragePort>(
        &mut self,
        storage: &mut S,
        tuning: &TuningConfig,
        fuel: &FuelCounters,
    ) -> FlushReport {
        let mut report = FlushReport::default();

        if self.tuning_dirty {
            match save_tuning(storage, tuning) {
                Ok(()) => {
                    self.tuning_dirty = false;
                    report.tuning_saved = true;
                }
                Err(e) => {
                    warn!("Tuning save failed: {}", e);
                    report.failures += 1;
                    if matches!(e, PersistError::Invalid(_)) {
                        // Retrying cannot help.
                        self.tuning_dirty = false;
                    }
                }
            }
        }

        if self.fuel_dirty {
            match save_record(storage, FUEL_NAMESPACE, FUEL_KEY, fuel) {
                Ok(()) => {
                    self.fuel_dirty = false;
                    report.fuel_saved = true;
                }
                Err(e) => {
                    warn!("Fuel counter save failed: {}", e);
                    report.failures += 1;
                }
            }
        }

        report
    }
}

/// Validate and persist tuning immediately.
pub fn save_tuning<S: StoragePort>(storage: &mut S, tuning: &TuningConfig) -> Result<(), PersistError> {
    tuning.validate().map_err(PersistError::Invalid)?;
    save_record(storage, CONFIG_NAMESPACE, TUNING_KEY, tuning)
}

fn save_record<S, T>(storage: &mut S, namespace: &str, key: &str, value: &T) -> Result<(), PersistError>
where
    S: StoragePort,
    T: Serialize + Versioned,
{
    let mut buf = [0u8; RECORD_BUF];
    let bytes = postcard::to_slice(value, &mut buf).map_err(|_| PersistError::Encode)?;
    storage.write(namespace, key, bytes)?;
    info!("Saved {} ({} bytes)", T::NAME, bytes.len());
    Ok(())
}

fn load_record<S, T>(storage: &S, namespace: &str, key: &str, defaults: T) -> Loaded<T>
where
    S: StoragePort,
    T: DeserializeOwned + Versioned,
{
    let mut buf = [0u8; RECORD_BUF];
    let status = match storage.read(namespace, key, &mut buf) {
        Ok(n) => match decode_versioned::<T>(&buf[..n]) {
            Ok(value) => {
                info!("Loaded {} from storage", T::NAME);
                return Loaded {
                    value,
                    status: LoadStatus::Loaded,
                };
            }
            Err(status) => status,
        },
        Err(StorageError::NotFound) => LoadStatus::Missing,
        Err(e) => LoadStatus::StorageFailed(e),
    };

    match status {
        LoadStatus::Missing => info!("No stored {}, using defaults", T::NAME),
        LoadStatus::VersionMismatch { found } => warn!(
            "Stored {} has version {} (expected {}), resetting to defaults",
            T::NAME,
            found,
            T::VERSION
        ),
        LoadStatus::Corrupt => warn!("Stored {} is corrupt, resetting to defaults", T::NAME),
        LoadStatus::StorageFailed(e) => warn!("Reading {} failed ({}), using defaults", T::NAME, e),
        LoadStatus::Loaded => {}
    }
    Loaded {
        value: defaults,
        status,
    }
}

fn decode_versioned<T>(bytes: &[u8]) -> Result<T, LoadStatus>
where
    T: DeserializeOwned + Versioned,
{
    let (version, _) = postcard::take_from_bytes::<u32>(bytes).map_err(|_| LoadStatus::Corrupt)?;
    if version != T::VERSION {
        return Err(LoadStatus::VersionMismatch { found: version });
    }
    postcard::from_bytes(bytes).map_err(|_| LoadStatus::Corrupt)
}

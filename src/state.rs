//! Persistent per-service failure and alert counters.
use serde::{Deserialize, Deserializer, Serialize};
use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};
use tracing::{debug, warn};

use crate::constants::STATE_TMP_SUFFIX;
use crate::error::StateStoreError;

/// Failure bookkeeping for one service.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceState {
    /// Consecutive failed observations since the service was last seen healthy.
    #[serde(default)]
    pub failures: u32,
    /// Epoch seconds of the last successfully delivered alert (0 = never).
    #[serde(default, deserialize_with = "deserialize_epoch")]
    pub last_alert: u64,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawEpoch {
    Whole(u64),
    Fractional(f64),
}

/// Accepts both integer and fractional epoch timestamps.
fn deserialize_epoch<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    match RawEpoch::deserialize(deserializer)? {
        RawEpoch::Whole(secs) => Ok(secs),
        RawEpoch::Fractional(secs) if secs.is_finite() && secs >= 0.0 => {
            Ok(secs.trunc() as u64)
        }
        RawEpoch::Fractional(secs) => Err(serde::de::Error::custom(format!(
            "invalid alert timestamp {secs}"
        ))),
    }
}

/// Mapping from service name to its counters. Unknown services read as zeroed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StateTable {
    services: BTreeMap<String, ServiceState>,
}

impl StateTable {
    /// Returns the recorded state for `service`, or a zeroed state if none exists.
    pub fn get_or_default(&self, service: &str) -> ServiceState {
        self.services.get(service).copied().unwrap_or_default()
    }

    /// Mutable access to the state for `service`, creating a zeroed entry on first use.
    pub fn entry(&mut self, service: &str) -> &mut ServiceState {
        self.services.entry(service.to_string()).or_default()
    }

    /// Returns the recorded state only if an entry exists.
    pub fn get(&self, service: &str) -> Option<&ServiceState> {
        self.services.get(service)
    }

    pub fn services(&self) -> &BTreeMap<String, ServiceState> {
        &self.services
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }
}

/// Loads and saves the [`StateTable`] as a JSON document.
#[derive(Debug, Clone)]
pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the table from disk. Missing or unreadable files yield an empty table.
    pub fn load(&self) -> StateTable {
        if !self.path.exists() {
            warn!(
                "No state file at {:?}; starting with empty state",
                self.path
            );
            return StateTable::default();
        }

        match self.try_load() {
            Ok(table) => {
                debug!(
                    "Loaded state for {} service(s) from {:?}",
                    table.services.len(),
                    self.path
                );
                table
            }
            Err(err) => {
                warn!("Failed to load state from {:?}: {err}", self.path);
                StateTable::default()
            }
        }
    }

    fn try_load(&self) -> Result<StateTable, StateStoreError> {
        let contents = fs::read_to_string(&self.path)?;
        let table = serde_json::from_str::<StateTable>(&contents)?;
        Ok(table)
    }

    /// Overwrites the persisted table. The content is written to a sibling file
    /// first and renamed into place so readers never observe a partial write.
    pub fn save(&self, table: &StateTable) -> Result<(), StateStoreError> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }

        let mut tmp_name = self.path.clone().into_os_string();
        tmp_name.push(STATE_TMP_SUFFIX);
        let tmp_path = PathBuf::from(tmp_name);

        fs::write(&tmp_path, serde_json::to_string_pretty(table)?)?;
        if let Err(err) = fs::rename(&tmp_path, &self.path) {
            let _ = fs::remove_file(&tmp_path);
            return Err(err.into());
        }
        Ok(())
    }
}

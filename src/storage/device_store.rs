// Copyright 2026 Daniel Pelikan
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Persisted record of the selected accessory and link status.

use anyhow::Result;
use chrono::{DateTime, Local};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// The on-disk record. All fields are advisory status data, so a
/// last-writer-wins race between the daemon and a foreground `connect`
/// is acceptable.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeviceRecord {
    /// Hardware address of the last selected accessory.
    pub last_device_address: Option<String>,

    /// Display name of the last selected accessory.
    pub last_device_name: Option<String>,

    /// Whether a link is currently streaming.
    pub connected: bool,

    /// When a link last entered streaming.
    pub last_connected_at: Option<DateTime<Local>>,
}

/// Device record store backed by a toml file in the data directory.
pub struct DeviceStore {
    path: PathBuf,
    record: RwLock<DeviceRecord>,
}

impl DeviceStore {
    /// Open the store, creating an empty record on first run.
    ///
    /// An unreadable file is replaced with an empty record rather than
    /// refusing to start; the only data lost is advisory.
    pub fn open(data_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(data_dir)?;
        let path = data_dir.join("device.toml");

        let record = if path.exists() {
            let content = std::fs::read_to_string(&path)?;
            match toml::from_str(&content) {
                Ok(record) => record,
                Err(err) => {
                    warn!("device record unreadable, starting fresh: {err}");
                    DeviceRecord::default()
                }
            }
        } else {
            DeviceRecord::default()
        };

        Ok(Self {
            path,
            record: RwLock::new(record),
        })
    }

    pub fn last_device_address(&self) -> Option<String> {
        self.record.read().last_device_address.clone()
    }

    pub fn last_device_name(&self) -> Option<String> {
        self.record.read().last_device_name.clone()
    }

    pub fn is_connected(&self) -> bool {
        self.record.read().connected
    }

    /// Snapshot of the whole record, for status reporting.
    pub fn record(&self) -> DeviceRecord {
        self.record.read().clone()
    }

    /// Remember the accessory the user selected.
    pub fn set_last_device(&self, address: &str, name: Option<&str>) -> Result<()> {
        let mut record = self.record.write();
        record.last_device_address = Some(address.to_string());
        record.last_device_name = name.map(str::to_string);
        info!(address, "accessory selection persisted");
        self.persist(&record)
    }

    /// Record whether a link is currently streaming.
    pub fn set_connected(&self, connected: bool) -> Result<()> {
        let mut record = self.record.write();
        record.connected = connected;
        if connected {
            record.last_connected_at = Some(Local::now());
        }
        self.persist(&record)
    }

    fn persist(&self, record: &DeviceRecord) -> Result<()> {
        let content = toml::to_string_pretty(record)?;
        std::fs::write(&self.path, content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_selection_survives_reopen() {
        let dir = tempdir().unwrap();
        {
            let store = DeviceStore::open(dir.path()).unwrap();
            store
                .set_last_device("AA:BB:CC:DD:EE:FF", Some("GuardLink Band"))
                .unwrap();
            store.set_connected(true).unwrap();
        }

        let store = DeviceStore::open(dir.path()).unwrap();
        assert_eq!(
            store.last_device_address().as_deref(),
            Some("AA:BB:CC:DD:EE:FF")
        );
        assert_eq!(store.last_device_name().as_deref(), Some("GuardLink Band"));
        assert!(store.is_connected());
        assert!(store.record().last_connected_at.is_some());
    }

    #[test]
    fn test_disconnect_clears_flag_but_keeps_selection() {
        let dir = tempdir().unwrap();
        let store = DeviceStore::open(dir.path()).unwrap();
        store.set_last_device("AA:BB:CC:DD:EE:FF", None).unwrap();
        store.set_connected(true).unwrap();
        store.set_connected(false).unwrap();

        assert!(!store.is_connected());
        assert!(store.last_device_address().is_some());
        assert_eq!(store.last_device_name(), None);
    }

    #[test]
    fn test_corrupt_record_starts_fresh() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("device.toml"), "not [valid toml").unwrap();

        let store = DeviceStore::open(dir.path()).unwrap();
        assert_eq!(store.last_device_address(), None);
        assert!(!store.is_connected());
    }
}

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf, sync::RwLock};
use uuid::Uuid;

use crate::models::BeaconId;

const DEFAULT_REGION_UUID: Uuid = Uuid::from_u128(0x5a4bcfce_174e_4bac_a814_092e77f6b7e5);

/// The single beacon region being monitored and ranged.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BeaconRegion {
    pub uuid: Uuid,
    pub identifier: String,
    pub major: Option<u16>,
    pub minor: Option<u16>,
}

impl Default for BeaconRegion {
    fn default() -> Self {
        Self {
            uuid: DEFAULT_REGION_UUID,
            identifier: "MyBeacon".into(),
            major: None,
            minor: None,
        }
    }
}

impl BeaconRegion {
    pub fn matches(&self, beacon: &BeaconId) -> bool {
        beacon.uuid == self.uuid
            && self.major.map_or(true, |major| major == beacon.major)
            && self.minor.map_or(true, |minor| minor == beacon.minor)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct RecorderSettings {
    pub region: BeaconRegion,
    /// Refresh the published recent list every N accepted samples.
    pub refresh_every: u32,
    /// Cap on the published recent list.
    pub recent_limit: usize,
    pub database_file: String,
    pub export_file: String,
}

impl Default for RecorderSettings {
    fn default() -> Self {
        Self {
            region: BeaconRegion::default(),
            refresh_every: 10,
            recent_limit: 50,
            database_file: "beacon_signal.sqlite3".into(),
            export_file: "export.csv".into(),
        }
    }
}

impl RecorderSettings {
    pub fn refresh_every(&self) -> u64 {
        u64::from(self.refresh_every.max(1))
    }
}

pub struct SettingsStore {
    path: PathBuf,
    data: RwLock<RecorderSettings>,
}

impl SettingsStore {
    pub fn new(path: PathBuf) -> Result<Self> {
        let data = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read settings from {}", path.display()))?;
            serde_json::from_str(&contents).unwrap_or_else(|err| {
                log::warn!(
                    "Ignoring unreadable settings at {}: {err}",
                    path.display()
                );
                RecorderSettings::default()
            })
        } else {
            RecorderSettings::default()
        };

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    pub fn settings(&self) -> RecorderSettings {
        match self.data.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn update(&self, settings: RecorderSettings) -> Result<()> {
        let mut guard = match self.data.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        self.persist(&settings)?;
        *guard = settings;
        Ok(())
    }

    fn persist(&self, data: &RecorderSettings) -> Result<()> {
        let serialized = serde_json::to_string_pretty(data)?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("Failed to write settings to {}", self.path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn beacon(major: u16, minor: u16) -> BeaconId {
        BeaconId {
            uuid: DEFAULT_REGION_UUID,
            major,
            minor,
        }
    }

    #[test]
    fn default_region_uuid() {
        assert_eq!(
            BeaconRegion::default().uuid.to_string(),
            "5a4bcfce-174e-4bac-a814-092e77f6b7e5"
        );
    }

    #[test]
    fn region_matching() {
        let any = BeaconRegion::default();
        assert!(any.matches(&beacon(6298, 39450)));
        assert!(!any.matches(&BeaconId {
            uuid: Uuid::nil(),
            major: 6298,
            minor: 39450,
        }));

        let pinned = BeaconRegion {
            major: Some(6298),
            minor: Some(39450),
            ..BeaconRegion::default()
        };
        assert!(pinned.matches(&beacon(6298, 39450)));
        assert!(!pinned.matches(&beacon(6298, 1)));
    }

    #[test]
    fn refresh_every_is_at_least_one() {
        let settings = RecorderSettings {
            refresh_every: 0,
            ..RecorderSettings::default()
        };
        assert_eq!(settings.refresh_every(), 1);
    }

    #[test]
    fn missing_file_gives_defaults_and_update_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");

        let store = SettingsStore::new(path.clone()).unwrap();
        assert_eq!(store.settings(), RecorderSettings::default());

        let mut changed = store.settings();
        changed.refresh_every = 1;
        changed.recent_limit = 20;
        store.update(changed.clone()).unwrap();

        let reloaded = SettingsStore::new(path).unwrap();
        assert_eq!(reloaded.settings(), changed);
    }

    #[test]
    fn partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, r#"{ "refreshEvery": 3 }"#).unwrap();

        let settings = SettingsStore::new(path).unwrap().settings();
        assert_eq!(settings.refresh_every, 3);
        assert_eq!(settings.recent_limit, 50);
    }

    #[test]
    fn unparsable_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, "not json").unwrap();

        let settings = SettingsStore::new(path).unwrap().settings();
        assert_eq!(settings, RecorderSettings::default());
    }
}

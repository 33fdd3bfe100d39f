//! Fleet registry and directory listing.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::device::{Device, DeviceDriver};

/// One configured drone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FleetEntry {
    pub id: String,
    pub model: String,
    pub name: String,
}

impl FleetEntry {
    pub fn new(id: &str, model: &str, name: &str) -> Self {
        Self {
            id: id.to_string(),
            model: model.to_string(),
            name: name.to_string(),
        }
    }
}

/// Directory row returned to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    pub id: String,
    pub name: String,
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum FleetError {
    #[error("fleet must contain at least one drone")]
    Empty,
    #[error("duplicate drone id: {0}")]
    DuplicateId(String),
    #[error("drone id must not be blank or contain whitespace: {0:?}")]
    InvalidId(String),
}

/// The drones this process controls. Fixed after construction.
pub struct Fleet {
    devices: Vec<Arc<Device>>,
    directory: Vec<DeviceInfo>,
    index: HashMap<String, usize>,
}

impl Fleet {
    pub fn new(entries: &[FleetEntry], driver: Arc<dyn DeviceDriver>) -> Result<Self, FleetError> {
        if entries.is_empty() {
            return Err(FleetError::Empty);
        }

        let mut devices = Vec::with_capacity(entries.len());
        let mut directory = Vec::with_capacity(entries.len());
        let mut index = HashMap::with_capacity(entries.len());

        for entry in entries {
            if entry.id.is_empty() || entry.id.chars().any(char::is_whitespace) {
                return Err(FleetError::InvalidId(entry.id.clone()));
            }
            if index.insert(entry.id.clone(), devices.len()).is_some() {
                return Err(FleetError::DuplicateId(entry.id.clone()));
            }
            devices.push(Arc::new(Device::new(
                entry.id.clone(),
                entry.model.clone(),
                driver.clone(),
            )));
            directory.push(DeviceInfo {
                id: entry.id.clone(),
                name: entry.name.clone(),
            });
        }

        Ok(Self {
            devices,
            directory,
            index,
        })
    }

    /// Entries used when no fleet file is configured.
    pub fn default_entries() -> Vec<FleetEntry> {
        vec![
            FleetEntry::new("drn001", "DJI", "Lider"),
            FleetEntry::new("drx002", "DJI", "Last"),
            FleetEntry::new("dprn003", "DJI", "Center"),
        ]
    }

    pub fn get(&self, device_id: &str) -> Option<Arc<Device>> {
        self.index.get(device_id).map(|&i| self.devices[i].clone())
    }

    /// Directory listing in configured order.
    pub fn directory(&self) -> &[DeviceInfo] {
        &self.directory
    }

    pub fn devices(&self) -> impl Iterator<Item = &Arc<Device>> {
        self.devices.iter()
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::LoggingDriver;

    #[test]
    fn directory_keeps_configured_order() {
        let fleet = Fleet::new(&Fleet::default_entries(), Arc::new(LoggingDriver)).unwrap();
        let ids: Vec<_> = fleet.directory().iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["drn001", "drx002", "dprn003"]);
        assert_eq!(fleet.directory()[0].name, "Lider");
        assert_eq!(fleet.get("drx002").unwrap().model(), "DJI");
        assert!(fleet.get("nope").is_none());
    }

    #[test]
    fn rejects_bad_fleets() {
        let driver: Arc<dyn DeviceDriver> = Arc::new(LoggingDriver);
        assert_eq!(Fleet::new(&[], driver.clone()).err(), Some(FleetError::Empty));

        let dup = vec![
            FleetEntry::new("a1", "DJI", "One"),
            FleetEntry::new("a1", "DJI", "Two"),
        ];
        assert_eq!(
            Fleet::new(&dup, driver.clone()).err(),
            Some(FleetError::DuplicateId("a1".into()))
        );

        let spaced = vec![FleetEntry::new("a 1", "DJI", "One")];
        assert!(matches!(
            Fleet::new(&spaced, driver).err(),
            Some(FleetError::InvalidId(_))
        ));
    }

    #[test]
    fn directory_serializes_as_id_name_pairs() {
        let fleet = Fleet::new(&Fleet::default_entries(), Arc::new(LoggingDriver)).unwrap();
        let json = serde_json::to_value(fleet.directory()).unwrap();
        assert_eq!(json[1], serde_json::json!({"id": "drx002", "name": "Last"}));
    }
}

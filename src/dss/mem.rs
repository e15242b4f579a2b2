// Note: This is only for test and debug

use std::sync::Mutex;

use anyhow::{bail, Error};

use phobos_api_types::{DeviceInfo, MediaInfo};

use crate::dss::{DeviceFilter, Dss, MediaFilter};

/// In-memory DSS
///
/// Keeps device and medium records in process memory. Used by the
/// test suite and by virtual deployments; updates are lost when the
/// process exits.
#[derive(Default)]
pub struct MemDss {
    devices: Mutex<Vec<DeviceInfo>>,
    media: Mutex<Vec<MediaInfo>>,
}

impl MemDss {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a device record
    pub fn insert_device(&self, device: DeviceInfo) {
        self.devices.lock().unwrap().push(device);
    }

    /// Register a medium record
    pub fn insert_media(&self, media: MediaInfo) {
        self.media.lock().unwrap().push(media);
    }

    /// Fetch one medium record by label (test helper)
    pub fn media_by_label(&self, label: &str) -> Option<MediaInfo> {
        self.media
            .lock()
            .unwrap()
            .iter()
            .find(|m| m.label == label)
            .cloned()
    }
}

impl Dss for MemDss {
    fn get_devices(&self, filter: &DeviceFilter) -> Result<Vec<DeviceInfo>, Error> {
        let devices = self.devices.lock().unwrap();
        Ok(devices.iter().filter(|d| filter.matches(d)).cloned().collect())
    }

    fn get_media(&self, filter: &MediaFilter) -> Result<Vec<MediaInfo>, Error> {
        let media = self.media.lock().unwrap();
        Ok(media.iter().filter(|m| filter.matches(m)).cloned().collect())
    }

    fn update_media(&self, updates: &[MediaInfo]) -> Result<(), Error> {
        let mut media = self.media.lock().unwrap();
        for update in updates {
            match media.iter_mut().find(|m| m.id() == update.id()) {
                Some(record) => *record = update.clone(),
                None => bail!("no such medium '{}'", update.label),
            }
        }
        Ok(())
    }
}

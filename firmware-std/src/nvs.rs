//! NVS-backed settings store.

use esp_idf_svc::nvs::{EspDefaultNvsPartition, EspNvs, NvsDefault};
use esp_idf_svc::sys::EspError;

use fmradio::storage::{Store, NAMESPACE};

/// The `storage` namespace of the default NVS partition.
/// Every `set_*` commits before returning.
pub struct NvsStore {
    nvs: EspNvs<NvsDefault>,
}

impl NvsStore {
    pub fn open(partition: EspDefaultNvsPartition) -> Result<Self, EspError> {
        let nvs = EspNvs::new(partition, NAMESPACE, true)?;
        log::info!("NVS namespace '{}' opened", NAMESPACE);
        Ok(Self { nvs })
    }
}

impl Store for NvsStore {
    type Error = EspError;

    fn get_i16(&self, key: &str) -> Result<Option<i16>, Self::Error> {
        self.nvs.get_i16(key)
    }

    fn set_i16(&mut self, key: &str, value: i16) -> Result<(), Self::Error> {
        self.nvs.set_i16(key, value)
    }

    fn get_blob<'a>(&self, key: &str, buf: &'a mut [u8]) -> Result<Option<&'a [u8]>, Self::Error> {
        self.nvs.get_blob(key, buf)
    }

    fn set_blob(&mut self, key: &str, data: &[u8]) -> Result<(), Self::Error> {
        self.nvs.set_blob(key, data)
    }
}

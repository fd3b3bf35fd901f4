//! File-backed configuration adapter.
//!
//! Implements [`ConfigPort`] by reading a JSON document through `std::fs`.
//! On target the file lives on the SPIFFS partition mounted by
//! [`mount_flash_fs`]; on host any path works.

use std::io::ErrorKind;
use std::path::PathBuf;

use log::{info, warn};

use crate::app::ports::{ConfigError, ConfigPort};
use crate::config::SystemConfig;

/// Where the firmware looks for its configuration on target.
pub const DEFAULT_CONFIG_PATH: &str = "/spiffs/config.json";

pub struct FileConfigSource {
    path: PathBuf,
}

impl FileConfigSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl ConfigPort for FileConfigSource {
    fn load(&self) -> Result<SystemConfig, ConfigError> {
        let bytes = std::fs::read(&self.path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => ConfigError::NotFound,
            _ => ConfigError::IoError,
        })?;
        SystemConfig::from_json(&bytes)
    }
}

/// Load through `port`, falling back to [`SystemConfig::default()`] on any
/// error.
pub fn load_or_default(port: &impl ConfigPort) -> SystemConfig {
    match port.load() {
        Ok(cfg) => {
            info!("Config loaded");
            cfg
        }
        Err(e) => {
            warn!("Config load failed ({}), using defaults", e);
            SystemConfig::default()
        }
    }
}

/// Register the SPIFFS partition at `/spiffs`.
#[cfg(target_os = "espidf")]
pub fn mount_flash_fs() -> Result<(), ConfigError> {
    use esp_idf_svc::sys::*;

    let conf = esp_vfs_spiffs_conf_t {
        base_path: c"/spiffs".as_ptr(),
        partition_label: core::ptr::null(),
        max_files: 2,
        format_if_mount_failed: false,
    };
    // SAFETY: called once from main before any file access; `conf` outlives the call.
    let ret = unsafe { esp_vfs_spiffs_register(&conf) };
    if ret != ESP_OK {
        warn!("SPIFFS mount failed ({})", ret);
        return Err(ConfigError::IoError);
    }
    info!("SPIFFS mounted at /spiffs");
    Ok(())
}

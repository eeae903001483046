//! Flash log store adapter.
//!
//! Implements [`LogStorePort`] — the persistent file store that survives
//! deep sleep and power loss.
//!
//! - **`target_os = "espidf"`**: SPIFFS partition registered with the VFS
//!   at [`MOUNT_POINT`]; files are then plain `std::fs` paths.
//! - **all other targets**: a host directory stands in for the partition.
//!   Mount failures can be injected for tests.
//!
//! Each mount is a scoped session: the domain mounts right before it
//! touches the log and unmounts right after. Every file operation checks
//! the session first so an unmounted store behaves like an absent one.

use std::fs::{self, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::ops::ControlFlow;
use std::path::PathBuf;

use log::{debug, info, warn};

use crate::app::ports::{DirEntry, LogStorePort, StoreError};

/// VFS prefix of the SPIFFS partition.
pub const MOUNT_POINT: &str = "/spiffs";

#[cfg(target_os = "espidf")]
const MOUNT_POINT_C: &core::ffi::CStr = c"/spiffs";

/// Files SPIFFS may keep open at once.
#[cfg(target_os = "espidf")]
const MAX_OPEN_FILES: usize = 5;

pub struct FlashStore {
    root: PathBuf,
    mounted: bool,
    #[cfg(not(target_os = "espidf"))]
    fail_mount: bool,
}

impl FlashStore {
    /// Store backed by the default SPIFFS partition.
    #[cfg(target_os = "espidf")]
    pub fn new() -> Self {
        Self {
            root: PathBuf::from(MOUNT_POINT),
            mounted: false,
        }
    }

    /// Store backed by the host directory `root` (created on mount).
    #[cfg(not(target_os = "espidf"))]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            mounted: false,
            fail_mount: false,
        }
    }

    /// Make every subsequent mount fail (simulation only).
    #[cfg(not(target_os = "espidf"))]
    pub fn sim_fail_mount(&mut self, fail: bool) {
        self.fail_mount = fail;
    }

    fn path_of(&self, name: &str) -> Result<PathBuf, StoreError> {
        if !self.mounted {
            return Err(StoreError::NotMounted);
        }
        Ok(self.root.join(name.trim_start_matches('/')))
    }

    // ── Platform helpers: mount ───────────────────────────────

    #[cfg(target_os = "espidf")]
    fn platform_mount(&mut self, format_if_failed: bool) -> Result<(), StoreError> {
        use esp_idf_sys::*;

        let conf = esp_vfs_spiffs_conf_t {
            base_path: MOUNT_POINT_C.as_ptr(),
            partition_label: core::ptr::null(),
            max_files: MAX_OPEN_FILES,
            format_if_mount_failed: format_if_failed,
        };
        let ret = unsafe { esp_vfs_spiffs_register(&conf) };
        if ret != ESP_OK {
            warn!("SPIFFS: register failed ({})", ret);
            return Err(StoreError::MountFailed);
        }

        let (mut total, mut used) = (0usize, 0usize);
        if unsafe { esp_spiffs_info(core::ptr::null(), &mut total, &mut used) } == ESP_OK {
            debug!("SPIFFS: {} of {} bytes used", used, total);
        }
        Ok(())
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_mount(&mut self, format_if_failed: bool) -> Result<(), StoreError> {
        if self.fail_mount {
            return Err(StoreError::MountFailed);
        }
        if self.root.is_dir() {
            return Ok(());
        }
        if !format_if_failed {
            return Err(StoreError::MountFailed);
        }
        fs::create_dir_all(&self.root).map_err(|e| {
            warn!("Store(sim): cannot create {}: {}", self.root.display(), e);
            StoreError::MountFailed
        })?;
        info!("Store(sim): formatted {}", self.root.display());
        Ok(())
    }

    // ── Platform helpers: unmount ─────────────────────────────

    #[cfg(target_os = "espidf")]
    fn platform_unmount(&mut self) {
        let ret = unsafe { esp_idf_sys::esp_vfs_spiffs_unregister(core::ptr::null()) };
        if ret != esp_idf_sys::ESP_OK {
            warn!("SPIFFS: unregister failed ({})", ret);
        }
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_unmount(&mut self) {}
}

#[cfg(target_os = "espidf")]
impl Default for FlashStore {
    fn default() -> Self {
        Self::new()
    }
}

impl LogStorePort for FlashStore {
    fn mount(&mut self, format_if_failed: bool) -> Result<(), StoreError> {
        if self.mounted {
            return Ok(());
        }
        self.platform_mount(format_if_failed)?;
        self.mounted = true;
        debug!("Store mounted");
        Ok(())
    }

    fn unmount(&mut self) {
        if !self.mounted {
            return;
        }
        self.platform_unmount();
        self.mounted = false;
        debug!("Store unmounted");
    }

    fn is_mounted(&self) -> bool {
        self.mounted
    }

    fn append(&mut self, name: &str, text: &str) -> Result<(), StoreError> {
        let path = self.path_of(name)?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|_| StoreError::OpenFailed)?;
        file.write_all(text.as_bytes())
            .and_then(|()| file.flush())
            .map_err(|_| StoreError::WriteFailed)
    }

    fn read_lines(
        &mut self,
        name: &str,
        each: &mut dyn FnMut(&str) -> ControlFlow<()>,
    ) -> Result<usize, StoreError> {
        let path = self.path_of(name)?;
        let file = fs::File::open(&path).map_err(|_| StoreError::OpenFailed)?;
        let mut reader = BufReader::new(file);
        let mut line = String::new();
        let mut count = 0;
        loop {
            line.clear();
            let n = reader
                .read_line(&mut line)
                .map_err(|_| StoreError::ReadFailed)?;
            if n == 0 {
                return Ok(count);
            }
            let trimmed = line.trim_end_matches('\n').trim_end_matches('\r');
            count += 1;
            if each(trimmed).is_break() {
                debug!("Store: read of {} stopped after {} lines", name, count);
                return Ok(count);
            }
        }
    }

    fn list_entries(&mut self) -> Result<Vec<DirEntry>, StoreError> {
        let root = self.path_of("")?;
        let dir = fs::read_dir(&root).map_err(|_| StoreError::OpenFailed)?;
        let mut entries = Vec::new();
        // Enumeration ends at the first entry that cannot be read.
        for entry in dir {
            let Ok(entry) = entry else { break };
            let Ok(meta) = entry.metadata() else { break };
            let name = entry.file_name().to_string_lossy().into_owned();
            entries.push(DirEntry {
                name,
                size: meta.len(),
            });
        }
        Ok(entries)
    }

    fn remove(&mut self, name: &str) -> Result<bool, StoreError> {
        let path = self.path_of(name)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(_) => Err(StoreError::RemoveFailed),
        }
    }

    fn exists(&self, name: &str) -> bool {
        self.path_of(name).map(|p| p.is_file()).unwrap_or(false)
    }
}

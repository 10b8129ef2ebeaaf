//! Fixed per-device folder/file layout.
//!
//! ```text
//! <id>/Firmware/firmware.json
//! <id>/Firmware/firmwareold.bin
//! <id>/Timestamp/data.csv
//! <id>/Timestamp/system/system.json
//! <id>/Timestamp/system/Log.log
//! ```
//!
//! The `<id>` folder itself is expected to exist already.

use heapless::{String, Vec};

use crate::{
    error::FileManagerError,
    path::{entry_path, join},
    platform::Filesystem,
    volume::Volume,
    DEVICE_ID_MAX, DEVICE_PATH_MAX,
};

/// Folders in creation order, relative to the device folder.
pub const DEVICE_FOLDERS: [&str; 3] = ["Firmware", "Timestamp", "Timestamp/system"];

/// Files in creation order, relative to the device folder.
pub const DEVICE_FILES: [&str; 5] = [
    "Firmware/firmware.json",
    "Firmware/firmwareold.bin",
    "Timestamp/system/system.json",
    "Timestamp/system/Log.log",
    "Timestamp/data.csv",
];

const LAYOUT_LEN: usize = DEVICE_FOLDERS.len() + DEVICE_FILES.len();

/// Composed `<id>/<entry>` path, strictly shorter than `DEVICE_PATH_MAX`.
type DevicePath = String<{ DEVICE_PATH_MAX - 1 }>;

#[derive(Clone, Copy)]
enum LayoutKind {
    Folder,
    File,
}

struct LayoutEntry {
    kind: LayoutKind,
    relative: &'static str,
    path: DevicePath,
}

fn compose_layout(device_id: &str) -> Result<Vec<LayoutEntry, LAYOUT_LEN>, FileManagerError> {
    let folders = DEVICE_FOLDERS.iter().map(|rel| (LayoutKind::Folder, *rel));
    let files = DEVICE_FILES.iter().map(|rel| (LayoutKind::File, *rel));

    let mut entries = Vec::new();
    for (kind, relative) in folders.chain(files) {
        let path = join::<{ DEVICE_PATH_MAX - 1 }>(&[device_id, relative]).map_err(|_| {
            log::error!("sdcard: layout_path_overflow id={} entry={}", device_id, relative);
            FileManagerError::StructureFailed { entry: relative }
        })?;
        entries
            .push(LayoutEntry {
                kind,
                relative,
                path,
            })
            .map_err(|_| FileManagerError::StructureFailed { entry: relative })?;
    }
    Ok(entries)
}

impl<F: Filesystem> Volume<F> {
    /// Creates the device layout under an existing `<device_id>` folder.
    ///
    /// Nothing is touched when the id or any composed path is too long. When a
    /// step fails, entries created by this call are removed again (newest
    /// first); entries that were already there are left alone. Running it twice
    /// for the same id fails on the first folder.
    pub fn create_device_structure(&mut self, device_id: &str) -> Result<(), FileManagerError> {
        if device_id.len() >= DEVICE_ID_MAX {
            log::error!(
                "sdcard: layout_id_too_long len={} max={}",
                device_id.len(),
                DEVICE_ID_MAX
            );
            return Err(FileManagerError::PathTooLong);
        }

        let layout = compose_layout(device_id)?;
        log::info!("sdcard: layout_begin id={} entries={}", device_id, layout.len());

        let mut created = 0usize;
        for entry in layout.iter() {
            let result = match entry.kind {
                LayoutKind::Folder => self.create_folder(&entry.path),
                LayoutKind::File => self.create_file(&entry.path),
            };
            if let Err(err) = result {
                log::error!(
                    "sdcard: layout_error id={} entry={} err={}",
                    device_id,
                    entry.relative,
                    err
                );
                self.roll_back_layout(&layout[..created]);
                return Err(FileManagerError::StructureFailed {
                    entry: entry.relative,
                });
            }
            created += 1;
        }

        log::info!("sdcard: layout_ok id={}", device_id);
        Ok(())
    }

    fn roll_back_layout(&mut self, created: &[LayoutEntry]) {
        for entry in created.iter().rev() {
            let path = match entry_path(self.mount_point(), &entry.path) {
                Ok(path) => path,
                Err(_) => continue,
            };
            match self.fs.remove(&path) {
                Ok(()) => log::warn!("sdcard: layout_rollback path={}", path),
                Err(err) => {
                    log::warn!("sdcard: layout_rollback_error path={} err={:?}", path, err)
                }
            }
        }
    }
}

use crate::{
    error::FileManagerError,
    path::{entry_path, record_path, SdPath},
    platform::{Filesystem, OpenMode},
    volume::Volume,
    FOLDER_MODE,
};

impl<F: Filesystem> Volume<F> {
    pub fn create_folder(&mut self, name: &str) -> Result<(), FileManagerError> {
        let path = entry_path(self.mount_point(), name)?;
        log::info!("sdcard: mkdir path={}", path);

        if self.exists_at(&path) {
            log::error!("sdcard: mkdir_exists path={}", path);
            return Err(FileManagerError::AlreadyExists);
        }
        match self.fs.mkdir(&path, FOLDER_MODE) {
            Ok(()) => {
                log::info!("sdcard: mkdir_ok path={}", path);
                Ok(())
            }
            Err(err) => {
                log::error!("sdcard: mkdir_error path={} err={:?}", path, err);
                Err(FileManagerError::CreateFailed)
            }
        }
    }

    /// Creates an empty file. The name is used as given, no `.txt` suffix.
    pub fn create_file(&mut self, name: &str) -> Result<(), FileManagerError> {
        let path = entry_path(self.mount_point(), name)?;
        log::info!("sdcard: create path={}", path);

        if self.exists_at(&path) {
            log::error!("sdcard: create_exists path={}", path);
            return Err(FileManagerError::AlreadyExists);
        }
        let file = match self.open(&path, OpenMode::Truncate) {
            Ok(file) => file,
            Err(err) => {
                log::error!("sdcard: create_error path={} err={:?}", path, err);
                return Err(FileManagerError::CreateFailed);
            }
        };
        if let Err(err) = file.close() {
            log::warn!("sdcard: create_close_error path={} err={:?}", path, err);
        }
        log::info!("sdcard: create_ok path={}", path);
        Ok(())
    }

    /// Removes the record file `<name>.txt`.
    pub fn remove_file(&mut self, name: &str) -> Result<(), FileManagerError> {
        let path = record_path(self.mount_point(), name)?;

        if !self.exists_at(&path) {
            log::error!("sdcard: remove_missing path={}", path);
            return Err(FileManagerError::NotFound);
        }
        match self.fs.remove(&path) {
            Ok(()) => {
                log::warn!("sdcard: remove_ok path={}", path);
                Ok(())
            }
            Err(err) => {
                log::error!("sdcard: remove_error path={} err={:?}", path, err);
                Err(FileManagerError::RemoveFailed)
            }
        }
    }

    /// Renames record file `<old_name>.txt` to `<new_name>.txt`. Never overwrites.
    pub fn rename_file(&mut self, old_name: &str, new_name: &str) -> Result<(), FileManagerError> {
        let from = record_path(self.mount_point(), old_name)?;
        let to = record_path(self.mount_point(), new_name)?;
        log::info!("sdcard: rename from={} to={}", from, to);

        if self.exists_at(&to) {
            log::error!("sdcard: rename_dst_exists path={}", to);
            return Err(FileManagerError::DestinationExists);
        }
        match self.fs.rename(&from, &to) {
            Ok(()) => {
                log::info!("sdcard: rename_ok to={}", to);
                Ok(())
            }
            Err(err) => {
                log::error!("sdcard: rename_error from={} err={:?}", from, err);
                Err(FileManagerError::RenameFailed)
            }
        }
    }

    /// Returns the absolute path of `name` if something exists there.
    pub fn resolve_path(&mut self, name: &str) -> Result<SdPath, FileManagerError> {
        let path = entry_path(self.mount_point(), name)?;
        if self.exists_at(&path) {
            log::info!("sdcard: resolve_ok name={} path={}", name, path);
            Ok(path)
        } else {
            log::error!("sdcard: resolve_missing name={}", name);
            Err(FileManagerError::NotFound)
        }
    }

    pub fn exists(&mut self, name: &str) -> Result<bool, FileManagerError> {
        let path = entry_path(self.mount_point(), name)?;
        Ok(self.exists_at(&path))
    }
}

use crate::platform::{Filesystem, OpenMode};

/// Mounted filesystem plus the mount point every logical name is resolved
/// against. All file operations take this context explicitly.
pub struct Volume<F: Filesystem> {
    pub(crate) fs: F,
    mount_point: &'static str,
}

impl<F: Filesystem> Volume<F> {
    pub fn new(fs: F, mount_point: &'static str) -> Self {
        Self { fs, mount_point }
    }

    pub fn mount_point(&self) -> &'static str {
        self.mount_point
    }

    pub fn filesystem(&self) -> &F {
        &self.fs
    }

    pub(crate) fn into_inner(self) -> F {
        self.fs
    }

    pub(crate) fn exists_at(&mut self, path: &str) -> bool {
        self.fs.stat(path).is_ok()
    }

    pub(crate) fn open(&mut self, path: &str, mode: OpenMode) -> Result<OpenFile<'_, F>, F::Error> {
        let file = self.fs.open(path, mode)?;
        Ok(OpenFile {
            fs: &mut self.fs,
            file: Some(file),
        })
    }
}

/// Open handle that is closed when it goes out of scope, whichever way the
/// caller leaves.
pub(crate) struct OpenFile<'a, F: Filesystem> {
    fs: &'a mut F,
    file: Option<F::File>,
}

impl<F: Filesystem> OpenFile<'_, F> {
    pub(crate) fn write(&mut self, data: &[u8]) -> Result<usize, F::Error> {
        match self.file.as_mut() {
            Some(file) => self.fs.write(file, data),
            None => Ok(0),
        }
    }

    pub(crate) fn read_line(&mut self, buf: &mut [u8]) -> Result<usize, F::Error> {
        match self.file.as_mut() {
            Some(file) => self.fs.read_line(file, buf),
            None => Ok(0),
        }
    }

    pub(crate) fn close(mut self) -> Result<(), F::Error> {
        match self.file.take() {
            Some(file) => self.fs.close(file),
            None => Ok(()),
        }
    }
}

impl<F: Filesystem> Drop for OpenFile<'_, F> {
    fn drop(&mut self) {
        if let Some(file) = self.file.take() {
            if let Err(err) = self.fs.close(file) {
                log::warn!("sdcard: close_error err={:?}", err);
            }
        }
    }
}

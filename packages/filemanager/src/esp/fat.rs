use embassy_futures::block_on;
use embedded_io_async::{ErrorType, Read, Seek, SeekFrom, Write};

use super::{
    card::{SdFs, SdStream},
    error::SdBackendError,
};
use crate::{
    path::SdPath,
    platform::{EntryKind, Filesystem, Metadata, OpenMode},
};

pub type FatError = embedded_fatfs::Error<<SdStream as ErrorType>::Error>;

/// Open file on the FAT volume. The driver's file objects borrow the volume,
/// so a handle keeps the path and cursor and reopens per operation.
pub struct FatFile {
    path: SdPath,
    mode: OpenMode,
    pos: u64,
}

pub struct FatVolume {
    fs: SdFs,
    mount_point: SdPath,
    max_files: usize,
    open_files: usize,
}

impl FatVolume {
    pub(super) fn new(
        fs: SdFs,
        mount_point: &str,
        max_files: usize,
    ) -> Result<Self, SdBackendError> {
        let mut stored = SdPath::new();
        stored
            .push_str(mount_point)
            .map_err(|_| SdBackendError::PathTooLong)?;
        Ok(Self {
            fs,
            mount_point: stored,
            max_files,
            open_files: 0,
        })
    }

    pub(super) fn into_inner(self) -> SdFs {
        self.fs
    }

    pub fn open_files(&self) -> usize {
        self.open_files
    }

    /// Path relative to the volume root, as the FAT driver wants it.
    fn relative<'p>(&self, path: &'p str) -> Result<&'p str, SdBackendError> {
        let rest = path
            .strip_prefix(self.mount_point.as_str())
            .ok_or(SdBackendError::OutsideMount)?;
        if !rest.is_empty() && !rest.starts_with('/') {
            return Err(SdBackendError::OutsideMount);
        }
        Ok(rest.trim_start_matches('/'))
    }
}

impl Filesystem for FatVolume {
    type Error = SdBackendError;
    type File = FatFile;

    fn stat(&mut self, path: &str) -> Result<Metadata, SdBackendError> {
        let rel = self.relative(path)?;
        if rel.is_empty() {
            return Ok(Metadata {
                kind: EntryKind::Dir,
                size: 0,
            });
        }
        block_on(stat_entry(&self.fs, rel))
    }

    fn open(&mut self, path: &str, mode: OpenMode) -> Result<FatFile, SdBackendError> {
        if self.open_files >= self.max_files {
            return Err(SdBackendError::TooManyOpenFiles);
        }
        let rel = self.relative(path)?;
        let mut stored = SdPath::new();
        stored
            .push_str(rel)
            .map_err(|_| SdBackendError::PathTooLong)?;
        let pos = block_on(open_entry(&self.fs, rel, mode))?;
        self.open_files += 1;
        Ok(FatFile {
            path: stored,
            mode,
            pos,
        })
    }

    fn write(&mut self, file: &mut FatFile, data: &[u8]) -> Result<usize, SdBackendError> {
        if file.mode == OpenMode::Read {
            return Err(SdBackendError::ReadOnlyHandle);
        }
        let at = match file.mode {
            OpenMode::Append => SeekFrom::End(0),
            _ => SeekFrom::Start(file.pos),
        };
        file.pos = block_on(write_at(&self.fs, &file.path, at, data))?;
        Ok(data.len())
    }

    fn read_line(&mut self, file: &mut FatFile, buf: &mut [u8]) -> Result<usize, SdBackendError> {
        let read = block_on(read_line_at(&self.fs, &file.path, file.pos, buf))?;
        file.pos += read as u64;
        Ok(read)
    }

    fn close(&mut self, _file: FatFile) -> Result<(), SdBackendError> {
        self.open_files = self.open_files.saturating_sub(1);
        Ok(())
    }

    fn mkdir(&mut self, path: &str, mode: u32) -> Result<(), SdBackendError> {
        let rel = self.relative(path)?;
        log::debug!("sdcard: mkdir path={} mode={:o}", path, mode);
        block_on(async { self.fs.root_dir().create_dir(rel).await.map(|_| ()) })?;
        Ok(())
    }

    fn rename(&mut self, from: &str, to: &str) -> Result<(), SdBackendError> {
        let from = self.relative(from)?;
        let to = self.relative(to)?;
        block_on(async {
            let root = self.fs.root_dir();
            root.rename(from, &root, to).await
        })?;
        Ok(())
    }

    fn remove(&mut self, path: &str) -> Result<(), SdBackendError> {
        let rel = self.relative(path)?;
        block_on(async { self.fs.root_dir().remove(rel).await })?;
        Ok(())
    }
}

async fn stat_entry(fs: &SdFs, rel: &str) -> Result<Metadata, SdBackendError> {
    let root = fs.root_dir();
    if root.open_dir(rel).await.is_ok() {
        return Ok(Metadata {
            kind: EntryKind::Dir,
            size: 0,
        });
    }
    let mut file = root.open_file(rel).await?;
    let size = file.seek(SeekFrom::End(0)).await?;
    Ok(Metadata {
        kind: EntryKind::File,
        size: size.min(u32::MAX as u64) as u32,
    })
}

async fn open_entry(fs: &SdFs, rel: &str, mode: OpenMode) -> Result<u64, SdBackendError> {
    let root = fs.root_dir();
    match mode {
        OpenMode::Read => {
            root.open_file(rel).await?;
            Ok(0)
        }
        OpenMode::Append => {
            let mut file = root.create_file(rel).await?;
            let end = file.seek(SeekFrom::End(0)).await?;
            file.flush().await?;
            Ok(end)
        }
        OpenMode::Truncate => {
            let mut file = root.create_file(rel).await?;
            file.truncate().await?;
            file.flush().await?;
            Ok(0)
        }
    }
}

async fn write_at(fs: &SdFs, rel: &str, at: SeekFrom, data: &[u8]) -> Result<u64, SdBackendError> {
    let root = fs.root_dir();
    let mut file = root.open_file(rel).await?;
    let start = file.seek(at).await?;
    file.write_all(data).await?;
    file.flush().await?;
    Ok(start + data.len() as u64)
}

async fn read_line_at(
    fs: &SdFs,
    rel: &str,
    pos: u64,
    buf: &mut [u8],
) -> Result<usize, SdBackendError> {
    let root = fs.root_dir();
    let mut file = root.open_file(rel).await?;
    file.seek(SeekFrom::Start(pos)).await?;

    let mut filled = 0;
    while filled < buf.len() {
        let read = file.read(&mut buf[filled..]).await?;
        if read == 0 {
            break;
        }
        if let Some(newline) = buf[filled..filled + read].iter().position(|&b| b == b'\n') {
            return Ok(filled + newline + 1);
        }
        filled += read;
    }
    Ok(filled)
}

//! In-memory stand-ins for the SPI bus, the mount primitive and the
//! filesystem, with switches to make individual calls fail.

use std::{cell::RefCell, collections::BTreeMap, fmt, rc::Rc};

use crate::{
    mount::{BusConfig, DmaChannel, HostConfig, MountConfig, SlotConfig, SpiHost},
    platform::{
        CardInfo, CardMounter, EntryKind, Filesystem, Metadata, MountError, Mounted, OpenMode,
        SpiBusDriver,
    },
    volume::Volume,
    MOUNT_POINT,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MemError {
    NotFound,
    Exists,
    NotDirectory,
    NotEmpty,
    TooManyOpenFiles,
    BadHandle,
    Injected,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Node {
    Dir,
    File(Vec<u8>),
}

#[derive(Debug)]
pub struct MemFile {
    id: u32,
    path: String,
    mode: OpenMode,
    pos: usize,
}

#[derive(Debug, Default)]
pub struct Faults {
    pub open: Option<&'static str>,
    pub write: bool,
    pub short_write: bool,
    pub read: bool,
    pub close: bool,
    pub mkdir: Option<&'static str>,
    pub rename: bool,
    pub remove: bool,
}

#[derive(Debug)]
pub struct MemFs {
    nodes: BTreeMap<String, Node>,
    open: Vec<u32>,
    next_handle: u32,
    max_files: usize,
    pub faults: Faults,
    pub mutations: usize,
}

impl Default for MemFs {
    fn default() -> Self {
        Self::new()
    }
}

impl MemFs {
    pub fn new() -> Self {
        Self::with_max_files(MountConfig::default().max_files)
    }

    pub fn with_max_files(max_files: usize) -> Self {
        let mut nodes = BTreeMap::new();
        nodes.insert(MOUNT_POINT.to_string(), Node::Dir);
        Self {
            nodes,
            open: Vec::new(),
            next_handle: 1,
            max_files,
            faults: Faults::default(),
            mutations: 0,
        }
    }

    pub fn open_handles(&self) -> usize {
        self.open.len()
    }

    pub fn node(&self, path: &str) -> Option<&Node> {
        self.nodes.get(path)
    }

    pub fn contents(&self, path: &str) -> Option<&[u8]> {
        match self.nodes.get(path) {
            Some(Node::File(data)) => Some(data.as_slice()),
            _ => None,
        }
    }

    pub fn put_file(&mut self, path: &str, data: &[u8]) {
        self.nodes.insert(path.to_string(), Node::File(data.to_vec()));
    }

    pub fn put_dir(&mut self, path: &str) {
        self.nodes.insert(path.to_string(), Node::Dir);
    }

    pub fn dirs(&self) -> Vec<&str> {
        self.paths_where(|node| matches!(node, Node::Dir))
    }

    pub fn files(&self) -> Vec<&str> {
        self.paths_where(|node| matches!(node, Node::File(_)))
    }

    fn paths_where(&self, pred: impl Fn(&Node) -> bool) -> Vec<&str> {
        self.nodes
            .iter()
            .filter(|(path, node)| path.as_str() != MOUNT_POINT && pred(node))
            .map(|(path, _)| path.as_str())
            .collect()
    }

    fn parent_is_dir(&self, path: &str) -> Result<(), MemError> {
        let parent = match path.rfind('/') {
            Some(0) | None => return Err(MemError::NotFound),
            Some(idx) => &path[..idx],
        };
        match self.nodes.get(parent) {
            Some(Node::Dir) => Ok(()),
            Some(Node::File(_)) => Err(MemError::NotDirectory),
            None => Err(MemError::NotFound),
        }
    }

    fn check_handle(&self, file: &MemFile) -> Result<(), MemError> {
        if self.open.contains(&file.id) {
            Ok(())
        } else {
            Err(MemError::BadHandle)
        }
    }
}

impl Filesystem for MemFs {
    type Error = MemError;
    type File = MemFile;

    fn stat(&mut self, path: &str) -> Result<Metadata, MemError> {
        match self.nodes.get(path) {
            Some(Node::Dir) => Ok(Metadata {
                kind: EntryKind::Dir,
                size: 0,
            }),
            Some(Node::File(data)) => Ok(Metadata {
                kind: EntryKind::File,
                size: data.len() as u32,
            }),
            None => Err(MemError::NotFound),
        }
    }

    fn open(&mut self, path: &str, mode: OpenMode) -> Result<MemFile, MemError> {
        if let Some(pattern) = self.faults.open {
            if path.contains(pattern) {
                return Err(MemError::Injected);
            }
        }
        if self.open.len() >= self.max_files {
            return Err(MemError::TooManyOpenFiles);
        }
        let existing = self.stat(path).ok().map(|meta| meta.kind);
        match (existing, mode) {
            (Some(EntryKind::Dir), _) => return Err(MemError::NotDirectory),
            (None, OpenMode::Read) => return Err(MemError::NotFound),
            (None, _) => {
                self.parent_is_dir(path)?;
                self.nodes.insert(path.to_string(), Node::File(Vec::new()));
                self.mutations += 1;
            }
            (Some(EntryKind::File), OpenMode::Truncate) => {
                self.nodes.insert(path.to_string(), Node::File(Vec::new()));
                self.mutations += 1;
            }
            (Some(EntryKind::File), _) => {}
        }
        let id = self.next_handle;
        self.next_handle += 1;
        self.open.push(id);
        Ok(MemFile {
            id,
            path: path.to_string(),
            mode,
            pos: 0,
        })
    }

    fn write(&mut self, file: &mut MemFile, data: &[u8]) -> Result<usize, MemError> {
        self.check_handle(file)?;
        if self.faults.write || file.mode == OpenMode::Read {
            return Err(MemError::Injected);
        }
        let len = if self.faults.short_write {
            data.len() / 2
        } else {
            data.len()
        };
        match self.nodes.get_mut(&file.path) {
            Some(Node::File(contents)) => {
                contents.extend_from_slice(&data[..len]);
                self.mutations += 1;
                Ok(len)
            }
            _ => Err(MemError::NotFound),
        }
    }

    fn read_line(&mut self, file: &mut MemFile, buf: &mut [u8]) -> Result<usize, MemError> {
        self.check_handle(file)?;
        if self.faults.read {
            return Err(MemError::Injected);
        }
        let contents = match self.nodes.get(&file.path) {
            Some(Node::File(contents)) => contents,
            _ => return Err(MemError::NotFound),
        };
        let rest = &contents[file.pos.min(contents.len())..];
        let mut len = 0;
        while len < buf.len() && len < rest.len() {
            buf[len] = rest[len];
            len += 1;
            if rest[len - 1] == b'\n' {
                break;
            }
        }
        file.pos += len;
        Ok(len)
    }

    fn close(&mut self, file: MemFile) -> Result<(), MemError> {
        self.open.retain(|id| *id != file.id);
        if self.faults.close {
            return Err(MemError::Injected);
        }
        Ok(())
    }

    fn mkdir(&mut self, path: &str, _mode: u32) -> Result<(), MemError> {
        if let Some(pattern) = self.faults.mkdir {
            if path.ends_with(pattern) {
                return Err(MemError::Injected);
            }
        }
        if self.nodes.contains_key(path) {
            return Err(MemError::Exists);
        }
        self.parent_is_dir(path)?;
        self.nodes.insert(path.to_string(), Node::Dir);
        self.mutations += 1;
        Ok(())
    }

    fn rename(&mut self, from: &str, to: &str) -> Result<(), MemError> {
        if self.faults.rename {
            return Err(MemError::Injected);
        }
        let node = self.nodes.remove(from).ok_or(MemError::NotFound)?;
        self.nodes.insert(to.to_string(), node);
        self.mutations += 1;
        Ok(())
    }

    fn remove(&mut self, path: &str) -> Result<(), MemError> {
        if self.faults.remove {
            return Err(MemError::Injected);
        }
        match self.nodes.get(path) {
            None => return Err(MemError::NotFound),
            Some(Node::Dir) => {
                let prefix = format!("{}/", path);
                if self.nodes.keys().any(|key| key.starts_with(&prefix)) {
                    return Err(MemError::NotEmpty);
                }
            }
            Some(Node::File(_)) => {}
        }
        self.nodes.remove(path);
        self.mutations += 1;
        Ok(())
    }
}

pub fn mem_volume() -> Volume<MemFs> {
    Volume::new(MemFs::new(), MOUNT_POINT)
}

#[derive(Debug, Default)]
pub struct Calls {
    pub bus_init: usize,
    pub bus_free: usize,
    pub mount: usize,
    pub unmount: usize,
    pub dma: Option<DmaChannel>,
    pub mounted_slot: Option<SlotConfig>,
    pub mount_point: Option<String>,
}

pub type SharedCalls = Rc<RefCell<Calls>>;

pub struct MemBus {
    pub calls: SharedCalls,
    pub fail_init: bool,
    pub fail_free: bool,
}

impl SpiBusDriver for MemBus {
    type Error = MemError;

    fn initialize(
        &mut self,
        _host: SpiHost,
        _bus: &BusConfig,
        dma: DmaChannel,
    ) -> Result<(), MemError> {
        let mut calls = self.calls.borrow_mut();
        calls.bus_init += 1;
        calls.dma = Some(dma);
        if self.fail_init {
            return Err(MemError::Injected);
        }
        Ok(())
    }

    fn free(&mut self, _host: SpiHost) -> Result<(), MemError> {
        self.calls.borrow_mut().bus_free += 1;
        if self.fail_free {
            return Err(MemError::Injected);
        }
        Ok(())
    }
}

pub struct MemCard {
    pub capacity_bytes: u64,
}

impl fmt::Display for MemCard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "name=MEMCARD capacity_bytes={}", self.capacity_bytes)
    }
}

impl CardInfo for MemCard {
    fn capacity_bytes(&self) -> u64 {
        self.capacity_bytes
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MountOutcome {
    Ok,
    NoFilesystem,
    CardError,
}

pub struct MemMounter {
    pub calls: SharedCalls,
    pub outcome: MountOutcome,
    pub fail_unmount: bool,
}

impl CardMounter for MemMounter {
    type Error = MemError;
    type Card = MemCard;
    type Fs = MemFs;

    fn mount(
        &mut self,
        mount_point: &str,
        _host: &HostConfig,
        slot: &SlotConfig,
        config: &MountConfig,
    ) -> Result<Mounted<MemCard, MemFs>, MountError<MemError>> {
        let mut calls = self.calls.borrow_mut();
        calls.mount += 1;
        calls.mounted_slot = Some(*slot);
        calls.mount_point = Some(mount_point.to_string());
        match self.outcome {
            MountOutcome::Ok => Ok(Mounted {
                card: MemCard {
                    capacity_bytes: 8 * 1024 * 1024,
                },
                fs: MemFs::with_max_files(config.max_files),
            }),
            MountOutcome::NoFilesystem => Err(MountError::Filesystem),
            MountOutcome::CardError => Err(MountError::Card(MemError::Injected)),
        }
    }

    fn unmount(&mut self, _mount_point: &str, _card: MemCard, _fs: MemFs) -> Result<(), MemError> {
        self.calls.borrow_mut().unmount += 1;
        if self.fail_unmount {
            return Err(MemError::Injected);
        }
        Ok(())
    }
}

pub fn bus_config() -> BusConfig {
    BusConfig {
        mosi: 13,
        miso: 12,
        sclk: 14,
        quadwp: None,
        quadhd: None,
        max_transfer_sz: 4000,
    }
}

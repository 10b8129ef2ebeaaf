//! Seams to the platform: SPI bus driver, card mount primitive and the
//! filesystem calls the file manager is built from. Nothing here talks to
//! hardware; the firmware and the tests each provide their own implementations.

use core::fmt::{Debug, Display};

use crate::mount::{BusConfig, DmaChannel, HostConfig, MountConfig, SlotConfig, SpiHost};

pub trait SpiBusDriver {
    type Error: Debug;

    fn initialize(
        &mut self,
        host: SpiHost,
        bus: &BusConfig,
        dma: DmaChannel,
    ) -> Result<(), Self::Error>;

    fn free(&mut self, host: SpiHost) -> Result<(), Self::Error>;
}

/// Card metadata surfaced once after a successful mount.
pub trait CardInfo: Display {
    fn capacity_bytes(&self) -> u64;
}

#[derive(Debug)]
pub enum MountError<E> {
    /// Generic failure: the card is there but no filesystem could be mounted.
    Filesystem,
    /// Specific card-level error from the driver.
    Card(E),
}

pub struct Mounted<C, F> {
    pub card: C,
    pub fs: F,
}

pub trait CardMounter {
    type Error: Debug;
    type Card: CardInfo;
    type Fs: Filesystem;

    fn mount(
        &mut self,
        mount_point: &str,
        host: &HostConfig,
        slot: &SlotConfig,
        config: &MountConfig,
    ) -> Result<Mounted<Self::Card, Self::Fs>, MountError<Self::Error>>;

    fn unmount(&mut self, mount_point: &str, card: Self::Card, fs: Self::Fs)
        -> Result<(), Self::Error>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OpenMode {
    Read,
    /// Create if absent, position writes at the end.
    Append,
    /// Create if absent, drop existing contents.
    Truncate,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Dir,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Metadata {
    pub kind: EntryKind,
    pub size: u32,
}

/// POSIX-flavoured primitives on absolute paths under the mount point.
///
/// `stat` failing means "not there"; callers do not look at the error value.
/// `read_line` returns the number of bytes stored in `buf`, stopping after a
/// `\n` or when `buf` is full; `0` means end of file.
pub trait Filesystem {
    type Error: Debug;
    type File;

    fn stat(&mut self, path: &str) -> Result<Metadata, Self::Error>;
    fn open(&mut self, path: &str, mode: OpenMode) -> Result<Self::File, Self::Error>;
    fn write(&mut self, file: &mut Self::File, data: &[u8]) -> Result<usize, Self::Error>;
    fn read_line(&mut self, file: &mut Self::File, buf: &mut [u8]) -> Result<usize, Self::Error>;
    fn close(&mut self, file: Self::File) -> Result<(), Self::Error>;
    fn mkdir(&mut self, path: &str, mode: u32) -> Result<(), Self::Error>;
    fn rename(&mut self, from: &str, to: &str) -> Result<(), Self::Error>;
    fn remove(&mut self, path: &str) -> Result<(), Self::Error>;
}

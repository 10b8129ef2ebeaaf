use esp_hal::{
    dma::DmaBufError,
    spi::{master::ConfigError as SpiConfigError, Error as SpiError},
};

use super::fat::FatError;
use crate::mount::SpiHost;

#[derive(Debug)]
pub enum SdBackendError {
    Spi(SpiError),
    SpiConfig(SpiConfigError),
    DmaBuffer(DmaBufError),
    Card(sdspi::Error),
    Fat(FatError),
    UnsupportedHost(SpiHost),
    PinMismatch { expected: u8, wired: u8 },
    QuadLinesUnsupported,
    TransferTooLarge(usize),
    DmaRequired,
    BusUnavailable,
    BusInUse,
    ChipSelectTaken,
    NoResponse,
    BlockIo,
    TooManyOpenFiles,
    ReadOnlyHandle,
    OutsideMount,
    PathTooLong,
}

impl From<SpiError> for SdBackendError {
    fn from(value: SpiError) -> Self {
        Self::Spi(value)
    }
}

impl From<SpiConfigError> for SdBackendError {
    fn from(value: SpiConfigError) -> Self {
        Self::SpiConfig(value)
    }
}

impl From<DmaBufError> for SdBackendError {
    fn from(value: DmaBufError) -> Self {
        Self::DmaBuffer(value)
    }
}

impl From<sdspi::Error> for SdBackendError {
    fn from(value: sdspi::Error) -> Self {
        Self::Card(value)
    }
}

impl From<FatError> for SdBackendError {
    fn from(value: FatError) -> Self {
        Self::Fat(value)
    }
}

use filemanager::{BusConfig, HostConfig, MountConfig};
use log::LevelFilter;

pub(crate) const LOG_LEVEL: LevelFilter = LevelFilter::Info;

pub(crate) const PIN_NUM_MOSI: u8 = 13;
pub(crate) const PIN_NUM_MISO: u8 = 12;
pub(crate) const PIN_NUM_CLK: u8 = 14;
pub(crate) const PIN_NUM_CS: u8 = 15;

pub(crate) const MAX_TRANSFER_SZ: usize = 4000;
pub(crate) const MAX_FILES: usize = 5;
pub(crate) const FORMAT_IF_MOUNT_FAILED: bool = cfg!(feature = "format-if-mount-failed");

/// Device folder created at boot; the fixed layout goes underneath it.
pub(crate) const DEVICE_ID: &str = "Test_getfilepath";
pub(crate) const DEVICE_LOG_FILE: &str = "Timestamp/system/Log.log";

pub(crate) const MOUNT_CONFIG: MountConfig = MountConfig {
    format_if_mount_failed: FORMAT_IF_MOUNT_FAILED,
    max_files: MAX_FILES,
};

pub(crate) const HOST_CONFIG: HostConfig = HostConfig::SDSPI_DEFAULT;

pub(crate) const BUS_CONFIG: BusConfig = BusConfig {
    mosi: PIN_NUM_MOSI,
    miso: PIN_NUM_MISO,
    sclk: PIN_NUM_CLK,
    quadwp: None,
    quadhd: None,
    max_transfer_sz: MAX_TRANSFER_SZ,
};

#![cfg_attr(not(test), no_std)]

pub mod entries;
pub mod error;
#[cfg(feature = "esp32")]
pub mod esp;
pub mod layout;
pub mod mount;
pub mod partition;
pub mod path;
pub mod platform;
pub mod record;
pub mod volume;

#[cfg(test)]
mod testing;

pub use error::FileManagerError;
pub use layout::{DEVICE_FILES, DEVICE_FOLDERS};
pub use mount::{
    initialize, BusConfig, DmaChannel, HostConfig, MountConfig, SdCard, SlotConfig, SpiHost,
    TeardownReport, TeardownWarning,
};
pub use path::SdPath;
pub use record::{Line, Record};
pub use volume::Volume;

pub const MOUNT_POINT: &str = "/sdcard";
pub const SD_PATH_MAX: usize = 128;
/// Line buffer for record reads. One byte is held back, so a line keeps at
/// most `SD_LINE_MAX - 1` bytes.
pub const SD_LINE_MAX: usize = 256;
pub const DEVICE_ID_MAX: usize = 100;
pub const DEVICE_PATH_MAX: usize = 100;
pub const FOLDER_MODE: u32 = 0o777;
pub const RECORD_SUFFIX: &str = ".txt";

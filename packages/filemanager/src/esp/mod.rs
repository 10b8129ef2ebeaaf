//! ESP32 implementations of the platform seams: esp-hal SPI master with DMA,
//! `sdspi` for the card protocol, `block-device-adapters` for byte streams
//! and `embedded-fatfs` for the volume. The async driver stack is polled to
//! completion with `embassy_futures::block_on`.

mod bus;
mod card;
mod error;
mod fat;

pub use bus::{BusSlot, EspSpiBus, SdBus, SdSpiPeripherals, SD_BUS, SD_DMA_BUFFER_LEN};
pub use card::{EspCardMounter, SdCardInfo, SD_INIT_FREQ_KHZ};
pub use error::SdBackendError;
pub use fat::{FatFile, FatVolume};

/// Concrete handle type the firmware and the on-device tests work with.
pub type EspSdCard = crate::SdCard<EspSpiBus, EspCardMounter>;

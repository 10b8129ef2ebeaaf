use core::fmt;

use aligned::A4;
use block_device_adapters::{BufStream, StreamSlice};
use block_device_driver::BlockDevice;
use embassy_futures::block_on;
use embassy_time::Delay;
use embedded_fatfs::{format_volume, FileSystem, FormatVolumeOptions, FsOptions};
use embedded_hal_bus::spi::ExclusiveDevice;
use embedded_io_async::{Read, Seek, SeekFrom};
use esp_hal::{
    gpio::Output,
    spi::{master::Config as SpiConfig, Mode as SpiMode},
    time::Rate,
};
use sdspi::SdSpi;

use super::{
    bus::{BusSlot, SdBus},
    error::SdBackendError,
    fat::FatVolume,
};
use crate::{
    mount::{HostConfig, MountConfig, SlotConfig},
    partition::{is_fat_boot_sector, locate_volume, Partition, SECTOR_SIZE},
    platform::{CardInfo, CardMounter, MountError, Mounted},
};

pub const SD_INIT_FREQ_KHZ: u32 = 400;

pub type SdDevice = ExclusiveDevice<SdBus, Output<'static>, Delay>;
pub type SdBlocks = SdSpi<SdDevice, Delay, A4>;
pub type SdStream = StreamSlice<BufStream<SdBlocks, SECTOR_SIZE>>;
pub type SdFs = FileSystem<SdStream>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SdCardInfo {
    pub capacity_bytes: u64,
    pub partition: Partition,
    pub formatted: bool,
}

impl fmt::Display for SdCardInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "name=SDSPI capacity_mb={} sectors={} partition_lba={} partition_sectors={} formatted={}",
            self.capacity_bytes / (1024 * 1024),
            self.capacity_bytes / SECTOR_SIZE as u64,
            self.partition.start_lba,
            self.partition.sectors,
            self.formatted as u8
        )
    }
}

impl CardInfo for SdCardInfo {
    fn capacity_bytes(&self) -> u64 {
        self.capacity_bytes
    }
}

/// Brings the card up on the bus parked in the [`BusSlot`] and mounts the
/// FAT volume on it. The bus stays with the mounted volume until unmount.
pub struct EspCardMounter {
    cs: Option<Output<'static>>,
    cs_pin: u8,
    slot: &'static BusSlot,
}

impl EspCardMounter {
    pub fn new(cs: Output<'static>, cs_pin: u8, slot: &'static BusSlot) -> Self {
        Self {
            cs: Some(cs),
            cs_pin,
            slot,
        }
    }
}

impl CardMounter for EspCardMounter {
    type Error = SdBackendError;
    type Card = SdCardInfo;
    type Fs = FatVolume;

    fn mount(
        &mut self,
        mount_point: &str,
        host: &HostConfig,
        slot: &SlotConfig,
        config: &MountConfig,
    ) -> Result<Mounted<SdCardInfo, FatVolume>, MountError<SdBackendError>> {
        if let Some(pin) = slot.gpio_cs {
            if pin != self.cs_pin {
                return Err(MountError::Card(SdBackendError::PinMismatch {
                    expected: pin,
                    wired: self.cs_pin,
                }));
            }
        }
        let Some(cs) = self.cs.take() else {
            return Err(MountError::Card(SdBackendError::ChipSelectTaken));
        };
        let Some(bus) = self.slot.lend() else {
            self.cs = Some(cs);
            return Err(MountError::Card(SdBackendError::BusUnavailable));
        };

        match block_on(mount_card(bus, cs, host.max_freq_khz, config)) {
            Ok((card, fs)) => match FatVolume::new(fs, mount_point, config.max_files) {
                Ok(fs) => Ok(Mounted { card, fs }),
                Err(err) => {
                    self.slot.mark_released();
                    Err(MountError::Card(err))
                }
            },
            Err(err) => {
                // The driver stack owned the bus and went down with the error.
                self.slot.mark_released();
                Err(err)
            }
        }
    }

    fn unmount(
        &mut self,
        mount_point: &str,
        _card: SdCardInfo,
        fs: FatVolume,
    ) -> Result<(), SdBackendError> {
        if fs.open_files() != 0 {
            log::warn!(
                "sdcard: unmount_with_open_files mount_point={} open={}",
                mount_point,
                fs.open_files()
            );
        }
        let result = block_on(fs.into_inner().unmount());
        self.slot.mark_released();
        result.map_err(SdBackendError::from)
    }
}

async fn mount_card(
    mut bus: SdBus,
    mut cs: Output<'static>,
    max_freq_khz: u32,
    config: &MountConfig,
) -> Result<(SdCardInfo, SdFs), MountError<SdBackendError>> {
    if let Err(err) = sdspi::sd_init(&mut bus, &mut cs).await {
        log::warn!("sdcard: sd_init_error err={:?}", err);
        return Err(MountError::Card(SdBackendError::NoResponse));
    }
    let device = match ExclusiveDevice::new(bus, cs, Delay) {
        Ok(device) => device,
        Err(never) => match never {},
    };

    let mut sd = SdSpi::<_, _, A4>::new(device, Delay);
    sd.init().await.map_err(card_error)?;
    let capacity_bytes = sd.size().await.map_err(card_error)?;

    let data_config = SpiConfig::default()
        .with_frequency(Rate::from_khz(max_freq_khz))
        .with_mode(SpiMode::_0);
    sd.spi(|device| device.bus_mut().apply_config(&data_config))
        .map_err(card_error)?;

    let mut stream = BufStream::<_, SECTOR_SIZE>::new(sd);
    let mut sector = [0u8; SECTOR_SIZE];
    stream.read_exact(&mut sector).await.map_err(block_io_error)?;

    let card_sectors = capacity_bytes / SECTOR_SIZE as u64;
    let partition = match locate_volume(&sector, card_sectors) {
        Some(partition) => partition,
        None if config.format_if_mount_failed => Partition {
            start_lba: 0,
            sectors: card_sectors,
        },
        None => {
            log::warn!("sdcard: no_fat_volume sectors={}", card_sectors);
            return Err(MountError::Filesystem);
        }
    };
    let (start, end) = partition.byte_range();
    let mut volume = StreamSlice::new(stream, start, end)
        .await
        .map_err(block_io_error)?;

    let mut formatted = false;
    if config.format_if_mount_failed {
        volume.read_exact(&mut sector).await.map_err(block_io_error)?;
        volume.seek(SeekFrom::Start(0)).await.map_err(block_io_error)?;
        if !is_fat_boot_sector(&sector) {
            log::warn!(
                "sdcard: formatting partition_lba={} sectors={}",
                partition.start_lba,
                partition.sectors
            );
            format_volume(&mut volume, FormatVolumeOptions::new())
                .await
                .map_err(|err| {
                    log::error!("sdcard: format_error err={:?}", err);
                    MountError::Filesystem
                })?;
            formatted = true;
        }
    }

    let fs = FileSystem::new(volume, FsOptions::new())
        .await
        .map_err(|err| {
            log::warn!("sdcard: fat_mount_error err={:?}", err);
            MountError::Filesystem
        })?;

    Ok((
        SdCardInfo {
            capacity_bytes,
            partition,
            formatted,
        },
        fs,
    ))
}

fn card_error<E: Into<SdBackendError>>(err: E) -> MountError<SdBackendError> {
    MountError::Card(err.into())
}

fn block_io_error<E: fmt::Debug>(err: E) -> MountError<SdBackendError> {
    log::warn!("sdcard: block_io_error err={:?}", err);
    MountError::Card(SdBackendError::BlockIo)
}

use heapless::Vec;

use crate::{
    error::FileManagerError,
    platform::{CardMounter, MountError, Mounted, SpiBusDriver},
    volume::Volume,
    MOUNT_POINT,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MountConfig {
    pub format_if_mount_failed: bool,
    pub max_files: usize,
}

impl Default for MountConfig {
    fn default() -> Self {
        Self {
            format_if_mount_failed: false,
            max_files: 5,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SpiHost {
    Spi2,
    Spi3,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HostConfig {
    pub slot: SpiHost,
    pub max_freq_khz: u32,
}

impl HostConfig {
    pub const SDSPI_DEFAULT: Self = Self {
        slot: SpiHost::Spi2,
        max_freq_khz: 20_000,
    };
}

impl Default for HostConfig {
    fn default() -> Self {
        Self::SDSPI_DEFAULT
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BusConfig {
    pub mosi: u8,
    pub miso: u8,
    pub sclk: u8,
    pub quadwp: Option<u8>,
    pub quadhd: Option<u8>,
    pub max_transfer_sz: usize,
}

/// Card slot on the SPI bus. Left unassigned by callers; [`initialize`] fills
/// in the chip-select pin and the host it sits on.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SlotConfig {
    pub gpio_cs: Option<u8>,
    pub host_id: Option<SpiHost>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DmaChannel {
    Auto,
    Disabled,
}

/// Handle to the mounted card. Owns the bus, the mount and the volume; every
/// file operation goes through [`SdCard::volume`].
pub struct SdCard<B: SpiBusDriver, M: CardMounter> {
    bus: B,
    mounter: M,
    host: SpiHost,
    slot: SlotConfig,
    card: M::Card,
    volume: Volume<M::Fs>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TeardownWarning {
    Unmount,
    BusFree,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TeardownReport {
    pub warnings: Vec<TeardownWarning, 2>,
}

impl TeardownReport {
    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty()
    }
}

pub fn initialize<B, M>(
    mut bus: B,
    mut mounter: M,
    mount: &MountConfig,
    host: &HostConfig,
    bus_config: &BusConfig,
    mut slot: SlotConfig,
    cs_pin: u8,
) -> Result<SdCard<B, M>, FileManagerError>
where
    B: SpiBusDriver,
    M: CardMounter,
{
    log::info!(
        "sdcard: init host={:?} mosi={} miso={} sclk={} cs={} max_transfer={}",
        host.slot,
        bus_config.mosi,
        bus_config.miso,
        bus_config.sclk,
        cs_pin,
        bus_config.max_transfer_sz
    );

    if let Err(err) = bus.initialize(host.slot, bus_config, DmaChannel::Auto) {
        log::error!("sdcard: bus_init_error host={:?} err={:?}", host.slot, err);
        return Err(FileManagerError::InitFailed);
    }

    slot.gpio_cs = Some(cs_pin);
    slot.host_id = Some(host.slot);

    log::info!(
        "sdcard: mounting mount_point={} format_if_mount_failed={} max_files={}",
        MOUNT_POINT,
        mount.format_if_mount_failed as u8,
        mount.max_files
    );
    let Mounted { card, fs } = match mounter.mount(MOUNT_POINT, host, &slot, mount) {
        Ok(mounted) => mounted,
        Err(err) => {
            let code = match err {
                MountError::Filesystem => {
                    log::error!(
                        "sdcard: mount_error mount_point={} hint=enable format-if-mount-failed to format the card",
                        MOUNT_POINT
                    );
                    FileManagerError::MountFailed
                }
                MountError::Card(err) => {
                    log::error!(
                        "sdcard: card_init_error err={:?} hint=check pull-up resistors on the SD lines",
                        err
                    );
                    FileManagerError::CardInitFailed
                }
            };
            if let Err(err) = bus.free(host.slot) {
                log::warn!("sdcard: bus_free_error host={:?} err={:?}", host.slot, err);
            }
            return Err(code);
        }
    };

    log::info!("sdcard: mounted mount_point={}", MOUNT_POINT);
    log::info!("sdcard: card {}", card);

    Ok(SdCard {
        bus,
        mounter,
        host: host.slot,
        slot,
        card,
        volume: Volume::new(fs, MOUNT_POINT),
    })
}

impl<B: SpiBusDriver, M: CardMounter> SdCard<B, M> {
    pub fn volume(&mut self) -> &mut Volume<M::Fs> {
        &mut self.volume
    }

    pub fn card(&self) -> &M::Card {
        &self.card
    }

    pub fn slot(&self) -> &SlotConfig {
        &self.slot
    }

    /// Unmounts and frees the bus. Both steps always run; failures are logged
    /// and returned as warnings.
    pub fn teardown(self) -> TeardownReport {
        let Self {
            mut bus,
            mut mounter,
            host,
            card,
            volume,
            ..
        } = self;
        let mount_point = volume.mount_point();

        log::info!("sdcard: teardown mount_point={}", mount_point);
        let unmount = match mounter.unmount(mount_point, card, volume.into_inner()) {
            Ok(()) => {
                log::info!("sdcard: unmounted mount_point={}", mount_point);
                None
            }
            Err(err) => {
                log::warn!("sdcard: unmount_error mount_point={} err={:?}", mount_point, err);
                Some(TeardownWarning::Unmount)
            }
        };
        let bus_free = match bus.free(host) {
            Ok(()) => None,
            Err(err) => {
                log::warn!("sdcard: bus_free_error host={:?} err={:?}", host, err);
                Some(TeardownWarning::BusFree)
            }
        };
        TeardownReport {
            warnings: [unmount, bus_free].into_iter().flatten().collect(),
        }
    }
}

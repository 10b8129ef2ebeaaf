use core::cell::RefCell;

use embassy_sync::blocking_mutex::{raw::CriticalSectionRawMutex, Mutex};
use esp_hal::{
    dma::{DmaRxBuf, DmaTxBuf},
    dma_buffers,
    gpio::{AnyPin, Pin},
    peripherals::{DMA_SPI2, SPI2},
    spi::{
        master::{Config as SpiConfig, Spi, SpiDmaBus},
        Mode as SpiMode,
    },
    time::Rate,
    Async,
};

use super::{card::SD_INIT_FREQ_KHZ, error::SdBackendError};
use crate::{
    mount::{BusConfig, DmaChannel, SpiHost},
    platform::SpiBusDriver,
};

pub const SD_DMA_BUFFER_LEN: usize = 4000;

pub type SdBus = SpiDmaBus<'static, Async>;

enum BusState {
    Uninit,
    Ready(SdBus),
    /// Moved into the card driver stack by a mount.
    Lent,
    /// Dropped together with the driver stack that owned it.
    Released,
}

/// Hand-over point between [`EspSpiBus`] and [`super::EspCardMounter`]: the
/// bus driver parks the configured master here, the mounter borrows it for
/// the lifetime of the mount.
pub struct BusSlot(Mutex<CriticalSectionRawMutex, RefCell<BusState>>);

impl BusSlot {
    pub const fn new() -> Self {
        Self(Mutex::new(RefCell::new(BusState::Uninit)))
    }

    fn put(&self, bus: SdBus) {
        self.0.lock(|state| *state.borrow_mut() = BusState::Ready(bus));
    }

    pub(super) fn lend(&self) -> Option<SdBus> {
        self.0.lock(|state| {
            let mut state = state.borrow_mut();
            match core::mem::replace(&mut *state, BusState::Lent) {
                BusState::Ready(bus) => Some(bus),
                other => {
                    *state = other;
                    None
                }
            }
        })
    }

    pub(super) fn mark_released(&self) {
        self.0.lock(|state| *state.borrow_mut() = BusState::Released);
    }

    fn release(&self) -> Result<(), SdBackendError> {
        self.0.lock(|state| {
            let mut state = state.borrow_mut();
            match &*state {
                BusState::Uninit => Err(SdBackendError::BusUnavailable),
                BusState::Lent => Err(SdBackendError::BusInUse),
                BusState::Ready(_) | BusState::Released => {
                    *state = BusState::Released;
                    Ok(())
                }
            }
        })
    }
}

impl Default for BusSlot {
    fn default() -> Self {
        Self::new()
    }
}

pub static SD_BUS: BusSlot = BusSlot::new();

pub struct SdSpiPeripherals {
    pub spi: SPI2<'static>,
    pub dma: DMA_SPI2<'static>,
    pub sclk: AnyPin<'static>,
    pub mosi: AnyPin<'static>,
    pub miso: AnyPin<'static>,
}

/// SPI2 master for the card slot. The peripherals are consumed by the first
/// successful `initialize`; the bus cannot be brought up twice.
pub struct EspSpiBus {
    parts: Option<SdSpiPeripherals>,
    slot: &'static BusSlot,
}

impl EspSpiBus {
    pub fn new(parts: SdSpiPeripherals, slot: &'static BusSlot) -> Self {
        Self {
            parts: Some(parts),
            slot,
        }
    }

    fn check_wiring(parts: &SdSpiPeripherals, bus: &BusConfig) -> Result<(), SdBackendError> {
        let wiring = [
            (bus.sclk, parts.sclk.number()),
            (bus.mosi, parts.mosi.number()),
            (bus.miso, parts.miso.number()),
        ];
        for (expected, wired) in wiring {
            if expected != wired {
                return Err(SdBackendError::PinMismatch { expected, wired });
            }
        }
        if bus.quadwp.is_some() || bus.quadhd.is_some() {
            return Err(SdBackendError::QuadLinesUnsupported);
        }
        if bus.max_transfer_sz > SD_DMA_BUFFER_LEN {
            return Err(SdBackendError::TransferTooLarge(bus.max_transfer_sz));
        }
        Ok(())
    }
}

impl SpiBusDriver for EspSpiBus {
    type Error = SdBackendError;

    fn initialize(
        &mut self,
        host: SpiHost,
        bus: &BusConfig,
        dma: DmaChannel,
    ) -> Result<(), SdBackendError> {
        if host != SpiHost::Spi2 {
            return Err(SdBackendError::UnsupportedHost(host));
        }
        if dma == DmaChannel::Disabled {
            return Err(SdBackendError::DmaRequired);
        }
        let parts = self.parts.as_ref().ok_or(SdBackendError::BusInUse)?;
        Self::check_wiring(parts, bus)?;
        let Some(parts) = self.parts.take() else {
            return Err(SdBackendError::BusInUse);
        };

        let config = SpiConfig::default()
            .with_frequency(Rate::from_khz(SD_INIT_FREQ_KHZ))
            .with_mode(SpiMode::_0);
        let (rx_buffer, rx_descriptors, tx_buffer, tx_descriptors) =
            dma_buffers!(SD_DMA_BUFFER_LEN);
        let rx = DmaRxBuf::new(rx_descriptors, rx_buffer)?;
        let tx = DmaTxBuf::new(tx_descriptors, tx_buffer)?;

        let spi = Spi::new(parts.spi, config)?
            .with_sck(parts.sclk)
            .with_mosi(parts.mosi)
            .with_miso(parts.miso)
            .with_dma(parts.dma)
            .with_buffers(rx, tx)
            .into_async();
        self.slot.put(spi);
        log::debug!(
            "sdcard: bus_ready host={:?} init_khz={} dma_len={}",
            host,
            SD_INIT_FREQ_KHZ,
            SD_DMA_BUFFER_LEN
        );
        Ok(())
    }

    fn free(&mut self, host: SpiHost) -> Result<(), SdBackendError> {
        self.slot.release()?;
        log::debug!("sdcard: bus_released host={:?}", host);
        Ok(())
    }
}

//! On-device checks against a real card in the slot: mount, record round
//! trip, device layout and teardown. Each test starts from a fresh boot.

#![no_std]
#![no_main]

#[cfg(test)]
#[embedded_test::tests]
mod tests {
    use esp_hal::{
        gpio::{Level, Output, OutputConfig},
        timer::timg::TimerGroup,
    };
    use filemanager::{
        esp::{EspCardMounter, EspSdCard, EspSpiBus, SdSpiPeripherals, SD_BUS},
        platform::CardInfo,
        BusConfig, FileManagerError, HostConfig, Line, MountConfig, SlotConfig, DEVICE_FILES,
    };

    const CS_PIN: u8 = 15;
    const SMOKE_DEVICE: &str = "smoke_dev";

    #[init]
    fn init() -> EspSdCard {
        let peripherals = esp_hal::init(esp_hal::Config::default());
        let timg0 = TimerGroup::new(peripherals.TIMG0);
        esp_rtos::start(timg0.timer0);

        let bus = EspSpiBus::new(
            SdSpiPeripherals {
                spi: peripherals.SPI2,
                dma: peripherals.DMA_SPI2,
                sclk: peripherals.GPIO14.into(),
                mosi: peripherals.GPIO13.into(),
                miso: peripherals.GPIO12.into(),
            },
            &SD_BUS,
        );
        let cs = Output::new(peripherals.GPIO15, Level::High, OutputConfig::default());
        let mounter = EspCardMounter::new(cs, CS_PIN, &SD_BUS);
        let bus_config = BusConfig {
            mosi: 13,
            miso: 12,
            sclk: 14,
            quadwp: None,
            quadhd: None,
            max_transfer_sz: 4000,
        };

        filemanager::initialize(
            bus,
            mounter,
            &MountConfig::default(),
            &HostConfig::default(),
            &bus_config,
            SlotConfig::default(),
            CS_PIN,
        )
        .unwrap()
    }

    #[test]
    fn mounted_card_reports_capacity(card: EspSdCard) {
        assert!(card.card().capacity_bytes() > 0);
        assert_eq!(card.slot().gpio_cs, Some(CS_PIN));
        assert!(card.teardown().is_clean());
    }

    #[test]
    fn record_round_trip(mut card: EspSdCard) {
        let volume = card.volume();
        match volume.remove_file("smoke") {
            Ok(()) | Err(FileManagerError::NotFound) => {}
            Err(err) => panic!("cleanup failed: {}", err),
        }

        volume.append_record("smoke", &Line(42u32)).unwrap();
        volume.append_record("smoke", &Line(7u32)).unwrap();
        assert_eq!(volume.read_record::<u32>("smoke"), Ok(42));

        match volume.remove_file("smoke_renamed") {
            Ok(()) | Err(FileManagerError::NotFound) => {}
            Err(err) => panic!("cleanup failed: {}", err),
        }
        volume.rename_file("smoke", "smoke_renamed").unwrap();
        assert_eq!(
            volume.read_record::<u32>("smoke"),
            Err(FileManagerError::OpenFailed)
        );
        volume.remove_file("smoke_renamed").unwrap();

        assert!(card.teardown().is_clean());
    }

    #[test]
    fn device_structure_is_on_card(mut card: EspSdCard) {
        let volume = card.volume();
        match volume.create_folder(SMOKE_DEVICE) {
            Ok(()) | Err(FileManagerError::AlreadyExists) => {}
            Err(err) => panic!("device folder failed: {}", err),
        }
        match volume.create_device_structure(SMOKE_DEVICE) {
            Ok(()) | Err(FileManagerError::StructureFailed { entry: "Firmware" }) => {}
            Err(err) => panic!("device structure failed: {}", err),
        }

        for file in DEVICE_FILES {
            let mut name = heapless::String::<128>::new();
            name.push_str(SMOKE_DEVICE).unwrap();
            name.push('/').unwrap();
            name.push_str(file).unwrap();
            assert!(volume.resolve_path(&name).is_ok());
        }

        assert!(card.teardown().is_clean());
    }
}

pub(crate) mod config;

use esp_hal::{
    gpio::{Level, Output, OutputConfig},
    timer::timg::TimerGroup,
};
use filemanager::{
    esp::{EspCardMounter, EspSdCard, EspSpiBus, SdSpiPeripherals, SD_BUS},
    path::join,
    SdPath, SlotConfig,
};

use self::config::{
    BUS_CONFIG, DEVICE_ID, DEVICE_LOG_FILE, HOST_CONFIG, LOG_LEVEL, MOUNT_CONFIG, PIN_NUM_CS,
};

pub(crate) fn run() -> ! {
    esp_println::logger::init_logger(LOG_LEVEL);
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
    let sd_cs = Output::new(peripherals.GPIO15, Level::High, OutputConfig::default());
    let mounter = EspCardMounter::new(sd_cs, PIN_NUM_CS, &SD_BUS);

    let card = filemanager::initialize(
        bus,
        mounter,
        &MOUNT_CONFIG,
        &HOST_CONFIG,
        &BUS_CONFIG,
        SlotConfig::default(),
        PIN_NUM_CS,
    );
    match card {
        Ok(mut card) => {
            prepare_device(&mut card);
            // Keep the card mounted for the rest of the session.
            halt_forever()
        }
        Err(err) => {
            log::error!("boot: sdcard_unavailable err={}", err);
            esp_println::println!("ERROR");
            halt_forever()
        }
    }
}

/// Boot-time layout: device folder, fixed structure underneath it, then a
/// lookup of the device log. Each step reports on its own; a failing step
/// does not stop the next one.
fn prepare_device(card: &mut EspSdCard) {
    let volume = card.volume();

    match volume.create_folder(DEVICE_ID) {
        Ok(()) => log::info!("boot: device_folder_created id={}", DEVICE_ID),
        Err(err) => log::warn!("boot: device_folder_error id={} err={}", DEVICE_ID, err),
    }

    match volume.create_device_structure(DEVICE_ID) {
        Ok(()) => log::info!("boot: device_structure_created id={}", DEVICE_ID),
        Err(err) => log::warn!("boot: device_structure_error id={} err={}", DEVICE_ID, err),
    }

    let log_name: SdPath = match join(&[DEVICE_ID, DEVICE_LOG_FILE]) {
        Ok(name) => name,
        Err(_) => {
            log::warn!("boot: log_path_too_long id={}", DEVICE_ID);
            return;
        }
    };
    match volume.resolve_path(&log_name) {
        Ok(path) => log::info!("boot: device_log path={}", path),
        Err(err) => log::warn!("boot: device_log_error name={} err={}", log_name, err),
    }
}

fn halt_forever() -> ! {
    loop {
        core::hint::spin_loop();
    }
}

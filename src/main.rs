#![no_std]
#![no_main]

extern crate alloc;

// Required for ESP-IDF bootloader compatibility
esp_bootloader_esp_idf::esp_app_desc!(
    env!("CARGO_PKG_VERSION"),  // version
    env!("CARGO_PKG_NAME"),     // project_name
    "00:00:00",                 // build_time
    "2025-01-01",               // build_date
    "0.0.0",                    // idf_ver (not using IDF)
    0x10000,                    // mmu_page_size (64KB)
    0,                          // min_efuse_blk_rev_full (accept all)
    u16::MAX                    // max_efuse_blk_rev_full (accept all)
);

use embassy_executor::Spawner;
use embassy_sync::mutex::Mutex;
use embedded_hal_bus::spi::ExclusiveDevice;
use embedded_sdmmc::SdCard;
use esp_backtrace as _;
use esp_hal::delay::Delay;
use esp_hal::gpio::{Input, InputConfig, Level, Output, OutputConfig, Pull};
use esp_hal::i2c::master::{Config as I2cConfig, I2c};
use esp_hal::spi::master::{Config as SpiConfig, Spi};
use esp_hal::spi::Mode as SpiMode;
use esp_hal::time::Rate;
use esp_hal::timer::timg::TimerGroup;
use esp_hal::uart::{Config as UartConfig, Uart, UartRx, UartTx};
use esp_hal::{Async, Blocking};
use esp_storage::FlashStorage;
use static_cell::StaticCell;

use ar_glass_firmware::audio::DiscardSink;
use ar_glass_firmware::config;
use ar_glass_firmware::image::StoredImageSource;
use ar_glass_firmware::ota::flash::FlashUpdater;
use ar_glass_firmware::power::axp2101::Axp2101;
use ar_glass_firmware::power::SharedPower;
use ar_glass_firmware::serial::traits::IoPort;
use ar_glass_firmware::storage::sdcard::{FixedTime, SdCardStorage};
use ar_glass_firmware::storage::SharedStorage;
use ar_glass_firmware::tasks;

/// SD card SPI clock during card initialisation
const SD_INIT_KHZ: u32 = 400;
/// SD card SPI clock once the card is up
const SD_RUN_MHZ: u32 = 20;

type SdStorage = SdCardStorage<
    SdCard<ExclusiveDevice<Spi<'static, Blocking>, Output<'static>, Delay>, Delay>,
    FixedTime,
>;

type PowerChip = Axp2101<I2c<'static, Blocking>>;

/// Type alias for the BLE controller
type BleController = trouble_host::prelude::ExternalController<
    esp_radio::ble::controller::BleConnector<'static>,
    10,
>;

/// Static executor for embassy
static EXECUTOR: StaticCell<esp_rtos::embassy::Executor> = StaticCell::new();

/// Static cell for esp-radio controller (needed for 'static lifetime)
static RADIO_CONTROLLER: StaticCell<esp_radio::Controller<'static>> = StaticCell::new();

static STORAGE: StaticCell<SharedStorage<SdStorage>> = StaticCell::new();

static POWER: StaticCell<SharedPower<PowerChip>> = StaticCell::new();

/// Park the CPU after a fatal bring-up error
fn halt(reason: &str) -> ! {
    log::error!("halted: {}", reason);
    loop {
        core::hint::spin_loop();
    }
}

#[esp_hal::main]
fn main() -> ! {
    esp_println::logger::init_logger(config::log::LEVEL);

    // Internal RAM for the BLE stack, PSRAM for image and document buffers
    esp_alloc::heap_allocator!(size: 72 * 1024);

    let peripherals = esp_hal::init(esp_hal::Config::default());
    esp_alloc::psram_allocator!(peripherals.PSRAM, esp_hal::psram);

    // Initialise the RTOS scheduler with timer - MUST be done before any async operations
    let timg0 = TimerGroup::new(peripherals.TIMG0);
    esp_rtos::start(timg0.timer0);

    log::info!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));

    // Power management chip
    let i2c = I2c::new(
        peripherals.I2C0,
        I2cConfig::default().with_frequency(Rate::from_khz(400)),
    )
    .expect("Failed to configure I2C")
    .with_sda(peripherals.GPIO1)
    .with_scl(peripherals.GPIO2);
    let power = match Axp2101::new(i2c) {
        Ok(chip) => POWER.init(Mutex::new(chip)),
        Err(e) => halt(&alloc::format!("power chip: {}", e)),
    };

    // microSD card
    let spi = Spi::new(
        peripherals.SPI2,
        SpiConfig::default()
            .with_frequency(Rate::from_khz(SD_INIT_KHZ))
            .with_mode(SpiMode::_0),
    )
    .expect("Failed to configure SPI")
    .with_sck(peripherals.GPIO5)
    .with_mosi(peripherals.GPIO4)
    .with_miso(peripherals.GPIO11);
    let cs = Output::new(peripherals.GPIO10, Level::High, OutputConfig::default());
    let sd_device = ExclusiveDevice::new(spi, cs, Delay::new()).expect("Failed to claim SD chip select");
    let sdcard = SdCard::new(sd_device, Delay::new());
    match sdcard.num_bytes() {
        Ok(bytes) => log::info!("sd: card of {} MB", bytes / (1024 * 1024)),
        Err(e) => halt(&alloc::format!("sd card: {:?}", e)),
    }
    sdcard.spi(|device| {
        let fast = SpiConfig::default()
            .with_frequency(Rate::from_mhz(SD_RUN_MHZ))
            .with_mode(SpiMode::_0);
        if device.bus_mut().apply_config(&fast).is_err() {
            log::warn!("sd: staying at {} kHz", SD_INIT_KHZ);
        }
    });
    let storage = match SdCardStorage::mount(sdcard, FixedTime) {
        Ok(sd) => STORAGE.init(Mutex::new(sd)),
        Err(e) => halt(&alloc::format!("sd mount: {}", e)),
    };

    // Panel link
    let uart = Uart::new(
        peripherals.UART1,
        UartConfig::default().with_baudrate(config::link::BAUD_RATE),
    )
    .expect("Failed to configure UART")
    .with_rx(peripherals.GPIO42)
    .with_tx(peripherals.GPIO41)
    .into_async();
    let (uart_rx, uart_tx) = uart.split();

    let button = Input::new(peripherals.GPIO0, InputConfig::default().with_pull(Pull::Up));

    let updater = FlashUpdater::new(FlashStorage::new(peripherals.FLASH));

    // Random static address derived from the factory MAC
    let mut address = esp_hal::efuse::Efuse::read_base_mac_address();
    address[5] |= 0xC0;

    // Initialise esp-radio for BLE support (must be after esp_rtos::start)
    let radio_controller = RADIO_CONTROLLER.init(
        esp_radio::init().expect("Failed to initialize esp-radio")
    );
    let ble_connector = esp_radio::ble::controller::BleConnector::new(
        radio_controller,
        peripherals.BT,
        esp_radio::ble::Config::default(),
    ).expect("Failed to initialize BLE connector");
    let controller: BleController = trouble_host::prelude::ExternalController::new(ble_connector);

    let executor = EXECUTOR.init(esp_rtos::embassy::Executor::new());
    executor.run(|spawner| {
        spawner.must_spawn(async_main(
            spawner, controller, address, power, storage, uart_rx, uart_tx, button, updater,
        ));
    })
}

#[allow(clippy::too_many_arguments)]
#[embassy_executor::task]
async fn async_main(
    spawner: Spawner,
    controller: BleController,
    address: [u8; 6],
    power: &'static SharedPower<PowerChip>,
    storage: &'static SharedStorage<SdStorage>,
    uart_rx: UartRx<'static, Async>,
    uart_tx: UartTx<'static, Async>,
    button: Input<'static>,
    updater: FlashUpdater<'static>,
) {
    spawner.spawn(ble_host_task(controller, address, power)).unwrap();
    spawner.spawn(controller_task(storage, updater)).unwrap();
    spawner.spawn(capture_task(storage)).unwrap();
    spawner.spawn(link_reader_task(uart_rx)).unwrap();
    spawner.spawn(link_writer_task(uart_tx)).unwrap();
    spawner.spawn(button_task(button)).unwrap();
    spawner.spawn(diagnostics_task(power)).unwrap();
    log::info!("tasks started");
}

#[embassy_executor::task]
async fn ble_host_task(controller: BleController, address: [u8; 6], power: &'static SharedPower<PowerChip>) {
    tasks::ble_task(controller, address, power).await;
}

#[embassy_executor::task]
async fn controller_task(storage: &'static SharedStorage<SdStorage>, updater: FlashUpdater<'static>) {
    tasks::controller_task(storage, DiscardSink::new(), updater).await;
}

#[embassy_executor::task]
async fn capture_task(storage: &'static SharedStorage<SdStorage>) {
    tasks::capture_task(StoredImageSource::new(storage)).await;
}

#[embassy_executor::task]
async fn link_reader_task(uart_rx: UartRx<'static, Async>) {
    tasks::link_reader_task(IoPort(uart_rx)).await;
}

#[embassy_executor::task]
async fn link_writer_task(uart_tx: UartTx<'static, Async>) {
    tasks::link_writer_task(IoPort(uart_tx)).await;
}

#[embassy_executor::task]
async fn button_task(button: Input<'static>) {
    tasks::button_task(button).await;
}

#[embassy_executor::task]
async fn diagnostics_task(power: &'static SharedPower<PowerChip>) {
    tasks::diagnostics_task(power).await;
}

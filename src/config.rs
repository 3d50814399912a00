//! Hardware and protocol configuration constants for the ESP32-S3 glasses board

/// BLE GATT layout
///
/// All UUIDs share the base `aabbXXXX-0000-1000-8000-00805f9b34fb`, where the
/// high byte of `XXXX` is the service and the low byte the characteristic.
pub mod ble {
    /// Advertised device name (the companion app scans for this)
    pub const DEVICE_NAME: &str = "AR_GLASS";

    /// Largest single characteristic write accepted from the peer
    pub const MAX_WRITE_LEN: usize = 512;

    /// Longest file name accepted on the name characteristic
    pub const MAX_NAME_LEN: usize = 128;

    pub const FILE_SERVICE_UUID: &str = "aabb0100-0000-1000-8000-00805f9b34fb";
    pub const FILE_DATA_UUID: &str = "aabb0101-0000-1000-8000-00805f9b34fb";
    pub const FILE_CONTROL_UUID: &str = "aabb0102-0000-1000-8000-00805f9b34fb";
    pub const FILE_NAME_UUID: &str = "aabb0103-0000-1000-8000-00805f9b34fb";

    pub const IMAGE_SERVICE_UUID: &str = "aabb0200-0000-1000-8000-00805f9b34fb";
    pub const IMAGE_LENGTH_UUID: &str = "aabb0201-0000-1000-8000-00805f9b34fb";
    pub const IMAGE_CONTROL_UUID: &str = "aabb0202-0000-1000-8000-00805f9b34fb";
    pub const IMAGE_DATA_UUID: &str = "aabb0203-0000-1000-8000-00805f9b34fb";

    pub const STATUS_SERVICE_UUID: &str = "aabb0300-0000-1000-8000-00805f9b34fb";
    pub const STATUS_BATTERY_UUID: &str = "aabb0301-0000-1000-8000-00805f9b34fb";
    pub const STATUS_CONTROL_UUID: &str = "aabb0302-0000-1000-8000-00805f9b34fb";
    pub const STATUS_NOTIFY_UUID: &str = "aabb0303-0000-1000-8000-00805f9b34fb";
}

/// Image capture and chunked transfer
pub mod image {
    /// Bytes per image-data notification (stays under the negotiated ATT MTU)
    pub const CHUNK_SIZE: usize = 400;

    /// Interval of the capture task's request poll
    pub const CAPTURE_POLL_MS: u64 = 100;

    /// Largest image the producer will load into RAM
    pub const MAX_IMAGE_BYTES: usize = 2 * 1024 * 1024;
}

/// Paged text rendering
pub mod text {
    /// Display lines per page
    pub const LINES_PER_PAGE: usize = 6;

    /// Maximum bytes per display line
    pub const LINE_BYTES: usize = 60;

    /// Suffix appended to a document path to name its page index
    pub const INDEX_SUFFIX: &str = ".sy";

    /// Suffix appended to a JSON document path to name its extracted text
    pub const EXTRACTED_SUFFIX: &str = ".txt";

    /// Largest JSON document loaded for extraction
    pub const MAX_JSON_BYTES: usize = 256 * 1024;
}

/// Panel serial link
pub mod link {
    /// Header width: 1 command byte + 8 decimal length digits
    pub const HEADER_LEN: usize = 9;

    /// Number of zero-padded decimal digits in the length field
    pub const LENGTH_DIGITS: usize = 8;

    /// Largest length the header can express
    pub const MAX_PAYLOAD_LEN: usize = 99_999_999;

    /// Largest inbound payload buffered in RAM; longer frames are skipped
    pub const MAX_RX_PAYLOAD: usize = 64 * 1024;

    /// Quiet time after which a desynchronised reader starts over
    pub const RESYNC_GAP_MS: u64 = 50;

    pub const BAUD_RATE: u32 = 115_200;
    pub const RX_PIN: u8 = 42;
    pub const TX_PIN: u8 = 41;
}

/// Filesystem layout on the microSD card
pub mod storage {
    /// Mount point the companion app prefixes to device paths
    pub const MOUNT_PREFIX: &str = "/sdcard";

    /// Directory holding sequential captures
    pub const PICTURE_DIR: &str = "/picture";

    /// Capture file name prefix (`IMG_0001.jpg`)
    pub const PICTURE_PREFIX: &str = "IMG_";

    /// Capture file name extension
    pub const PICTURE_EXT: &str = ".jpg";

    /// Directory holding uploaded JSON documents
    pub const JSON_DIR: &str = "/json";

    /// Firmware image consumed by an OTA pass
    pub const UPDATE_IMAGE: &str = "/update.bin";

    /// Block size for streaming reads
    pub const READ_BLOCK: usize = 512;

    /// SD card SPI pins
    pub const SD_SCLK: u8 = 5;
    pub const SD_MOSI: u8 = 4;
    pub const SD_MISO: u8 = 11;
    pub const SD_CS: u8 = 10;
}

/// Audio playback
pub mod audio {
    /// Volume steps above mute
    pub const VOLUME_STEPS: u8 = 10;

    /// Volume at boot (half scale)
    pub const DEFAULT_VOLUME: u8 = 5;

    /// Pause between playback blocks when the sink is saturated
    pub const POLL_MS: u64 = 5;
}

/// Power management chip
pub mod power {
    /// AXP2101 7-bit I2C address
    pub const AXP2101_ADDRESS: u8 = 0x34;

    pub const I2C_SDA: u8 = 1;
    pub const I2C_SCL: u8 = 2;

    /// Interval of the diagnostics log task
    pub const DIAGNOSTICS_INTERVAL_MS: u64 = 20_000;

    /// Value reported on the battery characteristic when no cell is present
    pub const NO_BATTERY: i16 = -1;
}

/// User button
pub mod button {
    pub const PIN: u8 = 0;
    pub const DEBOUNCE_MS: u64 = 20;

    /// Second press within this window counts as a double click
    pub const DOUBLE_CLICK_MS: u64 = 300;
}

/// Logging
pub mod log {
    pub const LEVEL: ::log::LevelFilter = ::log::LevelFilter::Info;
}

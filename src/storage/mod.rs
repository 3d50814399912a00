//! SD card storage
//!
//! [`traits::Storage`] is the filesystem seam. [`guard::ActiveFile`] owns
//! the single upload handle and [`pictures::PictureStore`] numbers captures.
//! On the device the trait is backed by the FAT volume in `sdcard`.

pub mod fat;
pub mod guard;
pub mod pictures;
#[cfg(feature = "embedded")]
pub mod sdcard;
pub mod traits;

pub use guard::{ActiveFile, WriteOutcome};
pub use pictures::PictureStore;
pub use traits::{normalize_path, read_to_vec, write_file, Storage, StorageError};

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::mutex::Mutex;

/// Storage shared between the controller and capture tasks
pub type SharedStorage<S> = Mutex<CriticalSectionRawMutex, S>;

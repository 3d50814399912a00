//! Sequentially numbered captures under `/picture`

use alloc::format;
use alloc::string::String;

use crate::config::storage::{PICTURE_DIR, PICTURE_EXT, PICTURE_PREFIX};
use crate::storage::traits::{file_name, write_file, Storage, StorageError};

/// Parse the sequence number out of `IMG_0042.jpg`.
///
/// The FAT driver may report short names in upper case, so the prefix and
/// extension match case-insensitively.
pub fn parse_sequence(name: &str) -> Option<u16> {
    let prefix_len = PICTURE_PREFIX.len();
    let ext_len = PICTURE_EXT.len();
    if name.len() <= prefix_len + ext_len {
        return None;
    }
    let (prefix, rest) = name.split_at(prefix_len);
    let (digits, ext) = rest.split_at(rest.len() - ext_len);
    if !prefix.eq_ignore_ascii_case(PICTURE_PREFIX) || !ext.eq_ignore_ascii_case(PICTURE_EXT) {
        return None;
    }
    if !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// Allocates capture file names
pub struct PictureStore {
    next_seq: u16,
    latest: Option<u16>,
}

impl PictureStore {
    /// Scan the picture directory and continue after the highest number
    /// found. A missing directory starts the sequence at 1.
    pub fn scan<S: Storage>(storage: &mut S) -> Self {
        let latest = match storage.list(PICTURE_DIR) {
            Ok(paths) => paths
                .iter()
                .filter_map(|p| parse_sequence(file_name(p)))
                .max(),
            Err(e) => {
                log::warn!("pictures: cannot list {}: {}", PICTURE_DIR, e);
                None
            }
        };
        let next_seq = latest.unwrap_or(0).wrapping_add(1);
        log::info!("pictures: start seq from {}", next_seq);
        Self { next_seq, latest }
    }

    pub fn path_for(seq: u16) -> String {
        format!("{}/{}{:04}{}", PICTURE_DIR, PICTURE_PREFIX, seq, PICTURE_EXT)
    }

    /// Path the next save will use
    pub fn next_path(&self) -> String {
        Self::path_for(self.next_seq)
    }

    /// Path of the newest stored capture
    pub fn latest_path(&self) -> Option<String> {
        self.latest.map(Self::path_for)
    }

    /// Persist a JPEG as the next picture.
    ///
    /// The sequence number is consumed even if the write fails, so a bad
    /// sector never gets retried under the same name.
    pub fn save<S: Storage>(&mut self, storage: &mut S, jpeg: &[u8]) -> Result<String, StorageError> {
        if jpeg.is_empty() {
            log::error!("pictures: empty buffer");
            return Err(StorageError::Io);
        }

        let seq = self.next_seq;
        self.next_seq = self.next_seq.wrapping_add(1);
        let path = Self::path_for(seq);
        log::info!("pictures: saving {} ({} bytes)", path, jpeg.len());

        write_file(storage, &path, jpeg)?;
        self.latest = Some(seq);
        Ok(path)
    }
}

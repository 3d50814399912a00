//! FAT volume on the microSD card
//!
//! Wraps the `embedded-sdmmc` raw handle API. Every operation walks the
//! path from the root and closes the directories it opened before
//! returning, so at most two directory handles are live at once. Long names
//! are mapped through [`fat::short_name`].

use alloc::string::String;
use alloc::vec::Vec;
use core::fmt::Debug;

use embedded_sdmmc::{
    BlockDevice, DirEntry, Error, Mode, RawDirectory, RawFile, RawVolume, TimeSource, Timestamp,
    VolumeIdx, VolumeManager,
};

use crate::storage::fat::{self, ShortName};
use crate::storage::traits::{Storage, StorageError};

/// Clock for directory entries. The glasses have no RTC.
pub struct FixedTime;

impl TimeSource for FixedTime {
    fn get_timestamp(&self) -> Timestamp {
        Timestamp {
            year_since_1970: 55,
            zero_indexed_month: 0,
            zero_indexed_day: 0,
            hours: 0,
            minutes: 0,
            seconds: 0,
        }
    }
}

fn map_err<E: Debug>(err: Error<E>) -> StorageError {
    match err {
        Error::NotFound => StorageError::NotFound,
        Error::NotEnoughSpace => StorageError::Full,
        Error::FilenameError(_) => StorageError::InvalidName,
        Error::OpenedDirAsFile | Error::DeleteDirAsFile => StorageError::IsDirectory,
        other => {
            log::warn!("sd: {:?}", other);
            StorageError::Io
        }
    }
}

pub struct SdCardStorage<D: BlockDevice, T: TimeSource> {
    volumes: VolumeManager<D, T>,
    volume: RawVolume,
}

impl<D, T> SdCardStorage<D, T>
where
    D: BlockDevice,
    D::Error: Debug,
    T: TimeSource,
{
    /// Open the first FAT partition
    pub fn mount(device: D, time: T) -> Result<Self, StorageError> {
        let volumes = VolumeManager::new(device, time);
        let volume = volumes.open_raw_volume(VolumeIdx(0)).map_err(map_err)?;
        log::info!("sd: volume 0 mounted");
        Ok(Self { volumes, volume })
    }

    /// Open the directory at `components`, creating missing ones if asked
    fn open_dir<'p>(
        &self,
        components: impl Iterator<Item = &'p str>,
        create: bool,
    ) -> Result<RawDirectory, StorageError> {
        let mut dir = self.volumes.open_root_dir(self.volume).map_err(map_err)?;
        for component in components {
            let name = match fat::short_name(component) {
                Ok(name) => name,
                Err(e) => {
                    let _ = self.volumes.close_dir(dir);
                    return Err(e);
                }
            };
            let mut next = self.volumes.open_dir(dir, name.as_str());
            if create && matches!(next, Err(Error::NotFound)) {
                next = self
                    .volumes
                    .make_dir_in_dir(dir, name.as_str())
                    .and_then(|_| self.volumes.open_dir(dir, name.as_str()));
            }
            let _ = self.volumes.close_dir(dir);
            dir = next.map_err(map_err)?;
        }
        Ok(dir)
    }

    /// Open the parent directory of `path` and map its last component
    fn open_parent(&self, path: &str, create: bool) -> Result<(RawDirectory, ShortName), StorageError> {
        let parts: Vec<&str> = fat::components(path).collect();
        let (last, parents) = parts.split_last().ok_or(StorageError::IsDirectory)?;
        let name = fat::short_name(last)?;
        let dir = self.open_dir(parents.iter().copied(), create)?;
        Ok((dir, name))
    }

    fn entry(&self, path: &str) -> Result<DirEntry, StorageError> {
        let (dir, name) = self.open_parent(path, false)?;
        let entry = self.volumes.find_directory_entry(dir, name.as_str());
        let _ = self.volumes.close_dir(dir);
        entry.map_err(map_err)
    }

    fn is_root(path: &str) -> bool {
        fat::components(path).next().is_none()
    }

    fn read_file(&self, file: RawFile, offset: usize, buf: &mut [u8]) -> Result<usize, StorageError> {
        self.volumes
            .file_seek_from_start(file, offset as u32)
            .map_err(map_err)?;
        let mut filled = 0;
        while filled < buf.len() {
            let n = self.volumes.read(file, &mut buf[filled..]).map_err(map_err)?;
            if n == 0 {
                break;
            }
            filled += n;
        }
        Ok(filled)
    }
}

impl<D, T> Storage for SdCardStorage<D, T>
where
    D: BlockDevice,
    D::Error: Debug,
    T: TimeSource,
{
    type Writer = RawFile;

    fn exists(&mut self, path: &str) -> bool {
        Self::is_root(path) || self.entry(path).is_ok()
    }

    fn is_dir(&mut self, path: &str) -> bool {
        Self::is_root(path)
            || self
                .entry(path)
                .map(|e| e.attributes.is_directory())
                .unwrap_or(false)
    }

    fn size(&mut self, path: &str) -> Result<usize, StorageError> {
        if Self::is_root(path) {
            return Err(StorageError::IsDirectory);
        }
        let entry = self.entry(path)?;
        if entry.attributes.is_directory() {
            return Err(StorageError::IsDirectory);
        }
        Ok(entry.size as usize)
    }

    fn read_at(&mut self, path: &str, offset: usize, buf: &mut [u8]) -> Result<usize, StorageError> {
        let (dir, name) = self.open_parent(path, false)?;
        let file = self
            .volumes
            .open_file_in_dir(dir, name.as_str(), Mode::ReadOnly);
        let _ = self.volumes.close_dir(dir);
        let file = file.map_err(map_err)?;

        let len = self.volumes.file_length(file).map_err(map_err)? as usize;
        let result = if offset >= len {
            Ok(0)
        } else {
            self.read_file(file, offset, buf)
        };
        let _ = self.volumes.close_file(file);
        result
    }

    fn create(&mut self, path: &str) -> Result<RawFile, StorageError> {
        let (dir, name) = self.open_parent(path, true)?;
        let file = self
            .volumes
            .open_file_in_dir(dir, name.as_str(), Mode::ReadWriteCreateOrTruncate);
        let _ = self.volumes.close_dir(dir);
        file.map_err(map_err)
    }

    fn append(&mut self, writer: &mut RawFile, data: &[u8]) -> Result<(), StorageError> {
        self.volumes.write(*writer, data).map_err(map_err)
    }

    fn close(&mut self, writer: RawFile) -> Result<(), StorageError> {
        self.volumes.close_file(writer).map_err(map_err)
    }

    fn remove(&mut self, path: &str) -> Result<(), StorageError> {
        let (dir, name) = self.open_parent(path, false)?;
        let result = self.volumes.delete_file_in_dir(dir, name.as_str());
        let _ = self.volumes.close_dir(dir);
        result.map_err(map_err)
    }

    fn list(&mut self, dir_path: &str) -> Result<Vec<String>, StorageError> {
        let dir = self.open_dir(fat::components(dir_path), false)?;
        let base = dir_path.trim_end_matches('/');
        let mut paths = Vec::new();
        let result = self.volumes.iterate_dir(dir, |entry| {
            if !entry.attributes.is_directory() && !entry.attributes.is_volume() {
                paths.push(alloc::format!("{}/{}", base, entry.name));
            }
        });
        let _ = self.volumes.close_dir(dir);
        result.map_err(map_err)?;
        Ok(paths)
    }
}

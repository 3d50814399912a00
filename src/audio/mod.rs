//! Audio playback
//!
//! Decoding and the codec are behind [`AudioSink`]; this module only streams
//! file blocks into the sink and tracks the volume. Playback is cooperative:
//! the controller calls [`AudioPlayer::pump`] once per loop iteration while a
//! track is active.

use alloc::string::String;
use alloc::vec;
use core::fmt;
use core::future::Future;

use crate::config::audio::{DEFAULT_VOLUME, VOLUME_STEPS};
use crate::config::storage::READ_BLOCK;
use crate::storage::{SharedStorage, Storage, StorageError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioError {
    /// Track file missing or a directory
    NotFound,
    Storage(StorageError),
    /// Sink rejected data or a setting
    Sink,
}

impl From<StorageError> for AudioError {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::NotFound | StorageError::IsDirectory => Self::NotFound,
            other => Self::Storage(other),
        }
    }
}

impl fmt::Display for AudioError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "track not found"),
            Self::Storage(e) => write!(f, "storage: {}", e),
            Self::Sink => write!(f, "audio sink error"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VolumeStep {
    Up,
    Down,
}

/// Output volume in steps from 0 (mute) to `VOLUME_STEPS`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Volume(u8);

impl Volume {
    pub fn new(level: u8) -> Self {
        Self(level.min(VOLUME_STEPS))
    }

    pub fn level(&self) -> u8 {
        self.0
    }

    /// Volume as a percentage of full scale
    pub fn percent(&self) -> u8 {
        (self.0 as u16 * 100 / VOLUME_STEPS as u16) as u8
    }

    /// Apply one step. Returns false if already at the limit.
    pub fn step(&mut self, step: VolumeStep) -> bool {
        let next = match step {
            VolumeStep::Up => self.0.saturating_add(1).min(VOLUME_STEPS),
            VolumeStep::Down => self.0.saturating_sub(1),
        };
        let changed = next != self.0;
        self.0 = next;
        changed
    }
}

impl Default for Volume {
    fn default() -> Self {
        Self::new(DEFAULT_VOLUME)
    }
}

/// Decoder and codec output
pub trait AudioSink {
    /// Set the output level in percent
    fn set_volume(&mut self, percent: u8) -> Result<(), AudioError>;

    /// Feed one block of encoded audio
    fn write(&mut self, data: &[u8]) -> impl Future<Output = Result<(), AudioError>>;

    /// Drop anything buffered and silence the output
    fn stop(&mut self);
}

/// Result of one playback step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackStep {
    /// Nothing playing
    Idle,
    /// Bytes handed to the sink
    Played(usize),
    /// End of track reached
    Finished,
}

#[derive(Debug)]
struct Track {
    path: String,
    offset: usize,
}

/// Streams one track at a time into a sink
#[derive(Debug, Default)]
pub struct AudioPlayer {
    track: Option<Track>,
    volume: Volume,
}

impl AudioPlayer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn volume(&self) -> Volume {
        self.volume
    }

    pub fn is_playing(&self) -> bool {
        self.track.is_some()
    }

    pub fn current(&self) -> Option<&str> {
        self.track.as_ref().map(|t| t.path.as_str())
    }

    /// Start `path` from the beginning, replacing any current track
    pub fn play<S: Storage>(&mut self, storage: &mut S, path: &str) -> Result<(), AudioError> {
        if storage.is_dir(path) || !storage.exists(path) {
            log::warn!("audio: {} not found", path);
            return Err(AudioError::NotFound);
        }
        if let Some(old) = self.track.replace(Track {
            path: String::from(path),
            offset: 0,
        }) {
            log::info!("audio: {} replaced", old.path);
        }
        log::info!("audio: playing {}", path);
        Ok(())
    }

    /// Stop playback. Returns true if a track was playing.
    pub fn stop<K: AudioSink>(&mut self, sink: &mut K) -> bool {
        match self.track.take() {
            Some(track) => {
                sink.stop();
                log::info!("audio: stopped {} at {}", track.path, track.offset);
                true
            }
            None => false,
        }
    }

    /// Step the volume and push it to the sink
    pub fn adjust_volume<K: AudioSink>(&mut self, sink: &mut K, step: VolumeStep) -> Result<Volume, AudioError> {
        if self.volume.step(step) {
            sink.set_volume(self.volume.percent())?;
        }
        log::info!("audio: volume {}/{}", self.volume.level(), VOLUME_STEPS);
        Ok(self.volume)
    }

    /// Stream the next block of the current track.
    ///
    /// The storage lock is held only for the read. A read or sink error ends
    /// the track.
    pub async fn pump<S: Storage, K: AudioSink>(
        &mut self,
        storage: &SharedStorage<S>,
        sink: &mut K,
    ) -> Result<PlaybackStep, AudioError> {
        let Some(track) = self.track.as_mut() else {
            return Ok(PlaybackStep::Idle);
        };

        let mut block = vec![0u8; READ_BLOCK];
        let read = {
            let mut storage = storage.lock().await;
            storage.read_at(&track.path, track.offset, &mut block)
        };
        let n = match read {
            Ok(n) => n,
            Err(e) => {
                self.track = None;
                return Err(e.into());
            }
        };

        if n == 0 {
            log::info!("audio: finished {}", track.path);
            self.track = None;
            return Ok(PlaybackStep::Finished);
        }

        track.offset += n;
        if let Err(e) = sink.write(&block[..n]).await {
            self.track = None;
            sink.stop();
            return Err(e);
        }
        Ok(PlaybackStep::Played(n))
    }
}

/// Sink that accepts and drops audio, used until the codec is driven.
///
/// TODO: replace with an ES8311 I2S sink fed by an MP3 decoder.
#[derive(Debug, Default)]
pub struct DiscardSink {
    volume: u8,
    consumed: usize,
}

impl DiscardSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bytes accepted since the last stop
    pub fn consumed(&self) -> usize {
        self.consumed
    }
}

impl AudioSink for DiscardSink {
    fn set_volume(&mut self, percent: u8) -> Result<(), AudioError> {
        self.volume = percent.min(100);
        Ok(())
    }

    async fn write(&mut self, data: &[u8]) -> Result<(), AudioError> {
        self.consumed += data.len();
        Ok(())
    }

    fn stop(&mut self) {
        log::debug!("audio: discarded {} bytes at {}%", self.consumed, self.volume);
        self.consumed = 0;
    }
}

#[cfg(test)]
pub mod mock {
    //! Recording audio sink

    use super::*;
    use alloc::vec::Vec;

    #[derive(Debug, Default)]
    pub struct RecordingSink {
        pub played: Vec<u8>,
        pub volume: Option<u8>,
        pub stops: usize,
        pub fail_writes: bool,
    }

    impl RecordingSink {
        pub fn new() -> Self {
            Self::default()
        }
    }

    impl AudioSink for RecordingSink {
        fn set_volume(&mut self, percent: u8) -> Result<(), AudioError> {
            self.volume = Some(percent);
            Ok(())
        }

        async fn write(&mut self, data: &[u8]) -> Result<(), AudioError> {
            if self.fail_writes {
                return Err(AudioError::Sink);
            }
            self.played.extend_from_slice(data);
            Ok(())
        }

        fn stop(&mut self) {
            self.stops += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::mock::RecordingSink;
    use super::*;
    use crate::storage::traits::mock::MemoryStorage;
    use futures::executor::block_on;

    #[test]
    fn test_volume_clamps() {
        let mut volume = Volume::default();
        assert_eq!(volume.level(), 5);
        assert_eq!(volume.percent(), 50);

        for _ in 0..20 {
            volume.step(VolumeStep::Up);
        }
        assert_eq!(volume.level(), 10);
        assert!(!volume.step(VolumeStep::Up));

        for _ in 0..20 {
            volume.step(VolumeStep::Down);
        }
        assert_eq!(volume.level(), 0);
        assert!(!volume.step(VolumeStep::Down));
        assert_eq!(Volume::new(42).level(), 10);
    }

    #[test]
    fn test_adjust_volume_updates_sink() {
        let mut player = AudioPlayer::new();
        let mut sink = RecordingSink::new();

        player.adjust_volume(&mut sink, VolumeStep::Up).unwrap();
        assert_eq!(sink.volume, Some(60));

        player.adjust_volume(&mut sink, VolumeStep::Down).unwrap();
        assert_eq!(sink.volume, Some(50));
    }

    #[test]
    fn test_track_streams_to_end() {
        let data: Vec<u8> = (0..1300u32).map(|i| i as u8).collect();
        let storage = SharedStorage::new(MemoryStorage::new().with_file("/mp3/a.mp3", &data));
        let mut player = AudioPlayer::new();
        let mut sink = RecordingSink::new();

        block_on(async {
            player.play(&mut *storage.lock().await, "/mp3/a.mp3").unwrap();
            assert_eq!(player.pump(&storage, &mut sink).await, Ok(PlaybackStep::Played(512)));
            assert_eq!(player.pump(&storage, &mut sink).await, Ok(PlaybackStep::Played(512)));
            assert_eq!(player.pump(&storage, &mut sink).await, Ok(PlaybackStep::Played(276)));
            assert_eq!(player.pump(&storage, &mut sink).await, Ok(PlaybackStep::Finished));
            assert_eq!(player.pump(&storage, &mut sink).await, Ok(PlaybackStep::Idle));
        });

        assert_eq!(sink.played, data);
        assert!(!player.is_playing());
    }

    #[test]
    fn test_stop_mid_track() {
        let storage = SharedStorage::new(MemoryStorage::new().with_file("/a.mp3", &[0u8; 2000]));
        let mut player = AudioPlayer::new();
        let mut sink = RecordingSink::new();

        block_on(async {
            player.play(&mut *storage.lock().await, "/a.mp3").unwrap();
            player.pump(&storage, &mut sink).await.unwrap();
        });
        assert!(player.stop(&mut sink));
        assert_eq!(sink.stops, 1);
        assert!(!player.stop(&mut sink));
        assert_eq!(sink.played.len(), 512);
    }

    #[test]
    fn test_missing_track() {
        let mut storage = MemoryStorage::new();
        storage.mkdir("/mp3");
        let mut player = AudioPlayer::new();

        assert_eq!(player.play(&mut storage, "/mp3/none.mp3"), Err(AudioError::NotFound));
        assert_eq!(player.play(&mut storage, "/mp3"), Err(AudioError::NotFound));
        assert!(!player.is_playing());
    }

    #[test]
    fn test_sink_error_ends_track() {
        let storage = SharedStorage::new(MemoryStorage::new().with_file("/a.mp3", &[1u8; 100]));
        let mut player = AudioPlayer::new();
        let mut sink = RecordingSink {
            fail_writes: true,
            ..Default::default()
        };

        block_on(async {
            player.play(&mut *storage.lock().await, "/a.mp3").unwrap();
            assert_eq!(player.pump(&storage, &mut sink).await, Err(AudioError::Sink));
        });
        assert!(!player.is_playing());
    }

    #[test]
    fn test_discard_sink_counts_until_stop() {
        let storage = SharedStorage::new(MemoryStorage::new().with_file("/a.mp3", &[7u8; 700]));
        let mut player = AudioPlayer::new();
        let mut sink = DiscardSink::new();

        block_on(async {
            player.play(&mut *storage.lock().await, "/a.mp3").unwrap();
            player.pump(&storage, &mut sink).await.unwrap();
            player.pump(&storage, &mut sink).await.unwrap();
        });
        assert_eq!(sink.consumed(), 700);
        player.stop(&mut sink);
        assert_eq!(sink.consumed(), 0);
    }
}

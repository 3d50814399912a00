//! Controller-side command execution
//!
//! The controller task owns a [`CommandDispatcher`] and feeds it the
//! commands taken from the command slot and the jobs queued by the BLE
//! task. All storage access happens here or in the capture task, each
//! holding the storage lock only for the duration of one operation.

use alloc::vec;
use alloc::vec::Vec;

use crate::audio::{AudioPlayer, AudioSink, PlaybackStep, VolumeStep};
use crate::config::storage::JSON_DIR;
use crate::dispatcher::{Job, JobQueue};
use crate::ota::{update_from_storage, FirmwareUpdater, OtaOutcome};
use crate::paging::{PagedDocument, PageLayout};
use crate::protocol::PanelMessage;
use crate::session::command::PendingCommand;
use crate::session::file_receive::{FileEvent, FileOutcome, FileReceiveSession};
use crate::session::state::{with_session, DisplayMode, SharedSession};
use crate::storage::{SharedStorage, Storage};

/// What the controller should do after a command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Nothing,
    /// Forward these updates to the panel, in order
    Panel(Vec<PanelMessage>),
    /// A new firmware image is staged; restart into it
    Reboot,
}

/// Executes commands and jobs against storage and the audio sink
pub struct CommandDispatcher<'a, S: Storage> {
    storage: &'a SharedStorage<S>,
    session: &'a SharedSession,
    files: FileReceiveSession<S>,
    player: AudioPlayer,
    layout: PageLayout,
}

impl<'a, S: Storage> CommandDispatcher<'a, S> {
    pub fn new(storage: &'a SharedStorage<S>, session: &'a SharedSession) -> Self {
        Self {
            storage,
            session,
            files: FileReceiveSession::new(),
            player: AudioPlayer::new(),
            layout: PageLayout::default(),
        }
    }

    pub fn with_layout(mut self, layout: PageLayout) -> Self {
        self.layout = layout;
        self
    }

    pub fn player(&self) -> &AudioPlayer {
        &self.player
    }

    /// Run one command taken from the command slot
    pub async fn dispatch<K: AudioSink, U: FirmwareUpdater>(
        &mut self,
        command: PendingCommand,
        sink: &mut K,
        updater: &mut U,
    ) -> Outcome {
        log::info!("controller: {}", command.kind());
        match command {
            PendingCommand::DisplayText { name, page } => self.display(DisplayMode::Text(name), page).await,
            PendingCommand::DisplayJson { name, page } => self.display(DisplayMode::Json(name), page).await,
            PendingCommand::PlayAudio { name } => {
                let mut storage = self.storage.lock().await;
                if let Err(e) = self.player.play(&mut *storage, &name) {
                    log::warn!("controller: cannot play {}: {}", name, e);
                }
                Outcome::Nothing
            }
            PendingCommand::StopAudio => {
                if !self.player.stop(sink) {
                    log::debug!("controller: nothing playing");
                }
                Outcome::Nothing
            }
            PendingCommand::DeleteAll => {
                self.delete_all().await;
                Outcome::Nothing
            }
            PendingCommand::OtaUpdate => {
                self.player.stop(sink);
                let result = {
                    let mut storage = self.storage.lock().await;
                    update_from_storage(&mut *storage, updater)
                };
                match result {
                    Ok(OtaOutcome::Updated { .. }) => Outcome::Reboot,
                    Ok(OtaOutcome::NoImage) | Err(_) => Outcome::Nothing,
                }
            }
        }
    }

    /// Run a command taken from the command slot after every job already
    /// queued. A display request that follows an upload must see the whole
    /// file, since its index is never rebuilt once written.
    pub async fn run_command<K: AudioSink, U: FirmwareUpdater>(
        &mut self,
        jobs: &JobQueue,
        command: PendingCommand,
        sink: &mut K,
        updater: &mut U,
    ) -> Outcome {
        let ran = self.drain_jobs(jobs, sink).await;
        if ran > 0 {
            log::debug!("controller: ran {} queued jobs before {}", ran, command.kind());
        }
        self.dispatch(command, sink, updater).await
    }

    /// Run every job currently queued, returning how many ran
    pub async fn drain_jobs<K: AudioSink>(&mut self, jobs: &JobQueue, sink: &mut K) -> usize {
        let mut ran = 0;
        while let Ok(job) = jobs.try_receive() {
            self.run_job(job, sink).await;
            ran += 1;
        }
        ran
    }

    /// Run one queued job
    pub async fn run_job<K: AudioSink>(&mut self, job: Job, sink: &mut K) {
        match job {
            Job::File(event) => self.file_event(event).await,
            Job::DeleteFile(path) => {
                let mut storage = self.storage.lock().await;
                if storage.is_dir(&path) || !storage.exists(&path) {
                    log::warn!("controller: {} not found, nothing deleted", path);
                } else {
                    match storage.remove(&path) {
                        Ok(()) => log::info!("controller: deleted {}", path),
                        Err(e) => log::error!("controller: delete {} failed: {}", path, e),
                    }
                }
            }
            Job::Volume(step) => self.volume(sink, step),
        }
    }

    /// Stream the next audio block if a track is playing
    pub async fn pump_audio<K: AudioSink>(&mut self, sink: &mut K) -> PlaybackStep {
        match self.player.pump(self.storage, sink).await {
            Ok(step) => step,
            Err(e) => {
                log::error!("audio: playback stopped: {}", e);
                PlaybackStep::Finished
            }
        }
    }

    async fn file_event(&mut self, event: FileEvent) {
        let mut storage = self.storage.lock().await;
        match self.files.apply(&mut *storage, event) {
            Ok(FileOutcome::Closed { path, len }) => log::info!("file: {} stored ({} bytes)", path, len),
            Ok(FileOutcome::Aborted { path }) => log::warn!("file: upload of {} aborted", path),
            Ok(FileOutcome::Ignored) => log::warn!("file: no upload open, event dropped"),
            Ok(FileOutcome::Opened { .. } | FileOutcome::Appended(_)) => {}
            Err(e) => log::error!("file: write failed: {}", e),
        }
    }

    fn volume<K: AudioSink>(&mut self, sink: &mut K, step: VolumeStep) {
        if let Err(e) = self.player.adjust_volume(sink, step) {
            log::warn!("audio: volume change failed: {}", e);
        }
    }

    async fn delete_all(&mut self) -> usize {
        let mut storage = self.storage.lock().await;
        let files = match storage.list(JSON_DIR) {
            Ok(files) => files,
            Err(e) => {
                log::warn!("controller: cannot list {}: {}", JSON_DIR, e);
                return 0;
            }
        };
        let mut removed = 0;
        for path in &files {
            match storage.remove(path) {
                Ok(()) => removed += 1,
                Err(e) => log::warn!("controller: delete {} failed: {}", path, e),
            }
        }
        log::info!("controller: deleted {} of {} files in {}", removed, files.len(), JSON_DIR);
        removed
    }

    /// Render a page and report it to the panel. A page past the end of the
    /// document renders page 0 and resets the session's page counter.
    async fn display(&mut self, mode: DisplayMode, page: u32) -> Outcome {
        let (name, document) = match &mode {
            DisplayMode::Text(name) => (name, PagedDocument::text(name)),
            DisplayMode::Json(name) => (name, PagedDocument::json(name)),
            DisplayMode::None => return Outcome::Nothing,
        };

        let rendered = {
            let mut storage = self.storage.lock().await;
            document.render(&mut *storage, page, self.layout)
        };
        let rendered = match rendered {
            Ok(rendered) => rendered,
            Err(e) => {
                log::warn!("controller: cannot display {}: {}", name, e);
                return Outcome::Nothing;
            }
        };

        if rendered.wrapped(page) {
            with_session(self.session, |s| s.clamp_page(&mode, rendered.last_page));
        }
        log::info!("controller: {} page {}/{}", name, rendered.page + 1, rendered.last_page + 1);

        Outcome::Panel(vec![
            PanelMessage::Name(name.clone()),
            PanelMessage::Content(rendered.content()),
            PanelMessage::progress(rendered.page, rendered.last_page),
            PanelMessage::pages(rendered.page, rendered.last_page),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::mock::RecordingSink;
    use crate::paging::index::total_pages;
    use crate::ota::mock::MockUpdater;
    use crate::session::state::new_shared_session;
    use crate::storage::traits::mock::MemoryStorage;
    use alloc::format;
    use alloc::string::String;
    use futures::executor::block_on;

    fn book(lines: usize) -> String {
        (0..lines).map(|i| format!("line {}\n", i)).collect()
    }

    struct Rig {
        storage: SharedStorage<MemoryStorage>,
        session: SharedSession,
        sink: RecordingSink,
        updater: MockUpdater,
    }

    impl Rig {
        fn new(storage: MemoryStorage) -> Self {
            Self {
                storage: SharedStorage::new(storage),
                session: new_shared_session(),
                sink: RecordingSink::new(),
                updater: MockUpdater::default(),
            }
        }
    }

    #[test]
    fn test_display_reports_to_panel() {
        let mut rig = Rig::new(MemoryStorage::new().with_file("/b.txt", book(14).as_bytes()));
        let mut dispatcher = CommandDispatcher::new(&rig.storage, &rig.session);

        let outcome = block_on(dispatcher.dispatch(
            PendingCommand::DisplayText {
                name: String::from("/b.txt"),
                page: 1,
            },
            &mut rig.sink,
            &mut rig.updater,
        ));

        let Outcome::Panel(messages) = outcome else {
            panic!("expected panel updates");
        };
        assert_eq!(messages[0], PanelMessage::Name(String::from("/b.txt")));
        assert_eq!(
            messages[1],
            PanelMessage::Content(String::from("line 6\nline 7\nline 8\nline 9\nline 10\nline 11"))
        );
        assert_eq!(messages[2], PanelMessage::Progress(66));
        assert_eq!(messages[3], PanelMessage::Pages { page: 2, total: 3 });
    }

    #[test]
    fn test_page_past_end_resets_session_page() {
        let mut rig = Rig::new(MemoryStorage::new().with_file("/b.txt", book(8).as_bytes()));
        let mode = DisplayMode::Text(String::from("/b.txt"));
        with_session(&rig.session, |s| {
            s.open_document(mode.clone());
            s.display.page = 5;
        });
        let mut dispatcher = CommandDispatcher::new(&rig.storage, &rig.session);

        let outcome = block_on(dispatcher.dispatch(
            PendingCommand::DisplayText {
                name: String::from("/b.txt"),
                page: 5,
            },
            &mut rig.sink,
            &mut rig.updater,
        ));

        let Outcome::Panel(messages) = outcome else {
            panic!("expected panel updates");
        };
        assert_eq!(messages[3], PanelMessage::Pages { page: 1, total: 2 });
        assert_eq!(with_session(&rig.session, |s| s.display.page), 0);
    }

    #[test]
    fn test_display_json_document() {
        let json = br#"{"analysis_result": "hello glasses"}"#;
        let mut rig = Rig::new(MemoryStorage::new().with_file("/json/1.json", json));
        let mut dispatcher = CommandDispatcher::new(&rig.storage, &rig.session);

        let outcome = block_on(dispatcher.dispatch(
            PendingCommand::DisplayJson {
                name: String::from("/json/1.json"),
                page: 0,
            },
            &mut rig.sink,
            &mut rig.updater,
        ));
        let Outcome::Panel(messages) = outcome else {
            panic!("expected panel updates");
        };
        assert_eq!(messages[1], PanelMessage::Content(String::from("hello glasses\n\n\n\n\n")));
        assert_eq!(messages[2], PanelMessage::Progress(100));
    }

    #[test]
    fn test_display_missing_document() {
        let mut rig = Rig::new(MemoryStorage::new());
        let mut dispatcher = CommandDispatcher::new(&rig.storage, &rig.session);

        let outcome = block_on(dispatcher.dispatch(
            PendingCommand::DisplayText {
                name: String::from("/none.txt"),
                page: 0,
            },
            &mut rig.sink,
            &mut rig.updater,
        ));
        assert_eq!(outcome, Outcome::Nothing);
    }

    #[test]
    fn test_upload_jobs_store_file() {
        let mut rig = Rig::new(MemoryStorage::new());
        let mut dispatcher = CommandDispatcher::new(&rig.storage, &rig.session);

        block_on(async {
            dispatcher
                .run_job(
                    Job::File(FileEvent::Start {
                        name: String::from("/sdcard/novel/a.txt"),
                        first_chunk: b"abc".to_vec(),
                    }),
                    &mut rig.sink,
                )
                .await;
            dispatcher
                .run_job(Job::File(FileEvent::Update(b"def".to_vec())), &mut rig.sink)
                .await;
            dispatcher.run_job(Job::File(FileEvent::End), &mut rig.sink).await;
        });

        let storage = block_on(rig.storage.lock());
        assert_eq!(storage.contents("/novel/a.txt"), Some(&b"abcdef"[..]));
    }

    #[test]
    fn test_display_after_upload_indexes_whole_file() {
        let mut rig = Rig::new(MemoryStorage::new());
        let mut dispatcher = CommandDispatcher::new(&rig.storage, &rig.session);
        let jobs = JobQueue::new();
        let text = book(14);
        let (head, tail) = text.as_bytes().split_at(20);

        jobs.try_send(Job::File(FileEvent::Start {
            name: String::from("/up.txt"),
            first_chunk: head.to_vec(),
        }))
        .unwrap();
        jobs.try_send(Job::File(FileEvent::Update(tail.to_vec()))).unwrap();
        jobs.try_send(Job::File(FileEvent::End)).unwrap();

        let outcome = block_on(dispatcher.run_command(
            &jobs,
            PendingCommand::DisplayText {
                name: String::from("/up.txt"),
                page: 2,
            },
            &mut rig.sink,
            &mut rig.updater,
        ));

        assert!(jobs.try_receive().is_err());
        let Outcome::Panel(messages) = outcome else {
            panic!("expected panel updates");
        };
        assert_eq!(messages[1], PanelMessage::Content(String::from("line 12\nline 13\n\n\n\n")));
        assert_eq!(messages[3], PanelMessage::Pages { page: 3, total: 3 });

        let mut storage = block_on(rig.storage.lock());
        assert_eq!(storage.contents("/up.txt"), Some(text.as_bytes()));
        assert_eq!(total_pages(&mut *storage, "/up.txt.sy"), Ok(2));
        assert_eq!(storage.open_writers(), 0);
    }

    #[test]
    fn test_drain_jobs_on_empty_queue() {
        let mut rig = Rig::new(MemoryStorage::new());
        let mut dispatcher = CommandDispatcher::new(&rig.storage, &rig.session);
        let jobs = JobQueue::new();
        assert_eq!(block_on(dispatcher.drain_jobs(&jobs, &mut rig.sink)), 0);
    }

    #[test]
    fn test_disconnect_abort_removes_partial_upload() {
        let mut rig = Rig::new(MemoryStorage::new());
        let mut dispatcher = CommandDispatcher::new(&rig.storage, &rig.session);

        block_on(async {
            dispatcher
                .run_job(
                    Job::File(FileEvent::Start {
                        name: String::from("/json/2.json"),
                        first_chunk: b"{".to_vec(),
                    }),
                    &mut rig.sink,
                )
                .await;
            dispatcher.run_job(Job::File(FileEvent::Abort), &mut rig.sink).await;
        });

        let mut storage = block_on(rig.storage.lock());
        assert!(!storage.exists("/json/2.json"));
        assert_eq!(storage.open_writers(), 0);
    }

    #[test]
    fn test_delete_jobs() {
        let storage = MemoryStorage::new()
            .with_file("/json/1.json", b"{}")
            .with_file("/json/1.json.txt", b"x")
            .with_file("/json/1.json.sy", b"")
            .with_file("/novel/keep.txt", b"k");
        let mut rig = Rig::new(storage);
        let mut dispatcher = CommandDispatcher::new(&rig.storage, &rig.session);

        block_on(async {
            dispatcher
                .dispatch(PendingCommand::DeleteAll, &mut rig.sink, &mut rig.updater)
                .await;
            dispatcher
                .run_job(Job::DeleteFile(String::from("/novel/keep.txt")), &mut rig.sink)
                .await;
            dispatcher
                .run_job(Job::DeleteFile(String::from("/novel/none.txt")), &mut rig.sink)
                .await;
        });

        let storage = block_on(rig.storage.lock());
        assert!(storage.paths().is_empty());
    }

    #[test]
    fn test_audio_commands() {
        let mut rig = Rig::new(MemoryStorage::new().with_file("/mp3/a.mp3", &[7u8; 700]));
        let mut dispatcher = CommandDispatcher::new(&rig.storage, &rig.session);

        block_on(async {
            dispatcher
                .dispatch(
                    PendingCommand::PlayAudio {
                        name: String::from("/mp3/a.mp3"),
                    },
                    &mut rig.sink,
                    &mut rig.updater,
                )
                .await;
            assert_eq!(dispatcher.pump_audio(&mut rig.sink).await, PlaybackStep::Played(512));
            dispatcher.run_job(Job::Volume(VolumeStep::Up), &mut rig.sink).await;
            dispatcher
                .dispatch(PendingCommand::StopAudio, &mut rig.sink, &mut rig.updater)
                .await;
            assert_eq!(dispatcher.pump_audio(&mut rig.sink).await, PlaybackStep::Idle);
        });

        assert_eq!(rig.sink.played.len(), 512);
        assert_eq!(rig.sink.volume, Some(60));
        assert_eq!(rig.sink.stops, 1);
    }

    #[test]
    fn test_ota_requests_reboot_only_on_success() {
        let mut rig = Rig::new(MemoryStorage::new());
        let mut dispatcher = CommandDispatcher::new(&rig.storage, &rig.session);
        let outcome = block_on(dispatcher.dispatch(PendingCommand::OtaUpdate, &mut rig.sink, &mut rig.updater));
        assert_eq!(outcome, Outcome::Nothing);

        let mut rig = Rig::new(MemoryStorage::new().with_file("/update.bin", &[1u8; 1024]));
        let mut dispatcher = CommandDispatcher::new(&rig.storage, &rig.session);
        let outcome = block_on(dispatcher.dispatch(PendingCommand::OtaUpdate, &mut rig.sink, &mut rig.updater));
        assert_eq!(outcome, Outcome::Reboot);
        assert_eq!(rig.updater.image.len(), 1024);
    }
}

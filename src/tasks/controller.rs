//! Controller task
//!
//! Owns storage-side work: runs the pending command, drains the job queue
//! and keeps audio flowing while a track plays. Jobs queued before a
//! command always run before it.

use embassy_futures::select::{select3, Either3};
use embassy_time::{Duration, Timer};

use crate::audio::AudioSink;
use crate::config::audio::POLL_MS;
use crate::dispatcher::{CommandDispatcher, Outcome, COMMANDS, JOBS, PANEL, SESSION};
use crate::ota::FirmwareUpdater;
use crate::storage::{SharedStorage, Storage};

/// Delay before restarting into a new image, so the log drains
const REBOOT_DELAY_MS: u64 = 500;

pub async fn controller_task<S, K, U>(storage: &SharedStorage<S>, mut sink: K, mut updater: U)
where
    S: Storage,
    K: AudioSink,
    U: FirmwareUpdater,
{
    let mut dispatcher = CommandDispatcher::new(storage, &SESSION);

    loop {
        let playing = dispatcher.player().is_playing();
        let tick = async {
            if playing {
                Timer::after(Duration::from_millis(POLL_MS)).await
            } else {
                core::future::pending::<()>().await
            }
        };

        match select3(COMMANDS.wait(), JOBS.receive(), tick).await {
            Either3::First(command) => match dispatcher.run_command(&JOBS, command, &mut sink, &mut updater).await {
                Outcome::Nothing => {}
                Outcome::Panel(messages) => {
                    for msg in messages {
                        PANEL.send(msg).await;
                    }
                }
                Outcome::Reboot => {
                    log::info!("controller: rebooting into new firmware");
                    Timer::after(Duration::from_millis(REBOOT_DELAY_MS)).await;
                    esp_hal::system::software_reset();
                }
            },
            Either3::Second(job) => dispatcher.run_job(job, &mut sink).await,
            Either3::Third(()) => {
                dispatcher.pump_audio(&mut sink).await;
            }
        }
    }
}

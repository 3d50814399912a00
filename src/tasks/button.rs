//! Button task
//!
//! GPIO0 is active low with a pull-up. A single click asks for a capture,
//! a double click tells the phone to start an assistant query.

use embassy_futures::select::{select, Either};
use embassy_time::{Duration, Instant, Timer};
use embedded_hal::digital::InputPin;
use embedded_hal_async::digital::Wait;

use crate::config::button::DEBOUNCE_MS;
use crate::dispatcher::{StatusMessage, CAPTURE_REQUEST, NOTIFY, SESSION};
use crate::image::request_capture;
use crate::input::{Click, ClickDetector};

/// Wait for a debounced press, returning its time in milliseconds
async fn next_press<B: Wait + InputPin>(button: &mut B) -> u64 {
    loop {
        if button.wait_for_falling_edge().await.is_err() {
            Timer::after(Duration::from_millis(DEBOUNCE_MS)).await;
            continue;
        }
        Timer::after(Duration::from_millis(DEBOUNCE_MS)).await;
        if button.is_low().unwrap_or(false) {
            return Instant::now().as_millis();
        }
    }
}

fn on_click(click: Click) {
    match click {
        Click::Single => {
            if request_capture(&SESSION, &CAPTURE_REQUEST) {
                log::info!("button: capture requested");
            } else {
                log::warn!("button: capture in progress, click ignored");
            }
        }
        Click::Double => {
            log::info!("button: double click");
            if NOTIFY.try_send(StatusMessage::AiWork).is_err() {
                log::warn!("button: notify queue full");
            }
        }
    }
}

pub async fn button_task<B: Wait + InputPin>(mut button: B) {
    let mut clicks = ClickDetector::new();
    loop {
        let click = match clicks.deadline() {
            Some(deadline) => {
                let expiry = Timer::at(Instant::from_millis(deadline + 1));
                match select(next_press(&mut button), expiry).await {
                    Either::First(at) => clicks.press(at),
                    Either::Second(()) => clicks.expire(Instant::now().as_millis()),
                }
            }
            None => {
                let at = next_press(&mut button).await;
                clicks.press(at)
            }
        };
        if let Some(click) = click {
            on_click(click);
        }
    }
}

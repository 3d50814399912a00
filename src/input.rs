//! Button click detection
//!
//! Presses are classified once the double-click window has passed: a second
//! press inside the window makes a double click, otherwise the first press is
//! reported as a single click.

use crate::config::button::DOUBLE_CLICK_MS;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Click {
    Single,
    Double,
}

/// Click classifier driven by press timestamps in milliseconds
#[derive(Debug, Clone, Default)]
pub struct ClickDetector {
    first_press: Option<u64>,
}

impl ClickDetector {
    pub const fn new() -> Self {
        Self { first_press: None }
    }

    /// Record a press at `now_ms`
    pub fn press(&mut self, now_ms: u64) -> Option<Click> {
        match self.first_press.take() {
            Some(first) if now_ms.saturating_sub(first) <= DOUBLE_CLICK_MS => Some(Click::Double),
            Some(_) => {
                // Window already expired; this press starts a new one
                self.first_press = Some(now_ms);
                Some(Click::Single)
            }
            None => {
                self.first_press = Some(now_ms);
                None
            }
        }
    }

    /// Deadline after which a lone press becomes a single click
    pub fn deadline(&self) -> Option<u64> {
        self.first_press.map(|t| t + DOUBLE_CLICK_MS)
    }

    /// Report a single click once the window has passed
    pub fn expire(&mut self, now_ms: u64) -> Option<Click> {
        match self.first_press {
            Some(first) if now_ms.saturating_sub(first) > DOUBLE_CLICK_MS => {
                self.first_press = None;
                Some(Click::Single)
            }
            _ => None,
        }
    }
}

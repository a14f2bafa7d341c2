// Copyright 2026 Daniel Pelikan
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Triple-press gesture recognition.
//!
//! The wearable reports each button press as one frame. Firmware revisions
//! that aggregate the gesture on-device send a single marker frame instead.

use std::time::{Duration, Instant};
use tracing::debug;

use super::protocol::TRIPLE_PRESS_MARKER;

/// Window within which the required presses must land.
pub const MULTI_PRESS_WINDOW: Duration = Duration::from_millis(2000);

/// Presses required to raise the alarm.
pub const REQUIRED_PRESSES: u32 = 3;

/// Sliding-window press counter.
///
/// Owned by a single session task; no internal locking. Any recognized
/// gesture resets the window, so a burst of presses raises at most one
/// alarm until a fresh window fills again.
pub struct GestureDetector {
    press_count: u32,
    window_start: Option<Instant>,
    window: Duration,
    required: u32,
}

impl GestureDetector {
    /// Create a detector with the standard window and press count.
    pub fn new() -> Self {
        Self::with_window(MULTI_PRESS_WINDOW, REQUIRED_PRESSES)
    }

    /// Create a detector with a custom window and press count.
    pub fn with_window(window: Duration, required: u32) -> Self {
        Self {
            press_count: 0,
            window_start: None,
            window,
            required,
        }
    }

    /// Observe one trimmed, non-empty frame at time `now`.
    ///
    /// Returns `true` when the alarm should fire. A marker frame fires
    /// immediately regardless of window state. A press exactly on the
    /// window boundary still counts toward the current window; only
    /// overrunning it starts a new one.
    pub fn observe(&mut self, frame: &str, now: Instant) -> bool {
        if frame.contains(TRIPLE_PRESS_MARKER) {
            debug!("device-aggregated triple press marker received");
            self.reset();
            return true;
        }

        match self.window_start {
            Some(start) if now.duration_since(start) <= self.window => {}
            _ => {
                self.window_start = Some(now);
                self.press_count = 0;
            }
        }

        self.press_count += 1;
        if self.press_count >= self.required {
            self.reset();
            return true;
        }
        false
    }

    /// Clear the window and press count.
    pub fn reset(&mut self) {
        self.press_count = 0;
        self.window_start = None;
    }

    #[cfg(test)]
    fn count(&self) -> u32 {
        self.press_count
    }
}

impl Default for GestureDetector {
    fn default() -> Self {
        Self::new()
    }
}

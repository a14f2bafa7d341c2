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

//! Event processing for session state transitions.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::link::SessionEvent;
use crate::state::AppState;
use crate::storage::DeviceStore;

/// Mirrors session events into the shared state and the log.
pub struct EventProcessor {
    state: Arc<AppState>,
    store: Arc<DeviceStore>,
}

impl EventProcessor {
    pub fn new(state: Arc<AppState>, store: Arc<DeviceStore>) -> Self {
        Self { state, store }
    }

    /// Process a single event.
    pub fn process_event(&self, event: SessionEvent) {
        match event {
            SessionEvent::Connecting { address } => {
                debug!(%address, "connecting");
                self.state.set_connecting();
            }
            SessionEvent::Streaming { address } => {
                let name = self
                    .store
                    .last_device_name()
                    .unwrap_or_else(|| address.clone());
                info!(%address, "accessory connected: {name}");
                self.state.set_connected(name);
            }
            SessionEvent::Closed { address, failed } => {
                if failed {
                    warn!(%address, "link closed after failure");
                } else {
                    info!(%address, "link closed");
                }
                self.state.set_closed(failed);
            }
        }
    }

    /// Drain events until the channel closes.
    pub async fn run(self, mut events: mpsc::Receiver<SessionEvent>) {
        while let Some(event) = events.recv().await {
            self.process_event(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::ConnectionStatus;
    use tempfile::tempdir;

    #[test]
    fn test_transitions_mirror_into_state() {
        let dir = tempdir().unwrap();
        let store = Arc::new(DeviceStore::open(dir.path()).unwrap());
        store
            .set_last_device("AA:BB:CC:DD:EE:FF", Some("GuardLink Band"))
            .unwrap();
        let state = AppState::new();
        let processor = EventProcessor::new(state.clone(), store);

        processor.process_event(SessionEvent::Connecting {
            address: "AA:BB:CC:DD:EE:FF".into(),
        });
        assert_eq!(state.get_status(), ConnectionStatus::Connecting);

        processor.process_event(SessionEvent::Streaming {
            address: "AA:BB:CC:DD:EE:FF".into(),
        });
        assert_eq!(state.get_status(), ConnectionStatus::Connected);
        assert_eq!(state.get_device_name().as_deref(), Some("GuardLink Band"));

        processor.process_event(SessionEvent::Closed {
            address: "AA:BB:CC:DD:EE:FF".into(),
            failed: true,
        });
        assert_eq!(state.get_status(), ConnectionStatus::Failed);
        assert_eq!(state.get_device_name(), None);
    }
}

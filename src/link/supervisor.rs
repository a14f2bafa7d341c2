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

//! Keeps a link session alive for the persisted accessory.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::session::{LinkContext, LinkSession};

/// Unbounded-retry owner of a session's lifecycle.
///
/// Retries at a fixed delay with no backoff growth and no ceiling: the
/// link guards a panic button, so giving up is worse than polling. The
/// address, adapter power and permission are re-checked before every
/// attempt rather than watched, so external toggles are picked up within
/// one delay.
pub struct ReconnectSupervisor {
    ctx: Arc<LinkContext>,
    stop: CancellationToken,
}

impl ReconnectSupervisor {
    pub fn new(ctx: Arc<LinkContext>) -> Self {
        Self {
            ctx,
            stop: CancellationToken::new(),
        }
    }

    /// Request the loop to stop. The active session, if any, is cancelled
    /// from within `run`.
    pub fn stop(&self) {
        self.stop.cancel();
    }

    /// Run until stopped.
    ///
    /// Never returns an error: connect failures, capability gaps and a
    /// missing device selection all degrade to "not connected" plus a
    /// retry after the fixed delay.
    pub async fn run(&self) {
        let delay = self.ctx.link.reconnect_delay();
        info!("reconnect supervisor started");

        while !self.stop.is_cancelled() {
            let Some(address) = self.ctx.store.last_device_address() else {
                debug!("no accessory selected yet");
                if self.pause(delay).await {
                    break;
                }
                continue;
            };
            if !self.ctx.transport.is_enabled().await {
                debug!("bluetooth adapter disabled, waiting");
                if self.pause(delay).await {
                    break;
                }
                continue;
            }
            if !self.ctx.transport.has_permission().await {
                debug!("bluetooth access not permitted, waiting");
                if self.pause(delay).await {
                    break;
                }
                continue;
            }

            let session = LinkSession::start(self.ctx.clone(), address);
            tokio::select! {
                _ = self.stop.cancelled() => {
                    session.cancel().await;
                    break;
                }
                _ = session.closed() => {}
            }

            if self.pause(delay).await {
                break;
            }
        }

        info!("reconnect supervisor stopped");
    }

    /// Sleep the retry delay; true when stop was requested meanwhile.
    async fn pause(&self, delay: Duration) -> bool {
        tokio::select! {
            _ = self.stop.cancelled() => true,
            _ = tokio::time::sleep(delay) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alarm::AlarmSink;
    use crate::config::LinkConfig;
    use crate::link::mock::ScriptedTransport;
    use crate::link::session::SessionEvent;
    use crate::storage::DeviceStore;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::tempdir;
    use tokio::sync::mpsc;
    use tokio::time::timeout;

    struct NullSink;

    impl AlarmSink for NullSink {
        fn trigger(&self) {}
    }

    struct CountingSink(AtomicUsize);

    impl AlarmSink for CountingSink {
        fn trigger(&self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn fast_link_config() -> LinkConfig {
        LinkConfig {
            reconnect_delay_ms: 10,
            ..LinkConfig::default()
        }
    }

    fn context(
        transport: Arc<ScriptedTransport>,
        store: Arc<DeviceStore>,
    ) -> (Arc<LinkContext>, mpsc::Receiver<SessionEvent>) {
        let (event_tx, event_rx) = mpsc::channel(32);
        let ctx = Arc::new(LinkContext {
            transport,
            store,
            alarm: Arc::new(NullSink),
            events: event_tx,
            link: fast_link_config(),
        });
        (ctx, event_rx)
    }

    fn selected_store() -> (tempfile::TempDir, Arc<DeviceStore>) {
        let dir = tempdir().unwrap();
        let store = Arc::new(DeviceStore::open(dir.path()).unwrap());
        store
            .set_last_device("AA:BB:CC:DD:EE:FF", Some("GuardLink Band"))
            .unwrap();
        (dir, store)
    }

    #[tokio::test]
    async fn retries_indefinitely_while_connects_fail() {
        let (_dir, store) = selected_store();
        let transport = ScriptedTransport::always_failing();
        let (ctx, mut event_rx) = context(transport.clone(), store);
        tokio::spawn(async move { while event_rx.recv().await.is_some() {} });

        let supervisor = Arc::new(ReconnectSupervisor::new(ctx));
        let run = tokio::spawn({
            let supervisor = supervisor.clone();
            async move { supervisor.run().await }
        });

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(transport.connect_attempts() >= 3);

        supervisor.stop();
        timeout(Duration::from_secs(5), run)
            .await
            .expect("supervisor did not stop")
            .unwrap();
    }

    #[tokio::test]
    async fn reaches_streaming_after_transient_failures() {
        let (_dir, store) = selected_store();
        let transport = ScriptedTransport::failing_first(2);
        let (ctx, mut event_rx) = context(transport.clone(), store);

        let supervisor = Arc::new(ReconnectSupervisor::new(ctx));
        let run = tokio::spawn({
            let supervisor = supervisor.clone();
            async move { supervisor.run().await }
        });

        let mut streaming = 0;
        loop {
            match timeout(Duration::from_secs(5), event_rx.recv()).await {
                Ok(Some(SessionEvent::Streaming { .. })) => {
                    streaming += 1;
                    break;
                }
                Ok(Some(_)) => {}
                _ => panic!("never reached streaming"),
            }
        }
        assert_eq!(streaming, 1);
        assert_eq!(transport.connect_attempts(), 3);

        supervisor.stop();
        timeout(Duration::from_secs(5), run)
            .await
            .expect("supervisor did not stop")
            .unwrap();
    }

    #[tokio::test]
    async fn waits_without_connecting_when_nothing_selected() {
        let dir = tempdir().unwrap();
        let store = Arc::new(DeviceStore::open(dir.path()).unwrap());
        let transport = ScriptedTransport::new();
        let (ctx, _event_rx) = context(transport.clone(), store);

        let supervisor = Arc::new(ReconnectSupervisor::new(ctx));
        let run = tokio::spawn({
            let supervisor = supervisor.clone();
            async move { supervisor.run().await }
        });

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(transport.connect_attempts(), 0);

        supervisor.stop();
        run.await.unwrap();
    }

    #[tokio::test]
    async fn waits_while_adapter_is_disabled() {
        let (_dir, store) = selected_store();
        let transport = ScriptedTransport::new();
        transport.set_enabled(false);
        let (ctx, _event_rx) = context(transport.clone(), store);

        let supervisor = Arc::new(ReconnectSupervisor::new(ctx));
        let run = tokio::spawn({
            let supervisor = supervisor.clone();
            async move { supervisor.run().await }
        });

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(transport.connect_attempts(), 0);

        // Re-enabling is picked up by the next poll.
        transport.set_enabled(true);
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(transport.connect_attempts() >= 1);

        supervisor.stop();
        run.await.unwrap();
    }

    #[tokio::test]
    async fn stop_cancels_the_active_session() {
        let (_dir, store) = selected_store();
        let transport = ScriptedTransport::new();
        let alarm = Arc::new(CountingSink(AtomicUsize::new(0)));
        let (event_tx, mut event_rx) = mpsc::channel(32);
        let ctx = Arc::new(LinkContext {
            transport: transport.clone(),
            store: store.clone(),
            alarm: alarm.clone(),
            events: event_tx,
            link: fast_link_config(),
        });

        let supervisor = Arc::new(ReconnectSupervisor::new(ctx));
        let run = tokio::spawn({
            let supervisor = supervisor.clone();
            async move { supervisor.run().await }
        });

        loop {
            match timeout(Duration::from_secs(5), event_rx.recv()).await {
                Ok(Some(SessionEvent::Streaming { .. })) => break,
                Ok(Some(_)) => {}
                _ => panic!("never reached streaming"),
            }
        }

        supervisor.stop();
        timeout(Duration::from_secs(5), run)
            .await
            .expect("supervisor did not stop")
            .unwrap();
        assert!(!store.is_connected());

        // Frames delivered after shutdown must not raise the alarm.
        transport.send_chunk(b"P\nP\nP\n");
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(alarm.0.load(Ordering::SeqCst), 0);
    }
}

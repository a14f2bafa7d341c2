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

//! One connection lifetime against a single accessory address.

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::decoder::FrameDecoder;
use super::gesture::GestureDetector;
use super::protocol::READ_CHUNK_BYTES;
use super::transport::{LinkError, Transport, TransportLink};
use crate::alarm::AlarmSink;
use crate::config::LinkConfig;
use crate::storage::DeviceStore;

/// Connection-state transitions published by a session.
#[derive(Debug)]
pub enum SessionEvent {
    /// Connection attempt started.
    Connecting { address: String },
    /// Transport-level connect succeeded; the read loop is running.
    Streaming { address: String },
    /// The session ended. `failed` is false only for an explicit cancel.
    Closed { address: String, failed: bool },
}

/// Everything a session needs, constructed once and passed down.
pub struct LinkContext {
    pub transport: Arc<dyn Transport>,
    pub store: Arc<DeviceStore>,
    pub alarm: Arc<dyn AlarmSink>,
    pub events: mpsc::Sender<SessionEvent>,
    pub link: LinkConfig,
}

/// Handle to one running session task.
///
/// The task owns the transport link and all per-connection state; the
/// handle only carries the cancel/done tokens, so it is cheap to share
/// and safe to cancel from any task.
pub struct LinkSession {
    cancel: CancellationToken,
    done: CancellationToken,
}

impl LinkSession {
    /// Begin a connection attempt to `address`.
    ///
    /// Returns immediately; progress is reported through the context's
    /// event channel.
    pub fn start(ctx: Arc<LinkContext>, address: String) -> Self {
        let cancel = CancellationToken::new();
        let done = CancellationToken::new();
        tokio::spawn(run_session(ctx, address, cancel.clone(), done.clone()));
        Self { cancel, done }
    }

    /// Resolve once the session has reached `Closed` and released the
    /// transport.
    pub async fn closed(&self) {
        self.done.cancelled().await;
    }

    /// Cancel the session and wait for it to wind down. Idempotent.
    pub async fn cancel(&self) {
        self.cancel.cancel();
        self.done.cancelled().await;
    }
}

async fn run_session(
    ctx: Arc<LinkContext>,
    address: String,
    cancel: CancellationToken,
    done: CancellationToken,
) {
    // Fires on every exit path, including panics in the loop below.
    let _done = done.drop_guard();

    info!(%address, "connecting to accessory");
    emit(&ctx, SessionEvent::Connecting {
        address: address.clone(),
    })
    .await;

    let link = tokio::select! {
        _ = cancel.cancelled() => {
            debug!(%address, "session cancelled while connecting");
            emit(&ctx, SessionEvent::Closed { address, failed: false }).await;
            return;
        }
        result = ctx.transport.connect(&address) => match result {
            Ok(link) => link,
            Err(err) => {
                warn!(%address, "connect failed: {err}");
                emit(&ctx, SessionEvent::Closed { address, failed: true }).await;
                return;
            }
        }
    };

    info!(%address, "link established");
    if let Err(err) = ctx.store.set_connected(true) {
        warn!("failed to persist connected status: {err:#}");
    }
    emit(&ctx, SessionEvent::Streaming {
        address: address.clone(),
    })
    .await;

    let failed = read_loop(&ctx, link, &cancel).await;

    if let Err(err) = ctx.store.set_connected(false) {
        warn!("failed to persist disconnected status: {err:#}");
    }
    emit(&ctx, SessionEvent::Closed { address, failed }).await;
}

/// Pump the link until cancellation or an I/O error.
///
/// Returns the failure flag for the `Closed` transition.
async fn read_loop(
    ctx: &LinkContext,
    mut link: Box<dyn TransportLink>,
    cancel: &CancellationToken,
) -> bool {
    let mut decoder = FrameDecoder::new();
    let mut gesture =
        GestureDetector::with_window(ctx.link.press_window(), ctx.link.required_presses);
    let mut buf = [0u8; READ_CHUNK_BYTES];

    loop {
        let n = tokio::select! {
            _ = cancel.cancelled() => {
                debug!("session cancelled while streaming");
                link.close().await;
                return false;
            }
            result = link.read_chunk(&mut buf) => match result {
                Ok(n) => n,
                Err(LinkError::Closed) => {
                    info!("link closed by remote");
                    link.close().await;
                    return true;
                }
                Err(err) => {
                    warn!("read failed: {err}");
                    link.close().await;
                    return true;
                }
            }
        };

        for frame in decoder.feed(&buf[..n]) {
            if cancel.is_cancelled() {
                link.close().await;
                return false;
            }
            let frame = frame.trim();
            if frame.is_empty() {
                continue;
            }
            debug!(frame, "frame received");
            if gesture.observe(frame, Instant::now()) {
                info!("triple press recognized, raising alarm");
                ctx.alarm.trigger();
            }
        }
    }
}

async fn emit(ctx: &LinkContext, event: SessionEvent) {
    let _ = ctx.events.send(event).await;
}

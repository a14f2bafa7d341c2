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

//! Scripted in-memory transport for exercising sessions without hardware.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use super::transport::{ConnectError, LinkError, Transport, TransportLink};

enum Feed {
    Chunk(Vec<u8>),
    Eof,
}

/// Transport whose connect outcomes and incoming bytes are scripted.
pub struct ScriptedTransport {
    enabled: AtomicBool,
    permitted: AtomicBool,
    hang_connects: AtomicBool,
    attempts: AtomicUsize,
    failures_before_success: usize,
    feed: Mutex<Option<mpsc::UnboundedSender<Feed>>>,
}

impl ScriptedTransport {
    /// Transport that connects on the first attempt.
    pub fn new() -> Arc<Self> {
        Self::failing_first(0)
    }

    /// Transport that refuses the first `failures` connect attempts.
    pub fn failing_first(failures: usize) -> Arc<Self> {
        Arc::new(Self {
            enabled: AtomicBool::new(true),
            permitted: AtomicBool::new(true),
            hang_connects: AtomicBool::new(false),
            attempts: AtomicUsize::new(0),
            failures_before_success: failures,
            feed: Mutex::new(None),
        })
    }

    /// Transport that refuses every connect attempt.
    pub fn always_failing() -> Arc<Self> {
        Self::failing_first(usize::MAX)
    }

    /// Transport whose connect attempts never complete.
    pub fn hanging() -> Arc<Self> {
        let transport = Self::new();
        transport.hang_connects.store(true, Ordering::SeqCst);
        transport
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::SeqCst);
    }

    pub fn set_permitted(&self, permitted: bool) {
        self.permitted.store(permitted, Ordering::SeqCst);
    }

    /// Connect attempts made so far, including refused ones.
    pub fn connect_attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    /// Deliver one chunk to the currently open link, if any.
    ///
    /// Chunks should stay within the session's read buffer size; excess
    /// bytes are dropped.
    pub fn send_chunk(&self, chunk: &[u8]) {
        if let Some(tx) = self.feed.lock().as_ref() {
            let _ = tx.send(Feed::Chunk(chunk.to_vec()));
        }
    }

    /// Close the currently open link from the remote side.
    pub fn close_remote(&self) {
        if let Some(tx) = self.feed.lock().as_ref() {
            let _ = tx.send(Feed::Eof);
        }
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    async fn has_permission(&self) -> bool {
        self.permitted.load(Ordering::SeqCst)
    }

    async fn connect(&self, _address: &str) -> Result<Box<dyn TransportLink>, ConnectError> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst);

        if self.hang_connects.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        if attempt < self.failures_before_success {
            return Err(ConnectError::Unreachable(std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                "scripted refusal",
            )));
        }

        let (tx, rx) = mpsc::unbounded_channel();
        *self.feed.lock() = Some(tx);
        Ok(Box::new(ScriptedLink { rx, closed: false }))
    }
}

struct ScriptedLink {
    rx: mpsc::UnboundedReceiver<Feed>,
    closed: bool,
}

#[async_trait]
impl TransportLink for ScriptedLink {
    async fn read_chunk(&mut self, buf: &mut [u8]) -> Result<usize, LinkError> {
        if self.closed {
            return Err(LinkError::Closed);
        }
        match self.rx.recv().await {
            Some(Feed::Chunk(chunk)) => {
                let n = chunk.len().min(buf.len());
                buf[..n].copy_from_slice(&chunk[..n]);
                Ok(n)
            }
            Some(Feed::Eof) | None => Err(LinkError::Closed),
        }
    }

    async fn close(&mut self) {
        self.closed = true;
        self.rx.close();
    }
}

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

//! Frame decoding for the wearable's delimited text protocol.

use tracing::warn;

use super::protocol::{FRAME_DELIMITER, MAX_PENDING_FRAME_BYTES};

/// Accumulates raw transport chunks and splits them into text frames.
///
/// One decoder belongs to exactly one connection; state does not carry
/// across sessions.
pub struct FrameDecoder {
    buffer: Vec<u8>,
}

impl FrameDecoder {
    /// Create a new frame decoder with an empty buffer.
    pub fn new() -> Self {
        Self {
            buffer: Vec::with_capacity(MAX_PENDING_FRAME_BYTES),
        }
    }

    /// Feed one chunk read from the transport.
    ///
    /// Returns every frame the chunk completed, in arrival order. Frames
    /// are returned untrimmed; the consumer decides what to do with
    /// whitespace and empty lines. If the pending buffer exceeds
    /// [`MAX_PENDING_FRAME_BYTES`] after delimiter extraction, the whole
    /// buffer is flushed as one frame so a delimiter-less peer cannot
    /// stall the stream.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(chunk);

        let mut frames = Vec::new();
        while let Some(idx) = self.buffer.iter().position(|&b| b == FRAME_DELIMITER) {
            let line = self.buffer[..idx].to_vec();
            self.buffer.drain(..=idx);
            frames.push(String::from_utf8_lossy(&line).into_owned());
        }

        if self.buffer.len() > MAX_PENDING_FRAME_BYTES {
            warn!(
                "flushing unterminated frame of {} bytes",
                self.buffer.len()
            );
            frames.push(String::from_utf8_lossy(&self.buffer).into_owned());
            self.buffer.clear();
        }

        frames
    }

    /// Bytes currently buffered without a delimiter.
    pub fn pending_bytes(&self) -> usize {
        self.buffer.len()
    }
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new()
    }
}

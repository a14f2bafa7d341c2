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

//! Wire protocol constants for the wearable's serial link.

use uuid::Uuid;

/// Standard SPP UUID the wearable registers its serial service under.
pub const SPP_UUID: Uuid = Uuid::from_u128(0x00001101_0000_1000_8000_00805F9B34FB);

/// RFCOMM channel the wearable listens on.
pub const DEFAULT_RFCOMM_CHANNEL: u8 = 1;

/// Byte that terminates one frame.
pub const FRAME_DELIMITER: u8 = b'\n';

/// Upper bound on bytes buffered while waiting for a delimiter.
///
/// A peer that never sends a delimiter would otherwise grow the buffer
/// without limit; past this bound the buffer is flushed as one frame.
/// Messages the wearable legitimately sends are far shorter than this.
pub const MAX_PENDING_FRAME_BYTES: usize = 512;

/// Marker frame sent by firmware that aggregates the triple press on-device.
pub const TRIPLE_PRESS_MARKER: &str = "TRIPLE_PRESS_ACTION";

/// Bytes requested from the transport per read.
pub const READ_CHUNK_BYTES: usize = 256;

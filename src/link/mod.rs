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

//! Serial-link management for the wearable accessory.
//!
//! Owns the RFCOMM connection lifecycle: frame decoding, triple-press
//! recognition, one session per connection attempt, and the supervisor
//! that keeps a session alive for the persisted device.

mod bluez;
mod decoder;
mod gesture;
pub mod mock;
mod protocol;
mod session;
mod supervisor;
mod transport;

pub use bluez::{BluezTransport, PairedDevice};
pub use decoder::FrameDecoder;
pub use gesture::{GestureDetector, MULTI_PRESS_WINDOW, REQUIRED_PRESSES};
pub use protocol::{
    DEFAULT_RFCOMM_CHANNEL, FRAME_DELIMITER, MAX_PENDING_FRAME_BYTES, READ_CHUNK_BYTES, SPP_UUID,
    TRIPLE_PRESS_MARKER,
};
pub use session::{LinkContext, LinkSession, SessionEvent};
pub use supervisor::ReconnectSupervisor;
pub use transport::{ConnectError, LinkError, Transport, TransportLink};

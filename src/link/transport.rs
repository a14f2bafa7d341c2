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

//! Transport abstraction over the serial link.
//!
//! The session and supervisor are written against these traits; the BlueZ
//! implementation lives in [`super::bluez`] and tests use
//! [`super::mock`].

use async_trait::async_trait;
use thiserror::Error;

/// Failure to establish a connection.
#[derive(Debug, Error)]
pub enum ConnectError {
    #[error("bluetooth adapter unavailable: {0}")]
    AdapterUnavailable(String),

    #[error("not permitted to open bluetooth links: {0}")]
    PermissionDenied(String),

    #[error("invalid device address {0:?}")]
    InvalidAddress(String),

    #[error("link already open elsewhere")]
    Busy(#[source] std::io::Error),

    #[error("remote device unreachable")]
    Unreachable(#[source] std::io::Error),
}

/// Failure on an established link.
#[derive(Debug, Error)]
pub enum LinkError {
    #[error("remote closed the link")]
    Closed,

    #[error("read failed")]
    Read(#[source] std::io::Error),
}

/// Factory for connections to a remote accessory, plus capability checks
/// the supervisor polls before each attempt.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Whether the underlying radio is powered and usable.
    async fn is_enabled(&self) -> bool;

    /// Whether this process may open links at all.
    async fn has_permission(&self) -> bool;

    /// Open a link to `address`. Blocks until connected or failed.
    async fn connect(&self, address: &str) -> Result<Box<dyn TransportLink>, ConnectError>;
}

/// One open serial link.
#[async_trait]
pub trait TransportLink: Send {
    /// Read the next chunk into `buf`, returning the byte count.
    ///
    /// Returns [`LinkError::Closed`] on end of stream, and must unblock
    /// with an error once the link is closed from another task.
    async fn read_chunk(&mut self, buf: &mut [u8]) -> Result<usize, LinkError>;

    /// Close the link. Idempotent.
    async fn close(&mut self);
}

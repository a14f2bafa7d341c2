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

//! BlueZ-backed RFCOMM transport.

use anyhow::Result;
use async_trait::async_trait;
use bluer::rfcomm::{SocketAddr, Stream};
use bluer::Address;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::{debug, info};

use super::protocol::SPP_UUID;
use super::transport::{ConnectError, LinkError, Transport, TransportLink};

/// Transport that opens RFCOMM client sockets through the BlueZ daemon.
pub struct BluezTransport {
    session: bluer::Session,
    channel: u8,
}

impl BluezTransport {
    /// Connect to the BlueZ daemon.
    pub async fn new(channel: u8) -> Result<Self> {
        let session = bluer::Session::new().await?;
        info!("BlueZ session created");
        Ok(Self { session, channel })
    }

    /// Paired devices known to the default adapter, for the selection flow.
    pub async fn paired_devices(&self) -> Result<Vec<PairedDevice>> {
        let adapter = self.session.default_adapter().await?;
        let mut devices = Vec::new();

        for addr in adapter.device_addresses().await? {
            let device = adapter.device(addr)?;
            if device.is_paired().await? {
                let name = device.alias().await.unwrap_or_else(|_| addr.to_string());
                devices.push(PairedDevice {
                    address: addr.to_string(),
                    name,
                });
            }
        }

        Ok(devices)
    }
}

#[async_trait]
impl Transport for BluezTransport {
    async fn is_enabled(&self) -> bool {
        match self.session.default_adapter().await {
            Ok(adapter) => adapter.is_powered().await.unwrap_or(false),
            Err(_) => false,
        }
    }

    async fn has_permission(&self) -> bool {
        // BlueZ authorizes over D-Bus; being able to enumerate adapters is
        // the closest check for "this process may use bluetooth".
        self.session
            .adapter_names()
            .await
            .map(|names| !names.is_empty())
            .unwrap_or(false)
    }

    async fn connect(&self, address: &str) -> Result<Box<dyn TransportLink>, ConnectError> {
        let target: Address = address
            .parse()
            .map_err(|_| ConnectError::InvalidAddress(address.to_string()))?;

        let adapter = self
            .session
            .default_adapter()
            .await
            .map_err(|err| ConnectError::AdapterUnavailable(err.to_string()))?;
        let powered = adapter
            .is_powered()
            .await
            .map_err(|err| ConnectError::AdapterUnavailable(err.to_string()))?;
        if !powered {
            return Err(ConnectError::AdapterUnavailable(
                "adapter is powered off".into(),
            ));
        }

        debug!(
            %target,
            channel = self.channel,
            service = %SPP_UUID,
            "opening rfcomm stream"
        );
        let stream = Stream::connect(SocketAddr::new(target, self.channel))
            .await
            .map_err(|err| match err.kind() {
                std::io::ErrorKind::AddrInUse | std::io::ErrorKind::AlreadyExists => {
                    ConnectError::Busy(err)
                }
                _ => ConnectError::Unreachable(err),
            })?;

        Ok(Box::new(BluezLink {
            stream,
            closed: false,
        }))
    }
}

struct BluezLink {
    stream: Stream,
    closed: bool,
}

#[async_trait]
impl TransportLink for BluezLink {
    async fn read_chunk(&mut self, buf: &mut [u8]) -> Result<usize, LinkError> {
        if self.closed {
            return Err(LinkError::Closed);
        }
        match self.stream.read(buf).await {
            Ok(0) => Err(LinkError::Closed),
            Ok(n) => Ok(n),
            Err(err) => Err(LinkError::Read(err)),
        }
    }

    async fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            let _ = self.stream.shutdown().await;
        }
    }
}

/// A paired Bluetooth device.
#[derive(Debug, Clone)]
pub struct PairedDevice {
    pub address: String,
    pub name: String,
}

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

//! Alarm sink and actuator fan-out.
//!
//! The link layer only knows how to say "alarm now"; what that means is
//! decided here by the configured actuators.

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::{debug, error, info};

/// Receiver of the "trigger alarm now" signal.
///
/// `trigger` must return immediately; implementations coalesce rapid
/// repeats so near-simultaneous gestures act once.
pub trait AlarmSink: Send + Sync {
    fn trigger(&self);
}

/// One way of making noise once the alarm is raised.
#[async_trait]
pub trait AlarmActuator: Send + Sync {
    fn name(&self) -> &'static str;
    async fn activate(&self) -> Result<()>;
}

/// Writes the alarm to the log. Always configured, so a trigger is never
/// silent even with nothing else set up.
pub struct LogActuator;

#[async_trait]
impl AlarmActuator for LogActuator {
    fn name(&self) -> &'static str {
        "log"
    }

    async fn activate(&self) -> Result<()> {
        error!("ALARM: panic gesture received from accessory");
        Ok(())
    }
}

/// Runs a user-configured shell command, e.g. a desktop notification or
/// siren script.
pub struct CommandActuator {
    command: String,
}

impl CommandActuator {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }
}

#[async_trait]
impl AlarmActuator for CommandActuator {
    fn name(&self) -> &'static str {
        "command"
    }

    async fn activate(&self) -> Result<()> {
        info!("running alarm command: {}", self.command);
        let status = tokio::process::Command::new("sh")
            .arg("-c")
            .arg(&self.command)
            .status()
            .await?;
        if !status.success() {
            anyhow::bail!("alarm command exited with {status}");
        }
        Ok(())
    }
}

/// Fans triggers out to the actuators on a background task.
///
/// The capacity-1 channel absorbs triggers arriving while an activation
/// is in flight, and the cooldown drops bursts after it, so the sink is
/// idempotent under rapid repeated calls.
pub struct AlarmDispatcher {
    tx: mpsc::Sender<()>,
}

impl AlarmDispatcher {
    pub fn spawn(actuators: Vec<Box<dyn AlarmActuator>>, cooldown: Duration) -> Arc<Self> {
        let (tx, mut rx) = mpsc::channel(1);

        tokio::spawn(async move {
            let mut last_fired: Option<Instant> = None;
            while rx.recv().await.is_some() {
                let now = Instant::now();
                if let Some(last) = last_fired {
                    if now.duration_since(last) < cooldown {
                        debug!("alarm trigger within cooldown, coalesced");
                        continue;
                    }
                }
                last_fired = Some(now);

                for actuator in &actuators {
                    if let Err(err) = actuator.activate().await {
                        error!("alarm actuator {} failed: {err:#}", actuator.name());
                    }
                }
            }
        });

        Arc::new(Self { tx })
    }
}

impl AlarmSink for AlarmDispatcher {
    fn trigger(&self) {
        if self.tx.try_send(()).is_err() {
            debug!("alarm already in flight, trigger coalesced");
        }
    }
}

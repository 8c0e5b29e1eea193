use std::io;
use std::net::{SocketAddr, UdpSocket};
use std::sync::Arc;
use std::sync::mpsc::{self, Sender};
use std::thread::{self, JoinHandle};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{TriggerEffect, TriggerMode, TriggerPair, TriggerProfile, TriggerSide};

/// The adaptive-trigger controller.
///
/// Calls come from the host's frame path, so implementations must return
/// quickly and never block on I/O.
pub trait TriggerDevice: Send + Sync {
    fn set_left_trigger(&self, profile: TriggerProfile, params: &[u8]);
    fn set_right_trigger(&self, profile: TriggerProfile, params: &[u8]);
    fn set_left_custom_trigger(&self, mode: TriggerMode, bytes: &[u8]);
    fn set_right_custom_trigger(&self, mode: TriggerMode, bytes: &[u8]);
}

impl<T: TriggerDevice + ?Sized> TriggerDevice for Arc<T> {
    fn set_left_trigger(&self, profile: TriggerProfile, params: &[u8]) {
        (**self).set_left_trigger(profile, params)
    }

    fn set_right_trigger(&self, profile: TriggerProfile, params: &[u8]) {
        (**self).set_right_trigger(profile, params)
    }

    fn set_left_custom_trigger(&self, mode: TriggerMode, bytes: &[u8]) {
        (**self).set_left_custom_trigger(mode, bytes)
    }

    fn set_right_custom_trigger(&self, mode: TriggerMode, bytes: &[u8]) {
        (**self).set_right_custom_trigger(mode, bytes)
    }
}

/// Send both halves of a pair, left first.
pub fn apply_pair(device: &dyn TriggerDevice, pair: &TriggerPair) {
    match &pair.left {
        TriggerEffect::Preset { profile, params } => device.set_left_trigger(*profile, params),
        TriggerEffect::Custom { mode, bytes } => device.set_left_custom_trigger(*mode, bytes),
    }
    match &pair.right {
        TriggerEffect::Preset { profile, params } => device.set_right_trigger(*profile, params),
        TriggerEffect::Custom { mode, bytes } => device.set_right_custom_trigger(*mode, bytes),
    }
}

/// One device call, as queued and as sent over the wire
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum TriggerCommand {
    Preset {
        side: TriggerSide,
        profile: TriggerProfile,
        params: Vec<u8>,
    },
    Custom {
        side: TriggerSide,
        mode: TriggerMode,
        bytes: Vec<u8>,
    },
}

/// Destination for queued commands, driven from the worker thread.
pub trait CommandSink: Send {
    fn send(&mut self, command: &TriggerCommand) -> io::Result<()>;
}

/// JSON datagrams to the helper service on the local machine
pub struct UdpSink {
    socket: UdpSocket,
    target: SocketAddr,
}

impl UdpSink {
    pub fn connect(port: u16) -> io::Result<Self> {
        let socket = UdpSocket::bind(("127.0.0.1", 0))?;
        Ok(Self {
            socket,
            target: SocketAddr::from(([127, 0, 0, 1], port)),
        })
    }
}

impl CommandSink for UdpSink {
    fn send(&mut self, command: &TriggerCommand) -> io::Result<()> {
        let payload = serde_json::to_vec(command)?;
        self.socket.send_to(&payload, self.target)?;
        Ok(())
    }
}

/// Non-blocking device: calls are queued and delivered by a worker thread.
pub struct QueuedDevice {
    tx: Sender<TriggerCommand>,
}

impl QueuedDevice {
    pub fn spawn<S: CommandSink + 'static>(mut sink: S) -> io::Result<(Self, JoinHandle<()>)> {
        let (tx, rx) = mpsc::channel::<TriggerCommand>();
        let handle = thread::Builder::new()
            .name("trigger-device".to_string())
            .spawn(move || {
                for command in rx {
                    if let Err(e) = sink.send(&command) {
                        warn!("Failed to deliver trigger command {:?}: {}", command, e);
                    }
                }
                debug!("Trigger device queue closed");
            })?;
        Ok((Self { tx }, handle))
    }

    fn push(&self, command: TriggerCommand) {
        if self.tx.send(command).is_err() {
            debug!("Trigger device worker is gone, dropping command");
        }
    }
}

impl TriggerDevice for QueuedDevice {
    fn set_left_trigger(&self, profile: TriggerProfile, params: &[u8]) {
        self.push(TriggerCommand::Preset {
            side: TriggerSide::Left,
            profile,
            params: params.to_vec(),
        });
    }

    fn set_right_trigger(&self, profile: TriggerProfile, params: &[u8]) {
        self.push(TriggerCommand::Preset {
            side: TriggerSide::Right,
            profile,
            params: params.to_vec(),
        });
    }

    fn set_left_custom_trigger(&self, mode: TriggerMode, bytes: &[u8]) {
        self.push(TriggerCommand::Custom {
            side: TriggerSide::Left,
            mode,
            bytes: bytes.to_vec(),
        });
    }

    fn set_right_custom_trigger(&self, mode: TriggerMode, bytes: &[u8]) {
        self.push(TriggerCommand::Custom {
            side: TriggerSide::Right,
            mode,
            bytes: bytes.to_vec(),
        });
    }
}

/// Records every call, for tests
#[cfg(test)]
#[derive(Debug, Default)]
pub struct RecordingDevice {
    commands: std::sync::Mutex<Vec<TriggerCommand>>,
}

#[cfg(test)]
impl RecordingDevice {
    pub fn commands(&self) -> Vec<TriggerCommand> {
        self.commands.lock().unwrap().clone()
    }

    pub fn take(&self) -> Vec<TriggerCommand> {
        std::mem::take(&mut *self.commands.lock().unwrap())
    }

    pub fn pair_commands(pair: &TriggerPair) -> Vec<TriggerCommand> {
        let device = RecordingDevice::default();
        apply_pair(&device, pair);
        device.take()
    }
}

#[cfg(test)]
impl TriggerDevice for RecordingDevice {
    fn set_left_trigger(&self, profile: TriggerProfile, params: &[u8]) {
        self.commands.lock().unwrap().push(TriggerCommand::Preset {
            side: TriggerSide::Left,
            profile,
            params: params.to_vec(),
        });
    }

    fn set_right_trigger(&self, profile: TriggerProfile, params: &[u8]) {
        self.commands.lock().unwrap().push(TriggerCommand::Preset {
            side: TriggerSide::Right,
            profile,
            params: params.to_vec(),
        });
    }

    fn set_left_custom_trigger(&self, mode: TriggerMode, bytes: &[u8]) {
        self.commands.lock().unwrap().push(TriggerCommand::Custom {
            side: TriggerSide::Left,
            mode,
            bytes: bytes.to_vec(),
        });
    }

    fn set_right_custom_trigger(&self, mode: TriggerMode, bytes: &[u8]) {
        self.commands.lock().unwrap().push(TriggerCommand::Custom {
            side: TriggerSide::Right,
            mode,
            bytes: bytes.to_vec(),
        });
    }
}

//! MIDI drivers and device handles
//!
//! A [`MidiDriver`] enumerates devices and hands out owned subscriptions:
//! an [`InputSubscription`] that feeds a module's [`InputQueue`] until it is
//! dropped, and an [`OutputPort`] that sends to one device.

pub mod loopback;
pub mod midir_driver;

use std::fmt;
use std::sync::Arc;
use thiserror::Error;

use crate::midi::{InputQueue, Message};

pub use loopback::LoopbackDriver;
pub use midir_driver::MidirDriver;

/// Names accepted by [`open_driver`], in menu order
pub const DRIVER_NAMES: [&str; 2] = [MidirDriver::NAME, LoopbackDriver::NAME];

/// Device direction, for error messages and listings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortDirection {
    Input,
    Output,
}

impl fmt::Display for PortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PortDirection::Input => write!(f, "input"),
            PortDirection::Output => write!(f, "output"),
        }
    }
}

/// Transport failures. None of these reach the audio thread.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("no MIDI driver selected")]
    NoDriver,

    #[error("unknown MIDI driver '{0}'")]
    UnknownDriver(String),

    #[error("{direction} device {id} not found")]
    DeviceNotFound { direction: PortDirection, id: usize },

    #[error("failed to open {direction} device {id}: {reason}")]
    Connect {
        direction: PortDirection,
        id: usize,
        reason: String,
    },

    #[error("failed to send MIDI message: {0}")]
    Send(String),

    #[error("MIDI backend unavailable: {0}")]
    Backend(String),
}

/// A device as listed by a driver
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    pub id: usize,
    pub name: String,
}

/// Outgoing half of a subscribed device
pub trait OutputPort: Send {
    /// Device name
    fn name(&self) -> &str;

    /// Send one message immediately
    fn send(&mut self, message: &Message) -> Result<(), TransportError>;
}

/// Incoming half of a subscribed device.
///
/// Messages flow into the bound queue until this value is dropped.
pub struct InputSubscription {
    id: usize,
    name: String,
    _connection: Box<dyn Send>,
}

impl InputSubscription {
    pub fn new(id: usize, name: impl Into<String>, connection: Box<dyn Send>) -> Self {
        Self {
            id,
            name: name.into(),
            _connection: connection,
        }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Debug for InputSubscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InputSubscription")
            .field("id", &self.id)
            .field("name", &self.name)
            .finish()
    }
}

/// Driver trait - every MIDI backend implements this
///
/// Device ids are only meaningful for the driver that listed them.
pub trait MidiDriver: Send + Sync {
    /// Driver name as shown in the menu
    fn name(&self) -> &str;

    /// List input devices
    fn input_devices(&self) -> Vec<DeviceInfo>;

    /// List output devices
    fn output_devices(&self) -> Vec<DeviceInfo>;

    /// Start feeding `queue` from input device `id`
    fn subscribe_input(
        &self,
        id: usize,
        queue: Arc<InputQueue>,
    ) -> Result<InputSubscription, TransportError>;

    /// Open output device `id`
    fn subscribe_output(&self, id: usize) -> Result<Box<dyn OutputPort>, TransportError>;

    /// Find an input device by case-insensitive substring match
    fn find_input(&self, pattern: &str) -> Option<DeviceInfo> {
        find_device(self.input_devices(), pattern)
    }

    /// Find an output device by case-insensitive substring match
    fn find_output(&self, pattern: &str) -> Option<DeviceInfo> {
        find_device(self.output_devices(), pattern)
    }
}

fn find_device(devices: Vec<DeviceInfo>, pattern: &str) -> Option<DeviceInfo> {
    let pattern = pattern.to_lowercase();
    devices
        .into_iter()
        .find(|device| device.name.to_lowercase().contains(&pattern))
}

/// Open a driver by name (case-insensitive)
pub fn open_driver(name: &str) -> Result<Arc<dyn MidiDriver>, TransportError> {
    match name.to_lowercase().as_str() {
        MidirDriver::NAME => Ok(Arc::new(MidirDriver::new())),
        LoopbackDriver::NAME => Ok(Arc::new(LoopbackDriver::new())),
        _ => Err(TransportError::UnknownDriver(name.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_known_drivers() {
        assert_eq!(open_driver("loopback").unwrap().name(), "loopback");
        assert_eq!(open_driver("MIDIR").unwrap().name(), "midir");
    }

    #[test]
    fn test_open_unknown_driver() {
        assert!(matches!(
            open_driver("gamepad"),
            Err(TransportError::UnknownDriver(name)) if name == "gamepad"
        ));
    }

    #[test]
    fn test_find_device_substring() {
        let devices = vec![
            DeviceInfo { id: 0, name: "Midi Through".to_string() },
            DeviceInfo { id: 1, name: "MIDI Mix:MIDI Mix MIDI 1".to_string() },
        ];
        assert_eq!(find_device(devices.clone(), "midi mix").map(|d| d.id), Some(1));
        assert_eq!(find_device(devices, "launchpad"), None);
    }
}

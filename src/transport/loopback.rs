//! In-process loopback driver
//!
//! Offers one input and one output device. Bytes passed to
//! [`LoopbackDriver::inject`] land in whichever queue is currently
//! subscribed; messages sent to the output are recorded.

use parking_lot::Mutex;
use std::sync::Arc;
use tracing::debug;

use super::{DeviceInfo, InputSubscription, MidiDriver, OutputPort, PortDirection, TransportError};
use crate::midi::{InputQueue, Message};

const INPUT_NAME: &str = "Loopback In";
const OUTPUT_NAME: &str = "Loopback Out";

#[derive(Debug, Default)]
struct Shared {
    queue: Mutex<Option<Arc<InputQueue>>>,
    sent: Mutex<Vec<Message>>,
}

/// Loopback driver; clones share the same devices
#[derive(Debug, Clone, Default)]
pub struct LoopbackDriver {
    shared: Arc<Shared>,
}

impl LoopbackDriver {
    pub const NAME: &'static str = "loopback";

    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver raw bytes as if the input device had produced them.
    ///
    /// Returns false when no input is subscribed or the message was rejected.
    pub fn inject(&self, data: &[u8]) -> bool {
        match self.shared.queue.lock().as_ref() {
            Some(queue) => queue.push_raw(data),
            None => false,
        }
    }

    /// Whether an input subscription is currently open
    pub fn input_subscribed(&self) -> bool {
        self.shared.queue.lock().is_some()
    }

    /// Messages sent to the output so far
    pub fn sent(&self) -> Vec<Message> {
        self.shared.sent.lock().clone()
    }

    /// Take and clear the sent messages
    pub fn take_sent(&self) -> Vec<Message> {
        std::mem::take(&mut *self.shared.sent.lock())
    }
}

/// Keeps the loopback input bound; unbinds on drop
struct LoopbackInput {
    shared: Arc<Shared>,
}

impl Drop for LoopbackInput {
    fn drop(&mut self) {
        self.shared.queue.lock().take();
    }
}

struct LoopbackOutput {
    shared: Arc<Shared>,
}

impl OutputPort for LoopbackOutput {
    fn name(&self) -> &str {
        OUTPUT_NAME
    }

    fn send(&mut self, message: &Message) -> Result<(), TransportError> {
        debug!("Loopback out: {}", message);
        self.shared.sent.lock().push(*message);
        Ok(())
    }
}

impl MidiDriver for LoopbackDriver {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn input_devices(&self) -> Vec<DeviceInfo> {
        vec![DeviceInfo {
            id: 0,
            name: INPUT_NAME.to_string(),
        }]
    }

    fn output_devices(&self) -> Vec<DeviceInfo> {
        vec![DeviceInfo {
            id: 0,
            name: OUTPUT_NAME.to_string(),
        }]
    }

    fn subscribe_input(
        &self,
        id: usize,
        queue: Arc<InputQueue>,
    ) -> Result<InputSubscription, TransportError> {
        if id != 0 {
            return Err(TransportError::DeviceNotFound {
                direction: PortDirection::Input,
                id,
            });
        }
        *self.shared.queue.lock() = Some(queue);
        let guard = LoopbackInput {
            shared: Arc::clone(&self.shared),
        };
        Ok(InputSubscription::new(id, INPUT_NAME, Box::new(guard)))
    }

    fn subscribe_output(&self, id: usize) -> Result<Box<dyn OutputPort>, TransportError> {
        if id != 0 {
            return Err(TransportError::DeviceNotFound {
                direction: PortDirection::Output,
                id,
            });
        }
        Ok(Box::new(LoopbackOutput {
            shared: Arc::clone(&self.shared),
        }))
    }
}

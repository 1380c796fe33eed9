//! Driver and device selection for one module
//!
//! Subscriptions are owned here. Releasing one drops it before anything new
//! is acquired, so no handle outlives its selection.

use std::sync::Arc;
use tracing::{info, trace, warn};

use crate::midi::{InputQueue, Message};
use crate::transport::{InputSubscription, MidiDriver, OutputPort, TransportError};

/// Currently selected driver, input and output
#[derive(Default)]
pub struct DeviceBinding {
    driver: Option<Arc<dyn MidiDriver>>,
    input: Option<InputSubscription>,
    output: Option<BoundOutput>,
}

struct BoundOutput {
    id: usize,
    port: Box<dyn OutputPort>,
}

impl DeviceBinding {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn driver(&self) -> Option<&Arc<dyn MidiDriver>> {
        self.driver.as_ref()
    }

    pub fn driver_name(&self) -> Option<&str> {
        self.driver.as_deref().map(|d| d.name())
    }

    /// Switch driver; both subscriptions of the previous driver are released
    pub fn set_driver(&mut self, driver: Arc<dyn MidiDriver>) {
        self.release_all();
        info!("Selected MIDI driver: {}", driver.name());
        self.driver = Some(driver);
    }

    pub fn input_id(&self) -> Option<usize> {
        self.input.as_ref().map(|s| s.id())
    }

    pub fn output_id(&self) -> Option<usize> {
        self.output.as_ref().map(|o| o.id)
    }

    pub fn input_name(&self) -> Option<&str> {
        self.input.as_ref().map(|s| s.name())
    }

    pub fn output_name(&self) -> Option<&str> {
        self.output.as_ref().map(|o| o.port.name())
    }

    /// Whether input device `id` is the bound one (id 0 included)
    pub fn is_input_selected(&self, id: usize) -> bool {
        self.input_id() == Some(id)
    }

    /// Whether output device `id` is the bound one (id 0 included)
    pub fn is_output_selected(&self, id: usize) -> bool {
        self.output_id() == Some(id)
    }

    /// Bind input device `id` to `queue`.
    ///
    /// The previous input is released first; on failure the input stays unbound.
    pub fn subscribe_input(
        &mut self,
        id: usize,
        queue: Arc<InputQueue>,
    ) -> Result<(), TransportError> {
        let driver = self.driver.clone().ok_or(TransportError::NoDriver)?;
        self.release_input();
        self.input = Some(driver.subscribe_input(id, queue)?);
        Ok(())
    }

    /// Bind output device `id`.
    ///
    /// The previous output is released first; on failure the output stays unbound.
    pub fn subscribe_output(&mut self, id: usize) -> Result<(), TransportError> {
        let driver = self.driver.clone().ok_or(TransportError::NoDriver)?;
        self.release_output();
        let port = driver.subscribe_output(id)?;
        self.output = Some(BoundOutput { id, port });
        Ok(())
    }

    pub fn release_input(&mut self) {
        if let Some(subscription) = self.input.take() {
            info!("Released MIDI input {}: {}", subscription.id(), subscription.name());
        }
    }

    pub fn release_output(&mut self) {
        if let Some(output) = self.output.take() {
            info!("Released MIDI output {}: {}", output.id, output.port.name());
        }
    }

    pub fn release_all(&mut self) {
        self.release_input();
        self.release_output();
    }

    pub fn has_output(&self) -> bool {
        self.output.is_some()
    }

    /// Send to the bound output.
    ///
    /// Returns false when nothing is bound. Send failures are logged and
    /// swallowed: a stuck device only loses feedback.
    pub fn send(&mut self, message: &Message) -> bool {
        let Some(output) = self.output.as_mut() else {
            return false;
        };
        match output.port.send(message) {
            Ok(()) => {
                trace!("Sent: {}", message);
                true
            }
            Err(e) => {
                warn!("MIDI output {}: {}", output.port.name(), e);
                false
            }
        }
    }
}

impl std::fmt::Debug for DeviceBinding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceBinding")
            .field("driver", &self.driver_name())
            .field("input", &self.input_id())
            .field("output", &self.output_id())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::LoopbackDriver;

    #[test]
    fn test_subscribe_without_driver() {
        let mut binding = DeviceBinding::new();
        assert!(matches!(
            binding.subscribe_output(0),
            Err(TransportError::NoDriver)
        ));
        assert!(!binding.send(&Message::led(1, true, 0)));
    }

    #[test]
    fn test_device_zero_counts_as_selected() {
        let mut binding = DeviceBinding::new();
        binding.set_driver(Arc::new(LoopbackDriver::new()));

        assert!(!binding.is_output_selected(0));
        binding.subscribe_output(0).unwrap();
        assert!(binding.is_output_selected(0));
        assert!(!binding.is_output_selected(1));
    }

    #[test]
    fn test_failed_subscription_leaves_binding_empty() {
        let mut binding = DeviceBinding::new();
        binding.set_driver(Arc::new(LoopbackDriver::new()));
        binding.subscribe_output(0).unwrap();

        assert!(binding.subscribe_output(5).is_err());
        assert_eq!(binding.output_id(), None);
        assert!(!binding.send(&Message::led(1, true, 0)));
    }

    #[test]
    fn test_driver_change_releases_input() {
        let loopback = LoopbackDriver::new();
        let mut binding = DeviceBinding::new();
        binding.set_driver(Arc::new(loopback.clone()));
        binding
            .subscribe_input(0, Arc::new(InputQueue::default()))
            .unwrap();
        assert!(loopback.input_subscribed());

        binding.set_driver(Arc::new(LoopbackDriver::new()));
        assert!(!loopback.input_subscribed());
        assert_eq!(binding.input_id(), None);
    }
}

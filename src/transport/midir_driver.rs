//! System MIDI driver backed by midir

use midir::{MidiInput, MidiOutput, MidiOutputConnection};
use std::sync::Arc;
use tracing::{debug, info};

use super::{DeviceInfo, InputSubscription, MidiDriver, OutputPort, PortDirection, TransportError};
use crate::midi::{format_hex, InputQueue, Message};

const CLIENT_NAME: &str = "MidiMix-Seq";

/// Driver for the operating system's MIDI ports
#[derive(Debug, Default)]
pub struct MidirDriver;

impl MidirDriver {
    pub const NAME: &'static str = "midir";

    pub fn new() -> Self {
        Self
    }
}

impl MidiDriver for MidirDriver {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn input_devices(&self) -> Vec<DeviceInfo> {
        let Ok(midi_in) = MidiInput::new(CLIENT_NAME) else {
            return Vec::new();
        };

        midi_in
            .ports()
            .iter()
            .enumerate()
            .filter_map(|(id, port)| {
                midi_in
                    .port_name(port)
                    .ok()
                    .map(|name| DeviceInfo { id, name })
            })
            .collect()
    }

    fn output_devices(&self) -> Vec<DeviceInfo> {
        let Ok(midi_out) = MidiOutput::new(CLIENT_NAME) else {
            return Vec::new();
        };

        midi_out
            .ports()
            .iter()
            .enumerate()
            .filter_map(|(id, port)| {
                midi_out
                    .port_name(port)
                    .ok()
                    .map(|name| DeviceInfo { id, name })
            })
            .collect()
    }

    fn subscribe_input(
        &self,
        id: usize,
        queue: Arc<InputQueue>,
    ) -> Result<InputSubscription, TransportError> {
        let midi_in =
            MidiInput::new(CLIENT_NAME).map_err(|e| TransportError::Backend(e.to_string()))?;

        let port = midi_in
            .ports()
            .get(id)
            .cloned()
            .ok_or(TransportError::DeviceNotFound {
                direction: PortDirection::Input,
                id,
            })?;
        let name = midi_in.port_name(&port).unwrap_or_else(|_| format!("input {}", id));

        let connection = midi_in
            .connect(
                &port,
                "midimix-seq-in",
                move |_timestamp, data, _| {
                    // Never block the backend thread; overflow is dropped
                    if !queue.push_raw(data) {
                        debug!("Dropped MIDI input: {}", format_hex(data));
                    }
                },
                (),
            )
            .map_err(|e| TransportError::Connect {
                direction: PortDirection::Input,
                id,
                reason: e.to_string(),
            })?;

        info!("Subscribed MIDI input {}: {}", id, name);
        Ok(InputSubscription::new(id, name, Box::new(connection)))
    }

    fn subscribe_output(&self, id: usize) -> Result<Box<dyn OutputPort>, TransportError> {
        let midi_out =
            MidiOutput::new(CLIENT_NAME).map_err(|e| TransportError::Backend(e.to_string()))?;

        let port = midi_out
            .ports()
            .get(id)
            .cloned()
            .ok_or(TransportError::DeviceNotFound {
                direction: PortDirection::Output,
                id,
            })?;
        let name = midi_out
            .port_name(&port)
            .unwrap_or_else(|_| format!("output {}", id));

        let connection = midi_out
            .connect(&port, "midimix-seq-out")
            .map_err(|e| TransportError::Connect {
                direction: PortDirection::Output,
                id,
                reason: e.to_string(),
            })?;

        info!("Subscribed MIDI output {}: {}", id, name);
        Ok(Box::new(MidirOutput { name, connection }))
    }
}

/// Open midir output connection
struct MidirOutput {
    name: String,
    connection: MidiOutputConnection,
}

impl OutputPort for MidirOutput {
    fn name(&self) -> &str {
        &self.name
    }

    fn send(&mut self, message: &Message) -> Result<(), TransportError> {
        let (bytes, len) = message.encode();
        self.connection
            .send(&bytes[..len])
            .map_err(|e| TransportError::Send(e.to_string()))
    }
}

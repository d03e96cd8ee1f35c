//! Control surface MIDI I/O
//!
//! Opens the surface input and feeds Control Changes to the engine actor.
//! Everything else is re-emitted raw. The output port, when configured,
//! receives the raw forwards.

use anyhow::{anyhow, Context, Result};
use colored::*;
use midir::{MidiInput, MidiInputConnection, MidiInputPort, MidiOutput, MidiOutputConnection, MidiOutputPort};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, info};

use crate::engine::EngineHandle;
use crate::host::{Host, RawSink};
use crate::midi::{format_hex, MidiMessage};

const CLIENT_NAME: &str = "Surface-Remap";

/// Case-insensitive substring match on port names
pub fn port_matches(name: &str, pattern: &str) -> bool {
    name.to_lowercase().contains(&pattern.to_lowercase())
}

/// List available MIDI input ports
pub fn list_input_ports() -> Result<Vec<String>> {
    let midi_in = MidiInput::new("Surface-Remap-Scanner")?;
    Ok(midi_in
        .ports()
        .iter()
        .filter_map(|port| midi_in.port_name(port).ok())
        .collect())
}

/// List available MIDI output ports
pub fn list_output_ports() -> Result<Vec<String>> {
    let midi_out = MidiOutput::new("Surface-Remap-Scanner")?;
    Ok(midi_out
        .ports()
        .iter()
        .filter_map(|port| midi_out.port_name(port).ok())
        .collect())
}

fn find_input_port(midi_in: &MidiInput, pattern: &str) -> Option<(MidiInputPort, String)> {
    for port in midi_in.ports() {
        if let Ok(name) = midi_in.port_name(&port) {
            if port_matches(&name, pattern) {
                debug!("Found port '{}' matching pattern '{}'", name, pattern);
                return Some((port, name));
            }
        }
    }
    None
}

fn find_output_port(midi_out: &MidiOutput, pattern: &str) -> Option<(MidiOutputPort, String)> {
    for port in midi_out.ports() {
        if let Ok(name) = midi_out.port_name(&port) {
            if port_matches(&name, pattern) {
                debug!("Found port '{}' matching pattern '{}'", name, pattern);
                return Some((port, name));
            }
        }
    }
    None
}

/// Raw sink writing to a MIDI output port
pub struct MidiOutSink {
    conn: Mutex<MidiOutputConnection>,
}

impl MidiOutSink {
    /// Connect to the first output port whose name contains `pattern`
    pub fn connect(pattern: &str) -> Result<Self> {
        let midi_out = MidiOutput::new(CLIENT_NAME).context("Failed to create MIDI output")?;
        debug!("Found {} MIDI output ports", midi_out.port_count());

        let (port, name) = find_output_port(&midi_out, pattern)
            .ok_or_else(|| anyhow!("Output port '{}' not found", pattern))?;

        info!("Connecting to output port: {}", name);
        let conn = midi_out
            .connect(&port, CLIENT_NAME)
            .map_err(|e| anyhow!("Failed to connect to output port '{}': {}", name, e))?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

impl RawSink for MidiOutSink {
    fn send(&self, data: &[u8]) -> Result<()> {
        self.conn
            .lock()
            .send(data)
            .context("Failed to send raw MIDI data")?;
        debug!("Sent raw: {}", format_hex(data));
        Ok(())
    }
}

/// Surface input connection. Dropping it closes the port.
pub struct SurfaceInput {
    _conn: MidiInputConnection<()>,
    port_name: String,
}

impl SurfaceInput {
    /// Connect to the first input port whose name contains `pattern`.
    ///
    /// Control Changes go to the engine; other messages are passed to
    /// `host.forward_raw` untouched.
    pub fn connect(pattern: &str, engine: EngineHandle, host: Arc<dyn Host>) -> Result<Self> {
        let midi_in = MidiInput::new(CLIENT_NAME).context("Failed to create MIDI input")?;
        debug!("Found {} MIDI input ports", midi_in.port_count());

        let (port, port_name) = find_input_port(&midi_in, pattern)
            .ok_or_else(|| anyhow!("Input port '{}' not found", pattern))?;

        info!("Connecting to input port: {}", port_name);

        let conn = midi_in
            .connect(
                &port,
                CLIENT_NAME,
                move |_timestamp, data, _| match MidiMessage::parse(data) {
                    Some(message) => match message.control_event() {
                        Some(event) => engine.send_event(event),
                        None => host.forward_raw(data),
                    },
                    None => debug!("Failed to parse MIDI: {}", format_hex(data)),
                },
                (),
            )
            .map_err(|e| anyhow!("Failed to connect to input port '{}': {}", port_name, e))?;

        Ok(Self {
            _conn: conn,
            port_name,
        })
    }

    pub fn port_name(&self) -> &str {
        &self.port_name
    }
}

/// List all ports in a formatted way
pub fn list_ports_formatted() {
    println!("\n{}", "=== Available MIDI Ports ===".bold().cyan());

    print_port_list("Input Ports:", list_input_ports());
    print_port_list("Output Ports:", list_output_ports());

    println!();
}

fn print_port_list(title: &str, ports: Result<Vec<String>>) {
    println!("\n{}", title.bold());
    match ports {
        Ok(ports) if ports.is_empty() => println!("  {}", "No ports found".dimmed()),
        Ok(ports) => {
            for (index, name) in ports.iter().enumerate() {
                println!("  {} {}", format!("[{}]", index).yellow(), name);
            }
        }
        Err(e) => println!("  {} {}", "Unavailable:".red(), e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_port_matching_ignores_case() {
        assert!(port_matches("nanoKONTROL2 SLIDER/KNOB", "nanokontrol"));
        assert!(port_matches("X-Touch 0", "x-touch"));
        assert!(!port_matches("IAC Driver Bus 1", "nanokontrol"));
    }
}

//! Core identifiers shared by the remapping engine

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::midi::MidiMessage;

/// Name of a host-addressable parameter
pub type TargetName = String;

/// Index of a mapping page. Set 0 is the permanent default.
pub type MappingSet = usize;

/// Physical control identity: MIDI channel (1-16) and CC number (0-127)
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct ControlId {
    pub channel: u8,
    pub cc: u8,
}

impl ControlId {
    pub const fn new(channel: u8, cc: u8) -> Self {
        Self { channel, cc }
    }

    /// Strip index on a surface numbered in decades (21-28, 31-38, ...)
    pub fn strip(&self) -> u8 {
        self.cc % 10
    }
}

impl fmt::Display for ControlId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ch{}:cc{}", self.channel, self.cc)
    }
}

/// A single Control Change coming from the surface
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlEvent {
    pub id: ControlId,
    /// Raw 7-bit value
    pub value: u8,
}

impl ControlEvent {
    pub fn new(id: ControlId, value: u8) -> Self {
        Self {
            id,
            value: value & 0x7F,
        }
    }

    /// Re-encode the event exactly as it arrived on the wire
    pub fn encode(&self) -> Vec<u8> {
        MidiMessage::ControlChange {
            channel: self.id.channel.saturating_sub(1),
            cc: self.id.cc,
            value: self.value,
        }
        .encode()
    }
}

impl fmt::Display for ControlEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} v:{}", self.id, self.value)
    }
}

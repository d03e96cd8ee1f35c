//! Surface Remap - drive many named plugin targets from a small MIDI surface
//!
//! Buttons on the surface act as modifiers that swap which target each knob
//! or fader currently addresses. The crate is split into:
//! - [`engine`]: the remapping engine (mapping table, modifiers, button state,
//!   value transforms and per-event routing)
//! - [`catalog`]: the static candidate targets per control and mapping-set
//! - [`host`]: the sink that receives `(target, value)` pairs and raw events
//! - [`config`]: YAML configuration with hot-reload of live settings
//! - [`midi`] / [`surface`]: MIDI parsing and port plumbing

pub mod catalog;
pub mod cli;
pub mod config;
pub mod engine;
pub mod host;
pub mod midi;
pub mod paths;
pub mod surface;

pub use catalog::{Catalog, CatalogEntry, ControlKind};
pub use engine::{ControlEvent, ControlId, Engine, RouteError, RouteOutcome};
pub use host::{Host, HostSettings, SettingsLookup};

//! Remapping engine - routes surface events to host targets
//!
//! The engine owns:
//! - Button on/off state with optional toggle groups
//! - The live mapping table (one target stack per control)
//! - Modifiers that push alternate mapping-sets while their button is on
//! - Name-change / math overrides applied after resolution
//!
//! It is synchronous and single-owner. Concurrent callers go through
//! [`EngineHandle`], which serializes events on one actor task.

use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

use crate::catalog::Catalog;
use crate::host::{Host, HostSettings};

mod actor;
pub mod buttons;
mod builders;
mod dispatch;
pub mod modifier;
pub mod overrides;
pub mod table;
pub mod transform;
pub mod types;


pub use actor::{EngineActor, EngineCommand, EngineHandle};
pub use builders::{build_settings, declared_buttons, selector_key};
pub use buttons::{ButtonChange, ButtonState, ToggleGroup};
pub use modifier::{Modifier, ModifierEngine, RevertPolicy, TriggerSpec};
pub use overrides::{Condition, MathRule, NameChange, NewName, Overrides, SyncRate};
pub use table::MappingTable;
pub use transform::ValueTransform;
pub use types::{ControlEvent, ControlId, MappingSet, TargetName};

/// Local, non-fatal routing failures. They are logged and reported in the
/// [`RouteOutcome`], never propagated.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RouteError {
    #[error("target '{0}' is not addressable")]
    UnaddressableTarget(TargetName),

    #[error("no mapping for control {0}")]
    UnknownControl(ControlId),

    #[error("mapping stack for control {0} is empty")]
    EmptyMappingStack(ControlId),
}

/// What happened to one incoming event
#[derive(Debug, Clone, PartialEq)]
pub enum RouteOutcome {
    /// A value was sent to the host
    Dispatched {
        target: TargetName,
        value: f64,
        forwarded_raw: bool,
    },
    /// No mapping: the raw event was passed through unchanged
    Forwarded,
    /// Resolved but nothing was dispatched
    Dropped {
        reason: RouteError,
        forwarded_raw: bool,
    },
    /// A button used only as a modifier
    Consumed,
}

impl RouteOutcome {
    pub fn target(&self) -> Option<&str> {
        match self {
            RouteOutcome::Dispatched { target, .. } => Some(target.as_str()),
            _ => None,
        }
    }

    pub fn value(&self) -> Option<f64> {
        match self {
            RouteOutcome::Dispatched { value, .. } => Some(*value),
            _ => None,
        }
    }
}

/// Inclusive range of CC numbers on one channel that are buttons
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ButtonRange {
    pub channel: u8,
    pub first: u8,
    pub last: u8,
}

impl ButtonRange {
    pub fn new(channel: u8, first: u8, last: u8) -> Self {
        Self {
            channel,
            first,
            last,
        }
    }

    pub fn single(id: ControlId) -> Self {
        Self::new(id.channel, id.cc, id.cc)
    }

    pub fn contains(&self, id: ControlId) -> bool {
        id.channel == self.channel && (self.first..=self.last).contains(&id.cc)
    }

    pub fn ids(&self) -> impl Iterator<Item = ControlId> + '_ {
        (self.first..=self.last).map(move |cc| ControlId::new(self.channel, cc))
    }
}

/// Deployment-wide behavior switches
#[derive(Debug, Clone)]
pub struct EngineOptions {
    pub buttons: Vec<ButtonRange>,
    pub toggle_groups: Vec<ToggleGroup>,
    /// Button state comes from external lights: only press pulses count
    pub external_indicator: bool,
    /// Buttons are also routed as mapped events after modifier handling
    pub buttons_dispatch: bool,
    /// Re-emit every mapped event raw as well
    pub also_forward_raw: bool,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            buttons: Vec::new(),
            toggle_groups: Vec::new(),
            external_indicator: false,
            buttons_dispatch: true,
            also_forward_raw: true,
        }
    }
}

/// All mutable routing state, owned by the engine
#[derive(Debug, Clone, Default)]
pub struct EngineState {
    pub buttons: ButtonState,
    pub table: MappingTable,
}

/// Serializable view of the engine for inspection
#[derive(Debug, Clone, Serialize)]
pub struct EngineSnapshot {
    pub controls: Vec<ControlSnapshot>,
    pub buttons: Vec<ButtonSnapshot>,
    pub active_modifiers: Vec<usize>,
    pub also_forward_raw: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ControlSnapshot {
    pub control: ControlId,
    pub label: String,
    pub stack: Vec<TargetName>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ButtonSnapshot {
    pub control: ControlId,
    pub label: String,
    pub on: bool,
}

/// The remapping engine
pub struct Engine {
    catalog: Catalog,
    options: EngineOptions,
    modifiers: ModifierEngine,
    overrides: Overrides,
    settings: HostSettings,
    host: Arc<dyn Host>,
    state: EngineState,
}

impl Engine {
    /// Create an engine with every catalog control on its set-0 target
    pub fn new(catalog: Catalog, options: EngineOptions, host: Arc<dyn Host>) -> Self {
        let declared: Vec<ControlId> = options.buttons.iter().flat_map(|r| r.ids()).collect();
        let state = EngineState {
            buttons: ButtonState::new(declared, options.toggle_groups.clone()),
            table: MappingTable::new(),
        };

        let mut engine = Self {
            catalog,
            options,
            modifiers: ModifierEngine::default(),
            overrides: Overrides::new(),
            settings: HostSettings::default(),
            host,
            state,
        };
        engine.init_table();
        engine
    }

    pub fn with_modifiers(mut self, modifiers: Vec<Modifier>) -> Self {
        self.modifiers = ModifierEngine::new(modifiers);
        self
    }

    pub fn with_overrides(mut self, overrides: Overrides) -> Self {
        self.overrides = overrides;
        self
    }

    pub fn with_settings(mut self, settings: HostSettings) -> Self {
        self.settings = settings;
        self
    }

    fn init_table(&mut self) {
        for (id, entry) in self.catalog.controls() {
            if let Some(name) = entry.target_at(0) {
                self.state.table.assign(id, name);
            }
        }
        debug!("Mapping table initialized with {} controls", self.state.table.len());
    }

    /// All buttons off, all modifiers released, table back to set 0
    pub fn reset(&mut self) {
        self.state.buttons.reset();
        self.modifiers.reset();
        self.state.table.clear();
        self.init_table();
        info!("🔄 Engine reset to default mapping");
    }

    /// Replace the live host settings (selector menus, "Send MIDI CC")
    pub fn apply_settings(&mut self, settings: HostSettings) {
        self.settings = settings;
        debug!("Host settings updated");
    }

    pub fn set_setting(&mut self, key: &str, value: i64) {
        self.settings.set(key, value);
    }

    pub fn set_also_forward_raw(&mut self, enabled: bool) {
        self.options.also_forward_raw = enabled;
    }

    /// Whether mapped events are also re-emitted raw right now
    pub fn forwards_raw(&self) -> bool {
        self.settings
            .send_midi_cc()
            .unwrap_or(self.options.also_forward_raw)
    }

    pub fn is_button(&self, id: ControlId) -> bool {
        self.options.buttons.iter().any(|r| r.contains(id))
    }

    pub fn current_target(&self, id: ControlId) -> Option<&str> {
        self.state.table.current_target(id)
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn settings(&self) -> &HostSettings {
        &self.settings
    }

    pub fn state(&self) -> &EngineState {
        &self.state
    }

    pub fn modifiers(&self) -> &ModifierEngine {
        &self.modifiers
    }

    pub fn snapshot(&self) -> EngineSnapshot {
        let controls = self
            .catalog
            .controls()
            .filter_map(|(id, entry)| {
                self.state.table.stack(id).map(|stack| ControlSnapshot {
                    control: id,
                    label: entry.label.clone(),
                    stack: stack.to_vec(),
                })
            })
            .collect();

        let buttons = self
            .state
            .buttons
            .iter()
            .map(|(id, on)| ButtonSnapshot {
                control: id,
                label: self.catalog.label(id),
                on,
            })
            .collect();

        EngineSnapshot {
            controls,
            buttons,
            active_modifiers: self.modifiers.active(),
            also_forward_raw: self.forwards_raw(),
        }
    }
}

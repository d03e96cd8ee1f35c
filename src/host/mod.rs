//! Host collaborator contract
//!
//! The host owns the real parameters. The engine only asks whether a target
//! name is live, hands it normalized values, and re-emits raw events.

use std::collections::HashMap;

use crate::engine::ControlId;

pub mod console;
#[cfg(test)]
pub(crate) mod recording;

pub use console::{ConsoleHost, RawSink};

/// Setting that toggles raw CC forwarding at runtime
pub const SEND_MIDI_CC_SETTING: &str = "Send MIDI CC";

/// Host trait - everything that can receive remapped values implements this
///
/// Note: All methods take &self so a host can be shared with the MIDI input
/// thread. Implementations use interior mutability for counters and sinks.
pub trait Host: Send + Sync {
    /// Whether `target` currently maps to a live parameter
    fn is_target_addressable(&self, target: &str) -> bool;

    /// Apply a normalized value (0.0 - 1.0) to `target`
    fn dispatch(&self, target: &str, value: f64);

    /// Re-emit an event unmodified
    fn forward_raw(&self, raw: &[u8]);
}

/// Read access to live, user-editable settings
pub trait SettingsLookup {
    /// Integer value of a setting (menu index, checkbox, number)
    fn value(&self, key: &str) -> Option<i64>;

    /// Button chosen by a "which button selects this" menu setting
    fn selected_button(&self, key: &str) -> Option<ControlId>;
}

/// Host settings: named integer values plus the menu of selectable buttons.
///
/// Index 0 of the button list is "Unassigned".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HostSettings {
    values: HashMap<String, i64>,
    button_list: Vec<Option<ControlId>>,
}

impl HostSettings {
    pub fn new(values: HashMap<String, i64>, buttons: impl IntoIterator<Item = ControlId>) -> Self {
        let mut button_list = vec![None];
        button_list.extend(buttons.into_iter().map(Some));
        Self {
            values,
            button_list,
        }
    }

    pub fn set(&mut self, key: impl Into<String>, value: i64) {
        self.values.insert(key.into(), value);
    }

    /// Live override of raw forwarding, if the setting is present
    pub fn send_midi_cc(&self) -> Option<bool> {
        self.values.get(SEND_MIDI_CC_SETTING).map(|v| *v != 0)
    }

    pub fn button_list(&self) -> &[Option<ControlId>] {
        &self.button_list
    }
}

impl SettingsLookup for HostSettings {
    fn value(&self, key: &str) -> Option<i64> {
        self.values.get(key).copied()
    }

    fn selected_button(&self, key: &str) -> Option<ControlId> {
        let index = usize::try_from(self.value(key)?).ok()?;
        self.button_list.get(index).copied().flatten()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> HostSettings {
        let buttons = (41..=48).map(|cc| ControlId::new(1, cc));
        let mut values = HashMap::new();
        values.insert("Set 1 button".to_string(), 1);
        values.insert("Set 2 button".to_string(), 0);
        values.insert("Set 3 button".to_string(), 99);
        HostSettings::new(values, buttons)
    }

    #[test]
    fn test_selected_button_resolves_through_list() {
        let settings = settings();
        assert_eq!(
            settings.selected_button("Set 1 button"),
            Some(ControlId::new(1, 41))
        );
    }

    #[test]
    fn test_unassigned_and_out_of_range() {
        let settings = settings();
        assert_eq!(settings.selected_button("Set 2 button"), None);
        assert_eq!(settings.selected_button("Set 3 button"), None);
        assert_eq!(settings.selected_button("Missing"), None);
    }

    #[test]
    fn test_live_change() {
        let mut settings = settings();
        settings.set("Set 1 button", 3);
        assert_eq!(
            settings.selected_button("Set 1 button"),
            Some(ControlId::new(1, 43))
        );
    }

    #[test]
    fn test_send_midi_cc_setting() {
        let mut settings = settings();
        assert_eq!(settings.send_midi_cc(), None);

        settings.set(SEND_MIDI_CC_SETTING, 0);
        assert_eq!(settings.send_midi_cc(), Some(false));
    }
}

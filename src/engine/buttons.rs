//! Button on/off tracking with optional exclusive toggle groups

use std::collections::HashMap;

use super::types::ControlId;

/// Buttons that are mutually exclusive when their state is driven by
/// external indicator lights
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToggleGroup {
    members: Vec<ControlId>,
}

impl ToggleGroup {
    pub fn new(members: impl IntoIterator<Item = ControlId>) -> Self {
        Self {
            members: members.into_iter().collect(),
        }
    }

    pub fn contains(&self, id: ControlId) -> bool {
        self.members.contains(&id)
    }

    pub fn members(&self) -> &[ControlId] {
        &self.members
    }
}

/// A button whose state differs from before an update
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ButtonChange {
    pub id: ControlId,
    pub on: bool,
}

/// On/off state per button
#[derive(Debug, Clone, Default)]
pub struct ButtonState {
    states: HashMap<ControlId, bool>,
    groups: Vec<ToggleGroup>,
}

impl ButtonState {
    /// Every declared button starts off
    pub fn new(buttons: impl IntoIterator<Item = ControlId>, groups: Vec<ToggleGroup>) -> Self {
        Self {
            states: buttons.into_iter().map(|id| (id, false)).collect(),
            groups,
        }
    }

    pub fn is_on(&self, id: ControlId) -> bool {
        self.states.get(&id).copied().unwrap_or(false)
    }

    /// Apply a raw button value and return every button whose state changed.
    ///
    /// Without external indicators the button simply follows the value.
    /// With them, releases are ignored and a press toggles the button after
    /// switching off the other members of its toggle groups.
    pub fn update(&mut self, id: ControlId, raw: u8, external_indicator: bool) -> Vec<ButtonChange> {
        let before = self.states.clone();

        if !external_indicator {
            self.states.insert(id, raw != 0);
        } else {
            if raw == 0 {
                return Vec::new();
            }

            let original = self.is_on(id);
            for group in self.groups.iter().filter(|g| g.contains(id)) {
                for member in group.members() {
                    self.states.insert(*member, false);
                }
            }
            self.states.insert(id, !original);
        }

        let mut changes: Vec<ButtonChange> = self
            .states
            .iter()
            .filter(|(button, on)| before.get(button).copied().unwrap_or(false) != **on)
            .map(|(button, on)| ButtonChange { id: *button, on: *on })
            .collect();
        // Releases first so that a newly pressed button ends up on top
        changes.sort_by_key(|c| (c.on, c.id));
        changes
    }

    /// Switch every button off
    pub fn reset(&mut self) {
        for on in self.states.values_mut() {
            *on = false;
        }
    }

    /// All known buttons in control order
    pub fn iter(&self) -> impl Iterator<Item = (ControlId, bool)> + '_ {
        let mut ids: Vec<_> = self.states.keys().copied().collect();
        ids.sort();
        ids.into_iter().map(move |id| (id, self.states[&id]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const B1: ControlId = ControlId::new(1, 41);
    const B2: ControlId = ControlId::new(1, 42);
    const B3: ControlId = ControlId::new(1, 43);
    const LONER: ControlId = ControlId::new(1, 81);

    fn grouped() -> ButtonState {
        ButtonState::new(
            [B1, B2, B3, LONER],
            vec![ToggleGroup::new([B1, B2, B3])],
        )
    }

    #[test]
    fn test_local_toggle_follows_value() {
        let mut buttons = grouped();

        let changes = buttons.update(B1, 127, false);
        assert!(buttons.is_on(B1));
        assert_eq!(changes, vec![ButtonChange { id: B1, on: true }]);

        // Idempotent
        assert!(buttons.update(B1, 127, false).is_empty());
        assert!(buttons.is_on(B1));

        buttons.update(B1, 0, false);
        assert!(!buttons.is_on(B1));
    }

    #[test]
    fn test_local_toggle_ignores_groups() {
        let mut buttons = grouped();
        buttons.update(B1, 127, false);
        buttons.update(B2, 127, false);

        assert!(buttons.is_on(B1));
        assert!(buttons.is_on(B2));
    }

    #[test]
    fn test_toggle_group_exclusivity() {
        let mut buttons = grouped();

        buttons.update(B2, 127, true);
        assert!(!buttons.is_on(B1));
        assert!(buttons.is_on(B2));
        assert!(!buttons.is_on(B3));

        // Pressing B2 again toggles it off
        buttons.update(B2, 127, true);
        assert!(!buttons.is_on(B1));
        assert!(!buttons.is_on(B2));
        assert!(!buttons.is_on(B3));
    }

    #[test]
    fn test_toggle_group_switches_selection() {
        let mut buttons = grouped();
        buttons.update(B2, 127, true);

        let changes = buttons.update(B3, 127, true);
        assert!(!buttons.is_on(B2));
        assert!(buttons.is_on(B3));
        assert_eq!(
            changes,
            vec![ButtonChange { id: B2, on: false }, ButtonChange { id: B3, on: true }]
        );
    }

    #[test]
    fn test_indicator_mode_ignores_release() {
        let mut buttons = grouped();
        buttons.update(B1, 127, true);

        assert!(buttons.update(B1, 0, true).is_empty());
        assert!(buttons.is_on(B1));
    }

    #[test]
    fn test_indicator_mode_without_group_flips() {
        let mut buttons = grouped();
        buttons.update(B1, 127, true);

        buttons.update(LONER, 127, true);
        assert!(buttons.is_on(LONER));
        assert!(buttons.is_on(B1));

        buttons.update(LONER, 127, true);
        assert!(!buttons.is_on(LONER));
    }

    #[test]
    fn test_unknown_button_is_stored_fresh() {
        let mut buttons = ButtonState::default();
        let unknown = ControlId::new(2, 90);
        assert!(!buttons.is_on(unknown));

        buttons.update(unknown, 1, false);
        assert!(buttons.is_on(unknown));
    }

    #[test]
    fn test_reset() {
        let mut buttons = grouped();
        buttons.update(B1, 127, false);
        buttons.update(LONER, 127, false);

        buttons.reset();
        assert!(buttons.iter().all(|(_, on)| !on));
    }
}

//! Modifiers: buttons that swap a group of controls onto another mapping-set
//!
//! Each modifier is a two-state machine (inactive / active) that only moves
//! on edges of its trigger button. Activation pushes the alternate targets on
//! the affected controls' stacks, deactivation removes exactly what it
//! pushed, so overlapping modifiers resolve LIFO per control.

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::buttons::ButtonState;
use super::table::MappingTable;
use super::types::{ControlId, MappingSet, TargetName};
use crate::catalog::Catalog;
use crate::host::{Host, SettingsLookup};

/// Which button drives a modifier
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TriggerSpec {
    /// Always the same physical button
    Fixed(ControlId),
    /// The button currently chosen by a host setting. Resolved on every
    /// event since the user may change the selection live.
    Selected { key: String },
}

impl TriggerSpec {
    pub fn resolve(&self, settings: &dyn SettingsLookup) -> Option<ControlId> {
        match self {
            TriggerSpec::Fixed(id) => Some(*id),
            TriggerSpec::Selected { key } => settings.selected_button(key),
        }
    }
}

/// What happens to the affected controls when a modifier is released
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RevertPolicy {
    /// Pop back to whatever was active before
    #[default]
    Stack,
    /// The leftmost still-held trigger of this family sets the new
    /// default, else the modifier's own default set
    HeldButtons,
}

/// A button → mapping-set binding, immutable after startup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Modifier {
    pub trigger: TriggerSpec,
    pub active_set: MappingSet,
    pub default_set: MappingSet,
    pub affects: Vec<ControlId>,
    pub revert: RevertPolicy,
}

impl Modifier {
    pub fn new(trigger: TriggerSpec, active_set: MappingSet, affects: Vec<ControlId>) -> Self {
        Self {
            trigger,
            active_set,
            default_set: 0,
            affects,
            revert: RevertPolicy::Stack,
        }
    }

    pub fn with_default_set(mut self, default_set: MappingSet) -> Self {
        self.default_set = default_set;
        self
    }

    pub fn with_revert(mut self, revert: RevertPolicy) -> Self {
        self.revert = revert;
        self
    }
}

/// Runtime state of one modifier
#[derive(Debug, Clone, Default, PartialEq, Eq)]
enum ModifierState {
    #[default]
    Inactive,
    /// Remembers exactly which targets were pushed so that release removes
    /// them and nothing else
    Active { pushed: Vec<(ControlId, TargetName)> },
}

/// Result of feeding a button level to a modifier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Activated,
    Deactivated,
    Unchanged,
}

/// Everything a transition reads or writes besides the modifiers themselves
pub struct ModifierContext<'a> {
    pub catalog: &'a Catalog,
    pub table: &'a mut MappingTable,
    pub buttons: &'a ButtonState,
    pub settings: &'a dyn SettingsLookup,
    pub host: &'a dyn Host,
}

/// Owns all modifiers and their active/inactive state
#[derive(Debug, Clone, Default)]
pub struct ModifierEngine {
    modifiers: Vec<Modifier>,
    states: Vec<ModifierState>,
}

impl ModifierEngine {
    pub fn new(modifiers: Vec<Modifier>) -> Self {
        let states = vec![ModifierState::Inactive; modifiers.len()];
        Self { modifiers, states }
    }

    pub fn modifiers(&self) -> &[Modifier] {
        &self.modifiers
    }

    pub fn is_active(&self, index: usize) -> bool {
        matches!(self.states.get(index), Some(ModifierState::Active { .. }))
    }

    /// Indices of active modifiers
    pub fn active(&self) -> Vec<usize> {
        (0..self.modifiers.len()).filter(|i| self.is_active(*i)).collect()
    }

    /// Modifiers whose trigger currently resolves to `button`
    pub fn triggered_by(&self, button: ControlId, settings: &dyn SettingsLookup) -> Vec<usize> {
        self.modifiers
            .iter()
            .enumerate()
            .filter(|(_, m)| m.trigger.resolve(settings) == Some(button))
            .map(|(i, _)| i)
            .collect()
    }

    /// Mapping-set in effect when no modifier is engaged: the active set of
    /// the leftmost held trigger (lowest channel, then CC) among the
    /// held-buttons modifiers, else `fallback`. Ties on one button keep
    /// declaration order.
    pub fn default_set(
        &self,
        buttons: &ButtonState,
        settings: &dyn SettingsLookup,
        fallback: MappingSet,
    ) -> MappingSet {
        self.modifiers
            .iter()
            .filter(|m| m.revert == RevertPolicy::HeldButtons)
            .filter_map(|m| {
                m.trigger
                    .resolve(settings)
                    .filter(|id| buttons.is_on(*id))
                    .map(|id| (id, m.active_set))
            })
            .min_by_key(|(id, _)| *id)
            .map(|(_, set)| set)
            .unwrap_or(fallback)
    }

    /// Feed the trigger level of one modifier. Only edges change anything:
    /// a repeated "on" while active is a no-op.
    pub fn set_level(&mut self, index: usize, on: bool, ctx: &mut ModifierContext<'_>) -> Transition {
        if index >= self.modifiers.len() {
            return Transition::Unchanged;
        }
        match (on, self.is_active(index)) {
            (true, false) => {
                let pushed = self.activate(index, ctx);
                self.states[index] = ModifierState::Active { pushed };
                Transition::Activated
            }
            (false, true) => {
                let state = std::mem::take(&mut self.states[index]);
                if let ModifierState::Active { pushed } = state {
                    self.deactivate(index, pushed, ctx);
                }
                Transition::Deactivated
            }
            _ => Transition::Unchanged,
        }
    }

    /// Forget every active modifier without touching the table
    pub fn reset(&mut self) {
        for state in &mut self.states {
            *state = ModifierState::Inactive;
        }
    }

    fn activate(&self, index: usize, ctx: &mut ModifierContext<'_>) -> Vec<(ControlId, TargetName)> {
        let modifier = &self.modifiers[index];
        let mut pushed = Vec::new();

        debug!("--New Parameters-- (modifier {} → set {})", index, modifier.active_set);
        for &control in &modifier.affects {
            if !ctx.catalog.contains(control) {
                debug!(
                    "Modifier {} affects {} which has no catalog entry, skipping",
                    index, control
                );
                continue;
            }

            let Some(name) = ctx.catalog.target_at(control, modifier.active_set) else {
                continue;
            };
            let default_live = ctx
                .catalog
                .target_at(control, 0)
                .is_some_and(|d| ctx.host.is_target_addressable(d));
            if !ctx.host.is_target_addressable(name) || !default_live {
                debug!("{} not addressable for {}, left unchanged", name, ctx.catalog.label(control));
                continue;
            }

            ctx.table.assign(control, name);
            debug!("{} mapped to {}", ctx.catalog.label(control), name);
            pushed.push((control, name.to_string()));
        }
        pushed
    }

    fn deactivate(&self, index: usize, pushed: Vec<(ControlId, TargetName)>, ctx: &mut ModifierContext<'_>) {
        let modifier = &self.modifiers[index];

        for (control, name) in pushed {
            let Some(fallback) = ctx.catalog.target_at(control, 0) else {
                continue;
            };
            let now = ctx.table.unassign(control, &name, fallback).map(str::to_string);
            debug!(
                "{} removed from {} now {}",
                name,
                ctx.catalog.label(control),
                now.as_deref().unwrap_or("(none)")
            );
        }

        if modifier.revert == RevertPolicy::HeldButtons {
            let set = self.default_set(ctx.buttons, ctx.settings, modifier.default_set);
            if set != 0 {
                debug!("Get Default → set {}", set);
                for &control in &modifier.affects {
                    if let Some(name) = ctx.catalog.target_at(control, set) {
                        if ctx.host.is_target_addressable(name) {
                            ctx.table.promote(control, name);
                        }
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{CatalogEntry, ControlKind};
    use crate::host::recording::RecordingHost;
    use crate::host::HostSettings;

    const FADER: ControlId = ControlId::new(1, 31);
    const KNOB: ControlId = ControlId::new(1, 21);
    const A: ControlId = ControlId::new(1, 41);
    const B: ControlId = ControlId::new(1, 42);

    fn catalog() -> Catalog {
        let mut catalog = Catalog::new();
        catalog.insert(
            FADER,
            CatalogEntry::from_names("Fader1 (31)", ControlKind::Fader, ["F0", "F1", "F2"]),
        );
        catalog.insert(
            KNOB,
            CatalogEntry::from_names("Knob1 (21)", ControlKind::Knob, ["K0", "K1", ""]),
        );
        catalog
    }

    struct Fixture {
        catalog: Catalog,
        table: MappingTable,
        buttons: ButtonState,
        settings: HostSettings,
        host: RecordingHost,
    }

    impl Fixture {
        fn new() -> Self {
            let catalog = catalog();
            let mut table = MappingTable::new();
            table.assign(FADER, "F0");
            table.assign(KNOB, "K0");
            Self {
                catalog,
                table,
                buttons: ButtonState::new([A, B], Vec::new()),
                settings: HostSettings::default(),
                host: RecordingHost::with_targets(["F0", "F1", "F2", "K0", "K1"]),
            }
        }

        fn level(&mut self, engine: &mut ModifierEngine, index: usize, on: bool) -> Transition {
            let mut ctx = ModifierContext {
                catalog: &self.catalog,
                table: &mut self.table,
                buttons: &self.buttons,
                settings: &self.settings,
                host: &self.host,
            };
            engine.set_level(index, on, &mut ctx)
        }
    }

    #[test]
    fn test_edges_only() {
        let mut fx = Fixture::new();
        let mut engine = ModifierEngine::new(vec![Modifier::new(
            TriggerSpec::Fixed(A),
            1,
            vec![FADER],
        )]);

        assert_eq!(fx.level(&mut engine, 0, true), Transition::Activated);
        assert_eq!(fx.level(&mut engine, 0, true), Transition::Unchanged);
        assert_eq!(fx.table.stack(FADER).unwrap(), ["F0", "F1"]);

        assert_eq!(fx.level(&mut engine, 0, false), Transition::Deactivated);
        assert_eq!(fx.level(&mut engine, 0, false), Transition::Unchanged);
        assert_eq!(fx.table.stack(FADER).unwrap(), ["F0"]);
    }

    #[test]
    fn test_missing_alternate_leaves_control_alone() {
        let mut fx = Fixture::new();
        let mut engine = ModifierEngine::new(vec![Modifier::new(
            TriggerSpec::Fixed(A),
            2,
            vec![FADER, KNOB, ControlId::new(1, 99)],
        )]);

        fx.level(&mut engine, 0, true);
        assert_eq!(fx.table.current_target(FADER), Some("F2"));
        // Knob has no set-2 name, unknown control is skipped
        assert_eq!(fx.table.current_target(KNOB), Some("K0"));
        assert!(!fx.table.is_initialized(ControlId::new(1, 99)));
    }

    #[test]
    fn test_unaddressable_default_blocks_push() {
        let mut fx = Fixture::new();
        fx.host = RecordingHost::with_targets(["F1", "K0", "K1"]);
        let mut engine = ModifierEngine::new(vec![Modifier::new(
            TriggerSpec::Fixed(A),
            1,
            vec![FADER, KNOB],
        )]);

        fx.level(&mut engine, 0, true);
        assert_eq!(fx.table.current_target(FADER), Some("F0"));
        assert_eq!(fx.table.current_target(KNOB), Some("K1"));
    }

    #[test]
    fn test_lifo_out_of_order_release() {
        let mut fx = Fixture::new();
        let mut engine = ModifierEngine::new(vec![
            Modifier::new(TriggerSpec::Fixed(A), 1, vec![FADER]),
            Modifier::new(TriggerSpec::Fixed(B), 2, vec![FADER]),
        ]);

        fx.level(&mut engine, 0, true);
        fx.level(&mut engine, 1, true);
        assert_eq!(fx.table.current_target(FADER), Some("F2"));

        // Release the older one first: the newer stays on top
        fx.level(&mut engine, 0, false);
        assert_eq!(fx.table.current_target(FADER), Some("F2"));

        fx.level(&mut engine, 1, false);
        assert_eq!(fx.table.stack(FADER).unwrap(), ["F0"]);
    }

    #[test]
    fn test_selected_trigger_resolution() {
        let mut settings = HostSettings::new(Default::default(), [A, B]);
        let engine = ModifierEngine::new(vec![Modifier::new(
            TriggerSpec::Selected {
                key: "Set 1 button".to_string(),
            },
            1,
            vec![FADER],
        )]);

        assert!(engine.triggered_by(A, &settings).is_empty());

        settings.set("Set 1 button", 2);
        assert_eq!(engine.triggered_by(B, &settings), vec![0]);
        assert!(engine.triggered_by(A, &settings).is_empty());
    }

    #[test]
    fn test_held_buttons_default() {
        let mut fx = Fixture::new();
        let mut engine = ModifierEngine::new(vec![
            Modifier::new(TriggerSpec::Fixed(A), 1, vec![FADER]).with_revert(RevertPolicy::HeldButtons),
            Modifier::new(TriggerSpec::Fixed(B), 2, vec![FADER]).with_revert(RevertPolicy::HeldButtons),
        ]);

        // B pressed, then A pressed on top, then B released while A held
        fx.buttons.update(B, 127, false);
        fx.level(&mut engine, 1, true);
        fx.buttons.update(A, 127, false);
        fx.level(&mut engine, 0, true);
        assert_eq!(fx.table.current_target(FADER), Some("F1"));
        assert_eq!(engine.default_set(&fx.buttons, &fx.settings, 0), 1);

        fx.buttons.update(B, 0, false);
        fx.level(&mut engine, 1, false);
        assert_eq!(fx.table.current_target(FADER), Some("F1"));

        fx.buttons.update(A, 0, false);
        fx.level(&mut engine, 0, false);
        assert_eq!(fx.table.current_target(FADER), Some("F0"));
        assert_eq!(engine.default_set(&fx.buttons, &fx.settings, 0), 0);
    }

    #[test]
    fn test_held_buttons_leftmost_wins() {
        let mut fx = Fixture::new();
        let mut engine = ModifierEngine::new(vec![
            Modifier::new(TriggerSpec::Fixed(A), 1, vec![FADER]).with_revert(RevertPolicy::HeldButtons),
            Modifier::new(TriggerSpec::Fixed(B), 2, vec![FADER]).with_revert(RevertPolicy::HeldButtons),
            Modifier::new(TriggerSpec::Fixed(ControlId::new(1, 43)), 2, vec![FADER])
                .with_revert(RevertPolicy::HeldButtons),
        ]);
        fx.buttons = ButtonState::new([A, B, ControlId::new(1, 43)], Vec::new());

        // A held first, then B, then the third button
        fx.buttons.update(A, 127, false);
        fx.level(&mut engine, 0, true);
        fx.buttons.update(B, 127, false);
        fx.level(&mut engine, 1, true);
        fx.buttons.update(ControlId::new(1, 43), 127, false);
        fx.level(&mut engine, 2, true);

        // Releasing the third hands the control back to the leftmost held (A),
        // not the most recent (B)
        fx.buttons.update(ControlId::new(1, 43), 0, false);
        fx.level(&mut engine, 2, false);
        assert_eq!(fx.table.current_target(FADER), Some("F1"));
    }

    #[test]
    fn test_held_default_follows_position_not_declaration() {
        let mut fx = Fixture::new();
        let engine = ModifierEngine::new(vec![
            Modifier::new(TriggerSpec::Fixed(B), 2, vec![FADER]).with_revert(RevertPolicy::HeldButtons),
            Modifier::new(TriggerSpec::Fixed(A), 1, vec![FADER]).with_revert(RevertPolicy::HeldButtons),
        ]);

        fx.buttons.update(B, 127, false);
        assert_eq!(engine.default_set(&fx.buttons, &fx.settings, 0), 2);

        fx.buttons.update(A, 127, false);
        assert_eq!(engine.default_set(&fx.buttons, &fx.settings, 0), 1);
    }

    #[test]
    fn test_reset_forgets_state() {
        let mut fx = Fixture::new();
        let mut engine = ModifierEngine::new(vec![Modifier::new(TriggerSpec::Fixed(A), 1, vec![FADER])]);

        fx.level(&mut engine, 0, true);
        engine.reset();
        assert!(engine.active().is_empty());
    }
}

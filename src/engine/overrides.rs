//! Per-control name changes and value math applied after target resolution

use std::collections::HashMap;

use super::buttons::ButtonState;
use super::modifier::TriggerSpec;
use super::transform::ValueTransform;
use super::types::{ControlId, TargetName};
use crate::catalog::Catalog;
use crate::host::{Host, SettingsLookup};

/// Predicate evaluated at event time
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Condition {
    #[default]
    Always,
    ButtonOn(TriggerSpec),
    ButtonOff(TriggerSpec),
    SettingEquals { key: String, value: i64 },
}

/// What a condition may look at
pub struct EvalContext<'a> {
    pub catalog: &'a Catalog,
    pub buttons: &'a ButtonState,
    pub settings: &'a dyn SettingsLookup,
}

impl Condition {
    pub fn holds(&self, ctx: &EvalContext<'_>) -> bool {
        match self {
            Condition::Always => true,
            Condition::ButtonOn(trigger) => trigger
                .resolve(ctx.settings)
                .is_some_and(|id| ctx.buttons.is_on(id)),
            Condition::ButtonOff(trigger) => trigger
                .resolve(ctx.settings)
                .is_some_and(|id| !ctx.buttons.is_on(id)),
            Condition::SettingEquals { key, value } => ctx.settings.value(key) == Some(*value),
        }
    }
}

/// Replacement target of a name change
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NewName {
    Fixed(TargetName),
    /// Catalog name of `control` in the set chosen by a setting
    CatalogAt { control: ControlId, set_setting: String },
}

impl NewName {
    pub fn resolve(&self, ctx: &EvalContext<'_>) -> Option<TargetName> {
        match self {
            NewName::Fixed(name) => Some(name.clone()),
            NewName::CatalogAt {
                control,
                set_setting,
            } => {
                let set = usize::try_from(ctx.settings.value(set_setting).unwrap_or(0)).ok()?;
                ctx.catalog.target_at(*control, set).map(str::to_string)
            }
        }
    }
}

/// Rename `target` when `when` holds
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameChange {
    pub target: TargetName,
    pub when: Condition,
    pub new_name: NewName,
}

/// Use `transform` instead of the default scaling for `target`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MathRule {
    pub target: TargetName,
    pub when: Condition,
    pub transform: ValueTransform,
}

/// Reroutes a rate control to a dedicated synced-rate target while a
/// sync button is on
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncRate {
    pub button: TriggerSpec,
    pub control: ControlId,
    pub set_setting: String,
    pub target: TargetName,
}

impl SyncRate {
    fn rename(&self, resolved: &str, ctx: &EvalContext<'_>, host: &dyn Host) -> Option<TargetName> {
        if !host.is_target_addressable(&self.target) {
            return None;
        }
        let held = self
            .button
            .resolve(ctx.settings)
            .is_some_and(|id| ctx.buttons.is_on(id));
        if !held {
            return None;
        }
        let set = usize::try_from(ctx.settings.value(&self.set_setting).unwrap_or(0)).ok()?;
        (ctx.catalog.target_at(self.control, set) == Some(resolved)).then(|| self.target.clone())
    }
}

/// All overrides, keyed by control. Rules are tried in declaration order and
/// the first match wins.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    name_changes: HashMap<ControlId, Vec<NameChange>>,
    math: HashMap<ControlId, Vec<MathRule>>,
    sync_rate: Option<SyncRate>,
}

impl Overrides {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_name_change(&mut self, control: ControlId, change: NameChange) {
        self.name_changes.entry(control).or_default().push(change);
    }

    pub fn add_math(&mut self, control: ControlId, rule: MathRule) {
        self.math.entry(control).or_default().push(rule);
    }

    pub fn set_sync_rate(&mut self, sync_rate: Option<SyncRate>) {
        self.sync_rate = sync_rate;
    }

    /// First matching name change for the resolved target, if any
    pub fn rename(&self, control: ControlId, resolved: &str, ctx: &EvalContext<'_>) -> Option<TargetName> {
        self.name_changes
            .get(&control)?
            .iter()
            .find(|c| c.target == resolved && c.when.holds(ctx))
            .and_then(|c| c.new_name.resolve(ctx))
    }

    /// Value from the first matching math rule, if any
    pub fn math(&self, control: ControlId, target: &str, raw: u8, ctx: &EvalContext<'_>) -> Option<f64> {
        self.math
            .get(&control)?
            .iter()
            .find(|r| r.target == target && r.when.holds(ctx))
            .map(|r| r.transform.apply(raw))
    }

    pub fn sync_rename(&self, resolved: &str, ctx: &EvalContext<'_>, host: &dyn Host) -> Option<TargetName> {
        self.sync_rate.as_ref()?.rename(resolved, ctx, host)
    }
}

//! Engine construction from configuration

use anyhow::{bail, Result};
use std::sync::Arc;
use tracing::{debug, info};

use super::{
    ButtonRange, ControlId, Engine, EngineOptions, MathRule, Modifier, NameChange, Overrides,
    SyncRate, ToggleGroup, TriggerSpec,
};
use crate::catalog::Catalog;
use crate::config::{AppConfig, ModifierConfig};
use crate::host::{Host, HostSettings};

/// Setting key of the generated selector for mapping-set `set`
pub fn selector_key(set: usize) -> String {
    format!("Set {} button", set)
}

/// Button ranges from the surface section plus every catalog button not
/// already covered
pub fn declared_buttons(config: &AppConfig, catalog: &Catalog) -> Vec<ButtonRange> {
    let channel = config.surface.channel;
    let mut ranges: Vec<ButtonRange> = config
        .surface
        .buttons
        .iter()
        .map(|r| r.resolve(channel))
        .collect();

    for id in catalog.buttons() {
        if !ranges.iter().any(|r| r.contains(id)) {
            ranges.push(ButtonRange::single(id));
        }
    }
    ranges
}

/// Live settings: configured values and the selector button list (every
/// declared button unless listed explicitly)
pub fn build_settings(config: &AppConfig, catalog: &Catalog) -> HostSettings {
    let channel = config.surface.channel;
    let buttons: Vec<ControlId> = match &config.settings.button_list {
        Some(list) => list.iter().map(|c| c.resolve(channel)).collect(),
        None => declared_buttons(config, catalog)
            .iter()
            .flat_map(|r| r.ids().collect::<Vec<_>>())
            .collect(),
    };
    HostSettings::new(config.settings.values.clone(), buttons)
}

impl Engine {
    /// Wire an engine from a validated configuration and its catalog
    pub fn from_config(config: &AppConfig, catalog: Catalog, host: Arc<dyn Host>) -> Result<Self> {
        let channel = config.surface.channel;

        let toggle_groups = config
            .toggle_groups
            .iter()
            .map(|group| ToggleGroup::new(group.iter().map(|c| c.resolve(channel))))
            .collect();

        let options = EngineOptions {
            buttons: declared_buttons(config, &catalog),
            toggle_groups,
            external_indicator: config.surface.external_indicator,
            buttons_dispatch: config.surface.buttons_dispatch,
            also_forward_raw: config.surface.also_forward_raw,
        };

        for (idx, group) in options.toggle_groups.iter().enumerate() {
            if let Some(id) = group
                .members()
                .iter()
                .find(|id| !options.buttons.iter().any(|r| r.contains(**id)))
            {
                bail!("Toggle group {} lists {} which is not a declared button", idx, id);
            }
        }

        let mut modifiers: Vec<Modifier> = config
            .modifiers
            .iter()
            .map(|m| build_modifier(m, channel, &catalog))
            .collect();
        for (idx, modifier) in modifiers.iter().enumerate() {
            check_modifier(idx, modifier, &options.buttons, &catalog)?;
        }

        if let Some(layout) = config.layout.as_ref().filter(|l| l.selector_modifiers) {
            let affects = catalog.continuous_controls();
            for set in 1..=layout.mapping_sets {
                modifiers.push(Modifier::new(
                    TriggerSpec::Selected {
                        key: selector_key(set),
                    },
                    set,
                    affects.clone(),
                ));
            }
        }

        let overrides = build_overrides(config);
        let settings = build_settings(config, &catalog);

        info!(
            "Engine configured: {} modifiers, {} button ranges, {} toggle groups",
            modifiers.len(),
            options.buttons.len(),
            options.toggle_groups.len()
        );

        Ok(Engine::new(catalog, options, host)
            .with_modifiers(modifiers)
            .with_overrides(overrides)
            .with_settings(settings))
    }
}

/// A fixed trigger must be a declared button, or it could never fire, and
/// the pushed set must exist in the catalog. Affected controls without a
/// catalog entry are tolerated and skipped at activation.
fn check_modifier(idx: usize, modifier: &Modifier, buttons: &[ButtonRange], catalog: &Catalog) -> Result<()> {
    if let TriggerSpec::Fixed(id) = modifier.trigger {
        if !buttons.iter().any(|r| r.contains(id)) {
            bail!("Modifier {} is triggered by {} which is not a declared button", idx, id);
        }
    }
    if modifier.active_set >= catalog.mapping_sets() {
        bail!(
            "Modifier {} selects mapping-set {} but the catalog only has sets 0-{}",
            idx,
            modifier.active_set,
            catalog.mapping_sets().saturating_sub(1)
        );
    }
    Ok(())
}

fn build_modifier(config: &ModifierConfig, channel: u8, catalog: &Catalog) -> Modifier {
    let trigger = config.trigger.to_spec(channel);

    let affects = match &config.affects {
        Some(list) => list.iter().map(|c| c.resolve(channel)).collect(),
        None => strip_controls(&trigger, catalog),
    };
    debug!("Modifier {:?} → set {} affects {} controls", trigger, config.set, affects.len());

    Modifier::new(trigger, config.set, affects)
        .with_default_set(config.default_set)
        .with_revert(config.revert)
}

/// Continuous controls sharing the trigger's strip. A selector trigger has
/// no fixed strip, so it affects every continuous control.
fn strip_controls(trigger: &TriggerSpec, catalog: &Catalog) -> Vec<ControlId> {
    let continuous = catalog.continuous_controls();
    match trigger {
        TriggerSpec::Fixed(button) => continuous
            .into_iter()
            .filter(|id| id.channel == button.channel && id.strip() == button.strip())
            .collect(),
        TriggerSpec::Selected { .. } => continuous,
    }
}

fn build_overrides(config: &AppConfig) -> Overrides {
    let channel = config.surface.channel;
    let mut overrides = Overrides::new();

    for change in &config.overrides.name_changes {
        overrides.add_name_change(
            change.control.resolve(channel),
            NameChange {
                target: change.target.clone(),
                when: change
                    .when
                    .as_ref()
                    .map(|w| w.to_condition(channel))
                    .unwrap_or_default(),
                new_name: change.new_name.to_new_name(channel),
            },
        );
    }

    for rule in &config.overrides.math {
        overrides.add_math(
            rule.control.resolve(channel),
            MathRule {
                target: rule.target.clone(),
                when: rule
                    .when
                    .as_ref()
                    .map(|w| w.to_condition(channel))
                    .unwrap_or_default(),
                transform: rule.transform,
            },
        );
    }

    overrides.set_sync_rate(config.sync_rate.as_ref().map(|s| SyncRate {
        button: s.button.to_spec(channel),
        control: s.control.resolve(channel),
        set_setting: s.set_setting.clone(),
        target: s.target.clone(),
    }));

    overrides
}

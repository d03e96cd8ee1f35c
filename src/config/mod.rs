//! Configuration management for Surface Remap
//!
//! Handles loading, parsing, validation and hot-reloading of YAML
//! configuration files.

pub mod watcher;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::fs;

use crate::catalog::ControlKind;
use crate::engine::{
    ButtonRange, Condition, ControlId, NewName, RevertPolicy, TriggerSpec, ValueTransform,
};

pub use watcher::{ConfigWatcher, LiveUpdate};

/// Root configuration structure
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default)]
    pub midi: MidiConfig,
    #[serde(default)]
    pub surface: SurfaceConfig,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub layout: Option<LayoutConfig>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub controls: Vec<ControlConfig>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub modifiers: Vec<ModifierConfig>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub toggle_groups: Vec<Vec<ControlRef>>,
    #[serde(default)]
    pub overrides: OverridesConfig,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sync_rate: Option<SyncRateConfig>,
    #[serde(default)]
    pub settings: SettingsConfig,
    #[serde(default)]
    pub host: HostConfig,
}

/// MIDI port configuration. Port names are matched by substring.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct MidiConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_port: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_port: Option<String>,
}

/// Physical surface behavior
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SurfaceConfig {
    /// Default MIDI channel (1-16) for controls given as a bare CC number
    #[serde(default = "default_channel")]
    pub channel: u8,
    /// CC ranges that are buttons
    #[serde(default)]
    pub buttons: Vec<ButtonRangeConfig>,
    /// Button state follows external lights (press pulses only)
    #[serde(default)]
    pub external_indicator: bool,
    /// Buttons are also routed to their own mapped target
    #[serde(default = "default_true")]
    pub buttons_dispatch: bool,
    /// Re-emit every mapped CC raw as well
    #[serde(default = "default_true")]
    pub also_forward_raw: bool,
}

impl Default for SurfaceConfig {
    fn default() -> Self {
        Self {
            channel: default_channel(),
            buttons: Vec::new(),
            external_indicator: false,
            buttons_dispatch: true,
            also_forward_raw: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ButtonRangeConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel: Option<u8>,
    pub first: u8,
    pub last: u8,
}

impl ButtonRangeConfig {
    pub fn resolve(&self, default_channel: u8) -> ButtonRange {
        ButtonRange::new(self.channel.unwrap_or(default_channel), self.first, self.last)
    }
}

/// A control given either as a bare CC number or with an explicit channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum ControlRef {
    Cc(u8),
    Full {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        channel: Option<u8>,
        cc: u8,
    },
}

impl ControlRef {
    pub fn resolve(&self, default_channel: u8) -> ControlId {
        match *self {
            ControlRef::Cc(cc) => ControlId::new(default_channel, cc),
            ControlRef::Full { channel, cc } => ControlId::new(channel.unwrap_or(default_channel), cc),
        }
    }
}

/// Declarative catalog generation
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LayoutConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel: Option<u8>,
    /// Number of alternate mapping-sets on top of the default one
    #[serde(default)]
    pub mapping_sets: usize,
    pub groups: Vec<GroupConfig>,
    /// Generate one "Set N button" selector modifier per mapping-set
    #[serde(default)]
    pub selector_modifiers: bool,
}

/// A row of identical controls on consecutive CC numbers
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GroupConfig {
    pub name: String,
    pub kind: ControlKind,
    pub first_cc: u8,
    pub count: u8,
    /// Buttons only: whether the group gets its own target names
    #[serde(default)]
    pub mappable: bool,
}

impl GroupConfig {
    pub fn control(&self, channel: u8, index: u8) -> ControlId {
        ControlId::new(channel, self.first_cc + index)
    }
}

/// Explicit catalog entry, replacing any generated one for the control
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ControlConfig {
    pub control: ControlRef,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    pub kind: ControlKind,
    /// Target names indexed by mapping-set; "" means none
    pub targets: Vec<String>,
}

/// Button selecting a modifier: fixed, or chosen by a setting
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum TriggerConfig {
    Selected { selected: String },
    Control(ControlRef),
}

impl TriggerConfig {
    pub fn to_spec(&self, default_channel: u8) -> TriggerSpec {
        match self {
            TriggerConfig::Selected { selected } => TriggerSpec::Selected {
                key: selected.clone(),
            },
            TriggerConfig::Control(control) => TriggerSpec::Fixed(control.resolve(default_channel)),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ModifierConfig {
    pub trigger: TriggerConfig,
    /// Mapping-set pushed while the trigger is on
    pub set: usize,
    #[serde(default)]
    pub default_set: usize,
    /// Affected controls; when absent, the continuous controls of the
    /// trigger's strip
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub affects: Option<Vec<ControlRef>>,
    #[serde(default)]
    pub revert: RevertPolicy,
}

/// Override predicate. At most one of `button_on`, `button_off` or
/// `setting` is used, in that order; none means always.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ConditionConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub button_on: Option<TriggerConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub button_off: Option<TriggerConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub setting: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub equals: Option<i64>,
}

impl ConditionConfig {
    pub fn to_condition(&self, default_channel: u8) -> Condition {
        if let Some(trigger) = &self.button_on {
            Condition::ButtonOn(trigger.to_spec(default_channel))
        } else if let Some(trigger) = &self.button_off {
            Condition::ButtonOff(trigger.to_spec(default_channel))
        } else if let (Some(key), Some(value)) = (&self.setting, self.equals) {
            Condition::SettingEquals {
                key: key.clone(),
                value,
            }
        } else {
            Condition::Always
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(untagged)]
pub enum NewNameConfig {
    Fixed(String),
    CatalogAt { control: ControlRef, set_setting: String },
}

impl NewNameConfig {
    pub fn to_new_name(&self, default_channel: u8) -> NewName {
        match self {
            NewNameConfig::Fixed(name) => NewName::Fixed(name.clone()),
            NewNameConfig::CatalogAt {
                control,
                set_setting,
            } => NewName::CatalogAt {
                control: control.resolve(default_channel),
                set_setting: set_setting.clone(),
            },
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NameChangeConfig {
    pub control: ControlRef,
    pub target: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub when: Option<ConditionConfig>,
    pub new_name: NewNameConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MathConfig {
    pub control: ControlRef,
    pub target: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub when: Option<ConditionConfig>,
    pub transform: ValueTransform,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct OverridesConfig {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub name_changes: Vec<NameChangeConfig>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub math: Vec<MathConfig>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SyncRateConfig {
    pub button: TriggerConfig,
    pub control: ControlRef,
    pub set_setting: String,
    pub target: String,
}

/// Live host settings
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct SettingsConfig {
    #[serde(default)]
    pub values: HashMap<String, i64>,
    /// Buttons offered by selector menus (index 0 is "Unassigned").
    /// Defaults to every declared button.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub button_list: Option<Vec<ControlRef>>,
}

/// Which target names the console host accepts
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HostConfig {
    #[serde(default)]
    pub targets: Vec<String>,
    #[serde(default = "default_true")]
    pub all_catalog_targets: bool,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            targets: Vec::new(),
            all_catalog_targets: true,
        }
    }
}

impl AppConfig {
    /// Load configuration from file with validation
    pub async fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read config file: {}", path))?;

        let config = Self::from_yaml(&contents)
            .with_context(|| format!("Invalid config file: {}", path))?;

        Ok(config)
    }

    /// Parse and validate YAML text
    pub fn from_yaml(contents: &str) -> Result<Self> {
        let config: AppConfig =
            serde_yaml::from_str(contents).context("Failed to parse YAML config")?;

        config.validate()?;

        Ok(config)
    }

    /// Save configuration to file
    pub async fn save(&self, path: &str) -> Result<()> {
        let yaml = serde_yaml::to_string(self).context("Failed to serialize config to YAML")?;

        fs::write(path, yaml)
            .await
            .with_context(|| format!("Failed to write config file: {}", path))?;

        Ok(())
    }

    /// Validate configuration for correctness and consistency
    pub fn validate(&self) -> Result<()> {
        let channel = self.surface.channel;
        check_channel(channel).context("Invalid surface channel")?;

        for range in &self.surface.buttons {
            if let Some(ch) = range.channel {
                check_channel(ch).context("Invalid button range channel")?;
            }
            if range.first > range.last || range.last > 127 {
                bail!("Button range {}-{} is invalid", range.first, range.last);
            }
        }

        if let Some(layout) = &self.layout {
            if let Some(ch) = layout.channel {
                check_channel(ch).context("Invalid layout channel")?;
            }
            for group in &layout.groups {
                if group.name.is_empty() {
                    bail!("Layout group name cannot be empty");
                }
                if group.count == 0 || u16::from(group.first_cc) + u16::from(group.count) > 128 {
                    bail!(
                        "Layout group '{}' does not fit in CC 0-127 (first_cc {}, count {})",
                        group.name,
                        group.first_cc,
                        group.count
                    );
                }
            }
        }

        if self.layout.is_none() && self.controls.is_empty() {
            bail!("Configuration declares no controls (add a 'layout' or 'controls' section)");
        }

        for (idx, control) in self.controls.iter().enumerate() {
            check_control(&control.control)
                .with_context(|| format!("Invalid control entry {}", idx))?;
            if control.targets.is_empty() {
                bail!("Control entry {} must list at least one target", idx);
            }
        }

        for (idx, modifier) in self.modifiers.iter().enumerate() {
            check_trigger(&modifier.trigger).with_context(|| format!("Invalid modifier {}", idx))?;
            if modifier.set == 0 {
                bail!("Modifier {} must select a mapping-set >= 1 (0 is the default page)", idx);
            }
            for control in modifier.affects.iter().flatten() {
                check_control(control).with_context(|| format!("Invalid modifier {}", idx))?;
            }
        }

        for (idx, group) in self.toggle_groups.iter().enumerate() {
            if group.len() < 2 {
                bail!("Toggle group {} needs at least two buttons", idx);
            }
            for control in group {
                check_control(control).with_context(|| format!("Invalid toggle group {}", idx))?;
            }
        }

        for change in &self.overrides.name_changes {
            check_control(&change.control)
                .with_context(|| format!("Invalid name change for '{}'", change.target))?;
            if let Some(when) = &change.when {
                check_condition(when)
                    .with_context(|| format!("Invalid name change for '{}'", change.target))?;
            }
        }

        for rule in &self.overrides.math {
            check_control(&rule.control)
                .with_context(|| format!("Invalid math rule for '{}'", rule.target))?;
            if let Some(when) = &rule.when {
                check_condition(when)
                    .with_context(|| format!("Invalid math rule for '{}'", rule.target))?;
            }
        }

        if let Some(sync) = &self.sync_rate {
            check_trigger(&sync.button).context("Invalid sync_rate button")?;
            check_control(&sync.control).context("Invalid sync_rate control")?;
            if sync.target.is_empty() {
                bail!("sync_rate target cannot be empty");
            }
        }

        for control in self.settings.button_list.iter().flatten() {
            check_control(control).context("Invalid settings button_list")?;
        }

        Ok(())
    }
}

fn check_channel(channel: u8) -> Result<()> {
    if channel == 0 || channel > 16 {
        bail!("MIDI channel {} is invalid (must be 1-16)", channel);
    }
    Ok(())
}

fn check_control(control: &ControlRef) -> Result<()> {
    let (channel, cc) = match *control {
        ControlRef::Cc(cc) => (None, cc),
        ControlRef::Full { channel, cc } => (channel, cc),
    };
    if let Some(channel) = channel {
        check_channel(channel)?;
    }
    if cc > 127 {
        bail!("CC number {} is invalid (must be 0-127)", cc);
    }
    Ok(())
}

fn check_trigger(trigger: &TriggerConfig) -> Result<()> {
    match trigger {
        TriggerConfig::Selected { selected } if selected.is_empty() => {
            bail!("Trigger setting name cannot be empty")
        }
        TriggerConfig::Selected { .. } => Ok(()),
        TriggerConfig::Control(control) => check_control(control),
    }
}

fn check_condition(condition: &ConditionConfig) -> Result<()> {
    if condition.setting.is_some() != condition.equals.is_some() {
        bail!("Condition 'setting' and 'equals' must be given together");
    }
    if let Some(trigger) = condition.button_on.as_ref().or(condition.button_off.as_ref()) {
        check_trigger(trigger)?;
    }
    Ok(())
}

// Default value functions
fn default_true() -> bool { true }
fn default_channel() -> u8 { 1 }

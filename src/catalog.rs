//! Catalog of candidate targets per control and mapping-set
//!
//! The catalog is static: it is built once at startup, either generated from
//! a declarative layout (groups of knobs, faders and buttons) or listed
//! explicitly in the configuration, and read-only afterwards.

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use tracing::info;

use crate::config::{AppConfig, GroupConfig, LayoutConfig};
use crate::engine::{ControlId, MappingSet, TargetName};

/// Physical control type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ControlKind {
    Knob,
    Fader,
    Button,
}

impl ControlKind {
    pub fn is_continuous(self) -> bool {
        !matches!(self, ControlKind::Button)
    }
}

/// Candidate targets of one control, indexed by mapping-set.
/// `None` means "no mapping in this set".
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CatalogEntry {
    pub label: String,
    pub kind: ControlKind,
    pub targets: Vec<Option<TargetName>>,
}

impl CatalogEntry {
    pub fn new(label: impl Into<String>, kind: ControlKind, targets: Vec<Option<TargetName>>) -> Self {
        Self {
            label: label.into(),
            kind,
            targets,
        }
    }

    /// Build from plain names, treating empty strings as absent
    pub fn from_names<I, S>(label: impl Into<String>, kind: ControlKind, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let targets = names
            .into_iter()
            .map(Into::into)
            .map(|name: String| if name.is_empty() { None } else { Some(name) })
            .collect();
        Self::new(label, kind, targets)
    }

    pub fn target_at(&self, set: MappingSet) -> Option<&str> {
        self.targets.get(set).and_then(|t| t.as_deref())
    }
}

/// Candidate targets per control
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Catalog {
    entries: BTreeMap<ControlId, CatalogEntry>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace the entry of a control
    pub fn insert(&mut self, id: ControlId, entry: CatalogEntry) {
        self.entries.insert(id, entry);
    }

    pub fn get(&self, id: ControlId) -> Option<&CatalogEntry> {
        self.entries.get(&id)
    }

    pub fn contains(&self, id: ControlId) -> bool {
        self.entries.contains_key(&id)
    }

    /// Ordered candidate targets of a control, indexed by mapping-set
    pub fn candidate_targets(&self, id: ControlId) -> Option<&[Option<TargetName>]> {
        self.entries.get(&id).map(|e| e.targets.as_slice())
    }

    pub fn target_at(&self, id: ControlId, set: MappingSet) -> Option<&str> {
        self.entries.get(&id).and_then(|e| e.target_at(set))
    }

    /// Human readable label, e.g. "Fader1 (31)"
    pub fn label(&self, id: ControlId) -> String {
        self.entries
            .get(&id)
            .map(|e| e.label.clone())
            .unwrap_or_else(|| id.to_string())
    }

    pub fn controls(&self) -> impl Iterator<Item = (ControlId, &CatalogEntry)> + '_ {
        self.entries.iter().map(|(id, entry)| (*id, entry))
    }

    /// Continuous controls (knobs and faders) in control order
    pub fn continuous_controls(&self) -> Vec<ControlId> {
        self.controls()
            .filter(|(_, e)| e.kind.is_continuous())
            .map(|(id, _)| id)
            .collect()
    }

    /// Declared buttons in control order
    pub fn buttons(&self) -> Vec<ControlId> {
        self.controls()
            .filter(|(_, e)| e.kind == ControlKind::Button)
            .map(|(id, _)| id)
            .collect()
    }

    /// Highest mapping-set count of any control
    pub fn mapping_sets(&self) -> usize {
        self.entries.values().map(|e| e.targets.len()).max().unwrap_or(0)
    }

    /// Every distinct target name, set by set, in control order
    pub fn target_names(&self) -> Vec<TargetName> {
        let mut seen = HashSet::new();
        let mut names = Vec::new();
        for set in 0..self.mapping_sets() {
            for entry in self.entries.values() {
                if let Some(name) = entry.target_at(set) {
                    if seen.insert(name.to_string()) {
                        names.push(name.to_string());
                    }
                }
            }
        }
        names
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Build the catalog described by a configuration: the generated layout
    /// first, then explicit control entries replacing generated ones
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let default_channel = config.surface.channel;
        let mut catalog = match &config.layout {
            Some(layout) => CatalogBuilder::from_layout(layout, default_channel).build(),
            None => Catalog::new(),
        };

        for entry in &config.controls {
            let id = entry.control.resolve(default_channel);
            let label = entry
                .label
                .clone()
                .unwrap_or_else(|| format!("Control ({})", id.cc));
            catalog.insert(id, CatalogEntry::from_names(label, entry.kind, entry.targets.clone()));
        }

        if catalog.is_empty() {
            bail!("Configuration declares no controls (add a 'layout' or 'controls' section)");
        }

        info!(
            "Catalog built: {} controls, {} mapping sets, {} targets",
            catalog.len(),
            catalog.mapping_sets(),
            catalog.target_names().len()
        );
        Ok(catalog)
    }
}

/// Generates catalog entries from groups of identical controls.
///
/// Target names carry a running parameter number so that they stay unique:
/// set 0 interleaves the continuous groups strip by strip ("1: Knob1",
/// "2: Fader1", "3: Knob2", ...), mappable button groups follow, then every
/// alternate set repeats the continuous groups.
pub struct CatalogBuilder {
    channel: u8,
    mapping_sets: usize,
    groups: Vec<GroupConfig>,
}

impl CatalogBuilder {
    pub fn new(channel: u8, mapping_sets: usize) -> Self {
        Self {
            channel,
            mapping_sets,
            groups: Vec::new(),
        }
    }

    pub fn from_layout(layout: &LayoutConfig, default_channel: u8) -> Self {
        let mut builder = Self::new(layout.channel.unwrap_or(default_channel), layout.mapping_sets);
        for group in &layout.groups {
            builder = builder.group(group.clone());
        }
        builder
    }

    pub fn group(mut self, group: GroupConfig) -> Self {
        self.groups.push(group);
        self
    }

    pub fn build(self) -> Catalog {
        let mut targets: BTreeMap<ControlId, Vec<Option<TargetName>>> = BTreeMap::new();
        let mut parameter_number = 1usize;

        let strips = self
            .groups
            .iter()
            .filter(|g| g.kind.is_continuous())
            .map(|g| g.count)
            .max()
            .unwrap_or(0);

        let push_continuous_set = |targets: &mut BTreeMap<ControlId, Vec<Option<TargetName>>>,
                                       number: &mut usize| {
            for index in 0..strips {
                for group in self.groups.iter().filter(|g| g.kind.is_continuous()) {
                    if index < group.count {
                        let name = format!("{}: {}{}", number, group.name, index + 1);
                        *number += 1;
                        targets
                            .entry(group.control(self.channel, index))
                            .or_default()
                            .push(Some(name));
                    }
                }
            }
        };

        push_continuous_set(&mut targets, &mut parameter_number);

        for group in self.groups.iter().filter(|g| !g.kind.is_continuous()) {
            for index in 0..group.count {
                let slot = targets.entry(group.control(self.channel, index)).or_default();
                if group.mappable {
                    slot.push(Some(format!("{}: {}{}", parameter_number, group.name, index + 1)));
                    parameter_number += 1;
                }
            }
        }

        for _ in 1..=self.mapping_sets {
            push_continuous_set(&mut targets, &mut parameter_number);
        }

        let mut catalog = Catalog::new();
        for group in &self.groups {
            for index in 0..group.count {
                let id = group.control(self.channel, index);
                let label = format!("{}{} ({})", group.name, index + 1, id.cc);
                let names = targets.remove(&id).unwrap_or_default();
                catalog.insert(id, CatalogEntry::new(label, group.kind, names));
            }
        }
        catalog
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn group(name: &str, kind: ControlKind, first_cc: u8, mappable: bool) -> GroupConfig {
        GroupConfig {
            name: name.to_string(),
            kind,
            first_cc,
            count: 8,
            mappable,
        }
    }

    fn nano_layout(sets: usize) -> Catalog {
        CatalogBuilder::new(1, sets)
            .group(group("Knob", ControlKind::Knob, 21, false))
            .group(group("Fader", ControlKind::Fader, 31, false))
            .group(group("Solo", ControlKind::Button, 41, true))
            .group(group("Mute", ControlKind::Button, 51, false))
            .build()
    }

    #[test]
    fn test_layout_numbering() {
        let catalog = nano_layout(2);
        let knob1 = ControlId::new(1, 21);
        let fader1 = ControlId::new(1, 31);
        let fader8 = ControlId::new(1, 38);

        assert_eq!(catalog.target_at(knob1, 0), Some("1: Knob1"));
        assert_eq!(catalog.target_at(fader1, 0), Some("2: Fader1"));
        assert_eq!(catalog.target_at(fader8, 0), Some("16: Fader8"));
        // Solo parameters come right after the default page
        assert_eq!(catalog.target_at(ControlId::new(1, 41), 0), Some("17: Solo1"));
        // First alternate set starts after the 8 solo parameters
        assert_eq!(catalog.target_at(knob1, 1), Some("25: Knob1"));
        assert_eq!(catalog.target_at(fader1, 2), Some("42: Fader1"));
        assert_eq!(catalog.candidate_targets(fader1).unwrap().len(), 3);
    }

    #[test]
    fn test_no_substring_confusion() {
        // Ten knobs: "Knob1" must never pick up "Knob10"
        let catalog = CatalogBuilder::new(1, 1)
            .group(GroupConfig {
                name: "Knob".to_string(),
                kind: ControlKind::Knob,
                first_cc: 20,
                count: 10,
                mappable: false,
            })
            .build();

        assert_eq!(catalog.target_at(ControlId::new(1, 20), 0), Some("1: Knob1"));
        assert_eq!(catalog.target_at(ControlId::new(1, 29), 0), Some("10: Knob10"));
        assert_eq!(catalog.candidate_targets(ControlId::new(1, 20)).unwrap().len(), 2);
    }

    #[test]
    fn test_buttons_and_labels() {
        let catalog = nano_layout(0);
        let mute1 = ControlId::new(1, 51);

        assert_eq!(catalog.buttons().len(), 16);
        assert_eq!(catalog.continuous_controls().len(), 16);
        assert_eq!(catalog.label(ControlId::new(1, 31)), "Fader1 (31)");
        assert_eq!(catalog.label(mute1), "Mute1 (51)");
        // Non-mappable buttons are declared but have no targets
        assert!(catalog.contains(mute1));
        assert_eq!(catalog.target_at(mute1, 0), None);
        assert_eq!(catalog.label(ControlId::new(2, 5)), "ch2:cc5");
    }

    #[test]
    fn test_entry_from_names_treats_empty_as_absent() {
        let entry = CatalogEntry::from_names("Fader1 (31)", ControlKind::Fader, ["A", "", "C"]);

        assert_eq!(entry.target_at(0), Some("A"));
        assert_eq!(entry.target_at(1), None);
        assert_eq!(entry.target_at(2), Some("C"));
        assert_eq!(entry.target_at(3), None);
    }

    #[test]
    fn test_target_names_are_unique() {
        let mut catalog = Catalog::new();
        catalog.insert(
            ControlId::new(1, 21),
            CatalogEntry::from_names("Knob1 (21)", ControlKind::Knob, ["Cutoff", "Res"]),
        );
        catalog.insert(
            ControlId::new(1, 22),
            CatalogEntry::from_names("Knob2 (22)", ControlKind::Knob, ["Cutoff", "Drive"]),
        );

        assert_eq!(catalog.target_names(), vec!["Cutoff", "Res", "Drive"]);
    }
}

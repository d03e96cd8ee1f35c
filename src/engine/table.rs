//! Live association from physical control to its stack of assigned targets

use std::collections::HashMap;

use super::types::{ControlId, TargetName};

/// Per-control stack of target names. The last entry is the active target.
///
/// A stack that has been initialized never becomes empty: removing the last
/// entry pushes the fallback name back.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MappingTable {
    stacks: HashMap<ControlId, Vec<TargetName>>,
}

impl MappingTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Push a target, making it the active one. The caller has already
    /// checked that the host can address it.
    pub fn assign(&mut self, id: ControlId, target: impl Into<TargetName>) {
        self.stacks.entry(id).or_default().push(target.into());
    }

    /// Remove the most recent occurrence of `target`, restoring `fallback`
    /// if nothing is left. Returns the new active target.
    ///
    /// Earlier occurrences of the same name belong to earlier assignments
    /// and are kept.
    pub fn unassign(&mut self, id: ControlId, target: &str, fallback: &str) -> Option<&str> {
        let stack = self.stacks.entry(id).or_default();
        if let Some(pos) = stack.iter().rposition(|name| name == target) {
            stack.remove(pos);
        }
        if stack.is_empty() {
            stack.push(fallback.to_string());
        }
        stack.last().map(String::as_str)
    }

    /// Move `target` to the top of the stack, pushing it if absent
    pub fn promote(&mut self, id: ControlId, target: &str) {
        let stack = self.stacks.entry(id).or_default();
        if let Some(pos) = stack.iter().rposition(|name| name == target) {
            stack.remove(pos);
        }
        stack.push(target.to_string());
    }

    /// Active target, or `None` if the control was never initialized
    pub fn current_target(&self, id: ControlId) -> Option<&str> {
        self.stacks
            .get(&id)
            .and_then(|stack| stack.last())
            .map(String::as_str)
    }

    pub fn stack(&self, id: ControlId) -> Option<&[TargetName]> {
        self.stacks.get(&id).map(Vec::as_slice)
    }

    pub fn is_initialized(&self, id: ControlId) -> bool {
        self.stacks.contains_key(&id)
    }

    pub fn clear(&mut self) {
        self.stacks.clear();
    }

    pub fn len(&self) -> usize {
        self.stacks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stacks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FADER: ControlId = ControlId::new(1, 31);

    #[test]
    fn test_uninitialized_control_has_no_target() {
        let table = MappingTable::new();
        assert_eq!(table.current_target(FADER), None);
        assert!(!table.is_initialized(FADER));
    }

    #[test]
    fn test_most_recent_assignment_wins() {
        let mut table = MappingTable::new();
        table.assign(FADER, "Default");
        table.assign(FADER, "Alt");

        assert_eq!(table.current_target(FADER), Some("Alt"));
        assert_eq!(table.stack(FADER).unwrap(), ["Default", "Alt"]);
    }

    #[test]
    fn test_unassign_restores_previous() {
        let mut table = MappingTable::new();
        table.assign(FADER, "Default");
        table.assign(FADER, "A");
        table.assign(FADER, "B");

        assert_eq!(table.unassign(FADER, "A", "Default"), Some("B"));
        assert_eq!(table.stack(FADER).unwrap(), ["Default", "B"]);
    }

    #[test]
    fn test_unassign_never_leaves_empty_stack() {
        let mut table = MappingTable::new();
        table.assign(FADER, "Only");

        assert_eq!(table.unassign(FADER, "Only", "Default"), Some("Default"));
        assert_eq!(table.stack(FADER).unwrap(), ["Default"]);
    }

    #[test]
    fn test_round_trip_restores_exact_stack() {
        let mut table = MappingTable::new();
        table.assign(FADER, "Default");
        table.assign(FADER, "X");
        table.assign(FADER, "Y");
        let before = table.clone();

        table.assign(FADER, "X");
        table.unassign(FADER, "X", "Default");

        assert_eq!(table, before);
        assert_eq!(table.stack(FADER).unwrap(), ["Default", "X", "Y"]);
    }

    #[test]
    fn test_unassign_missing_name_is_harmless() {
        let mut table = MappingTable::new();
        table.assign(FADER, "Default");

        assert_eq!(table.unassign(FADER, "Ghost", "Default"), Some("Default"));
        assert_eq!(table.stack(FADER).unwrap(), ["Default"]);
    }

    #[test]
    fn test_promote_moves_to_top() {
        let mut table = MappingTable::new();
        table.assign(FADER, "Default");
        table.assign(FADER, "A");
        table.assign(FADER, "B");

        table.promote(FADER, "A");
        assert_eq!(table.stack(FADER).unwrap(), ["Default", "B", "A"]);

        table.promote(FADER, "C");
        assert_eq!(table.current_target(FADER), Some("C"));
    }
}

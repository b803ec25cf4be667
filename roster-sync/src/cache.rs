//! Per-viewer record of what has been sent, and the diff against it.

use std::collections::{HashMap, HashSet};

use uuid::Uuid;

use crate::entry::PresenceEntry;

/// Synthetic rows one viewer currently has.
///
/// `tracked` is the authoritative set of identities the viewer holds;
/// `sent` keeps the last row sent for each of them so the next refresh can
/// tell an unchanged row from a changed one.
#[derive(Debug, Default)]
pub struct ViewerRoster {
    tracked: HashSet<Uuid>,
    sent: HashMap<Uuid, PresenceEntry>,
}

impl ViewerRoster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, identity: &Uuid) -> bool {
        self.tracked.contains(identity)
    }

    pub fn get(&self, identity: &Uuid) -> Option<&PresenceEntry> {
        self.sent.get(identity)
    }

    pub fn len(&self) -> usize {
        self.tracked.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracked.is_empty()
    }

    pub fn identities(&self) -> impl Iterator<Item = &Uuid> {
        self.tracked.iter()
    }

    /// Record `entries` as the viewer's complete set of rows.
    pub fn replace(&mut self, entries: &[PresenceEntry]) {
        self.tracked.clear();
        self.sent.clear();
        for entry in entries {
            self.tracked.insert(entry.identity());
            self.sent.insert(entry.identity(), entry.clone());
        }
    }

    /// Forget everything, returning the identities that were tracked.
    pub fn drain(&mut self) -> Vec<Uuid> {
        self.sent.clear();
        self.tracked.drain().collect()
    }
}

/// Operations taking a viewer from its recorded rows to a desired set.
///
/// `adds`, `updates` and `removes` are disjoint. `adds` and `updates` keep
/// the order of the desired rows.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RosterDiff {
    pub adds: Vec<PresenceEntry>,
    pub updates: Vec<PresenceEntry>,
    pub removes: Vec<Uuid>,
}

impl RosterDiff {
    pub fn between(current: &ViewerRoster, desired: &[PresenceEntry]) -> Self {
        let mut diff = Self::default();
        let mut wanted = HashSet::with_capacity(desired.len());

        for entry in desired {
            wanted.insert(entry.identity());
            match current.get(&entry.identity()) {
                None => diff.adds.push(entry.clone()),
                Some(previous) if previous != entry => diff.updates.push(entry.clone()),
                Some(_) => {}
            }
        }

        diff.removes = current
            .identities()
            .filter(|id| !wanted.contains(id))
            .copied()
            .collect();
        diff.removes.sort_unstable();
        diff
    }

    pub fn is_empty(&self) -> bool {
        self.adds.is_empty() && self.updates.is_empty() && self.removes.is_empty()
    }

    /// Packets this diff turns into.
    pub fn len(&self) -> usize {
        self.adds.len() + self.updates.len() + self.removes.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::markup::StyledLabel;

    fn row(id: Uuid, key: &str, text: &str) -> PresenceEntry {
        PresenceEntry::simple(id, key, StyledLabel::plain(text)).unwrap()
    }

    #[test]
    fn test_diff_from_empty_adds_everything() {
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let desired = vec![row(a, "~00", "A"), row(b, "~01", "B")];
        let diff = RosterDiff::between(&ViewerRoster::new(), &desired);

        assert_eq!(diff.adds, desired);
        assert!(diff.updates.is_empty());
        assert!(diff.removes.is_empty());
    }

    #[test]
    fn test_diff_unchanged_is_empty() {
        let a = Uuid::new_v4();
        let desired = vec![row(a, "~00", "A")];
        let mut roster = ViewerRoster::new();
        roster.replace(&desired);

        assert!(RosterDiff::between(&roster, &desired).is_empty());
    }

    #[test]
    fn test_diff_changed_label_is_update() {
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let mut roster = ViewerRoster::new();
        roster.replace(&[row(a, "~00", "A"), row(b, "~01", "B")]);

        let desired = vec![row(a, "~00", "A"), row(b, "~01", "C")];
        let diff = RosterDiff::between(&roster, &desired);
        assert!(diff.adds.is_empty());
        assert_eq!(diff.updates, vec![row(b, "~01", "C")]);
        assert!(diff.removes.is_empty());
        assert_eq!(diff.len(), 1);
    }

    #[test]
    fn test_diff_missing_is_remove() {
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let mut roster = ViewerRoster::new();
        roster.replace(&[row(a, "~00", "A"), row(b, "~01", "B")]);

        let diff = RosterDiff::between(&roster, &[row(a, "~00", "A")]);
        assert_eq!(diff.removes, vec![b]);
    }

    #[test]
    fn test_diff_to_empty_removes_everything() {
        let ids: Vec<Uuid> = (0..3).map(|_| Uuid::new_v4()).collect();
        let rows: Vec<PresenceEntry> = ids.iter().map(|id| row(*id, "~00", "x")).collect();
        let mut roster = ViewerRoster::new();
        roster.replace(&rows);

        let diff = RosterDiff::between(&roster, &[]);
        let mut expected = ids.clone();
        expected.sort_unstable();
        assert_eq!(diff.removes, expected);
    }

    #[test]
    fn test_roster_replace_and_drain() {
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let mut roster = ViewerRoster::new();
        roster.replace(&[row(a, "~00", "A"), row(b, "~01", "B")]);
        assert_eq!(roster.len(), 2);
        assert!(roster.contains(&a));
        assert_eq!(roster.get(&b).unwrap().label().plain_text(), "B");

        roster.replace(&[row(b, "~01", "B")]);
        assert!(!roster.contains(&a));
        assert!(roster.get(&a).is_none());

        let drained = roster.drain();
        assert_eq!(drained, vec![b]);
        assert!(roster.is_empty());
    }
}

use serde_json::Value;
use std::collections::BTreeMap;

use crate::domain::item::Item;
use crate::domain::person::PersonAssignment;

/// Persons added to and removed from an item since its snapshot.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PersonDiff {
    pub added: Vec<PersonAssignment>,
    pub removed: Vec<PersonAssignment>,
}

impl PersonDiff {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

/// Serialized fields of `current` that differ from `snapshot`, keyed by
/// wire name. The person list is diffed separately and the transient
/// edit flag never serializes, so neither appears here. Due dates are
/// date-only by type, so their serialization is already canonical.
pub fn changed_fields(
    current: &Item,
    snapshot: &Item,
) -> Result<BTreeMap<String, Value>, serde_json::Error> {
    let current = serde_json::to_value(current)?;
    let snapshot = serde_json::to_value(snapshot)?;

    let (Value::Object(current), Value::Object(snapshot)) = (current, snapshot) else {
        return Ok(BTreeMap::new());
    };

    let mut changed = BTreeMap::new();
    for (key, value) in current {
        if key == "persons" {
            continue;
        }
        if snapshot.get(&key) != Some(&value) {
            changed.insert(key, value);
        }
    }
    Ok(changed)
}

/// Set difference keyed on the `(email, role)` pair. Changing only a
/// person's display label shares the pair with the snapshot entry and
/// is therefore invisible to this diff.
pub fn changed_persons(
    current: &[PersonAssignment],
    snapshot: &[PersonAssignment],
) -> PersonDiff {
    let shares_pair = |list: &[PersonAssignment], person: &PersonAssignment| {
        list.iter()
            .any(|p| p.email == person.email && p.role == person.role)
    };

    PersonDiff {
        added: current
            .iter()
            .filter(|p| !shares_pair(snapshot, p))
            .cloned()
            .collect(),
        removed: snapshot
            .iter()
            .filter(|p| !shares_pair(current, p))
            .cloned()
            .collect(),
    }
}

use serde::{Deserialize, Serialize};

use crate::domain::item::Item;
use crate::domain::person::Role;

/// A named collection of TODO and COMPLETED items, owned by one user.
/// The viewer's resolved role is baked into the snapshot at load time.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Board {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub owner_email: Option<String>,
    #[serde(default)]
    pub todo: Vec<Item>,
    #[serde(default)]
    pub completed: Vec<Item>,
    pub viewer_role: Role,
}

/// Sidebar projection of a board.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BoardSummary {
    pub id: u64,
    pub name: String,
}

impl Board {
    /// Edit flags are transient; a board adopted from the cache or
    /// about to be persisted must not carry them.
    pub fn clear_edit_flags(&mut self) {
        for item in self.todo.iter_mut().chain(self.completed.iter_mut()) {
            item.edit_mode = false;
        }
    }

    pub fn summary(&self) -> BoardSummary {
        BoardSummary {
            id: self.id,
            name: self.name.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clear_edit_flags() {
        let mut board = Board {
            id: 1,
            name: "Sprint".to_string(),
            owner_email: None,
            todo: vec![Item::new(1, "a".to_string()), Item::new(2, "b".to_string())],
            completed: vec![Item::new(3, "c".to_string())],
            viewer_role: Role::Owner,
        };
        board.todo[0].edit_mode = true;
        board.completed[0].edit_mode = true;

        board.clear_edit_flags();
        assert!(board.todo.iter().all(|i| !i.edit_mode));
        assert!(board.completed.iter().all(|i| !i.edit_mode));
    }
}

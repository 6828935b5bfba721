use serde::{Deserialize, Serialize};
use std::fmt;

/// Viewer's relationship to a board, or a person's assignment on an
/// item. Assignments only ever carry Owner, Manager or Employee;
/// Viewer exists solely as a resolved role.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Role {
    Owner,
    Manager,
    Employee,
    Viewer,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Owner => write!(f, "Owner"),
            Role::Manager => write!(f, "Manager"),
            Role::Employee => write!(f, "Employee"),
            Role::Viewer => write!(f, "Viewer"),
        }
    }
}

/// One person assigned to an item. `display_role` is an optional label
/// shown instead of the role name; it carries no semantics.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PersonAssignment {
    pub email: String,
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_role: Option<String>,
}

impl PersonAssignment {
    pub fn new(email: impl Into<String>, role: Role) -> Self {
        Self {
            email: email.into(),
            role,
            display_role: None,
        }
    }
}

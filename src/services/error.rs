use thiserror::Error;

use crate::domain::person::Role;

/// Error taxonomy for the client. Every failure is terminal for the
/// user action that caused it; nothing here is retried automatically.
#[derive(Error, Debug)]
pub enum PlankError {
    #[error("no stored session, login required")]
    AuthRequired,

    #[error("session expired or unauthorized")]
    SessionExpired,

    #[error("file already exists on the server")]
    FileAlreadyExists,

    #[error("a {role} is already assigned to this task on the server")]
    RoleConflict { role: Role },

    #[error("only the board owner can modify this field")]
    OwnerOnly,

    #[error("referenced user not found")]
    UserNotFound,

    #[error("invalid email address: {email}")]
    InvalidEmail { email: String },

    #[error("a {role} is already assigned to this item")]
    RoleTaken { role: Role },

    #[error("role {role} cannot be assigned to an item")]
    RoleNotAssignable { role: Role },

    #[error("no board is currently loaded")]
    NoBoard,

    #[error("no item at index {index} in the {list} list")]
    NoSuchItem { list: &'static str, index: usize },

    #[error("no edit in progress for item {item_id}")]
    NoEditInProgress { item_id: u64 },

    #[error("server rejected the request: code {code}, {message}")]
    Api { code: i64, message: String },

    #[error("request failed")]
    Transport(#[from] reqwest::Error),

    #[error(transparent)]
    Store(#[from] anyhow::Error),

    #[error("malformed payload")]
    Payload(#[from] serde_json::Error),
}

impl PlankError {
    /// User-facing message for each failure, mirrored from the alerts
    /// the board UI shows.
    pub fn user_message(&self) -> String {
        match self {
            PlankError::AuthRequired | PlankError::SessionExpired => {
                "Your session has expired. Please log in again.".to_string()
            }
            PlankError::FileAlreadyExists => "This file already exists.".to_string(),
            PlankError::RoleConflict { role } => format!(
                "This user is already assigned as a {} to this task.",
                role.to_string().to_lowercase()
            ),
            PlankError::OwnerOnly => "Only the owner can modify this field.".to_string(),
            PlankError::UserNotFound => {
                "One or more users were not found. Please check the email addresses and try again."
                    .to_string()
            }
            PlankError::InvalidEmail { .. } => {
                "Please enter a valid email address.".to_string()
            }
            PlankError::RoleTaken { role } => {
                format!("A {} is already assigned to this task.", role)
            }
            _ => "An error occurred while saving the item.".to_string(),
        }
    }
}

/// Maps the `error` string of a failed API response onto the taxonomy.
/// The strings are part of the remote contract.
pub fn classify_server_error(code: i64, error: &str) -> PlankError {
    match error {
        "File already exist" => PlankError::FileAlreadyExists,
        "User is already assigned as manager to a task" => PlankError::RoleConflict {
            role: Role::Manager,
        },
        "User is already assigned as employee to a task" => PlankError::RoleConflict {
            role: Role::Employee,
        },
        "Only for owner" => PlankError::OwnerOnly,
        "user not found" => PlankError::UserNotFound,
        other => PlankError::Api {
            code,
            message: other.to_string(),
        },
    }
}

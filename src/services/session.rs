use std::sync::Arc;
use tracing::debug;

use crate::repository::KvStore;
use crate::services::error::PlankError;

const TOKEN_KEY: &str = "token";
const EMAIL_KEY: &str = "userEmail";

/// The stored identity: bearer token plus the user's email. Written by
/// an external login flow; this crate only reads and clears it.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub token: String,
    pub user_email: String,
}

impl Session {
    /// Missing token or email means there is no session; the caller is
    /// expected to send the user to the login surface.
    pub async fn load(store: &Arc<dyn KvStore>) -> Result<Self, PlankError> {
        let token = store.get(TOKEN_KEY).await?;
        let user_email = store.get(EMAIL_KEY).await?;

        match (token, user_email) {
            (Some(token), Some(user_email)) => {
                debug!(user = %user_email, "session restored");
                Ok(Self { token, user_email })
            }
            _ => Err(PlankError::AuthRequired),
        }
    }

    pub async fn clear(store: &Arc<dyn KvStore>) -> Result<(), PlankError> {
        store.delete(TOKEN_KEY).await?;
        store.delete(EMAIL_KEY).await?;
        Ok(())
    }
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Represents a core user identity in the system
///
/// Users are created on first successful passkey registration or on first
/// login through an external identity provider; this module never deletes
/// them.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct User {
    /// Database-assigned sequence number (primary key)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sequence_number: Option<i64>,
    /// Unique user identifier
    pub id: String,
    /// Login identifier; for IdP-created users this is `{provider}_{subject}`
    pub username: String,
    /// Display name or user-friendly label
    pub display_name: String,
    /// Identity provider that created this user, if any
    pub provider: Option<String>,
    /// When the user account was created
    pub created_at: DateTime<Utc>,
    /// When the user account was last updated
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Create a new user
    pub fn new(id: String, username: String, display_name: String, provider: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            sequence_number: None,
            id,
            username,
            display_name,
            provider,
            created_at: now,
            updated_at: now,
        }
    }
}

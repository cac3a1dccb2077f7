use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use uuid::Uuid;

/// Database model for the users table
#[derive(Clone, FromRow)]
pub struct UserIdentity {
    pub id: String, // UUID v4 as string
    pub identifier: String,
    pub credential_hash: String, // PHC-formatted Argon2id hash
    pub created_at: DateTime<Utc>,
}

impl UserIdentity {
    /// Creates a new identity with a generated ID
    pub fn new(identifier: String, credential_hash: String) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            identifier,
            credential_hash,
            created_at: Utc::now(),
        }
    }

    pub fn to_public(&self) -> PublicIdentity {
        PublicIdentity {
            id: self.id.clone(),
            identifier: self.identifier.clone(),
        }
    }
}

impl fmt::Debug for UserIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserIdentity")
            .field("id", &self.id)
            .field("identifier", &self.identifier)
            .field("credential_hash", &"<redacted>")
            .field("created_at", &self.created_at)
            .finish()
    }
}

/// Identity fields that are safe to return to callers
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PublicIdentity {
    pub id: String,
    pub identifier: String,
}

//! Caller identity and trust tiers.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque caller identity. Only meaningful as a lookup key into the
/// library's permission table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccessToken(Uuid);

impl AccessToken {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for AccessToken {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Short form is enough to tell callers apart in logs
        let s = self.0.simple().to_string();
        write!(f, "{}", &s[..8])
    }
}

/// Trust tier of a caller.
///
/// Guests may append one song at a time; admins may bulk-add and insert
/// at a position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum AccessPermission {
    #[default]
    Guest,
    Admin,
}

impl AccessPermission {
    pub fn is_admin(self) -> bool {
        self == AccessPermission::Admin
    }
}

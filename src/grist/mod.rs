//! Grist organisation access API.
//!
//! Provides the [`OrgAccessApi`] trait that encapsulates the two calls the
//! gate makes against the organisation access list: reading it and adding a
//! user with `editors` access.  The gate dispatches through this trait so
//! that no URL construction or payload parsing leaks outside this module.

pub mod client;

use std::collections::HashMap;

use anyhow::Result;
use serde::{Deserialize, Deserializer, Serialize};

/// Access level requested for every user the gate provisions.
pub const EDITORS: &str = "editors";

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

/// Missing and null fields decode to their zero value.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// A single entry in an organisation's access list.
///
/// Missing or null fields take their zero value instead of failing the list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Member {
    #[serde(default, deserialize_with = "null_as_default")]
    pub id: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub email: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(default, rename = "ref")]
    pub reference: Option<String>,
    /// `owners`, `editors`, `viewers`, `members`, or null for users that
    /// only inherit access.
    #[serde(default)]
    pub access: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub is_member: bool,
}

/// Body of `GET /api/orgs/{org}/access`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OrgAccess {
    #[serde(default, deserialize_with = "null_as_default")]
    pub users: Vec<Member>,
}

/// Body of `PATCH /api/orgs/{org}/access`.
#[derive(Debug, Clone, Serialize)]
pub struct AccessDelta {
    pub delta: UsersDelta,
}

#[derive(Debug, Clone, Serialize)]
pub struct UsersDelta {
    pub users: HashMap<String, String>,
}

impl AccessDelta {
    /// Delta that sets `email` to `editors`.
    pub fn editor(email: &str) -> Self {
        Self {
            delta: UsersDelta {
                users: HashMap::from([(email.to_string(), EDITORS.to_string())]),
            },
        }
    }
}

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// Abstraction over the organisation access endpoints.
#[async_trait::async_trait]
pub trait OrgAccessApi: Send + Sync {
    /// Read the organisation's full access list.
    async fn fetch_access(&self) -> Result<Vec<Member>>;

    /// Add `email` to the organisation with `editors` access.
    async fn grant_editor(&self, email: &str) -> Result<()>;

    /// Probe the remote service for liveness.
    async fn check_health(&self) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn member_decodes_full_entry() {
        let json = r#"{
            "id": 7,
            "email": "alice@example.com",
            "name": "Alice",
            "ref": "abc123",
            "access": "editors",
            "isMember": true
        }"#;
        let m: Member = serde_json::from_str(json).unwrap();
        assert_eq!(m.id, 7);
        assert_eq!(m.email, "alice@example.com");
        assert_eq!(m.name, "Alice");
        assert_eq!(m.reference.as_deref(), Some("abc123"));
        assert_eq!(m.access.as_deref(), Some("editors"));
        assert!(m.is_member);
    }

    #[test]
    fn member_tolerates_null_access_and_ref() {
        let json = r#"{"id": 1, "email": "bob@example.com", "name": "Bob",
                       "ref": null, "access": null, "isMember": false}"#;
        let m: Member = serde_json::from_str(json).unwrap();
        assert!(m.reference.is_none());
        assert!(m.access.is_none());
        assert!(!m.is_member);
    }

    #[test]
    fn org_access_decodes_user_list() {
        let json = r#"{"users": [
            {"id": 1, "email": "a@example.com", "name": "A", "ref": "r1", "access": "owners", "isMember": true},
            {"id": 2, "email": "b@example.com", "name": "B", "ref": "r2", "access": "viewers", "isMember": true}
        ], "maxInheritedRole": null}"#;
        let access: OrgAccess = serde_json::from_str(json).unwrap();
        assert_eq!(access.users.len(), 2);
        assert_eq!(access.users[1].email, "b@example.com");
    }

    #[test]
    fn org_access_missing_users_is_empty() {
        let access: OrgAccess = serde_json::from_str(r#"{"people": []}"#).unwrap();
        assert!(access.users.is_empty());
        let access: OrgAccess = serde_json::from_str(r#"{"users": null}"#).unwrap();
        assert!(access.users.is_empty());
    }

    #[test]
    fn member_missing_or_null_fields_take_zero_values() {
        let json = r#"{"users": [
            {"email": null, "name": null, "isMember": null},
            {"id": 3, "email": "c@example.com"}
        ]}"#;
        let access: OrgAccess = serde_json::from_str(json).unwrap();
        assert_eq!(access.users.len(), 2);
        assert_eq!(access.users[0].id, 0);
        assert_eq!(access.users[0].email, "");
        assert_eq!(access.users[0].name, "");
        assert!(!access.users[0].is_member);
        assert_eq!(access.users[1].email, "c@example.com");
        assert!(access.users[1].access.is_none());
    }

    #[test]
    fn editor_delta_shape() {
        let body = serde_json::to_value(AccessDelta::editor("carol@example.com")).unwrap();
        assert_eq!(
            body,
            serde_json::json!({"delta": {"users": {"carol@example.com": "editors"}}})
        );
    }
}

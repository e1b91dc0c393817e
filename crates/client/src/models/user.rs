//! User account types.

use crumb_core::{BranchId, Email, Role, UserId};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize, Serializer};

/// A user account as listed by the administration endpoints.
///
/// `email` is kept exactly as the server reports it. Accounts seeded on the
/// server side (`admin@localhost`) need not pass [`Email::parse`], which only
/// guards what this client sends.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub email: String,
    #[serde(default)]
    pub name: String,
    pub role: Role,
    #[serde(default)]
    pub branch: Option<BranchId>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
}

/// Payload for creating or replacing a user (general admin only).
#[derive(Debug, Clone, Serialize)]
pub struct UserInput {
    pub username: String,
    pub email: Email,
    pub name: String,
    pub role: Role,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub branch: Option<BranchId>,
    /// Required when creating; omitted to keep the current password.
    #[serde(
        skip_serializing_if = "Option::is_none",
        serialize_with = "expose_optional"
    )]
    pub password: Option<SecretString>,
}

/// Self-service customer sign-up.
#[derive(Debug, Clone, Serialize)]
pub struct NewAccount {
    pub username: String,
    pub email: Email,
    pub name: String,
    #[serde(serialize_with = "expose")]
    pub password: SecretString,
}

/// Fields a user may change on their own profile. Unset fields are left
/// untouched by the server.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ProfileUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<Email>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}

impl ProfileUpdate {
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.name.is_none() && self.email.is_none() && self.phone.is_none() && self.address.is_none()
    }
}

fn expose<S: Serializer>(secret: &SecretString, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(secret.expose_secret())
}

#[allow(clippy::ref_option)] // signature fixed by serde's serialize_with
fn expose_optional<S: Serializer>(
    secret: &Option<SecretString>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match secret {
        Some(secret) => expose(secret, serializer),
        None => serializer.serialize_none(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_user_list_accepts_server_side_addresses() {
        let users: Vec<User> = serde_json::from_str(
            r#"[
                {"id": 1, "username": "admin", "email": "admin@localhost", "role": "general_admin"},
                {"id": 2, "username": "ana", "email": "ana@crumb.test", "name": "Ana", "role": "customer"}
            ]"#,
        )
        .unwrap();
        assert_eq!(users.len(), 2);
        assert_eq!(users[0].email, "admin@localhost");
        assert!(users[0].name.is_empty());
        assert_eq!(users[1].role, Role::Customer);
    }

    #[test]
    fn test_new_account_sends_password() {
        let account = NewAccount {
            username: "ana".to_string(),
            email: Email::parse("ana@crumb.test").unwrap(),
            name: "Ana".to_string(),
            password: SecretString::from("s3cret-pan"),
        };
        let json = serde_json::to_value(&account).unwrap();
        assert_eq!(json["password"], "s3cret-pan");
        assert!(!format!("{account:?}").contains("s3cret-pan"));
    }

    #[test]
    fn test_user_input_omits_unset_password() {
        let input = UserInput {
            username: "caja1".to_string(),
            email: Email::parse("caja1@crumb.test").unwrap(),
            name: "Caja".to_string(),
            role: Role::BranchAdmin,
            branch: Some(BranchId::new(2)),
            password: None,
        };
        let json = serde_json::to_value(&input).unwrap();
        assert!(json.get("password").is_none());
        assert_eq!(json["role"], "branch_admin");
    }

    #[test]
    fn test_profile_update_only_sends_changes() {
        let update = ProfileUpdate {
            phone: Some("555-0101".to_string()),
            ..ProfileUpdate::default()
        };
        assert!(!update.is_empty());
        assert_eq!(
            serde_json::to_string(&update).unwrap(),
            r#"{"phone":"555-0101"}"#
        );
        assert!(ProfileUpdate::default().is_empty());
    }
}

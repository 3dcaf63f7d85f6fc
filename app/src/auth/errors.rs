//! Custom error types specific to authentication and session handling.
//!
//! [`ValidationError`] describes why a stored session shape was rejected,
//! [`SessionError`] covers session persistence, and [`AuthError`] carries the
//! user-facing messages shown on the login screens.

use adapters::AdapterError;
use thiserror::Error;

use super::models::Role;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("session is not a JSON object")]
    NotAnObject,

    #[error("missing or empty field `{0}`")]
    MissingField(&'static str),

    #[error("unknown role tag `{0}`")]
    UnknownRole(String),

    #[error("`{field}` value `{value}` does not start with `{prefix}`")]
    BadIdentifier {
        field: &'static str,
        value: String,
        prefix: &'static str,
    },

    #[error("{role} profile carries `{field}`")]
    RoleMismatch { role: Role, field: &'static str },

    #[error("timestamp `{0}` is not RFC 3339")]
    BadTimestamp(String),
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("refusing to persist invalid session: {0}")]
    Invalid(#[from] ValidationError),

    #[error("session storage failed: {0}")]
    Storage(#[from] AdapterError),

    #[error("session encoding failed: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Login and logout failures. The display strings are shown to the user as-is.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("Please enter both ID and password.")]
    MissingCredentials,

    #[error("Invalid {} ID format", id_label(.0))]
    InvalidIdFormat(Role),

    #[error("Supervisor not found")]
    SupervisorNotFound,

    #[error("Truck not found")]
    TruckNotFound,

    #[error("Invalid password")]
    InvalidPassword,

    #[error("{0}")]
    Backend(String),

    #[error("Failed to logout")]
    Logout,
}

fn id_label(role: &Role) -> &'static str {
    match role {
        Role::Supervisor => "supervisor",
        Role::Driver => "truck",
    }
}

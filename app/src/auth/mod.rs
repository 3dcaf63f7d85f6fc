//! Authentication module for provider sessions and login state.
//!
//! This module provides the session model and its validator, the bounded
//! retry helper, the login/logout service and the reconciler that merges the
//! backend's auth state with the locally persisted session.

pub mod errors;
pub mod models;
pub mod reconciler;
pub mod retry;
pub mod service;
pub mod validator;

// Re-exports for convenience
pub use errors::*;
pub use models::*;
pub use reconciler::{AuthSnapshot, Reconciler, ReconcilerHandle, SessionState};
pub use retry::{retry, Backoff, RetryPolicy};
pub use service::{AuthService, LoginOutcome};

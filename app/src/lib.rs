//! Provider-side core of the WasteTrack collection app.
//!
//! Supervisors and truck drivers sign in against the hosted backend; the
//! signed-in provider's profile is persisted locally and reconciled with the
//! backend's auth state to decide which screen stack to show. Around that
//! core sit route tracking for drivers, ward tickets and fleet views for
//! supervisors, and contact actions.

pub mod app;
pub mod auth;
pub mod config;
pub mod errors;
pub mod navigation;
pub mod services;
pub mod storage;

pub use app::{AppShell, Collaborators};
pub use config::Settings;
pub use errors::{AppError, BoundaryState, ErrorBoundary};
pub use navigation::{NavigationStack, Screen};

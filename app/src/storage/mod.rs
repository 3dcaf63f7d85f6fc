//! Durable local state.
//!
//! The device keeps exactly one record: the current provider session,
//! stored as JSON under a single namespaced key of a [`adapters::KeyValueStore`].

pub mod session_store;

pub use session_store::SessionStore;

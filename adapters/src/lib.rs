//! Core `adapters` crate for abstracting the application's external collaborators.
//!
//! This crate defines the ports the application talks through: the hosted
//! authentication backend ([`AuthBackend`]), its hierarchical document store
//! ([`DocumentStore`]), durable local key-value storage ([`KeyValueStore`]),
//! device location services ([`LocationProvider`]) and the OS URI launcher
//! ([`UriLauncher`]). It also provides the in-process implementations used by
//! the development shell and the test suites.

use async_trait::async_trait;

pub mod device;
pub mod errors;
pub mod kv;
pub mod memory;
pub mod models;

pub use device::{RecordingLauncher, ScriptedLocation};
pub use errors::AdapterError;
pub use kv::{FileKvStore, MemoryKvStore};
pub use memory::MemoryBackend;
pub use models::{
    Accuracy, AuthUser, DocPath, Document, Fields, PermissionStatus, Position, Subscription,
    WatchOptions,
};

/// Credential authentication against the hosted backend.
#[async_trait]
pub trait AuthBackend: Send + Sync {
    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthUser, AdapterError>;

    async fn sign_out(&self) -> Result<(), AdapterError>;

    fn current_user(&self) -> Option<AuthUser>;

    /// Push-style auth-state notifications. The current state is delivered
    /// immediately, followed by one event per change.
    fn subscribe_auth_state(&self) -> Subscription<Option<AuthUser>>;
}

/// Document reads, writes and live collection queries.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn get(&self, path: &DocPath) -> Result<Option<Document>, AdapterError>;

    /// Create or fully replace a document.
    async fn set(&self, path: &DocPath, data: Fields) -> Result<(), AdapterError>;

    /// Merge `fields` into an existing document; fails with
    /// [`AdapterError::NotFound`] if it does not exist.
    async fn update(&self, path: &DocPath, fields: Fields) -> Result<(), AdapterError>;

    /// Direct child documents of a collection.
    async fn list(&self, collection: &DocPath) -> Result<Vec<Document>, AdapterError>;

    /// Live snapshots of a collection: the current contents immediately,
    /// then a full snapshot after every change.
    fn subscribe(&self, collection: &DocPath) -> Subscription<Vec<Document>>;
}

/// Durable string key-value storage on the device.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, AdapterError>;

    async fn set(&self, key: &str, value: &str) -> Result<(), AdapterError>;

    /// Removing a missing key is not an error.
    async fn remove(&self, key: &str) -> Result<(), AdapterError>;
}

/// Device location services.
#[async_trait]
pub trait LocationProvider: Send + Sync {
    async fn request_foreground_permission(&self) -> Result<PermissionStatus, AdapterError>;

    async fn current_position(&self) -> Result<Position, AdapterError>;

    async fn watch_position(
        &self,
        options: WatchOptions,
    ) -> Result<Subscription<Position>, AdapterError>;
}

/// Opens dialer / SMS composer URIs.
#[async_trait]
pub trait UriLauncher: Send + Sync {
    async fn can_open(&self, uri: &str) -> Result<bool, AdapterError>;

    async fn open(&self, uri: &str) -> Result<(), AdapterError>;
}

//! Generic data models for the `adapters` crate.
//!
//! These models define the abstracted shapes exchanged with external
//! collaborators (authenticated accounts, hierarchical document paths,
//! documents, device positions) so that the application crate can work
//! against any backend or device implementation with one consistent format.

use std::fmt;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::errors::AdapterError;

/// Field map of a stored document.
pub type Fields = serde_json::Map<String, serde_json::Value>;

/// An account the authentication backend has verified.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthUser {
    pub uid: String,
    pub email: String,
    #[serde(default)]
    pub email_verified: bool,
}

/// Slash-separated address of a collection or document.
///
/// Segments alternate collection / document id, so an odd number of segments
/// names a collection and an even number names a document.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DocPath {
    segments: Vec<String>,
}

impl DocPath {
    /// Top-level collection.
    pub fn collection(name: impl Into<String>) -> Self {
        Self {
            segments: vec![name.into()],
        }
    }

    pub fn parse(path: &str) -> Result<Self, AdapterError> {
        let segments: Vec<String> = path
            .trim_matches('/')
            .split('/')
            .map(str::to_string)
            .collect();
        if segments.iter().any(String::is_empty) {
            return Err(AdapterError::InvalidPath(path.to_string()));
        }
        Ok(Self { segments })
    }

    /// Document `id` inside this collection.
    pub fn doc(&self, id: impl Into<String>) -> Self {
        debug_assert!(self.is_collection(), "doc() called on a document path");
        self.push(id.into())
    }

    /// Sub-collection `name` of this document.
    pub fn sub(&self, name: impl Into<String>) -> Self {
        debug_assert!(self.is_document(), "sub() called on a collection path");
        self.push(name.into())
    }

    fn push(&self, segment: String) -> Self {
        let mut segments = self.segments.clone();
        segments.push(segment);
        Self { segments }
    }

    pub fn is_collection(&self) -> bool {
        self.segments.len() % 2 == 1
    }

    pub fn is_document(&self) -> bool {
        !self.segments.is_empty() && self.segments.len() % 2 == 0
    }

    /// Last segment: the document id or collection name.
    pub fn id(&self) -> &str {
        self.segments.last().map(String::as_str).unwrap_or_default()
    }

    pub fn parent(&self) -> Option<Self> {
        if self.segments.len() <= 1 {
            return None;
        }
        Some(Self {
            segments: self.segments[..self.segments.len() - 1].to_vec(),
        })
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }
}

impl fmt::Display for DocPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.segments.join("/"))
    }
}

/// A document snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub path: DocPath,
    pub data: Fields,
}

impl Document {
    pub fn id(&self) -> &str {
        self.path.id()
    }

    /// Non-empty string field, if present.
    pub fn str_field(&self, key: &str) -> Option<&str> {
        self.data
            .get(key)
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PermissionStatus {
    Granted,
    Denied,
    Undetermined,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Accuracy {
    Low,
    Balanced,
    #[default]
    High,
}

/// Thresholds for a continuous position watch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WatchOptions {
    pub accuracy: Accuracy,
    /// Minimum movement in metres between fixes.
    pub distance_interval_m: f64,
    /// Minimum time in milliseconds between fixes.
    pub time_interval_ms: u64,
}

/// A single position fix reported by the device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub latitude: f64,
    pub longitude: f64,
    pub heading: Option<f64>,
    pub speed: Option<f64>,
    /// Fix time in milliseconds since the Unix epoch.
    pub timestamp_ms: Option<i64>,
}

impl Position {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
            heading: None,
            speed: None,
            timestamp_ms: None,
        }
    }
}

/// Receiving end of a push-style subscription.
///
/// Dropping the subscription (or calling [`Subscription::cancel`]) closes the
/// channel, and the producer drops its side on the next delivery attempt.
#[derive(Debug)]
pub struct Subscription<T> {
    rx: mpsc::UnboundedReceiver<T>,
}

impl<T> Subscription<T> {
    pub fn new(rx: mpsc::UnboundedReceiver<T>) -> Self {
        Self { rx }
    }

    /// Create a connected sender/subscription pair.
    pub fn channel() -> (mpsc::UnboundedSender<T>, Self) {
        let (tx, rx) = mpsc::unbounded_channel();
        (tx, Self::new(rx))
    }

    /// Next event, or `None` once the producer has gone away.
    pub async fn recv(&mut self) -> Option<T> {
        self.rx.recv().await
    }

    pub fn try_recv(&mut self) -> Option<T> {
        self.rx.try_recv().ok()
    }

    pub fn cancel(mut self) {
        self.rx.close();
    }
}

//! Scripted device collaborators.
//!
//! [`ScriptedLocation`] answers permission prompts with a preset status and
//! broadcasts positions pushed by the caller to every active watch.
//! [`RecordingLauncher`] records the URIs it was asked to open and only
//! supports the schemes it was configured with.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc::UnboundedSender;

use crate::errors::AdapterError;
use crate::models::{PermissionStatus, Position, Subscription, WatchOptions};
use crate::{LocationProvider, UriLauncher};

#[derive(Debug)]
struct LocationState {
    permission: PermissionStatus,
    last: Option<Position>,
    watchers: Vec<UnboundedSender<Position>>,
    watch_requests: Vec<WatchOptions>,
}

#[derive(Clone, Debug)]
pub struct ScriptedLocation {
    state: Arc<Mutex<LocationState>>,
}

impl ScriptedLocation {
    pub fn new(permission: PermissionStatus) -> Self {
        Self {
            state: Arc::new(Mutex::new(LocationState {
                permission,
                last: None,
                watchers: Vec::new(),
                watch_requests: Vec::new(),
            })),
        }
    }

    pub fn granted() -> Self {
        Self::new(PermissionStatus::Granted)
    }

    pub fn set_permission(&self, permission: PermissionStatus) {
        self.state.lock().permission = permission;
    }

    /// Deliver a fix to every live watch.
    pub fn push(&self, position: Position) {
        let mut state = self.state.lock();
        state.last = Some(position.clone());
        state.watchers.retain(|tx| tx.send(position.clone()).is_ok());
    }

    pub fn active_watches(&self) -> usize {
        let mut state = self.state.lock();
        state.watchers.retain(|tx| !tx.is_closed());
        state.watchers.len()
    }

    pub fn watch_requests(&self) -> Vec<WatchOptions> {
        self.state.lock().watch_requests.clone()
    }
}

#[async_trait]
impl LocationProvider for ScriptedLocation {
    async fn request_foreground_permission(&self) -> Result<PermissionStatus, AdapterError> {
        Ok(self.state.lock().permission)
    }

    async fn current_position(&self) -> Result<Position, AdapterError> {
        let state = self.state.lock();
        if state.permission != PermissionStatus::Granted {
            return Err(AdapterError::PermissionDenied("location".into()));
        }
        state
            .last
            .clone()
            .ok_or_else(|| AdapterError::Unavailable("no position fix yet".into()))
    }

    async fn watch_position(
        &self,
        options: WatchOptions,
    ) -> Result<Subscription<Position>, AdapterError> {
        let mut state = self.state.lock();
        if state.permission != PermissionStatus::Granted {
            return Err(AdapterError::PermissionDenied("location".into()));
        }
        let (tx, subscription) = Subscription::channel();
        state.watchers.push(tx);
        state.watch_requests.push(options);
        Ok(subscription)
    }
}

#[derive(Clone, Debug)]
pub struct RecordingLauncher {
    schemes: Arc<HashSet<String>>,
    opened: Arc<Mutex<Vec<String>>>,
}

impl RecordingLauncher {
    /// Launcher supporting the given URI schemes (without the trailing `:`).
    pub fn with_schemes<I, S>(schemes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            schemes: Arc::new(schemes.into_iter().map(Into::into).collect()),
            opened: Arc::default(),
        }
    }

    pub fn opened(&self) -> Vec<String> {
        self.opened.lock().clone()
    }

    fn supports(&self, uri: &str) -> bool {
        uri.split_once(':')
            .map(|(scheme, _)| self.schemes.contains(scheme))
            .unwrap_or(false)
    }
}

#[async_trait]
impl UriLauncher for RecordingLauncher {
    async fn can_open(&self, uri: &str) -> Result<bool, AdapterError> {
        Ok(self.supports(uri))
    }

    async fn open(&self, uri: &str) -> Result<(), AdapterError> {
        if !self.supports(uri) {
            return Err(AdapterError::Unavailable(format!("no handler for {uri}")));
        }
        self.opened.lock().push(uri.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Accuracy;

    fn options() -> WatchOptions {
        WatchOptions {
            accuracy: Accuracy::High,
            distance_interval_m: 10.0,
            time_interval_ms: 2000,
        }
    }

    #[tokio::test]
    async fn watch_requires_permission() {
        let location = ScriptedLocation::new(PermissionStatus::Denied);
        assert!(location.watch_position(options()).await.is_err());

        location.set_permission(PermissionStatus::Granted);
        let mut watch = location.watch_position(options()).await.unwrap();
        location.push(Position::new(6.9, 79.8));
        assert_eq!(watch.recv().await.unwrap().latitude, 6.9);
        assert_eq!(location.current_position().await.unwrap().longitude, 79.8);
        assert_eq!(location.watch_requests(), vec![options()]);
    }

    #[tokio::test]
    async fn launcher_only_opens_supported_schemes() {
        let launcher = RecordingLauncher::with_schemes(["tel"]);
        assert!(launcher.can_open("tel:0771234567").await.unwrap());
        assert!(!launcher.can_open("sms:0771234567").await.unwrap());
        launcher.open("tel:0771234567").await.unwrap();
        assert_eq!(launcher.opened(), vec!["tel:0771234567".to_string()]);
    }
}

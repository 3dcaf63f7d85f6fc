//! Live route tracking for a driver's truck.
//!
//! A [`TruckTracker`] is built for one logged-in driver session and owns the
//! position watch for that truck. Every fix is forwarded to the truck document
//! as `currentLocation`. Dropping the tracker stops the watch.

use std::sync::Arc;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use adapters::{
    AdapterError, DocPath, DocumentStore, Fields, LocationProvider, PermissionStatus, Position,
    WatchOptions,
};

use crate::auth::models::DriverProfile;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RouteStatus {
    #[default]
    Idle,
    Active,
    Paused,
    Completed,
}

impl RouteStatus {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "idle" => Some(RouteStatus::Idle),
            "active" => Some(RouteStatus::Active),
            "paused" => Some(RouteStatus::Paused),
            "completed" => Some(RouteStatus::Completed),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RouteStatus::Idle => "idle",
            RouteStatus::Active => "active",
            RouteStatus::Paused => "paused",
            RouteStatus::Completed => "completed",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackingStatus {
    pub is_tracking: bool,
    pub route_status: RouteStatus,
}

#[derive(Debug, Error)]
pub enum TrackingError {
    #[error("Permission to access location was denied")]
    PermissionDenied,

    #[error("route is already being tracked")]
    AlreadyTracking,

    #[error("truck update failed: {0}")]
    Backend(#[from] AdapterError),
}

/// Aborts the watch task when dropped.
struct WatchGuard(JoinHandle<()>);

impl Drop for WatchGuard {
    fn drop(&mut self) {
        self.0.abort();
    }
}

struct TrackerState {
    route_status: RouteStatus,
    watch: Option<WatchGuard>,
}

pub struct TruckTracker {
    docs: Arc<dyn DocumentStore>,
    location: Arc<dyn LocationProvider>,
    truck: DocPath,
    options: WatchOptions,
    state: Mutex<TrackerState>,
}

impl TruckTracker {
    pub fn new(
        profile: &DriverProfile,
        docs: Arc<dyn DocumentStore>,
        location: Arc<dyn LocationProvider>,
        options: WatchOptions,
    ) -> Self {
        Self {
            docs,
            location,
            truck: profile.truck_path(),
            options,
            state: Mutex::new(TrackerState {
                route_status: RouteStatus::Idle,
                watch: None,
            }),
        }
    }

    pub fn truck_path(&self) -> &DocPath {
        &self.truck
    }

    /// Mark the route active and start forwarding position fixes.
    pub async fn start_route(&self) -> Result<(), TrackingError> {
        let mut state = self.state.lock().await;
        if state.watch.is_some() {
            return Err(TrackingError::AlreadyTracking);
        }

        let permission = self.location.request_foreground_permission().await?;
        if permission != PermissionStatus::Granted {
            tracing::warn!(?permission, "location permission not granted");
            return Err(TrackingError::PermissionDenied);
        }

        self.write_status(RouteStatus::Active).await?;
        state.route_status = RouteStatus::Active;

        let mut fixes = self
            .location
            .watch_position(self.options.clone())
            .await
            .map_err(|err| {
                tracing::error!(error = %err, "error starting route tracking");
                err
            })?;
        let docs = self.docs.clone();
        let truck = self.truck.clone();
        let task = tokio::spawn(async move {
            while let Some(fix) = fixes.recv().await {
                publish_fix(docs.as_ref(), &truck, fix).await;
            }
            tracing::debug!(truck = %truck, "position watch ended");
        });
        state.watch = Some(WatchGuard(task));
        tracing::info!(truck = %self.truck, "route tracking started");
        Ok(())
    }

    pub async fn pause_route(&self) -> Result<(), TrackingError> {
        self.set_route_status(RouteStatus::Paused).await
    }

    pub async fn resume_route(&self) -> Result<(), TrackingError> {
        self.set_route_status(RouteStatus::Active).await
    }

    /// Stop the watch and mark the route completed.
    pub async fn stop_route(&self) -> Result<(), TrackingError> {
        let mut state = self.state.lock().await;
        state.watch = None;
        self.write_status(RouteStatus::Completed).await?;
        state.route_status = RouteStatus::Idle;
        tracing::info!(truck = %self.truck, "route completed");
        Ok(())
    }

    pub async fn status(&self) -> TrackingStatus {
        let state = self.state.lock().await;
        TrackingStatus {
            is_tracking: state.watch.is_some(),
            route_status: state.route_status,
        }
    }

    /// One-shot position read for map views.
    pub async fn current_position(&self) -> Result<Position, TrackingError> {
        match self.location.current_position().await {
            Ok(position) => Ok(position),
            Err(AdapterError::PermissionDenied(_)) => Err(TrackingError::PermissionDenied),
            Err(err) => Err(err.into()),
        }
    }

    async fn set_route_status(&self, status: RouteStatus) -> Result<(), TrackingError> {
        let mut state = self.state.lock().await;
        self.write_status(status).await?;
        state.route_status = status;
        Ok(())
    }

    async fn write_status(&self, status: RouteStatus) -> Result<(), TrackingError> {
        let mut fields = Fields::new();
        fields.insert("routeStatus".into(), json!(status.as_str()));
        fields.insert("lastLocationUpdate".into(), json!(now_rfc3339()));
        self.docs.update(&self.truck, fields).await.map_err(|err| {
            tracing::error!(error = %err, status = status.as_str(), "error updating route status");
            TrackingError::from(err)
        })
    }
}

/// Write one fix to the truck document. Failures are logged and dropped.
async fn publish_fix(docs: &dyn DocumentStore, truck: &DocPath, fix: Position) {
    let timestamp = fix
        .timestamp_ms
        .and_then(DateTime::<Utc>::from_timestamp_millis)
        .unwrap_or_else(|| {
            tracing::warn!("position fix has no usable timestamp, using current time");
            Utc::now()
        });

    let mut fields = Fields::new();
    fields.insert(
        "currentLocation".into(),
        json!({
            "latitude": fix.latitude,
            "longitude": fix.longitude,
            "heading": fix.heading.unwrap_or(0.0),
            "speed": fix.speed.unwrap_or(0.0),
            "timestamp": timestamp.to_rfc3339_opts(SecondsFormat::Millis, true),
        }),
    );
    fields.insert("lastLocationUpdate".into(), Value::String(now_rfc3339()));

    match docs.update(truck, fields).await {
        Ok(()) => tracing::debug!(lat = fix.latitude, lon = fix.longitude, "location updated"),
        Err(err) => tracing::error!(error = %err, "error updating location"),
    }
}

fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

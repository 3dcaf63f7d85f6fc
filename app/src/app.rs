//! Application shell wiring storage, backend, reconciler and error boundary.

use std::sync::Arc;

use tokio::sync::watch;

use adapters::{AuthBackend, DocumentStore, KeyValueStore, LocationProvider, UriLauncher};

use crate::auth::reconciler::{AuthSnapshot, Reconciler, ReconcilerHandle, SessionState};
use crate::auth::service::AuthService;
use crate::config::Settings;
use crate::errors::ErrorBoundary;
use crate::navigation::NavigationStack;
use crate::services::{ContactService, FleetService, TicketService, TruckTracker};
use crate::storage::SessionStore;

/// External collaborators the shell runs against.
#[derive(Clone)]
pub struct Collaborators {
    pub kv: Arc<dyn KeyValueStore>,
    pub auth: Arc<dyn AuthBackend>,
    pub docs: Arc<dyn DocumentStore>,
    pub location: Arc<dyn LocationProvider>,
    pub launcher: Arc<dyn UriLauncher>,
}

pub struct AppShell {
    settings: Settings,
    collaborators: Collaborators,
    store: SessionStore,
    boundary: ErrorBoundary,
    reconciler: Option<ReconcilerHandle>,
}

impl AppShell {
    pub fn new(settings: Settings, collaborators: Collaborators) -> Self {
        let store = SessionStore::new(collaborators.kv.clone(), settings.session.key.clone());
        Self {
            settings,
            collaborators,
            store,
            boundary: ErrorBoundary::new(),
            reconciler: None,
        }
    }

    /// Start the reconciler. Calling it again while running is a no-op.
    pub fn start(&mut self) {
        if self.reconciler.is_some() {
            return;
        }
        let reconciler = Reconciler::new(
            self.store.clone(),
            self.collaborators.auth.clone(),
            self.settings.reconciler.clone(),
        );
        self.reconciler = Some(reconciler.spawn_guarded(&self.boundary));
        tracing::info!("app shell started");
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    pub fn boundary(&self) -> &ErrorBoundary {
        &self.boundary
    }

    pub fn auth(&self) -> AuthService {
        AuthService::new(
            self.collaborators.auth.clone(),
            self.collaborators.docs.clone(),
            self.store.clone(),
        )
    }

    pub fn tickets(&self) -> TicketService {
        TicketService::new(self.collaborators.docs.clone())
    }

    pub fn fleet(&self) -> FleetService {
        FleetService::new(self.collaborators.docs.clone())
    }

    pub fn contact(&self) -> ContactService {
        ContactService::new(self.collaborators.launcher.clone())
    }

    /// Current auth snapshot; the initial loading snapshot before `start`.
    pub fn snapshot(&self) -> AuthSnapshot {
        match &self.reconciler {
            Some(reconciler) => reconciler.snapshot(),
            None => AuthSnapshot {
                state: SessionState::Initializing,
                loading: true,
            },
        }
    }

    /// Snapshot updates from the running reconciler. A receiver taken before
    /// [`AppShell::retry`] goes stale once the old reconciler stops.
    pub fn subscribe(&self) -> Option<watch::Receiver<AuthSnapshot>> {
        self.reconciler.as_ref().map(ReconcilerHandle::subscribe)
    }

    pub fn navigation(&self) -> NavigationStack {
        NavigationStack::for_snapshot(&self.snapshot(), &self.boundary.state())
    }

    /// Tracker for the signed-in driver, if the current session is a driver's.
    pub fn tracker_for_session(&self) -> Option<TruckTracker> {
        let snapshot = self.snapshot();
        let driver = snapshot.session()?.driver()?;
        Some(TruckTracker::new(
            driver,
            self.collaborators.docs.clone(),
            self.collaborators.location.clone(),
            self.settings.tracking.watch_options(),
        ))
    }

    /// Recover from a tripped boundary: reset it and restart the reconciler.
    pub async fn retry(&mut self) {
        self.boundary.reset();
        self.stop_reconciler().await;
        self.start();
    }

    pub async fn shutdown(mut self) {
        self.stop_reconciler().await;
        tracing::info!("app shell stopped");
    }

    async fn stop_reconciler(&mut self) {
        if let Some(reconciler) = self.reconciler.take() {
            if let Err(err) = reconciler.shutdown().await {
                tracing::warn!(error = %err, "reconciler did not stop cleanly");
            }
        }
    }
}

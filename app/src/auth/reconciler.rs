//! Auth state reconciler.
//!
//! Merges backend auth-state notifications with the locally persisted session
//! into one [`AuthSnapshot`], published on a `watch` channel for the render
//! layer. Everything runs inside a single task:
//!
//! - a one-shot startup timer that ends the loading state regardless of outcome,
//! - the backend auth-state subscription,
//! - at most one pending store operation (startup read, identity check,
//!   retry loop, sign-out clear or poll read); a backend event drops it before
//!   the next one is built,
//! - a low-frequency poll of the local store, active only while no identity is
//!   known and no session is adopted.
//!
//! Dropping the [`ReconcilerHandle`] (or calling [`ReconcilerHandle::shutdown`])
//! stops the task, which releases the subscription and all timers.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::{JoinError, JoinHandle};
use tokio::time::{self, Instant, MissedTickBehavior};

use adapters::{AuthBackend, AuthUser, Subscription};

use crate::config::ReconcilerSettings;
use crate::errors::ErrorBoundary;
use crate::storage::SessionStore;

use super::models::SessionRecord;
use super::retry::retry;

#[derive(Debug, Clone, PartialEq)]
pub enum SessionState {
    Initializing,
    Authenticated(SessionRecord),
    Unauthenticated,
}

impl SessionState {
    pub fn session(&self) -> Option<&SessionRecord> {
        match self {
            SessionState::Authenticated(record) => Some(record),
            _ => None,
        }
    }
}

/// What the render layer sees.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthSnapshot {
    pub state: SessionState,
    /// True until a session is adopted, an unauthenticated decision is made,
    /// or the startup timer fires, whichever comes first.
    pub loading: bool,
}

impl AuthSnapshot {
    fn initial() -> Self {
        Self {
            state: SessionState::Initializing,
            loading: true,
        }
    }

    pub fn session(&self) -> Option<&SessionRecord> {
        self.state.session()
    }
}

/// Store work started by an event, resolved inside the select loop so the
/// startup timer and shutdown stay live while a read is outstanding.
type Pending = Pin<Box<dyn Future<Output = Settled> + Send>>;
type ReconcileTask = Pin<Box<dyn Future<Output = ()> + Send>>;

enum Settled {
    Restored(Option<SessionRecord>),
    Checked {
        uid: String,
        record: Option<SessionRecord>,
    },
    Retried(Option<SessionRecord>),
    SignedOut,
    Polled(Option<SessionRecord>),
}

pub struct Reconciler {
    store: SessionStore,
    backend: Arc<dyn AuthBackend>,
    settings: ReconcilerSettings,
    state: watch::Sender<AuthSnapshot>,
}

impl Reconciler {
    pub fn new(
        store: SessionStore,
        backend: Arc<dyn AuthBackend>,
        settings: ReconcilerSettings,
    ) -> Self {
        let (state, _) = watch::channel(AuthSnapshot::initial());
        Self {
            store,
            backend,
            settings,
            state,
        }
    }

    pub fn spawn(self) -> ReconcilerHandle {
        self.launch(|task| tokio::spawn(task))
    }

    /// Spawn under `boundary`, so a panic inside the reconciler trips it.
    pub fn spawn_guarded(self, boundary: &ErrorBoundary) -> ReconcilerHandle {
        self.launch(|task| boundary.spawn("auth-reconciler", task))
    }

    fn launch<S>(self, spawn: S) -> ReconcilerHandle
    where
        S: FnOnce(ReconcileTask) -> JoinHandle<()>,
    {
        let state = self.state.subscribe();
        let (shutdown, shutdown_rx) = watch::channel(false);
        let task = spawn(Box::pin(self.run(shutdown_rx)));
        ReconcilerHandle {
            state,
            shutdown,
            task,
        }
    }

    async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let startup = time::sleep(self.settings.init_timeout());
        tokio::pin!(startup);
        let mut startup_pending = true;

        // At most one store operation in flight. A backend event replaces it.
        let mut pending: Option<Pending> = Some(self.restore());
        let mut auth_events = Some(self.backend.subscribe_auth_state());
        let mut identity: Option<AuthUser> = None;

        let poll_every = self.settings.poll_interval();
        let mut poll = time::interval_at(Instant::now() + poll_every, poll_every);
        poll.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            let should_poll =
                identity.is_none() && pending.is_none() && self.current().session().is_none();

            tokio::select! {
                biased;

                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
                _ = &mut startup, if startup_pending => {
                    startup_pending = false;
                    if self.current().loading {
                        tracing::warn!("startup timer elapsed before session state resolved");
                        self.update(|snapshot| snapshot.loading = false);
                    }
                }
                settled = drive(&mut pending) => {
                    pending = self.settle(settled);
                }
                event = next_auth_event(&mut auth_events) => match event {
                    Some(Some(user)) => {
                        supersede(&mut pending);
                        tracing::debug!(uid = %user.uid, "backend reports signed-in identity");
                        pending = Some(self.check(user.uid.clone()));
                        identity = Some(user);
                    }
                    Some(None) => {
                        supersede(&mut pending);
                        tracing::debug!("backend reports no signed-in identity");
                        identity = None;
                        pending = Some(self.sign_out());
                    }
                    None => {
                        tracing::warn!("auth state subscription closed");
                        auth_events = None;
                    }
                },
                _ = poll.tick(), if should_poll => {
                    pending = Some(self.poll());
                }
            }
        }
        tracing::debug!("auth state reconciler stopped");
    }

    /// Apply a finished store operation, returning the follow-up to run.
    fn settle(&self, settled: Settled) -> Option<Pending> {
        match settled {
            Settled::Restored(Some(record)) => {
                tracing::info!(uid = record.uid(), role = %record.role(), "restored provider session");
                self.adopt(record);
            }
            Settled::Checked {
                record: Some(record),
                ..
            } => self.adopt(record),
            Settled::Checked { uid, record: None } => {
                self.update(|snapshot| snapshot.state = SessionState::Initializing);
                return Some(self.retry(uid));
            }
            Settled::Retried(Some(record)) => {
                tracing::info!(uid = record.uid(), "provider session confirmed after retry");
                self.adopt(record);
            }
            Settled::Retried(None) => {
                tracing::warn!(
                    attempts = self.settings.retry_attempts,
                    "no valid provider session after retries, giving up"
                );
                self.set_unauthenticated();
            }
            Settled::SignedOut => self.set_unauthenticated(),
            Settled::Polled(Some(record)) => {
                tracing::info!(uid = record.uid(), "session poll picked up provider session");
                self.adopt(record);
            }
            Settled::Restored(None) | Settled::Polled(None) => {}
        }
        None
    }

    fn restore(&self) -> Pending {
        let store = self.store.clone();
        Box::pin(async move { Settled::Restored(store.load().await) })
    }

    fn check(&self, uid: String) -> Pending {
        let store = self.store.clone();
        Box::pin(async move {
            let record = load_matching(&store, &uid).await;
            Settled::Checked { uid, record }
        })
    }

    fn retry(&self, uid: String) -> Pending {
        let store = self.store.clone();
        let policy = self.settings.retry_policy();
        Box::pin(async move {
            let record = retry(&policy, |attempt| {
                tracing::trace!(attempt, uid = %uid, "re-reading provider session");
                load_matching(&store, &uid)
            })
            .await;
            Settled::Retried(record)
        })
    }

    fn sign_out(&self) -> Pending {
        let store = self.store.clone();
        Box::pin(async move {
            let _ = store.clear().await;
            Settled::SignedOut
        })
    }

    fn poll(&self) -> Pending {
        let store = self.store.clone();
        Box::pin(async move { Settled::Polled(store.load().await) })
    }

    fn current(&self) -> AuthSnapshot {
        self.state.borrow().clone()
    }

    fn adopt(&self, record: SessionRecord) {
        self.update(|snapshot| {
            snapshot.state = SessionState::Authenticated(record);
            snapshot.loading = false;
        });
    }

    fn set_unauthenticated(&self) {
        self.update(|snapshot| {
            snapshot.state = SessionState::Unauthenticated;
            snapshot.loading = false;
        });
    }

    /// Publish only real changes.
    fn update(&self, change: impl FnOnce(&mut AuthSnapshot)) {
        self.state.send_if_modified(|snapshot| {
            let mut next = snapshot.clone();
            change(&mut next);
            if next == *snapshot {
                return false;
            }
            *snapshot = next;
            true
        });
    }
}

/// Load the stored session, accepting it only if it belongs to `uid`.
async fn load_matching(store: &SessionStore, uid: &str) -> Option<SessionRecord> {
    let record = store.load().await?;
    if record.uid() != uid {
        tracing::debug!(stored = record.uid(), expected = uid, "stored session belongs to another account");
        return None;
    }
    Some(record)
}

fn supersede(pending: &mut Option<Pending>) {
    if pending.take().is_some() {
        tracing::debug!("cancelling pending session work");
    }
}

async fn next_auth_event(
    events: &mut Option<Subscription<Option<AuthUser>>>,
) -> Option<Option<AuthUser>> {
    match events {
        Some(events) => events.recv().await,
        None => std::future::pending().await,
    }
}

async fn drive(pending: &mut Option<Pending>) -> Settled {
    let settled = match pending {
        Some(work) => work.as_mut().await,
        None => std::future::pending().await,
    };
    *pending = None;
    settled
}

/// Owner of a running reconciler.
pub struct ReconcilerHandle {
    state: watch::Receiver<AuthSnapshot>,
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl ReconcilerHandle {
    pub fn subscribe(&self) -> watch::Receiver<AuthSnapshot> {
        self.state.clone()
    }

    pub fn snapshot(&self) -> AuthSnapshot {
        self.state.borrow().clone()
    }

    /// Stop the reconciler and wait for it to release its resources.
    pub async fn shutdown(self) -> Result<(), JoinError> {
        let _ = self.shutdown.send(true);
        self.task.await
    }
}

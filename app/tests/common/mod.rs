#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use adapters::{AdapterError, AuthUser, Fields, KeyValueStore, MemoryKvStore};
use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use tokio::sync::watch;

use wastetrack::auth::{
    AuthSnapshot, DriverProfile, ProviderProfile, SessionRecord, SessionState, SupervisorProfile,
};
use wastetrack::config::{BackoffKind, ReconcilerSettings};
use wastetrack::storage::SessionStore;

pub const SESSION_KEY: &str = "providerSession";

/// 10 s startup ceiling, 10 retries every 500 ms, 5 s poll.
pub fn reconciler_settings() -> ReconcilerSettings {
    ReconcilerSettings {
        init_timeout_ms: 10_000,
        retry_interval_ms: 500,
        retry_attempts: 10,
        retry_backoff: BackoffKind::Fixed,
        retry_max_interval_ms: 4_000,
        poll_interval_ms: 5_000,
    }
}

pub fn user(uid: &str) -> AuthUser {
    AuthUser {
        uid: uid.to_string(),
        email: format!("{uid}@council.lk"),
        email_verified: true,
    }
}

pub fn driver_record(uid: &str) -> SessionRecord {
    SessionRecord::new(
        uid,
        format!("{uid}@council.lk"),
        ProviderProfile::Driver(DriverProfile {
            truck_id: "TRUCK042".into(),
            municipal_council: "Colombo".into(),
            district: "D1".into(),
            ward: "W1".into(),
            supervisor_id: "SUP001".into(),
            extra: Fields::new(),
        }),
        Utc.with_ymd_and_hms(2024, 3, 1, 8, 30, 0).unwrap(),
    )
}

pub fn supervisor_record(uid: &str) -> SessionRecord {
    SessionRecord::new(
        uid,
        format!("{uid}@council.lk"),
        ProviderProfile::Supervisor(SupervisorProfile {
            supervisor_id: "SUP001".into(),
            municipal_council: "Colombo".into(),
            district: "D1".into(),
            ward: "W1".into(),
            extra: Fields::new(),
        }),
        Utc.with_ymd_and_hms(2024, 3, 1, 8, 30, 0).unwrap(),
    )
}

/// Memory key-value store that counts reads.
#[derive(Clone, Default)]
pub struct CountingKv {
    inner: MemoryKvStore,
    reads: Arc<AtomicUsize>,
}

impl CountingKv {
    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl KeyValueStore for CountingKv {
    async fn get(&self, key: &str) -> Result<Option<String>, AdapterError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), AdapterError> {
        self.inner.set(key, value).await
    }

    async fn remove(&self, key: &str) -> Result<(), AdapterError> {
        self.inner.remove(key).await
    }
}

pub fn counting_store() -> (CountingKv, SessionStore) {
    let kv = CountingKv::default();
    let store = SessionStore::new(Arc::new(kv.clone()), SESSION_KEY);
    (kv, store)
}

/// Wait (on the tokio clock) until a snapshot satisfies `pred`.
pub async fn wait_for(
    rx: &mut watch::Receiver<AuthSnapshot>,
    pred: impl FnMut(&AuthSnapshot) -> bool,
) -> AuthSnapshot {
    tokio::time::timeout(Duration::from_secs(120), rx.wait_for(pred))
        .await
        .expect("timed out waiting for auth snapshot")
        .expect("reconciler stopped")
        .clone()
}

pub fn is_authenticated_as(uid: &str) -> impl Fn(&AuthSnapshot) -> bool + '_ {
    move |snapshot| snapshot.session().is_some_and(|s| s.uid() == uid)
}

pub fn is_unauthenticated(snapshot: &AuthSnapshot) -> bool {
    snapshot.state == SessionState::Unauthenticated
}

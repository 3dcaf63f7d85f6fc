//! Persisted provider session.
//!
//! `save` re-validates before writing, so a record that would not survive
//! `load` is never persisted. `load` fails closed: anything short of a fully
//! valid record comes back as `None`, and a parseable but invalid record is
//! deleted on the way out.

use std::sync::Arc;

use chrono::Utc;
use serde_json::Value;

use adapters::{AuthUser, KeyValueStore};

use crate::auth::errors::SessionError;
use crate::auth::models::{ProviderProfile, SessionRecord};
use crate::auth::validator;

#[derive(Clone)]
pub struct SessionStore {
    kv: Arc<dyn KeyValueStore>,
    key: String,
}

impl SessionStore {
    pub fn new(kv: Arc<dyn KeyValueStore>, key: impl Into<String>) -> Self {
        Self {
            kv,
            key: key.into(),
        }
    }

    /// Replace the stored session with `record`.
    pub async fn save(&self, record: &SessionRecord) -> Result<(), SessionError> {
        let value = serde_json::to_value(record)?;
        if let Err(reason) = validator::validate(&value) {
            tracing::error!(%reason, uid = record.uid(), "incomplete profile data for session, not saving");
            return Err(reason.into());
        }

        if let Err(err) = self.kv.set(&self.key, &value.to_string()).await {
            tracing::error!(error = %err, "error saving provider session");
            return Err(err.into());
        }
        tracing::info!(uid = record.uid(), role = %record.role(), "provider session saved");
        Ok(())
    }

    /// Build a record for `user` stamped with the current time and save it.
    pub async fn save_for(
        &self,
        user: &AuthUser,
        profile: ProviderProfile,
    ) -> Result<SessionRecord, SessionError> {
        let record = SessionRecord::new(&user.uid, &user.email, profile, Utc::now());
        self.save(&record).await?;
        Ok(record)
    }

    /// The stored session, if one exists and is valid.
    pub async fn load(&self) -> Option<SessionRecord> {
        let raw = match self.kv.get(&self.key).await {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                tracing::debug!("no provider session found");
                return None;
            }
            Err(err) => {
                tracing::warn!(error = %err, "error reading provider session");
                return None;
            }
        };

        let value: Value = match serde_json::from_str(&raw) {
            Ok(value) => value,
            Err(err) => {
                tracing::warn!(error = %err, "stored provider session is not valid JSON");
                return None;
            }
        };

        match validator::validate(&value) {
            Ok(record) => Some(record),
            Err(reason) => {
                tracing::warn!(%reason, "invalid session format, clearing session");
                let _ = self.clear().await;
                None
            }
        }
    }

    /// Delete the stored session. Clearing an empty store succeeds.
    pub async fn clear(&self) -> Result<(), SessionError> {
        match self.kv.remove(&self.key).await {
            Ok(()) => {
                tracing::debug!("provider session cleared");
                Ok(())
            }
            Err(err) => {
                tracing::error!(error = %err, "error clearing provider session");
                Err(err.into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use adapters::{AdapterError, Fields, MemoryKvStore};
    use async_trait::async_trait;
    use chrono::TimeZone;
    use serde_json::json;

    use crate::auth::models::{DriverProfile, SupervisorProfile};

    fn store() -> (MemoryKvStore, SessionStore) {
        let kv = MemoryKvStore::new();
        let store = SessionStore::new(Arc::new(kv.clone()), "providerSession");
        (kv, store)
    }

    fn supervisor_record() -> SessionRecord {
        let mut extra = Fields::new();
        extra.insert("name".into(), json!("Nimal"));
        SessionRecord::new(
            "u-sup",
            "sup@council.lk",
            ProviderProfile::Supervisor(SupervisorProfile {
                supervisor_id: "SUP001".into(),
                municipal_council: "Colombo".into(),
                district: "D1".into(),
                ward: "W1".into(),
                extra,
            }),
            Utc.with_ymd_and_hms(2024, 3, 1, 8, 30, 0).unwrap(),
        )
    }

    fn driver_record() -> SessionRecord {
        SessionRecord::new(
            "u-drv",
            "truck@council.lk",
            ProviderProfile::Driver(DriverProfile {
                truck_id: "TRUCK042".into(),
                municipal_council: "Colombo".into(),
                district: "D1".into(),
                ward: "W1".into(),
                supervisor_id: "SUP001".into(),
                extra: Fields::new(),
            }),
            Utc::now(),
        )
    }

    #[tokio::test]
    async fn save_then_load_round_trips() {
        let (_, store) = store();
        for record in [supervisor_record(), driver_record()] {
            store.save(&record).await.unwrap();
            assert_eq!(store.load().await, Some(record));
        }
    }

    #[tokio::test]
    async fn save_replaces_previous_record() {
        let (_, store) = store();
        store.save(&supervisor_record()).await.unwrap();
        store.save(&driver_record()).await.unwrap();
        assert_eq!(store.load().await.unwrap().uid(), "u-drv");
    }

    #[tokio::test]
    async fn clear_is_idempotent() {
        let (_, store) = store();
        store.clear().await.unwrap();
        store.save(&driver_record()).await.unwrap();
        store.clear().await.unwrap();
        store.clear().await.unwrap();
        assert_eq!(store.load().await, None);
    }

    #[tokio::test]
    async fn incomplete_record_is_not_persisted() {
        let (kv, store) = store();
        store.save(&supervisor_record()).await.unwrap();

        let broken = SessionRecord::new(
            "u-drv",
            "truck@council.lk",
            ProviderProfile::Driver(DriverProfile {
                truck_id: "TRUCK042".into(),
                municipal_council: "Colombo".into(),
                district: "D1".into(),
                ward: String::new(),
                supervisor_id: "SUP001".into(),
                extra: Fields::new(),
            }),
            Utc::now(),
        );
        let err = store.save(&broken).await.unwrap_err();
        assert!(matches!(err, SessionError::Invalid(_)));

        // The previous session is untouched.
        let raw = kv.get("providerSession").await.unwrap().unwrap();
        assert!(raw.contains("SUP001"));
        assert_eq!(store.load().await, Some(supervisor_record()));
    }

    #[tokio::test]
    async fn invalid_stored_shape_is_deleted_on_load() {
        let (kv, store) = store();
        let partial = json!({
            "uid": "u-sup",
            "email": "sup@council.lk",
            "userType": "supervisor",
            "profile": {"supervisorId": "SUP001", "district": "D1"},
            "timestamp": "2024-03-01T08:30:00Z"
        });
        kv.set("providerSession", &partial.to_string()).await.unwrap();

        assert_eq!(store.load().await, None);
        assert_eq!(kv.get("providerSession").await.unwrap(), None);
    }

    #[tokio::test]
    async fn unparseable_value_loads_as_absent() {
        let (kv, store) = store();
        kv.set("providerSession", "{not json").await.unwrap();
        assert_eq!(store.load().await, None);
    }

    struct BrokenKv;

    #[async_trait]
    impl KeyValueStore for BrokenKv {
        async fn get(&self, _key: &str) -> Result<Option<String>, AdapterError> {
            Err(AdapterError::Unavailable("disk gone".into()))
        }

        async fn set(&self, _key: &str, _value: &str) -> Result<(), AdapterError> {
            Err(AdapterError::Unavailable("disk gone".into()))
        }

        async fn remove(&self, _key: &str) -> Result<(), AdapterError> {
            Err(AdapterError::Unavailable("disk gone".into()))
        }
    }

    #[tokio::test]
    async fn storage_failures_degrade_to_absent() {
        let store = SessionStore::new(Arc::new(BrokenKv), "providerSession");
        assert_eq!(store.load().await, None);
        assert!(matches!(
            store.save(&driver_record()).await,
            Err(SessionError::Storage(_))
        ));
        assert!(store.clear().await.is_err());
    }

    #[tokio::test]
    async fn save_for_stamps_the_authenticated_user() {
        let (_, store) = store();
        let user = AuthUser {
            uid: "u-drv".into(),
            email: "truck@council.lk".into(),
            email_verified: true,
        };
        let saved = store
            .save_for(&user, driver_record().profile().clone())
            .await
            .unwrap();
        assert_eq!(saved.uid(), "u-drv");
        assert_eq!(store.load().await, Some(saved));
    }
}

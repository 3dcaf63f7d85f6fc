//! Provider login and logout.
//!
//! Identifiers are looked up in the council directory
//! (`municipalCouncils/*/Districts/*/Wards/*`), the backend sign-in uses the
//! email stored on the found document, and the resulting session is
//! persisted for the reconciler to pick up.

use std::sync::Arc;

use adapters::{AdapterError, AuthBackend, AuthUser, DocPath, Document, DocumentStore, Fields};
use serde_json::Value;

use crate::storage::SessionStore;

use super::errors::{AuthError, ValidationError};
use super::models::{ProviderProfile, Role};
use super::validator;

/// Fields of a directory document that never make it into a session.
const PRIVATE_FIELDS: [&str; 1] = ["password"];

#[derive(Debug, Clone, PartialEq)]
pub struct LoginOutcome {
    pub user: AuthUser,
    pub profile: ProviderProfile,
}

#[derive(Clone)]
pub struct AuthService {
    backend: Arc<dyn AuthBackend>,
    docs: Arc<dyn DocumentStore>,
    store: SessionStore,
}

impl AuthService {
    pub fn new(
        backend: Arc<dyn AuthBackend>,
        docs: Arc<dyn DocumentStore>,
        store: SessionStore,
    ) -> Self {
        Self {
            backend,
            docs,
            store,
        }
    }

    pub async fn login_supervisor(
        &self,
        supervisor_id: &str,
        password: &str,
    ) -> Result<LoginOutcome, AuthError> {
        self.login(Role::Supervisor, supervisor_id, password).await
    }

    pub async fn login_driver(
        &self,
        truck_id: &str,
        password: &str,
    ) -> Result<LoginOutcome, AuthError> {
        self.login(Role::Driver, truck_id, password).await
    }

    async fn login(&self, role: Role, raw_id: &str, password: &str) -> Result<LoginOutcome, AuthError> {
        let id = normalize_id(raw_id);
        if id.is_empty() || password.is_empty() {
            return Err(AuthError::MissingCredentials);
        }
        if !id.starts_with(role.id_prefix()) {
            return Err(AuthError::InvalidIdFormat(role));
        }

        let document = self.find(role, &id).await?;
        let email = document
            .str_field("email")
            .ok_or_else(|| {
                tracing::error!(path = %document.path, "directory entry has no email");
                AuthError::Backend("Login failed".into())
            })?
            .to_string();
        let profile = profile_from_document(role, &document).map_err(|reason| {
            tracing::error!(path = %document.path, %reason, "incomplete profile data");
            AuthError::Backend("Incomplete profile data".into())
        })?;

        let user = self
            .backend
            .sign_in(&email, password)
            .await
            .map_err(sign_in_error)?;
        tracing::info!(uid = %user.uid, %role, id = %id, "provider signed in");

        if let Err(err) = self.store.save_for(&user, profile.clone()).await {
            tracing::warn!(error = %err, "signed in but the session could not be saved");
        }
        Ok(LoginOutcome { user, profile })
    }

    /// Clear the local session, then sign out of the backend. A failed clear
    /// is logged and does not stop the sign-out.
    pub async fn logout(&self) -> Result<(), AuthError> {
        if let Err(err) = self.store.clear().await {
            tracing::warn!(error = %err, "local session not cleared, signing out anyway");
        }
        self.backend.sign_out().await.map_err(|err| {
            tracing::error!(error = %err, "error signing out");
            AuthError::Logout
        })?;
        tracing::info!("provider signed out");
        Ok(())
    }

    async fn find(&self, role: Role, id: &str) -> Result<Document, AuthError> {
        let found = match role {
            Role::Supervisor => self.find_supervisor(id).await,
            Role::Driver => self.find_truck(id).await,
        };
        match found {
            Ok(Some(document)) => Ok(document),
            Ok(None) => Err(match role {
                Role::Supervisor => AuthError::SupervisorNotFound,
                Role::Driver => AuthError::TruckNotFound,
            }),
            Err(err) => {
                tracing::error!(error = %err, %role, "directory lookup failed");
                Err(AuthError::Backend(err.to_string()))
            }
        }
    }

    async fn find_supervisor(&self, id: &str) -> Result<Option<Document>, AdapterError> {
        for council in self.docs.list(&DocPath::collection("municipalCouncils")).await? {
            for district in self.docs.list(&council.path.sub("Districts")).await? {
                for ward in self.docs.list(&district.path.sub("Wards")).await? {
                    let path = ward.path.sub("supervisors").doc(id);
                    if let Some(document) = self.docs.get(&path).await? {
                        return Ok(Some(document));
                    }
                }
            }
        }
        Ok(None)
    }

    async fn find_truck(&self, id: &str) -> Result<Option<Document>, AdapterError> {
        for council in self.docs.list(&DocPath::collection("municipalCouncils")).await? {
            for district in self.docs.list(&council.path.sub("Districts")).await? {
                for ward in self.docs.list(&district.path.sub("Wards")).await? {
                    for supervisor in self.docs.list(&ward.path.sub("supervisors")).await? {
                        let path = supervisor.path.sub("trucks").doc(id);
                        if let Some(document) = self.docs.get(&path).await? {
                            return Ok(Some(document));
                        }
                    }
                }
            }
        }
        Ok(None)
    }
}

fn normalize_id(raw: &str) -> String {
    raw.trim().to_uppercase()
}

fn sign_in_error(err: AdapterError) -> AuthError {
    match err {
        AdapterError::InvalidCredential => AuthError::InvalidPassword,
        other => {
            tracing::warn!(error = %other, "sign-in failed");
            AuthError::Backend(other.to_string())
        }
    }
}

/// Build a profile from a directory document. Location fields missing from
/// the document are taken from its path.
fn profile_from_document(
    role: Role,
    document: &Document,
) -> Result<ProviderProfile, ValidationError> {
    let mut fields: Fields = document.data.clone();
    for key in PRIVATE_FIELDS {
        fields.remove(key);
    }

    // municipalCouncils/{c}/Districts/{d}/Wards/{w}/supervisors/{s}[/trucks/{t}]
    let segments = document.path.segments();
    let mut from_path = vec![
        ("municipalCouncil", segments.get(1)),
        ("district", segments.get(3)),
        ("ward", segments.get(5)),
        ("supervisorId", segments.get(7)),
    ];
    if role == Role::Driver {
        from_path.push(("truckId", segments.get(9)));
    }
    for (key, value) in from_path {
        let Some(value) = value else { continue };
        let present = fields
            .get(key)
            .and_then(Value::as_str)
            .is_some_and(|s| !s.is_empty());
        if !present {
            fields.insert(key.to_string(), Value::String(value.clone()));
        }
    }

    validator::validate_profile(role, &fields)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use adapters::{KeyValueStore, MemoryBackend, MemoryKvStore, Subscription};
    use async_trait::async_trait;
    use serde_json::json;

    fn fields(value: Value) -> Fields {
        value.as_object().cloned().unwrap()
    }

    fn seeded() -> (MemoryBackend, AuthService, SessionStore) {
        let backend = MemoryBackend::new();
        let ward = DocPath::collection("municipalCouncils")
            .doc("Colombo")
            .sub("Districts")
            .doc("D1")
            .sub("Wards")
            .doc("W1");
        backend.insert_document(&DocPath::collection("municipalCouncils").doc("Colombo"), Fields::new());
        backend.insert_document(
            &DocPath::collection("municipalCouncils").doc("Colombo").sub("Districts").doc("D1"),
            Fields::new(),
        );
        backend.insert_document(&ward, Fields::new());
        let supervisor = ward.sub("supervisors").doc("SUP001");
        backend.insert_document(
            &supervisor,
            fields(json!({"email": "sup@council.lk", "name": "Nimal", "password": "x"})),
        );
        backend.insert_document(
            &supervisor.sub("trucks").doc("TRUCK042"),
            fields(json!({"email": "truck@council.lk", "driverName": "Kamal"})),
        );
        backend.register_account("u-sup", "sup@council.lk", "secret");
        backend.register_account("u-drv", "truck@council.lk", "secret");

        let store = SessionStore::new(Arc::new(MemoryKvStore::new()), "providerSession");
        let service = AuthService::new(Arc::new(backend.clone()), Arc::new(backend.clone()), store.clone());
        (backend, service, store)
    }

    #[tokio::test]
    async fn supervisor_login_persists_a_session() {
        let (_, service, store) = seeded();
        let outcome = service.login_supervisor("  sup001 ", "secret").await.unwrap();
        assert_eq!(outcome.profile.provider_id(), "SUP001");

        let saved = store.load().await.unwrap();
        assert_eq!(saved.uid(), "u-sup");
        let profile = saved.supervisor().unwrap();
        assert_eq!(profile.ward, "W1");
        assert_eq!(profile.name(), Some("Nimal"));
        assert!(!profile.extra.contains_key("password"));
    }

    #[tokio::test]
    async fn driver_login_fills_location_from_path() {
        let (_, service, store) = seeded();
        service.login_driver("TRUCK042", "secret").await.unwrap();
        let saved = store.load().await.unwrap();
        let profile = saved.driver().unwrap();
        assert_eq!(profile.supervisor_id, "SUP001");
        assert_eq!(profile.municipal_council, "Colombo");
        assert_eq!(profile.extra.get("driverName"), Some(&json!("Kamal")));
    }

    #[tokio::test]
    async fn rejects_bad_input_before_touching_the_backend() {
        let (backend, service, _) = seeded();
        backend.set_offline(true);
        assert_eq!(
            service.login_supervisor("", "secret").await,
            Err(AuthError::MissingCredentials)
        );
        assert_eq!(
            service.login_supervisor("TRUCK042", "secret").await,
            Err(AuthError::InvalidIdFormat(Role::Supervisor))
        );
        assert_eq!(
            service.login_driver("SUP001", "secret").await,
            Err(AuthError::InvalidIdFormat(Role::Driver))
        );
    }

    #[tokio::test]
    async fn unknown_ids_and_wrong_passwords() {
        let (_, service, store) = seeded();
        assert_eq!(
            service.login_supervisor("SUP999", "secret").await,
            Err(AuthError::SupervisorNotFound)
        );
        assert_eq!(
            service.login_driver("TRUCK999", "secret").await,
            Err(AuthError::TruckNotFound)
        );
        assert_eq!(
            service.login_driver("TRUCK042", "nope").await,
            Err(AuthError::InvalidPassword)
        );
        assert_eq!(store.load().await, None);
    }

    #[tokio::test]
    async fn logout_clears_session_and_signs_out() {
        let (backend, service, store) = seeded();
        service.login_driver("TRUCK042", "secret").await.unwrap();
        assert!(backend.current_user().is_some());

        service.logout().await.unwrap();
        assert_eq!(store.load().await, None);
        assert!(backend.current_user().is_none());

        backend.set_offline(true);
        assert_eq!(service.logout().await, Err(AuthError::Logout));
    }

    /// Key-value store that refuses to delete.
    struct StuckKv(MemoryKvStore);

    #[async_trait]
    impl KeyValueStore for StuckKv {
        async fn get(&self, key: &str) -> Result<Option<String>, AdapterError> {
            self.0.get(key).await
        }

        async fn set(&self, key: &str, value: &str) -> Result<(), AdapterError> {
            self.0.set(key, value).await
        }

        async fn remove(&self, _key: &str) -> Result<(), AdapterError> {
            Err(AdapterError::Unavailable("storage locked".into()))
        }
    }

    #[tokio::test]
    async fn logout_signs_out_even_if_local_clear_fails() {
        let (backend, _, _) = seeded();
        let store = SessionStore::new(Arc::new(StuckKv(MemoryKvStore::new())), "providerSession");
        let service = AuthService::new(Arc::new(backend.clone()), Arc::new(backend.clone()), store);
        service.login_driver("TRUCK042", "secret").await.unwrap();

        assert_eq!(service.logout().await, Ok(()));
        assert!(backend.current_user().is_none());
    }

    /// Document store that counts collection listings.
    struct ListCounter {
        inner: MemoryBackend,
        lists: AtomicUsize,
    }

    #[async_trait]
    impl DocumentStore for ListCounter {
        async fn get(&self, path: &DocPath) -> Result<Option<Document>, AdapterError> {
            self.inner.get(path).await
        }

        async fn set(&self, path: &DocPath, data: Fields) -> Result<(), AdapterError> {
            self.inner.set(path, data).await
        }

        async fn update(&self, path: &DocPath, fields: Fields) -> Result<(), AdapterError> {
            self.inner.update(path, fields).await
        }

        async fn list(&self, collection: &DocPath) -> Result<Vec<Document>, AdapterError> {
            self.lists.fetch_add(1, Ordering::SeqCst);
            self.inner.list(collection).await
        }

        fn subscribe(&self, collection: &DocPath) -> Subscription<Vec<Document>> {
            self.inner.subscribe(collection)
        }
    }

    #[tokio::test]
    async fn directory_walk_stops_at_first_match() {
        let (backend, _, store) = seeded();
        let galle = DocPath::collection("municipalCouncils").doc("Galle");
        let district = galle.sub("Districts").doc("D9");
        for path in [&galle, &district, &district.sub("Wards").doc("W9")] {
            backend.insert_document(path, Fields::new());
        }
        let docs = Arc::new(ListCounter {
            inner: backend.clone(),
            lists: AtomicUsize::new(0),
        });
        let service = AuthService::new(Arc::new(backend.clone()), docs.clone(), store);

        service.login_supervisor("SUP001", "secret").await.unwrap();
        // councils, Colombo's districts, D1's wards; Galle is never opened.
        assert_eq!(docs.lists.load(Ordering::SeqCst), 3);
    }
}

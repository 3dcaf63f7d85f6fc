//! In-process backend implementing [`AuthBackend`] and [`DocumentStore`].
//!
//! Accounts, documents and subscribers live behind synchronous locks; no lock
//! is held across an await point. Subscribers whose [`Subscription`] has been
//! dropped are pruned on the next delivery.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc::UnboundedSender;

use crate::errors::AdapterError;
use crate::models::{AuthUser, DocPath, Document, Fields, Subscription};
use crate::{AuthBackend, DocumentStore};

#[derive(Debug, Clone)]
struct Account {
    uid: String,
    password: String,
}

#[derive(Debug, Default)]
struct Inner {
    accounts: Mutex<HashMap<String, Account>>,
    current: Mutex<Option<AuthUser>>,
    auth_watchers: Mutex<Vec<UnboundedSender<Option<AuthUser>>>>,
    docs: Mutex<BTreeMap<DocPath, Fields>>,
    doc_watchers: Mutex<Vec<(DocPath, UnboundedSender<Vec<Document>>)>>,
    offline: AtomicBool,
}

/// In-memory backend for the development shell and tests.
#[derive(Clone, Debug, Default)]
pub struct MemoryBackend {
    inner: Arc<Inner>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_account(&self, uid: &str, email: &str, password: &str) {
        self.inner.accounts.lock().insert(
            email.to_lowercase(),
            Account {
                uid: uid.to_string(),
                password: password.to_string(),
            },
        );
    }

    /// Replace the signed-in identity and notify subscribers, as the hosted
    /// backend does when a token is restored or revoked out of band.
    pub fn emit_auth_state(&self, user: Option<AuthUser>) {
        *self.inner.current.lock() = user.clone();
        self.notify_auth(user);
    }

    pub fn auth_subscriber_count(&self) -> usize {
        let mut watchers = self.inner.auth_watchers.lock();
        watchers.retain(|tx| !tx.is_closed());
        watchers.len()
    }

    /// While offline every async call fails with [`AdapterError::Unavailable`].
    pub fn set_offline(&self, offline: bool) {
        self.inner.offline.store(offline, Ordering::SeqCst);
    }

    /// Seed a document without going through the async API.
    pub fn insert_document(&self, path: &DocPath, data: Fields) {
        self.inner.docs.lock().insert(path.clone(), data);
        self.notify_docs(path);
    }

    pub fn document(&self, path: &DocPath) -> Option<Fields> {
        self.inner.docs.lock().get(path).cloned()
    }

    fn ensure_online(&self) -> Result<(), AdapterError> {
        if self.inner.offline.load(Ordering::SeqCst) {
            return Err(AdapterError::Unavailable("backend offline".into()));
        }
        Ok(())
    }

    fn notify_auth(&self, user: Option<AuthUser>) {
        self.inner
            .auth_watchers
            .lock()
            .retain(|tx| tx.send(user.clone()).is_ok());
    }

    fn children(&self, collection: &DocPath) -> Vec<Document> {
        self.inner
            .docs
            .lock()
            .iter()
            .filter(|(path, _)| path.parent().as_ref() == Some(collection))
            .map(|(path, data)| Document {
                path: path.clone(),
                data: data.clone(),
            })
            .collect()
    }

    fn notify_docs(&self, changed: &DocPath) {
        let Some(collection) = changed.parent() else {
            return;
        };
        let snapshot = self.children(&collection);
        self.inner.doc_watchers.lock().retain(|(watched, tx)| {
            if *watched != collection {
                return !tx.is_closed();
            }
            tx.send(snapshot.clone()).is_ok()
        });
    }
}

#[async_trait]
impl AuthBackend for MemoryBackend {
    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthUser, AdapterError> {
        self.ensure_online()?;
        let account = self
            .inner
            .accounts
            .lock()
            .get(&email.to_lowercase())
            .cloned()
            .ok_or_else(|| AdapterError::UserNotFound(email.to_string()))?;
        if account.password != password {
            return Err(AdapterError::InvalidCredential);
        }

        let user = AuthUser {
            uid: account.uid,
            email: email.to_string(),
            email_verified: true,
        };
        tracing::debug!(uid = %user.uid, "memory backend sign-in");
        self.emit_auth_state(Some(user.clone()));
        Ok(user)
    }

    async fn sign_out(&self) -> Result<(), AdapterError> {
        self.ensure_online()?;
        self.emit_auth_state(None);
        Ok(())
    }

    fn current_user(&self) -> Option<AuthUser> {
        self.inner.current.lock().clone()
    }

    fn subscribe_auth_state(&self) -> Subscription<Option<AuthUser>> {
        let (tx, subscription) = Subscription::channel();
        let _ = tx.send(self.current_user());
        self.inner.auth_watchers.lock().push(tx);
        subscription
    }
}

#[async_trait]
impl DocumentStore for MemoryBackend {
    async fn get(&self, path: &DocPath) -> Result<Option<Document>, AdapterError> {
        self.ensure_online()?;
        Ok(self.document(path).map(|data| Document {
            path: path.clone(),
            data,
        }))
    }

    async fn set(&self, path: &DocPath, data: Fields) -> Result<(), AdapterError> {
        self.ensure_online()?;
        if !path.is_document() {
            return Err(AdapterError::InvalidPath(path.to_string()));
        }
        self.insert_document(path, data);
        Ok(())
    }

    async fn update(&self, path: &DocPath, fields: Fields) -> Result<(), AdapterError> {
        self.ensure_online()?;
        {
            let mut docs = self.inner.docs.lock();
            let existing = docs
                .get_mut(path)
                .ok_or_else(|| AdapterError::NotFound(path.to_string()))?;
            existing.extend(fields);
        }
        self.notify_docs(path);
        Ok(())
    }

    async fn list(&self, collection: &DocPath) -> Result<Vec<Document>, AdapterError> {
        self.ensure_online()?;
        if !collection.is_collection() {
            return Err(AdapterError::InvalidPath(collection.to_string()));
        }
        Ok(self.children(collection))
    }

    fn subscribe(&self, collection: &DocPath) -> Subscription<Vec<Document>> {
        let (tx, subscription) = Subscription::channel();
        let _ = tx.send(self.children(collection));
        self.inner
            .doc_watchers
            .lock()
            .push((collection.clone(), tx));
        subscription
    }
}

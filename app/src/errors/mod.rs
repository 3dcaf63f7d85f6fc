//! Global application error types and the top-level error boundary.
//!
//! [`AppError`] gathers the per-layer errors. [`ErrorBoundary`] turns a panic
//! or a fatal error in a supervised task into a `Failed` state that the
//! navigation layer renders as a recovery screen until it is reset.

use std::any::Any;
use std::future::Future;
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use adapters::AdapterError;

use crate::auth::errors::{AuthError, SessionError};
use crate::services::{ContactError, TicketError, TrackingError};

#[derive(Debug, Error)]
pub enum AppError {
    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Tracking(#[from] TrackingError),

    #[error(transparent)]
    Ticket(#[from] TicketError),

    #[error(transparent)]
    Contact(#[from] ContactError),

    #[error(transparent)]
    Adapter(#[from] AdapterError),

    #[error("task `{task}` panicked: {message}")]
    Panic { task: &'static str, message: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BoundaryState {
    Healthy,
    Failed { message: String },
}

/// Aborts the supervised task if the supervisor itself is dropped or aborted.
struct Guard(JoinHandle<()>);

impl Drop for Guard {
    fn drop(&mut self) {
        self.0.abort();
    }
}

#[derive(Clone)]
pub struct ErrorBoundary {
    state: Arc<watch::Sender<BoundaryState>>,
}

impl Default for ErrorBoundary {
    fn default() -> Self {
        Self::new()
    }
}

impl ErrorBoundary {
    pub fn new() -> Self {
        let (state, _) = watch::channel(BoundaryState::Healthy);
        Self {
            state: Arc::new(state),
        }
    }

    pub fn state(&self) -> BoundaryState {
        self.state.borrow().clone()
    }

    pub fn is_failed(&self) -> bool {
        matches!(*self.state.borrow(), BoundaryState::Failed { .. })
    }

    pub fn subscribe(&self) -> watch::Receiver<BoundaryState> {
        self.state.subscribe()
    }

    pub fn trip(&self, error: &AppError) {
        tracing::error!(error = %error, "unrecoverable error, showing recovery screen");
        self.state.send_replace(BoundaryState::Failed {
            message: error.to_string(),
        });
    }

    pub fn reset(&self) {
        if self.is_failed() {
            tracing::info!("error boundary reset");
        }
        self.state.send_replace(BoundaryState::Healthy);
    }

    /// Spawn `fut` under the boundary: a panic trips it. Aborting the returned
    /// handle aborts `fut` as well.
    pub fn spawn<F>(&self, task: &'static str, fut: F) -> JoinHandle<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let boundary = self.clone();
        let mut inner = Guard(tokio::spawn(fut));
        tokio::spawn(async move {
            match (&mut inner.0).await {
                Ok(()) => {}
                Err(err) if err.is_panic() => {
                    boundary.trip(&AppError::Panic {
                        task,
                        message: panic_message(err.into_panic()),
                    });
                }
                Err(_) => tracing::debug!(task, "supervised task cancelled"),
            }
        })
    }

    /// Run a fallible operation under the boundary. Errors and panics trip it
    /// and yield `None`.
    pub async fn guard<T, F>(&self, task: &'static str, fut: F) -> Option<T>
    where
        T: Send + 'static,
        F: Future<Output = Result<T, AppError>> + Send + 'static,
    {
        match tokio::spawn(fut).await {
            Ok(Ok(value)) => Some(value),
            Ok(Err(err)) => {
                self.trip(&err);
                None
            }
            Err(err) if err.is_panic() => {
                self.trip(&AppError::Panic {
                    task,
                    message: panic_message(err.into_panic()),
                });
                None
            }
            Err(_) => None,
        }
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        return (*message).to_string();
    }
    if let Some(message) = payload.downcast_ref::<String>() {
        return message.clone();
    }
    "unknown panic".to_string()
}

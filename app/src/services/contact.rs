//! Phone call and text message actions.

use std::sync::Arc;

use thiserror::Error;

use adapters::UriLauncher;

/// The display strings are shown to the user as-is.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContactError {
    #[error("Phone number not available")]
    MissingNumber,

    #[error("Phone calls not supported on this device")]
    CallsUnsupported,

    #[error("Cannot send messages from this device")]
    MessagesUnsupported,

    #[error("Failed to make call. Please try again.")]
    CallFailed,

    #[error("Failed to send message. Please try again.")]
    MessageFailed,
}

#[derive(Clone)]
pub struct ContactService {
    launcher: Arc<dyn UriLauncher>,
}

impl ContactService {
    pub fn new(launcher: Arc<dyn UriLauncher>) -> Self {
        Self { launcher }
    }

    pub async fn make_phone_call(&self, number: Option<&str>) -> Result<(), ContactError> {
        self.launch("tel", number, ContactError::CallsUnsupported, ContactError::CallFailed)
            .await
    }

    pub async fn send_text_message(&self, number: Option<&str>) -> Result<(), ContactError> {
        self.launch(
            "sms",
            number,
            ContactError::MessagesUnsupported,
            ContactError::MessageFailed,
        )
        .await
    }

    async fn launch(
        &self,
        scheme: &str,
        number: Option<&str>,
        unsupported: ContactError,
        failed: ContactError,
    ) -> Result<(), ContactError> {
        let number = number
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .ok_or(ContactError::MissingNumber)?;
        let uri = format!("{scheme}:{number}");

        let supported = self.launcher.can_open(&uri).await.map_err(|err| {
            tracing::error!(error = %err, %uri, "error checking uri support");
            failed.clone()
        })?;
        if !supported {
            return Err(unsupported);
        }
        self.launcher.open(&uri).await.map_err(|err| {
            tracing::error!(error = %err, %uri, "error opening uri");
            failed
        })
    }
}

//! Development shell for the WasteTrack provider core.
//!
//! Runs the app shell against the in-memory backend with file-backed session
//! storage and logs every navigation change until interrupted.

use std::sync::Arc;

use anyhow::Context;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use adapters::{FileKvStore, MemoryBackend, RecordingLauncher, ScriptedLocation};
use wastetrack::config::LogSettings;
use wastetrack::{AppShell, Collaborators, Settings};

fn init_tracing(log: &LogSettings) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&log.filter))
        .context("invalid log filter")?;
    let builder = fmt().with_env_filter(filter);
    let result = if log.json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    result.map_err(|err| anyhow::anyhow!("failed to install tracing subscriber: {err}"))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = Settings::load().context("loading settings")?;
    init_tracing(&settings.log)?;
    info!(
        storage_dir = %settings.session.storage_dir.display(),
        key = %settings.session.key,
        "WasteTrack starting"
    );

    let backend = MemoryBackend::new();
    let collaborators = Collaborators {
        kv: Arc::new(FileKvStore::new(settings.session.storage_dir.clone())),
        auth: Arc::new(backend.clone()),
        docs: Arc::new(backend),
        location: Arc::new(ScriptedLocation::granted()),
        launcher: Arc::new(RecordingLauncher::with_schemes(["tel", "sms"])),
    };

    let mut shell = AppShell::new(settings, collaborators);
    shell.start();
    let mut auth = shell.subscribe().context("reconciler not running")?;
    let mut boundary = shell.boundary().subscribe();

    let mut current = shell.navigation();
    info!(stack = ?current, screen = ?current.initial_screen(), "navigation");

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    loop {
        tokio::select! {
            _ = &mut ctrl_c => break,
            changed = auth.changed() => {
                if changed.is_err() {
                    break;
                }
            }
            changed = boundary.changed() => {
                if changed.is_err() {
                    break;
                }
            }
        }
        let next = shell.navigation();
        if next != current {
            info!(stack = ?next, screen = ?next.initial_screen(), "navigation");
            current = next;
        }
    }

    shell.shutdown().await;
    Ok(())
}

mod common;

use std::sync::Arc;
use std::time::Duration;

use adapters::{
    DocPath, FileKvStore, Fields, MemoryBackend, MemoryKvStore, Position, RecordingLauncher,
    ScriptedLocation,
};
use serde_json::json;

use common::*;
use wastetrack::auth::{AuthError, Role};
use wastetrack::services::RouteStatus;
use wastetrack::{AppError, AppShell, Collaborators, NavigationStack, Settings};

fn fields(value: serde_json::Value) -> Fields {
    value.as_object().cloned().unwrap()
}

/// Directory with one supervisor (SUP001) and one truck (TRUCK042).
fn seeded_backend() -> MemoryBackend {
    let backend = MemoryBackend::new();
    let council = DocPath::collection("municipalCouncils").doc("Colombo");
    let district = council.sub("Districts").doc("D1");
    let ward = district.sub("Wards").doc("W1");
    let supervisor = ward.sub("supervisors").doc("SUP001");
    for path in [&council, &district, &ward] {
        backend.insert_document(path, Fields::new());
    }
    backend.insert_document(
        &supervisor,
        fields(json!({"email": "sup@council.lk", "name": "Nimal"})),
    );
    backend.insert_document(
        &supervisor.sub("trucks").doc("TRUCK042"),
        fields(json!({"email": "truck@council.lk", "driverName": "Kamal"})),
    );
    backend.register_account("u-sup", "sup@council.lk", "secret");
    backend.register_account("u-drv", "truck@council.lk", "secret");
    backend
}

fn shell(backend: &MemoryBackend, kv: Arc<dyn adapters::KeyValueStore>, location: &ScriptedLocation) -> AppShell {
    let mut settings = Settings::default();
    settings.reconciler = reconciler_settings();
    AppShell::new(
        settings,
        Collaborators {
            kv,
            auth: Arc::new(backend.clone()),
            docs: Arc::new(backend.clone()),
            location: Arc::new(location.clone()),
            launcher: Arc::new(RecordingLauncher::with_schemes(["tel", "sms"])),
        },
    )
}

#[tokio::test(start_paused = true)]
async fn driver_login_tracking_and_logout() {
    let backend = seeded_backend();
    let location = ScriptedLocation::granted();
    let mut shell = shell(&backend, Arc::new(MemoryKvStore::new()), &location);
    assert_eq!(shell.navigation(), NavigationStack::Loading);
    shell.start();
    let mut rx = shell.subscribe().unwrap();
    wait_for(&mut rx, is_unauthenticated).await;
    assert_eq!(shell.navigation(), NavigationStack::Public);
    assert!(shell.tracker_for_session().is_none());

    let outcome = shell.auth().login_driver("truck042", "secret").await.unwrap();
    assert_eq!(outcome.profile.role(), Role::Driver);
    wait_for(&mut rx, is_authenticated_as("u-drv")).await;
    assert_eq!(shell.navigation(), NavigationStack::Driver);

    let tracker = shell.tracker_for_session().unwrap();
    tracker.start_route().await.unwrap();
    location.push(Position::new(6.9271, 79.8612));
    let truck_path = tracker.truck_path().clone();
    for _ in 0..50 {
        if backend
            .document(&truck_path)
            .is_some_and(|doc| doc.contains_key("currentLocation"))
        {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    let truck = backend.document(&truck_path).unwrap();
    assert_eq!(truck["routeStatus"], json!(RouteStatus::Active.as_str()));
    assert_eq!(truck["currentLocation"]["longitude"], json!(79.8612));
    drop(tracker);

    shell.auth().logout().await.unwrap();
    wait_for(&mut rx, is_unauthenticated).await;
    assert_eq!(shell.navigation(), NavigationStack::Public);
    assert_eq!(shell.store().load().await, None);
    shell.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn supervisor_login_lands_on_supervisor_stack() {
    let backend = seeded_backend();
    let mut shell = shell(&backend, Arc::new(MemoryKvStore::new()), &ScriptedLocation::granted());
    shell.start();
    let mut rx = shell.subscribe().unwrap();
    wait_for(&mut rx, is_unauthenticated).await;

    assert_eq!(
        shell.auth().login_supervisor("SUP001", "wrong").await,
        Err(AuthError::InvalidPassword)
    );
    assert_eq!(shell.navigation(), NavigationStack::Public);

    shell.auth().login_supervisor("SUP001", "secret").await.unwrap();
    let snapshot = wait_for(&mut rx, is_authenticated_as("u-sup")).await;
    assert_eq!(snapshot.session().unwrap().supervisor().unwrap().name(), Some("Nimal"));
    assert_eq!(shell.navigation(), NavigationStack::Supervisor);
    assert!(shell.tracker_for_session().is_none());
    shell.shutdown().await;
}

#[tokio::test]
async fn session_survives_restart_with_file_storage() {
    let dir = tempfile::tempdir().unwrap();
    let backend = seeded_backend();

    let first = shell(&backend, Arc::new(FileKvStore::new(dir.path())), &ScriptedLocation::granted());
    first.auth().login_driver("TRUCK042", "secret").await.unwrap();
    first.shutdown().await;

    // The backend restores the same account on relaunch.
    let mut second = shell(&backend, Arc::new(FileKvStore::new(dir.path())), &ScriptedLocation::granted());
    second.start();
    let mut rx = second.subscribe().unwrap();
    let snapshot = wait_for(&mut rx, |s| !s.loading).await;
    assert_eq!(snapshot.session().map(|s| s.uid()), Some("u-drv"));
    assert_eq!(second.navigation(), NavigationStack::Driver);
    second.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn retry_recovers_from_a_tripped_boundary() {
    let backend = seeded_backend();
    let mut shell = shell(&backend, Arc::new(MemoryKvStore::new()), &ScriptedLocation::granted());
    shell.start();
    let mut rx = shell.subscribe().unwrap();
    wait_for(&mut rx, is_unauthenticated).await;

    shell
        .boundary()
        .trip(&AppError::from(AuthError::Backend("render failed".into())));
    assert_eq!(shell.navigation(), NavigationStack::Recovery);

    shell.retry().await;
    let mut rx = shell.subscribe().unwrap();
    wait_for(&mut rx, is_unauthenticated).await;
    assert_eq!(shell.navigation(), NavigationStack::Public);
    assert_eq!(backend.auth_subscriber_count(), 1);
    shell.shutdown().await;
}

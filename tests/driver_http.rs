use std::sync::Arc;
use std::time::Duration;

use leak_lab::{
    app::build_router,
    driver::{Driver, DriverError, HttpLeakApi, LeakApi, ScenarioReport},
    leak::LeakStore,
    repository::{InMemoryItemRepository, ItemRepository},
    snapshot::{SnapshotCapturer, UnavailableProfiler},
    state::AppState,
};
use tokio::net::TcpListener;

struct Server {
    base_url: String,
    repo: Arc<InMemoryItemRepository>,
    leaks: Arc<LeakStore>,
}

async fn spawn_server() -> Server {
    let repo = Arc::new(InMemoryItemRepository::new());
    let leaks = Arc::new(LeakStore::new());
    let state = AppState::new(
        repo.clone(),
        Arc::clone(&leaks),
        SnapshotCapturer::new(Arc::new(UnavailableProfiler)),
    );

    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("ephemeral port should bind");
    let addr = listener.local_addr().expect("bound address");

    tokio::spawn(async move {
        axum::serve(listener, build_router(state))
            .await
            .expect("server should run");
    });

    Server {
        base_url: format!("http://{addr}"),
        repo,
        leaks,
    }
}

#[tokio::test]
async fn create_scenario_persists_three_items() {
    let server = spawn_server().await;
    let driver = Driver::new(HttpLeakApi::new(server.base_url.as_str()));

    let report = driver
        .run_scenario("create", 3, Duration::ZERO)
        .await
        .expect("scenario should run");

    assert_eq!(
        report,
        ScenarioReport {
            succeeded: 3,
            failed: 0
        }
    );
    let items = server.repo.list().await.unwrap();
    assert_eq!(items.len(), 3);
    assert!(items.iter().all(|item| item.name.len() == 5));
    assert!(items.iter().all(|item| item.description.len() == 20));

    let listed = driver.api().list_items().await.unwrap();
    assert_eq!(listed, items);
}

#[tokio::test]
async fn leak_scenario_grows_server_state() {
    let server = spawn_server().await;
    let driver = Driver::new(HttpLeakApi::new(format!("{}/", server.base_url)));

    driver
        .run_scenario("leak", 4, Duration::ZERO)
        .await
        .expect("scenario should run");

    assert_eq!(server.leaks.retained_len().unwrap(), 4);
}

#[tokio::test]
async fn snapshot_failures_are_counted_not_fatal() {
    let server = spawn_server().await;
    let driver = Driver::new(HttpLeakApi::new(server.base_url.as_str()));

    let report = driver
        .run_scenario("snap-gc", 2, Duration::ZERO)
        .await
        .expect("scenario should run");
    assert_eq!(report.failed, 2);

    let err = driver.api().snap().await.unwrap_err();
    assert!(matches!(err, DriverError::Status { status: 503, .. }));

    assert!(driver.api().root().await.is_ok());
}

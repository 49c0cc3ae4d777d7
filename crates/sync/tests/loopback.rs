//! End-to-end tests of the sync manager against a loopback WebSocket
//! server.
//!
//! The server side is a bare `tokio-tungstenite` acceptor that answers
//! every `sync:request` with a snapshot and can drop the connection on
//! demand.

use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use lineage_core::jobs::JobTracker;
use lineage_core::model::GraphModel;
use lineage_sync::client::SyncClient;
use lineage_sync::events::SyncEvent;
use lineage_sync::manager::SyncManager;
use lineage_sync::messages::GenerateRequest;
use lineage_sync::reconnect::ReconnectConfig;
use lineage_sync::state::ConnectionStatus;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc, RwLock};
use tokio_tungstenite::tungstenite::Message;

const SNAPSHOT: &str = r#"{
    "type": "sync:state",
    "assets": [{"id": "a1", "name": "Hero", "type": "character"}],
    "variants": [{"id": "v1", "assetId": "a1", "status": "completed"}],
    "lineage": []
}"#;

fn fast_reconnect(max_attempts: u32) -> ReconnectConfig {
    ReconnectConfig {
        initial_delay: Duration::from_millis(10),
        max_delay: Duration::from_millis(50),
        multiplier: 2.0,
        max_attempts,
    }
}

fn shared_state() -> (Arc<RwLock<GraphModel>>, Arc<RwLock<JobTracker>>) {
    (
        Arc::new(RwLock::new(GraphModel::new())),
        Arc::new(RwLock::new(JobTracker::new())),
    )
}

/// Wait for the first event matching `pred`, failing after two seconds.
async fn wait_for(
    rx: &mut broadcast::Receiver<SyncEvent>,
    pred: impl Fn(&SyncEvent) -> bool,
) -> SyncEvent {
    tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            match rx.recv().await {
                Ok(event) if pred(&event) => return event,
                Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => panic!("event channel closed"),
            }
        }
    })
    .await
    .expect("timed out waiting for sync event")
}

/// Accepts connections forever. Each text frame received is forwarded to
/// `frames`; `sync:request` is answered with [`SNAPSHOT`]. A unit sent on
/// the returned channel closes the current connection.
async fn spawn_server(frames: mpsc::UnboundedSender<String>) -> (String, mpsc::UnboundedSender<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (drop_tx, mut drop_rx) = mpsc::unbounded_channel::<()>();

    tokio::spawn(async move {
        while let Ok((socket, _)) = listener.accept().await {
            let mut ws = tokio_tungstenite::accept_async(socket).await.unwrap();
            loop {
                tokio::select! {
                    Some(()) = drop_rx.recv() => {
                        let _ = ws.close(None).await;
                        break;
                    }
                    frame = ws.next() => match frame {
                        Some(Ok(Message::Text(text))) => {
                            let is_sync = text.contains("sync:request");
                            let _ = frames.send(text);
                            if is_sync {
                                ws.send(Message::Text(SNAPSHOT.to_string())).await.unwrap();
                            }
                        }
                        Some(Ok(_)) => {}
                        _ => break,
                    },
                }
            }
        }
    });

    (format!("ws://{addr}"), drop_tx)
}

// ---------------------------------------------------------------------------
// Test: snapshot on connect
// ---------------------------------------------------------------------------

/// Connecting sends `sync:request` and the answering snapshot lands in the
/// injected model.
#[tokio::test]
async fn connect_requests_and_applies_snapshot() {
    let (frames_tx, mut frames_rx) = mpsc::unbounded_channel();
    let (url, _drop_tx) = spawn_server(frames_tx).await;
    let (model, jobs) = shared_state();

    let client = SyncClient::new(url, "space-1", None);
    let manager = SyncManager::start(client, fast_reconnect(5), model.clone(), jobs).await;
    let mut events = manager.subscribe();

    wait_for(&mut events, |e| matches!(e, SyncEvent::ModelChanged(_))).await;

    let first = frames_rx.recv().await.unwrap();
    assert!(first.contains("sync:request"));
    assert_eq!(model.read().await.asset_count(), 1);
    assert!(manager.current_status().is_connected());

    manager.shutdown().await;
}

// ---------------------------------------------------------------------------
// Test: reconnect resyncs
// ---------------------------------------------------------------------------

/// A dropped connection is re-established with a fresh `sync:request`
/// under a new generation.
#[tokio::test]
async fn reconnect_requests_fresh_snapshot() {
    let (frames_tx, mut frames_rx) = mpsc::unbounded_channel();
    let (url, drop_tx) = spawn_server(frames_tx).await;
    let (model, jobs) = shared_state();

    let client = SyncClient::new(url, "space-1", Some("secret".into()));
    let manager = SyncManager::start(client, fast_reconnect(5), model, jobs).await;
    let mut events = manager.subscribe();

    wait_for(&mut events, |e| matches!(e, SyncEvent::Connected { .. })).await;
    assert!(frames_rx.recv().await.unwrap().contains("sync:request"));

    drop_tx.send(()).unwrap();
    wait_for(&mut events, |e| matches!(e, SyncEvent::Disconnected { .. })).await;
    let reconnected = wait_for(&mut events, |e| matches!(e, SyncEvent::Connected { .. })).await;

    assert_eq!(reconnected, SyncEvent::Connected { generation: 2 });
    assert!(frames_rx.recv().await.unwrap().contains("sync:request"));

    manager.shutdown().await;
}

// ---------------------------------------------------------------------------
// Test: outbound requests
// ---------------------------------------------------------------------------

/// Generation requests reach the server and register a pending job.
#[tokio::test]
async fn generate_registers_job_and_sends_request() {
    let (frames_tx, mut frames_rx) = mpsc::unbounded_channel();
    let (url, _drop_tx) = spawn_server(frames_tx).await;
    let (model, jobs) = shared_state();

    let client = SyncClient::new(url, "space-1", None);
    let manager = SyncManager::start(client, fast_reconnect(5), model, jobs.clone()).await;
    let mut events = manager.subscribe();
    wait_for(&mut events, |e| matches!(e, SyncEvent::ModelChanged(_))).await;
    frames_rx.recv().await.unwrap();

    let request_id = manager
        .generate(GenerateRequest::new("a lighthouse at dusk").for_asset("a1"))
        .await
        .expect("connected manager should send");

    let frame = tokio::time::timeout(Duration::from_secs(2), frames_rx.recv())
        .await
        .unwrap()
        .unwrap();
    let json: serde_json::Value = serde_json::from_str(&frame).unwrap();
    assert_eq!(json["type"], "generate:request");
    assert_eq!(json["requestId"], request_id.as_str());

    assert!(jobs.read().await.is_generating(Some("a1"), None));

    manager.shutdown().await;
}

// ---------------------------------------------------------------------------
// Test: terminal failure
// ---------------------------------------------------------------------------

/// With nothing listening, the manager retries up to the ceiling, then
/// reports a terminal error and stops. Sends while disconnected are
/// dropped and register no job.
#[tokio::test]
async fn gives_up_after_attempt_ceiling() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let (model, jobs) = shared_state();
    let client = SyncClient::new(format!("ws://{addr}"), "space-1", None);
    let manager = SyncManager::start(client, fast_reconnect(2), model, jobs.clone()).await;
    let mut status = manager.status();
    let mut events = manager.subscribe();

    assert!(!manager.request_sync().await);
    assert!(manager.generate(GenerateRequest::new("x")).await.is_none());
    assert!(jobs.read().await.is_empty());

    let gave_up = wait_for(&mut events, |e| matches!(e, SyncEvent::GaveUp { .. })).await;
    assert_eq!(gave_up, SyncEvent::GaveUp { attempts: 2 });

    let terminal = status.wait_for(|s| s.is_terminal()).await.unwrap().clone();
    assert!(matches!(terminal, ConnectionStatus::Error { terminal: true, .. }));
    assert_eq!(manager.generation(), 3);

    manager.shutdown().await;
}

// ---------------------------------------------------------------------------
// Test: default backoff schedule
// ---------------------------------------------------------------------------

/// With the default policy the manager waits 1s, 2s, 4s, 8s and 16s
/// between attempts, then reports a terminal error. Runs on a paused clock
/// so the sleeps complete instantly.
#[tokio::test(start_paused = true)]
async fn default_backoff_schedule_ends_terminal() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let (model, jobs) = shared_state();
    let client = SyncClient::new(format!("ws://{addr}"), "space-1", None);
    let manager = SyncManager::start(client, ReconnectConfig::default(), model, jobs).await;
    let mut events = manager.subscribe();

    // No timeout: on a paused clock it could fire while a connect is in flight.
    let mut delays = Vec::new();
    let attempts = loop {
        match events.recv().await.unwrap() {
            SyncEvent::StatusChanged(ConnectionStatus::Reconnecting { attempt, delay_ms }) => {
                assert_eq!(attempt as usize, delays.len() + 1);
                delays.push(delay_ms);
            }
            SyncEvent::GaveUp { attempts } => break attempts,
            _ => {}
        }
    };

    assert_eq!(delays, vec![1000, 2000, 4000, 8000, 16000]);
    assert_eq!(attempts, 5);
    assert!(manager.current_status().is_terminal());
    assert_eq!(manager.generation(), 6);

    manager.shutdown().await;
}

//! Sync connection manager.
//!
//! [`SyncManager`] owns the single WebSocket connection for a space. It
//! spawns two tasks: a connection loop (connect -> pump frames ->
//! backoff -> reconnect) and a processor that applies queued frames to
//! the injected model and job tracker in receipt order.
//!
//! Events are broadcast via a [`tokio::sync::broadcast`] channel; the
//! connection status is additionally published on a
//! [`tokio::sync::watch`] channel.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use lineage_core::jobs::JobTracker;
use lineage_core::model::{AssetType, GraphModel};
use lineage_core::types::{AssetId, VariantId};
use tokio::sync::{broadcast, mpsc, watch, Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;

use crate::client::{SyncClient, SyncClientError, SyncConnection};
use crate::events::SyncEvent;
use crate::messages::{
    new_request_id, BatchRequest, ClientMessage, ForkRequest, GenerateRequest, RefineRequest,
};
use crate::processor::{process_inbound, Inbound};
use crate::reconnect::{Backoff, BackoffStep, ReconnectConfig};
use crate::state::ConnectionStatus;

/// Broadcast channel capacity for sync events.
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// How long [`SyncManager::shutdown`] waits for each task.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Manages the live connection for one space.
///
/// Created via [`SyncManager::start`]. The returned `Arc` can be cheaply
/// cloned into anything that needs to send requests or subscribe.
pub struct SyncManager {
    client: SyncClient,
    reconnect: ReconnectConfig,
    model: Arc<RwLock<GraphModel>>,
    jobs: Arc<RwLock<JobTracker>>,
    event_tx: broadcast::Sender<SyncEvent>,
    status_tx: watch::Sender<ConnectionStatus>,
    /// Writer for the open connection; `None` while disconnected.
    outbound: RwLock<Option<mpsc::UnboundedSender<Message>>>,
    /// Incremented on every connection attempt.
    generation: AtomicU64,
    /// Master cancellation token, cancelled during shutdown.
    cancel: CancellationToken,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl SyncManager {
    /// Spawn the connection and processor tasks.
    ///
    /// Must be called from within a Tokio runtime.
    pub async fn start(
        client: SyncClient,
        reconnect: ReconnectConfig,
        model: Arc<RwLock<GraphModel>>,
        jobs: Arc<RwLock<JobTracker>>,
    ) -> Arc<Self> {
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let (status_tx, _) = watch::channel(ConnectionStatus::Connecting);
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();

        let manager = Arc::new(Self {
            client,
            reconnect,
            model,
            jobs,
            event_tx,
            status_tx,
            outbound: RwLock::new(None),
            generation: AtomicU64::new(0),
            cancel: CancellationToken::new(),
            tasks: Mutex::new(Vec::new()),
        });

        let processor = tokio::spawn(Arc::clone(&manager).run_processor(inbound_rx));
        let connection = tokio::spawn(Arc::clone(&manager).run_connection_loop(inbound_tx));
        manager.tasks.lock().await.extend([processor, connection]);

        tracing::info!(space_id = %manager.client.space_id(), "Sync manager started");
        manager
    }

    /// Subscribe to sync events.
    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.event_tx.subscribe()
    }

    /// Watch the connection status.
    pub fn status(&self) -> watch::Receiver<ConnectionStatus> {
        self.status_tx.subscribe()
    }

    pub fn current_status(&self) -> ConnectionStatus {
        self.status_tx.borrow().clone()
    }

    /// Generation of the most recent connection attempt.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    pub fn model(&self) -> &Arc<RwLock<GraphModel>> {
        &self.model
    }

    pub fn jobs(&self) -> &Arc<RwLock<JobTracker>> {
        &self.jobs
    }

    /// Send a request over the open connection.
    ///
    /// Returns `false` and drops the message when disconnected; nothing is
    /// queued for later delivery.
    pub async fn send(&self, msg: ClientMessage) -> bool {
        let kind = msg.kind();
        let text = match serde_json::to_string(&msg) {
            Ok(text) => text,
            Err(e) => {
                tracing::error!(kind, error = %e, "Failed to serialize sync request");
                return false;
            }
        };

        let outbound = self.outbound.read().await;
        let sent = outbound
            .as_ref()
            .is_some_and(|tx| tx.send(Message::Text(text)).is_ok());
        if sent {
            tracing::trace!(kind, "Queued sync request");
        } else {
            tracing::warn!(kind, "Dropping sync request while disconnected");
        }
        sent
    }

    // ---- outbound operations ----

    pub async fn create_asset(
        &self,
        name: impl Into<String>,
        asset_type: AssetType,
        parent_asset_id: Option<AssetId>,
    ) -> bool {
        self.send(ClientMessage::AssetCreate {
            name: name.into(),
            asset_type,
            parent_asset_id,
        })
        .await
    }

    pub async fn update_asset(
        &self,
        asset_id: impl Into<AssetId>,
        name: Option<String>,
        parent_asset_id: Option<AssetId>,
    ) -> bool {
        self.send(ClientMessage::AssetUpdate {
            asset_id: asset_id.into(),
            name,
            parent_asset_id,
        })
        .await
    }

    pub async fn delete_asset(&self, asset_id: impl Into<AssetId>) -> bool {
        self.send(ClientMessage::AssetDelete {
            asset_id: asset_id.into(),
        })
        .await
    }

    pub async fn set_active_variant(
        &self,
        asset_id: impl Into<AssetId>,
        variant_id: Option<VariantId>,
    ) -> bool {
        self.send(ClientMessage::AssetSetActive {
            asset_id: asset_id.into(),
            variant_id,
        })
        .await
    }

    pub async fn delete_variant(&self, variant_id: impl Into<VariantId>) -> bool {
        self.send(ClientMessage::VariantDelete {
            variant_id: variant_id.into(),
        })
        .await
    }

    pub async fn star_variant(&self, variant_id: impl Into<VariantId>, starred: bool) -> bool {
        self.send(ClientMessage::VariantStar {
            variant_id: variant_id.into(),
            starred,
        })
        .await
    }

    /// Ask the server for a fresh snapshot.
    pub async fn request_sync(&self) -> bool {
        self.send(ClientMessage::SyncRequest).await
    }

    /// Submit a generation request and track it as a pending job.
    ///
    /// Returns the client request id, or `None` when disconnected.
    pub async fn generate(&self, request: GenerateRequest) -> Option<String> {
        let asset_id = request.asset_id.clone();
        let prompt = Some(request.prompt.clone());
        self.submit_tracked(ClientMessage::Generate(request), asset_id, None, prompt)
            .await
    }

    pub async fn refine(
        &self,
        asset_id: impl Into<AssetId>,
        source_variant_id: impl Into<VariantId>,
        prompt: impl Into<String>,
    ) -> Option<String> {
        let request = RefineRequest {
            request_id: new_request_id(),
            asset_id: asset_id.into(),
            source_variant_id: source_variant_id.into(),
            prompt: prompt.into(),
        };
        let asset_id = Some(request.asset_id.clone());
        let source = Some(request.source_variant_id.clone());
        let prompt = Some(request.prompt.clone());
        self.submit_tracked(ClientMessage::Refine(request), asset_id, source, prompt)
            .await
    }

    /// Fork a variant into a new asset. The job's asset is learned from
    /// the server acknowledgement.
    pub async fn fork(
        &self,
        source_variant_id: impl Into<VariantId>,
        name: impl Into<String>,
        asset_type: AssetType,
        parent_asset_id: Option<AssetId>,
    ) -> Option<String> {
        let request = ForkRequest {
            request_id: new_request_id(),
            source_variant_id: source_variant_id.into(),
            name: name.into(),
            asset_type,
            parent_asset_id,
        };
        let source = Some(request.source_variant_id.clone());
        self.submit_tracked(ClientMessage::Fork(request), None, source, None)
            .await
    }

    pub async fn batch(
        &self,
        asset_id: impl Into<AssetId>,
        prompt: impl Into<String>,
        count: u32,
    ) -> Option<String> {
        let request = BatchRequest {
            request_id: new_request_id(),
            asset_id: asset_id.into(),
            prompt: prompt.into(),
            count,
        };
        let asset_id = Some(request.asset_id.clone());
        let prompt = Some(request.prompt.clone());
        self.submit_tracked(ClientMessage::Batch(request), asset_id, None, prompt)
            .await
    }

    /// Gracefully stop both tasks.
    ///
    /// Cancels the master token, then waits up to five seconds per task.
    pub async fn shutdown(&self) {
        tracing::info!(space_id = %self.client.space_id(), "Shutting down sync manager");
        self.cancel.cancel();

        let mut tasks = self.tasks.lock().await;
        for handle in tasks.drain(..) {
            let _ = tokio::time::timeout(SHUTDOWN_TIMEOUT, handle).await;
        }

        tracing::info!("Sync manager shut down complete");
    }

    // ---- private helpers ----

    /// Register the job before sending so an acknowledgement cannot
    /// overtake the registration; roll it back when the send fails.
    async fn submit_tracked(
        &self,
        msg: ClientMessage,
        asset_id: Option<AssetId>,
        variant_id: Option<VariantId>,
        prompt: Option<String>,
    ) -> Option<String> {
        let request_id = msg.request_id()?.to_string();

        self.jobs
            .write()
            .await
            .submit(request_id.clone(), asset_id, variant_id, prompt);

        if self.send(msg).await {
            let _ = self.event_tx.send(SyncEvent::JobsChanged);
            Some(request_id)
        } else {
            self.jobs.write().await.dismiss(&request_id);
            None
        }
    }

    fn set_status(&self, status: ConnectionStatus) {
        tracing::debug!(?status, "Sync status changed");
        self.status_tx.send_replace(status.clone());
        let _ = self.event_tx.send(SyncEvent::StatusChanged(status));
    }

    /// Single consumer of inbound frames, so they apply in receipt order.
    async fn run_processor(self: Arc<Self>, mut inbound_rx: mpsc::UnboundedReceiver<Inbound>) {
        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => return,
                item = inbound_rx.recv() => match item {
                    Some(inbound) => {
                        process_inbound(
                            inbound,
                            &self.generation,
                            &self.model,
                            &self.jobs,
                            &self.event_tx,
                        )
                        .await;
                    }
                    None => return,
                },
            }
        }
    }

    /// Core connection loop: connect -> pump frames -> backoff.
    ///
    /// Runs until cancelled or the reconnect ceiling is exhausted.
    async fn run_connection_loop(self: Arc<Self>, inbound_tx: mpsc::UnboundedSender<Inbound>) {
        let mut backoff = Backoff::new(self.reconnect.clone());

        loop {
            let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;

            let result = tokio::select! {
                _ = self.cancel.cancelled() => return,
                result = self.client.connect(generation) => result,
            };

            match result {
                Ok(conn) => {
                    backoff.reset();
                    self.set_status(ConnectionStatus::Connected);
                    let _ = self.event_tx.send(SyncEvent::Connected { generation });

                    self.pump(conn, &inbound_tx).await;

                    let _ = self.event_tx.send(SyncEvent::Disconnected { generation });
                    self.set_status(ConnectionStatus::Disconnected);
                }
                Err(e) => {
                    tracing::warn!(generation, error = %e, "Sync connection failed");
                    self.set_status(ConnectionStatus::Error {
                        message: e.to_string(),
                        terminal: false,
                    });
                    self.set_status(ConnectionStatus::Disconnected);
                }
            }

            if self.cancel.is_cancelled() {
                return;
            }

            match backoff.on_failure() {
                BackoffStep::Retry { attempt, delay } => {
                    tracing::info!(
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        "Reconnecting to sync server",
                    );
                    self.set_status(ConnectionStatus::Reconnecting {
                        attempt,
                        delay_ms: delay.as_millis() as u64,
                    });
                    tokio::select! {
                        _ = self.cancel.cancelled() => return,
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
                BackoffStep::GiveUp { attempts } => {
                    tracing::error!(attempts, "Giving up on sync server");
                    self.set_status(ConnectionStatus::gave_up());
                    let _ = self.event_tx.send(SyncEvent::GaveUp { attempts });
                    return;
                }
            }
        }
    }

    /// Pump one open connection until it closes.
    ///
    /// The first frame written is always a `sync:request`, so every
    /// (re)connection starts from a full snapshot.
    async fn pump(&self, conn: SyncConnection, inbound_tx: &mpsc::UnboundedSender<Inbound>) {
        let generation = conn.generation;
        let (mut sink, mut stream) = conn.ws_stream.split();
        let (out_tx, mut out_rx) = mpsc::unbounded_channel::<Message>();

        match serde_json::to_string(&ClientMessage::SyncRequest) {
            Ok(text) => {
                let _ = out_tx.send(Message::Text(text));
            }
            Err(e) => tracing::error!(error = %e, "Failed to serialize sync request"),
        }
        *self.outbound.write().await = Some(out_tx);

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    let _ = sink.send(Message::Close(None)).await;
                    break;
                }
                Some(msg) = out_rx.recv() => {
                    if let Err(e) = sink.send(msg).await {
                        tracing::warn!(generation, error = %e, "Failed to write to sync socket");
                        break;
                    }
                }
                frame = stream.next() => match frame {
                    Some(Ok(Message::Text(text))) => {
                        if inbound_tx.send(Inbound { generation, text }).is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Binary(_))) => {
                        tracing::trace!(generation, "Ignoring binary frame");
                    }
                    Some(Ok(Message::Ping(_) | Message::Pong(_))) => {
                        // Handled automatically by tungstenite.
                    }
                    Some(Ok(Message::Close(frame))) => {
                        tracing::info!(generation, ?frame, "Sync socket closed");
                        break;
                    }
                    Some(Ok(Message::Frame(_))) => {}
                    Some(Err(e)) => {
                        let error = SyncClientError::Protocol(e.to_string());
                        tracing::warn!(generation, error = %error, "Sync socket error");
                        self.set_status(ConnectionStatus::Error {
                            message: error.to_string(),
                            terminal: false,
                        });
                        break;
                    }
                    None => break,
                },
            }
        }

        *self.outbound.write().await = None;
    }
}

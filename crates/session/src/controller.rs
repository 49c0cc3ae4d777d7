//! Event-driven relayout of the synced graph.
//!
//! [`LayoutPipeline`] turns the current model into a published
//! [`LayoutResult`]: project the configured view, measure its thumbnails,
//! run the layout engine. [`SessionController`] drives the pipeline from
//! the sync manager's event stream.

use std::sync::Arc;

use lineage_core::dimensions::{
    DimensionConfig, DimensionResolver, ImageProbe, PrefixThumbnailUrls, ThumbnailUrls,
};
use lineage_core::jobs::JobTracker;
use lineage_core::model::GraphModel;
use lineage_layout::view::ViewScope;
use lineage_layout::{compute_layout, LayoutOptions, LayoutResult};
use lineage_sync::client::SyncClient;
use lineage_sync::events::SyncEvent;
use lineage_sync::manager::SyncManager;
use lineage_sync::thumbnails::HttpImageProbe;
use tokio::sync::{broadcast, watch, Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::SessionConfig;

/// What to lay out and how.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ViewSettings {
    pub scope: ViewScope,
    pub options: LayoutOptions,
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

/// Model -> view -> dimensions -> layout.
pub struct LayoutPipeline<P> {
    model: Arc<RwLock<GraphModel>>,
    jobs: Arc<RwLock<JobTracker>>,
    resolver: DimensionResolver<P>,
    urls: Box<dyn ThumbnailUrls>,
    settings: RwLock<ViewSettings>,
    layout_tx: watch::Sender<Arc<LayoutResult>>,
}

impl<P: ImageProbe> LayoutPipeline<P> {
    pub fn new(
        model: Arc<RwLock<GraphModel>>,
        jobs: Arc<RwLock<JobTracker>>,
        probe: P,
        urls: Box<dyn ThumbnailUrls>,
        settings: ViewSettings,
    ) -> Self {
        let (layout_tx, _) = watch::channel(Arc::new(LayoutResult::default()));
        Self {
            model,
            jobs,
            resolver: DimensionResolver::new(probe, DimensionConfig::default()),
            urls,
            settings: RwLock::new(settings),
            layout_tx,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<LayoutResult>> {
        self.layout_tx.subscribe()
    }

    pub fn current(&self) -> Arc<LayoutResult> {
        self.layout_tx.borrow().clone()
    }

    pub async fn settings(&self) -> ViewSettings {
        self.settings.read().await.clone()
    }

    /// Switch view or layout options and relayout.
    pub async fn configure(&self, settings: ViewSettings) -> Option<Arc<LayoutResult>> {
        *self.settings.write().await = settings;
        self.refresh().await
    }

    /// Recompute and publish the layout.
    ///
    /// Returns `None` when a later refresh started while this one was
    /// measuring thumbnails; only the later one publishes.
    pub async fn refresh(&self) -> Option<Arc<LayoutResult>> {
        let ViewSettings { scope, options } = self.settings().await;

        let (view, requests) = {
            let model = self.model.read().await;
            let jobs = self.jobs.read().await;
            let view = scope.build(&model, &jobs);
            let requests = view.dimension_requests(&model, self.urls.as_ref());
            (view, requests)
        };

        let dims = self.resolver.resolve(requests).await?;
        let layout = Arc::new(compute_layout(&view.nodes, &view.edges, &dims, &options));

        tracing::debug!(
            ?scope,
            algorithm = %options.algorithm,
            nodes = layout.nodes.len(),
            edges = layout.edges.len(),
            "Published layout",
        );
        self.layout_tx.send_replace(Arc::clone(&layout));
        Some(layout)
    }
}

// ---------------------------------------------------------------------------
// Controller
// ---------------------------------------------------------------------------

/// Owns the shared model, its sync connection and the layout pipeline.
pub struct SessionController<P> {
    sync: Arc<SyncManager>,
    pipeline: Arc<LayoutPipeline<P>>,
    cancel: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl SessionController<HttpImageProbe> {
    /// Start a session from configuration, measuring thumbnails over HTTP.
    pub async fn from_config(config: &SessionConfig) -> Arc<Self> {
        let client = SyncClient::new(
            config.ws_url.clone(),
            config.space_id.clone(),
            config.auth_token.clone(),
        );
        let settings = ViewSettings {
            scope: config.view.clone(),
            options: config.layout,
        };
        Self::start(
            client,
            config.reconnect.clone(),
            HttpImageProbe::new(),
            Box::new(PrefixThumbnailUrls::new(config.thumbnail_base_url.clone())),
            settings,
        )
        .await
    }
}

impl<P: ImageProbe + 'static> SessionController<P> {
    /// Create an empty model, connect it and start relayout on changes.
    pub async fn start(
        client: SyncClient,
        reconnect: lineage_sync::reconnect::ReconnectConfig,
        probe: P,
        urls: Box<dyn ThumbnailUrls>,
        settings: ViewSettings,
    ) -> Arc<Self> {
        let model = Arc::new(RwLock::new(GraphModel::new()));
        let jobs = Arc::new(RwLock::new(JobTracker::new()));
        let pipeline = Arc::new(LayoutPipeline::new(
            Arc::clone(&model),
            Arc::clone(&jobs),
            probe,
            urls,
            settings,
        ));

        let sync = SyncManager::start(client, reconnect, model, jobs).await;
        // Subscribe before the connection task gets a chance to emit.
        let events = sync.subscribe();

        let controller = Arc::new(Self {
            sync,
            pipeline,
            cancel: CancellationToken::new(),
            task: Mutex::new(None),
        });

        let handle = tokio::spawn(run_relayout(
            Arc::clone(&controller.pipeline),
            events,
            controller.cancel.clone(),
        ));
        *controller.task.lock().await = Some(handle);

        controller
    }

    pub fn sync(&self) -> &Arc<SyncManager> {
        &self.sync
    }

    pub fn pipeline(&self) -> &Arc<LayoutPipeline<P>> {
        &self.pipeline
    }

    /// Watch published layouts.
    pub fn layout(&self) -> watch::Receiver<Arc<LayoutResult>> {
        self.pipeline.subscribe()
    }

    pub async fn set_view(&self, scope: ViewScope) -> Option<Arc<LayoutResult>> {
        let mut settings = self.pipeline.settings().await;
        settings.scope = scope;
        self.pipeline.configure(settings).await
    }

    pub async fn set_options(&self, options: LayoutOptions) -> Option<Arc<LayoutResult>> {
        let mut settings = self.pipeline.settings().await;
        settings.options = options;
        self.pipeline.configure(settings).await
    }

    /// Stop relayout, then the sync connection.
    pub async fn shutdown(&self) {
        self.cancel.cancel();
        if let Some(handle) = self.task.lock().await.take() {
            let _ = handle.await;
        }
        self.sync.shutdown().await;
    }
}

fn triggers_relayout(event: &SyncEvent) -> bool {
    matches!(event, SyncEvent::ModelChanged(_) | SyncEvent::JobsChanged)
}

/// Relayout once per burst of model or job changes.
async fn run_relayout<P: ImageProbe>(
    pipeline: Arc<LayoutPipeline<P>>,
    mut events: broadcast::Receiver<SyncEvent>,
    cancel: CancellationToken,
) {
    loop {
        let event = tokio::select! {
            _ = cancel.cancelled() => break,
            event = events.recv() => event,
        };

        let mut dirty = match event {
            Ok(event) => {
                log_event(&event);
                triggers_relayout(&event)
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "Relayout lagged behind sync events");
                true
            }
            Err(broadcast::error::RecvError::Closed) => break,
        };

        // Fold everything already queued into this pass.
        loop {
            match events.try_recv() {
                Ok(event) => {
                    log_event(&event);
                    dirty |= triggers_relayout(&event);
                }
                Err(broadcast::error::TryRecvError::Lagged(_)) => dirty = true,
                Err(_) => break,
            }
        }

        if dirty {
            pipeline.refresh().await;
        }
    }

    tracing::debug!("Relayout loop stopped");
}

fn log_event(event: &SyncEvent) {
    match event {
        SyncEvent::ServerError { code, message } => {
            tracing::warn!(code = %code, message = %message, "Server reported an error");
        }
        SyncEvent::GaveUp { attempts } => {
            tracing::error!(attempts, "Sync connection gave up");
        }
        _ => tracing::trace!(?event, "Sync event"),
    }
}

//! Inbound message processing.
//!
//! Text frames from every connection are queued as [`Inbound`] items and
//! processed strictly in receipt order by one task. Frames tagged with a
//! connection generation other than the current one are discarded so a
//! dropped connection's leftovers never mix with the resync of its
//! successor.

use std::sync::atomic::{AtomicU64, Ordering};

use lineage_core::jobs::{JobStatus, JobTracker};
use lineage_core::model::GraphModel;
use tokio::sync::{broadcast, RwLock};

use crate::events::{ModelChange, SyncEvent};
use crate::messages::{parse_message, ServerMessage};

/// A raw text frame and the connection it arrived on.
#[derive(Debug, Clone)]
pub struct Inbound {
    pub generation: u64,
    pub text: String,
}

/// Parse and apply one queued frame, then broadcast the resulting events.
///
/// Stale, unknown and malformed frames are logged and skipped.
pub async fn process_inbound(
    inbound: Inbound,
    current_generation: &AtomicU64,
    model: &RwLock<GraphModel>,
    jobs: &RwLock<JobTracker>,
    event_tx: &broadcast::Sender<SyncEvent>,
) {
    let current = current_generation.load(Ordering::SeqCst);
    if inbound.generation != current {
        tracing::debug!(
            generation = inbound.generation,
            current,
            "Discarding message from stale connection",
        );
        return;
    }

    let msg = match parse_message(&inbound.text) {
        Ok(ServerMessage::Unknown) => {
            tracing::warn!(raw_message = %inbound.text, "Ignoring unknown sync message type");
            return;
        }
        Ok(msg) => msg,
        Err(e) => {
            tracing::warn!(
                error = %e,
                raw_message = %inbound.text,
                "Failed to parse sync message",
            );
            return;
        }
    };

    let events = {
        let mut model = model.write().await;
        let mut jobs = jobs.write().await;
        apply_message(&mut model, &mut jobs, msg)
    };

    for event in events {
        let _ = event_tx.send(event);
    }
}

/// Apply one server message to the model and job tracker.
///
/// Returns the events describing what changed; an idempotent replay
/// returns no model events.
pub fn apply_message(
    model: &mut GraphModel,
    jobs: &mut JobTracker,
    msg: ServerMessage,
) -> Vec<SyncEvent> {
    let mut events = Vec::new();

    match msg {
        ServerMessage::SyncState(data) => {
            tracing::info!(
                assets = data.assets.len(),
                variants = data.variants.len(),
                lineage = data.lineage.as_ref().map(Vec::len),
                "Applying sync snapshot",
            );
            // Snapshots only resolve jobs the server names explicitly.
            let finished: Vec<String> = data
                .variants
                .iter()
                .filter_map(|v| v.job_id.clone())
                .collect();
            model.apply_snapshot(data.assets, data.variants, data.lineage);
            events.push(SyncEvent::ModelChanged(ModelChange::Snapshot));

            let resolved = finished
                .iter()
                .filter(|job_id| jobs.dismiss(job_id).is_some())
                .count();
            if resolved > 0 {
                events.push(SyncEvent::JobsChanged);
            }
        }

        ServerMessage::AssetCreated { asset } | ServerMessage::AssetUpdated { asset } => {
            let asset_id = asset.id.clone();
            match model.upsert_asset(asset) {
                Ok(true) => events.push(SyncEvent::ModelChanged(ModelChange::Assets)),
                Ok(false) => {}
                Err(e) => {
                    tracing::warn!(asset_id = %asset_id, error = %e, "Rejected asset update");
                }
            }
        }

        ServerMessage::AssetDeleted { asset_id } => {
            if model.remove_asset(&asset_id) {
                events.push(SyncEvent::ModelChanged(ModelChange::Assets));
            }
        }

        ServerMessage::VariantCreated { variant } | ServerMessage::VariantUpdated { variant } => {
            let variant_id = variant.id.clone();
            let previous = model.variant(&variant_id).map(|v| v.status);
            if !model.upsert_variant(variant) {
                return events;
            }
            events.push(SyncEvent::ModelChanged(ModelChange::Variants));

            // Only a new variant, or one that just finished, supersedes a job.
            // Resolve against the stored copy, which keeps the furthest status.
            if let Some(stored) = model.variant(&variant_id) {
                let fresh = match previous {
                    None => true,
                    Some(before) => !before.is_terminal() && stored.status.is_terminal(),
                };
                if fresh {
                    if let Some(job) = jobs.resolve_with_variant(stored) {
                        tracing::debug!(job_id = %job.id, variant_id = %variant_id, "Job superseded by variant");
                        events.push(SyncEvent::JobsChanged);
                    }
                }
            }
        }

        ServerMessage::VariantDeleted { variant_id } => {
            if model.remove_variant(&variant_id) {
                events.push(SyncEvent::ModelChanged(ModelChange::Variants));
            }
        }

        ServerMessage::LineageCreated { lineage } => {
            if model.upsert_lineage(lineage) {
                events.push(SyncEvent::ModelChanged(ModelChange::Lineage));
            }
        }

        ServerMessage::LineageSevered { lineage_id } => {
            if model.sever_lineage(&lineage_id) {
                events.push(SyncEvent::ModelChanged(ModelChange::Lineage));
            }
        }

        ServerMessage::GenerateStarted {
            request_id,
            job_id,
            asset_id,
        } => {
            if jobs.acknowledge(&request_id, &job_id, asset_id) {
                events.push(SyncEvent::JobsChanged);
            }
        }

        ServerMessage::JobProgress {
            job_id,
            status,
            progress,
        } => {
            tracing::trace!(job_id = %job_id, progress, "Job progress");
            let status = status.unwrap_or(JobStatus::Processing);
            if jobs.update_status(&job_id, status, None) {
                events.push(SyncEvent::JobsChanged);
            }
        }

        ServerMessage::JobCompleted { job_id, variant_id } => {
            tracing::debug!(job_id = %job_id, variant_id = ?variant_id, "Job completed");
            if jobs.update_status(&job_id, JobStatus::Completed, None) {
                events.push(SyncEvent::JobsChanged);
            }
        }

        ServerMessage::JobFailed { job_id, error } => {
            tracing::warn!(job_id = %job_id, error = ?error, "Job failed");
            if jobs.update_status(&job_id, JobStatus::Failed, error) {
                events.push(SyncEvent::JobsChanged);
            }
        }

        ServerMessage::Error(data) => {
            tracing::warn!(code = %data.code, message = %data.message, "Sync server reported an error");
            events.push(SyncEvent::ServerError {
                code: data.code,
                message: data.message,
            });
        }

        ServerMessage::Unknown => {}
    }

    events
}

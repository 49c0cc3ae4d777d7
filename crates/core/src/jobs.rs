//! Client-side tracking of in-flight generation jobs.
//!
//! A job is registered when the client submits a generation request, keyed
//! by the client request id. The server acknowledgement re-keys it by the
//! server job id, status pushes update it in place, and the variant that
//! eventually lands supersedes it. While a job is pending or processing
//! the asset/variant it targets counts as "generating".

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::model::Variant;
use crate::types::{AssetId, JobId, Timestamp, VariantId};

/// Server-side status of a generation job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    /// Pending or processing.
    pub fn is_active(self) -> bool {
        matches!(self, Self::Pending | Self::Processing)
    }

    /// Completed or failed.
    pub fn is_terminal(self) -> bool {
        !self.is_active()
    }
}

/// A tracked generation request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Job {
    pub id: JobId,
    /// Target asset. Unknown until acknowledged when the request creates a
    /// new asset.
    pub asset_id: Option<AssetId>,
    /// Source variant for refine/fork requests.
    pub variant_id: Option<VariantId>,
    pub status: JobStatus,
    pub error: Option<String>,
    pub prompt: Option<String>,
    /// Set once the server has assigned the job id.
    pub acknowledged: bool,
    pub submitted_at: Timestamp,
}

/// Insertion-ordered registry of jobs.
#[derive(Debug, Default)]
pub struct JobTracker {
    jobs: IndexMap<JobId, Job>,
}

impl JobTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a freshly submitted request under its client request id.
    ///
    /// Submitting the same request id twice keeps the first registration.
    pub fn submit(
        &mut self,
        request_id: impl Into<JobId>,
        asset_id: Option<AssetId>,
        variant_id: Option<VariantId>,
        prompt: Option<String>,
    ) -> &Job {
        let request_id = request_id.into();
        self.jobs.entry(request_id.clone()).or_insert_with(|| {
            tracing::debug!(request_id = %request_id, "Registered generation request");
            Job {
                id: request_id,
                asset_id,
                variant_id,
                status: JobStatus::Pending,
                error: None,
                prompt,
                acknowledged: false,
                submitted_at: chrono::Utc::now(),
            }
        })
    }

    /// Re-key a provisional job by the server-assigned job id.
    ///
    /// An acknowledgement for an unknown request (for example one issued
    /// from another session) registers a new job. Returns `false` when the
    /// job id was already tracked and nothing changed.
    pub fn acknowledge(
        &mut self,
        request_id: &str,
        job_id: &str,
        asset_id: Option<AssetId>,
    ) -> bool {
        if let Some((index, _, mut job)) = self.jobs.shift_remove_full(request_id) {
            job.id = job_id.to_string();
            job.acknowledged = true;
            if asset_id.is_some() {
                job.asset_id = asset_id;
            }
            self.jobs.shift_insert(index, job_id.to_string(), job);
            return true;
        }

        if self.jobs.contains_key(job_id) {
            return false;
        }

        tracing::debug!(job_id, request_id, "Tracking job acknowledged without local request");
        self.jobs.insert(
            job_id.to_string(),
            Job {
                id: job_id.to_string(),
                asset_id,
                variant_id: None,
                status: JobStatus::Pending,
                error: None,
                prompt: None,
                acknowledged: true,
                submitted_at: chrono::Utc::now(),
            },
        );
        true
    }

    /// Apply a status push. Terminal jobs never move back to active.
    pub fn update_status(&mut self, job_id: &str, status: JobStatus, error: Option<String>) -> bool {
        let Some(job) = self.jobs.get_mut(job_id) else {
            tracing::debug!(job_id, ?status, "Status update for unknown job");
            return false;
        };
        if job.status.is_terminal() && status.is_active() {
            return false;
        }
        if job.status == status && job.error == error {
            return false;
        }
        job.status = status;
        if error.is_some() {
            job.error = error;
        }
        true
    }

    /// Remove the job superseded by a newly arrived variant.
    ///
    /// A variant naming its job resolves exactly that job. Otherwise a
    /// completed or failed variant resolves the oldest unfailed job for the
    /// same asset.
    pub fn resolve_with_variant(&mut self, variant: &Variant) -> Option<Job> {
        if let Some(job_id) = variant.job_id.as_deref() {
            if let Some(job) = self.jobs.shift_remove(job_id) {
                return Some(job);
            }
        }

        if !variant.status.is_terminal() {
            return None;
        }

        let key = self
            .jobs
            .values()
            .find(|job| {
                job.status != JobStatus::Failed
                    && job.asset_id.as_deref() == Some(variant.asset_id.as_str())
            })
            .map(|job| job.id.clone())?;
        self.jobs.shift_remove(&key)
    }

    /// User dismissal of a job record.
    pub fn dismiss(&mut self, job_id: &str) -> Option<Job> {
        self.jobs.shift_remove(job_id)
    }

    /// Whether any active job targets the given asset or variant.
    pub fn is_generating(&self, asset_id: Option<&str>, variant_id: Option<&str>) -> bool {
        self.active().any(|job| {
            let asset_match = asset_id.is_some() && job.asset_id.as_deref() == asset_id;
            let variant_match = variant_id.is_some() && job.variant_id.as_deref() == variant_id;
            asset_match || variant_match
        })
    }

    pub fn get(&self, job_id: &str) -> Option<&Job> {
        self.jobs.get(job_id)
    }

    /// All tracked jobs in submission order.
    pub fn iter(&self) -> impl Iterator<Item = &Job> {
        self.jobs.values()
    }

    /// Pending or processing jobs in submission order.
    pub fn active(&self) -> impl Iterator<Item = &Job> {
        self.jobs.values().filter(|job| job.status.is_active())
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::VariantStatus;

    fn variant(id: &str, asset_id: &str, status: VariantStatus, job_id: Option<&str>) -> Variant {
        Variant {
            id: id.to_string(),
            asset_id: asset_id.to_string(),
            status,
            image_key: None,
            thumb_key: None,
            starred: false,
            created_at: None,
            recipe: None,
            job_id: job_id.map(str::to_string),
            error_message: None,
        }
    }

    // -- registration -------------------------------------------------------

    #[test]
    fn submit_registers_pending_job() {
        let mut tracker = JobTracker::new();
        let job = tracker.submit("req-1", Some("a1".into()), None, Some("a knight".into()));
        assert_eq!(job.status, JobStatus::Pending);
        assert!(!job.acknowledged);
        assert!(tracker.is_generating(Some("a1"), None));
    }

    #[test]
    fn submit_twice_keeps_one_job() {
        let mut tracker = JobTracker::new();
        tracker.submit("req-1", Some("a1".into()), None, None);
        tracker.submit("req-1", Some("a2".into()), None, None);
        assert_eq!(tracker.len(), 1);
        assert_eq!(tracker.get("req-1").unwrap().asset_id.as_deref(), Some("a1"));
    }

    #[test]
    fn acknowledge_rekeys_and_keeps_order() {
        let mut tracker = JobTracker::new();
        tracker.submit("req-1", None, None, None);
        tracker.submit("req-2", None, None, None);

        assert!(tracker.acknowledge("req-1", "job-1", Some("a1".into())));

        let ids: Vec<&str> = tracker.iter().map(|j| j.id.as_str()).collect();
        assert_eq!(ids, vec!["job-1", "req-2"]);
        let job = tracker.get("job-1").unwrap();
        assert!(job.acknowledged);
        assert_eq!(job.asset_id.as_deref(), Some("a1"));
        assert!(tracker.get("req-1").is_none());
    }

    #[test]
    fn acknowledge_unknown_request_registers_job_once() {
        let mut tracker = JobTracker::new();
        assert!(tracker.acknowledge("elsewhere", "job-7", Some("a1".into())));
        assert!(!tracker.acknowledge("elsewhere", "job-7", Some("a1".into())));
        assert_eq!(tracker.len(), 1);
    }

    // -- status -------------------------------------------------------------

    #[test]
    fn status_updates_in_place() {
        let mut tracker = JobTracker::new();
        tracker.acknowledge("req", "job-1", Some("a1".into()));
        assert!(tracker.update_status("job-1", JobStatus::Processing, None));
        assert!(!tracker.update_status("job-1", JobStatus::Processing, None));
        assert!(tracker.update_status("job-1", JobStatus::Failed, Some("oom".into())));

        let job = tracker.get("job-1").unwrap();
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.error.as_deref(), Some("oom"));
        assert!(!tracker.is_generating(Some("a1"), None));
    }

    #[test]
    fn terminal_jobs_do_not_reactivate() {
        let mut tracker = JobTracker::new();
        tracker.acknowledge("req", "job-1", Some("a1".into()));
        tracker.update_status("job-1", JobStatus::Completed, None);
        assert!(!tracker.update_status("job-1", JobStatus::Processing, None));
        assert_eq!(tracker.get("job-1").unwrap().status, JobStatus::Completed);
    }

    #[test]
    fn unknown_job_status_is_ignored() {
        let mut tracker = JobTracker::new();
        assert!(!tracker.update_status("ghost", JobStatus::Completed, None));
    }

    // -- resolution ---------------------------------------------------------

    #[test]
    fn completed_variant_clears_generating_for_asset() {
        let mut tracker = JobTracker::new();
        tracker.acknowledge("req", "job-1", Some("a1".into()));
        tracker.update_status("job-1", JobStatus::Processing, None);
        assert!(tracker.is_generating(Some("a1"), None));

        let resolved = tracker.resolve_with_variant(&variant("v1", "a1", VariantStatus::Completed, None));
        assert_eq!(resolved.unwrap().id, "job-1");
        assert!(!tracker.is_generating(Some("a1"), None));
    }

    #[test]
    fn pending_variant_without_job_id_does_not_resolve() {
        let mut tracker = JobTracker::new();
        tracker.acknowledge("req", "job-1", Some("a1".into()));
        assert!(tracker
            .resolve_with_variant(&variant("v1", "a1", VariantStatus::Pending, None))
            .is_none());
        assert!(tracker.is_generating(Some("a1"), None));
    }

    #[test]
    fn variant_with_job_id_resolves_that_job() {
        let mut tracker = JobTracker::new();
        tracker.acknowledge("r1", "job-1", Some("a1".into()));
        tracker.acknowledge("r2", "job-2", Some("a1".into()));

        let resolved =
            tracker.resolve_with_variant(&variant("v1", "a1", VariantStatus::Pending, Some("job-2")));
        assert_eq!(resolved.unwrap().id, "job-2");
        assert!(tracker.get("job-1").is_some());
    }

    #[test]
    fn oldest_matching_job_is_resolved_first() {
        let mut tracker = JobTracker::new();
        tracker.acknowledge("r1", "job-1", Some("a1".into()));
        tracker.acknowledge("r2", "job-2", Some("a1".into()));

        let resolved =
            tracker.resolve_with_variant(&variant("v1", "a1", VariantStatus::Completed, None));
        assert_eq!(resolved.unwrap().id, "job-1");
        assert!(tracker.is_generating(Some("a1"), None));
    }

    #[test]
    fn variant_match_counts_as_generating() {
        let mut tracker = JobTracker::new();
        tracker.submit("req", Some("a1".into()), Some("v1".into()), None);
        assert!(tracker.is_generating(None, Some("v1")));
        assert!(!tracker.is_generating(None, Some("v2")));
        assert!(!tracker.is_generating(None, None));
    }

    #[test]
    fn dismiss_removes_job() {
        let mut tracker = JobTracker::new();
        tracker.submit("req", Some("a1".into()), None, None);
        assert!(tracker.dismiss("req").is_some());
        assert!(tracker.is_empty());
    }
}

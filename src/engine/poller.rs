//! Remote task polling: block, within a bound, until a set of server-side
//! asynchronous tasks reaches a terminal state.
//!
//! The poller decides termination only, never pass/fail for the operation
//! that submitted the tasks. A round in which some tasks succeeded and some
//! failed still reports completion; callers must inspect
//! [`PollReport::failed`] to tell a clean finish from a dirty one.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};
use uuid::Uuid;

/// Watch-lists are polled in chunks of this size to bound request payloads.
pub const POLL_CHUNK_SIZE: usize = 100;

/// Reported state of one server-side task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskState {
    Queued,
    Running,
    Succeeded,
    Failed,
}

/// One polled status row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskStatus {
    pub task_uuid: Uuid,
    pub state: TaskState,
    #[serde(default)]
    pub detail: Option<String>,
}

/// Source of task status rows, one bounded chunk per call.
#[async_trait]
pub trait TaskStatusSource: Send + Sync {
    async fn poll_tasks(&self, uuids: &[Uuid]) -> anyhow::Result<Vec<TaskStatus>>;
}

/// Poll interval and overall deadline for one target system.
#[derive(Debug, Clone, Copy)]
pub struct PollCadence {
    pub interval: Duration,
    pub timeout: Duration,
}

impl PollCadence {
    /// Management-plane tasks settle quickly; poll often.
    pub const MANAGEMENT: PollCadence = PollCadence {
        interval: Duration::from_secs(5),
        timeout: Duration::from_secs(30 * 60),
    };

    /// Imaging runs for many minutes; a slower cadence keeps the request
    /// volume down over the same overall deadline.
    pub const IMAGING: PollCadence = PollCadence {
        interval: Duration::from_secs(60),
        timeout: Duration::from_secs(30 * 60),
    };
}

/// Outcome of one polling pass (or of a whole monitor loop).
#[derive(Debug, Clone, Default)]
pub struct PollReport {
    pub succeeded: usize,
    pub pending: usize,
    /// Human-readable descriptions of each failed task.
    pub failed: Vec<String>,
}

impl PollReport {
    pub fn describe(&self) -> String {
        if !self.failed.is_empty() {
            format!(
                "{} task(s) failed: {}; {} succeeded, {} pending",
                self.failed.len(),
                self.failed.join(", "),
                self.succeeded,
                self.pending
            )
        } else if self.pending > 0 {
            format!("{} task(s) pending, {} succeeded", self.pending, self.succeeded)
        } else {
            format!("all {} task(s) reached the expected state", self.succeeded)
        }
    }
}

/// Supervises a fixed watch-list of task UUIDs until every one is terminal
/// or the cadence's deadline passes.
pub struct TaskPoller {
    source: Arc<dyn TaskStatusSource>,
    watch: Vec<Uuid>,
    expected_state: TaskState,
    cadence: PollCadence,
}

impl TaskPoller {
    pub fn new(source: Arc<dyn TaskStatusSource>, watch: Vec<Uuid>, cadence: PollCadence) -> Self {
        Self {
            source,
            watch,
            expected_state: TaskState::Succeeded,
            cadence,
        }
    }

    pub fn management(source: Arc<dyn TaskStatusSource>, watch: Vec<Uuid>) -> Self {
        Self::new(source, watch, PollCadence::MANAGEMENT)
    }

    pub fn imaging(source: Arc<dyn TaskStatusSource>, watch: Vec<Uuid>) -> Self {
        Self::new(source, watch, PollCadence::IMAGING)
    }

    /// Wait for a state other than the default `Succeeded`, for call sites
    /// watching a predicate such as "cluster reaches RUNNING".
    pub fn with_expected_state(mut self, state: TaskState) -> Self {
        self.expected_state = state;
        self
    }

    /// One polling pass over the whole watch-list, in bounded chunks.
    ///
    /// Completion means every task is terminal; a mix of successes and
    /// failures is still complete, with the failures described in the
    /// report. A watched task the source returned no row for counts as
    /// pending, since a just-submitted task may not be visible in the task
    /// store yet. An empty watch-list completes immediately.
    pub async fn check_status(&self) -> anyhow::Result<(PollReport, bool)> {
        let mut report = PollReport::default();
        if self.watch.is_empty() {
            return Ok((report, true));
        }

        for chunk in self.watch.chunks(POLL_CHUNK_SIZE) {
            let statuses = self.source.poll_tasks(chunk).await?;
            let mut seen = HashSet::with_capacity(statuses.len());
            for status in statuses {
                seen.insert(status.task_uuid);
                if status.state == self.expected_state || status.state == TaskState::Succeeded {
                    report.succeeded += 1;
                } else if status.state == TaskState::Failed {
                    report.failed.push(match status.detail {
                        Some(detail) => format!("{} ({})", status.task_uuid, detail),
                        None => status.task_uuid.to_string(),
                    });
                } else {
                    report.pending += 1;
                }
            }
            report.pending += chunk.iter().filter(|uuid| !seen.contains(*uuid)).count();
        }

        let completed = report.pending == 0;
        Ok((report, completed))
    }

    /// The generic polling loop: repeat `check_status` at the cadence's
    /// interval until completion or the overall deadline.
    ///
    /// Returns `false` on timeout, so the caller can distinguish "we gave up
    /// watching" from "it finished". A failed polling round is logged and
    /// retried at the next tick rather than aborting a long watch.
    pub async fn monitor(&self) -> (PollReport, bool) {
        let deadline = tokio::time::Instant::now() + self.cadence.timeout;
        // Until a round succeeds, nothing is known to be terminal.
        let mut last = PollReport {
            pending: self.watch.len(),
            ..PollReport::default()
        };
        loop {
            match self.check_status().await {
                Ok((report, true)) => {
                    debug!(watched = self.watch.len(), "all remote tasks terminal");
                    return (report, true);
                }
                Ok((report, false)) => {
                    debug!(
                        pending = report.pending,
                        succeeded = report.succeeded,
                        failed = report.failed.len(),
                        "remote tasks still pending"
                    );
                    last = report;
                }
                Err(e) => warn!("polling round failed, will retry: {e:#}"),
            }

            if tokio::time::Instant::now() >= deadline {
                warn!(
                    watched = self.watch.len(),
                    pending = last.pending,
                    "gave up watching remote tasks after {:?}",
                    self.cadence.timeout
                );
                return (last, false);
            }
            tokio::time::sleep(self.cadence.interval).await;
        }
    }
}

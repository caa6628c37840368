//! Asynchronous job observation
//!
//! Order creation and deployment return a job identifier immediately; the
//! job then progresses on the platform and is observed here by polling a
//! status-check call until it reaches a terminal state.

use std::fmt;
use std::future::Future;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::error::{Error, Result};

/// Platform-side state of an asynchronous job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Running,
    Succeeded,
    Failed,
    Canceled,
}

impl JobStatus {
    /// Whether no further transitions are expected
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Succeeded | JobStatus::Failed | JobStatus::Canceled
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::Succeeded => "succeeded",
            JobStatus::Failed => "failed",
            JobStatus::Canceled => "canceled",
        }
    }

    /// Map a platform status string onto the five known states.
    ///
    /// Unrecognized values are treated as still in progress.
    pub fn normalize(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "pending" | "queued" | "waiting" | "created" | "new" => JobStatus::Pending,
            "succeeded" | "success" | "successful" | "completed" | "complete" | "done"
            | "finished" | "ready" => JobStatus::Succeeded,
            "failed" | "failure" | "error" | "errored" => JobStatus::Failed,
            "canceled" | "cancelled" | "aborted" => JobStatus::Canceled,
            _ => JobStatus::Running,
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self::normalize(s))
    }
}

impl<'de> Deserialize<'de> for JobStatus {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Ok(Self::normalize(&raw))
    }
}

/// One observation of a job
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobSnapshot {
    pub job_id: String,
    pub status: JobStatus,
    /// Result payload attached by the platform, if any
    pub result: Option<Value>,
    pub message: Option<String>,
    pub observed_at: DateTime<Utc>,
}

/// Keys that describe the job itself rather than its result
const BOOKKEEPING_KEYS: &[&str] = &["job_id", "status", "state", "message", "error", "result"];

impl JobSnapshot {
    pub fn new(job_id: impl Into<String>, status: JobStatus) -> Self {
        Self {
            job_id: job_id.into(),
            status,
            result: None,
            message: None,
            observed_at: Utc::now(),
        }
    }

    pub fn with_result(mut self, result: Value) -> Self {
        self.result = Some(result);
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Build a snapshot from a status-check payload.
    ///
    /// The status is read from `status` (or `state`). The result is the
    /// `result` field when present, otherwise the remaining non-bookkeeping
    /// fields of the payload.
    pub fn from_payload(job_id: &str, payload: &Value) -> Result<Self> {
        let Some(object) = payload.as_object() else {
            return Err(Error::decode(
                format!("Job status for {} is not an object", job_id),
                None,
            ));
        };

        let status = object
            .get("status")
            .or_else(|| object.get("state"))
            .and_then(Value::as_str)
            .map(JobStatus::normalize)
            .ok_or_else(|| {
                Error::decode(format!("Job status for {} has no status field", job_id), None)
            })?;

        let result = match object.get("result") {
            Some(Value::Null) | None => {
                let rest: Map<String, Value> = object
                    .iter()
                    .filter(|(key, _)| !BOOKKEEPING_KEYS.contains(&key.as_str()))
                    .map(|(key, value)| (key.clone(), value.clone()))
                    .collect();
                (!rest.is_empty()).then_some(Value::Object(rest))
            }
            Some(result) => Some(result.clone()),
        };

        let message = object
            .get("message")
            .or_else(|| object.get("error"))
            .and_then(Value::as_str)
            .map(str::to_string);

        Ok(Self {
            job_id: object
                .get("job_id")
                .and_then(value_as_id)
                .unwrap_or_else(|| job_id.to_string()),
            status,
            result,
            message,
            observed_at: Utc::now(),
        })
    }
}

/// Read the job identifier out of an asynchronous submission response
pub fn job_id_from(payload: &Value) -> Result<String> {
    payload
        .get("job_id")
        .and_then(value_as_id)
        .ok_or_else(|| Error::decode("Submission response carries no job_id", None))
}

fn value_as_id(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Polling cadence and budget
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollOptions {
    /// Wait between status checks
    pub interval: Duration,
    /// Total observation budget for one poll session
    pub max_wait: Duration,
    /// Report a 404 on the status check as a `canceled` observation
    pub not_found_as_canceled: bool,
}

impl Default for PollOptions {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(2),
            max_wait: Duration::from_secs(300),
            not_found_as_canceled: false,
        }
    }
}

impl PollOptions {
    pub fn new(interval: Duration, max_wait: Duration) -> Self {
        Self {
            interval,
            max_wait,
            ..Default::default()
        }
    }

    pub fn with_not_found_as_canceled(mut self, enabled: bool) -> Self {
        self.not_found_as_canceled = enabled;
        self
    }
}

/// Repeatedly checks a job until it is terminal, the budget runs out, or
/// the caller cancels
#[derive(Debug, Clone, Default)]
pub struct JobPoller {
    options: PollOptions,
}

impl JobPoller {
    pub fn new(options: PollOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &PollOptions {
        &self.options
    }

    /// Poll until a terminal snapshot is observed
    pub async fn poll<F, Fut>(
        &self,
        job_id: &str,
        fetch: F,
        cancel: &CancellationToken,
    ) -> Result<JobSnapshot>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<JobSnapshot>>,
    {
        self.poll_with_observer(job_id, fetch, cancel, |_| {}).await
    }

    /// Poll until a terminal snapshot is observed, handing every snapshot to
    /// `observer` in the order it was seen
    pub async fn poll_with_observer<F, Fut, O>(
        &self,
        job_id: &str,
        mut fetch: F,
        cancel: &CancellationToken,
        mut observer: O,
    ) -> Result<JobSnapshot>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<JobSnapshot>>,
        O: FnMut(&JobSnapshot),
    {
        if self.options.interval.is_zero() {
            return Err(Error::configuration("Poll interval cannot be zero"));
        }

        let started = Instant::now();
        let deadline = started + self.options.max_wait;
        let mut last_status = None;

        loop {
            if cancel.is_cancelled() {
                return Err(cancelled(job_id));
            }

            // The budget also bounds a status check that is still in flight
            let observed = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(cancelled(job_id)),
                result = fetch() => result,
                _ = tokio::time::sleep_until(deadline) => {
                    return Err(Error::PollTimeout {
                        job_id: job_id.to_string(),
                        waited: Instant::now() - started,
                        last_status,
                    });
                }
            };

            let snapshot = match observed {
                Ok(snapshot) => snapshot,
                Err(Error::NotFound { .. }) if self.options.not_found_as_canceled => {
                    JobSnapshot::new(job_id, JobStatus::Canceled)
                        .with_message("Job no longer exists")
                }
                Err(error) => return Err(error),
            };

            debug!(job_id, status = %snapshot.status, "Observed job status");
            observer(&snapshot);

            if snapshot.status.is_terminal() {
                info!(
                    job_id,
                    status = %snapshot.status,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Job reached terminal state"
                );
                return Ok(snapshot);
            }
            last_status = Some(snapshot.status);

            let now = Instant::now();
            if now >= deadline {
                return Err(Error::PollTimeout {
                    job_id: job_id.to_string(),
                    waited: now - started,
                    last_status,
                });
            }

            let wait = self.options.interval.min(deadline - now);
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(cancelled(job_id)),
                _ = tokio::time::sleep(wait) => {}
            }
        }
    }
}

fn cancelled(job_id: &str) -> Error {
    Error::Cancelled {
        message: format!("polling of job {} was cancelled", job_id),
    }
}

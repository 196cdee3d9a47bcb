//! Side-channel call telemetry.
//!
//! Every gateway, search and embedding call emits a [`CallRecord`] into an
//! unbounded channel. Nothing in the pipeline waits on or inspects the
//! channel; a closed or absent receiver is silently ignored.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::info;

/// Maximum characters kept in record summaries.
const SUMMARY_CHARS: usize = 160;

/// One external call, as observed by the pipeline.
#[derive(Debug, Clone, Serialize)]
pub struct CallRecord {
    /// Calling component (`agent_selector`, `search`, `embedding`, ...).
    pub component: String,
    /// Truncated description of the input.
    pub input_summary: String,
    /// Truncated description of the output or error.
    pub output_summary: String,
    /// Call latency, retries included.
    #[serde(serialize_with = "serialize_latency")]
    pub latency: Duration,
    /// Estimated cost in USD, when token usage is known.
    pub cost_estimate: Option<f64>,
    /// Completion time.
    pub timestamp: DateTime<Utc>,
    /// Whether the call succeeded.
    pub success: bool,
}

impl CallRecord {
    /// Creates a record stamped with the current time.
    #[must_use]
    pub fn new(
        component: impl Into<String>,
        input: &str,
        output: &str,
        latency: Duration,
        success: bool,
    ) -> Self {
        Self {
            component: component.into(),
            input_summary: summarize(input),
            output_summary: summarize(output),
            latency,
            cost_estimate: None,
            timestamp: Utc::now(),
            success,
        }
    }

    /// Attaches a cost estimate.
    #[must_use]
    pub const fn with_cost(mut self, cost: Option<f64>) -> Self {
        self.cost_estimate = cost;
        self
    }
}

#[allow(clippy::trivially_copy_pass_by_ref)]
fn serialize_latency<S>(d: &Duration, s: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    s.serialize_u128(d.as_millis())
}

/// Handle used by components to emit call records.
///
/// Cloning is cheap; a default handle is disabled.
#[derive(Debug, Clone, Default)]
pub struct Telemetry {
    tx: Option<UnboundedSender<CallRecord>>,
}

impl Telemetry {
    /// A handle that drops every record.
    #[must_use]
    pub const fn disabled() -> Self {
        Self { tx: None }
    }

    /// Creates a handle and the receiver observing it.
    #[must_use]
    pub fn channel() -> (Self, UnboundedReceiver<CallRecord>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx: Some(tx) }, rx)
    }

    /// Creates a handle whose records are logged through `tracing`.
    ///
    /// Must be called from within a tokio runtime; the observer task ends
    /// when the last handle is dropped.
    #[must_use]
    pub fn tracing_observer() -> Self {
        let (telemetry, mut rx) = Self::channel();
        tokio::spawn(async move {
            while let Some(record) = rx.recv().await {
                info!(
                    target: "literesearch::telemetry",
                    component = %record.component,
                    latency_ms = u64::try_from(record.latency.as_millis()).unwrap_or(u64::MAX),
                    cost = record.cost_estimate.unwrap_or(0.0),
                    success = record.success,
                    input = %record.input_summary,
                    output = %record.output_summary,
                    "call"
                );
            }
        });
        telemetry
    }

    /// Whether records go anywhere.
    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.tx.is_some()
    }

    /// Emits a record. Never fails.
    pub fn emit(&self, record: CallRecord) {
        if let Some(tx) = &self.tx {
            let _ = tx.send(record);
        }
    }
}

/// Collapses whitespace and truncates to [`SUMMARY_CHARS`] characters.
#[must_use]
pub fn summarize(text: &str) -> String {
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.chars().count() <= SUMMARY_CHARS {
        collapsed
    } else {
        let mut truncated: String = collapsed.chars().take(SUMMARY_CHARS).collect();
        truncated.push('…');
        truncated
    }
}

//! Post-call summary retrieval with bounded retry.
//!
//! A retrieval makes one initial request followed by at most
//! [`RetryPolicy::max_retries`] retries, each retry starting no earlier than
//! [`RetryPolicy::delay`] after the previous failure. Every failure cause
//! (transport error, non-success status, undecodable body) is handled the
//! same way. When the retries run out a fallback summary is synthesized, so
//! a retrieval always produces something to show.

use crate::backend::CallBackend;
use std::time::Duration;
use voxbook_types::CallSummary;

/// Retry settings for summary retrieval.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the initial attempt. Total attempts = `max_retries + 1`.
    pub max_retries: u32,
    /// Fixed delay before each retry.
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 5,
            delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    pub fn total_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }
}

/// Where a retrieved summary came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SummarySource {
    /// Returned by the backend on the given 1-based attempt.
    Backend { attempt: u32 },
    /// Synthesized after every attempt failed.
    Fallback { attempts: u32 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetrievedSummary {
    pub summary: CallSummary,
    pub source: SummarySource,
}

impl RetrievedSummary {
    pub fn is_fallback(&self) -> bool {
        matches!(self.source, SummarySource::Fallback { .. })
    }
}

/// Fetches the post-call summary, retrying per `policy`.
///
/// Always returns a summary. Cancellation is done by dropping the future
/// (or aborting the task running it).
pub async fn retrieve_summary(backend: &dyn CallBackend, policy: RetryPolicy) -> RetrievedSummary {
    let total = policy.total_attempts();

    for attempt in 1..=total {
        if attempt > 1 {
            tokio::time::sleep(policy.delay).await;
        }

        tracing::debug!(attempt, remaining = total - attempt, "fetching call summary");
        match backend.fetch_summary().await {
            Ok(summary) => {
                tracing::info!(
                    attempt,
                    appointments = summary.appointments.len(),
                    "call summary retrieved"
                );
                return RetrievedSummary {
                    summary,
                    source: SummarySource::Backend { attempt },
                };
            }
            Err(e) => {
                tracing::warn!(attempt, error = %e, "summary fetch failed");
            }
        }
    }

    tracing::warn!(attempts = total, "summary retries exhausted, using fallback");
    RetrievedSummary {
        summary: CallSummary::fallback(),
        source: SummarySource::Fallback { attempts: total },
    }
}

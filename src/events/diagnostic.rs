//! Periodic diagnostic payloads, spec.md §4.5 / §6.
//!
//! A stateless background task; unlike the main event pipeline it never
//! retries and never disables itself, since a diagnostic POST failing
//! has no bearing on flag delivery.

use super::processor::DiagnosticStats;
use crate::http::HttpTransport;
use serde::Serialize;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::interval;
use tracing::debug;
use uuid::Uuid;

pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(15 * 60);
pub const MINIMUM_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Serialize)]
struct DiagnosticStatistics {
    kind: &'static str,
    #[serde(rename = "creationDate")]
    creation_date: i64,
    id: DiagnosticId,
    #[serde(rename = "droppedEvents")]
    dropped_events: u64,
    #[serde(rename = "deduplicatedUsers")]
    deduplicated_users: u64,
}

#[derive(Serialize)]
struct DiagnosticId {
    #[serde(rename = "diagnosticId")]
    diagnostic_id: String,
    sdk_key_suffix: String,
}

/// Spawns the periodic diagnostic task. Returns the `JoinHandle` so
/// callers can abort it on shutdown.
pub fn spawn<T: HttpTransport + 'static>(
    transport: Arc<T>,
    events_base_url: String,
    sdk_key: String,
    stats: Arc<DiagnosticStats>,
    interval_duration: Duration,
) -> tokio::task::JoinHandle<()> {
    let interval_duration = interval_duration.max(MINIMUM_INTERVAL);
    let diagnostic_id = Uuid::new_v4().to_string();
    let sdk_key_suffix = sdk_key.chars().rev().take(6).collect::<String>().chars().rev().collect::<String>();

    tokio::spawn(async move {
        let mut ticker = interval(interval_duration);
        // first tick fires immediately; skip it so we don't report at t=0
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let payload = DiagnosticStatistics {
                kind: "diagnostic",
                creation_date: super::processor::now_millis(),
                id: DiagnosticId {
                    diagnostic_id: diagnostic_id.clone(),
                    sdk_key_suffix: sdk_key_suffix.clone(),
                },
                dropped_events: stats.dropped_events.swap(0, Ordering::Relaxed),
                deduplicated_users: stats.deduplicated_users.swap(0, Ordering::Relaxed),
            };
            let body = match serde_json::to_vec(&payload) {
                Ok(b) => b,
                Err(e) => {
                    debug!(%e, "failed to serialize diagnostic payload");
                    continue;
                }
            };
            let url = format!("{}/diagnostic", events_base_url.trim_end_matches('/'));
            let headers = [("Authorization", sdk_key.as_str())];
            if let Err(e) = transport.post_json(&url, &headers, body.into()).await {
                debug!(%e, "diagnostic POST failed, will retry next interval");
            }
        }
    })
}

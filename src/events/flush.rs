//! Flush worker pool: POSTs batched events to `/bulk`, spec.md §4.5/§6.

use super::types::OutputEvent;
use crate::http::{is_unrecoverable, HttpResponse, HttpTransport, TransportError};
use bytes::Bytes;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tokio::time::sleep;
use tracing::{error, warn};
use uuid::Uuid;

const EVENT_SCHEMA_VERSION: &str = "3";

pub struct FlushPayload {
    pub events: Vec<OutputEvent>,
}

/// A small pool (5 by default) draining a single 1-slot rendezvous
/// channel, so a slow or stuck worker never blocks the dispatcher —
/// it just means the next flush tick finds no free slot and retains its
/// events (spec.md §4.5).
pub struct FlushWorkerPool<T> {
    tx: mpsc::Sender<FlushPayload>,
    disabled: Arc<AtomicBool>,
    _transport: PhantomData<T>,
}

impl<T: HttpTransport + 'static> FlushWorkerPool<T> {
    /// `transport` is shared with the diagnostic task
    /// ([`EventProcessor::start`](super::processor::EventProcessor::start)),
    /// so it's taken pre-wrapped rather than wrapped again here.
    pub fn start(
        worker_count: usize,
        transport: Arc<T>,
        events_base_url: String,
        sdk_key: String,
        last_known_past_time: Arc<AtomicI64>,
    ) -> Self {
        let (tx, rx) = mpsc::channel(1);
        let rx = Arc::new(Mutex::new(rx));
        let disabled = Arc::new(AtomicBool::new(false));

        for worker_id in 0..worker_count {
            let rx = Arc::clone(&rx);
            let transport = Arc::clone(&transport);
            let events_base_url = events_base_url.clone();
            let sdk_key = sdk_key.clone();
            let last_known_past_time = Arc::clone(&last_known_past_time);
            let disabled = Arc::clone(&disabled);
            tokio::spawn(async move {
                loop {
                    let payload = {
                        let mut guard = rx.lock().await;
                        guard.recv().await
                    };
                    let payload = match payload {
                        Some(p) => p,
                        None => break,
                    };
                    if disabled.load(Ordering::Relaxed) {
                        continue;
                    }
                    post_with_retry(
                        transport.as_ref(),
                        &events_base_url,
                        &sdk_key,
                        payload,
                        &last_known_past_time,
                        &disabled,
                    )
                    .await;
                }
                tracing::trace!(worker_id, "flush worker exiting, channel closed");
            });
        }

        Self {
            tx,
            disabled,
            _transport: PhantomData,
        }
    }

    /// Non-blocking hand-off; returns the payload back on failure so the
    /// dispatcher can retain it (spec.md §4.5 "the flush is skipped and
    /// events are retained; this provides natural backpressure without
    /// blocking the dispatcher").
    pub fn try_submit(&self, payload: FlushPayload) -> Result<(), FlushPayload> {
        self.tx.try_send(payload).map_err(|e| match e {
            mpsc::error::TrySendError::Full(p) => p,
            mpsc::error::TrySendError::Closed(p) => p,
        })
    }

    pub fn is_disabled(&self) -> bool {
        self.disabled.load(Ordering::Relaxed)
    }

    /// Drops the sending half, closing the 1-slot channel; every worker's
    /// `recv()` then returns `None` and exits. Callers should schedule a
    /// final flush before calling this (spec.md §4.5 "Shutdown").
    pub async fn close(self) {
        drop(self.tx);
    }
}

async fn post_once<T: HttpTransport>(
    transport: &T,
    url: &str,
    sdk_key: &str,
    body: &Bytes,
) -> Result<HttpResponse, TransportError> {
    let payload_id = Uuid::new_v4().to_string();
    let headers = [
        ("Authorization", sdk_key),
        ("X-LaunchDarkly-Event-Schema", EVENT_SCHEMA_VERSION),
        ("X-LaunchDarkly-Payload-ID", payload_id.as_str()),
    ];
    transport.post_json(url, &headers, body.clone()).await
}

async fn post_with_retry<T: HttpTransport>(
    transport: &T,
    events_base_url: &str,
    sdk_key: &str,
    payload: FlushPayload,
    last_known_past_time: &Arc<AtomicI64>,
    disabled: &Arc<AtomicBool>,
) {
    let body = match serde_json::to_vec(&payload.events) {
        Ok(b) => Bytes::from(b),
        Err(e) => {
            error!(%e, "failed to serialize event payload, dropping batch");
            return;
        }
    };
    let url = format!("{}/bulk", events_base_url.trim_end_matches('/'));

    // one retry after 1s on network errors or a recoverable HTTP status,
    // spec.md §4.5
    let mut attempt = post_once(transport, &url, sdk_key, &body).await;
    let should_retry = match &attempt {
        Err(_) => true,
        Ok(resp) => !resp.status.is_success() && is_recoverable_retry(resp.status),
    };
    if should_retry {
        warn!("event flush did not succeed, retrying once after 1s");
        sleep(Duration::from_secs(1)).await;
        attempt = post_once(transport, &url, sdk_key, &body).await;
    }

    match attempt {
        Ok(resp) => {
            if let Some(date) = resp.date_millis() {
                last_known_past_time.store(date, Ordering::Relaxed);
            }
            if is_unrecoverable(resp.status) {
                error!(status = %resp.status, "events endpoint returned an unrecoverable status, disabling event processor");
                disabled.store(true, Ordering::Relaxed);
            } else if !resp.status.is_success() {
                warn!(status = %resp.status, "event flush returned a non-success status after retry, dropping batch");
            }
        }
        Err(e) => {
            warn!(%e, "event flush failed after retry, dropping batch");
        }
    }
}

fn is_recoverable_retry(status: http::StatusCode) -> bool {
    crate::http::is_recoverable(status)
}

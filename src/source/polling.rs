//! Polling [`Source`], the fallback strategy when streaming is disabled
//! or unavailable, spec.md §4.2/§6.

use super::requestor::{Requestor, RequestorError};
use super::Source;
use crate::http::HttpTransport;
use crate::message::Message;
use futures::stream::BoxStream;
use futures::StreamExt;
use std::sync::Arc;
use std::time::Duration;

/// Floor for the poll interval regardless of what's configured, matching
/// every published LaunchDarkly SDK's documented minimum.
pub const MIN_POLL_INTERVAL: Duration = Duration::from_secs(30);

pub struct PollingSource<T> {
    requestor: Arc<Requestor<T>>,
    interval: Duration,
}

impl<T: HttpTransport> PollingSource<T> {
    pub fn new(requestor: Requestor<T>, interval: Duration) -> Self {
        Self {
            requestor: Arc::new(requestor),
            interval: interval.max(MIN_POLL_INTERVAL),
        }
    }
}

struct PollState<T> {
    requestor: Arc<Requestor<T>>,
    interval: Duration,
    etag: Option<String>,
    first: bool,
}

impl<T: HttpTransport + Send + Sync + 'static> Source for PollingSource<T> {
    type Error = RequestorError;
    type Stream = BoxStream<'static, Result<Message, Self::Error>>;

    fn stream(&self) -> Self::Stream {
        let state = PollState {
            requestor: Arc::clone(&self.requestor),
            interval: self.interval,
            etag: None,
            first: true,
        };
        futures::stream::unfold(state, |mut state| async move {
            if !state.first {
                tokio::time::sleep(state.interval).await;
            }
            state.first = false;

            let message = match state.requestor.poll_all(state.etag.as_deref()).await {
                Ok(Some((snapshot, etag))) => {
                    state.etag = etag;
                    Ok(Message::Put(snapshot))
                }
                // 304: nothing changed, emit a no-op so the driver's
                // readiness/retry bookkeeping still sees a live tick
                Ok(None) => Ok(Message::Unknown),
                Err(e) => Err(e),
            };
            Some((message, state))
        })
        .boxed()
    }
}

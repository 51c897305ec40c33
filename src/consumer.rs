//! Drives a [`Source`] against a [`FeatureStore`], with HTTP-status-aware
//! retry instead of a blind failure count, spec.md §4.2/§6.
//!
//! A streaming or polling source is expected to run forever, reconnecting
//! through transient failures. The only thing that should ever stop it
//! permanently is the data source reporting an unrecoverable HTTP status
//! (401/403/404/410) — everything else gets exponential backoff with
//! jitter, uncapped in retry count, capped in delay.

use crate::message::Message;
use crate::source::Source;
use crate::store::{FeatureStore, StoreError};
use futures::{future::BoxFuture, FutureExt, StreamExt};
use rand::Rng;
use std::fmt::{Debug, Display};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{error, warn};

const INITIAL_BACKOFF: Duration = Duration::from_millis(500);
const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// Lets the generic driver below ask a source-specific error whether it
/// should stop retrying entirely. Defaults to "always retry" so sources
/// that can't classify their own errors (the raw SSE transport) just get
/// indefinite backoff instead.
pub trait Recoverability {
    fn is_unrecoverable(&self) -> bool {
        false
    }
}

impl Recoverability for crate::source::requestor::RequestorError {
    fn is_unrecoverable(&self) -> bool {
        crate::source::requestor::RequestorError::is_unrecoverable(self)
    }
}

impl Recoverability for crate::source::streaming::StreamError<eventsource_client::Error> {
    fn is_unrecoverable(&self) -> bool {
        match self {
            crate::source::streaming::StreamError::Inner(eventsource_client::Error::UnexpectedResponse(status)) => {
                crate::http::is_unrecoverable(*status)
            }
            crate::source::streaming::StreamError::Inner(_) => false,
            crate::source::streaming::StreamError::Parse(_) => false,
            crate::source::streaming::StreamError::Resolve(e) => e.is_unrecoverable(),
        }
    }
}

/// The relay/external sentinel never fails, so it has nothing to classify
/// — kept so [`drive`] can be generic over `S::Error: Recoverability`
/// without special-casing it.
impl Recoverability for std::convert::Infallible {}

/// Readiness/failure signal, deliberately not generic over the source's
/// error type: it only needs to be cloned out of a [`watch`] channel and
/// rendered once, and the concrete error is already logged at the point
/// of failure.
#[derive(Clone, Debug, thiserror::Error)]
pub enum ReadError {
    #[error("background task dropped before reporting readiness")]
    TaskDropped,

    #[error("data source reported an unrecoverable error, giving up: {0}")]
    Unrecoverable(String),
}

/// Start driving `source` against `store` in the background, applying
/// every message as it arrives. The returned future resolves once the
/// store has completed its first full `init` (spec.md §4.2 "Readiness").
/// Dropping it doesn't stop the background task — it keeps running.
pub fn drive<S, ST>(source: S, store: Arc<ST>) -> BoxFuture<'static, Result<(), ReadError>>
where
    S: Source + Send + 'static,
    S::Stream: Unpin + Send,
    S::Error: Debug + Display + Recoverability + Send + Sync + 'static,
    ST: FeatureStore + Send + Sync + 'static,
{
    let (init_tx, mut init_rx) = watch::channel::<Option<Result<(), ReadError>>>(None);

    tokio::spawn(async move {
        let mut backoff = INITIAL_BACKOFF;
        let mut stream = source.stream();
        let mut ready_sent = false;

        loop {
            match stream.next().await {
                Some(Ok(msg)) => match apply(store.as_ref(), msg).await {
                    Ok(became_ready) => {
                        backoff = INITIAL_BACKOFF;
                        if became_ready && !ready_sent {
                            ready_sent = true;
                            let _ = init_tx.send(Some(Ok(())));
                        }
                    }
                    Err(e) => {
                        // spec.md §4.4/§7: a store write failure mid-stream
                        // can't be trusted to still be consistent with
                        // whatever the source sends next, so restart the
                        // connection and let the next snapshot reapply.
                        warn!(%e, "failed to apply store update, restarting stream");
                        let jitter_bound = (backoff.as_millis() as u64 / 2).max(1);
                        let jitter = rand::thread_rng().gen_range(0..jitter_bound);
                        tokio::time::sleep(backoff + Duration::from_millis(jitter)).await;
                        backoff = (backoff * 2).min(MAX_BACKOFF);
                        stream = source.stream();
                    }
                },
                Some(Err(error)) => {
                    if error.is_unrecoverable() {
                        error!(%error, "data source reported an unrecoverable error, stopping");
                        let _ = init_tx.send(Some(Err(ReadError::Unrecoverable(error.to_string()))));
                        return;
                    }
                    let jitter_bound = (backoff.as_millis() as u64 / 2).max(1);
                    let jitter = rand::thread_rng().gen_range(0..jitter_bound);
                    warn!(%error, ?backoff, "data source failed, reconnecting after backoff");
                    tokio::time::sleep(backoff + Duration::from_millis(jitter)).await;
                    backoff = (backoff * 2).min(MAX_BACKOFF);
                    stream = source.stream();
                }
                None => {
                    warn!("data source stream ended, reconnecting after backoff");
                    tokio::time::sleep(backoff).await;
                    backoff = (backoff * 2).min(MAX_BACKOFF);
                    stream = source.stream();
                }
            }
        }
    });

    async move {
        if init_rx.borrow().is_none() {
            init_rx.changed().await.map_err(|_| ReadError::TaskDropped)?;
        }
        let signal = init_rx.borrow().clone();
        signal.ok_or(ReadError::TaskDropped)?
    }
    .boxed()
}

async fn apply<ST: FeatureStore>(store: &ST, msg: Message) -> Result<bool, StoreError> {
    match msg {
        Message::Put(snapshot) => {
            store.init(snapshot).await?;
            Ok(true)
        }
        Message::Patch(kind, _key, item) => {
            store.upsert(kind, item).await?;
            Ok(false)
        }
        Message::Delete(kind, key, version) => {
            store.delete(kind, &key, version).await?;
            Ok(false)
        }
        Message::IndirectPut | Message::IndirectPatch(_) => {
            unreachable!("resolved by the streaming source before reaching the driver")
        }
        Message::Unknown => Ok(false),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryStore, Snapshot};
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration as StdDuration;

    #[derive(Debug, thiserror::Error)]
    #[error("source unavailable")]
    struct FlakyError;

    impl Recoverability for FlakyError {}

    /// A [`Source`] whose first connection ends immediately (forcing a
    /// reconnect) and whose second connection delivers a `put`, used to
    /// exercise scenario 6 (streaming recovery) without a real transport.
    struct FlakySource {
        attempts: Arc<AtomicUsize>,
    }

    impl Source for FlakySource {
        type Error = FlakyError;
        type Stream = futures::stream::BoxStream<'static, Result<Message, FlakyError>>;

        fn stream(&self) -> Self::Stream {
            use futures::StreamExt;
            let attempt = self.attempts.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            if attempt == 0 {
                futures::stream::once(async { Err(FlakyError) }).boxed()
            } else {
                futures::stream::once(async { Ok(Message::Put(Snapshot::new())) })
                    .chain(futures::stream::pending())
                    .boxed()
            }
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn transient_disconnect_reconnects_and_becomes_ready() {
        let store = Arc::new(MemoryStore::new());
        let source = FlakySource {
            attempts: Arc::new(AtomicUsize::new(0)),
        };

        let ready = drive(source, Arc::clone(&store));
        let result = tokio::time::timeout(StdDuration::from_secs(3), ready)
            .await
            .expect("readiness settled within the reconnect window");

        assert!(result.is_ok());
        assert!(store.initialized().await);
    }

    #[derive(Debug, thiserror::Error)]
    #[error("unauthorized")]
    struct UnauthorizedError;

    impl Recoverability for UnauthorizedError {
        fn is_unrecoverable(&self) -> bool {
            true
        }
    }

    struct UnrecoverableSource;

    impl Source for UnrecoverableSource {
        type Error = UnauthorizedError;
        type Stream = futures::stream::Once<futures::future::Ready<Result<Message, UnauthorizedError>>>;

        fn stream(&self) -> Self::Stream {
            futures::stream::once(futures::future::ready(Err(UnauthorizedError)))
        }
    }

    // Scenario 7, spec.md §8: an unrecoverable status on the very first
    // connect resolves the readiness future with failure and never
    // retries; the store stays uninitialized.
    #[tokio::test(flavor = "multi_thread")]
    async fn unrecoverable_error_on_start_resolves_readiness_as_failure() {
        let store = Arc::new(MemoryStore::new());
        let ready = drive(UnrecoverableSource, Arc::clone(&store));

        let result = tokio::time::timeout(StdDuration::from_secs(2), ready)
            .await
            .expect("readiness resolves promptly, without any retry backoff");

        assert!(matches!(result, Err(ReadError::Unrecoverable(_))));
        assert!(!store.initialized().await);
    }
}

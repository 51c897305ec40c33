//! SSE [`Source`], the primary way of keeping a store up to date,
//! spec.md §4.2/§6.
//!
//! Resolves `indirect/put`/`indirect/patch` events (which carry no body
//! of their own) into concrete [`Message`]s via a shared
//! [`Requestor`], and classifies every other event directly.

use super::{Requestor, Source};
use crate::http::HttpTransport;
use crate::message::{self, Message, MessageParseError};
use eventsource_client::{Client, Event, EventStream, HttpsConnector};
use futures::{future::BoxFuture, ready, Future, FutureExt, Stream};
use pin_project::pin_project;
use std::fmt::{Debug, Display};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tracing::{trace, warn};

const DEFAULT_STREAM_PATH: &str = "/all";

#[derive(Debug, thiserror::Error)]
pub enum StreamError<T>
where
    T: Debug + Display,
{
    #[error("SSE stream error: {0}")]
    Inner(T),

    #[error("failed to parse SSE event: {0}")]
    Parse(#[from] MessageParseError),

    #[error("failed to resolve indirect event: {0}")]
    Resolve(#[from] super::requestor::RequestorError),
}

/// Raw classification of an SSE event before indirect resolution.
#[derive(Debug)]
enum RawEvent {
    Message(Message),
    NeedsFetchAll,
    NeedsFetchOne(std::path::PathBuf),
    Unknown,
}

fn classify(event: Event) -> Result<RawEvent, MessageParseError> {
    let name = event.event_type.as_str();
    let data = event.field("data");
    trace!(%name, "reading SSE event");
    match name {
        "put" => {
            let data = data.ok_or(MessageParseError::MissingData)?;
            Ok(RawEvent::Message(message::parse_put(data)?))
        }
        "patch" => {
            let data = data.ok_or(MessageParseError::MissingData)?;
            Ok(RawEvent::Message(message::parse_patch(data)?))
        }
        "delete" => {
            let data = data.ok_or(MessageParseError::MissingData)?;
            Ok(RawEvent::Message(message::parse_delete(data)?))
        }
        "indirect/put" => Ok(RawEvent::NeedsFetchAll),
        "indirect/patch" => {
            let data = data.ok_or(MessageParseError::MissingData)?;
            Ok(RawEvent::NeedsFetchOne(message::parse_indirect_patch_path(data)?))
        }
        _ => {
            warn!(%name, "unknown SSE event type");
            Ok(RawEvent::Unknown)
        }
    }
}

/// [`Source`] reading the SSE stream, with `indirect/*` events resolved
/// against `/sdk/latest-*` via an injected [`Requestor`].
pub struct StreamingSource<T> {
    client: Client<HttpsConnector>,
    requestor: Arc<Requestor<T>>,
}

impl<T: HttpTransport> StreamingSource<T> {
    pub fn new(stream_base_url: &str, sdk_key: &str, requestor: Requestor<T>) -> Result<Self, eventsource_client::Error> {
        let url = format!("{}{}", stream_base_url.trim_end_matches('/'), DEFAULT_STREAM_PATH);
        let client = eventsource_client::Client::for_url(&url)?
            .header("Authorization", sdk_key)?
            .build();
        Ok(Self {
            client,
            requestor: Arc::new(requestor),
        })
    }
}

impl<T: HttpTransport + Send + Sync + 'static> Source for StreamingSource<T> {
    type Error = StreamError<eventsource_client::Error>;
    type Stream = ResolvingStream<T>;

    fn stream(&self) -> Self::Stream {
        ResolvingStream {
            inner: Box::pin(self.client.stream()),
            requestor: Arc::clone(&self.requestor),
            pending: None,
        }
    }
}

/// Wraps the raw SSE event stream, interleaving async resolution of
/// `indirect/*` events via the [`Requestor`].
#[pin_project]
pub struct ResolvingStream<T> {
    #[pin]
    inner: Pin<Box<EventStream<HttpsConnector>>>,
    requestor: Arc<Requestor<T>>,
    #[pin]
    pending: Option<BoxFuture<'static, Result<Message, StreamError<eventsource_client::Error>>>>,
}

impl<T: HttpTransport + Send + Sync + 'static> Stream for ResolvingStream<T> {
    type Item = Result<Message, StreamError<eventsource_client::Error>>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let mut this = self.project();

        if let Some(fut) = this.pending.as_mut().as_pin_mut() {
            let result = ready!(fut.poll(cx));
            this.pending.set(None);
            return Poll::Ready(Some(result));
        }

        let event = match ready!(this.inner.poll_next(cx)).transpose().map_err(StreamError::Inner)? {
            Some(ev) => ev,
            None => return Poll::Ready(None),
        };

        match classify(event).map_err(StreamError::Parse) {
            Ok(RawEvent::Message(msg)) => Poll::Ready(Some(Ok(msg))),
            Ok(RawEvent::Unknown) => Poll::Ready(Some(Ok(Message::Unknown))),
            Ok(RawEvent::NeedsFetchAll) => {
                let requestor = Arc::clone(this.requestor);
                let fut = async move {
                    let snapshot = requestor.fetch_all().await?;
                    Ok(Message::Put(snapshot))
                }
                .boxed();
                this.pending.set(Some(fut));
                cx.waker().wake_by_ref();
                Poll::Pending
            }
            Ok(RawEvent::NeedsFetchOne(path)) => {
                let requestor = Arc::clone(this.requestor);
                let fut = async move { Ok(requestor.fetch_one(&path).await?) }.boxed();
                this.pending.set(Some(fut));
                cx.waker().wake_by_ref();
                Poll::Pending
            }
            Err(e) => Poll::Ready(Some(Err(e))),
        }
    }
}


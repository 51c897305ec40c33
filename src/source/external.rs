//! Relay/external sentinel [`Source`], spec.md §4.4 "Relay/external mode"
//! and §9 "Offline mode".
//!
//! Performs no I/O at all. It hands the driver a single empty `put` so
//! the store's `initialized()` flips true immediately, then pends
//! forever — the store is assumed to be populated out-of-band, either by
//! a relay process writing directly to a shared backend, or (for offline
//! mode) not at all.

use crate::message::Message;
use crate::source::Source;
use crate::store::Snapshot;
use futures::future::Ready;
use futures::stream::{Chain, Once, Pending};
use std::convert::Infallible;

/// A [`Source`] for deployments where something other than this SDK keeps
/// the store current — a relay proxy writing to a shared persistent
/// store, or offline mode, where the store is expected to stay exactly
/// as the caller pre-populated it.
#[derive(Clone, Copy, Debug, Default)]
pub struct ExternalUpdatesSource;

impl ExternalUpdatesSource {
    pub fn new() -> Self {
        Self
    }
}

impl Source for ExternalUpdatesSource {
    type Error = Infallible;
    type Stream = Chain<Once<Ready<Result<Message, Infallible>>>, Pending<Result<Message, Infallible>>>;

    fn stream(&self) -> Self::Stream {
        let ready = futures::future::ready(Ok(Message::Put(Snapshot::new())));
        futures::stream::once(ready).chain(futures::stream::pending())
    }
}

//! Data source abstraction: streaming (SSE) and polling, spec.md §4.2.
//!
//! Mirrors the teacher's `Source` trait: whenever the returned stream
//! ends or errors, `stream()` is called again for a fresh one. Restart
//! policy (backoff, giving up on an unrecoverable status) lives in the
//! driver ([`crate::consumer`]), not here.

pub mod external;
pub mod polling;
pub mod requestor;
pub mod streaming;

pub use external::ExternalUpdatesSource;
pub use polling::PollingSource;
pub use requestor::Requestor;
pub use streaming::StreamingSource;

use crate::message::Message;
use futures::Stream;
use std::sync::Arc;

pub trait Source {
    type Error;
    type Stream: Stream<Item = Result<Message, Self::Error>>;

    fn stream(&self) -> Self::Stream;
}

impl<T: Source> Source for Arc<T> {
    type Error = T::Error;
    type Stream = T::Stream;

    fn stream(&self) -> Self::Stream {
        self.as_ref().stream()
    }
}

//! Analytics event pipeline: summarization, deduplication and delivery of
//! evaluation/identify/custom events to the events service, spec.md §4.5.

pub mod diagnostic;
mod flush;
mod processor;
mod summarizer;
pub mod types;

pub use processor::{DiagnosticStats, EventProcessor, EventProcessorConfig, EventSink};
pub use types::{CustomInput, FeatureRequestInput, IdentifyInput};

/// Stateless no-op sink used in offline mode (spec.md §9 "Offline mode").
/// Every call is a cheap no-op; there is no inbox, no background task and
/// nothing to flush or close.
#[derive(Clone, Copy, Default)]
pub struct NullEventProcessor;

impl EventSink for NullEventProcessor {
    fn send_feature_request(&self, _input: FeatureRequestInput) {}
    fn send_identify(&self, _input: IdentifyInput) {}
    fn send_custom(&self, _input: CustomInput) {}
    fn flush(&self) {}
    fn close(&self) {}
}

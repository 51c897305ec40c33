//! Feature-flag evaluation and delivery client, spec.md §1/§9.
//!
//! [`DefaultClient`] is thin glue over four independent pieces that can
//! each be swapped out: a [`FeatureStore`], a [`Source`] that keeps it
//! updated, an [`Evaluator`] that reads it, and an [`EventSink`] that
//! reports what evaluation saw.

pub mod config;
pub mod consumer;
pub mod evaluator;
pub mod events;
pub mod http;
pub mod message;
pub mod model;
pub mod source;
pub mod store;
#[cfg(test)]
mod test_utils;

pub use config::{Config, ConfigBuilder};
pub use evaluator::{EvaluationOutcome, Evaluator};
pub use events::{EventProcessor, EventSink, NullEventProcessor};
pub use model::{EvalErrorKind, EvaluationDetail, Reason, User};
pub use store::{FeatureStore, MemoryStore};

use consumer::Recoverability;
use http::HyperTransport;
use source::requestor::Requestor;
use source::streaming::StreamingSource;
use source::{ExternalUpdatesSource, PollingSource, Source};
use std::fmt::{Debug, Display};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum CreateError {
    #[error("failed to build the streaming source: {0}")]
    Stream(#[from] eventsource_client::Error),
}

/// Client providing the idiomatic way of retrieving flag values for a
/// user. Evaluation never blocks on network I/O: it always reads
/// whatever is currently in the store, even before the first `init`
/// completes (spec.md §4.1, `EvalErrorKind::FlagNotFound` until then).
pub struct DefaultClient<ST = MemoryStore> {
    store: Arc<ST>,
    evaluator: Evaluator<Arc<ST>>,
    events: Arc<dyn EventSink>,
    ready: Option<futures::future::BoxFuture<'static, Result<(), consumer::ReadError>>>,
}

impl DefaultClient<MemoryStore> {
    /// Build a client from an SDK key using LaunchDarkly's default
    /// streaming + HTTP events stack.
    pub async fn with_sdk_key(sdk_key: impl Into<String>) -> Result<Self, CreateError> {
        Self::with_config(Config::builder(sdk_key).build()).await
    }

    pub async fn with_config(config: Config) -> Result<Self, CreateError> {
        let store = Arc::new(MemoryStore::new());

        if config.offline {
            // spec.md §9 "Offline" dominates every other setting: no
            // network is touched, but the sentinel source still flips
            // `initialized()` true immediately (spec.md §4.4).
            let evaluator = Evaluator::new(Arc::clone(&store));
            let ready = start_source(ExternalUpdatesSource::new(), Arc::clone(&store));
            let mut client = Self {
                store,
                evaluator,
                events: Arc::new(NullEventProcessor),
                ready: Some(ready),
            };
            client.wait_for_ready(config.start_wait).await;
            return Ok(client);
        }

        let events: Arc<dyn EventSink> = if config.send_events {
            Arc::new(EventProcessor::start(
                config.events.clone(),
                HyperTransport::new(),
                config.events_base_url.clone(),
                config.sdk_key.clone(),
            ))
        } else {
            Arc::new(NullEventProcessor)
        };

        let ready = if config.stream_disabled {
            let requestor = Requestor::new(
                HyperTransport::new(),
                config.poll_base_url.clone(),
                config.sdk_key.clone(),
            );
            let source = PollingSource::new(requestor, config.poll_interval);
            start_source(source, Arc::clone(&store))
        } else {
            let requestor = Requestor::new(
                HyperTransport::new(),
                config.poll_base_url.clone(),
                config.sdk_key.clone(),
            );
            let source = StreamingSource::new(&config.stream_base_url, &config.sdk_key, requestor)?;
            start_source(source, Arc::clone(&store))
        };

        let evaluator = Evaluator::new(Arc::clone(&store));
        let mut client = Self {
            store,
            evaluator,
            events,
            ready: Some(ready),
        };
        client.wait_for_ready(config.start_wait).await;
        Ok(client)
    }
}

fn start_source<S, ST>(
    source: S,
    store: Arc<ST>,
) -> futures::future::BoxFuture<'static, Result<(), consumer::ReadError>>
where
    S: Source + Send + 'static,
    S::Stream: Unpin + Send,
    S::Error: Debug + Display + Recoverability + Send + Sync + 'static,
    ST: FeatureStore + Send + Sync + 'static,
{
    consumer::drive(source, store)
}

impl<ST: FeatureStore + Send + Sync + 'static> DefaultClient<ST> {
    /// Build a client around a custom store (e.g. a
    /// [`CachingFeatureStore`](store::CachingFeatureStore) fronting a
    /// persistent backend) and a custom analytics sink, with no data
    /// source of its own attached yet — see [`with_source`](Self::with_source).
    pub fn new(store: Arc<ST>, events: Arc<dyn EventSink>) -> Self {
        let evaluator = Evaluator::new(Arc::clone(&store));
        Self {
            store,
            evaluator,
            events,
            ready: None,
        }
    }

    /// Attach a data source to drive this store, replacing any readiness
    /// future set by [`with_config`](DefaultClient::with_config).
    pub fn with_source<S>(mut self, source: S) -> Self
    where
        S: Source + Send + 'static,
        S::Stream: Unpin + Send,
        S::Error: Debug + Display + Recoverability + Send + Sync + 'static,
    {
        self.ready = Some(start_source(source, Arc::clone(&self.store)));
        self
    }

    /// Attach the relay/external sentinel source (spec.md §4.4 "Relay/
    /// external mode"): no I/O, `initialized()` becomes true immediately,
    /// and the store is expected to be populated out-of-band.
    pub fn with_external_source(self) -> Self {
        self.with_source(ExternalUpdatesSource::new())
    }

    /// Wait for the store's first full `init`, up to `timeout`. Offline
    /// clients and clients with no attached source resolve immediately.
    pub async fn wait_for_ready(&mut self, timeout: Duration) -> bool {
        let Some(ready) = self.ready.take() else {
            return true;
        };
        matches!(tokio::time::timeout(timeout, ready).await, Ok(Ok(())))
    }

    pub fn store(&self) -> &Arc<ST> {
        &self.store
    }

    pub async fn is_initialized(&self) -> bool {
        self.store.initialized().await
    }

    /// Evaluate `flag_key` for `user`, returning the full detail and
    /// reporting a `FeatureRequest` analytics event for it and for every
    /// prerequisite evaluated along the way (spec.md §4.5).
    pub async fn variation_detail(
        &self,
        flag_key: &str,
        user: &User,
        default: serde_json::Value,
    ) -> EvaluationDetail {
        let default_for_event = default.clone();
        let outcome = self.evaluator.evaluate(flag_key, user, default).await;
        self.report(flag_key, user, &outcome, default_for_event, None);
        for prereq in &outcome.prerequisite_events {
            self.report_prerequisite(user, prereq);
        }
        outcome.detail
    }

    pub async fn bool_variation(&self, flag_key: &str, user: &User, default: bool) -> bool {
        self.variation_detail(flag_key, user, serde_json::json!(default))
            .await
            .value
            .as_bool()
            .unwrap_or(default)
    }

    pub async fn string_variation(&self, flag_key: &str, user: &User, default: &str) -> String {
        self.variation_detail(flag_key, user, serde_json::json!(default))
            .await
            .value
            .as_str()
            .map(str::to_string)
            .unwrap_or_else(|| default.to_string())
    }

    pub async fn int_variation(&self, flag_key: &str, user: &User, default: i64) -> i64 {
        self.variation_detail(flag_key, user, serde_json::json!(default))
            .await
            .value
            .as_i64()
            .unwrap_or(default)
    }

    pub async fn float_variation(&self, flag_key: &str, user: &User, default: f64) -> f64 {
        self.variation_detail(flag_key, user, serde_json::json!(default))
            .await
            .value
            .as_f64()
            .unwrap_or(default)
    }

    pub async fn json_variation(
        &self,
        flag_key: &str,
        user: &User,
        default: serde_json::Value,
    ) -> serde_json::Value {
        self.variation_detail(flag_key, user, default).await.value
    }

    /// Report a custom analytics event (spec.md §4.5).
    pub fn track(&self, key: &str, user: &User, data: Option<serde_json::Value>, metric_value: Option<f64>) {
        self.events.send_custom(events::CustomInput {
            user: user.clone(),
            key: key.to_string(),
            data,
            metric_value,
            creation_date: now_millis(),
        });
    }

    /// Report an explicit identify event (spec.md §4.5).
    pub fn identify(&self, user: &User) {
        self.events.send_identify(events::IdentifyInput {
            user: user.clone(),
            creation_date: now_millis(),
        });
    }

    pub fn flush(&self) {
        self.events.flush();
    }

    pub fn close(&self) {
        self.events.close();
    }

    fn report(
        &self,
        flag_key: &str,
        user: &User,
        outcome: &EvaluationOutcome,
        default: serde_json::Value,
        prereq_of: Option<String>,
    ) {
        self.events.send_feature_request(events::FeatureRequestInput {
            user: user.clone(),
            flag_key: flag_key.to_string(),
            flag_version: outcome.flag_version,
            variation_index: outcome.detail.variation_index,
            value: outcome.detail.value.clone(),
            default,
            reason: outcome.detail.reason.clone(),
            track_events: outcome.track_events,
            debug_events_until_date: outcome.debug_events_until_date,
            prerequisite_of: prereq_of,
            creation_date: now_millis(),
        });
    }

    fn report_prerequisite(&self, user: &User, prereq: &evaluator::PrerequisiteEvaluation) {
        self.events.send_feature_request(events::FeatureRequestInput {
            user: user.clone(),
            flag_key: prereq.flag_key.clone(),
            flag_version: prereq.flag_version,
            variation_index: prereq.variation_index,
            value: prereq.value.clone(),
            default: serde_json::Value::Null,
            reason: prereq.reason.clone(),
            track_events: prereq.track_events,
            debug_events_until_date: None,
            prerequisite_of: Some(prereq.prerequisite_of.clone()),
            creation_date: now_millis(),
        });
    }
}

fn now_millis() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

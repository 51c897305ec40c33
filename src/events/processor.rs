//! Dispatcher: owns the inbox, the per-user dedup cache and the
//! summarizer, and hands completed batches to the [`FlushWorkerPool`],
//! spec.md §4.5.

use super::diagnostic;
use super::flush::{FlushPayload, FlushWorkerPool};
use super::summarizer::Summarizer;
use super::types::{
    CustomEvent, CustomInput, DebugEvent, FeatureEvent, FeatureRequestInput, IdentifyEvent,
    IdentifyInput, IndexEvent, InputEvent, OutputEvent,
};
use crate::http::HttpTransport;
use lru::LruCache;
use parking_lot::Mutex as SyncMutex;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::interval;
use tracing::warn;

pub fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

#[derive(Clone, Debug)]
pub struct EventProcessorConfig {
    pub inbox_capacity: usize,
    pub flush_interval: Duration,
    pub batch_size: usize,
    pub user_keys_capacity: usize,
    pub user_keys_flush_interval: Duration,
    pub flush_workers: usize,
    /// Whether to run the periodic `/diagnostic` task, spec.md §4.5.
    pub send_diagnostics: bool,
    pub diagnostic_interval: Duration,
}

impl Default for EventProcessorConfig {
    fn default() -> Self {
        Self {
            inbox_capacity: 10_000,
            flush_interval: Duration::from_secs(5),
            batch_size: 50,
            user_keys_capacity: 1000,
            user_keys_flush_interval: Duration::from_secs(5 * 60),
            flush_workers: 5,
            send_diagnostics: true,
            diagnostic_interval: diagnostic::DEFAULT_INTERVAL,
        }
    }
}

enum Message {
    Event(InputEvent),
    Flush,
    FlushUsers,
    Shutdown,
}

#[derive(Default)]
pub struct DiagnosticStats {
    pub dropped_events: AtomicU64,
    pub deduplicated_users: AtomicU64,
}

/// Analytics ingestion facade used by evaluation callers (spec.md §4.5).
/// Implemented by [`EventProcessor`] and, for offline mode, by
/// [`NullEventProcessor`](super::NullEventProcessor).
pub trait EventSink: Send + Sync {
    fn send_feature_request(&self, input: FeatureRequestInput);
    fn send_identify(&self, input: IdentifyInput);
    fn send_custom(&self, input: CustomInput);
    fn flush(&self);
    fn close(&self);
}

pub struct EventProcessor {
    inbox: mpsc::Sender<Message>,
    overflowed: Arc<AtomicBool>,
    stats: Arc<DiagnosticStats>,
    last_known_past_time: Arc<AtomicI64>,
    diagnostic_handle: SyncMutex<Option<JoinHandle<()>>>,
}

impl EventProcessor {
    pub fn start<T: HttpTransport + 'static>(
        config: EventProcessorConfig,
        transport: T,
        events_base_url: String,
        sdk_key: String,
    ) -> Self {
        let (tx, rx) = mpsc::channel(config.inbox_capacity);
        let stats = Arc::new(DiagnosticStats::default());
        let last_known_past_time = Arc::new(AtomicI64::new(0));
        let overflowed = Arc::new(AtomicBool::new(false));
        let transport = Arc::new(transport);

        let pool = FlushWorkerPool::start(
            config.flush_workers,
            Arc::clone(&transport),
            events_base_url.clone(),
            sdk_key.clone(),
            Arc::clone(&last_known_past_time),
        );

        let diagnostic_handle = if config.send_diagnostics {
            Some(diagnostic::spawn(
                transport,
                events_base_url,
                sdk_key,
                Arc::clone(&stats),
                config.diagnostic_interval,
            ))
        } else {
            None
        };

        let dispatcher = Dispatcher {
            rx,
            config: config.clone(),
            summarizer: Summarizer::new(now_millis()),
            out_buffer: Vec::new(),
            user_keys: LruCache::new(config.user_keys_capacity),
            last_known_past_time: Arc::clone(&last_known_past_time),
            stats: Arc::clone(&stats),
            pool,
        };
        tokio::spawn(dispatcher.run());

        let tick_tx = tx.clone();
        let flush_interval = config.flush_interval;
        tokio::spawn(async move {
            let mut ticker = interval(flush_interval);
            loop {
                ticker.tick().await;
                if tick_tx.send(Message::Flush).await.is_err() {
                    break;
                }
            }
        });

        let user_flush_tx = tx.clone();
        let user_keys_flush_interval = config.user_keys_flush_interval;
        tokio::spawn(async move {
            let mut ticker = interval(user_keys_flush_interval);
            loop {
                ticker.tick().await;
                if user_flush_tx.send(Message::FlushUsers).await.is_err() {
                    break;
                }
            }
        });

        Self {
            inbox: tx,
            overflowed,
            stats,
            last_known_past_time,
            diagnostic_handle: SyncMutex::new(diagnostic_handle),
        }
    }

    fn try_send(&self, message: Message) {
        match self.inbox.try_send(message) {
            Ok(()) => {
                self.overflowed.store(false, Ordering::Relaxed);
            }
            Err(e) => {
                self.stats.dropped_events.fetch_add(1, Ordering::Relaxed);
                if !self.overflowed.swap(true, Ordering::Relaxed) {
                    let dropped = match e {
                        mpsc::error::TrySendError::Full(m) => m,
                        mpsc::error::TrySendError::Closed(m) => m,
                    };
                    match dropped {
                        Message::Event(event) => {
                            let mut hasher = DefaultHasher::new();
                            event.user().key.hash(&mut hasher);
                            warn!(
                                user_key_hash = hasher.finish(),
                                creation_date = event.creation_date(),
                                "event inbox full, dropping events until it drains"
                            );
                        }
                        Message::Flush | Message::FlushUsers | Message::Shutdown => {
                            warn!("event inbox full, dropping events until it drains");
                        }
                    }
                }
            }
        }
    }

    pub fn diagnostic_stats(&self) -> Arc<DiagnosticStats> {
        Arc::clone(&self.stats)
    }

    /// Server-clock estimate derived from the last `Date` response header
    /// seen by a flush worker, used for the debug-event window check
    /// (spec.md §4.5, Open Question "clock source for debug window").
    pub fn last_known_past_time(&self) -> i64 {
        self.last_known_past_time.load(Ordering::Relaxed)
    }
}

impl EventSink for EventProcessor {
    fn send_feature_request(&self, input: FeatureRequestInput) {
        self.try_send(Message::Event(InputEvent::FeatureRequest(input)));
    }

    fn send_identify(&self, input: IdentifyInput) {
        self.try_send(Message::Event(InputEvent::Identify(input)));
    }

    fn send_custom(&self, input: CustomInput) {
        self.try_send(Message::Event(InputEvent::Custom(input)));
    }

    fn flush(&self) {
        self.try_send(Message::Flush);
    }

    fn close(&self) {
        self.try_send(Message::Shutdown);
        if let Some(handle) = self.diagnostic_handle.lock().take() {
            handle.abort();
        }
    }
}

struct Dispatcher<T> {
    rx: mpsc::Receiver<Message>,
    config: EventProcessorConfig,
    summarizer: Summarizer,
    out_buffer: Vec<OutputEvent>,
    user_keys: LruCache<String, ()>,
    last_known_past_time: Arc<AtomicI64>,
    stats: Arc<DiagnosticStats>,
    pool: FlushWorkerPool<T>,
}

impl<T: HttpTransport + 'static> Dispatcher<T> {
    async fn run(mut self) {
        loop {
            let mut batch = Vec::with_capacity(self.config.batch_size);
            match self.rx.recv().await {
                Some(msg) => batch.push(msg),
                None => break,
            };
            while batch.len() < self.config.batch_size {
                match self.rx.try_recv() {
                    Ok(msg) => batch.push(msg),
                    Err(_) => break,
                }
            }

            let mut shutting_down = false;
            for msg in batch {
                match msg {
                    Message::Event(event) => {
                        if !self.pool.is_disabled() {
                            self.process_event(event);
                        }
                    }
                    Message::Flush => self.do_flush(),
                    Message::FlushUsers => self.user_keys.clear(),
                    Message::Shutdown => shutting_down = true,
                }
            }

            if shutting_down {
                self.do_flush();
                self.pool.close().await;
                break;
            }
        }
    }

    fn process_event(&mut self, event: InputEvent) {
        match event {
            InputEvent::FeatureRequest(fr) => self.process_feature_request(fr),
            InputEvent::Identify(id) => self.process_identify(id),
            InputEvent::Custom(custom) => self.process_custom(custom),
        }
    }

    /// Returns `true` if this user key has not been seen inside the
    /// current dedup window and therefore needs an `index` event.
    fn note_user(&mut self, user_key: &str) -> bool {
        if self.user_keys.get(user_key).is_some() {
            self.stats.deduplicated_users.fetch_add(1, Ordering::Relaxed);
            false
        } else {
            self.user_keys.put(user_key.to_string(), ());
            true
        }
    }

    fn process_feature_request(&mut self, fr: FeatureRequestInput) {
        self.summarizer.record(&fr);

        if self.note_user(&fr.user.key) {
            self.out_buffer.push(OutputEvent::Index(IndexEvent {
                creation_date: fr.creation_date,
                user: fr.user.clone(),
            }));
        }

        if fr.track_events {
            self.out_buffer.push(OutputEvent::Feature(FeatureEvent {
                creation_date: fr.creation_date,
                key: fr.flag_key.clone(),
                user_key: fr.user.key.clone(),
                value: fr.value.clone(),
                default: fr.default.clone(),
                version: fr.flag_version,
                variation: fr.variation_index,
                track_events: fr.track_events,
                prereq_of: fr.prerequisite_of.clone(),
            }));
        }

        if let Some(debug_until) = fr.debug_events_until_date {
            // biased toward ending the debug window sooner when the
            // local and server clocks disagree, per spec.md §4.5
            let reference_now = now_millis().max(self.last_known_past_time.load(Ordering::Relaxed));
            if debug_until > reference_now {
                self.out_buffer.push(OutputEvent::Debug(DebugEvent {
                    creation_date: fr.creation_date,
                    key: fr.flag_key,
                    user: fr.user,
                    value: fr.value,
                    default: fr.default,
                    version: fr.flag_version,
                    variation: fr.variation_index,
                }));
            }
        }
    }

    fn process_identify(&mut self, id: IdentifyInput) {
        self.user_keys.put(id.user.key.clone(), ());
        self.out_buffer.push(OutputEvent::Identify(IdentifyEvent {
            creation_date: id.creation_date,
            user: id.user,
        }));
    }

    fn process_custom(&mut self, custom: CustomInput) {
        if self.note_user(&custom.user.key) {
            self.out_buffer.push(OutputEvent::Index(IndexEvent {
                creation_date: custom.creation_date,
                user: custom.user.clone(),
            }));
        }
        self.out_buffer.push(OutputEvent::Custom(CustomEvent {
            creation_date: custom.creation_date,
            key: custom.key,
            user_key: custom.user.key.clone(),
            data: custom.data,
            metric_value: custom.metric_value,
        }));
    }

    fn do_flush(&mut self) {
        if self.pool.is_disabled() {
            self.out_buffer.clear();
            return;
        }
        let summary = self.summarizer.flush(now_millis());
        let mut events = std::mem::take(&mut self.out_buffer);
        if let Some(summary) = summary {
            events.push(OutputEvent::Summary(summary));
        }
        if events.is_empty() {
            return;
        }
        if let Err(payload) = self.pool.try_submit(FlushPayload { events }) {
            // no worker free: retain events for the next flush tick
            // rather than blocking the dispatcher (spec.md §4.5).
            self.out_buffer = payload.events;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::{ConditionalRequest, HttpResponse, TransportError};
    use crate::model::{Reason, User};
    use async_trait::async_trait;
    use bytes::Bytes;
    use std::sync::Mutex as StdMutex;
    use std::time::Duration as StdDuration;

    #[derive(Default)]
    struct RecordingTransport {
        posts: StdMutex<Vec<Bytes>>,
    }

    #[async_trait]
    impl HttpTransport for RecordingTransport {
        async fn get(
            &self,
            _url: &str,
            _headers: &[(&str, &str)],
            _conditional: ConditionalRequest,
        ) -> Result<HttpResponse, TransportError> {
            unreachable!("event processor never issues GET requests")
        }

        async fn post_json(
            &self,
            _url: &str,
            _headers: &[(&str, &str)],
            body: Bytes,
        ) -> Result<HttpResponse, TransportError> {
            self.posts.lock().unwrap().push(body);
            Ok(HttpResponse {
                status: http::StatusCode::OK,
                headers: Default::default(),
                body: Bytes::new(),
            })
        }
    }

    fn feature_request(flag_key: &str, track_events: bool) -> FeatureRequestInput {
        FeatureRequestInput {
            user: User::new("u1"),
            flag_key: flag_key.to_string(),
            flag_version: Some(1),
            variation_index: Some(0),
            value: serde_json::json!(true),
            default: serde_json::json!(false),
            reason: Reason::Fallthrough,
            track_events,
            debug_events_until_date: None,
            prerequisite_of: None,
            creation_date: 0,
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn untracked_evaluations_are_summarized_not_sent_individually() {
        let transport = Arc::new(RecordingTransport::default());
        let processor = EventProcessor::start(
            EventProcessorConfig {
                flush_interval: StdDuration::from_secs(3600),
                ..Default::default()
            },
            Arc::clone(&transport),
            "https://events.example".to_string(),
            "sdk-key".to_string(),
        );

        for _ in 0..5 {
            processor.send_feature_request(feature_request("flag-a", false));
        }
        processor.flush();
        tokio::time::sleep(StdDuration::from_millis(50)).await;

        let posts = transport.posts.lock().unwrap();
        assert_eq!(posts.len(), 1);
        let body: serde_json::Value = serde_json::from_slice(&posts[0]).unwrap();
        let kinds: Vec<&str> = body
            .as_array()
            .unwrap()
            .iter()
            .map(|e| e["kind"].as_str().unwrap())
            .collect();
        assert!(kinds.contains(&"summary"));
        assert!(!kinds.contains(&"feature"));
        // exactly one index event for the single distinct user
        assert_eq!(kinds.iter().filter(|k| **k == "index").count(), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn tracked_evaluations_emit_individual_feature_events() {
        let transport = Arc::new(RecordingTransport::default());
        let processor = EventProcessor::start(
            EventProcessorConfig {
                flush_interval: StdDuration::from_secs(3600),
                ..Default::default()
            },
            Arc::clone(&transport),
            "https://events.example".to_string(),
            "sdk-key".to_string(),
        );

        processor.send_feature_request(feature_request("flag-a", true));
        processor.flush();
        tokio::time::sleep(StdDuration::from_millis(50)).await;

        let posts = transport.posts.lock().unwrap();
        let body: serde_json::Value = serde_json::from_slice(&posts[0]).unwrap();
        let kinds: Vec<&str> = body
            .as_array()
            .unwrap()
            .iter()
            .map(|e| e["kind"].as_str().unwrap())
            .collect();
        assert!(kinds.contains(&"feature"));
    }
}

//! Functional-options client configuration, spec.md §9.

use crate::events::EventProcessorConfig;
use std::time::Duration;

pub const DEFAULT_STREAM_BASE_URL: &str = "https://stream.launchdarkly.com";
pub const DEFAULT_POLL_BASE_URL: &str = "https://sdk.launchdarkly.com";
pub const DEFAULT_EVENTS_BASE_URL: &str = "https://events.launchdarkly.com";

/// Every knob a [`DefaultClient`](crate::DefaultClient) needs, with
/// LaunchDarkly's published defaults baked in. Built through
/// [`ConfigBuilder`] rather than constructed directly, so new fields
/// don't become a breaking change.
#[derive(Clone, Debug)]
pub struct Config {
    pub sdk_key: String,
    pub stream_base_url: String,
    pub poll_base_url: String,
    pub events_base_url: String,

    /// When `true`, use polling instead of streaming.
    pub stream_disabled: bool,
    pub poll_interval: Duration,

    pub events: EventProcessorConfig,
    pub send_events: bool,

    /// No network I/O at all; flags resolve only from a pre-populated
    /// store (spec.md §9 "Offline mode").
    pub offline: bool,

    /// How long `DefaultClient::new` blocks waiting for the first
    /// successful `init` before returning anyway.
    pub start_wait: Duration,
}

impl Config {
    pub fn builder(sdk_key: impl Into<String>) -> ConfigBuilder {
        ConfigBuilder::new(sdk_key)
    }
}

pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn new(sdk_key: impl Into<String>) -> Self {
        Self {
            config: Config {
                sdk_key: sdk_key.into(),
                stream_base_url: DEFAULT_STREAM_BASE_URL.to_string(),
                poll_base_url: DEFAULT_POLL_BASE_URL.to_string(),
                events_base_url: DEFAULT_EVENTS_BASE_URL.to_string(),
                stream_disabled: false,
                poll_interval: crate::source::polling::MIN_POLL_INTERVAL,
                events: EventProcessorConfig::default(),
                send_events: true,
                offline: false,
                start_wait: Duration::from_secs(5),
            },
        }
    }

    pub fn stream_base_url(mut self, url: impl Into<String>) -> Self {
        self.config.stream_base_url = url.into();
        self
    }

    pub fn poll_base_url(mut self, url: impl Into<String>) -> Self {
        self.config.poll_base_url = url.into();
        self
    }

    pub fn events_base_url(mut self, url: impl Into<String>) -> Self {
        self.config.events_base_url = url.into();
        self
    }

    /// Point every service at the same relay-proxy base URL, spec.md §9
    /// "Relay proxy support".
    pub fn relay_proxy(mut self, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        self.config.stream_base_url = base_url.clone();
        self.config.poll_base_url = base_url.clone();
        self.config.events_base_url = base_url;
        self
    }

    pub fn stream_disabled(mut self, disabled: bool) -> Self {
        self.config.stream_disabled = disabled;
        self
    }

    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.config.poll_interval = interval;
        self
    }

    pub fn send_events(mut self, send: bool) -> Self {
        self.config.send_events = send;
        self
    }

    pub fn events(mut self, events: EventProcessorConfig) -> Self {
        self.config.events = events;
        self
    }

    pub fn offline(mut self, offline: bool) -> Self {
        self.config.offline = offline;
        self
    }

    pub fn start_wait(mut self, wait: Duration) -> Self {
        self.config.start_wait = wait;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}

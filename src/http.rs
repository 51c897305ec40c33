//! Shared HTTP plumbing: status classification (spec.md §6) and a
//! pluggable transport contract (spec.md §9 "Blocking I/O abstraction")
//! used by the data source, the requestor and the event processor so
//! they can all share one underlying client for connection reuse
//! (spec.md §5 "Shared resources").

use bytes::Bytes;
use http::StatusCode;
use std::collections::HashMap;
use std::sync::Arc;

/// HTTP statuses that should never be retried — spec.md §6: once seen,
/// the owning component disables itself permanently.
pub fn is_unrecoverable(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::UNAUTHORIZED
            | StatusCode::FORBIDDEN
            | StatusCode::NOT_FOUND
            | StatusCode::GONE
    )
}

pub fn is_recoverable(status: StatusCode) -> bool {
    !is_unrecoverable(status)
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum TransportError {
    #[error("request failed: {0}")]
    Request(String),
    #[error("unexpected status {0}")]
    Status(StatusCode),
}

/// Response to a one-shot JSON/bytes fetch.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: StatusCode,
    pub headers: HashMap<String, String>,
    pub body: Bytes,
}

impl HttpResponse {
    /// Parse the `Date` header into epoch milliseconds, used by the event
    /// processor's server-clock estimate (spec.md §4.5).
    pub fn date_millis(&self) -> Option<i64> {
        let raw = self.headers.get("date")?;
        chrono::DateTime::parse_from_rfc2822(raw)
            .ok()
            .map(|dt| dt.timestamp_millis())
    }

    pub fn etag(&self) -> Option<&str> {
        self.headers.get("etag").map(|s| s.as_str())
    }

    pub fn last_modified(&self) -> Option<&str> {
        self.headers.get("last-modified").map(|s| s.as_str())
    }
}

/// Conditional GET support for the polling strategy (spec.md §6).
#[derive(Debug, Clone, Default)]
pub struct ConditionalRequest {
    pub if_none_match: Option<String>,
    pub if_modified_since: Option<String>,
}

/// One-shot HTTP verbs needed by the requestor, the polling strategy and
/// the event processor. A reference implementation wraps `hyper`;
/// callers needing a different stack (a mock in tests, or a different
/// client library downstream) only need to implement this trait.
#[async_trait::async_trait]
pub trait HttpTransport: Send + Sync {
    async fn get(&self, url: &str, headers: &[(&str, &str)], conditional: ConditionalRequest) -> Result<HttpResponse, TransportError>;
    async fn post_json(&self, url: &str, headers: &[(&str, &str)], body: Bytes) -> Result<HttpResponse, TransportError>;
}

#[async_trait::async_trait]
impl<T: HttpTransport> HttpTransport for Arc<T> {
    async fn get(&self, url: &str, headers: &[(&str, &str)], conditional: ConditionalRequest) -> Result<HttpResponse, TransportError> {
        self.as_ref().get(url, headers, conditional).await
    }

    async fn post_json(&self, url: &str, headers: &[(&str, &str)], body: Bytes) -> Result<HttpResponse, TransportError> {
        self.as_ref().post_json(url, headers, body).await
    }
}

/// `hyper` + `hyper-rustls`-backed [`HttpTransport`], continuing the
/// teacher's HTTP stack (it already depends on both for
/// `eventsource-client`) rather than introducing a second client crate
/// for the non-streaming calls.
pub struct HyperTransport {
    client: hyper::Client<hyper_rustls::HttpsConnector<hyper::client::HttpConnector>>,
}

impl HyperTransport {
    pub fn new() -> Self {
        let https = hyper_rustls::HttpsConnector::with_native_roots();
        Self {
            client: hyper::Client::builder().build(https),
        }
    }
}

impl Default for HyperTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl HttpTransport for HyperTransport {
    async fn get(&self, url: &str, headers: &[(&str, &str)], conditional: ConditionalRequest) -> Result<HttpResponse, TransportError> {
        let mut builder = hyper::Request::builder().method(hyper::Method::GET).uri(url);
        for (k, v) in headers {
            builder = builder.header(*k, *v);
        }
        if let Some(etag) = conditional.if_none_match {
            builder = builder.header(http::header::IF_NONE_MATCH, etag);
        }
        if let Some(lm) = conditional.if_modified_since {
            builder = builder.header(http::header::IF_MODIFIED_SINCE, lm);
        }
        let req = builder
            .body(hyper::Body::empty())
            .map_err(|e| TransportError::Request(e.to_string()))?;
        self.send(req).await
    }

    async fn post_json(&self, url: &str, headers: &[(&str, &str)], body: Bytes) -> Result<HttpResponse, TransportError> {
        let mut builder = hyper::Request::builder().method(hyper::Method::POST).uri(url);
        for (k, v) in headers {
            builder = builder.header(*k, *v);
        }
        builder = builder.header(http::header::CONTENT_TYPE, "application/json");
        let req = builder
            .body(hyper::Body::from(body))
            .map_err(|e| TransportError::Request(e.to_string()))?;
        self.send(req).await
    }
}

impl HyperTransport {
    async fn send(&self, req: hyper::Request<hyper::Body>) -> Result<HttpResponse, TransportError> {
        let resp = self
            .client
            .request(req)
            .await
            .map_err(|e| TransportError::Request(e.to_string()))?;
        let status = resp.status();
        let headers = resp
            .headers()
            .iter()
            .map(|(k, v)| (k.as_str().to_lowercase(), v.to_str().unwrap_or_default().to_string()))
            .collect();
        let body = hyper::body::to_bytes(resp.into_body())
            .await
            .map_err(|e| TransportError::Request(e.to_string()))?;
        Ok(HttpResponse { status, headers, body })
    }
}

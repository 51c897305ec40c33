//! Shared indirect-fetch helper, spec.md §4.2/§6: used by the polling
//! strategy for its periodic full fetch, and by the streaming strategy to
//! resolve `indirect/put`/`indirect/patch` events into concrete data.

use crate::http::{is_unrecoverable, ConditionalRequest, HttpResponse, HttpTransport, TransportError};
use crate::message::{self, kind_and_key, Message, MessageParseError};
use crate::store::Snapshot;
use std::path::PathBuf;

const ALL_PATH: &str = "/sdk/latest-all";

#[derive(Debug, thiserror::Error)]
pub enum RequestorError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error(transparent)]
    Parse(#[from] MessageParseError),
    #[error("request returned an unrecoverable status {0}")]
    Unrecoverable(http::StatusCode),
}

impl RequestorError {
    /// Whether the owning source should stop retrying entirely, rather
    /// than reconnecting with backoff (spec.md §6).
    pub fn is_unrecoverable(&self) -> bool {
        matches!(self, RequestorError::Unrecoverable(_))
    }
}

fn check_status(resp: HttpResponse) -> Result<HttpResponse, RequestorError> {
    if is_unrecoverable(resp.status) {
        Err(RequestorError::Unrecoverable(resp.status))
    } else {
        Ok(resp)
    }
}

pub struct Requestor<T> {
    transport: T,
    base_url: String,
    sdk_key: String,
}

impl<T: HttpTransport> Requestor<T> {
    pub fn new(transport: T, base_url: String, sdk_key: String) -> Self {
        Self {
            transport,
            base_url,
            sdk_key,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }

    fn auth_header(&self) -> [(&str, &str); 1] {
        [("Authorization", self.sdk_key.as_str())]
    }

    /// Unconditional full fetch, used to resolve `indirect/put`.
    pub async fn fetch_all(&self) -> Result<Snapshot, RequestorError> {
        let resp = self
            .transport
            .get(&self.url(ALL_PATH), &self.auth_header(), ConditionalRequest::default())
            .await?;
        let resp = check_status(resp)?;
        Ok(message::parse_full_snapshot(&resp.body)?)
    }

    /// Conditional full fetch for the polling strategy. `Ok(None)` means
    /// the server returned 304 and nothing changed, so the previous
    /// snapshot (and etag) should be kept.
    pub async fn poll_all(
        &self,
        etag: Option<&str>,
    ) -> Result<Option<(Snapshot, Option<String>)>, RequestorError> {
        let conditional = ConditionalRequest {
            if_none_match: etag.map(str::to_string),
            if_modified_since: None,
        };
        let resp = self
            .transport
            .get(&self.url(ALL_PATH), &self.auth_header(), conditional)
            .await?;
        if resp.status == http::StatusCode::NOT_MODIFIED {
            return Ok(None);
        }
        let resp = check_status(resp)?;
        let next_etag = resp.etag().map(str::to_string);
        let snapshot = message::parse_full_snapshot(&resp.body)?;
        Ok(Some((snapshot, next_etag)))
    }

    /// Fetch a single item, used to resolve `indirect/patch`.
    pub async fn fetch_one(&self, path: &PathBuf) -> Result<Message, RequestorError> {
        let (kind, key) = kind_and_key(path)?;
        let segment_path = format!("/sdk/latest-{}/{}", kind.namespace, key);
        let resp = self
            .transport
            .get(&self.url(&segment_path), &self.auth_header(), ConditionalRequest::default())
            .await?;
        let resp = check_status(resp)?;
        Ok(message::parse_indirect_patch_body(path, &resp.body)?)
    }
}

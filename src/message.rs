//! Parses streaming/polling payloads into store-ready [`Message`]s,
//! spec.md §4.2 / §6.
//!
//! `indirect/put` and `indirect/patch` carry no body — they tell the
//! caller to go fetch the data itself — so they're resolved one level up,
//! in [`streaming`](crate::source::streaming), which has the HTTP
//! transport needed to do that. This module only ever sees bodies it can
//! parse on its own.

use crate::model::Kind;
use crate::store::{Item, Snapshot};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum MessageParseError {
    #[error("failed to parse event payload: {0}")]
    ParsePayload(#[from] serde_json::Error),

    #[error("missing the data field")]
    MissingData,

    #[error("update path has no recognizable kind")]
    UnknownKind,

    #[error("update path is missing a key segment")]
    MissingKey,

    #[error("item is missing its version field")]
    MissingVersion,
}

/// A transport-agnostic, store-ready update. Produced either directly by
/// [`parse_put`]/[`parse_patch`]/[`parse_delete`], or indirectly by the
/// streaming source after it resolves an `indirect/*` event via a GET.
#[derive(Debug, Clone)]
pub enum Message {
    Put(Snapshot),
    Patch(Kind, String, Item),
    Delete(Kind, String, u64),
    /// `indirect/put`: the streaming source must GET `/sdk/latest-all`
    /// and resolve this into a [`Message::Put`] before applying it.
    IndirectPut,
    /// `indirect/patch`: the streaming source must GET the single item
    /// at this path and resolve this into a [`Message::Patch`].
    IndirectPatch(PathBuf),
    Unknown,
}

/// Raw shape of a `patch`/`delete` event body (spec.md §6): a path like
/// `/flags/my-flag`, the item body (patch only) and, for `delete`, the
/// tombstone version.
#[derive(Debug, Deserialize)]
struct PathPayload {
    path: PathBuf,
    #[serde(default)]
    data: Option<serde_json::Value>,
    #[serde(default)]
    version: Option<u64>,
}

pub(crate) fn kind_and_key(path: &PathBuf) -> Result<(Kind, String), MessageParseError> {
    let mut segments = path
        .components()
        .filter_map(|c| c.as_os_str().to_str())
        .filter(|s| !s.is_empty());
    let kind_segment = segments.next().ok_or(MessageParseError::UnknownKind)?;
    let kind = Kind::from_path_segment(kind_segment).ok_or(MessageParseError::UnknownKind)?;
    let key = segments.next().ok_or(MessageParseError::MissingKey)?;
    Ok((kind, key.to_string()))
}

/// Parse a `put` event body: `{"data": {"flags": {...}, "segments": {...}}}`.
pub fn parse_put(raw: &[u8]) -> Result<Message, MessageParseError> {
    #[derive(Deserialize)]
    struct PutPayload {
        data: PutData,
    }
    #[derive(Deserialize)]
    struct PutData {
        #[serde(default)]
        flags: HashMap<String, serde_json::Value>,
        #[serde(default)]
        segments: HashMap<String, serde_json::Value>,
    }

    let payload: PutPayload = serde_json::from_slice(raw)?;
    let mut snapshot: Snapshot = HashMap::new();
    snapshot.insert(Kind::FEATURES, items_from_values(payload.data.flags)?);
    snapshot.insert(Kind::SEGMENTS, items_from_values(payload.data.segments)?);
    Ok(Message::Put(snapshot))
}

/// Parse an `indirect/put` GET response (`/sdk/latest-all`): same body
/// shape as a streaming `put`, just fetched over HTTP instead of SSE.
pub fn parse_full_snapshot(raw: &[u8]) -> Result<Snapshot, MessageParseError> {
    match parse_put(raw)? {
        Message::Put(snapshot) => Ok(snapshot),
        _ => unreachable!("parse_put always returns Message::Put"),
    }
}

fn items_from_values(
    values: HashMap<String, serde_json::Value>,
) -> Result<HashMap<String, Item>, MessageParseError> {
    values
        .into_iter()
        .map(|(key, value)| {
            let version = value
                .get("version")
                .and_then(|v| v.as_u64())
                .ok_or(MessageParseError::MissingVersion)?;
            Ok((key.clone(), Item::new(key, version, value)))
        })
        .collect()
}

/// Parse a `patch` event body: the full item at `path`.
pub fn parse_patch(raw: &[u8]) -> Result<Message, MessageParseError> {
    let payload: PathPayload = serde_json::from_slice(raw)?;
    let (kind, key) = kind_and_key(&payload.path)?;
    let data = payload.data.ok_or(MessageParseError::MissingData)?;
    let version = data
        .get("version")
        .and_then(|v| v.as_u64())
        .ok_or(MessageParseError::MissingVersion)?;
    Ok(Message::Patch(kind, key.clone(), Item::new(key, version, data)))
}

/// Parse an `indirect/patch` GET response (`/sdk/latest-flags/<key>` or
/// `/sdk/latest-segments/<key>`): the item body fetched from `path`.
pub fn parse_indirect_patch_body(
    path: &PathBuf,
    raw: &[u8],
) -> Result<Message, MessageParseError> {
    let (kind, key) = kind_and_key(path)?;
    let data: serde_json::Value = serde_json::from_slice(raw)?;
    let version = data
        .get("version")
        .and_then(|v| v.as_u64())
        .ok_or(MessageParseError::MissingVersion)?;
    Ok(Message::Patch(kind, key.clone(), Item::new(key, version, data)))
}

/// Parse a `delete` event body: `{"path": "...", "version": n}`, no data.
pub fn parse_delete(raw: &[u8]) -> Result<Message, MessageParseError> {
    let payload: PathPayload = serde_json::from_slice(raw)?;
    let (kind, key) = kind_and_key(&payload.path)?;
    let version = payload.version.ok_or(MessageParseError::MissingVersion)?;
    Ok(Message::Delete(kind, key, version))
}

/// The raw path carried by an `indirect/patch` event (its only payload).
pub fn parse_indirect_patch_path(raw: &[u8]) -> Result<PathBuf, MessageParseError> {
    #[derive(Deserialize)]
    struct IndirectPatchPayload {
        path: PathBuf,
    }
    let payload: IndirectPatchPayload = serde_json::from_slice(raw)?;
    Ok(payload.path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_put_into_both_kinds() {
        let raw = br#"{"data":{"flags":{"f1":{"key":"f1","version":3}},"segments":{"s1":{"key":"s1","version":1}}}}"#;
        let msg = parse_put(raw).unwrap();
        match msg {
            Message::Put(snapshot) => {
                assert_eq!(snapshot[&Kind::FEATURES]["f1"].version, 3);
                assert_eq!(snapshot[&Kind::SEGMENTS]["s1"].version, 1);
            }
            _ => panic!("expected Put"),
        }
    }

    #[test]
    fn parses_patch_path_into_kind_and_key() {
        let raw = br#"{"path":"/flags/my-flag","data":{"key":"my-flag","version":7}}"#;
        let msg = parse_patch(raw).unwrap();
        match msg {
            Message::Patch(kind, key, item) => {
                assert_eq!(kind, Kind::FEATURES);
                assert_eq!(key, "my-flag");
                assert_eq!(item.version, 7);
            }
            _ => panic!("expected Patch"),
        }
    }

    #[test]
    fn parses_delete_without_a_data_field() {
        let raw = br#"{"path":"/segments/my-seg","version":4}"#;
        let msg = parse_delete(raw).unwrap();
        match msg {
            Message::Delete(kind, key, version) => {
                assert_eq!(kind, Kind::SEGMENTS);
                assert_eq!(key, "my-seg");
                assert_eq!(version, 4);
            }
            _ => panic!("expected Delete"),
        }
    }

    #[test]
    fn rejects_path_with_unknown_kind() {
        let raw = br#"{"path":"/unknown/x","version":1}"#;
        assert!(matches!(
            parse_delete(raw),
            Err(MessageParseError::UnknownKind)
        ));
    }
}

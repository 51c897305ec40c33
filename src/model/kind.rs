use std::fmt;

/// Describes a namespace of versioned data kept in a [`Store`](crate::store::FeatureStore).
///
/// Flags and segments are otherwise handled identically by the store: it
/// only ever looks at key, version and the deleted bit. Branching on this
/// descriptor instead of on a `Flag`/`Segment` type distinction keeps the
/// store, the caching wrapper and the data source polymorphic over both
/// kinds without a trait object per item.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Kind {
    /// Name used as the streaming/polling path segment and the store's
    /// inner-namespace key (e.g. `"features"`, `"segments"`).
    pub namespace: &'static str,
}

impl Kind {
    pub const FEATURES: Kind = Kind {
        namespace: "flags",
    };
    pub const SEGMENTS: Kind = Kind {
        namespace: "segments",
    };

    pub const ALL: [Kind; 2] = [Kind::FEATURES, Kind::SEGMENTS];

    /// Parse a streaming/polling path's leading segment (e.g. `"flags"`
    /// from `/flags/my-flag`) back into a `Kind`.
    pub fn from_path_segment(segment: &str) -> Option<Kind> {
        Kind::ALL.iter().copied().find(|k| k.namespace == segment)
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.namespace)
    }
}

/// Common shape of every item a [`Store`](crate::store::FeatureStore) holds,
/// regardless of [`Kind`].
pub trait VersionedData: Clone {
    fn key(&self) -> &str;
    fn version(&self) -> u64;
    fn deleted(&self) -> bool;

    /// Build a tombstone for this type at the given key/version. Used by
    /// `delete` and by the caching wrapper when synthesizing a deletion.
    fn tombstone(key: &str, version: u64) -> Self;
}

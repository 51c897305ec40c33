//! Stable-hash bucketing, spec.md §4.1.
//!
//! `sha1(key + "." + salt + "." + idHash)`, truncated to the first 15 hex
//! digits and scaled into `[0, 1)`. Same approach as the teacher's
//! `Evaluation::bucket`, generalized to take an explicit `bucket_by`
//! attribute and `secondary` suffix instead of hardcoding `user.key`.

use crate::model::User;
use hex::ToHex;
use sha1::{Digest, Sha1};
use std::ops::Div;

const BUCKET_DIVIDER: f64 = 0xFFFFFFFFFFFFFFFu64 as f64;

/// Compute a user's bucket value in `[0, 1)` for a given flag-or-segment
/// key and salt.
///
/// A missing `bucket_by` attribute buckets to `0.0` (spec.md §4.1).
pub fn bucket(key: &str, salt: &str, user: &User, bucket_by: Option<&str>) -> f64 {
    let attr = bucket_by.unwrap_or("key");
    let id_hash = match attr_as_bucketing_string(user, attr) {
        Some(v) => v,
        None => return 0.0,
    };

    let id_hash = match &user.secondary {
        Some(secondary) => format!("{}.{}", id_hash, secondary),
        None => id_hash,
    };

    let hash = Sha1::new()
        .chain(key)
        .chain(".")
        .chain(salt)
        .chain(".")
        .chain(&id_hash)
        .finalize();
    let mut hex: String = hash.encode_hex();
    hex.truncate(15);
    let val = u64::from_str_radix(&hex, 16).unwrap_or(0) as f64;
    val.div(BUCKET_DIVIDER)
}

/// Stringify the attribute value the way LaunchDarkly's bucketing
/// algorithm expects: strings pass through verbatim, integers format
/// without a decimal point, everything else fails to bucket.
fn attr_as_bucketing_string(user: &User, attr: &str) -> Option<String> {
    let value = user.attribute(attr)?;
    if let Some(s) = value.as_str() {
        return Some(s.to_string());
    }
    if let Some(i) = value.as_i64() {
        return Some(i.to_string());
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bucket_is_deterministic() {
        let user = User::new("userA");
        let a = bucket("k", "s", &user, None);
        let b = bucket("k", "s", &user, None);
        assert_eq!(a, b);
        assert!(a >= 0.0 && a < 1.0);
    }

    #[test]
    fn missing_bucket_by_attribute_buckets_to_zero() {
        let user = User::new("userA");
        assert_eq!(bucket("k", "s", &user, Some("missingAttr")), 0.0);
    }

    #[test]
    fn different_users_usually_differ() {
        let a = bucket("k", "s", &User::new("userA"), None);
        let b = bucket("k", "s", &User::new("userB"), None);
        assert_ne!(a, b);
    }
}

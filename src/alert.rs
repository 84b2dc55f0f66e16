//! Alert identity and the merge capability.
//!
//! The store only relies on [`Mergeable`]: a stable fingerprint, an activity
//! interval `[starts_at, ends_at)`, and a way to combine two alerts that share
//! a fingerprint. [`Alert`] is the concrete label-based alert shipped with the
//! crate.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::OnceLock;

use blake3::Hasher;
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

const LABEL_SEPARATOR: u8 = 0xff;

static LABEL_NAME_RE: OnceLock<Regex> = OnceLock::new();

fn label_name_re() -> &'static Regex {
    LABEL_NAME_RE.get_or_init(|| {
        Regex::new(r"^[a-zA-Z_][a-zA-Z0-9_]*$").expect("label name pattern is valid")
    })
}

/// Stable identity of an alert, derived from its label set.
///
/// # Examples
///
/// ```
/// use alertmem::Fingerprint;
///
/// let fp = Fingerprint::from_u64(255);
/// assert_eq!(fp.to_string(), "00000000000000ff");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(u64);

impl Fingerprint {
    /// Wraps a raw fingerprint value.
    #[must_use]
    pub const fn from_u64(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the raw value.
    #[must_use]
    pub const fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

impl From<u64> for Fingerprint {
    fn from(raw: u64) -> Self {
        Self(raw)
    }
}

/// Capability the store needs from the alerts it holds.
///
/// Implementations must keep `fingerprint` stable for the lifetime of the
/// value; the store uses it as the map key.
pub trait Mergeable: Send + Sync {
    /// Identity key.
    fn fingerprint(&self) -> Fingerprint;

    /// Start of the activity interval (inclusive).
    fn starts_at(&self) -> DateTime<Utc>;

    /// End of the activity interval (exclusive).
    fn ends_at(&self) -> DateTime<Utc>;

    /// Combines `self` (the stored alert) with `other` (the incoming one).
    #[must_use]
    fn merge(&self, other: &Self) -> Self;
}

/// An ordered set of label name/value pairs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LabelSet(BTreeMap<String, String>);

impl LabelSet {
    /// Creates an empty label set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a label, returning the previous value if any.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.0.insert(name.into(), value.into())
    }

    /// Builder-style variant of [`LabelSet::insert`].
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(name, value);
        self
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Computes the fingerprint of this label set.
    ///
    /// Labels are hashed in name order, so insertion order never matters.
    #[must_use]
    pub fn fingerprint(&self) -> Fingerprint {
        let mut h = Hasher::new();
        for (name, value) in &self.0 {
            h.update(name.as_bytes());
            h.update(&[LABEL_SEPARATOR]);
            h.update(value.as_bytes());
            h.update(&[LABEL_SEPARATOR]);
        }
        let hash = h.finalize();

        let mut raw = [0u8; 8];
        raw.copy_from_slice(&hash.as_bytes()[..8]);
        Fingerprint(u64::from_le_bytes(raw))
    }

    /// Checks that the set is non-empty, names are valid and values non-empty.
    ///
    /// # Errors
    ///
    /// Returns the first [`ValidationError`] encountered.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.0.is_empty() {
            return Err(ValidationError::EmptyLabelSet);
        }
        for (name, value) in &self.0 {
            if !label_name_re().is_match(name) {
                return Err(ValidationError::InvalidLabelName { name: name.clone() });
            }
            if value.is_empty() {
                return Err(ValidationError::EmptyLabelValue { name: name.clone() });
            }
        }
        Ok(())
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for LabelSet {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

/// A label-identified alert with an activity interval.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alert {
    /// Identifying labels; the fingerprint is derived from these.
    pub labels: LabelSet,

    /// Free-form, non-identifying information.
    #[serde(default)]
    pub annotations: BTreeMap<String, String>,

    pub starts_at: DateTime<Utc>,

    pub ends_at: DateTime<Utc>,

    /// Link back to the entity that produced the alert.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub generator_url: String,

    /// When this version of the alert was last updated.
    pub updated_at: DateTime<Utc>,

    /// True if `ends_at` was filled in from a resolve timeout rather than
    /// reported explicitly.
    #[serde(default)]
    pub timeout: bool,
}

impl Alert {
    /// Creates an alert updated now.
    #[must_use]
    pub fn new(labels: LabelSet, starts_at: DateTime<Utc>, ends_at: DateTime<Utc>) -> Self {
        Self {
            labels,
            annotations: BTreeMap::new(),
            starts_at,
            ends_at,
            generator_url: String::new(),
            updated_at: Utc::now(),
            timeout: false,
        }
    }

    #[must_use]
    pub fn with_annotation(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.annotations.insert(name.into(), value.into());
        self
    }

    #[must_use]
    pub fn with_generator_url(mut self, url: impl Into<String>) -> Self {
        self.generator_url = url.into();
        self
    }

    #[must_use]
    pub fn with_updated_at(mut self, updated_at: DateTime<Utc>) -> Self {
        self.updated_at = updated_at;
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: bool) -> Self {
        self.timeout = timeout;
        self
    }

    /// Display name of the alert (the `alertname` label), if any.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.labels.get("alertname")
    }

    /// Returns true if the alert has ended at `ts`.
    #[must_use]
    pub fn resolved_at(&self, ts: DateTime<Utc>) -> bool {
        self.ends_at <= ts
    }

    /// Returns true if the alert has ended by now.
    #[must_use]
    pub fn resolved(&self) -> bool {
        self.resolved_at(Utc::now())
    }

    /// Validates labels and the activity interval.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] for invalid labels or an interval that
    /// ends before it starts.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.labels.validate()?;
        if self.ends_at < self.starts_at {
            return Err(ValidationError::EndBeforeStart {
                starts_at: self.starts_at,
                ends_at: self.ends_at,
            });
        }
        Ok(())
    }
}

impl Mergeable for Alert {
    fn fingerprint(&self) -> Fingerprint {
        self.labels.fingerprint()
    }

    fn starts_at(&self) -> DateTime<Utc> {
        self.starts_at
    }

    fn ends_at(&self) -> DateTime<Utc> {
        self.ends_at
    }

    /// The more recently updated alert provides the payload. The earliest
    /// start is kept. For the end: if the newer alert is resolved, a later
    /// resolution from the older one wins only if the older is resolved too;
    /// otherwise a later explicit (non-timeout) end from the older one wins.
    fn merge(&self, other: &Self) -> Self {
        if other.updated_at < self.updated_at {
            return other.merge(self);
        }

        let now = Utc::now();
        let mut res = other.clone();

        if self.starts_at < other.starts_at {
            res.starts_at = self.starts_at;
        }

        if other.resolved_at(now) {
            if self.resolved_at(now) && self.ends_at > other.ends_at {
                res.ends_at = self.ends_at;
            }
        } else if self.ends_at > other.ends_at && !self.timeout {
            res.ends_at = self.ends_at;
        }

        res
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn labels() -> LabelSet {
        LabelSet::new().with("alertname", "HighLatency").with("job", "api")
    }

    #[test]
    fn test_fingerprint_ignores_insertion_order() {
        let a = LabelSet::new().with("a", "1").with("b", "2");
        let b: LabelSet = [("b", "2"), ("a", "1")].into_iter().collect();
        assert_eq!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn test_fingerprint_distinguishes_boundaries() {
        let a = LabelSet::new().with("ab", "c");
        let b = LabelSet::new().with("a", "bc");
        assert_ne!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn test_label_validation() {
        assert!(matches!(LabelSet::new().validate(), Err(ValidationError::EmptyLabelSet)));
        assert!(matches!(
            LabelSet::new().with("1bad", "x").validate(),
            Err(ValidationError::InvalidLabelName { .. })
        ));
        assert!(matches!(
            LabelSet::new().with("job", "").validate(),
            Err(ValidationError::EmptyLabelValue { .. })
        ));
        assert!(labels().validate().is_ok());
    }

    #[test]
    fn test_alert_end_before_start_rejected() {
        let now = Utc::now();
        let alert = Alert::new(labels(), now, now - Duration::minutes(1));
        assert!(matches!(alert.validate(), Err(ValidationError::EndBeforeStart { .. })));
    }

    #[test]
    fn test_merge_keeps_earliest_start() {
        let t0 = Utc::now();
        let old = Alert::new(labels(), t0, t0 + Duration::hours(1)).with_updated_at(t0);
        let new = Alert::new(labels(), t0 + Duration::minutes(10), t0 + Duration::minutes(30))
            .with_updated_at(t0 + Duration::seconds(1));

        let merged = old.merge(&new);
        assert_eq!(merged.starts_at, t0);
        // Old end is later and explicit, so it wins over the newer active end.
        assert_eq!(merged.ends_at, t0 + Duration::hours(1));
    }

    #[test]
    fn test_merge_timeout_end_does_not_win() {
        let t0 = Utc::now();
        let old = Alert::new(labels(), t0, t0 + Duration::hours(1))
            .with_updated_at(t0)
            .with_timeout(true);
        let new = Alert::new(labels(), t0, t0 + Duration::minutes(30))
            .with_updated_at(t0 + Duration::seconds(1));

        let merged = old.merge(&new);
        assert_eq!(merged.ends_at, t0 + Duration::minutes(30));
    }

    #[test]
    fn test_merge_orders_by_updated_at() {
        let t0 = Utc::now();
        let newer = Alert::new(labels(), t0, t0 + Duration::hours(1))
            .with_updated_at(t0 + Duration::seconds(5))
            .with_annotation("summary", "newer");
        let older = Alert::new(labels(), t0, t0 + Duration::hours(1))
            .with_updated_at(t0)
            .with_annotation("summary", "older");

        let merged = newer.merge(&older);
        assert_eq!(merged.annotations.get("summary").map(String::as_str), Some("newer"));
    }

    #[test]
    fn test_merge_resolved_keeps_latest_resolution() {
        let t0 = Utc::now() - Duration::hours(2);
        let old = Alert::new(labels(), t0, t0 + Duration::minutes(50)).with_updated_at(t0);
        let new = Alert::new(labels(), t0, t0 + Duration::minutes(40))
            .with_updated_at(t0 + Duration::seconds(1));

        let merged = old.merge(&new);
        assert!(merged.resolved());
        assert_eq!(merged.ends_at, t0 + Duration::minutes(50));
    }

    #[test]
    fn test_alert_json_shape() {
        let t0 = Utc::now();
        let alert = Alert::new(labels(), t0, t0 + Duration::hours(1));
        let json = serde_json::to_value(&alert).unwrap();
        assert_eq!(json["labels"]["alertname"], "HighLatency");
        assert!(json.get("generator_url").is_none());
        assert_eq!(alert.name(), Some("HighLatency"));
    }
}

//! Identifiers for replay bins and their entries.

use core::str::FromStr;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::CoreError;

/// Logical queue of pending replay entries, one per deployed handler.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BinName(String);

impl BinName {
    pub fn new(name: impl Into<String>) -> Result<Self, CoreError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(CoreError::validation("bin name must not be empty"));
        }
        Ok(Self(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Bin used when a deployment does not name its own.
pub const DEFAULT_BIN: &str = "default";

impl Default for BinName {
    fn default() -> Self {
        Self(DEFAULT_BIN.to_string())
    }
}

impl core::fmt::Display for BinName {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for BinName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl FromStr for BinName {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

const REPLAY_ID_PREFIX: &str = "replay::";

/// Fixed-width so that lexicographic order equals chronological order.
const REPLAY_ID_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S:%6f";

/// Sortable identifier of a replay entry within its bin.
///
/// Layout: `replay::<utc timestamp>_<uuid v4>`. Ordering is plain string
/// ordering, which is chronological for any two ids.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ReplayId(String);

impl ReplayId {
    /// Generate an id stamped with the current time.
    pub fn new() -> Self {
        Self::at(Utc::now())
    }

    /// Generate an id for a given instant with a random suffix.
    pub fn at(time: DateTime<Utc>) -> Self {
        Self::with_suffix(time, Uuid::new_v4())
    }

    /// Build an id from explicit parts. Prefer this in tests for determinism.
    pub fn with_suffix(time: DateTime<Utc>, suffix: Uuid) -> Self {
        Self(format!(
            "{REPLAY_ID_PREFIX}{}_{}",
            time.format(REPLAY_ID_TIME_FORMAT),
            suffix
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Instant encoded in the id.
    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        let (stamp, _) = split_replay_id(&self.0)?;
        NaiveDateTime::parse_from_str(stamp, REPLAY_ID_TIME_FORMAT)
            .ok()
            .map(|naive| naive.and_utc())
    }
}

impl Default for ReplayId {
    fn default() -> Self {
        Self::new()
    }
}

fn split_replay_id(raw: &str) -> Option<(&str, &str)> {
    let rest = raw.strip_prefix(REPLAY_ID_PREFIX)?;
    rest.rsplit_once('_')
}

impl core::fmt::Display for ReplayId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ReplayId {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (stamp, suffix) = split_replay_id(s)
            .ok_or_else(|| CoreError::invalid_id(format!("ReplayId: malformed `{s}`")))?;
        NaiveDateTime::parse_from_str(stamp, REPLAY_ID_TIME_FORMAT)
            .map_err(|e| CoreError::invalid_id(format!("ReplayId: {e}")))?;
        Uuid::from_str(suffix).map_err(|e| CoreError::invalid_id(format!("ReplayId: {e}")))?;
        Ok(Self(s.to_string()))
    }
}

impl TryFrom<String> for ReplayId {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ReplayId> for String {
    fn from(value: ReplayId) -> Self {
        value.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn bin_name_rejects_blank() {
        assert!(BinName::new("  ").is_err());
        assert_eq!(BinName::new("orders").unwrap().as_str(), "orders");
        assert_eq!(BinName::default().as_str(), DEFAULT_BIN);
    }

    #[test]
    fn replay_id_layout() {
        let time = Utc.with_ymd_and_hms(2024, 3, 9, 7, 5, 1).unwrap();
        let id = ReplayId::with_suffix(time, Uuid::nil());
        assert_eq!(
            id.as_str(),
            "replay::2024-03-09T07:05:01:000000_00000000-0000-0000-0000-000000000000"
        );
        assert_eq!(id.timestamp(), Some(time));
    }

    #[test]
    fn replay_ids_sort_chronologically() {
        let earlier = Utc.with_ymd_and_hms(2024, 1, 9, 23, 59, 59).unwrap();
        let later = Utc.with_ymd_and_hms(2024, 1, 10, 0, 0, 0).unwrap();

        // Suffixes chosen so that suffix ordering alone would disagree.
        let a = ReplayId::with_suffix(earlier, Uuid::from_u128(u128::MAX));
        let b = ReplayId::with_suffix(later, Uuid::nil());
        assert!(a < b);
    }

    #[test]
    fn replay_id_parse_round_trip() {
        let id = ReplayId::new();
        let parsed: ReplayId = id.as_str().parse().unwrap();
        assert_eq!(parsed, id);
    }

    #[test]
    fn replay_id_rejects_garbage() {
        assert!("nope".parse::<ReplayId>().is_err());
        assert!("replay::yesterday_abc".parse::<ReplayId>().is_err());
        assert!(
            "replay::2024-03-09T07:05:01:000000_not-a-uuid"
                .parse::<ReplayId>()
                .is_err()
        );
    }

    #[test]
    fn replay_id_serde_is_a_plain_string() {
        let id = ReplayId::new();
        let json = serde_json::to_value(&id).unwrap();
        assert_eq!(json, serde_json::Value::String(id.to_string()));
        let back: ReplayId = serde_json::from_value(json).unwrap();
        assert_eq!(back, id);
    }
}

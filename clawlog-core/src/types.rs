//! Persisted commit-tracking types.
//!
//! On disk (pretty-printed JSON):
//!
//! ```json
//! {
//!   "version": 1,
//!   "projects": {
//!     "/home/dev/api": {
//!       "last_commit_hash": "3f9c1e…",
//!       "last_run_at": "2024-05-01T14:30:00Z"
//!     }
//!   }
//! }
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Current schema tag written to new state files.
pub const STATE_VERSION: u32 = 1;

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

/// Stable identifier of a tracked repository (its canonical top-level path).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RepoKey(pub String);

impl RepoKey {
    /// Key for an already-canonicalized repository path.
    pub fn from_path(path: &Path) -> Self {
        Self(path.to_string_lossy().into_owned())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RepoKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for RepoKey {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for RepoKey {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// Commit hashes waiting to be merged into the state file, keyed by repository.
pub type PendingUpdates = BTreeMap<RepoKey, String>;

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// Tracking record for one repository.
///
/// Reading is lenient: a field of the wrong type reads as `None` instead of
/// failing the whole document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectRecord {
    /// Most recently summarized commit. `None` means never processed.
    #[serde(default, deserialize_with = "lenient::commit_hash")]
    pub last_commit_hash: Option<String>,

    /// When this repository was last summarized successfully.
    #[serde(
        default,
        deserialize_with = "lenient::run_timestamp",
        skip_serializing_if = "Option::is_none"
    )]
    pub last_run_at: Option<DateTime<Utc>>,
}

/// Root of the state file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateStore {
    #[serde(default = "default_version", deserialize_with = "lenient::version")]
    pub version: u32,
    /// Required, and must be an object: anything else is treated as
    /// corrupted. Individual records are read leniently.
    #[serde(deserialize_with = "lenient::projects")]
    pub projects: BTreeMap<RepoKey, ProjectRecord>,
}

fn default_version() -> u32 {
    STATE_VERSION
}

impl Default for StateStore {
    fn default() -> Self {
        Self {
            version: STATE_VERSION,
            projects: BTreeMap::new(),
        }
    }
}

impl StateStore {
    /// Last summarized commit for `key`, if any.
    pub fn last_hash(&self, key: &RepoKey) -> Option<&str> {
        self.projects
            .get(key)
            .and_then(|record| record.last_commit_hash.as_deref())
    }

    /// Overwrite the record for `key` with a freshly processed commit.
    pub fn record(&mut self, key: RepoKey, commit_hash: String, at: DateTime<Utc>) {
        self.projects.insert(
            key,
            ProjectRecord {
                last_commit_hash: Some(commit_hash),
                last_run_at: Some(at),
            },
        );
    }

    /// Remove the record for `key`. Returns whether one existed.
    pub fn forget(&mut self, key: &RepoKey) -> bool {
        self.projects.remove(key).is_some()
    }

    pub fn len(&self) -> usize {
        self.projects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.projects.is_empty()
    }
}

/// Field readers that tolerate hand edits and files from older tools.
///
/// Only a `projects` value that is not an object fails deserialization;
/// everything below it falls back to a default with a warning.
mod lenient {
    use std::collections::BTreeMap;

    use chrono::{DateTime, Local, NaiveDateTime, TimeZone, Utc};
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;

    use super::{ProjectRecord, RepoKey, STATE_VERSION};

    /// Naive layouts written by older tools, read as local time.
    const NAIVE_LAYOUTS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

    pub fn version<'de, D>(deserializer: D) -> Result<u32, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = Value::deserialize(deserializer)?;
        let parsed = match &raw {
            Value::Number(n) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        };
        Ok(parsed.unwrap_or_else(|| {
            tracing::warn!(value = %raw, "unrecognised state version; assuming current");
            STATE_VERSION
        }))
    }

    pub fn projects<'de, D>(deserializer: D) -> Result<BTreeMap<RepoKey, ProjectRecord>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = BTreeMap::<RepoKey, Value>::deserialize(deserializer)?;
        Ok(raw
            .into_iter()
            .map(|(key, value)| {
                let record = ProjectRecord::deserialize(&value).unwrap_or_else(|err| {
                    tracing::warn!(repo = %key, error = %err, "unreadable project record; treating as never processed");
                    ProjectRecord::default()
                });
                (key, record)
            })
            .collect())
    }

    pub fn commit_hash<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(match Value::deserialize(deserializer)? {
            Value::String(hash) => Some(hash),
            Value::Null => None,
            other => {
                tracing::warn!(value = %other, "last_commit_hash is not a string; ignoring it");
                None
            }
        })
    }

    /// RFC 3339, or a naive local timestamp such as
    /// `2024-05-01T23:30:00.123456`.
    pub fn run_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = Value::deserialize(deserializer)?;
        let parsed = match &raw {
            Value::Null => return Ok(None),
            Value::String(text) => parse_run_timestamp(text),
            _ => None,
        };
        if parsed.is_none() {
            tracing::warn!(value = %raw, "unparsable last_run_at; ignoring it");
        }
        Ok(parsed)
    }

    pub(super) fn parse_run_timestamp(text: &str) -> Option<DateTime<Utc>> {
        if let Ok(at) = DateTime::parse_from_rfc3339(text) {
            return Some(at.with_timezone(&Utc));
        }
        NAIVE_LAYOUTS.iter().find_map(|layout| {
            let naive = NaiveDateTime::parse_from_str(text, layout).ok()?;
            Local
                .from_local_datetime(&naive)
                .earliest()
                .map(|local| local.with_timezone(&Utc))
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_store_is_version_one_and_empty() {
        let store = StateStore::default();
        assert_eq!(store.version, 1);
        assert!(store.is_empty());
    }

    #[test]
    fn last_hash_lookup() {
        let mut store = StateStore::default();
        let key = RepoKey::from("/code/api");
        assert_eq!(store.last_hash(&key), None);

        store.record(key.clone(), "abc123".into(), Utc::now());
        assert_eq!(store.last_hash(&key), Some("abc123"));
        assert_eq!(store.last_hash(&RepoKey::from("/code/web")), None);
    }

    #[test]
    fn null_hash_means_never_processed() {
        let store: StateStore = serde_json::from_str(
            r#"{"version":1,"projects":{"/code/api":{"last_commit_hash":null}}}"#,
        )
        .unwrap();
        assert_eq!(store.last_hash(&RepoKey::from("/code/api")), None);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn missing_version_defaults_to_current() {
        let store: StateStore = serde_json::from_str(r#"{"projects":{}}"#).unwrap();
        assert_eq!(store.version, STATE_VERSION);
    }

    #[test]
    fn missing_projects_is_rejected() {
        assert!(serde_json::from_str::<StateStore>(r#"{"version":1}"#).is_err());
        assert!(serde_json::from_str::<StateStore>(r#"{"version":1,"projects":null}"#).is_err());
    }

    #[test]
    fn naive_timestamp_is_accepted() {
        let store: StateStore = serde_json::from_str(
            r#"{"version":1,"projects":{"k":{"last_commit_hash":"h","last_run_at":"2024-05-01T23:30:00.123456"}}}"#,
        )
        .unwrap();
        let record = &store.projects[&RepoKey::from("k")];
        assert!(record.last_run_at.is_some());
    }

    #[test]
    fn mistyped_fields_fall_back_instead_of_failing() {
        let store: StateStore = serde_json::from_str(
            r#"{"version":"1","projects":{
                "a":{"last_commit_hash":"h1","last_run_at":"2024-05-01"},
                "b":{"last_commit_hash":42,"last_run_at":1714600000},
                "c":"junk"
            }}"#,
        )
        .unwrap();
        assert_eq!(store.version, 1);
        assert_eq!(store.last_hash(&RepoKey::from("a")), Some("h1"));
        assert_eq!(store.projects[&RepoKey::from("a")].last_run_at, None);
        assert_eq!(store.last_hash(&RepoKey::from("b")), None);
        assert_eq!(store.projects[&RepoKey::from("c")], ProjectRecord::default());
    }

    #[test]
    fn odd_versions_read_as_current() {
        for doc in [
            r#"{"version":-3,"projects":{}}"#,
            r#"{"version":1.5,"projects":{}}"#,
            r#"{"version":null,"projects":{}}"#,
            r#"{"version":"two","projects":{}}"#,
        ] {
            let store: StateStore = serde_json::from_str(doc).unwrap();
            assert_eq!(store.version, STATE_VERSION, "doc: {doc}");
        }
    }

    #[test]
    fn space_separated_naive_timestamp_is_accepted() {
        assert!(lenient::parse_run_timestamp("2024-05-01 23:30:00").is_some());
        assert!(lenient::parse_run_timestamp("yesterday").is_none());
    }

    #[test]
    fn rfc3339_timestamp_round_trips() {
        let mut store = StateStore::default();
        let at = DateTime::parse_from_rfc3339("2024-05-01T14:30:00Z")
            .unwrap()
            .with_timezone(&Utc);
        store.record(RepoKey::from("k"), "h".into(), at);

        let json = serde_json::to_string_pretty(&store).unwrap();
        let back: StateStore = serde_json::from_str(&json).unwrap();
        assert_eq!(back, store);
    }

    #[test]
    fn forget_reports_presence() {
        let mut store = StateStore::default();
        let key = RepoKey::from("k");
        store.record(key.clone(), "h".into(), Utc::now());
        assert!(store.forget(&key));
        assert!(!store.forget(&key));
    }
}

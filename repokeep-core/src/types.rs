//! Domain types for the repokeep database.
//!
//! Repo entries are kept as raw JSON objects inside [`Database::repos`] so that
//! fields added or dropped by older versions survive a load/save cycle and can
//! be healed by repair. [`RepoEntry`] is the typed view decoded on demand.

use std::collections::BTreeMap;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::StoreError;

/// Sentinel stored in timestamp fields that were never set.
pub const NEVER: &str = "Never";

/// Default shard size for batch updates.
pub const DEFAULT_MAX_REPOS_PER_LIST: usize = 50;

/// Default host resolved by the connectivity check.
pub const DEFAULT_CONNECTION_TEST_HOST: &str = "github.com";

/// Format a timestamp the way every database field stores it.
pub fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Split a clone URL into `(owner, name)`: the second-to-last and last `/`
/// segments. Missing segments come back empty.
pub fn owner_and_name(url: &str) -> (String, String) {
    let mut segments = url.trim().rsplit('/');
    let name = segments.next().unwrap_or_default().to_string();
    let owner = segments.next().unwrap_or_default().to_string();
    (owner, name)
}

// ---------------------------------------------------------------------------
// Repo entry
// ---------------------------------------------------------------------------

/// A single tracked repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RepoEntry {
    pub url: String,
    pub name: String,
    pub owner: String,
    /// Disabled entries are never scheduled for batch updates.
    pub can_update: bool,
    pub is_priority: bool,
    pub update_counter: u64,
    pub import_date: String,
    /// Timestamp of the last fetch that changed something, or [`NEVER`].
    pub last_updated_on: String,
}

impl Default for RepoEntry {
    fn default() -> Self {
        Self {
            url: String::new(),
            name: String::new(),
            owner: String::new(),
            can_update: true,
            is_priority: false,
            update_counter: 0,
            import_date: NEVER.to_string(),
            last_updated_on: NEVER.to_string(),
        }
    }
}

impl RepoEntry {
    /// Fresh entry for a newly imported clone of `url`.
    pub fn imported(url: &str, at: DateTime<Utc>) -> Self {
        let (owner, name) = owner_and_name(url);
        Self {
            url: url.to_string(),
            name,
            owner,
            import_date: timestamp(at),
            ..Self::default()
        }
    }

    /// The canonical field set every stored entry must carry, with defaults.
    pub fn template() -> Map<String, Value> {
        match Self::default().to_raw() {
            Value::Object(map) => map,
            _ => Map::new(),
        }
    }

    /// Decode a stored entry. Missing fields take template defaults.
    pub fn from_raw(key: &str, raw: &Value) -> Result<Self, StoreError> {
        serde_json::from_value(raw.clone()).map_err(|source| StoreError::InvalidEntry {
            key: key.to_string(),
            source,
        })
    }

    pub fn to_raw(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

// ---------------------------------------------------------------------------
// Database
// ---------------------------------------------------------------------------

fn never() -> String {
    NEVER.to_string()
}

fn default_max_repos_per_list() -> usize {
    DEFAULT_MAX_REPOS_PER_LIST
}

fn default_connection_test_host() -> String {
    DEFAULT_CONNECTION_TEST_HOST.to_string()
}

/// Root document persisted at `<root>/database.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Database {
    #[serde(default)]
    pub run_counter: u64,
    #[serde(default = "never")]
    pub last_run: String,
    /// Cumulative wall time of all batch runs, in seconds.
    #[serde(default)]
    pub update_runtime: f64,
    #[serde(default = "default_max_repos_per_list")]
    pub max_repos_per_list: usize,
    /// Upper bound on concurrently running workers; `0` runs every shard at once.
    #[serde(default)]
    pub max_concurrent_workers: usize,
    #[serde(default = "default_connection_test_host")]
    pub connection_test_host: String,
    /// Relative repo path → raw entry object, ordered by key. Saving rewrites
    /// the file in key order whatever order it was loaded in.
    #[serde(default)]
    pub repos: BTreeMap<String, Value>,
}

impl Default for Database {
    fn default() -> Self {
        Self {
            run_counter: 0,
            last_run: never(),
            update_runtime: 0.0,
            max_repos_per_list: DEFAULT_MAX_REPOS_PER_LIST,
            max_concurrent_workers: 0,
            connection_test_host: default_connection_test_host(),
            repos: BTreeMap::new(),
        }
    }
}

impl Database {
    /// Typed view of the entry stored under `key`.
    pub fn entry(&self, key: &str) -> Option<Result<RepoEntry, StoreError>> {
        self.repos.get(key).map(|raw| RepoEntry::from_raw(key, raw))
    }

    /// Insert or replace the entry under `key`.
    pub fn insert_entry(&mut self, key: impl Into<String>, entry: &RepoEntry) {
        self.repos.insert(key.into(), entry.to_raw());
    }

    pub fn remove_entry(&mut self, key: &str) -> bool {
        self.repos.remove(key).is_some()
    }

    /// Keys eligible for a batch update, in ascending key order.
    ///
    /// Entries that fail to decode are skipped with a warning; repair heals them.
    pub fn update_candidates(&self, priority_only: bool) -> Vec<String> {
        let mut keys = Vec::new();
        for (key, raw) in &self.repos {
            match RepoEntry::from_raw(key, raw) {
                Ok(entry) if entry.can_update && (!priority_only || entry.is_priority) => {
                    keys.push(key.clone());
                }
                Ok(_) => {}
                Err(err) => tracing::warn!(key = %key, error = %err, "skipping undecodable entry"),
            }
        }
        keys
    }

    /// Record a successful fetch: bump `updateCounter` and set `lastUpdatedOn`.
    ///
    /// Operates on the raw object so unrelated fields are left untouched.
    /// Returns `false` if `key` is not a tracked object entry.
    pub fn record_update(&mut self, key: &str, updated_on: &str) -> bool {
        let Some(Value::Object(fields)) = self.repos.get_mut(key) else {
            return false;
        };
        let counter = fields
            .get("updateCounter")
            .and_then(Value::as_u64)
            .unwrap_or(0);
        fields.insert("updateCounter".to_string(), Value::from(counter + 1));
        fields.insert(
            "lastUpdatedOn".to_string(),
            Value::String(updated_on.to_string()),
        );
        true
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

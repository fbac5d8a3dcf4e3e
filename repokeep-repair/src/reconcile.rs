//! Presence and schema reconciliation.
//!
//! Order of work:
//!
//! 1. legacy keys holding the absolute clone path are rewritten to the
//!    relative form, so the presence sets below compare like with like;
//! 2. clones on disk without an entry are imported, entries without a clone
//!    are removed when forced or confirmed;
//! 3. every remaining entry is healed to exactly the template field set.
//!
//! Per-repo problems, including unreadable directories under the repos root,
//! are collected in [`RepairReport::errors`]; only store failures abort.

use std::collections::BTreeSet;

use serde_json::Value;

use repokeep_core::{CommandRunner, Confirm, Database, RepoEntry, Store};

use crate::discover::discover_repos;
use crate::error::RepairError;
use crate::import::import_existing;

#[derive(Debug, Clone, Copy, Default)]
pub struct RepairOptions {
    /// Remove entries for vanished clones without asking.
    pub force: bool,
}

/// What a repair run changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RepairReport {
    pub imported: usize,
    pub removed: usize,
    pub rekeyed: usize,
    pub keys_added: usize,
    pub keys_removed: usize,
    /// `(path, message)` for every clone that could not be imported or
    /// directory that could not be read.
    pub errors: Vec<(String, String)>,
}

impl RepairReport {
    pub fn changed_anything(&self) -> bool {
        self.imported + self.removed + self.rekeyed + self.keys_added + self.keys_removed > 0
    }
}

/// Reconcile the database under `store` with the clones on disk.
pub fn repair(
    store: &Store,
    runner: &dyn CommandRunner,
    confirm: &dyn Confirm,
    opts: RepairOptions,
) -> Result<RepairReport, RepairError> {
    if store.run_in_progress() {
        return Err(RepairError::RunInProgress {
            scratch: store.scratch_dir(),
        });
    }

    let mut db = store.load()?;
    let mut report = RepairReport::default();

    report.rekeyed = rekey_absolute(&mut db, store);
    if report.rekeyed > 0 {
        store.save(&db)?;
    }

    let discovery = discover_repos(&store.repos_root());
    report.errors.extend(discovery.errors.iter().cloned());
    let found = &discovery.found;
    let known: BTreeSet<String> = db.repos.keys().cloned().collect();

    for key in found.difference(&known) {
        match import_existing(runner, &store.repo_dir(key)) {
            Ok(entry) => {
                db.insert_entry(key.clone(), &entry);
                store.save(&db)?;
                report.imported += 1;
                tracing::info!(key = %key, url = %entry.url, "imported");
            }
            Err(err) => {
                tracing::warn!(key = %key, error = %err, "cannot import clone");
                if db.remove_entry(key) {
                    store.save(&db)?;
                }
                report.errors.push((key.clone(), err.to_string()));
            }
        }
    }

    for key in known.difference(found) {
        if discovery.is_hidden(key) {
            tracing::warn!(key = %key, "clone location unreadable; keeping entry");
            continue;
        }
        let remove = opts.force
            || confirm.confirm(&format!(
                "Remove {key} from the database? Its clone no longer exists on disk."
            ));
        if !remove {
            tracing::info!(key = %key, "kept entry without clone");
            continue;
        }
        db.remove_entry(key);
        store.save(&db)?;
        report.removed += 1;
        tracing::info!(key = %key, "removed");
    }

    let (added, removed) = heal_schema(&mut db);
    report.keys_added = added;
    report.keys_removed = removed;
    if added + removed > 0 {
        store.save(&db)?;
    }

    tracing::info!(
        imported = report.imported,
        removed = report.removed,
        rekeyed = report.rekeyed,
        keys_added = report.keys_added,
        keys_removed = report.keys_removed,
        errors = report.errors.len(),
        "repair finished"
    );
    Ok(report)
}

/// Rewrite keys that start with the absolute repos root to relative keys.
///
/// When the relative key already exists the legacy duplicate is dropped.
fn rekey_absolute(db: &mut Database, store: &Store) -> usize {
    let prefix = store.repos_root().to_string_lossy().into_owned();
    let legacy: Vec<(String, String)> = db
        .repos
        .keys()
        .filter_map(|key| {
            let rest = key.strip_prefix(prefix.as_str())?;
            if !rest.starts_with(['/', '\\']) {
                return None;
            }
            let new = rest.trim_start_matches(['/', '\\']).replace('\\', "/");
            (!new.is_empty()).then(|| (key.clone(), new))
        })
        .collect();

    for (old, new) in &legacy {
        let Some(raw) = db.repos.remove(old) else {
            continue;
        };
        tracing::info!(from = %old, to = %new, "rekeyed legacy entry");
        db.repos.entry(new.clone()).or_insert(raw);
    }
    legacy.len()
}

/// Bring every entry to exactly the template field set.
///
/// Returns `(fields added, fields removed)`. Non-object entries are replaced
/// by the template wholesale.
fn heal_schema(db: &mut Database) -> (usize, usize) {
    let template = RepoEntry::template();
    let (mut added, mut removed) = (0, 0);

    for (key, raw) in db.repos.iter_mut() {
        let fields = match raw {
            Value::Object(fields) => fields,
            other => {
                tracing::warn!(key = %key, "entry is not an object; resetting to defaults");
                *other = Value::Object(template.clone());
                added += template.len();
                continue;
            }
        };

        let extra: Vec<String> = fields
            .keys()
            .filter(|k| !template.contains_key(k.as_str()))
            .cloned()
            .collect();
        for k in extra {
            fields.remove(&k);
            removed += 1;
            tracing::debug!(key = %key, field = %k, "removed field");
        }
        for (k, default) in &template {
            if !fields.contains_key(k) {
                fields.insert(k.clone(), default.clone());
                added += 1;
                tracing::debug!(key = %key, field = %k, "added field");
            }
        }
    }
    (added, removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn heal_adds_and_removes_fields() {
        let mut db = Database::default();
        db.repos.insert(
            "a/b.git".to_string(),
            json!({ "url": "u", "updateCounter": 3, "legacyFlag": true }),
        );
        let (added, removed) = heal_schema(&mut db);
        assert_eq!(removed, 1);
        assert_eq!(added, RepoEntry::template().len() - 2);

        let healed = db.repos["a/b.git"].as_object().unwrap();
        assert_eq!(healed.len(), RepoEntry::template().len());
        assert_eq!(healed["updateCounter"], json!(3));
        assert!(!healed.contains_key("legacyFlag"));
        assert_eq!(heal_schema(&mut db), (0, 0));
    }

    #[test]
    fn non_object_entries_become_template() {
        let mut db = Database::default();
        db.repos.insert("x/y.git".to_string(), json!("garbage"));
        let (added, removed) = heal_schema(&mut db);
        assert_eq!((added, removed), (RepoEntry::template().len(), 0));
        assert_eq!(db.repos["x/y.git"], Value::Object(RepoEntry::template()));
    }

    #[test]
    fn absolute_keys_become_relative() {
        let store = Store::at("/srv/keep");
        let mut db = Database::default();
        db.repos
            .insert("/srv/keep/repos/a/b.git".to_string(), json!({ "url": "old" }));
        db.repos
            .insert("/srv/keep/repos/c/d.git".to_string(), json!({ "url": "dup" }));
        db.repos.insert("c/d.git".to_string(), json!({ "url": "kept" }));

        assert_eq!(rekey_absolute(&mut db, &store), 2);
        let keys: Vec<&str> = db.repos.keys().map(String::as_str).collect();
        assert_eq!(keys, ["a/b.git", "c/d.git"]);
        assert_eq!(db.repos["a/b.git"]["url"], json!("old"));
        assert_eq!(db.repos["c/d.git"]["url"], json!("kept"));
    }
}

//! Importing clones into the database.

use std::path::Path;

use chrono::Utc;
use ini::Ini;

use repokeep_core::{owner_and_name, CommandRunner, RepoEntry, Store};

use crate::error::{io_err, RepairError};

const ORIGIN_SECTION: &str = "remote origin";

/// `[remote "origin"] url` from the clone's `config` file.
pub fn read_origin_url(repo_dir: &Path) -> Result<String, RepairError> {
    let config = repo_dir.join("config");
    let ini = Ini::load_from_file(&config).map_err(|source| RepairError::Ini {
        config: config.clone(),
        source,
    })?;
    ini.iter()
        .filter(|(section, _)| section.is_some_and(|name| section_key(name) == ORIGIN_SECTION))
        .find_map(|(_, props)| props.get("url"))
        .map(|url| url.trim().to_string())
        .filter(|url| !url.is_empty())
        .ok_or(RepairError::MissingOrigin { config })
}

/// `remote "origin"` and `remote origin` both normalize to `remote origin`.
fn section_key(name: &str) -> String {
    name.split_whitespace()
        .map(|part| part.trim_matches('"'))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Point the clone's fetch refspec at all refs and mark it a safe directory.
///
/// Failures are logged and otherwise ignored; the clone is still usable.
pub fn configure_mirror(runner: &dyn CommandRunner, repo_dir: &Path) {
    let abs = repo_dir.to_string_lossy();
    let steps: [&[&str]; 2] = [
        &["config", "remote.origin.fetch", "+refs/*:refs/*"],
        &["config", "--global", "--add", "safe.directory", abs.as_ref()],
    ];
    for args in steps {
        match runner.run("git", args, repo_dir) {
            Ok(out) if out.success() => {}
            Ok(out) => tracing::warn!(
                path = %repo_dir.display(),
                ?args,
                output = %out.output.trim(),
                "git config failed"
            ),
            Err(err) => tracing::warn!(
                path = %repo_dir.display(),
                ?args,
                error = %err,
                "could not run git config"
            ),
        }
    }
}

/// Build the entry for an existing clone found on disk.
pub(crate) fn import_existing(
    runner: &dyn CommandRunner,
    repo_dir: &Path,
) -> Result<RepoEntry, RepairError> {
    let url = read_origin_url(repo_dir)?;
    let entry = RepoEntry::imported(&url, Utc::now());
    configure_mirror(runner, repo_dir);
    Ok(entry)
}

/// Mirror-clone `url` into `<repos>/<owner>/<name>` and track it.
///
/// The clone directory always ends in `.git` so repair recognizes it.
/// Returns the new database key.
pub fn add_url(
    store: &Store,
    runner: &dyn CommandRunner,
    url: &str,
    priority: bool,
) -> Result<String, RepairError> {
    if store.run_in_progress() {
        return Err(RepairError::RunInProgress {
            scratch: store.scratch_dir(),
        });
    }

    let (owner, name) = owner_and_name(url);
    if owner.is_empty() || name.is_empty() {
        return Err(RepairError::InvalidUrl {
            url: url.to_string(),
        });
    }
    let dir_name = if name.ends_with(".git") {
        name.clone()
    } else {
        format!("{name}.git")
    };
    let key = format!("{owner}/{dir_name}");

    let mut db = store.load()?;
    if db.repos.contains_key(&key) {
        return Err(RepairError::AlreadyTracked { key });
    }

    let dest = store.repo_dir(&key);
    let parent = dest.parent().unwrap_or(store.root());
    std::fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;

    let dest_arg = dest.to_string_lossy();
    tracing::info!(url, path = %dest.display(), "cloning mirror");
    let out = runner
        .run("git", &["clone", "--mirror", url, dest_arg.as_ref()], parent)
        .map_err(|e| io_err(parent, e))?;
    if !out.success() {
        return Err(RepairError::Clone {
            url: url.to_string(),
            output: out.output,
        });
    }
    configure_mirror(runner, &dest);

    let mut entry = RepoEntry::imported(url, Utc::now());
    entry.is_priority = priority;
    db.insert_entry(key.clone(), &entry);
    store.save(&db)?;
    tracing::info!(key = %key, "repository added");
    Ok(key)
}

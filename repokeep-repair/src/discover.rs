//! Find bare clones under the repos root.

use std::collections::BTreeSet;
use std::path::Path;

use walkdir::WalkDir;

/// Result of walking the repos root.
#[derive(Debug, Default)]
pub struct Discovery {
    /// Relative `/`-joined paths of every `*.git` directory.
    pub found: BTreeSet<String>,
    /// `(relative path, message)` for every directory that could not be read.
    pub errors: Vec<(String, String)>,
}

impl Discovery {
    /// Whether `key` lies at or below a directory the walk could not read.
    pub fn is_hidden(&self, key: &str) -> bool {
        self.errors.iter().any(|(path, _)| {
            path.is_empty()
                || key == path
                || key
                    .strip_prefix(path.as_str())
                    .is_some_and(|rest| rest.starts_with('/'))
        })
    }
}

/// Walk `repos_root` for bare clones.
///
/// A `.git` directory is a leaf: its contents are never walked, so nested
/// clones inside a clone are not reported. Unreadable directories are
/// recorded and skipped.
pub fn discover_repos(repos_root: &Path) -> Discovery {
    let mut discovery = Discovery::default();
    if !repos_root.exists() {
        return discovery;
    }

    let mut walker = WalkDir::new(repos_root).min_depth(1).into_iter();
    while let Some(entry) = walker.next() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                let path = err
                    .path()
                    .and_then(|p| relative_key(repos_root, p))
                    .unwrap_or_default();
                tracing::warn!(path = %path, error = %err, "cannot read directory");
                discovery.errors.push((path, err.to_string()));
                continue;
            }
        };
        if !entry.file_type().is_dir() {
            continue;
        }
        let is_clone = entry
            .file_name()
            .to_str()
            .is_some_and(|name| name.ends_with(".git"));
        if !is_clone {
            continue;
        }
        walker.skip_current_dir();
        if let Some(key) = relative_key(repos_root, entry.path()) {
            discovery.found.insert(key);
        }
    }
    discovery
}

/// `a/b.git` for `<repos_root>/a/b.git`.
pub(crate) fn relative_key(repos_root: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(repos_root).ok()?;
    let segments: Vec<&str> = rel
        .components()
        .map(|c| c.as_os_str().to_str())
        .collect::<Option<_>>()?;
    Some(segments.join("/"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn finds_clones_and_skips_their_contents() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        for p in [
            "a/b.git/refs/heads",
            "a/b.git/nested/inner.git",
            "c/d.git",
            "deep/er/e.git",
            "not-a-clone/src",
        ] {
            std::fs::create_dir_all(root.join(p)).unwrap();
        }
        std::fs::write(root.join("stray.git"), "file, not dir").unwrap();

        let discovery = discover_repos(root);
        let found: Vec<&str> = discovery.found.iter().map(String::as_str).collect();
        assert_eq!(found, ["a/b.git", "c/d.git", "deep/er/e.git"]);
        assert!(discovery.errors.is_empty());
    }

    #[test]
    fn missing_root_is_empty() {
        let dir = TempDir::new().unwrap();
        assert!(discover_repos(&dir.path().join("repos")).found.is_empty());
    }

    #[test]
    fn keys_below_unreadable_dirs_are_hidden() {
        let discovery = Discovery {
            found: BTreeSet::new(),
            errors: vec![("locked".to_string(), "denied".to_string())],
        };
        assert!(discovery.is_hidden("locked/x.git"));
        assert!(discovery.is_hidden("locked"));
        assert!(!discovery.is_hidden("lockedout/x.git"));
        assert!(!discovery.is_hidden("a/b.git"));
    }
}

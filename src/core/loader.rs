// src/core/loader.rs

//! Workspace discovery: finds every manifest under a root directory and
//! feeds it into the index.

use crate::constants::MANIFEST_SUFFIX;
use crate::core::index::WorkspaceIndex;
use anyhow::{Context, Result};
use log::debug;
use std::path::Path;
use walkdir::WalkDir;

/// Indexes every `*.tasks.toml` under `root`. Hidden directories are
/// skipped. Returns the number of files indexed.
pub fn load_workspace(root: &Path, index: &WorkspaceIndex) -> Result<usize> {
    let mut count = 0;
    for entry in WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_entry(|e| !is_hidden(e))
    {
        let entry = entry.with_context(|| format!("failed to walk '{}'", root.display()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        if !path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.ends_with(MANIFEST_SUFFIX))
        {
            continue;
        }
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read manifest '{}'", path.display()))?;
        index.update(path, &text);
        count += 1;
    }
    debug!("loaded {} manifest(s) from {}", count, root.display());
    Ok(count)
}

fn is_hidden(entry: &walkdir::DirEntry) -> bool {
    entry.depth() > 0
        && entry
            .file_name()
            .to_str()
            .is_some_and(|n| n.starts_with('.'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_discovers_manifests_recursively() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("ci.tasks.toml"),
            "[tasks.build]\nrun = \"compile\"\n",
        )
        .unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();
        fs::write(
            dir.path().join("sub/app.tasks.toml"),
            "[tasks.pack]\nrun = \"zip\"\n",
        )
        .unwrap();
        fs::write(dir.path().join("README.md"), "not a manifest").unwrap();

        let index = WorkspaceIndex::new();
        let count = load_workspace(dir.path(), &index).unwrap();
        assert_eq!(count, 2);
        let names: Vec<String> = index
            .all_tasks()
            .into_iter()
            .map(|t| t.qualified_name)
            .collect();
        assert_eq!(names, vec!["app::pack".to_string(), "ci::build".to_string()]);
    }

    #[test]
    fn test_hidden_directories_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join(".git")).unwrap();
        fs::write(
            dir.path().join(".git/hook.tasks.toml"),
            "[tasks.x]\nrun = \"y\"\n",
        )
        .unwrap();

        let index = WorkspaceIndex::new();
        assert_eq!(load_workspace(dir.path(), &index).unwrap(), 0);
    }
}

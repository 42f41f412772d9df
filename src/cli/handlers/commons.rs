// src/cli/handlers/commons.rs

// Shared plumbing used by every handler.

use crate::core::index::WorkspaceIndex;
use crate::core::loader;
use crate::models::{Overrides, Value};
use anyhow::{Result, bail};
use std::path::{Path, PathBuf};

/// Loads every manifest under the chosen root into a fresh index.
pub fn load_index(root: Option<&Path>) -> Result<(WorkspaceIndex, PathBuf)> {
    let root = root.map_or_else(|| PathBuf::from("."), Path::to_path_buf);
    let index = WorkspaceIndex::new();
    let count = loader::load_workspace(&root, &index)?;
    if count == 0 {
        bail!(
            "no *.tasks.toml manifests found under '{}'",
            root.display()
        );
    }
    Ok((index, root))
}

/// Parses `--set KEY=VALUE` pairs. Values are typed leniently: `true`/`false`
/// become booleans, numerics become numbers, everything else stays a string.
pub fn parse_overrides(pairs: &[String]) -> Result<Overrides> {
    let mut overrides = Overrides::new();
    for pair in pairs {
        let Some((key, raw)) = pair.split_once('=') else {
            bail!("invalid --set '{}': expected KEY=VALUE", pair);
        };
        let key = key.trim();
        if key.is_empty() {
            bail!("invalid --set '{}': empty key", pair);
        }
        let value = match raw {
            "true" => Value::Bool(true),
            "false" => Value::Bool(false),
            _ => match raw.parse::<f64>() {
                Ok(n) => Value::Number(n),
                Err(_) => Value::String(raw.to_string()),
            },
        };
        overrides.insert(key.to_string(), value);
    }
    Ok(overrides)
}

// src/constants.rs

/// Suffix identifying task manifest files in a workspace.
pub const MANIFEST_SUFFIX: &str = ".tasks.toml";

/// The manifest whose `[vars]` table provides workspace-global bindings.
pub const WORKSPACE_MANIFEST: &str = "workspace.tasks.toml";

/// Sigil prefix distinguishing task references from variables in templates.
pub const TASK_SIGIL: &str = "task::";

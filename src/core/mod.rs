// src/core/mod.rs

pub mod diagnostics;
pub mod engine;
pub mod graph;
pub mod graph_display;
pub mod index;
pub mod loader;
pub mod logctx;
pub mod manifest;
pub mod references;
pub mod resolver;
pub mod scope;
pub mod template;

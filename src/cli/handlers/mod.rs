// src/cli/handlers/mod.rs

pub mod check;
pub mod commons;
pub mod list;
pub mod run;
pub mod tree;

// src/config/mod.rs

//! Configuration loading and validation for pipewatch.
//!
//! Responsibilities:
//! - Define the TOML-backed data model (`model.rs`).
//! - Load a config file from disk (`loader.rs`).
//! - Validate category and server invariants (`validate.rs`).

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{default_config_path, load_and_validate, load_from_path, load_from_str};
pub use model::{
    CategoryConfig, ConfigFile, ConfigSection, MinifyConfig, RawConfigFile, ServerSection,
};

// src/watch/mod.rs

//! File watching and change detection.
//!
//! This module is responsible for:
//! - Compiling per-category source and watch globs (`!` marks exclusions).
//! - Mapping source paths to build paths ([`path_map`]).
//! - Wiring up a cross-platform filesystem watcher (`notify`) that attributes
//!   each change to the categories watching it.
//! - Optionally dropping saves that did not change file content.
//!
//! It knows nothing about job scheduling; it only turns filesystem changes
//! into `FileChanged` events.

pub mod cache;
pub mod event_handler;
pub mod hash;
pub mod path_map;
pub mod patterns;
pub mod watcher;

pub use path_map::{map, map_event, CanonicalPath, NotMappable};
pub use patterns::{build_profiles_from_config, CategoryWatchProfile, SourceGlob};
pub use watcher::{spawn_watcher, WatcherHandle};

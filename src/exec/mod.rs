// src/exec/mod.rs

//! Job execution layer.
//!
//! - [`executor_loop`] owns the background loop that runs each dispatched
//!   job against the pipeline registry and reports `JobCompleted`.
//! - [`backend`] provides the `ExecutorBackend` trait and the production
//!   `PipelineExecutor`; tests replace it with a fake.

pub mod backend;
pub mod executor_loop;

pub use backend::{ExecutorBackend, PipelineExecutor};
pub use executor_loop::spawn_executor;

// src/errors.rs

//! Crate-wide error aliases and helpers.

use std::net::SocketAddr;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipewatchError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Transform failed for category '{category}': {message}")]
    TransformFailure { category: String, message: String },

    #[error("Dev server could not bind {addr}: {source}")]
    ServerBind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("Unknown category: {0}")]
    CategoryNotFound(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, PipewatchError>;

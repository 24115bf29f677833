// src/config/validate.rs

use std::net::SocketAddr;

use axum::http::Uri;

use crate::config::model::{CategoryConfig, ConfigFile, RawConfigFile, ServerSection};
use crate::errors::{PipewatchError, Result};
use crate::types::{parse_duration, ServerMode};
use crate::watch::path_map::CanonicalPath;
use crate::watch::patterns::{literal_prefix, split_negated, SourceGlob};

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = PipewatchError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        ensure_has_categories(&raw)?;

        let timeout = parse_duration(&raw.config.transform_timeout).map_err(|e| {
            PipewatchError::ConfigError(format!("[config].transform_timeout: {e}"))
        })?;
        if timeout.is_zero() {
            return Err(PipewatchError::ConfigError(
                "[config].transform_timeout must be greater than zero".to_string(),
            ));
        }

        let addr = validate_server(&raw.server)?;
        validate_categories(&raw)?;

        Ok(ConfigFile::new_unchecked(
            raw.config,
            raw.server,
            raw.category,
            timeout,
            addr,
        ))
    }
}

fn ensure_has_categories(cfg: &RawConfigFile) -> Result<()> {
    if cfg.category.is_empty() {
        return Err(PipewatchError::ConfigError(
            "config must contain at least one [category.<name>] section".to_string(),
        ));
    }
    if cfg.config.build_root.trim().is_empty() {
        return Err(PipewatchError::ConfigError(
            "[config].build_root must not be empty".to_string(),
        ));
    }
    Ok(())
}

fn validate_server(server: &ServerSection) -> Result<SocketAddr> {
    let addr: SocketAddr = server.addr.parse().map_err(|e| {
        PipewatchError::ConfigError(format!(
            "[server].addr '{}' is not a socket address: {e}",
            server.addr
        ))
    })?;

    if server.mode == ServerMode::Proxy {
        let Some(target) = server.proxy_target.as_deref() else {
            return Err(PipewatchError::ConfigError(
                "[server].mode = \"proxy\" requires [server].proxy_target".to_string(),
            ));
        };
        let uri: Uri = target.parse().map_err(|e| {
            PipewatchError::ConfigError(format!(
                "[server].proxy_target '{target}' is not a valid URL: {e}"
            ))
        })?;
        match uri.scheme_str() {
            Some("http") if uri.authority().is_some() => {}
            _ => {
                return Err(PipewatchError::ConfigError(format!(
                    "[server].proxy_target '{target}' must be an absolute http:// URL"
                )));
            }
        }
    }

    Ok(addr)
}

fn validate_categories(cfg: &RawConfigFile) -> Result<()> {
    let source_roots: Vec<(&str, CanonicalPath)> = cfg
        .category
        .iter()
        .map(|(name, c)| (name.as_str(), CanonicalPath::parse(&c.source_root)))
        .collect();

    let global_build = CanonicalPath::parse(&cfg.config.build_root);
    for (name, src) in &source_roots {
        if global_build.overlaps(src) {
            return Err(PipewatchError::ConfigError(format!(
                "[config].build_root '{}' overlaps source_root of category '{}'",
                cfg.config.build_root, name
            )));
        }
    }

    for (name, category) in cfg.category.iter() {
        validate_category(name, category)?;

        let build = CanonicalPath::parse(&category.build_root);
        for (other, src) in &source_roots {
            if build.overlaps(src) {
                return Err(PipewatchError::ConfigError(format!(
                    "category '{}': build_root '{}' overlaps source_root of category '{}'",
                    name, category.build_root, other
                )));
            }
        }
    }

    Ok(())
}

fn validate_category(name: &str, category: &CategoryConfig) -> Result<()> {
    let src_root = CanonicalPath::parse(&category.source_root);
    if src_root.is_empty() {
        return Err(PipewatchError::ConfigError(format!(
            "category '{name}': source_root must not be empty"
        )));
    }
    if CanonicalPath::parse(&category.build_root).is_empty() {
        return Err(PipewatchError::ConfigError(format!(
            "category '{name}': build_root must not be empty"
        )));
    }

    if !category.copy_verbatim
        && category.cmd.as_deref().map(str::trim).unwrap_or("").is_empty()
    {
        return Err(PipewatchError::ConfigError(format!(
            "category '{name}': compiled categories need `cmd` (or set copy_verbatim = true)"
        )));
    }

    if let Some(minify) = &category.minify {
        if minify.cmd.trim().is_empty() || minify.extensions.is_empty() {
            return Err(PipewatchError::ConfigError(format!(
                "category '{name}': minify needs a non-empty `cmd` and at least one extension"
            )));
        }
    }

    for (label, patterns) in [
        ("source", category.source.as_slice()),
        ("watch", category.effective_watch()),
    ] {
        let (include, _exclude) = split_negated(patterns);
        if include.is_empty() {
            return Err(PipewatchError::ConfigError(format!(
                "category '{name}': `{label}` needs at least one non-negated pattern"
            )));
        }

        SourceGlob::compile(patterns).map_err(|e| {
            PipewatchError::ConfigError(format!("category '{name}': {label}: {e:#}"))
        })?;
    }

    for pattern in split_negated(&category.source).0 {
        let prefix = literal_prefix(&pattern);
        if !prefix.starts_with(&src_root) {
            return Err(PipewatchError::ConfigError(format!(
                "category '{}': source pattern '{}' is not under source_root '{}'",
                name, pattern, category.source_root
            )));
        }
    }

    Ok(())
}

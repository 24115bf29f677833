// src/config/model.rs

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::time::Duration;

use serde::Deserialize;

use crate::types::ServerMode;

/// Top-level configuration as read from a TOML file, before validation.
///
/// ```toml
/// [config]
/// build_root = "build"
/// transform_timeout = "120s"
///
/// [server]
/// mode = "static"
///
/// [category.style]
/// source = ["src/scss/*.scss"]
/// watch = ["src/scss/**/*.scss"]
/// source_root = "src/scss"
/// build_root = "build/css"
/// cmd = "sass {src}/main.scss {build}/main.css"
/// ```
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawConfigFile {
    /// Global behaviour config from `[config]`.
    #[serde(default)]
    pub config: ConfigSection,

    /// Dev server settings from `[server]`.
    #[serde(default)]
    pub server: ServerSection,

    /// All asset categories from `[category.<name>]`.
    #[serde(default)]
    pub category: BTreeMap<String, CategoryConfig>,
}

/// Validated configuration.
///
/// Only obtainable through `TryFrom<RawConfigFile>`, so holding one means the
/// category invariants (source-root prefixes, non-overlapping build roots,
/// proxy target present in proxy mode) have been checked.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    config: ConfigSection,
    server: ServerSection,
    category: BTreeMap<String, CategoryConfig>,
    transform_timeout: Duration,
    server_addr: SocketAddr,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(
        config: ConfigSection,
        server: ServerSection,
        category: BTreeMap<String, CategoryConfig>,
        transform_timeout: Duration,
        server_addr: SocketAddr,
    ) -> Self {
        Self {
            config,
            server,
            category,
            transform_timeout,
            server_addr,
        }
    }

    pub fn config_section(&self) -> &ConfigSection {
        &self.config
    }

    pub fn server(&self) -> &ServerSection {
        &self.server
    }

    pub fn categories(&self) -> &BTreeMap<String, CategoryConfig> {
        &self.category
    }

    pub fn transform_timeout(&self) -> Duration {
        self.transform_timeout
    }

    pub fn server_addr(&self) -> SocketAddr {
        self.server_addr
    }

    /// Directory served in static mode.
    pub fn static_root(&self) -> &str {
        self.server
            .root
            .as_deref()
            .unwrap_or(&self.config.build_root)
    }
}

/// `[config]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigSection {
    /// Root of the whole build tree; `clean` deletes it.
    #[serde(default = "default_build_root")]
    pub build_root: String,

    /// Upper bound for a single transform invocation (e.g. `"90s"`).
    #[serde(default = "default_transform_timeout")]
    pub transform_timeout: String,

    /// Drop `Changed` events whose file content did not actually change.
    #[serde(default)]
    pub skip_unchanged: bool,
}

fn default_build_root() -> String {
    "build".to_string()
}

fn default_transform_timeout() -> String {
    "120s".to_string()
}

impl Default for ConfigSection {
    fn default() -> Self {
        Self {
            build_root: default_build_root(),
            transform_timeout: default_transform_timeout(),
            skip_unchanged: false,
        }
    }
}

/// `[server]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerSection {
    #[serde(default)]
    pub mode: ServerMode,

    #[serde(default = "default_addr")]
    pub addr: String,

    /// Static mode document root; defaults to `[config].build_root`.
    #[serde(default)]
    pub root: Option<String>,

    /// Render an HTML index for directories without `index.html`.
    #[serde(default = "default_true")]
    pub directory_listing: bool,

    /// Upstream origin for proxy mode, e.g. `"http://localhost:8080"`.
    #[serde(default)]
    pub proxy_target: Option<String>,

    /// Forward `Upgrade` (websocket) connections in proxy mode.
    #[serde(default = "default_true")]
    pub websocket_upgrade: bool,
}

fn default_addr() -> String {
    "127.0.0.1:3000".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            mode: ServerMode::default(),
            addr: default_addr(),
            root: None,
            directory_listing: true,
            proxy_target: None,
            websocket_upgrade: true,
        }
    }
}

/// `[category.<name>]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct CategoryConfig {
    /// Source patterns; entries starting with `!` are exclusions.
    pub source: Vec<String>,

    /// Patterns that trigger a rebuild. Defaults to `source`.
    #[serde(default)]
    pub watch: Option<Vec<String>>,

    /// Directory every source pattern lives under.
    pub source_root: String,

    /// Output directory for this category.
    pub build_root: String,

    /// Shell command for compiled categories. `{src}` and `{build}` expand to
    /// the category roots.
    #[serde(default)]
    pub cmd: Option<String>,

    /// Copy files unchanged instead of running `cmd`.
    #[serde(default)]
    pub copy_verbatim: bool,

    /// Optional production minification step.
    #[serde(default)]
    pub minify: Option<MinifyConfig>,
}

impl CategoryConfig {
    /// Effective watch patterns.
    pub fn effective_watch(&self) -> &[String] {
        self.watch.as_deref().unwrap_or(&self.source)
    }
}

/// `minify = { cmd = "...", extensions = ["js"] }`.
#[derive(Debug, Clone, Deserialize)]
pub struct MinifyConfig {
    /// Command run per file; `{input}` and `{output}` are expanded.
    pub cmd: String,

    /// File extensions (without dot) to minify.
    pub extensions: Vec<String>,
}

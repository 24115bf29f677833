#![allow(dead_code)]

use pipewatch::config::{CategoryConfig, ConfigFile, MinifyConfig, RawConfigFile};
use pipewatch::errors::Result;
use pipewatch::types::ServerMode;

/// Builder for `ConfigFile` to simplify test setup.
#[derive(Default)]
pub struct ConfigFileBuilder {
    config: RawConfigFile,
}

impl ConfigFileBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_category(mut self, name: &str, category: CategoryConfig) -> Self {
        self.config.category.insert(name.to_string(), category);
        self
    }

    pub fn build_root(mut self, root: &str) -> Self {
        self.config.config.build_root = root.to_string();
        self
    }

    pub fn transform_timeout(mut self, timeout: &str) -> Self {
        self.config.config.transform_timeout = timeout.to_string();
        self
    }

    pub fn skip_unchanged(mut self, val: bool) -> Self {
        self.config.config.skip_unchanged = val;
        self
    }

    pub fn server_mode(mut self, mode: ServerMode) -> Self {
        self.config.server.mode = mode;
        self
    }

    pub fn server_addr(mut self, addr: &str) -> Self {
        self.config.server.addr = addr.to_string();
        self
    }

    pub fn proxy_target(mut self, target: &str) -> Self {
        self.config.server.proxy_target = Some(target.to_string());
        self
    }

    pub fn raw(self) -> RawConfigFile {
        self.config
    }

    pub fn try_build(self) -> Result<ConfigFile> {
        ConfigFile::try_from(self.config)
    }

    pub fn build(self) -> ConfigFile {
        self.try_build().expect("Failed to build valid config from builder")
    }
}

/// Builder for `CategoryConfig`.
pub struct CategoryConfigBuilder {
    category: CategoryConfig,
}

impl CategoryConfigBuilder {
    /// A compiled category whose source is everything below `source_root`.
    pub fn compiled(source_root: &str, build_root: &str, cmd: &str) -> Self {
        Self {
            category: CategoryConfig {
                source: vec![format!("{source_root}/**/*")],
                watch: None,
                source_root: source_root.to_string(),
                build_root: build_root.to_string(),
                cmd: Some(cmd.to_string()),
                copy_verbatim: false,
                minify: None,
            },
        }
    }

    /// A verbatim-copy category whose source is everything below `source_root`.
    pub fn verbatim(source_root: &str, build_root: &str) -> Self {
        Self {
            category: CategoryConfig {
                source: vec![format!("{source_root}/**/*")],
                watch: None,
                source_root: source_root.to_string(),
                build_root: build_root.to_string(),
                cmd: None,
                copy_verbatim: true,
                minify: None,
            },
        }
    }

    pub fn source(mut self, pattern: &str) -> Self {
        self.category.source = vec![pattern.to_string()];
        self
    }

    pub fn and_source(mut self, pattern: &str) -> Self {
        self.category.source.push(pattern.to_string());
        self
    }

    pub fn watch(mut self, pattern: &str) -> Self {
        self.category
            .watch
            .get_or_insert_with(Vec::new)
            .push(pattern.to_string());
        self
    }

    pub fn minify(mut self, cmd: &str, extensions: &[&str]) -> Self {
        self.category.minify = Some(MinifyConfig {
            cmd: cmd.to_string(),
            extensions: extensions.iter().map(|e| e.to_string()).collect(),
        });
        self
    }

    pub fn build(self) -> CategoryConfig {
        self.category
    }
}

// src/server/mod.rs

//! Development HTTP server with live reload.
//!
//! - [`reload`] decides which builds reload the browser and pushes the
//!   signal over Server-Sent Events.
//! - [`static_files`] serves the build tree in static mode.
//! - [`proxy`] forwards to an upstream app server in proxy mode.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::extract::FromRef;
use axum::http::Uri;
use axum::routing::get;
use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};

use crate::config::ConfigFile;
use crate::errors::{PipewatchError, Result};
use crate::types::ServerMode;

pub mod proxy;
pub mod reload;
pub mod static_files;

use proxy::ProxyTarget;
use reload::ReloadNotifier;
use static_files::StaticSite;

/// Resolved server settings.
#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub mode: ServerMode,
    pub addr: SocketAddr,
    /// Directory served in static mode.
    pub root: PathBuf,
    pub directory_listing: bool,
    pub proxy_target: Option<Uri>,
    pub websocket_upgrade: bool,
}

impl ServerSettings {
    pub fn from_config(cfg: &ConfigFile, project_root: &Path) -> Result<Self> {
        let server = cfg.server();
        let proxy_target = match (&server.mode, &server.proxy_target) {
            (ServerMode::Proxy, Some(target)) => Some(target.parse::<Uri>().map_err(|e| {
                PipewatchError::ConfigError(format!("invalid proxy_target '{target}': {e}"))
            })?),
            (ServerMode::Proxy, None) => {
                return Err(PipewatchError::ConfigError(
                    "server mode 'proxy' requires proxy_target".to_string(),
                ));
            }
            (ServerMode::Static, _) => None,
        };

        Ok(Self {
            mode: server.mode,
            addr: cfg.server_addr(),
            root: project_root.join(cfg.static_root()),
            directory_listing: server.directory_listing,
            proxy_target,
            websocket_upgrade: server.websocket_upgrade,
        })
    }
}

/// State shared by all routes.
#[derive(Debug, Clone)]
struct AppState {
    notifier: ReloadNotifier,
    site: Arc<StaticSite>,
}

impl FromRef<AppState> for ReloadNotifier {
    fn from_ref(state: &AppState) -> Self {
        state.notifier.clone()
    }
}

impl FromRef<AppState> for Arc<StaticSite> {
    fn from_ref(state: &AppState) -> Self {
        Arc::clone(&state.site)
    }
}

#[derive(Debug)]
enum ServerState {
    NotStarted,
    Running {
        addr: SocketAddr,
        _task: JoinHandle<()>,
    },
}

/// The dev server. Created up front, bound lazily by
/// [`DevServer::ensure_started`].
#[derive(Debug)]
pub struct DevServer {
    settings: ServerSettings,
    notifier: ReloadNotifier,
    state: Mutex<ServerState>,
}

impl DevServer {
    pub fn new(settings: ServerSettings, notifier: ReloadNotifier) -> Self {
        Self {
            settings,
            notifier,
            state: Mutex::new(ServerState::NotStarted),
        }
    }

    pub fn notifier(&self) -> &ReloadNotifier {
        &self.notifier
    }

    pub fn settings(&self) -> &ServerSettings {
        &self.settings
    }

    /// Bind and start serving unless already running. Returns the bound
    /// address; calling it again returns the same address without binding.
    pub async fn ensure_started(&self) -> Result<SocketAddr> {
        let mut state = self.state.lock().await;
        if let ServerState::Running { addr, .. } = &*state {
            return Ok(*addr);
        }

        let app = self.build_router()?;
        let listener = TcpListener::bind(self.settings.addr)
            .await
            .map_err(|source| PipewatchError::ServerBind {
                addr: self.settings.addr,
                source,
            })?;
        let addr = listener.local_addr()?;

        let task = tokio::spawn(async move {
            if let Err(err) = axum::serve(listener, app).await {
                error!(error = %err, "dev server stopped");
            }
        });

        match self.settings.mode {
            ServerMode::Static => info!(%addr, root = ?self.settings.root, "dev server serving build output"),
            ServerMode::Proxy => info!(
                %addr,
                target = ?self.settings.proxy_target.as_ref().map(ToString::to_string),
                "dev server proxying"
            ),
        }

        *state = ServerState::Running { addr, _task: task };
        Ok(addr)
    }

    /// Address the server is bound to, if started.
    pub async fn local_addr(&self) -> Option<SocketAddr> {
        match &*self.state.lock().await {
            ServerState::Running { addr, .. } => Some(*addr),
            ServerState::NotStarted => None,
        }
    }

    fn build_router(&self) -> Result<Router> {
        let proxy = match (&self.settings.mode, &self.settings.proxy_target) {
            (ServerMode::Proxy, Some(target)) => Some(Arc::new(ProxyTarget::new(
                target,
                self.settings.websocket_upgrade,
            )?)),
            (ServerMode::Proxy, None) => {
                return Err(PipewatchError::ConfigError(
                    "server mode 'proxy' requires proxy_target".to_string(),
                ));
            }
            (ServerMode::Static, _) => None,
        };

        let state = AppState {
            notifier: self.notifier.clone(),
            site: Arc::new(StaticSite {
                root: self.settings.root.clone(),
                directory_listing: self.settings.directory_listing,
            }),
        };

        let router = Router::new()
            .route(reload::EVENTS_PATH, get(reload::handle_events))
            .route(reload::SCRIPT_PATH, get(reload::handle_script));

        let router = match proxy {
            Some(target) => router
                .with_state::<Arc<ProxyTarget>>(state)
                .fallback(proxy::forward)
                .with_state(target),
            None => router.fallback(static_files::serve).with_state(state),
        };

        Ok(router.layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        ))
    }
}

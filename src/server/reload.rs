// src/server/reload.rs

//! Browser live reload.
//!
//! Finished builds are offered to the [`ReloadNotifier`]; the ones that
//! change what a browser would see are broadcast to every page connected to
//! the SSE endpoint. Pages pick up the client script through a `<script>`
//! tag injected before `</body>`.

use std::convert::Infallible;
use std::time::Duration;

use axum::body::Body;
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::{Stream, StreamExt};
use tracing::{debug, info};

use crate::pipeline::{BuildResult, JobTrigger};
use crate::types::{CategoryName, EventKind};

pub const EVENTS_PATH: &str = "/__pipewatch/events";
pub const SCRIPT_PATH: &str = "/__pipewatch/reload.js";

const RELOAD_SCRIPT: &str = include_str!("../../assets/reload-client.js");
const SCRIPT_TAG: &str = "<script src=\"/__pipewatch/reload.js\"></script>";

/// Message pushed to connected browsers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReloadSignal {
    pub category: CategoryName,
}

/// Decide whether a finished build should reload the browser.
///
/// Failed builds never do; the page keeps showing the last good output.
/// Full rebuilds always do. A verbatim sync only does when it added or
/// removed files; in-place copies of changed vendor files are picked up on
/// the next manual refresh.
pub fn should_reload(result: &BuildResult) -> bool {
    if !result.succeeded {
        return false;
    }
    match &result.trigger {
        JobTrigger::Rebuild => true,
        JobTrigger::Sync(kinds) => kinds
            .iter()
            .any(|k| matches!(k, EventKind::Added | EventKind::Removed)),
    }
}

/// Fan-out of reload signals to every connected page.
#[derive(Debug, Clone)]
pub struct ReloadNotifier {
    tx: broadcast::Sender<ReloadSignal>,
}

impl Default for ReloadNotifier {
    fn default() -> Self {
        Self::new()
    }
}

impl ReloadNotifier {
    pub fn new() -> Self {
        let (tx, _rx) = broadcast::channel(16);
        Self { tx }
    }

    /// Broadcast a reload if `result` warrants one. Returns whether it did.
    pub fn notify(&self, result: &BuildResult) -> bool {
        if !should_reload(result) {
            debug!(category = %result.category, succeeded = result.succeeded, "no reload for result");
            return false;
        }
        let signal = ReloadSignal {
            category: result.category.clone(),
        };
        // Zero receivers just means no page is open.
        let clients = self.tx.send(signal).unwrap_or(0);
        info!(category = %result.category, clients, "reload broadcast");
        true
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ReloadSignal> {
        self.tx.subscribe()
    }

    pub fn client_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

/// SSE endpoint: one `reload` event per broadcast signal.
pub async fn handle_events(
    State(notifier): State<ReloadNotifier>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    debug!(clients = notifier.client_count() + 1, "browser connected to reload channel");

    let stream = BroadcastStream::new(notifier.subscribe()).filter_map(|msg| match msg {
        Ok(signal) => Some(Ok(Event::default().event("reload").data(signal.category))),
        // A lagging page missed some signals; the next one reloads it anyway.
        Err(_lagged) => None,
    });

    Sse::new(stream).keep_alive(KeepAlive::new().interval(Duration::from_secs(15)).text("ping"))
}

/// Serve the reload client script.
pub async fn handle_script() -> Response {
    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "application/javascript"),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        Body::from(RELOAD_SCRIPT),
    )
        .into_response()
}

/// Inject the reload script tag before the last `</body>` (any case), or
/// append it when the document has none.
pub fn inject_reload_script(content: &[u8]) -> Vec<u8> {
    const PATTERN: &[u8] = b"</body>";
    let tag = SCRIPT_TAG.as_bytes();

    let mut result = Vec::with_capacity(content.len() + tag.len());
    match content
        .windows(PATTERN.len())
        .rposition(|w| w.eq_ignore_ascii_case(PATTERN))
    {
        Some(pos) => {
            result.extend_from_slice(&content[..pos]);
            result.extend_from_slice(tag);
            result.extend_from_slice(&content[pos..]);
        }
        None => {
            result.extend_from_slice(content);
            result.extend_from_slice(tag);
        }
    }
    result
}

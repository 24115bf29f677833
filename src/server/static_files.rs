// src/server/static_files.rs

//! Static mode: serve the build tree straight from disk.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::body::Body;
use axum::extract::State;
use axum::http::{header, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use percent_encoding::percent_decode_str;
use tracing::{debug, warn};

use crate::server::reload::inject_reload_script;

/// What the static handler serves and how.
#[derive(Debug, Clone)]
pub struct StaticSite {
    pub root: PathBuf,
    pub directory_listing: bool,
}

/// Outcome of mapping a URL path onto the served root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolved {
    File(PathBuf),
    /// A directory without `index.html`.
    Directory(PathBuf),
    NotFound,
}

/// Map `url_path` to a file under `root`.
///
/// The path is percent-decoded; `..` segments and anything resolving (via
/// symlinks) outside the root are treated as missing. Directories serve
/// their `index.html` when present.
pub fn resolve(root: &Path, url_path: &str) -> Resolved {
    let decoded = percent_decode_str(url_path)
        .decode_utf8()
        .map(std::borrow::Cow::into_owned)
        .unwrap_or_default();
    let clean = decoded.trim_matches('/');

    if clean.split(['/', '\\']).any(|seg| seg == "..") {
        return Resolved::NotFound;
    }

    let (Ok(root), Ok(target)) = (root.canonicalize(), root.join(clean).canonicalize()) else {
        return Resolved::NotFound;
    };
    if !target.starts_with(&root) {
        return Resolved::NotFound;
    }

    if target.is_file() {
        return Resolved::File(target);
    }
    if target.is_dir() {
        let index = target.join("index.html");
        if index.is_file() {
            return Resolved::File(index);
        }
        return Resolved::Directory(target);
    }
    Resolved::NotFound
}

/// Determine content type from file extension.
pub fn content_type(path: &Path) -> &'static str {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();

    match extension.as_str() {
        "html" | "htm" => "text/html; charset=utf-8",
        "css" => "text/css; charset=utf-8",
        "js" | "mjs" => "application/javascript",
        "json" | "map" => "application/json",
        "txt" => "text/plain; charset=utf-8",
        "xml" => "application/xml",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "ico" => "image/x-icon",
        "svg" => "image/svg+xml",
        "woff" => "font/woff",
        "woff2" => "font/woff2",
        "ttf" => "font/ttf",
        "otf" => "font/otf",
        "eot" => "application/vnd.ms-fontobject",
        "wasm" => "application/wasm",
        _ => "application/octet-stream",
    }
}

/// Fallback handler for static mode.
pub async fn serve(State(site): State<Arc<StaticSite>>, method: Method, uri: Uri) -> Response {
    if method != Method::GET && method != Method::HEAD {
        return StatusCode::METHOD_NOT_ALLOWED.into_response();
    }

    let path = uri.path();
    match resolve(&site.root, path) {
        Resolved::File(file) => serve_file(&file, method == Method::HEAD).await,
        Resolved::Directory(dir) if site.directory_listing => {
            match render_listing(&dir, path).await {
                Ok(html) => html_response(StatusCode::OK, inject_reload_script(html.as_bytes())),
                Err(err) => {
                    warn!(dir = ?dir, error = %err, "failed to list directory");
                    StatusCode::INTERNAL_SERVER_ERROR.into_response()
                }
            }
        }
        Resolved::Directory(_) | Resolved::NotFound => {
            debug!(path, "not found");
            (
                StatusCode::NOT_FOUND,
                [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
                format!("File not found: {path}"),
            )
                .into_response()
        }
    }
}

async fn serve_file(file: &Path, head: bool) -> Response {
    let content_type = content_type(file);
    let body = match tokio::fs::read(file).await {
        Ok(body) => body,
        Err(err) => {
            warn!(file = ?file, error = %err, "failed to read file");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    let body = if content_type.starts_with("text/html") {
        inject_reload_script(&body)
    } else {
        body
    };

    let len = body.len();
    let body = if head { Body::empty() } else { Body::from(body) };
    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, content_type.to_string()),
            (header::CACHE_CONTROL, "no-cache".to_string()),
            (header::CONTENT_LENGTH, len.to_string()),
        ],
        body,
    )
        .into_response()
}

fn html_response(status: StatusCode, body: Vec<u8>) -> Response {
    (
        status,
        [
            (header::CONTENT_TYPE, "text/html; charset=utf-8"),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        Body::from(body),
    )
        .into_response()
}

/// Plain HTML index of `dir`: directories first, then files, each sorted.
pub async fn render_listing(dir: &Path, url_path: &str) -> std::io::Result<String> {
    let mut dirs = Vec::new();
    let mut files = Vec::new();

    let mut entries = tokio::fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name().to_string_lossy().into_owned();
        if entry.file_type().await?.is_dir() {
            dirs.push(name);
        } else {
            files.push(name);
        }
    }
    dirs.sort();
    files.sort();

    let base = format!("/{}", url_path.trim_matches('/'));
    let base = if base == "/" { String::new() } else { base };
    let title = if base.is_empty() { "/".to_string() } else { format!("{base}/") };

    let mut html = String::new();
    html.push_str("<!DOCTYPE html>\n<html><head><meta charset=\"utf-8\">");
    html.push_str(&format!("<title>Index of {}</title></head><body>\n", escape_html(&title)));
    html.push_str(&format!("<h1>Index of {}</h1>\n<ul>\n", escape_html(&title)));
    if !base.is_empty() {
        html.push_str("<li><a href=\"../\">../</a></li>\n");
    }
    for name in &dirs {
        html.push_str(&format!(
            "<li><a href=\"{base}/{0}/\">{0}/</a></li>\n",
            escape_html(name)
        ));
    }
    for name in &files {
        html.push_str(&format!(
            "<li><a href=\"{base}/{0}\">{0}</a></li>\n",
            escape_html(name)
        ));
    }
    html.push_str("</ul>\n</body></html>\n");
    Ok(html)
}

fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

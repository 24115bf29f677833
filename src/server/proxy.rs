// src/server/proxy.rs

//! Proxy mode: forward every request to an upstream application server and
//! inject the reload script into the HTML it returns.

use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Request, State};
use axum::http::uri::{Authority, PathAndQuery, Scheme};
use axum::http::{header, HeaderMap, HeaderValue, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::{TokioExecutor, TokioIo};
use tracing::{debug, warn};

use crate::server::reload::inject_reload_script;

pub type HttpClient = Client<HttpConnector, Body>;

/// Headers that describe a single hop and must not be forwarded.
const HOP_BY_HOP: [header::HeaderName; 7] = [
    header::CONNECTION,
    header::PROXY_AUTHENTICATE,
    header::PROXY_AUTHORIZATION,
    header::TE,
    header::TRAILER,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
];

/// Upstream the proxy forwards to.
#[derive(Debug, Clone)]
pub struct ProxyTarget {
    scheme: Scheme,
    authority: Authority,
    /// Path prefix of the target, without a trailing slash.
    base_path: String,
    websocket_upgrade: bool,
    client: HttpClient,
}

impl ProxyTarget {
    /// `target` must be an absolute `http://` URI; config validation
    /// guarantees this before we get here.
    pub fn new(target: &Uri, websocket_upgrade: bool) -> anyhow::Result<Self> {
        let scheme = target
            .scheme()
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("proxy target {target} has no scheme"))?;
        let authority = target
            .authority()
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("proxy target {target} has no host"))?;
        let client = Client::builder(TokioExecutor::new()).build_http::<Body>();

        Ok(Self {
            scheme,
            authority,
            base_path: target.path().trim_end_matches('/').to_string(),
            websocket_upgrade,
            client,
        })
    }

    /// Rewrite an incoming request URI onto the target.
    pub fn rewrite_uri(&self, incoming: &Uri) -> Result<Uri, axum::http::Error> {
        let path_and_query = incoming
            .path_and_query()
            .map(PathAndQuery::as_str)
            .unwrap_or("/");
        Uri::builder()
            .scheme(self.scheme.clone())
            .authority(self.authority.clone())
            .path_and_query(format!("{}{}", self.base_path, path_and_query))
            .build()
    }

    fn host_header(&self) -> Option<HeaderValue> {
        HeaderValue::from_str(self.authority.as_str()).ok()
    }
}

/// True for `Connection: upgrade` requests carrying an `Upgrade` header.
pub fn is_upgrade_request(headers: &HeaderMap) -> bool {
    let connection_upgrade = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .any(|token| token.trim().eq_ignore_ascii_case("upgrade"));
    connection_upgrade && headers.contains_key(header::UPGRADE)
}

fn strip_hop_by_hop(headers: &mut HeaderMap) {
    for name in HOP_BY_HOP.iter() {
        headers.remove(name);
    }
    headers.remove("keep-alive");
}

fn bad_gateway(msg: String) -> Response {
    (StatusCode::BAD_GATEWAY, [(header::CONTENT_TYPE, "text/plain; charset=utf-8")], msg).into_response()
}

/// Fallback handler for proxy mode.
pub async fn forward(State(proxy): State<Arc<ProxyTarget>>, req: Request) -> Response {
    if is_upgrade_request(req.headers()) {
        if !proxy.websocket_upgrade {
            debug!(uri = %req.uri(), "upgrade request refused (websocket_upgrade = false)");
            return (StatusCode::NOT_IMPLEMENTED, "connection upgrades are disabled").into_response();
        }
        return forward_upgrade(proxy, req).await;
    }

    let (mut parts, body) = req.into_parts();
    let uri = match proxy.rewrite_uri(&parts.uri) {
        Ok(uri) => uri,
        Err(err) => return bad_gateway(format!("invalid upstream uri: {err}")),
    };
    debug!(method = %parts.method, %uri, "proxying request");

    parts.uri = uri.clone();
    strip_hop_by_hop(&mut parts.headers);
    // Ask for an identity body so HTML can be rewritten.
    parts.headers.remove(header::ACCEPT_ENCODING);
    if let Some(host) = proxy.host_header() {
        parts.headers.insert(header::HOST, host);
    }

    let upstream = match proxy.client.request(Request::from_parts(parts, body)).await {
        Ok(resp) => resp,
        Err(err) => {
            warn!(%uri, error = %err, "upstream request failed");
            return bad_gateway(format!("upstream {uri} unreachable: {err}"));
        }
    };

    let (mut parts, body) = upstream.into_parts();
    strip_hop_by_hop(&mut parts.headers);

    let is_html = parts
        .headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("text/html"));
    let encoded = parts.headers.contains_key(header::CONTENT_ENCODING);

    if !is_html || encoded {
        return Response::from_parts(parts, Body::new(body));
    }

    let bytes = match axum::body::to_bytes(Body::new(body), usize::MAX).await {
        Ok(bytes) => bytes,
        Err(err) => return bad_gateway(format!("reading upstream body: {err}")),
    };
    let injected = inject_reload_script(&bytes);
    parts.headers.insert(header::CONTENT_LENGTH, HeaderValue::from(injected.len()));
    Response::from_parts(parts, Body::from(injected))
}

/// Forward an upgrade handshake and, once both sides switched protocols,
/// splice the two connections together.
async fn forward_upgrade(proxy: Arc<ProxyTarget>, mut req: Request) -> Response {
    let client_upgrade = hyper::upgrade::on(&mut req);

    let (mut parts, body) = req.into_parts();
    let uri = match proxy.rewrite_uri(&parts.uri) {
        Ok(uri) => uri,
        Err(err) => return bad_gateway(format!("invalid upstream uri: {err}")),
    };
    parts.uri = uri.clone();
    if let Some(host) = proxy.host_header() {
        parts.headers.insert(header::HOST, host);
    }

    let mut upstream = match proxy.client.request(Request::from_parts(parts, body)).await {
        Ok(resp) => resp,
        Err(err) => {
            warn!(%uri, error = %err, "upstream upgrade request failed");
            return bad_gateway(format!("upstream {uri} unreachable: {err}"));
        }
    };

    if upstream.status() != StatusCode::SWITCHING_PROTOCOLS {
        debug!(%uri, status = %upstream.status(), "upstream declined upgrade");
        let (parts, body) = upstream.into_parts();
        return Response::from_parts(parts, Body::new(body));
    }

    let upstream_upgrade = hyper::upgrade::on(&mut upstream);
    tokio::spawn(async move {
        let (client, server) = match tokio::try_join!(client_upgrade, upstream_upgrade) {
            Ok(pair) => pair,
            Err(err) => {
                warn!(error = %err, "connection upgrade failed");
                return;
            }
        };
        let mut client = TokioIo::new(client);
        let mut server = TokioIo::new(server);
        match tokio::io::copy_bidirectional(&mut client, &mut server).await {
            Ok((up, down)) => debug!(up, down, "upgraded connection closed"),
            Err(err) => debug!(error = %err, "upgraded connection ended with error"),
        }
    });

    let (parts, _body) = upstream.into_parts();
    Response::from_parts(parts, Body::empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rewrites_onto_target_with_base_path() {
        let target = ProxyTarget::new(&"http://127.0.0.1:8000/app/".parse().unwrap(), true).unwrap();
        let uri = target.rewrite_uri(&"/css/site.css?v=2".parse().unwrap()).unwrap();
        assert_eq!(uri.to_string(), "http://127.0.0.1:8000/app/css/site.css?v=2");

        let target = ProxyTarget::new(&"http://localhost:8000".parse().unwrap(), true).unwrap();
        let uri = target.rewrite_uri(&"/".parse().unwrap()).unwrap();
        assert_eq!(uri.to_string(), "http://localhost:8000/");
    }

    #[test]
    fn detects_upgrade_requests() {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONNECTION, HeaderValue::from_static("keep-alive, Upgrade"));
        assert!(!is_upgrade_request(&headers));

        headers.insert(header::UPGRADE, HeaderValue::from_static("websocket"));
        assert!(is_upgrade_request(&headers));

        headers.insert(header::CONNECTION, HeaderValue::from_static("keep-alive"));
        assert!(!is_upgrade_request(&headers));
    }

    #[test]
    fn hop_by_hop_headers_are_dropped() {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONNECTION, HeaderValue::from_static("close"));
        headers.insert("keep-alive", HeaderValue::from_static("timeout=5"));
        headers.insert(header::ACCEPT, HeaderValue::from_static("text/html"));
        strip_hop_by_hop(&mut headers);
        assert_eq!(headers.len(), 1);
    }
}

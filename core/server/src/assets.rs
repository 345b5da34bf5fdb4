//! Static frontend passthrough.
//!
//! Anything the API does not claim is fetched from the configured asset
//! origin and relayed. SPA routes (`/` and `/folder/...`) map onto the
//! single `index.html`; restrictive headers set by the asset origin are
//! stripped so the frontend runs under this origin's policy, and the
//! content type is pinned by extension because blob stores tend to serve
//! everything as octet-stream.

use axum::body::Body;
use axum::response::Response;
use http::header::{CONNECTION, CONTENT_LENGTH, CONTENT_TYPE, TRANSFER_ENCODING};

use drivegate_common::{Error, Result};

/// Response headers from the asset origin that must not reach clients.
const STRIPPED_HEADERS: [&str; 3] = [
    "x-xss-protection",
    "content-security-policy",
    "access-control-allow-origin",
];

/// Rewrite SPA routes to the entry document.
pub fn asset_path(pathname: &str) -> &str {
    if pathname == "/" || pathname.starts_with("/folder/") {
        "/index.html"
    } else {
        pathname
    }
}

/// Content type pinned by file extension, if we recognize it.
pub fn content_type_for(pathname: &str) -> Option<&'static str> {
    let ext = pathname.rsplit('.').next()?;
    match ext {
        "html" => Some("text/html; charset=utf-8"),
        "js" => Some("application/javascript; charset=utf-8"),
        "css" => Some("text/css; charset=utf-8"),
        "ico" => Some("image/x-icon"),
        _ => None,
    }
}

/// Fetch a static asset and relay it, streaming.
pub async fn serve(http: &reqwest::Client, static_base: &str, pathname: &str) -> Result<Response> {
    let pathname = asset_path(pathname);
    let url = format!("{}{}", static_base.trim_end_matches('/'), pathname);

    let upstream = http
        .get(&url)
        .send()
        .await
        .map_err(|e| Error::Upstream(format!("asset fetch failed: {}", e)))?;

    let status = upstream.status();
    let mut builder = Response::builder().status(status);

    for (name, value) in upstream.headers() {
        if STRIPPED_HEADERS.iter().any(|h| name.as_str() == *h) {
            continue;
        }
        // The streaming body recomputes framing.
        if name == CONTENT_LENGTH || name == TRANSFER_ENCODING || name == CONNECTION {
            continue;
        }
        builder = builder.header(name, value);
    }

    if let Some(content_type) = content_type_for(pathname) {
        builder = builder.header(CONTENT_TYPE, content_type);
    }

    builder
        .body(Body::from_stream(upstream.bytes_stream()))
        .map_err(|e| Error::Upstream(format!("asset relay failed: {}", e)))
}

/// Build the login page response used when authentication fails.
pub async fn login_page(http: &reqwest::Client, static_base: &str) -> Result<Response> {
    serve(http, static_base, "/index.html").await
}

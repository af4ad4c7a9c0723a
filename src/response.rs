//! Prepared HTTP responses for bundle artifacts.
//!
//! A `PreparedResponse` is immutable once constructed: headers resolved,
//! ETag computed, gzip body pre-encoded. It is built once per successful
//! build by the cache writer and handed to any number of concurrent request
//! threads.

use std::io::Cursor;

use anyhow::{Context, Result};
use tiny_http::{Header, Method, Request, Response, StatusCode};

use crate::config::BundleConfig;

/// Artifacts are always served as JavaScript.
pub const CONTENT_TYPE: &str = "application/javascript";

/// Header/encoding directives for preparing one bundle's responses.
#[derive(Debug, Clone, Default)]
pub struct PrepareOptions {
    /// `cache-control` value, present only for static cache modes.
    pub cache_control: Option<String>,
    /// Pre-encode a gzip body for content negotiation.
    pub gzip: bool,
}

impl PrepareOptions {
    pub fn for_bundle(bundle: &BundleConfig) -> Self {
        Self {
            cache_control: bundle.cache.cache_control().map(str::to_string),
            gzip: bundle.gzip,
        }
    }
}

/// An immutable, ready-to-send artifact response.
pub struct PreparedResponse {
    body: Vec<u8>,
    /// Present when gzip is enabled and actually smaller than the identity body
    gzip_body: Option<Vec<u8>>,
    etag: String,
    cache_control: Option<String>,
}

impl PreparedResponse {
    pub fn prepare(body: Vec<u8>, options: &PrepareOptions) -> Self {
        let hash = blake3::hash(&body);
        let etag = format!("\"{}\"", hex::encode(&hash.as_bytes()[..8]));
        let gzip_body = if options.gzip { gzip_encode(&body) } else { None };

        Self {
            body,
            gzip_body,
            etag,
            cache_control: options.cache_control.clone(),
        }
    }

    pub fn len(&self) -> usize {
        self.body.len()
    }

    pub fn is_empty(&self) -> bool {
        self.body.is_empty()
    }

    pub fn etag(&self) -> &str {
        &self.etag
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn cache_control(&self) -> Option<&str> {
        self.cache_control.as_deref()
    }

    /// Write status, headers and the negotiated body.
    pub fn send(&self, request: Request) -> Result<()> {
        let mut headers = vec![
            header("Content-Type", CONTENT_TYPE)?,
            header("ETag", &self.etag)?,
        ];
        if let Some(value) = &self.cache_control {
            headers.push(header("Cache-Control", value)?);
        }
        if self.gzip_body.is_some() {
            headers.push(header("Vary", "Accept-Encoding")?);
        }

        // Conditional request: unchanged artifact → 304
        if if_none_match(&request).is_some_and(|value| etag_matches(&value, &self.etag)) {
            return respond_headers_only(request, StatusCode(304), headers);
        }

        let (bytes, encoding) = match (&self.gzip_body, accepts_gzip(&request)) {
            (Some(gz), true) => (gz.as_slice(), Some("gzip")),
            _ => (self.body.as_slice(), None),
        };
        if let Some(encoding) = encoding {
            headers.push(header("Content-Encoding", encoding)?);
        }

        if request.method() == &Method::Head {
            return respond_headers_only(request, StatusCode(200), headers);
        }

        let response = Response::new(
            StatusCode(200),
            headers,
            Cursor::new(bytes),
            Some(bytes.len()),
            None,
        );
        request.respond(response)?;
        Ok(())
    }
}

fn respond_headers_only(
    request: Request,
    status: StatusCode,
    headers: Vec<Header>,
) -> Result<()> {
    let response = headers
        .into_iter()
        .fold(Response::empty(status), |r, h| r.with_header(h));
    request.respond(response)?;
    Ok(())
}

fn header(field: &str, value: &str) -> Result<Header> {
    Header::from_bytes(field.as_bytes(), value.as_bytes())
        .ok()
        .with_context(|| format!("invalid `{field}` header value"))
}

/// Gzip-encode, keeping the result only when it is actually smaller.
fn gzip_encode(bytes: &[u8]) -> Option<Vec<u8>> {
    use flate2::{Compression, write::GzEncoder};
    use std::io::Write;

    let mut encoder = GzEncoder::new(
        Vec::with_capacity(bytes.len() / 2),
        Compression::default(),
    );
    encoder.write_all(bytes).ok()?;
    let encoded = encoder.finish().ok()?;
    (encoded.len() < bytes.len()).then_some(encoded)
}

// ============================================================================
// Plain responses (non-artifact paths)
// ============================================================================

/// Respond with a build failure (500). A broken bundle fails loudly to the
/// client instead of silently serving nothing.
pub fn respond_build_error(request: Request, message: &str) -> Result<()> {
    respond_plain(request, 500, &format!("Build failed:\n\n{message}\n"))
}

/// Respond with 404 for paths no bundle is mounted at.
pub fn respond_not_found(request: Request) -> Result<()> {
    respond_plain(request, 404, "404 Not Found")
}

/// Respond with 503 (server starting up or shutting down).
pub fn respond_unavailable(request: Request) -> Result<()> {
    respond_plain(request, 503, "503 Service Unavailable")
}

fn respond_plain(request: Request, status: u16, body: &str) -> Result<()> {
    let response = Response::from_string(body)
        .with_status_code(StatusCode(status))
        .with_header(header("Content-Type", "text/plain; charset=utf-8")?);
    request.respond(response)?;
    Ok(())
}

// ============================================================================
// Request header negotiation
// ============================================================================

fn accepts_gzip(request: &Request) -> bool {
    header_value(request, "accept-encoding")
        .is_some_and(|value| accepts_gzip_value(&value))
}

fn if_none_match(request: &Request) -> Option<String> {
    header_value(request, "if-none-match")
}

fn header_value(request: &Request, field: &str) -> Option<String> {
    request
        .headers()
        .iter()
        .find(|h| h.field.as_str().as_str().eq_ignore_ascii_case(field))
        .map(|h| h.value.to_string())
}

/// Parse an `Accept-Encoding` value for a usable gzip coding.
fn accepts_gzip_value(value: &str) -> bool {
    value.split(',').any(|token| {
        let mut parts = token.trim().split(';');
        let coding = parts.next().unwrap_or("").trim();
        if coding != "gzip" && coding != "*" {
            return false;
        }
        // `gzip;q=0` means "never"
        !parts.any(|p| p.trim().eq_ignore_ascii_case("q=0"))
    })
}

/// Compare an `If-None-Match` value against our ETag.
fn etag_matches(value: &str, etag: &str) -> bool {
    value.trim() == "*" || value.split(',').any(|t| t.trim() == etag)
}

// ============================================================================
// Tests
// ============================================================================

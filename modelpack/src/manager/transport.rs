//! HTTP transport with manual redirect following and byte-range support.
//!
//! A single request hop goes through the [`HttpSend`] trait so tests can
//! script responses without a network. [`Transport`] layers redirect
//! handling and status classification on top of it.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use futures::{Stream, StreamExt, TryStreamExt};
use reqwest::header::{HeaderMap, CONTENT_LENGTH, CONTENT_RANGE, LOCATION};
use reqwest::{redirect, Client, Url};
use tracing::debug;

use super::error::{ManagerError, ManagerResult};

/// Boxed future for dyn-compatible async trait methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Streamed response body.
pub type BodyStream = Pin<Box<dyn Stream<Item = ManagerResult<Bytes>> + Send>>;

/// Default redirect hop limit.
pub const DEFAULT_MAX_REDIRECTS: usize = 10;

/// User agent sent with every request.
pub const USER_AGENT: &str = concat!("modelpack/", env!("CARGO_PKG_VERSION"));

/// Statuses returned to the caller rather than treated as errors.
const ACCEPTED_STATUSES: [u16; 3] = [200, 206, 416];

/// Statuses followed as redirects.
const REDIRECT_STATUSES: [u16; 5] = [301, 302, 303, 307, 308];

/// HTTP methods the installer needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Head,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Head => "HEAD",
        }
    }
}

/// One logical HTTP request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: Vec<(String, String)>,
}

impl HttpRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: HttpMethod::Get,
            url: url.into(),
            headers: Vec::new(),
        }
    }

    pub fn head(url: impl Into<String>) -> Self {
        Self {
            method: HttpMethod::Head,
            url: url.into(),
            headers: Vec::new(),
        }
    }

    /// Add a header.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Add several headers.
    pub fn with_headers(mut self, headers: &[(String, String)]) -> Self {
        self.headers.extend_from_slice(headers);
        self
    }

    /// Request bytes from `offset` to the end.
    pub fn with_range_from(self, offset: u64) -> Self {
        self.with_header("Range", format!("bytes={}-", offset))
    }

    /// Look up a header value, ignoring name case.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Start offset of an open-ended `Range: bytes=N-` header.
    pub fn range_start(&self) -> Option<u64> {
        self.header("range")?
            .strip_prefix("bytes=")?
            .strip_suffix('-')?
            .parse()
            .ok()
    }

    fn without_header(mut self, name: &str) -> Self {
        self.headers.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
        self
    }
}

/// A response whose body has not been read yet.
pub struct HttpResponse {
    pub status: u16,
    /// URL that produced this response after redirects.
    pub final_url: String,
    pub headers: HeaderMap,
    pub body: BodyStream,
}

impl HttpResponse {
    pub fn new(
        status: u16,
        final_url: impl Into<String>,
        headers: HeaderMap,
        body: BodyStream,
    ) -> Self {
        Self {
            status,
            final_url: final_url.into(),
            headers,
            body,
        }
    }

    /// Parsed `Content-Length` header.
    pub fn content_length(&self) -> Option<u64> {
        self.headers
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.trim().parse().ok())
    }

    /// Parsed `Content-Range` header.
    pub fn content_range(&self) -> Option<ContentRange> {
        self.headers
            .get(CONTENT_RANGE)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_content_range)
    }

    /// Raw `Location` header.
    pub fn location(&self) -> Option<&str> {
        self.headers.get(LOCATION).and_then(|v| v.to_str().ok())
    }

    /// Read the whole body into memory, failing past `limit` bytes.
    pub async fn bytes(mut self, limit: usize) -> ManagerResult<Vec<u8>> {
        let mut data = Vec::new();
        while let Some(chunk) = self.body.next().await {
            let chunk = chunk?;
            if data.len() + chunk.len() > limit {
                return Err(ManagerError::Protocol {
                    url: self.final_url,
                    reason: format!("response body exceeds {} bytes", limit),
                });
            }
            data.extend_from_slice(&chunk);
        }
        Ok(data)
    }
}

impl fmt::Debug for HttpResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpResponse")
            .field("status", &self.status)
            .field("final_url", &self.final_url)
            .field("headers", &self.headers)
            .finish_non_exhaustive()
    }
}

/// A parsed `Content-Range: bytes start-end/total` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContentRange {
    /// First byte, absent for `bytes */total`.
    pub start: Option<u64>,
    /// Last byte (inclusive).
    pub end: Option<u64>,
    /// Complete resource length, absent for `/*`.
    pub total: Option<u64>,
}

/// Parse a `Content-Range` value.
pub fn parse_content_range(value: &str) -> Option<ContentRange> {
    let rest = value.trim().strip_prefix("bytes")?.trim_start();
    let (range, total) = rest.split_once('/')?;

    let total = match total.trim() {
        "*" => None,
        t => Some(t.parse().ok()?),
    };

    let (start, end) = match range.trim() {
        "*" => (None, None),
        r => {
            let (s, e) = r.split_once('-')?;
            (Some(s.trim().parse().ok()?), Some(e.trim().parse().ok()?))
        }
    };

    Some(ContentRange { start, end, total })
}

/// Sends exactly one HTTP request without following redirects.
pub trait HttpSend: Send + Sync {
    fn send<'a>(&'a self, request: &'a HttpRequest) -> BoxFuture<'a, ManagerResult<HttpResponse>>;
}

/// [`HttpSend`] backed by an async reqwest client.
#[derive(Debug, Clone)]
pub struct ReqwestSend {
    client: Client,
    timeout: Duration,
}

impl ReqwestSend {
    /// Create a sender.
    ///
    /// `timeout` bounds each request including reading its body.
    /// `read_timeout` bounds each wait for more bytes, so a stalled socket
    /// fails with a retryable [`ManagerError::Timeout`].
    pub fn new(
        timeout: Duration,
        connect_timeout: Duration,
        read_timeout: Duration,
    ) -> ManagerResult<Self> {
        let client = Client::builder()
            .redirect(redirect::Policy::none())
            .timeout(timeout)
            .connect_timeout(connect_timeout)
            .read_timeout(read_timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| {
                ManagerError::InvalidConfig(format!("failed to create HTTP client: {}", e))
            })?;

        Ok(Self { client, timeout })
    }
}

fn map_reqwest_error(url: &str, timeout: Duration, e: reqwest::Error) -> ManagerError {
    if e.is_timeout() {
        ManagerError::Timeout {
            url: url.to_string(),
            timeout_secs: timeout.as_secs(),
        }
    } else if e.is_builder() {
        ManagerError::Protocol {
            url: url.to_string(),
            reason: e.to_string(),
        }
    } else {
        ManagerError::Transport {
            url: url.to_string(),
            status: e.status().map(|s| s.as_u16()),
            reason: e.to_string(),
        }
    }
}

impl HttpSend for ReqwestSend {
    fn send<'a>(&'a self, request: &'a HttpRequest) -> BoxFuture<'a, ManagerResult<HttpResponse>> {
        Box::pin(async move {
            let method = match request.method {
                HttpMethod::Get => reqwest::Method::GET,
                HttpMethod::Head => reqwest::Method::HEAD,
            };

            let mut builder = self.client.request(method, &request.url);
            for (name, value) in &request.headers {
                builder = builder.header(name.as_str(), value.as_str());
            }

            let response = builder
                .send()
                .await
                .map_err(|e| map_reqwest_error(&request.url, self.timeout, e))?;

            let status = response.status().as_u16();
            let final_url = response.url().to_string();
            let headers = response.headers().clone();

            let url = request.url.clone();
            let timeout = self.timeout;
            let body = response
                .bytes_stream()
                .map_err(move |e| map_reqwest_error(&url, timeout, e));

            Ok(HttpResponse::new(status, final_url, headers, Box::pin(body)))
        })
    }
}

/// Redirect-following transport.
#[derive(Clone)]
pub struct Transport {
    sender: Arc<dyn HttpSend>,
    max_redirects: usize,
}

impl Transport {
    pub fn new(sender: Arc<dyn HttpSend>, max_redirects: usize) -> Self {
        Self {
            sender,
            max_redirects,
        }
    }

    pub fn max_redirects(&self) -> usize {
        self.max_redirects
    }

    /// Perform a request, following redirects.
    ///
    /// Returns responses with status 200, 206 or 416. Every hop re-issues the
    /// original method and headers; `Authorization` is dropped once the
    /// chain leaves the original host.
    pub async fn fetch(&self, request: HttpRequest) -> ManagerResult<HttpResponse> {
        let origin = request.url.clone();
        let origin_host = host_of(&origin);
        let mut current = request;
        let mut hops = 0;

        loop {
            let response = self.sender.send(&current).await?;
            let status = response.status;

            if ACCEPTED_STATUSES.contains(&status) {
                return Ok(response);
            }

            if !REDIRECT_STATUSES.contains(&status) {
                return Err(ManagerError::status(&current.url, status));
            }

            if hops >= self.max_redirects {
                return Err(ManagerError::TooManyRedirects {
                    url: origin,
                    limit: self.max_redirects,
                });
            }

            let next = resolve_location(&current.url, response.location())?;
            debug!(from = %current.url, to = %next, status, "following redirect");

            let crossed_host = host_of(&next) != origin_host;
            current.url = next;
            if crossed_host {
                current = current.without_header("authorization");
            }
            hops += 1;
        }
    }

    /// `HEAD` a URL, returning its `Content-Length` when it exists.
    pub async fn content_length(
        &self,
        url: &str,
        headers: &[(String, String)],
    ) -> ManagerResult<Option<u64>> {
        let response = self
            .fetch(HttpRequest::head(url).with_headers(headers))
            .await?;
        Ok(response.content_length().filter(|len| *len > 0))
    }
}

impl fmt::Debug for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transport")
            .field("max_redirects", &self.max_redirects)
            .finish_non_exhaustive()
    }
}

fn host_of(url: &str) -> Option<String> {
    Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_ascii_lowercase))
}

fn resolve_location(current: &str, location: Option<&str>) -> ManagerResult<String> {
    let location = location
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .ok_or_else(|| ManagerError::Protocol {
            url: current.to_string(),
            reason: "redirect without Location header".to_string(),
        })?;

    let base = Url::parse(current).map_err(|e| ManagerError::Protocol {
        url: current.to_string(),
        reason: format!("invalid request URL: {}", e),
    })?;

    base.join(location)
        .map(|u| u.to_string())
        .map_err(|e| ManagerError::Protocol {
            url: current.to_string(),
            reason: format!("invalid redirect location '{}': {}", location, e),
        })
}

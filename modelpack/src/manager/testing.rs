//! Scripted in-process HTTP sender for unit tests.
//!
//! Serves registered byte blobs with real `Range` semantics, answers
//! configured redirects and statuses, and injects one-shot faults into
//! subsequent `GET`s of a URL.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use bytes::Bytes;
use futures::StreamExt;
use parking_lot::Mutex;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use tokio_util::sync::CancellationToken;

use super::context::RunContext;
use super::error::{ManagerError, ManagerResult};
use super::events::EventLog;
use super::transport::{BodyStream, BoxFuture, HttpMethod, HttpRequest, HttpResponse, HttpSend};

const CHUNK_SIZE: usize = 64 * 1024;

/// A one-shot failure applied to the next `GET` of a URL.
#[derive(Debug, Clone)]
pub enum Fault {
    /// Serve normally but cut the body after this many bytes.
    DropAfter(usize),
    /// Fail before any response.
    ConnectError,
    /// Fail with a timeout before any response.
    Timeout,
    /// Answer with this status and an empty body.
    Status(u16),
    /// Answer 200 with the full body even when a range was requested.
    IgnoreRange,
    /// Answer 206 but claim the range starts at zero.
    WrongContentRange,
    /// Never answer.
    Hang,
    /// Answer 200, send this many bytes, then go silent.
    StallAfter(usize),
}

#[derive(Default)]
struct State {
    files: HashMap<String, Bytes>,
    redirects: HashMap<String, String>,
    statuses: HashMap<String, u16>,
    faults: HashMap<String, VecDeque<Fault>>,
    requests: Vec<HttpRequest>,
}

/// Scripted [`HttpSend`] implementation.
#[derive(Default)]
pub struct ScriptedSender {
    state: Mutex<State>,
}

impl ScriptedSender {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `data` at `url` with range support.
    pub fn serve(&self, url: &str, data: Vec<u8>) {
        self.state.lock().files.insert(url.to_string(), Bytes::from(data));
    }

    /// Answer `url` with a 302 to `location`; empty means no `Location` header.
    pub fn redirect(&self, url: &str, location: &str) {
        self.state
            .lock()
            .redirects
            .insert(url.to_string(), location.to_string());
    }

    /// Answer every request for `url` with `status`.
    pub fn status(&self, url: &str, status: u16) {
        self.state.lock().statuses.insert(url.to_string(), status);
    }

    /// Queue a fault for the next `GET` of `url`.
    pub fn fault(&self, url: &str, fault: Fault) {
        self.state
            .lock()
            .faults
            .entry(url.to_string())
            .or_default()
            .push_back(fault);
    }

    /// Every request received so far.
    pub fn requests(&self) -> Vec<HttpRequest> {
        self.state.lock().requests.clone()
    }

    /// Requests received for `url` with `method`.
    pub fn requests_for(&self, method: HttpMethod, url: &str) -> Vec<HttpRequest> {
        self.state
            .lock()
            .requests
            .iter()
            .filter(|r| r.method == method && r.url == url)
            .cloned()
            .collect()
    }

    fn respond(&self, request: &HttpRequest) -> ManagerResult<HttpResponse> {
        let mut state = self.state.lock();
        state.requests.push(request.clone());

        let url = request.url.as_str();
        let fault = if request.method == HttpMethod::Get {
            state.faults.get_mut(url).and_then(VecDeque::pop_front)
        } else {
            None
        };

        match fault {
            Some(Fault::ConnectError) => {
                return Err(ManagerError::Transport {
                    url: url.to_string(),
                    status: None,
                    reason: "connection refused".to_string(),
                })
            }
            Some(Fault::Timeout) => {
                return Err(ManagerError::Timeout {
                    url: url.to_string(),
                    timeout_secs: 1,
                })
            }
            Some(Fault::Status(code)) => return Ok(empty(code, url, &[])),
            Some(Fault::StallAfter(n)) => {
                if let Some(data) = state.files.get(url).cloned() {
                    let head = data.slice(..n.min(data.len()));
                    let first: ManagerResult<Bytes> = Ok(head);
                    let body = futures::stream::iter([first]).chain(futures::stream::pending());
                    let headers = header_map(&[("content-length", data.len().to_string())]);
                    return Ok(HttpResponse::new(200, url, headers, Box::pin(body)));
                }
            }
            _ => {}
        }

        if let Some(location) = state.redirects.get(url) {
            let headers: Vec<(&str, String)> = if location.is_empty() {
                Vec::new()
            } else {
                vec![("location", location.clone())]
            };
            return Ok(empty(302, url, &headers));
        }

        if let Some(code) = state.statuses.get(url) {
            return Ok(empty(*code, url, &[]));
        }

        let Some(data) = state.files.get(url).cloned() else {
            return Ok(empty(404, url, &[]));
        };
        let len = data.len() as u64;

        if request.method == HttpMethod::Head {
            return Ok(empty(200, url, &[("content-length", len.to_string())]));
        }

        let drop_after = match fault {
            Some(Fault::DropAfter(n)) => Some(n),
            _ => None,
        };
        let range = match fault {
            Some(Fault::IgnoreRange) => None,
            _ => request.range_start(),
        };

        match range {
            Some(start) if start >= len => Ok(empty(
                416,
                url,
                &[("content-range", format!("bytes */{}", len))],
            )),
            Some(start) => {
                let claimed = match fault {
                    Some(Fault::WrongContentRange) => 0,
                    _ => start,
                };
                let body = data.slice(start as usize..);
                Ok(response(
                    206,
                    url,
                    &[
                        ("content-length", (len - start).to_string()),
                        (
                            "content-range",
                            format!("bytes {}-{}/{}", claimed, len - 1, len),
                        ),
                    ],
                    body,
                    drop_after,
                ))
            }
            None => Ok(response(
                200,
                url,
                &[("content-length", len.to_string())],
                data,
                drop_after,
            )),
        }
    }
}

impl HttpSend for ScriptedSender {
    fn send<'a>(&'a self, request: &'a HttpRequest) -> BoxFuture<'a, ManagerResult<HttpResponse>> {
        Box::pin(async move {
            if self.take_hang(request) {
                return futures::future::pending().await;
            }
            self.respond(request)
        })
    }
}

impl ScriptedSender {
    /// Consume a queued [`Fault::Hang`] for `request`, recording the request.
    fn take_hang(&self, request: &HttpRequest) -> bool {
        let mut state = self.state.lock();
        if request.method != HttpMethod::Get {
            return false;
        }
        let queue = state.faults.get_mut(&request.url);
        let hang = match queue {
            Some(queue) if matches!(queue.front(), Some(Fault::Hang)) => {
                queue.pop_front();
                true
            }
            _ => false,
        };
        if hang {
            state.requests.push(request.clone());
        }
        hang
    }
}

fn header_map(headers: &[(&str, String)]) -> HeaderMap {
    let mut map = HeaderMap::new();
    for (name, value) in headers {
        map.insert(
            HeaderName::from_bytes(name.as_bytes()).unwrap(),
            HeaderValue::from_str(value).unwrap(),
        );
    }
    map
}

fn empty(status: u16, url: &str, headers: &[(&str, String)]) -> HttpResponse {
    response(status, url, headers, Bytes::new(), None)
}

fn response(
    status: u16,
    url: &str,
    headers: &[(&str, String)],
    data: Bytes,
    drop_after: Option<usize>,
) -> HttpResponse {
    HttpResponse::new(status, url, header_map(headers), body_stream(url, data, drop_after))
}

/// Chunked body stream that optionally fails after `drop_after` bytes.
pub fn body_stream(url: &str, data: Bytes, drop_after: Option<usize>) -> BodyStream {
    let limit = drop_after.unwrap_or(data.len()).min(data.len());
    let mut items: Vec<ManagerResult<Bytes>> = Vec::new();

    let mut offset = 0;
    while offset < limit {
        let end = (offset + CHUNK_SIZE).min(limit);
        items.push(Ok(data.slice(offset..end)));
        offset = end;
    }
    if limit < data.len() {
        items.push(Err(ManagerError::Transport {
            url: url.to_string(),
            status: None,
            reason: "connection reset by peer".to_string(),
        }));
    }

    Box::pin(futures::stream::iter(items))
}

/// Deterministic test payload of `len` bytes.
pub fn payload(len: usize, seed: u8) -> Vec<u8> {
    (0..len)
        .map(|i| (i as u8).wrapping_mul(31).wrapping_add(seed))
        .collect()
}

/// A fresh run context recording into an [`EventLog`].
pub fn context() -> (RunContext, Arc<EventLog>) {
    let log = Arc::new(EventLog::new());
    let ctx = RunContext::new(CancellationToken::new()).with_observer(log.clone());
    (ctx, log)
}

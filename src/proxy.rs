//! # Pass-through Proxy
//!
//! A small HTTP forwarder for browsers that cannot reach an API directly
//! because of CORS. Every request to the proxy endpoint carries the real
//! target in its `url` query parameter:
//!
//! ```text
//! GET /api/proxy?url=https%3A%2F%2Fpetstore3.swagger.io%2Fapi%2Fv3%2Fopenapi.json
//! ```
//!
//! Method, headers and body are forwarded to the target (redirects followed)
//! and the upstream status, headers and body are streamed back unmodified.
//!
//! ## Threading
//!
//! The listener is a [`tiny_http::Server`] shared by a fixed number of worker
//! threads. Each worker pulls requests with a short timeout so a stop request
//! is noticed promptly, and forwards them with a blocking `reqwest` client.
//! No async runtime is involved.

use std::fmt;
use std::io::{self, Read};
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{debug, error, info, warn};
use url::Url;

const RECV_TIMEOUT: Duration = Duration::from_millis(100);

/// Headers that describe a single hop and are never forwarded.
const HOP_BY_HOP: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

/// Rejected proxy input. Always answered with a 400 and no forwarding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProxyError {
    MissingUrl,
    InvalidUrl,
    UnsupportedScheme(String),
}

impl fmt::Display for ProxyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProxyError::MissingUrl => write!(f, "Missing url query parameter."),
            ProxyError::InvalidUrl => write!(f, "Invalid url query parameter."),
            ProxyError::UnsupportedScheme(_) => {
                write!(f, "Only http and https targets are supported.")
            }
        }
    }
}

impl std::error::Error for ProxyError {}

/// Extract the forwarding target from the query string of a proxy request.
///
/// ```
/// use specdeck::proxy::{resolve_target, ProxyError};
///
/// let target = resolve_target(Some("url=https%3A%2F%2Fapi.example.com%2Fpets")).unwrap();
/// assert_eq!(target.as_str(), "https://api.example.com/pets");
/// assert_eq!(resolve_target(Some("url=")), Err(ProxyError::MissingUrl));
/// ```
pub fn resolve_target(query: Option<&str>) -> Result<Url, ProxyError> {
    let raw = query
        .and_then(|q| {
            url::form_urlencoded::parse(q.as_bytes())
                .find(|(key, _)| key == "url")
                .map(|(_, value)| value.into_owned())
        })
        .filter(|value| !value.is_empty())
        .ok_or(ProxyError::MissingUrl)?;
    let target = Url::parse(&raw).map_err(|_| ProxyError::InvalidUrl)?;
    match target.scheme() {
        "http" | "https" => Ok(target),
        other => Err(ProxyError::UnsupportedScheme(other.to_string())),
    }
}

fn is_forwardable(name: &str) -> bool {
    let name = name.to_ascii_lowercase();
    name != "host" && name != "content-length" && !HOP_BY_HOP.contains(&name.as_str())
}

/// Proxy listener configuration.
#[derive(Debug, Clone)]
pub struct ProxyServer {
    path: String,
    workers: usize,
}

impl Default for ProxyServer {
    fn default() -> Self {
        ProxyServer {
            path: crate::runtime_config::DEFAULT_PROXY_PATH.to_string(),
            workers: crate::runtime_config::DEFAULT_PROXY_WORKERS,
        }
    }
}

impl ProxyServer {
    pub fn new(path: impl Into<String>, workers: usize) -> Self {
        ProxyServer {
            path: path.into(),
            workers: workers.max(1),
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Bind `addr` and start the worker threads.
    ///
    /// # Errors
    ///
    /// Fails when the address cannot be resolved or bound, or the upstream
    /// client cannot be built.
    pub fn start<A: ToSocketAddrs>(self, addr: A) -> io::Result<ProxyHandle> {
        let addr = addr
            .to_socket_addrs()?
            .next()
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "invalid address"))?;
        let server = tiny_http::Server::http(addr).map_err(io::Error::other)?;
        let addr = server.server_addr().to_ip().unwrap_or(addr);
        let client = reqwest::blocking::Client::builder()
            .build()
            .map_err(io::Error::other)?;

        let server = Arc::new(server);
        let stopping = Arc::new(AtomicBool::new(false));
        let mut workers = Vec::with_capacity(self.workers);
        for index in 0..self.workers {
            let worker = Worker {
                server: Arc::clone(&server),
                stopping: Arc::clone(&stopping),
                client: client.clone(),
                path: self.path.clone(),
            };
            let handle = thread::Builder::new()
                .name(format!("specdeck-proxy-{index}"))
                .spawn(move || worker.run())?;
            workers.push(handle);
        }
        info!(%addr, path = %self.path, workers = self.workers, "proxy listening");
        Ok(ProxyHandle {
            addr,
            server,
            stopping,
            workers,
        })
    }
}

/// Handle to a running proxy.
pub struct ProxyHandle {
    addr: SocketAddr,
    server: Arc<tiny_http::Server>,
    stopping: Arc<AtomicBool>,
    workers: Vec<JoinHandle<()>>,
}

impl ProxyHandle {
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Poll the listener until it accepts connections (~250ms).
    pub fn wait_ready(&self) -> io::Result<()> {
        for _ in 0..50 {
            if TcpStream::connect(self.addr).is_ok() {
                return Ok(());
            }
            thread::sleep(Duration::from_millis(5));
        }
        Err(io::Error::new(io::ErrorKind::TimedOut, "proxy not ready"))
    }

    /// Stop accepting requests and join the workers.
    ///
    /// Requests already being forwarded run to completion.
    pub fn stop(self) {
        self.stopping.store(true, Ordering::SeqCst);
        for _ in &self.workers {
            self.server.unblock();
        }
        for worker in self.workers {
            if worker.join().is_err() {
                error!("proxy worker panicked");
            }
        }
        info!(addr = %self.addr, "proxy stopped");
    }
}

impl fmt::Debug for ProxyHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProxyHandle")
            .field("addr", &self.addr)
            .field("workers", &self.workers.len())
            .finish_non_exhaustive()
    }
}

struct Worker {
    server: Arc<tiny_http::Server>,
    stopping: Arc<AtomicBool>,
    client: reqwest::blocking::Client,
    path: String,
}

impl Worker {
    fn run(self) {
        while !self.stopping.load(Ordering::SeqCst) {
            match self.server.recv_timeout(RECV_TIMEOUT) {
                Ok(Some(request)) => self.handle(request),
                Ok(None) => {}
                Err(err) => {
                    if !self.stopping.load(Ordering::SeqCst) {
                        warn!(error = %err, "proxy accept failed");
                    }
                }
            }
        }
    }

    fn handle(&self, mut request: tiny_http::Request) {
        let started = Instant::now();
        let method = request.method().as_str().to_string();
        let (path, query) = match request.url().split_once('?') {
            Some((path, query)) => (path.to_string(), Some(query.to_string())),
            None => (request.url().to_string(), None),
        };

        if path != self.path {
            debug!(%method, %path, "proxy path not found");
            respond(request, text_response(404, "Not found."));
            return;
        }

        let target = match resolve_target(query.as_deref()) {
            Ok(target) => target,
            Err(err) => {
                debug!(%method, error = %err, "rejected proxy request");
                respond(request, text_response(400, &err.to_string()));
                return;
            }
        };

        match self.forward(&mut request, &method, &target) {
            Ok(upstream) => {
                let status = upstream.status().as_u16();
                info!(
                    %method,
                    target = %target,
                    status,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "proxy request"
                );
                respond(request, stream_response(upstream));
            }
            Err(err) => {
                warn!(%method, target = %target, error = %err, "upstream request failed");
                respond(
                    request,
                    text_response(502, &format!("Upstream request failed: {err}")),
                );
            }
        }
    }

    fn forward(
        &self,
        request: &mut tiny_http::Request,
        method: &str,
        target: &Url,
    ) -> Result<reqwest::blocking::Response, reqwest::Error> {
        let upstream_method = reqwest::Method::from_bytes(method.as_bytes())
            .unwrap_or(reqwest::Method::GET);
        let mut headers = reqwest::header::HeaderMap::new();
        for header in request.headers() {
            let name = header.field.as_str().as_str();
            if !is_forwardable(name) {
                continue;
            }
            let parsed = (
                reqwest::header::HeaderName::from_bytes(name.as_bytes()),
                reqwest::header::HeaderValue::from_str(header.value.as_str()),
            );
            if let (Ok(name), Ok(value)) = parsed {
                headers.append(name, value);
            }
        }

        let mut builder = self
            .client
            .request(upstream_method.clone(), target.clone())
            .headers(headers);
        if upstream_method != reqwest::Method::GET && upstream_method != reqwest::Method::HEAD {
            let mut body = Vec::new();
            if let Err(err) = request.as_reader().read_to_end(&mut body) {
                warn!(error = %err, "failed to read proxied request body");
            }
            builder = builder.body(body);
        }
        builder.send()
    }
}

fn respond<R: Read>(request: tiny_http::Request, response: tiny_http::Response<R>) {
    if let Err(err) = request.respond(response) {
        debug!(error = %err, "client went away before the proxy response was sent");
    }
}

fn text_response(status: u16, body: &str) -> tiny_http::Response<io::Cursor<Vec<u8>>> {
    tiny_http::Response::from_string(body).with_status_code(status)
}

fn stream_response(
    upstream: reqwest::blocking::Response,
) -> tiny_http::Response<reqwest::blocking::Response> {
    let status = tiny_http::StatusCode(upstream.status().as_u16());
    let headers = upstream
        .headers()
        .iter()
        .filter(|(name, _)| is_forwardable(name.as_str()))
        .filter_map(|(name, value)| {
            tiny_http::Header::from_bytes(name.as_str().as_bytes(), value.as_bytes()).ok()
        })
        .collect();
    let length = upstream
        .content_length()
        .and_then(|len| usize::try_from(len).ok());
    tiny_http::Response::new(status, headers, upstream, length, None)
}

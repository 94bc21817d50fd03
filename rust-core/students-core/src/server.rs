//! # HTTP Server
//!
//! HTTP/1 server built on Hyper and Tokio.
//!
//! ## Key Features
//!
//! - One task per connection; a slow query only parks its own request
//! - Graceful shutdown: open connections finish their current request and
//!   close, bounded by the configured timeout
//! - Handler errors mapped to status codes in one place
//! - Socket-free dispatch through [`Server::test_request`]

use crate::config::ServerConfig;
use crate::error::{Error, Result};
use crate::middleware::{Middleware, MiddlewareChain};
use crate::router::{join_path, Method, Router};
use http_body_util::Full;
pub use hyper::body::Bytes;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{error, info, warn};

pub use crate::request::HttpRequest;

const JSON: &str = "application/json";

/// HTTP Response produced by handlers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    /// HTTP status code
    pub status: u16,
    /// Response body
    pub body: String,
    /// Content type
    pub content_type: String,
    /// Response headers
    pub headers: HashMap<String, String>,
}

impl HttpResponse {
    /// Create a JSON response
    #[must_use]
    pub fn json(body: impl Into<String>) -> Self {
        Self {
            status: 200,
            body: body.into(),
            content_type: JSON.to_string(),
            headers: HashMap::new(),
        }
    }

    /// Serialize `value` into a 200 JSON response
    ///
    /// # Errors
    ///
    /// Returns `Error::Json` if serialization fails
    pub fn json_value<T: serde::Serialize>(value: &T) -> Result<Self> {
        Ok(Self::json(crate::json::to_json(value)?))
    }

    /// Create a text response
    #[must_use]
    pub fn text(body: impl Into<String>) -> Self {
        Self {
            status: 200,
            body: body.into(),
            content_type: "text/plain".to_string(),
            headers: HashMap::new(),
        }
    }

    /// Route-level 404
    #[must_use]
    pub fn not_found() -> Self {
        Self::json(r#"{"error":"Not Found"}"#).with_status(404)
    }

    /// Response for an error that escaped a handler
    ///
    /// Server-side failures carry no detail, only the status text.
    #[must_use]
    pub fn from_error(err: &Error) -> Self {
        let status = err.status_code();
        if status == StatusCode::NOT_FOUND {
            return Self::not_found();
        }
        Self::text(status.canonical_reason().unwrap_or("Error")).with_status(status.as_u16())
    }

    /// Set status code
    #[must_use]
    pub fn with_status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }

    /// Set or override a header
    pub fn set_header(&mut self, key: &str, value: &str) {
        if key.eq_ignore_ascii_case("content-type") {
            self.content_type = value.to_string();
        } else {
            self.headers.insert(key.to_string(), value.to_string());
        }
    }

    /// Parse the body as JSON (mainly for tests and clients)
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidBody` if the body is not valid JSON
    pub fn json_body<T: serde::de::DeserializeOwned>(&self) -> Result<T> {
        crate::json::parse_json(&self.body)
    }

    /// Convert to hyper Response
    fn into_hyper(self) -> Response<Full<Bytes>> {
        let status = StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let mut builder = Response::builder().status(status);
        builder = builder.header("Content-Type", &self.content_type);
        for (k, v) in &self.headers {
            builder = builder.header(k.as_str(), v.as_str());
        }

        builder
            .body(Full::new(Bytes::from(self.body)))
            .unwrap_or_else(|e| {
                error!("Failed to build response: {}", e);
                let mut fallback = Response::new(Full::new(Bytes::from("Internal Server Error")));
                *fallback.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
                fallback
            })
    }
}

/// Future returned by a handler
pub type HandlerFuture = Pin<Box<dyn Future<Output = Result<HttpResponse>> + Send>>;

/// Handler function type (async)
///
/// The request is borrowed only while the future is built; anything the
/// future needs must be copied out first.
pub type Handler = Arc<dyn Fn(&HttpRequest) -> HandlerFuture + Send + Sync>;

/// Route table entry produced by a resource module for mounting
pub type RouteDef = (Method, &'static str, Handler);

/// HTTP server: router, handlers and middleware
pub struct Server {
    config: ServerConfig,
    router: Router,
    handlers: Vec<Handler>,
    middleware: MiddlewareChain,
}

impl Server {
    /// Create a new Server instance
    #[must_use]
    pub fn new(config: ServerConfig) -> Self {
        Self {
            config,
            router: Router::new(),
            handlers: Vec::new(),
            middleware: MiddlewareChain::new(),
        }
    }

    /// Add a middleware to the chain
    pub fn add_middleware<M: Middleware + 'static>(&mut self, middleware: M) {
        self.middleware.add(middleware);
    }

    /// Add a route and its handler
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidRoutePattern` if the router rejects the path
    pub fn add_route(&mut self, method: Method, path: &str, handler: Handler) -> Result<()> {
        let handler_id = self.router.add_route(method, path)?;
        debug_assert_eq!(handler_id, self.handlers.len());
        self.handlers.push(handler);
        Ok(())
    }

    /// Add a group of routes under a common path prefix
    ///
    /// # Errors
    ///
    /// Returns the first routing error; routes before it stay registered
    pub fn mount(&mut self, prefix: &str, routes: Vec<RouteDef>) -> Result<()> {
        for (method, path, handler) in routes {
            let full = join_path(prefix, path);
            self.add_route(method, &full, handler)?;
            info!(method = %method, path = %full, "Route mounted");
        }
        Ok(())
    }

    /// Start the server and stop on Ctrl-C
    ///
    /// # Errors
    ///
    /// Returns `Error::BindError` if the listener cannot be set up
    pub async fn serve(&self) -> Result<()> {
        self.serve_with_shutdown(shutdown_signal()).await
    }

    /// Start the server and stop when `signal` completes
    ///
    /// # Errors
    ///
    /// Returns `Error::BindError` if the listener cannot be set up, or
    /// `Error::Io` if accepting a connection fails
    pub async fn serve_with_shutdown<F>(&self, signal: F) -> Result<()>
    where
        F: Future<Output = ()> + Send,
    {
        let addr = self.config.address;
        let bind_err = |source| Error::BindError {
            address: addr.to_string(),
            source,
        };

        let socket = (if addr.is_ipv4() {
            tokio::net::TcpSocket::new_v4()
        } else {
            tokio::net::TcpSocket::new_v6()
        })
        .map_err(bind_err)?;
        socket.set_reuseaddr(true).map_err(bind_err)?;
        socket.bind(addr).map_err(bind_err)?;

        let listener = socket.listen(1024).map_err(bind_err)?;

        info!("Server listening on http://{}", addr);

        let router = Arc::new(self.router.clone());
        let handlers = Arc::new(self.handlers.clone());
        let middleware = Arc::new(self.middleware.clone());
        let active = Arc::new(AtomicUsize::new(0));
        let max_body_size = self.config.max_body_size;
        let (stop_tx, stop_rx) = watch::channel(());

        tokio::pin!(signal);

        loop {
            tokio::select! {
                accept_result = listener.accept() => {
                    let (stream, remote_addr) = accept_result?;
                    let io = TokioIo::new(stream);

                    let router = Arc::clone(&router);
                    let handlers = Arc::clone(&handlers);
                    let middleware = Arc::clone(&middleware);
                    let active = Arc::clone(&active);
                    let mut stop_rx = stop_rx.clone();

                    active.fetch_add(1, Ordering::Relaxed);
                    tokio::task::spawn(async move {
                        let service = service_fn(move |req| {
                            let router = Arc::clone(&router);
                            let handlers = Arc::clone(&handlers);
                            let middleware = Arc::clone(&middleware);
                            async move {
                                let resp =
                                    handle_request(req, &router, &handlers, &middleware, max_body_size)
                                        .await;
                                Ok::<_, std::convert::Infallible>(resp)
                            }
                        });

                        let conn = http1::Builder::new().serve_connection(io, service);
                        tokio::pin!(conn);

                        let mut stopping = false;
                        let served = loop {
                            tokio::select! {
                                result = conn.as_mut() => break result,
                                _ = stop_rx.changed(), if !stopping => {
                                    stopping = true;
                                    conn.as_mut().graceful_shutdown();
                                }
                            }
                        };
                        if let Err(err) = served {
                            error!(remote = %remote_addr, "Error serving connection: {:?}", err);
                        }
                        active.fetch_sub(1, Ordering::Relaxed);
                    });
                }
                () = &mut signal => {
                    info!("Shutdown signal received, stopping server...");
                    break;
                }
            }
        }

        drop(listener);
        let _ = stop_tx.send(());

        let timeout = self.config.shutdown_timeout;
        let drain = async {
            while active.load(Ordering::Relaxed) != 0 {
                tokio::time::sleep(Duration::from_millis(50)).await;
            }
        };
        if tokio::time::timeout(timeout, drain).await.is_err() {
            warn!(
                active = active.load(Ordering::Relaxed),
                "Shutdown timeout elapsed with connections still open"
            );
        }
        Ok(())
    }

    /// Execute a test request directly without network stack
    pub async fn test_request(
        &self,
        method: Method,
        path: impl Into<String>,
        headers: HashMap<String, String>,
        body: Option<Bytes>,
    ) -> HttpResponse {
        if let Some(b) = body.as_ref() {
            if b.len() > self.config.max_body_size {
                return HttpResponse::from_error(&Error::PayloadTooLarge {
                    limit: self.config.max_body_size,
                    actual: b.len(),
                });
            }
        }
        let mut req = HttpRequest::new(method, path, headers, body);

        process_request(&mut req, &self.router, &self.handlers, &self.middleware).await
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to install Ctrl-C handler: {}", e);
        std::future::pending::<()>().await;
    }
}

/// Core request processing logic (network agnostic)
///
/// Middleware observes every request that reaches this point, including
/// the ones that end in a 404.
async fn process_request(
    req: &mut HttpRequest,
    router: &Router,
    handlers: &[Handler],
    middleware: &MiddlewareChain,
) -> HttpResponse {
    if req.header("x-request-id").is_none() {
        let request_id = generate_request_id();
        req.set_header("x-request-id", &request_id);
    }
    middleware.run_request(req);

    let handler = router.match_route(req.method, &req.path).ok().and_then(|matched| {
        req.typed_params = matched.params;
        handlers.get(matched.handler_id)
    });

    let mut response = match handler {
        Some(handler) => match handler(&*req).await {
            Ok(resp) => resp,
            Err(e) => {
                error!(
                    method = %req.method,
                    path = %req.path,
                    error = %e,
                    "Handler failed"
                );
                HttpResponse::from_error(&e)
            }
        },
        None => HttpResponse::not_found(),
    };

    if req.method == Method::Head {
        response.body.clear();
    }
    if let Some(request_id) = req.header("x-request-id") {
        response.set_header("x-request-id", request_id);
    }
    middleware.run_response(req, &response);
    response
}

async fn handle_request(
    req: Request<hyper::body::Incoming>,
    router: &Router,
    handlers: &[Handler],
    middleware: &MiddlewareChain,
    max_body_size: usize,
) -> Response<Full<Bytes>> {
    let Some(method) = Method::from_http(req.method()) else {
        return HttpResponse::not_found().into_hyper();
    };

    let mut http_request = match HttpRequest::from_hyper_with_limit(method, req, max_body_size).await {
        Ok(r) => r,
        Err(e) => {
            warn!("Failed to read request: {}", e);
            let e = match e {
                Error::PayloadTooLarge { .. } => e,
                other => Error::InvalidBody {
                    reason: other.to_string(),
                },
            };
            return HttpResponse::from_error(&e).into_hyper();
        }
    };

    process_request(&mut http_request, router, handlers, middleware)
        .await
        .into_hyper()
}

static REQUEST_COUNTER: AtomicUsize = AtomicUsize::new(1);

fn generate_request_id() -> String {
    use std::time::{SystemTime, UNIX_EPOCH};
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    let counter = REQUEST_COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("{:x}-{:x}", now.as_nanos(), counter)
}

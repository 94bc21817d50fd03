//! # Middleware
//!
//! Observers invoked for every request the server reads, whether or not a
//! route matched. They see the request before routing and the final
//! response afterwards; they cannot alter either.

use crate::server::{HttpRequest, HttpResponse};
use std::sync::Arc;
use tracing::{debug, info};

/// Request/response observer
pub trait Middleware: Send + Sync {
    /// Called before routing
    fn on_request(&self, _req: &HttpRequest) {}

    /// Called with the response about to be written
    fn on_response(&self, _req: &HttpRequest, _res: &HttpResponse) {}

    /// Middleware name for logging
    fn name(&self) -> &'static str;
}

/// Ordered set of middlewares; responses are observed in reverse order
#[derive(Default, Clone)]
pub struct MiddlewareChain {
    middlewares: Vec<Arc<dyn Middleware>>,
}

impl MiddlewareChain {
    /// Create a new empty middleware chain
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a middleware to the chain
    pub fn add<M: Middleware + 'static>(&mut self, middleware: M) {
        debug!(middleware = middleware.name(), "Middleware registered");
        self.middlewares.push(Arc::new(middleware));
    }

    pub(crate) fn run_request(&self, req: &HttpRequest) {
        for mw in &self.middlewares {
            mw.on_request(req);
        }
    }

    pub(crate) fn run_response(&self, req: &HttpRequest, res: &HttpResponse) {
        for mw in self.middlewares.iter().rev() {
            mw.on_response(req, res);
        }
    }
}

/// One structured event per request and per response, with timing
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingMiddleware;

impl Middleware for LoggingMiddleware {
    fn on_request(&self, req: &HttpRequest) {
        info!(
            method = %req.method,
            path = %req.path,
            request_id = req.header("x-request-id").unwrap_or("-"),
            "Request received"
        );
    }

    fn on_response(&self, req: &HttpRequest, res: &HttpResponse) {
        info!(
            method = %req.method,
            path = %req.path,
            status = res.status,
            request_id = req.header("x-request-id").unwrap_or("-"),
            duration_ms = %req.elapsed().as_millis(),
            "Response sent"
        );
    }

    fn name(&self) -> &'static str {
        "LoggingMiddleware"
    }
}

//! # Router
//!
//! Radix-trie based router using `matchit`, one trie per HTTP method.
//!
//! ## Features
//!
//! - Path parameter extraction (`/students/{id}`)
//! - Integer parameters (`/students/{id:int}`)
//! - Prefix mounting through [`join_path`]
//! - Trailing slashes on request paths are ignored
//! - `HEAD` is answered by the `GET` route when it has none of its own

use crate::error::{Error, Result};
use crate::types::ParamValue;
use matchit::Router as MatchitRouter;
use std::collections::HashMap;

/// HTTP methods supported by the router
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    /// HTTP GET
    Get,
    /// HTTP POST
    Post,
    /// HTTP PUT
    Put,
    /// HTTP DELETE
    Delete,
    /// HTTP PATCH
    Patch,
    /// HTTP HEAD
    Head,
    /// HTTP OPTIONS
    Options,
}

impl Method {
    /// Map a hyper method; extension methods have no route and yield `None`
    #[must_use]
    pub fn from_http(method: &hyper::Method) -> Option<Self> {
        match *method {
            hyper::Method::GET => Some(Self::Get),
            hyper::Method::POST => Some(Self::Post),
            hyper::Method::PUT => Some(Self::Put),
            hyper::Method::DELETE => Some(Self::Delete),
            hyper::Method::PATCH => Some(Self::Patch),
            hyper::Method::HEAD => Some(Self::Head),
            hyper::Method::OPTIONS => Some(Self::Options),
            _ => None,
        }
    }
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
            Self::Patch => "PATCH",
            Self::Head => "HEAD",
            Self::Options => "OPTIONS",
        })
    }
}

/// Route handler identifier
pub type HandlerId = usize;

/// Matched route with its captured parameters
#[derive(Debug)]
pub struct Match {
    /// The handler ID for this route
    pub handler_id: HandlerId,
    /// Path parameters, percent-decoded and typed
    pub params: HashMap<String, ParamValue>,
}

/// Value stored in the trie for each registered pattern
#[derive(Debug, Clone)]
struct Endpoint {
    handler_id: HandlerId,
    /// Parameters declared as `{name:int}`
    int_params: Vec<String>,
}

/// Method + path dispatch table
#[derive(Clone, Default)]
pub struct Router {
    tries: HashMap<Method, MatchitRouter<Endpoint>>,
    next_handler_id: HandlerId,
}

impl Router {
    /// Create a new empty router
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a route with the given method and path pattern
    ///
    /// Handler IDs are assigned sequentially across all methods and only
    /// advance when registration succeeds.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidRoutePattern` if the pattern is malformed or
    /// conflicts with an existing route
    pub fn add_route(&mut self, method: Method, path: &str) -> Result<HandlerId> {
        let handler_id = self.next_handler_id;
        let (pattern, int_params) = compile_pattern(path);

        self.tries
            .entry(method)
            .or_insert_with(MatchitRouter::new)
            .insert(pattern, Endpoint { handler_id, int_params })
            .map_err(|e| Error::InvalidRoutePattern {
                pattern: path.to_string(),
                reason: e.to_string(),
            })?;

        self.next_handler_id += 1;
        Ok(handler_id)
    }

    /// Match a request path against registered routes
    ///
    /// # Errors
    ///
    /// Returns `Error::RouteNotFound` if no route exists for the method/path
    pub fn match_route(&self, method: Method, path: &str) -> Result<Match> {
        let trimmed = path.trim_end_matches('/');
        let lookup = if trimmed.is_empty() { "/" } else { trimmed };

        self.lookup(method, lookup)
            .or_else(|| match method {
                Method::Head => self.lookup(Method::Get, lookup),
                _ => None,
            })
            .ok_or_else(|| Error::RouteNotFound {
                path: path.to_string(),
            })
    }

    fn lookup(&self, method: Method, path: &str) -> Option<Match> {
        let matched = self.tries.get(&method)?.at(path).ok()?;
        let endpoint = matched.value;

        let params = matched
            .params
            .iter()
            .map(|(name, raw)| {
                let as_int = endpoint.int_params.iter().any(|p| p == name);
                (name.to_string(), ParamValue::capture(raw, as_int))
            })
            .collect();

        Some(Match {
            handler_id: endpoint.handler_id,
            params,
        })
    }
}

/// Rewrite `{name:int}` to matchit's `{name}` and collect the int names
///
/// Empty segments are dropped, so `/students/` registers as `/students`.
fn compile_pattern(path: &str) -> (String, Vec<String>) {
    let mut int_params = Vec::new();
    let segments: Vec<String> = path
        .split('/')
        .filter(|segment| !segment.is_empty())
        .map(|segment| match segment.strip_prefix('{').and_then(|s| s.strip_suffix('}')) {
            Some(inner) => {
                let (name, kind) = inner.split_once(':').unwrap_or((inner, ""));
                if kind.eq_ignore_ascii_case("int") {
                    int_params.push(name.to_string());
                }
                format!("{{{name}}}")
            }
            None => segment.to_string(),
        })
        .collect();

    (format!("/{}", segments.join("/")), int_params)
}

/// Join a mount prefix and a child path
///
/// A child of `/` mounts at the bare prefix: `join_path("/students", "/")`
/// is `/students`.
#[must_use]
pub fn join_path(prefix: &str, path: &str) -> String {
    let prefix = prefix.trim_end_matches('/');
    let path = path.trim_start_matches('/');
    match (prefix.is_empty(), path.is_empty()) {
        (true, true) => "/".to_string(),
        (true, false) => format!("/{path}"),
        (false, true) => prefix.to_string(),
        (false, false) => format!("{prefix}/{path}"),
    }
}

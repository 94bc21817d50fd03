//! # HTTP Request
//!
//! Owned request wrapper handed to handlers: method, path, headers, the
//! collected body and the typed path parameters filled in by the router.

use crate::error::{Error, Result};
use crate::json::parse_json_bytes;
use crate::router::Method;
use crate::types::ParamValue;
use http_body_util::BodyExt;
use hyper::body::Bytes;
use hyper::header::{HeaderName, HeaderValue, CONTENT_LENGTH, CONTENT_TYPE};
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::time::Instant;

/// HTTP Request wrapper
#[derive(Debug, Clone)]
pub struct HttpRequest {
    /// HTTP method
    pub method: Method,
    /// Request path (without query string)
    pub path: String,
    /// Typed path parameters
    pub typed_params: HashMap<String, ParamValue>,
    headers: hyper::HeaderMap,
    body: Option<Bytes>,
    received_at: Instant,
}

impl HttpRequest {
    /// Create a new request manually (for testing/internal use)
    ///
    /// Anything after `?` in `path` is discarded.
    pub fn new(
        method: Method,
        path: impl Into<String>,
        headers_map: HashMap<String, String>,
        body: Option<Bytes>,
    ) -> Self {
        let mut path = path.into();
        if let Some(idx) = path.find('?') {
            path.truncate(idx);
        }

        let mut headers = hyper::HeaderMap::new();
        for (k, v) in headers_map {
            if let (Ok(n), Ok(v)) = (
                HeaderName::from_bytes(k.as_bytes()),
                HeaderValue::from_str(&v),
            ) {
                headers.insert(n, v);
            }
        }

        Self {
            method,
            path,
            typed_params: HashMap::new(),
            headers,
            body,
            received_at: Instant::now(),
        }
    }

    /// Create from hyper request with body size limit
    ///
    /// # Errors
    ///
    /// Returns `Error::PayloadTooLarge` when the declared or actual body
    /// exceeds `max_body_size`, and `Error::Http` when the body stream fails.
    pub async fn from_hyper_with_limit(
        method: Method,
        req: hyper::Request<hyper::body::Incoming>,
        max_body_size: usize,
    ) -> Result<Self> {
        let received_at = Instant::now();
        let path = req.uri().path().to_string();
        let headers = req.headers().clone();

        let declared = headers
            .get(CONTENT_LENGTH)
            .and_then(|len| len.to_str().ok())
            .and_then(|len| len.parse::<usize>().ok());
        if let Some(content_len) = declared {
            if content_len > max_body_size {
                return Err(Error::PayloadTooLarge {
                    limit: max_body_size,
                    actual: content_len,
                });
            }
        }

        let bytes = req.into_body().collect().await?.to_bytes();
        if bytes.len() > max_body_size {
            return Err(Error::PayloadTooLarge {
                limit: max_body_size,
                actual: bytes.len(),
            });
        }

        Ok(Self {
            method,
            path,
            typed_params: HashMap::new(),
            headers,
            body: Some(bytes),
            received_at,
        })
    }

    /// Get a header value by name (case-insensitive)
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Set or override a header
    pub fn set_header(&mut self, name: &str, value: &str) {
        if let (Ok(n), Ok(v)) = (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            self.headers.insert(n, v);
        }
    }

    /// Typed path parameter by name
    #[must_use]
    pub fn param(&self, name: &str) -> Option<&ParamValue> {
        self.typed_params.get(name)
    }

    /// Get the request body as bytes
    #[must_use]
    pub fn body_bytes(&self) -> Option<&[u8]> {
        self.body.as_deref()
    }

    /// Whether the declared media type is `application/json`
    #[must_use]
    pub fn is_json(&self) -> bool {
        self.headers
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(';').next())
            .is_some_and(|mime| mime.trim().eq_ignore_ascii_case("application/json"))
    }

    /// Parse the body as JSON
    ///
    /// Only `application/json` bodies are read; any other content type,
    /// a missing body or a whitespace-only body yields `None`.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidBody` if the body is not valid JSON or its
    /// top level is not an object or an array
    pub fn json_body<T: DeserializeOwned>(&self) -> Result<Option<T>> {
        if !self.is_json() {
            return Ok(None);
        }
        let Some(bytes) = self.body_bytes() else {
            return Ok(None);
        };
        match bytes.iter().copied().find(|b| !b.is_ascii_whitespace()) {
            None => Ok(None),
            Some(b'{' | b'[') => parse_json_bytes(bytes).map(Some),
            Some(_) => Err(Error::InvalidBody {
                reason: "top-level JSON value must be an object or array".to_string(),
            }),
        }
    }

    /// Time since the request was received
    #[must_use]
    pub fn elapsed(&self) -> std::time::Duration {
        self.received_at.elapsed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request_with(content_type: &str, body: &str) -> HttpRequest {
        let mut headers = HashMap::new();
        headers.insert("content-type".to_string(), content_type.to_string());
        HttpRequest::new(
            Method::Post,
            "/students",
            headers,
            Some(Bytes::from(body.to_string())),
        )
    }

    fn request_with_body(body: &str) -> HttpRequest {
        request_with("application/json", body)
    }

    #[test]
    fn test_query_string_is_stripped() {
        let req = HttpRequest::new(Method::Get, "/students?page=2", HashMap::new(), None);
        assert_eq!(req.path, "/students");
    }

    #[test]
    fn test_headers_case_insensitive() {
        let mut headers = HashMap::new();
        headers.insert("X-Request-Id".to_string(), "abc".to_string());
        let mut req = HttpRequest::new(Method::Get, "/", headers, None);
        assert_eq!(req.header("x-request-id"), Some("abc"));

        req.set_header("x-request-id", "def");
        assert_eq!(req.header("X-REQUEST-ID"), Some("def"));
    }

    #[test]
    fn test_json_body() {
        let req = request_with_body(r#"{"name":"Joel"}"#);
        let body: serde_json::Value = req.json_body().unwrap().unwrap();
        assert_eq!(body["name"], "Joel");
    }

    #[test]
    fn test_json_body_empty() {
        let req = request_with_body("  \n");
        let body: Option<serde_json::Value> = req.json_body().unwrap();
        assert!(body.is_none());

        let req = HttpRequest::new(Method::Post, "/students", HashMap::new(), None);
        let body: Option<serde_json::Value> = req.json_body().unwrap();
        assert!(body.is_none());
    }

    #[test]
    fn test_json_body_requires_json_content_type() {
        let req = request_with("application/json; charset=utf-8", r#"{"name":"Joel"}"#);
        assert!(req.is_json());
        let body: Option<serde_json::Value> = req.json_body().unwrap();
        assert!(body.is_some());

        let req = request_with("text/plain", "hello");
        assert!(!req.is_json());
        let body: Option<serde_json::Value> = req.json_body().unwrap();
        assert!(body.is_none());

        let req = HttpRequest::new(
            Method::Post,
            "/students",
            HashMap::new(),
            Some(Bytes::from_static(b"{\"name\":\"Joel\"}")),
        );
        let body: Option<serde_json::Value> = req.json_body().unwrap();
        assert!(body.is_none());
    }

    #[test]
    fn test_json_body_rejects_scalar_root() {
        for body in ["42", " \"Joel\"", "null", "true"] {
            let result: Result<Option<serde_json::Value>> = request_with_body(body).json_body();
            assert!(matches!(result, Err(Error::InvalidBody { .. })), "{body}");
        }
        let body: Option<serde_json::Value> = request_with_body(" [1]").json_body().unwrap();
        assert!(body.is_some());
    }

    #[test]
    fn test_json_body_malformed() {
        let req = request_with_body("{name:");
        let result: Result<Option<serde_json::Value>> = req.json_body();
        assert!(matches!(result, Err(Error::InvalidBody { .. })));
    }
}

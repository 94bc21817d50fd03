//! # Students Core
//!
//! JSON HTTP service exposing CRUD over a single `students` table.
//!
//! ## Architecture
//!
//! A [`Database`] gateway is connected once at startup and injected into the
//! route handlers; the [`Server`] dispatches each request by method and path
//! to one handler, which issues a single parameterized statement and turns
//! the rows into JSON.
//!
//! ## Modules
//!
//! - `app` - Composition of routes and the static root endpoint
//! - `students` - Student resource handlers
//! - `database` - SQLx gateway (PostgreSQL, SQLite)
//! - `server` - HTTP server built on Hyper
//! - `router` - Routing using matchit (radix trie)
//! - `request` - HTTP request wrapper
//! - `middleware` - Request/response middleware
//! - `json` - JSON parsing with simd-json
//! - `types` - Path parameter values
//! - `config` - Startup configuration
//! - `error` - Error types and handling

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod app;
pub mod config;
pub mod database;
pub mod error;
pub mod json;
pub mod middleware;
pub mod request;
pub mod router;
pub mod server;
pub mod students;
pub mod types;

pub use app::{build_server, ROOT_NAMES};
pub use config::{AppConfig, DatabaseConfig, Environment, ServerConfig};
pub use database::{Database, DbRow, DbValue};
pub use error::{Error, Result};
pub use json::{parse_json, to_json};
pub use middleware::{LoggingMiddleware, Middleware, MiddlewareChain};
pub use request::HttpRequest;
pub use router::{Method, Router};
pub use server::{HttpResponse, Server};
pub use types::ParamValue;

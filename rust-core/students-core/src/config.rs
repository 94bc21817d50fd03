//! # Configuration
//!
//! Explicit configuration assembled once at startup and passed down to the
//! gateway and the server. Nothing in the library reads the process
//! environment on its own.

use std::fmt;
use std::net::SocketAddr;
use std::time::Duration;

/// Database name used outside of tests
pub const DEFAULT_DATABASE: &str = "students";

/// Database name used by the test environment
pub const TEST_DATABASE: &str = "students-test";

/// Deployment environment selecting the database name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Environment {
    /// Regular operation against the `students` database
    #[default]
    Development,
    /// Test runs against the `students-test` database
    Test,
}

impl Environment {
    /// Environment named by `APP_ENV`
    ///
    /// Only `test` selects the test database; anything else, including an
    /// empty name, is development.
    #[must_use]
    pub fn from_name(name: &str) -> Self {
        if name.trim().eq_ignore_ascii_case("test") {
            Self::Test
        } else {
            Self::Development
        }
    }

    /// Database name for this environment
    #[must_use]
    pub const fn database_name(self) -> &'static str {
        match self {
            Self::Development => DEFAULT_DATABASE,
            Self::Test => TEST_DATABASE,
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Development => write!(f, "development"),
            Self::Test => write!(f, "test"),
        }
    }
}

/// Connection settings for the database gateway
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseConfig {
    /// Connection URL (`postgresql://...` or `sqlite:...`)
    pub url: String,
    /// Upper bound on open connections; one keeps a single persistent connection
    pub max_connections: u32,
}

impl DatabaseConfig {
    /// Local PostgreSQL database for the given environment
    #[must_use]
    pub fn for_environment(env: Environment) -> Self {
        Self::with_url(format!("postgresql://localhost/{}", env.database_name()))
    }

    /// Explicit connection URL with a single connection
    #[must_use]
    pub fn with_url(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            max_connections: 1,
        }
    }

    /// Whether the URL targets the embedded SQLite backend
    #[must_use]
    pub fn is_sqlite(&self) -> bool {
        self.url.starts_with("sqlite:")
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self::for_environment(Environment::default())
    }
}

/// HTTP Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind the server to
    pub address: SocketAddr,
    /// Shutdown timeout for graceful shutdown (default: 30 seconds)
    pub shutdown_timeout: Duration,
    /// Max request body size in bytes (default: 100 KiB)
    pub max_body_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: ([127, 0, 0, 1], 3000).into(),
            shutdown_timeout: Duration::from_secs(30),
            max_body_size: 100 * 1024,
        }
    }
}

/// Everything the application needs at startup
#[derive(Debug, Clone, Default)]
pub struct AppConfig {
    /// Selected environment
    pub environment: Environment,
    /// Gateway settings
    pub database: DatabaseConfig,
    /// Listener settings
    pub server: ServerConfig,
}

impl AppConfig {
    /// Config for an environment with default database URL and listener
    #[must_use]
    pub fn for_environment(environment: Environment) -> Self {
        Self {
            environment,
            database: DatabaseConfig::for_environment(environment),
            server: ServerConfig::default(),
        }
    }
}

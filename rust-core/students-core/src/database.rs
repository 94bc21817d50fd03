//! # Database Gateway
//!
//! The only place SQL is sent to the store. A [`Database`] is connected
//! once at startup, cloned into every handler that needs it and closed
//! explicitly on shutdown.
//!
//! Statements use positional `$n` placeholders on both backends. Rows come
//! back as [`DbRow`]s keeping the column order of the result set.

use crate::config::DatabaseConfig;
use crate::error::{Error, Result};
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use sqlx::postgres::{PgArguments, PgPool, PgPoolOptions, PgRow};
use sqlx::query::Query;
use sqlx::sqlite::{SqliteArguments, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::{Column, Postgres, Row, Sqlite, TypeInfo, ValueRef};
use tracing::{debug, error, info};

/// Database connection pool supporting multiple backends
#[derive(Clone)]
pub enum Database {
    /// SQLite connection pool
    Sqlite(SqlitePool),
    /// PostgreSQL connection pool
    Postgres(PgPool),
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Sqlite(_) => "Database::Sqlite",
            Self::Postgres(_) => "Database::Postgres",
        })
    }
}

impl Database {
    /// Connect using the configured URL
    ///
    /// `sqlite:` URLs open the embedded backend, everything else is handed
    /// to the PostgreSQL driver.
    ///
    /// # Errors
    ///
    /// Returns `Error::Database` if the store is unreachable
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let db = if config.is_sqlite() {
            Self::connect_sqlite(&config.url, config.max_connections).await?
        } else {
            Self::connect_postgres(&config.url, config.max_connections).await?
        };
        info!(backend = ?db, max_connections = config.max_connections, "Database connected");
        Ok(db)
    }

    /// Connect to a SQLite database
    ///
    /// # Example
    ///
    /// ```ignore
    /// let db = Database::connect_sqlite("sqlite::memory:", 1).await?;
    /// ```
    pub async fn connect_sqlite(url: &str, max_connections: u32) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections.max(1))
            .connect(url)
            .await
            .map_err(|e| Error::Database {
                message: format!("SQLite connection failed: {e}"),
            })?;

        Ok(Self::Sqlite(pool))
    }

    /// Connect to a PostgreSQL database
    ///
    /// # Example
    ///
    /// ```ignore
    /// let db = Database::connect_postgres("postgresql://localhost/students", 1).await?;
    /// ```
    pub async fn connect_postgres(url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections.max(1))
            .connect(url)
            .await
            .map_err(|e| Error::Database {
                message: format!("PostgreSQL connection failed: {e}"),
            })?;

        Ok(Self::Postgres(pool))
    }

    /// Run a statement and return every row it produces
    ///
    /// Works for `SELECT` as well as `INSERT/UPDATE/DELETE ... RETURNING`;
    /// a statement without a result set yields an empty vector.
    pub async fn query(&self, sql: &str, params: &[DbValue]) -> Result<Vec<DbRow>> {
        debug!(sql, params = params.len(), "Executing query");
        let rows: std::result::Result<Vec<DbRow>, sqlx::Error> = match self {
            Self::Sqlite(pool) => sqlite_query(sql, params)
                .fetch_all(pool)
                .await
                .map(|rows| rows.iter().map(sqlite_row_to_map).collect()),
            Self::Postgres(pool) => pg_query(sql, params)
                .fetch_all(pool)
                .await
                .map(|rows| rows.iter().map(pg_row_to_map).collect()),
        };
        rows.map_err(|e| query_error(sql, &e))
    }

    /// Execute a statement that doesn't return rows
    ///
    /// Returns the number of affected rows.
    pub async fn execute(&self, sql: &str, params: &[DbValue]) -> Result<u64> {
        debug!(sql, params = params.len(), "Executing statement");
        let affected = match self {
            Self::Sqlite(pool) => sqlite_query(sql, params)
                .execute(pool)
                .await
                .map(|r| r.rows_affected()),
            Self::Postgres(pool) => pg_query(sql, params)
                .execute(pool)
                .await
                .map(|r| r.rows_affected()),
        };
        affected.map_err(|e| query_error(sql, &e))
    }

    /// Close the database connection pool
    pub async fn close(&self) {
        match self {
            Self::Sqlite(pool) => pool.close().await,
            Self::Postgres(pool) => pool.close().await,
        }
        info!("Database connection closed");
    }

    /// Whether [`close`](Self::close) has been called
    #[must_use]
    pub fn is_closed(&self) -> bool {
        match self {
            Self::Sqlite(pool) => pool.is_closed(),
            Self::Postgres(pool) => pool.is_closed(),
        }
    }
}

fn query_error(sql: &str, err: &sqlx::Error) -> Error {
    error!(sql, error = %err, "Query failed");
    Error::Database {
        message: format!("Query error: {err}"),
    }
}

/// Parameter and column value
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum DbValue {
    /// Null value
    Null,
    /// Integer value
    Int(i64),
    /// Float value
    Float(f64),
    /// String value
    String(String),
    /// Boolean value
    Bool(bool),
    /// Binary data
    Bytes(Vec<u8>),
}

/// One result row, columns in result-set order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DbRow {
    columns: Vec<(String, DbValue)>,
}

impl DbRow {
    fn with_capacity(n: usize) -> Self {
        Self {
            columns: Vec::with_capacity(n),
        }
    }

    fn push(&mut self, name: &str, value: DbValue) {
        self.columns.push((name.to_string(), value));
    }

    /// Value of a column by name
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&DbValue> {
        self.columns
            .iter()
            .find(|(column, _)| column == name)
            .map(|(_, value)| value)
    }
}

impl Serialize for DbRow {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.columns.len()))?;
        for (name, value) in &self.columns {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

fn pg_query<'q>(sql: &'q str, params: &'q [DbValue]) -> Query<'q, Postgres, PgArguments> {
    params.iter().fold(sqlx::query(sql), |query, value| match value {
        DbValue::Null => query.bind(None::<String>),
        DbValue::Int(i) => query.bind(*i),
        DbValue::Float(f) => query.bind(*f),
        DbValue::String(s) => query.bind(s.as_str()),
        DbValue::Bool(b) => query.bind(*b),
        DbValue::Bytes(b) => query.bind(b.as_slice()),
    })
}

fn sqlite_query<'q>(sql: &'q str, params: &'q [DbValue]) -> Query<'q, Sqlite, SqliteArguments<'q>> {
    params.iter().fold(sqlx::query(sql), |query, value| match value {
        DbValue::Null => query.bind(None::<String>),
        DbValue::Int(i) => query.bind(*i),
        DbValue::Float(f) => query.bind(*f),
        DbValue::String(s) => query.bind(s.as_str()),
        DbValue::Bool(b) => query.bind(*b),
        DbValue::Bytes(b) => query.bind(b.as_slice()),
    })
}

/// Convert SQLite row to DbRow
///
/// SQLite is dynamically typed, so the storage class of each value decides
/// the variant rather than the declared column type.
fn sqlite_row_to_map(row: &SqliteRow) -> DbRow {
    let mut map = DbRow::with_capacity(row.len());

    for (i, column) in row.columns().iter().enumerate() {
        let value = match row.try_get_raw(i) {
            Ok(raw) if !raw.is_null() => {
                let type_info = raw.type_info();
                match type_info.name() {
                    "INTEGER" | "BOOLEAN" => row.try_get::<i64, _>(i).map(DbValue::Int),
                    "REAL" => row.try_get::<f64, _>(i).map(DbValue::Float),
                    "BLOB" => row.try_get::<Vec<u8>, _>(i).map(DbValue::Bytes),
                    _ => row.try_get::<String, _>(i).map(DbValue::String),
                }
                .unwrap_or(DbValue::Null)
            }
            _ => DbValue::Null,
        };

        map.push(column.name(), value);
    }

    map
}

/// Convert PostgreSQL row to DbRow
fn pg_row_to_map(row: &PgRow) -> DbRow {
    let mut map = DbRow::with_capacity(row.len());

    for (i, column) in row.columns().iter().enumerate() {
        let value = match row.try_get_raw(i) {
            Ok(raw) if !raw.is_null() => {
                let type_info = raw.type_info();
                match type_info.name() {
                    "INT2" => row.try_get::<i16, _>(i).map(|v| DbValue::Int(v.into())),
                    "INT4" => row.try_get::<i32, _>(i).map(|v| DbValue::Int(v.into())),
                    "INT8" => row.try_get::<i64, _>(i).map(DbValue::Int),
                    "FLOAT4" => row.try_get::<f32, _>(i).map(|v| DbValue::Float(v.into())),
                    "FLOAT8" => row.try_get::<f64, _>(i).map(DbValue::Float),
                    "BOOL" => row.try_get::<bool, _>(i).map(DbValue::Bool),
                    "BYTEA" => row.try_get::<Vec<u8>, _>(i).map(DbValue::Bytes),
                    _ => row.try_get::<String, _>(i).map(DbValue::String),
                }
                .unwrap_or(DbValue::Null)
            }
            _ => DbValue::Null,
        };

        map.push(column.name(), value);
    }

    map
}

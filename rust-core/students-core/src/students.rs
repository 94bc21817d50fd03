//! # Student Resource
//!
//! List, create, update and delete over the `students` table. Each handler
//! issues exactly one statement through the [`Database`] gateway and
//! returns the rows as JSON.
//!
//! Update and delete do not check that the id matched a row: update answers
//! with an empty body, delete always answers `{"message":"Deleted"}`.

use crate::database::{Database, DbRow, DbValue};
use crate::error::Result;
use crate::router::Method;
use crate::server::{Handler, HandlerFuture, HttpRequest, HttpResponse, RouteDef};
use crate::types::ParamValue;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

/// Mount point of the resource
pub const PREFIX: &str = "/students";

const LIST_SQL: &str = "SELECT * FROM students";
const CREATE_SQL: &str = "INSERT INTO students (name) VALUES ($1) RETURNING *";
const UPDATE_SQL: &str = "UPDATE students SET name=$1 WHERE id=$2 RETURNING *";
const DELETE_SQL: &str = "DELETE FROM students WHERE id=$1";

/// Body of a successful delete
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deleted {
    /// Always `"Deleted"`
    pub message: String,
}

impl Default for Deleted {
    fn default() -> Self {
        Self {
            message: "Deleted".to_string(),
        }
    }
}

/// Routes relative to [`PREFIX`]
pub fn routes(db: &Database) -> Vec<RouteDef> {
    vec![
        (Method::Get, "/", list(db.clone())),
        (Method::Post, "/", create(db.clone())),
        (Method::Patch, "/{id:int}", update(db.clone())),
        (Method::Delete, "/{id:int}", delete(db.clone())),
    ]
}

/// `GET /students`
pub async fn list_students(db: &Database) -> Result<Vec<DbRow>> {
    db.query(LIST_SQL, &[]).await
}

/// `POST /students`
pub async fn create_student(db: &Database, name: DbValue) -> Result<Option<DbRow>> {
    Ok(db.query(CREATE_SQL, &[name]).await?.into_iter().next())
}

/// `PATCH /students/{id}`; `None` when no row has that id
pub async fn update_student(db: &Database, id: DbValue, name: DbValue) -> Result<Option<DbRow>> {
    Ok(db.query(UPDATE_SQL, &[name, id]).await?.into_iter().next())
}

/// `DELETE /students/{id}`; succeeds whether or not a row matched
pub async fn delete_student(db: &Database, id: DbValue) -> Result<Deleted> {
    db.query(DELETE_SQL, &[id]).await?;
    Ok(Deleted::default())
}

fn list(db: Database) -> Handler {
    Arc::new(move |_req: &HttpRequest| -> HandlerFuture {
        let db = db.clone();
        Box::pin(async move { HttpResponse::json_value(&list_students(&db).await?) })
    })
}

fn create(db: Database) -> Handler {
    Arc::new(move |req: &HttpRequest| -> HandlerFuture {
        let db = db.clone();
        let name = name_from_body(req);
        Box::pin(async move { row_response(create_student(&db, name?).await?) })
    })
}

fn update(db: Database) -> Handler {
    Arc::new(move |req: &HttpRequest| -> HandlerFuture {
        let db = db.clone();
        let id = id_param(req);
        let name = name_from_body(req);
        Box::pin(async move { row_response(update_student(&db, id, name?).await?) })
    })
}

fn delete(db: Database) -> Handler {
    Arc::new(move |req: &HttpRequest| -> HandlerFuture {
        let db = db.clone();
        let id = id_param(req);
        Box::pin(async move { HttpResponse::json_value(&delete_student(&db, id).await?) })
    })
}

/// A row as JSON, or an empty JSON body when there is none
fn row_response(row: Option<DbRow>) -> Result<HttpResponse> {
    match row {
        Some(row) => HttpResponse::json_value(&row),
        None => Ok(HttpResponse::json("")),
    }
}

fn id_param(req: &HttpRequest) -> DbValue {
    req.param("id").map_or(DbValue::Null, ParamValue::to_db_value)
}

/// `name` from the JSON body, coerced for binding
///
/// Strings bind as text. A missing key, `null`, an empty body, an array
/// body or a body not sent as `application/json` binds as NULL. Other JSON
/// values bind as their JSON text.
fn name_from_body(req: &HttpRequest) -> Result<DbValue> {
    let body: Option<Value> = req.json_body()?;
    let name = match body {
        Some(Value::Object(mut fields)) => fields.remove("name").unwrap_or(Value::Null),
        _ => Value::Null,
    };
    Ok(match name {
        Value::Null => DbValue::Null,
        Value::String(s) => DbValue::String(s),
        other => DbValue::String(other.to_string()),
    })
}

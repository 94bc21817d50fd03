//! # Application
//!
//! Composes the server: logging middleware, the static root endpoint and
//! the student resource mounted under `/students`.

use crate::config::ServerConfig;
use crate::database::Database;
use crate::error::Result;
use crate::middleware::LoggingMiddleware;
use crate::router::Method;
use crate::server::{Handler, HandlerFuture, HttpRequest, HttpResponse, Server};
use crate::students;
use std::sync::Arc;

/// Names served by `GET /`, unrelated to the `students` table
pub const ROOT_NAMES: [&str; 4] = ["Elie", "Matt", "Joel", "Michael"];

/// Build the application around an already connected gateway
///
/// # Errors
///
/// Returns `Error::InvalidRoutePattern` if a route fails to register
pub fn build_server(config: ServerConfig, db: &Database) -> Result<Server> {
    let mut server = Server::new(config);
    server.add_middleware(LoggingMiddleware);
    server.add_route(Method::Get, "/", root())?;
    server.mount(students::PREFIX, students::routes(db))?;
    Ok(server)
}

fn root() -> Handler {
    Arc::new(|_req: &HttpRequest| -> HandlerFuture {
        Box::pin(async { HttpResponse::json_value(&ROOT_NAMES) })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DatabaseConfig;
    use crate::database::{DbRow, DbValue};
    use hyper::body::Bytes;
    use serde::Deserialize;
    use serde_json::Value;
    use std::collections::HashMap;

    #[derive(Debug, Deserialize)]
    struct Student {
        id: i64,
        name: Option<String>,
    }

    /// In-memory store seeded with "Elie" and "Matt"
    async fn seeded() -> (Server, Database) {
        let db = Database::connect(&DatabaseConfig::with_url("sqlite::memory:"))
            .await
            .unwrap();
        db.execute(
            "CREATE TABLE students (id INTEGER PRIMARY KEY AUTOINCREMENT, name TEXT)",
            &[],
        )
        .await
        .unwrap();
        db.execute("INSERT INTO students (name) VALUES ('Elie'), ('Matt')", &[])
            .await
            .unwrap();
        let server = build_server(ServerConfig::default(), &db).unwrap();
        (server, db)
    }

    /// Send `body` (if any) as `application/json`
    async fn call(server: &Server, method: Method, path: &str, body: Option<&str>) -> HttpResponse {
        match body {
            Some(body) => send(server, method, path, "application/json", body).await,
            None => server.test_request(method, path, HashMap::new(), None).await,
        }
    }

    async fn send(
        server: &Server,
        method: Method,
        path: &str,
        content_type: &str,
        body: &str,
    ) -> HttpResponse {
        let mut headers = HashMap::new();
        headers.insert("content-type".to_string(), content_type.to_string());
        server
            .test_request(method, path, headers, Some(Bytes::from(body.to_string())))
            .await
    }

    async fn list(server: &Server) -> Vec<Student> {
        let resp = call(server, Method::Get, "/students", None).await;
        assert_eq!(resp.status, 200);
        resp.json_body().unwrap()
    }

    #[tokio::test]
    async fn get_root_returns_fixed_names() {
        let (server, db) = seeded().await;
        db.execute("DELETE FROM students", &[]).await.unwrap();

        let resp = call(&server, Method::Get, "/", None).await;
        assert_eq!(resp.status, 200);
        let names: Vec<String> = resp.json_body().unwrap();
        assert_eq!(names, ["Elie", "Matt", "Joel", "Michael"]);
    }

    #[tokio::test]
    async fn get_students_returns_seeded_rows() {
        let (server, _db) = seeded().await;

        let resp = call(&server, Method::Get, "/students", None).await;
        assert_eq!(resp.status, 200);
        let rows: Vec<Value> = resp.json_body().unwrap();
        assert_eq!(rows.len(), 2);
        for row in &rows {
            assert!(row.get("id").is_some_and(Value::is_number));
            assert!(row.get("name").is_some());
        }
        assert_eq!(rows[0]["name"], "Elie");
    }

    #[tokio::test]
    async fn get_students_is_idempotent() {
        let (server, _db) = seeded().await;

        let first = call(&server, Method::Get, "/students", None).await;
        let second = call(&server, Method::Get, "/students", None).await;
        assert_eq!(first.body, second.body);
    }

    #[tokio::test]
    async fn post_creates_student() {
        let (server, _db) = seeded().await;

        let resp = call(&server, Method::Post, "/students", Some(r#"{"name":"New Student"}"#)).await;
        assert_eq!(resp.status, 200);
        let created: Student = resp.json_body().unwrap();
        assert_eq!(created.name.as_deref(), Some("New Student"));
        assert!(created.id > 2);

        assert_eq!(list(&server).await.len(), 3);
    }

    #[tokio::test]
    async fn post_without_name_stores_null() {
        let (server, _db) = seeded().await;

        let resp = call(&server, Method::Post, "/students", Some("{}")).await;
        assert_eq!(resp.status, 200);
        let created: Student = resp.json_body().unwrap();
        assert_eq!(created.name, None);
    }

    #[tokio::test]
    async fn post_malformed_json_is_bad_request() {
        let (server, _db) = seeded().await;

        let resp = call(&server, Method::Post, "/students", Some(r#"{"name":"#)).await;
        assert_eq!(resp.status, 400);
        assert_eq!(list(&server).await.len(), 2);
    }

    #[tokio::test]
    async fn post_non_json_content_type_stores_null() {
        let (server, _db) = seeded().await;

        let resp = send(&server, Method::Post, "/students", "text/plain", "hello").await;
        assert_eq!(resp.status, 200);
        let created: Student = resp.json_body().unwrap();
        assert_eq!(created.name, None);
        assert_eq!(list(&server).await.len(), 3);
    }

    #[tokio::test]
    async fn post_scalar_json_is_bad_request() {
        let (server, _db) = seeded().await;

        let resp = call(&server, Method::Post, "/students", Some("42")).await;
        assert_eq!(resp.status, 400);
        assert_eq!(list(&server).await.len(), 2);
    }

    #[tokio::test]
    async fn head_students_has_no_body() {
        let (server, _db) = seeded().await;

        let resp = call(&server, Method::Head, "/students", None).await;
        assert_eq!(resp.status, 200);
        assert!(resp.body.is_empty());
    }

    #[tokio::test]
    async fn percent_encoded_id_is_decoded() {
        let (server, _db) = seeded().await;

        let resp = call(&server, Method::Patch, "/students/%31", Some(r#"{"name":"Elie S."}"#)).await;
        assert_eq!(resp.status, 200);
        let updated: Student = resp.json_body().unwrap();
        assert_eq!(updated.id, 1);
        assert_eq!(updated.name.as_deref(), Some("Elie S."));
    }

    #[tokio::test]
    async fn patch_updates_student() {
        let (server, _db) = seeded().await;

        let created: Student = call(&server, Method::Post, "/students", Some(r#"{"name":"Another one"}"#))
            .await
            .json_body()
            .unwrap();

        let path = format!("/students/{}", created.id);
        let resp = call(&server, Method::Patch, &path, Some(r#"{"name":"updated"}"#)).await;
        assert_eq!(resp.status, 200);
        let updated: Student = resp.json_body().unwrap();
        assert_eq!(updated.id, created.id);
        assert_eq!(updated.name.as_deref(), Some("updated"));

        assert_eq!(list(&server).await.len(), 3);
    }

    #[tokio::test]
    async fn patch_unknown_id_answers_empty_body() {
        let (server, _db) = seeded().await;

        let resp = call(&server, Method::Patch, "/students/9999", Some(r#"{"name":"ghost"}"#)).await;
        assert_eq!(resp.status, 200);
        assert!(resp.body.is_empty());
        assert_eq!(list(&server).await.len(), 2);
    }

    #[tokio::test]
    async fn delete_removes_student() {
        let (server, _db) = seeded().await;

        let created: Student = call(&server, Method::Post, "/students", Some(r#"{"name":"Another one"}"#))
            .await
            .json_body()
            .unwrap();

        let path = format!("/students/{}", created.id);
        let resp = call(&server, Method::Delete, &path, None).await;
        assert_eq!(resp.status, 200);
        let body: Value = resp.json_body().unwrap();
        assert_eq!(body, serde_json::json!({ "message": "Deleted" }));

        assert_eq!(list(&server).await.len(), 2);
    }

    #[tokio::test]
    async fn delete_unknown_id_still_reports_deleted() {
        let (server, _db) = seeded().await;

        let resp = call(&server, Method::Delete, "/students/9999", None).await;
        assert_eq!(resp.status, 200);
        let body: students::Deleted = resp.json_body().unwrap();
        assert_eq!(body, students::Deleted::default());
        assert_eq!(list(&server).await.len(), 2);
    }

    #[tokio::test]
    async fn unknown_route_is_404() {
        let (server, _db) = seeded().await;

        let resp = call(&server, Method::Get, "/nowhere", None).await;
        assert_eq!(resp.status, 404);

        let resp = call(&server, Method::Put, "/students/1", Some("{}")).await;
        assert_eq!(resp.status, 404);
    }

    #[tokio::test]
    async fn store_failure_is_500() {
        let (server, db) = seeded().await;
        db.execute("DROP TABLE students", &[]).await.unwrap();

        let resp = call(&server, Method::Get, "/students", None).await;
        assert_eq!(resp.status, 500);
        assert_eq!(resp.body, "Internal Server Error");
    }

    #[tokio::test]
    async fn gateway_rows_match_http_rows() {
        let (server, db) = seeded().await;

        let direct: Vec<DbRow> = students::list_students(&db).await.unwrap();
        assert_eq!(direct[1].get("name"), Some(&DbValue::String("Matt".to_string())));

        let over_http = call(&server, Method::Get, "/students/", None).await;
        assert_eq!(over_http.body, serde_json::to_string(&direct).unwrap());
    }

    /// Same scenarios against a local PostgreSQL `students-test` database
    #[tokio::test]
    #[ignore = "requires a local PostgreSQL database named students-test"]
    async fn postgres_crud_round() {
        use crate::config::Environment;

        let db = Database::connect(&DatabaseConfig::for_environment(Environment::Test))
            .await
            .unwrap();
        db.execute("CREATE TABLE students (id SERIAL PRIMARY KEY, name TEXT)", &[])
            .await
            .unwrap();
        db.execute("INSERT INTO students (name) VALUES ('Elie'), ('Matt')", &[])
            .await
            .unwrap();
        let server = build_server(ServerConfig::default(), &db).unwrap();

        assert_eq!(list(&server).await.len(), 2);

        let created: Student = call(&server, Method::Post, "/students", Some(r#"{"name":"New Student"}"#))
            .await
            .json_body()
            .unwrap();
        assert_eq!(created.name.as_deref(), Some("New Student"));

        let path = format!("/students/{}", created.id);
        let updated: Student = call(&server, Method::Patch, &path, Some(r#"{"name":"updated"}"#))
            .await
            .json_body()
            .unwrap();
        assert_eq!(updated.id, created.id);

        let resp = call(&server, Method::Delete, &path, None).await;
        assert_eq!(resp.body, r#"{"message":"Deleted"}"#);
        assert_eq!(list(&server).await.len(), 2);

        db.execute("DROP TABLE students", &[]).await.unwrap();
        db.close().await;
    }
}

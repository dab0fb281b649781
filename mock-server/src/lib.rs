//! Fixture HTTP server for exercising `restkit` over real sockets.
//!
//! Everything is mounted under `/api` so clients can be configured with a
//! base path. Besides a small in-memory users resource, there are endpoints
//! that produce each response shape the client has to classify: arbitrary
//! status codes, a corrupt JSON body, an oversized error body, a slow reply,
//! and an echo of the request as received.

use std::{collections::HashMap, sync::Arc, time::Duration};

use axum::{
    extract::{OriginalUri, Path, State},
    http::{header, HeaderMap, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{any, get},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tokio::{net::TcpListener, sync::RwLock};
use uuid::Uuid;

/// Size of the body returned by `/api/large-error`.
pub const LARGE_ERROR_BODY: usize = 2 * 1024 * 1024;

/// How long `/api/slow` waits before answering.
pub const SLOW_DELAY: Duration = Duration::from_secs(10);

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct User {
    pub id: Uuid,
    pub name: String,
}

#[derive(Deserialize)]
pub struct CreateUser {
    pub name: String,
}

/// JSON error body sent with every 4xx/5xx from the users resource.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

/// What `/api/echo` saw. Header names are lowercase.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Echo {
    pub method: String,
    pub path: String,
    pub query: Option<String>,
    pub headers: HashMap<String, String>,
    pub body: String,
}

pub type Db = Arc<RwLock<HashMap<Uuid, User>>>;

pub fn app() -> Router {
    let db: Db = Arc::new(RwLock::new(HashMap::new()));
    let api = Router::new()
        .route("/users", get(list_users).post(create_user))
        .route("/users/{id}", get(get_user).delete(delete_user))
        .route("/echo", any(echo))
        .route("/status/{code}", any(status))
        .route("/corrupt", get(corrupt))
        .route("/large-error", get(large_error))
        .route("/slow", get(slow))
        .with_state(db);
    Router::new().nest("/api", api)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

fn error(status: StatusCode, message: &str) -> Response {
    let body = ErrorBody {
        code: status.as_u16().to_string(),
        message: message.to_string(),
    };
    (status, Json(body)).into_response()
}

async fn list_users(State(db): State<Db>) -> Json<Vec<User>> {
    let users = db.read().await;
    Json(users.values().cloned().collect())
}

async fn create_user(State(db): State<Db>, Json(input): Json<CreateUser>) -> Response {
    if input.name.trim().is_empty() {
        return error(StatusCode::BAD_REQUEST, "name must not be empty");
    }
    let mut users = db.write().await;
    if users.values().any(|u| u.name == input.name) {
        return error(StatusCode::CONFLICT, "user already exists");
    }
    let user = User {
        id: Uuid::new_v4(),
        name: input.name,
    };
    users.insert(user.id, user.clone());
    tracing::debug!(id = %user.id, "created user");
    (StatusCode::CREATED, Json(user)).into_response()
}

async fn get_user(State(db): State<Db>, Path(id): Path<Uuid>) -> Response {
    match db.read().await.get(&id) {
        Some(user) => Json(user.clone()).into_response(),
        None => error(StatusCode::NOT_FOUND, "user not found"),
    }
}

async fn delete_user(State(db): State<Db>, Path(id): Path<Uuid>) -> Response {
    match db.write().await.remove(&id) {
        Some(_) => StatusCode::NO_CONTENT.into_response(),
        None => error(StatusCode::NOT_FOUND, "user not found"),
    }
}

async fn echo(
    method: Method,
    OriginalUri(uri): OriginalUri,
    headers: HeaderMap,
    body: String,
) -> Json<Echo> {
    let headers = headers
        .iter()
        .filter_map(|(name, value)| Some((name.to_string(), value.to_str().ok()?.to_string())))
        .collect();
    Json(Echo {
        method: method.to_string(),
        path: uri.path().to_string(),
        query: uri.query().map(str::to_string),
        headers,
        body,
    })
}

/// Reply with the requested status. 204 gets no body; everything else gets
/// `{"code": "<status>"}`.
async fn status(Path(code): Path<u16>) -> Response {
    let Ok(status) = StatusCode::from_u16(code) else {
        return error(StatusCode::BAD_REQUEST, "invalid status code");
    };
    if status == StatusCode::NO_CONTENT {
        return status.into_response();
    }
    (status, Json(serde_json::json!({ "code": code.to_string() }))).into_response()
}

async fn corrupt() -> Response {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "application/json")],
        "{not a json",
    )
        .into_response()
}

async fn large_error() -> Response {
    (StatusCode::INTERNAL_SERVER_ERROR, "x".repeat(LARGE_ERROR_BODY)).into_response()
}

async fn slow() -> Json<serde_json::Value> {
    tokio::time::sleep(SLOW_DELAY).await;
    Json(serde_json::json!({}))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_serializes_to_json() {
        let user = User {
            id: Uuid::nil(),
            name: "ada".to_string(),
        };
        let json = serde_json::to_value(&user).unwrap();
        assert_eq!(json["id"], "00000000-0000-0000-0000-000000000000");
        assert_eq!(json["name"], "ada");
    }

    #[test]
    fn create_user_rejects_missing_name() {
        let result: Result<CreateUser, _> = serde_json::from_str(r#"{"nickname":"ada"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn error_body_carries_status_as_code() {
        let resp = error(StatusCode::CONFLICT, "user already exists");
        assert_eq!(resp.status(), StatusCode::CONFLICT);
    }
}

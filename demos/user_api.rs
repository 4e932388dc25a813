//! User API Example
//!
//! A small user service whose routes are validated by `demos/user_api.toml`.
//!
//! Run with:
//! ```bash
//! RUST_LOG=debug cargo run --example user_api
//! ```
//!
//! Then test:
//! ```bash
//! # Valid
//! curl http://localhost:3000/user/1
//!
//! # 400: "request path params validation failed"
//! curl http://localhost:3000/user/abc
//!
//! # 400: "request header params validation failed"
//! curl http://localhost:3000/user/authenticate
//!
//! # 400: "request body params validation failed"
//! curl -X POST http://localhost:3000/user \
//!   -H "Content-Type: application/json" \
//!   -d '{"username": "al"}'
//!
//! # 404: "Invalid URL"
//! curl http://localhost:3000/nowhere
//! ```

use axum::{
    Json, Router,
    extract::Path,
    routing::{get, post},
};
use axum_request_validator::{Config, Result, RouterExt, Validator};
use serde::{Deserialize, Serialize};

#[derive(Serialize)]
struct User {
    id: u64,
    username: String,
}

#[derive(Deserialize)]
struct CreateUser {
    username: String,
}

async fn authenticate() -> &'static str {
    "authenticated"
}

async fn get_user(Path(id): Path<u64>) -> Json<User> {
    Json(User {
        id,
        username: format!("user{id}"),
    })
}

async fn list_friends(Path(id): Path<u64>) -> Json<Vec<User>> {
    Json(vec![User {
        id: id + 1,
        username: format!("friend-of-{id}"),
    }])
}

async fn create_user(Json(user): Json<CreateUser>) -> Json<User> {
    Json(User {
        id: 1,
        username: user.username,
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_toml_file(concat!(env!("CARGO_MANIFEST_DIR"), "/demos/user_api.toml"))?;
    config.setup_tracing();

    let app = Router::new()
        .route("/user/authenticate", get(authenticate))
        .route("/user/{id}", get(get_user))
        .route("/user/{id}/friends", get(list_friends))
        .route("/user", post(create_user))
        .with_request_validation(Validator::from_config(config));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:3000").await?;
    tracing::info!("Listening on http://127.0.0.1:3000");
    axum::serve(listener, app).await?;
    Ok(())
}

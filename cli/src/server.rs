use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use anyhow::Context;
use axum::{
    Json, Router,
    extract::{Path, Request, State},
    http::{HeaderValue, StatusCode, header},
    middleware::{self, Next},
    response::{Html, IntoResponse, Response},
    routing::{get, post},
};
use serde::Serialize;
use tower_http::limit::RequestBodyLimitLayer;
use tracing::info;

use larder_core::db::Database;
use larder_core::models::{NewRecipe, Recipe, validate_recipe_fields};

const BODY_LIMIT: usize = 10 * 1024 * 1024; // 10 MB

// Minimal app shell served as the cacheable origin. `cache install`
// pulls these into the static region.
const INDEX_HTML: &str = r#"<!doctype html>
<html lang="en">
<head>
  <meta charset="utf-8">
  <title>Larder</title>
  <link rel="stylesheet" href="/styles/style.css">
</head>
<body>
  <h1>Larder</h1>
  <p>Offline-first recipe keeper.</p>
  <script src="/scripts/app.js"></script>
</body>
</html>
"#;

const OFFLINE_HTML: &str = r#"<!doctype html>
<html lang="en">
<head>
  <meta charset="utf-8">
  <title>Larder - offline</title>
  <link rel="stylesheet" href="/styles/style.css">
</head>
<body>
  <h1>You are offline</h1>
  <p>Saved recipes are still available from the cache.</p>
</body>
</html>
"#;

const STYLESHEET: &str = "body { font-family: system-ui, sans-serif; margin: 2rem; }\n";

const APP_SCRIPT: &str = "console.log('larder shell loaded');\n";

#[derive(Clone)]
struct AppState {
    db: Arc<Mutex<Database>>,
    api_key: Option<String>,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

// --- Error handling ---

enum ApiError {
    BadRequest(String),
    Internal(anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            Self::Internal(err) => {
                eprintln!("Internal server error: {err:#}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };
        (status, Json(ErrorResponse { error: message })).into_response()
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err)
    }
}

// --- Middleware ---

async fn require_auth(State(state): State<AppState>, request: Request, next: Next) -> Response {
    if let Some(ref expected_key) = state.api_key {
        let authorized = request
            .headers()
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .is_some_and(|token| token == expected_key);

        if !authorized {
            return (
                StatusCode::UNAUTHORIZED,
                Json(ErrorResponse {
                    error: "Invalid or missing API key".to_string(),
                }),
            )
                .into_response();
        }
    }
    next.run(request).await
}

async fn security_headers(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();
    headers.insert(
        "x-content-type-options",
        HeaderValue::from_static("nosniff"),
    );
    headers.insert("x-frame-options", HeaderValue::from_static("DENY"));
    headers.insert(
        "content-security-policy",
        HeaderValue::from_static("default-src 'none'"),
    );
    response
}

// --- Handlers ---

/// Accept a batch of recipes from a syncing client. The whole batch is
/// validated before anything is written; recipes sharing an id collapse
/// to the last one in the batch.
async fn push_recipes(
    State(state): State<AppState>,
    Json(recipes): Json<Vec<Recipe>>,
) -> Result<Json<serde_json::Value>, ApiError> {
    for recipe in &recipes {
        validate_recipe_fields(&recipe.name, &recipe.description)
            .map_err(|e| ApiError::BadRequest(e.to_string()))?;
    }

    let accepted = {
        let db = state
            .db
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let mut ids = HashSet::new();
        for recipe in &recipes {
            db.put_recipe(
                &NewRecipe {
                    id: Some(recipe.id),
                    name: recipe.name.clone(),
                    description: recipe.description.clone(),
                    image_src: recipe.image_src.clone(),
                },
                true,
            )
            .context("database error")?;
            ids.insert(recipe.id);
        }
        ids.len()
    };

    info!(accepted, "accepted recipe batch");
    Ok(Json(serde_json::json!({ "accepted": accepted })))
}

async fn list_recipes(State(state): State<AppState>) -> Result<Json<Vec<Recipe>>, ApiError> {
    let recipes = {
        let db = state
            .db
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        db.get_all_recipes().context("database error")?
    };
    Ok(Json(recipes))
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn index_page() -> Html<&'static str> {
    Html(INDEX_HTML)
}

async fn offline_page() -> Html<&'static str> {
    Html(OFFLINE_HTML)
}

async fn stylesheet() -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "text/css; charset=utf-8")], STYLESHEET)
}

async fn app_script() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/javascript; charset=utf-8")],
        APP_SCRIPT,
    )
}

async fn icon(Path(_icon): Path<String>) -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "image/png")], Vec::new())
}

// --- Router builder ---

fn build_router(state: AppState) -> Router {
    let api = Router::new()
        .route("/api/sync", post(push_recipes))
        .route("/api/recipes", get(list_recipes))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth))
        .route_layer(middleware::from_fn(security_headers));

    Router::new()
        .merge(api)
        .route("/health", get(health))
        .route("/", get(index_page))
        .route("/index.html", get(index_page))
        .route("/offline.html", get(offline_page))
        .route("/styles/style.css", get(stylesheet))
        .route("/scripts/app.js", get(app_script))
        .route("/icons/{icon}", get(icon))
        .layer(RequestBodyLimitLayer::new(BODY_LIMIT))
        .with_state(state)
}

// --- Server startup ---

pub async fn start_server(
    db: Database,
    port: u16,
    bind: &str,
    api_key: Option<String>,
) -> anyhow::Result<()> {
    let state = AppState {
        db: Arc::new(Mutex::new(db)),
        api_key: api_key.clone(),
    };

    let app = build_router(state);

    if let Some(ref key) = api_key {
        eprintln!(
            "API key: {}...{} (see api_key file in data directory)",
            &key[..4],
            &key[key.len() - 4..],
        );
    } else {
        eprintln!("Warning: Authentication disabled (--no-auth). Sync API is open to anyone.");
    }

    if bind != "127.0.0.1" && bind != "localhost" && api_key.is_none() {
        eprintln!(
            "Warning: Listening on {bind} with no authentication. Any device on your network can push recipes."
        );
    }

    let listener = tokio::net::TcpListener::bind(format!("{bind}:{port}")).await?;
    eprintln!("Listening on http://{bind}:{port}");
    axum::serve(listener, app).await?;

    Ok(())
}

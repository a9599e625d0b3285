use std::sync::atomic::{AtomicBool, Ordering};

use thiserror::Error;
use tracing::{debug, info};

use larder_core::error::StoreError;
use larder_core::service::Session;

#[derive(Debug, PartialEq, Eq)]
pub enum SyncOutcome {
    /// This many recipes were accepted and marked synced.
    Synced(usize),
    NothingToSync,
    /// Another sync pass holds the in-flight guard.
    AlreadyInFlight,
}

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("sync request failed: {0}")]
    Network(#[from] reqwest::Error),
    #[error("Failed to sync recipes. Please try again later.")]
    Rejected { status: u16 },
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Pushes unsynced recipes to the backend and flips their flags once
/// the batch is accepted. Holds a single-flight guard so overlapping
/// passes collapse instead of double-sending.
pub struct SyncCoordinator {
    client: reqwest::Client,
    endpoint: String,
    bearer: Option<String>,
    in_flight: AtomicBool,
}

impl SyncCoordinator {
    #[must_use]
    pub fn new(client: reqwest::Client, base_url: &str, bearer: Option<String>) -> Self {
        Self {
            client,
            endpoint: format!("{}/api/sync", base_url.trim_end_matches('/')),
            bearer,
            in_flight: AtomicBool::new(false),
        }
    }

    /// Run one sync pass. Recipes stay unsynced on any failure, so the
    /// next pass retries the whole batch.
    pub async fn sync_once(&self, session: &Session) -> Result<SyncOutcome, SyncError> {
        let Some(_guard) = InFlightGuard::acquire(&self.in_flight) else {
            debug!("sync already in flight");
            return Ok(SyncOutcome::AlreadyInFlight);
        };

        // A store that predates the synced index simply has nothing the
        // coordinator can see; only real store failures propagate.
        let unsynced = match session.unsynced_recipes() {
            Ok(recipes) => recipes,
            Err(e) if e.is_recoverable() => {
                debug!(error = %e, "treating missing index as empty batch");
                Vec::new()
            }
            Err(e) => return Err(e.into()),
        };
        if unsynced.is_empty() {
            debug!("nothing to sync");
            return Ok(SyncOutcome::NothingToSync);
        }

        info!(count = unsynced.len(), endpoint = %self.endpoint, "pushing unsynced recipes");
        let mut request = self.client.post(&self.endpoint).json(&unsynced);
        if let Some(token) = &self.bearer {
            request = request.bearer_auth(token);
        }
        let response = request.send().await?;

        if !response.status().is_success() {
            return Err(SyncError::Rejected {
                status: response.status().as_u16(),
            });
        }

        session.mark_recipes_synced(&unsynced)?;
        info!(count = unsynced.len(), "recipes synced");
        Ok(SyncOutcome::Synced(unsynced.len()))
    }
}

struct InFlightGuard<'a>(&'a AtomicBool);

impl<'a> InFlightGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
            .then_some(Self(flag))
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::post;
    use axum::{Json, Router};
    use serde_json::Value;

    use larder_core::models::NewRecipe;

    #[derive(Default)]
    struct Received {
        auth: Option<String>,
        body: Option<Value>,
    }

    async fn spawn_sync_server(status: StatusCode) -> (String, Arc<Mutex<Received>>) {
        let received = Arc::new(Mutex::new(Received::default()));
        let state = received.clone();
        let app = Router::new().route(
            "/api/sync",
            post(move |headers: HeaderMap, Json(body): Json<Value>| {
                let state = state.clone();
                async move {
                    let mut received = state.lock().unwrap();
                    received.auth = headers
                        .get("authorization")
                        .and_then(|v| v.to_str().ok())
                        .map(String::from);
                    received.body = Some(body);
                    (status, Json(serde_json::json!({ "accepted": 0 })))
                }
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{addr}"), received)
    }

    fn session_with_recipes(names: &[&str]) -> Session {
        let session = Session::new_in_memory().unwrap();
        for name in names {
            session
                .save_recipe(&NewRecipe {
                    id: None,
                    name: (*name).to_string(),
                    description: "test recipe".to_string(),
                    image_src: None,
                })
                .unwrap();
        }
        session
    }

    #[tokio::test]
    async fn test_sync_pushes_batch_and_marks_synced() {
        let (base_url, received) = spawn_sync_server(StatusCode::OK).await;
        let session = session_with_recipes(&["Menemen", "Shakshuka"]);
        let coordinator =
            SyncCoordinator::new(reqwest::Client::new(), &base_url, Some("tok".to_string()));

        let outcome = coordinator.sync_once(&session).await.unwrap();
        assert_eq!(outcome, SyncOutcome::Synced(2));
        assert!(session.unsynced_recipes().unwrap().is_empty());

        let received = received.lock().unwrap();
        assert_eq!(received.auth.as_deref(), Some("Bearer tok"));
        let body = received.body.as_ref().unwrap();
        let batch = body.as_array().unwrap();
        assert_eq!(batch.len(), 2);
        assert_eq!(batch[0]["name"], "Menemen");
        // Recipes go over the wire in their pre-sync state
        assert_eq!(batch[0]["synced"], false);
        assert!(batch[0].get("imageSrc").is_some());
    }

    #[tokio::test]
    async fn test_nothing_to_sync_skips_the_network() {
        // Unroutable endpoint proves the early return never sends
        let session = Session::new_in_memory().unwrap();
        let coordinator = SyncCoordinator::new(reqwest::Client::new(), "http://127.0.0.1:9", None);

        let outcome = coordinator.sync_once(&session).await.unwrap();
        assert_eq!(outcome, SyncOutcome::NothingToSync);
    }

    #[tokio::test]
    async fn test_transport_failure_keeps_recipes_unsynced() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base_url = format!("http://{}", listener.local_addr().unwrap());
        drop(listener);

        let session = session_with_recipes(&["Menemen"]);
        let coordinator = SyncCoordinator::new(reqwest::Client::new(), &base_url, None);

        let err = coordinator.sync_once(&session).await.unwrap_err();
        assert!(matches!(err, SyncError::Network(_)));
        assert_eq!(session.unsynced_recipes().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_rejected_batch_keeps_recipes_unsynced() {
        let (base_url, _received) = spawn_sync_server(StatusCode::INTERNAL_SERVER_ERROR).await;
        let session = session_with_recipes(&["Menemen"]);
        let coordinator = SyncCoordinator::new(reqwest::Client::new(), &base_url, None);

        let err = coordinator.sync_once(&session).await.unwrap_err();
        assert!(matches!(err, SyncError::Rejected { status: 500 }));
        assert_eq!(
            err.to_string(),
            "Failed to sync recipes. Please try again later."
        );
        assert_eq!(session.unsynced_recipes().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_overlapping_sync_collapses() {
        let app = Router::new().route(
            "/api/sync",
            post(|| async {
                tokio::time::sleep(Duration::from_millis(200)).await;
                Json(serde_json::json!({ "accepted": 1 }))
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base_url = format!("http://{}", listener.local_addr().unwrap());
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let session = session_with_recipes(&["Menemen"]);
        let coordinator = SyncCoordinator::new(reqwest::Client::new(), &base_url, None);

        // First pass parks on the slow server; second returns immediately
        let (first, second) = tokio::join!(
            coordinator.sync_once(&session),
            coordinator.sync_once(&session),
        );
        assert_eq!(first.unwrap(), SyncOutcome::Synced(1));
        assert_eq!(second.unwrap(), SyncOutcome::AlreadyInFlight);
        assert!(session.unsynced_recipes().unwrap().is_empty());

        // The guard is released once the pass finishes
        let outcome = coordinator.sync_once(&session).await.unwrap();
        assert_eq!(outcome, SyncOutcome::NothingToSync);
    }
}

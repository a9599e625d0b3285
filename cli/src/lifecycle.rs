use std::collections::HashSet;
use std::sync::{Mutex, PoisonError};

use anyhow::{Context, Result, bail};
use chrono::Utc;
use tokio::sync::broadcast;
use tracing::info;

use larder_core::cache::{CacheStore, CachedResponse};
use larder_core::models::AppMessage;

/// Region holding the app shell. The version token in the name is how a
/// whole generation gets invalidated: bump it, run activate, and every
/// region carrying an old token is deleted.
pub const STATIC_REGION: &str = "recipe-app-v3";
pub const DYNAMIC_REGION: &str = "dynamic-cache-v3";

pub const SYNC_TAG: &str = "sync-recipes";

pub const DYNAMIC_CACHE_LIMIT: u64 = 50 * 1024 * 1024;

pub const STATIC_ASSETS: [&str; 8] = [
    "/",
    "/offline.html",
    "/index.html",
    "/styles/style.css",
    "/scripts/app.js",
    "/icons/icon-144x144.png",
    "/icons/icon-192x192.png",
    "/icons/icon-512x512.png",
];

pub const API_HOSTS: [&str; 2] = ["api.spoonacular.com", "api.opencagedata.com"];

/// Fetch the app shell into the static region. All-or-nothing: if any
/// asset fails to download, nothing is written and the old contents
/// stay untouched.
pub async fn install(
    client: &reqwest::Client,
    store: &CacheStore,
    base_url: &str,
) -> Result<usize> {
    let mut fetched = Vec::with_capacity(STATIC_ASSETS.len());
    for path in STATIC_ASSETS {
        let url = format!("{base_url}{path}");
        let resp = client
            .get(&url)
            .send()
            .await
            .with_context(|| format!("Failed to fetch asset {url}"))?;
        if !resp.status().is_success() {
            bail!("Asset {url} returned {}", resp.status());
        }
        let status = resp.status().as_u16();
        let content_type = resp
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(String::from);
        let body = resp
            .bytes()
            .await
            .with_context(|| format!("Failed to read asset {url}"))?;
        fetched.push(CachedResponse {
            url,
            status,
            content_type,
            stored_at: Utc::now(),
            body: body.to_vec(),
        });
    }

    let region = store.region(STATIC_REGION)?;
    let count = fetched.len();
    for response in &fetched {
        region.put(response)?;
    }
    info!(region = STATIC_REGION, assets = count, "installed app shell");
    Ok(count)
}

/// Delete every cache region from an older generation, keeping only the
/// current static and dynamic names. Returns the deleted names.
pub fn activate(store: &CacheStore) -> Result<Vec<String>> {
    let mut deleted = Vec::new();
    for name in store.list_regions()? {
        if name != STATIC_REGION && name != DYNAMIC_REGION {
            store.delete_region(&name)?;
            deleted.push(name);
        }
    }
    if !deleted.is_empty() {
        info!(count = deleted.len(), "dropped stale cache regions");
    }
    Ok(deleted)
}

/// One-shot background sync registrations. Registering a tag arms it;
/// firing a registered `sync-recipes` tag broadcasts a `SYNC_RECIPES`
/// message to every subscriber, then disarms the tag.
pub struct SyncSignal {
    tx: broadcast::Sender<AppMessage>,
    registered: Mutex<HashSet<String>>,
}

impl SyncSignal {
    #[must_use]
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(16);
        Self {
            tx,
            registered: Mutex::new(HashSet::new()),
        }
    }

    /// Arm a tag. Returns false when it was already armed; duplicate
    /// registrations coalesce into one pending sync.
    pub fn register(&self, tag: &str) -> bool {
        self.registered
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(tag.to_string())
    }

    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<AppMessage> {
        self.tx.subscribe()
    }

    /// Fire a tag. Returns the number of subscribers the message reached;
    /// zero when the tag was not armed or is not the recipe sync tag.
    pub fn fire(&self, tag: &str) -> usize {
        if !self
            .registered
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(tag)
        {
            return 0;
        }
        if tag != SYNC_TAG {
            return 0;
        }
        self.tx.send(AppMessage::SyncRecipes).unwrap_or(0)
    }
}

impl Default for SyncSignal {
    fn default() -> Self {
        Self::new()
    }
}

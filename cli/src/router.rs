use anyhow::{Result, bail};
use chrono::Utc;
use tracing::{debug, warn};

use larder_core::cache::{CacheRegion, CacheStore, CachedResponse};
use larder_core::error::CacheError;

use crate::lifecycle::{API_HOSTS, DYNAMIC_CACHE_LIMIT, DYNAMIC_REGION, STATIC_REGION};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestClass {
    Api,
    Navigation,
    Asset,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseSource {
    Network,
    Cache(&'static str),
    OfflineFallback,
}

impl std::fmt::Display for ResponseSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Network => write!(f, "network"),
            Self::Cache(region) => write!(f, "cache:{region}"),
            Self::OfflineFallback => write!(f, "offline-fallback"),
        }
    }
}

#[derive(Debug)]
pub struct RoutedResponse {
    pub url: String,
    pub status: u16,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
    pub source: ResponseSource,
}

/// Network-first request routing over the cache regions.
///
/// API requests and plain assets are fetched live and a copy lands in
/// the dynamic region. Navigations are fetched live but never cached.
/// When the network fails, assets fall back to any cached copy and
/// everything else falls back to the cached offline page.
pub struct RequestRouter {
    client: reqwest::Client,
    static_region: CacheRegion,
    dynamic_region: CacheRegion,
    base_url: String,
    api_hosts: Vec<String>,
    offline: bool,
}

impl RequestRouter {
    pub fn new(
        client: reqwest::Client,
        store: &CacheStore,
        base_url: &str,
        offline: bool,
    ) -> Result<Self, CacheError> {
        Ok(Self {
            client,
            static_region: store.region(STATIC_REGION)?,
            dynamic_region: store.bounded_region(DYNAMIC_REGION, DYNAMIC_CACHE_LIMIT)?,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_hosts: API_HOSTS.iter().map(ToString::to_string).collect(),
            offline,
        })
    }

    #[cfg(test)]
    fn with_api_hosts(mut self, hosts: &[&str]) -> Self {
        self.api_hosts = hosts.iter().map(ToString::to_string).collect();
        self
    }

    #[must_use]
    pub fn is_offline(&self) -> bool {
        self.offline
    }

    #[must_use]
    pub fn classify(&self, url: &str, navigate: bool) -> RequestClass {
        if let Ok(parsed) = reqwest::Url::parse(url) {
            if let Some(host) = parsed.host_str() {
                if self.api_hosts.iter().any(|h| h == host) {
                    return RequestClass::Api;
                }
            }
        }
        if navigate {
            return RequestClass::Navigation;
        }
        RequestClass::Asset
    }

    /// Route one request through the class policies.
    pub async fn route(&self, url: &str, navigate: bool) -> Result<RoutedResponse, CacheError> {
        match self.classify(url, navigate) {
            RequestClass::Api => match self.fetch(url).await {
                Ok(live) => {
                    self.dynamic_region.put(&live)?;
                    Ok(routed(live, ResponseSource::Network))
                }
                Err(e) => {
                    warn!(url, error = %e, "api request failed, serving offline page");
                    self.offline_fallback()
                }
            },
            RequestClass::Navigation => match self.fetch(url).await {
                Ok(live) => Ok(routed(live, ResponseSource::Network)),
                Err(e) => {
                    warn!(url, error = %e, "navigation failed, serving offline page");
                    self.offline_fallback()
                }
            },
            RequestClass::Asset => match self.fetch(url).await {
                Ok(live) => {
                    self.dynamic_region.put(&live)?;
                    Ok(routed(live, ResponseSource::Network))
                }
                Err(e) => {
                    if let Some((hit, region)) = self.match_any(url)? {
                        debug!(url, region, "served from cache");
                        return Ok(routed(hit, ResponseSource::Cache(region)));
                    }
                    warn!(url, error = %e, "not cached, serving offline page");
                    self.offline_fallback()
                }
            },
        }
    }

    async fn fetch(&self, url: &str) -> Result<CachedResponse> {
        if self.offline {
            bail!("offline mode active");
        }
        let resp = self.client.get(url).send().await?;
        let status = resp.status().as_u16();
        let content_type = resp
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(String::from);
        let body = resp.bytes().await?;
        Ok(CachedResponse {
            url: url.to_string(),
            status,
            content_type,
            stored_at: Utc::now(),
            body: body.to_vec(),
        })
    }

    /// Match a URL against every region, app shell first.
    fn match_any(&self, url: &str) -> Result<Option<(CachedResponse, &'static str)>, CacheError> {
        if let Some(hit) = self.static_region.get(url)? {
            return Ok(Some((hit, STATIC_REGION)));
        }
        if let Some(hit) = self.dynamic_region.get(url)? {
            return Ok(Some((hit, DYNAMIC_REGION)));
        }
        Ok(None)
    }

    fn offline_fallback(&self) -> Result<RoutedResponse, CacheError> {
        let url = format!("{}/offline.html", self.base_url);
        match self.match_any(&url)? {
            Some((hit, _)) => Ok(routed(hit, ResponseSource::OfflineFallback)),
            None => Err(CacheError::FallbackMissing),
        }
    }
}

fn routed(resp: CachedResponse, source: ResponseSource) -> RoutedResponse {
    RoutedResponse {
        url: resp.url,
        status: resp.status,
        content_type: resp.content_type,
        body: resp.body,
        source,
    }
}

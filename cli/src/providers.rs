use anyhow::{Context, Result, bail};

use larder_core::cache::CacheStore;
use larder_core::error::CacheError;
use larder_core::models::RecipeHit;
use larder_core::providers::{
    GeocodeResponse, MealDbResponse, SpoonacularRecipe, country_from_geocode, meal_to_hit,
    spoonacular_to_hit,
};
use larder_core::service::RecipeProvider;

use crate::config::Config;
use crate::router::{RequestRouter, ResponseSource, RoutedResponse};

const SPOONACULAR_URL: &str = "https://api.spoonacular.com/recipes/findByIngredients";
const MEALDB_URL: &str = "https://www.themealdb.com/api/json/v1/1/filter.php";
const OPENCAGE_URL: &str = "https://api.opencagedata.com/geocode/v1/json";

/// Recipe API client. Every request goes through the request router,
/// so API responses land in the dynamic cache region and network
/// failures degrade to the offline page.
pub struct ApiClient {
    router: RequestRouter,
    client: reqwest::Client,
    spoonacular_key: String,
    opencage_key: String,
    rt: tokio::runtime::Handle,
}

impl ApiClient {
    pub fn new(store: &CacheStore, config: &Config, offline: bool) -> Result<Self, CacheError> {
        let client = reqwest::Client::builder()
            .user_agent(format!(
                "larder-cli/{} (recipe keeper)",
                env!("CARGO_PKG_VERSION")
            ))
            .timeout(std::time::Duration::from_secs(10))
            .connect_timeout(std::time::Duration::from_secs(5))
            .build()
            .expect("Failed to build HTTP client");
        let router = RequestRouter::new(client.clone(), store, &config.base_url, offline)?;
        Ok(Self {
            router,
            client,
            spoonacular_key: config.spoonacular_key.clone(),
            opencage_key: config.opencage_key.clone(),
            rt: tokio::runtime::Handle::current(),
        })
    }

    pub fn http(&self) -> &reqwest::Client {
        &self.client
    }

    pub fn router(&self) -> &RequestRouter {
        &self.router
    }

    pub fn is_offline(&self) -> bool {
        self.router.is_offline()
    }

    /// Route a request, treating the offline page as an offline signal
    /// rather than a parseable API response.
    async fn routed(&self, url: &str) -> Result<RoutedResponse> {
        let resp = self.router.route(url, false).await?;
        if resp.source == ResponseSource::OfflineFallback {
            bail!("You are offline. Recipes cannot be fetched.");
        }
        Ok(resp)
    }

    pub async fn find_by_ingredients_async(&self, ingredients: &[String]) -> Result<Vec<RecipeHit>> {
        if self.spoonacular_key.is_empty() {
            bail!("SPOONACULAR_API_KEY is not set");
        }
        let query = ingredients.join(",+");
        let url = format!(
            "{SPOONACULAR_URL}?ingredients={query}&number=5&apiKey={}",
            self.spoonacular_key
        );

        let resp = self.routed(&url).await?;
        if !(200..300).contains(&resp.status) {
            bail!("Error fetching recipes.");
        }
        let recipes: Vec<SpoonacularRecipe> = serde_json::from_slice(&resp.body)
            .context("Failed to parse recipe search response")?;
        Ok(recipes.into_iter().filter_map(spoonacular_to_hit).collect())
    }

    pub async fn find_by_cuisine_async(&self, cuisine: &str) -> Result<Vec<RecipeHit>> {
        let url = format!("{MEALDB_URL}?a={cuisine}");

        let resp = self.routed(&url).await?;
        if !(200..300).contains(&resp.status) {
            bail!("API error!");
        }
        let data: MealDbResponse = serde_json::from_slice(&resp.body)
            .context("Failed to parse cuisine search response")?;
        Ok(data
            .meals
            .unwrap_or_default()
            .into_iter()
            .filter_map(meal_to_hit)
            .collect())
    }

    pub async fn country_at_async(&self, lat: f64, lon: f64) -> Result<Option<String>> {
        if self.opencage_key.is_empty() {
            bail!("OPENCAGE_API_KEY is not set");
        }
        let url = format!("{OPENCAGE_URL}?q={lat}+{lon}&key={}", self.opencage_key);

        let resp = self.routed(&url).await?;
        let data: GeocodeResponse =
            serde_json::from_slice(&resp.body).context("Failed to parse geocode response")?;
        Ok(country_from_geocode(&data))
    }
}

impl RecipeProvider for ApiClient {
    fn find_by_ingredients(&self, ingredients: &[String]) -> Result<Vec<RecipeHit>> {
        self.rt.block_on(self.find_by_ingredients_async(ingredients))
    }

    fn find_by_cuisine(&self, cuisine: &str) -> Result<Vec<RecipeHit>> {
        self.rt.block_on(self.find_by_cuisine_async(cuisine))
    }

    fn country_at(&self, lat: f64, lon: f64) -> Result<Option<String>> {
        self.rt.block_on(self.country_at_async(lat, lon))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use larder_core::cache::CachedResponse;

    use crate::lifecycle::STATIC_REGION;

    fn test_config(base_url: &str, spoonacular_key: &str, opencage_key: &str) -> Config {
        Config {
            db_path: "/tmp/larder-test.db".into(),
            data_dir: "/tmp".into(),
            cache_dir: "/tmp".into(),
            base_url: base_url.to_string(),
            spoonacular_key: spoonacular_key.to_string(),
            opencage_key: opencage_key.to_string(),
        }
    }

    #[tokio::test]
    async fn test_missing_spoonacular_key() {
        let dir = tempfile::tempdir().unwrap();
        let store = CacheStore::open(dir.path()).unwrap();
        let config = test_config("http://127.0.0.1:9", "", "");
        let client = ApiClient::new(&store, &config, true).unwrap();

        let err = client
            .find_by_ingredients_async(&["egg".to_string()])
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "SPOONACULAR_API_KEY is not set");
    }

    #[tokio::test]
    async fn test_missing_opencage_key() {
        let dir = tempfile::tempdir().unwrap();
        let store = CacheStore::open(dir.path()).unwrap();
        let config = test_config("http://127.0.0.1:9", "", "");
        let client = ApiClient::new(&store, &config, true).unwrap();

        let err = client.country_at_async(39.92, 32.85).await.unwrap_err();
        assert_eq!(err.to_string(), "OPENCAGE_API_KEY is not set");
    }

    #[tokio::test]
    async fn test_offline_fallback_surfaces_as_offline_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = CacheStore::open(dir.path()).unwrap();
        let base_url = "http://127.0.0.1:9";
        store
            .region(STATIC_REGION)
            .unwrap()
            .put(&CachedResponse {
                url: format!("{base_url}/offline.html"),
                status: 200,
                content_type: Some("text/html".to_string()),
                stored_at: Utc::now(),
                body: b"<h1>You are offline</h1>".to_vec(),
            })
            .unwrap();

        let config = test_config(base_url, "test-key", "");
        let client = ApiClient::new(&store, &config, true).unwrap();

        // The router answers with the offline page; the client must not
        // try to parse it as JSON
        let err = client
            .find_by_ingredients_async(&["egg".to_string()])
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "You are offline. Recipes cannot be fetched.");
    }

    // --- Integration tests (hit real recipe APIs) ---

    #[tokio::test]
    #[ignore = "hits TheMealDB API"]
    async fn test_find_by_cuisine_live() {
        let dir = tempfile::tempdir().unwrap();
        let store = CacheStore::open(dir.path()).unwrap();
        let config = test_config("http://127.0.0.1:8080", "", "");
        let client = ApiClient::new(&store, &config, false).unwrap();

        let hits = client.find_by_cuisine_async("Turkish").await.unwrap();
        assert!(!hits.is_empty());
        for hit in &hits {
            assert!(!hit.title.is_empty());
            assert!(hit.link.starts_with("https://www.themealdb.com/meal/"));
        }
    }
}

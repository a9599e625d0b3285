use anyhow::{Context, Result};
use directories::ProjectDirs;
use std::path::PathBuf;

pub struct Config {
    pub db_path: PathBuf,
    pub data_dir: PathBuf,
    pub cache_dir: PathBuf,
    pub base_url: String,
    pub spoonacular_key: String,
    pub opencage_key: String,
}

impl Config {
    pub fn load() -> Result<Self> {
        let proj_dirs =
            ProjectDirs::from("", "", "larder").context("Could not determine home directory")?;

        let data_dir = proj_dirs.data_dir().to_path_buf();
        std::fs::create_dir_all(&data_dir)
            .with_context(|| format!("Failed to create data directory: {}", data_dir.display()))?;

        let db_path = data_dir.join("larder.db");
        let cache_dir = data_dir.join("cache");

        let base_url = std::env::var("LARDER_SYNC_URL")
            .unwrap_or_else(|_| "http://127.0.0.1:8080".to_string());
        let base_url = base_url.trim_end_matches('/').to_string();

        Ok(Config {
            db_path,
            data_dir,
            cache_dir,
            base_url,
            spoonacular_key: std::env::var("SPOONACULAR_API_KEY").unwrap_or_default(),
            opencage_key: std::env::var("OPENCAGE_API_KEY").unwrap_or_default(),
        })
    }

    /// Bearer token for talking to the sync backend, if one is
    /// configured. Never creates the token file.
    pub fn sync_token(&self) -> Option<String> {
        if let Ok(token) = std::env::var("LARDER_SYNC_TOKEN") {
            let token = token.trim().to_string();
            if !token.is_empty() {
                return Some(token);
            }
        }
        let path = self.data_dir.join("api_key");
        let token = std::fs::read_to_string(path).ok()?.trim().to_string();
        if token.is_empty() { None } else { Some(token) }
    }

    /// Load the API key from disk, or generate a new one.
    ///
    /// Returns `(key, newly_created)` where `newly_created` is true when a
    /// fresh key was just generated (first run).
    pub fn load_or_create_api_key(&self) -> Result<(String, bool)> {
        use rand::Rng;
        use std::fmt::Write;

        let path = self.data_dir.join("api_key");

        if path.exists() {
            let key = std::fs::read_to_string(&path).context("Failed to read API key file")?;
            let key = key.trim().to_string();
            if !key.is_empty() {
                return Ok((key, false));
            }
        }

        let bytes: [u8; 32] = rand::rng().random();
        let key = bytes
            .iter()
            .fold(String::with_capacity(64), |mut acc: String, b| {
                let _ = write!(acc, "{b:02x}");
                acc
            });
        std::fs::write(&path, &key).context("Failed to write API key file")?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o600))
                .context("Failed to set API key file permissions")?;
        }
        eprintln!("Generated new API key: {key}");
        eprintln!("Include in requests: Authorization: Bearer {key}");
        Ok((key, true))
    }
}

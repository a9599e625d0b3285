use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use std::time::SystemTime;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::error::CacheError;

/// A response captured from the network. `put` stores a copy; `get`
/// returns it byte-identical.
#[derive(Debug, Clone)]
pub struct CachedResponse {
    pub url: String,
    pub status: u16,
    pub content_type: Option<String>,
    pub stored_at: DateTime<Utc>,
    pub body: Vec<u8>,
}

/// Sidecar metadata persisted next to each body file.
#[derive(Debug, Serialize, Deserialize)]
struct EntryMeta {
    url: String,
    status: u16,
    content_type: Option<String>,
    stored_at: DateTime<Utc>,
    body_len: u64,
}

#[derive(Debug, Clone)]
struct Entry {
    size: u64,
    last_accessed: SystemTime,
}

/// The set of named cache regions under one root directory. Region names
/// embed the generation token, so bumping the token and deleting the
/// old names invalidates a whole generation at once.
pub struct CacheStore {
    root: PathBuf,
}

impl CacheStore {
    pub fn open(root: &Path) -> Result<Self, CacheError> {
        fs::create_dir_all(root)?;
        Ok(Self {
            root: root.to_path_buf(),
        })
    }

    /// Open (creating if needed) an unbounded region.
    pub fn region(&self, name: &str) -> Result<CacheRegion, CacheError> {
        CacheRegion::open(self.root.join(name), name, None)
    }

    /// Open a region with a byte budget; writes beyond it evict the
    /// least recently used entries.
    pub fn bounded_region(&self, name: &str, max_bytes: u64) -> Result<CacheRegion, CacheError> {
        CacheRegion::open(self.root.join(name), name, Some(max_bytes))
    }

    pub fn list_regions(&self) -> Result<Vec<String>, CacheError> {
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                names.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        names.sort();
        Ok(names)
    }

    /// Delete a region and everything in it. Returns false when no such
    /// region exists.
    pub fn delete_region(&self, name: &str) -> Result<bool, CacheError> {
        let dir = self.root.join(name);
        if !dir.is_dir() {
            return Ok(false);
        }
        fs::remove_dir_all(&dir)?;
        debug!(region = name, "deleted cache region");
        Ok(true)
    }
}

/// One named URL → response store on disk. Entries are a pair of files
/// keyed by the SHA-256 of the URL: `<key>.json` metadata and `<key>.bin`
/// body, written atomically via temp-file rename. Entry bookkeeping for
/// LRU eviction lives in memory and is rebuilt by scanning the directory
/// on open.
pub struct CacheRegion {
    name: String,
    dir: PathBuf,
    max_bytes: Option<u64>,
    entries: Mutex<HashMap<String, Entry>>,
}

impl CacheRegion {
    fn open(dir: PathBuf, name: &str, max_bytes: Option<u64>) -> Result<Self, CacheError> {
        fs::create_dir_all(&dir)?;

        let mut entries = HashMap::new();
        for item in fs::read_dir(&dir)? {
            let path = item?.path();
            match path.extension().and_then(|e| e.to_str()) {
                Some("bin") => {
                    let meta = fs::metadata(&path)?;
                    let key = path
                        .file_stem()
                        .map(|s| s.to_string_lossy().into_owned())
                        .unwrap_or_default();
                    entries.insert(
                        key,
                        Entry {
                            size: meta.len(),
                            last_accessed: meta.modified().unwrap_or(SystemTime::UNIX_EPOCH),
                        },
                    );
                }
                Some("json") => {}
                // Leftover temp file from an interrupted write
                _ => {
                    let _ = fs::remove_file(&path);
                }
            }
        }

        Ok(Self {
            name: name.to_string(),
            dir,
            max_bytes,
            entries: Mutex::new(entries),
        })
    }

    fn key_for(url: &str) -> String {
        let digest = Sha256::digest(url.as_bytes());
        format!("{digest:x}")
    }

    /// Store a copy of a response, overwriting any prior entry for the
    /// same URL, then enforce the byte budget.
    pub fn put(&self, response: &CachedResponse) -> Result<(), CacheError> {
        let key = Self::key_for(&response.url);
        let meta = EntryMeta {
            url: response.url.clone(),
            status: response.status,
            content_type: response.content_type.clone(),
            stored_at: response.stored_at,
            body_len: response.body.len() as u64,
        };

        self.write_atomic(&format!("{key}.bin"), &response.body)?;
        self.write_atomic(&format!("{key}.json"), &serde_json::to_vec(&meta)?)?;

        debug!(
            region = %self.name,
            url = %response.url,
            status = response.status,
            size = response.body.len(),
            "cached response"
        );

        {
            let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
            entries.insert(
                key,
                Entry {
                    size: response.body.len() as u64,
                    last_accessed: SystemTime::now(),
                },
            );
        }
        self.evict_if_needed();
        Ok(())
    }

    /// Look a URL up. A hit refreshes the entry's LRU position. An entry
    /// whose body does not match its recorded length is dropped as
    /// corrupt and reported as a miss.
    pub fn get(&self, url: &str) -> Result<Option<CachedResponse>, CacheError> {
        let key = Self::key_for(url);
        let meta_path = self.dir.join(format!("{key}.json"));
        let body_path = self.dir.join(format!("{key}.bin"));

        let meta_bytes = match fs::read(&meta_path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let meta: EntryMeta = serde_json::from_slice(&meta_bytes)?;

        let body = match fs::read(&body_path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        if body.len() as u64 != meta.body_len {
            warn!(region = %self.name, url, "cache entry size mismatch, dropping");
            self.remove(&key);
            return Ok(None);
        }

        {
            let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
            if let Some(entry) = entries.get_mut(&key) {
                entry.last_accessed = SystemTime::now();
            }
        }

        Ok(Some(CachedResponse {
            url: meta.url,
            status: meta.status,
            content_type: meta.content_type,
            stored_at: meta.stored_at,
            body,
        }))
    }

    pub fn contains(&self, url: &str) -> bool {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(&Self::key_for(url))
    }

    pub fn entry_count(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    fn write_atomic(&self, file_name: &str, data: &[u8]) -> Result<(), CacheError> {
        let mut tmp = tempfile::NamedTempFile::new_in(&self.dir)?;
        tmp.write_all(data)?;
        tmp.persist(self.dir.join(file_name))
            .map_err(|e| CacheError::Io(e.error))?;
        Ok(())
    }

    fn remove(&self, key: &str) {
        let _ = fs::remove_file(self.dir.join(format!("{key}.bin")));
        let _ = fs::remove_file(self.dir.join(format!("{key}.json")));
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
    }

    /// Drop least-recently-used entries until the region fits its budget.
    fn evict_if_needed(&self) {
        let Some(max_bytes) = self.max_bytes else {
            return;
        };

        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        let total: u64 = entries.values().map(|e| e.size).sum();
        if total <= max_bytes {
            return;
        }

        let mut sorted: Vec<(String, Entry)> = entries
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        sorted.sort_by(|a, b| a.1.last_accessed.cmp(&b.1.last_accessed));

        let target = total - max_bytes;
        let mut freed: u64 = 0;
        for (key, entry) in sorted {
            if freed >= target {
                break;
            }
            let _ = fs::remove_file(self.dir.join(format!("{key}.bin")));
            let _ = fs::remove_file(self.dir.join(format!("{key}.json")));
            entries.remove(&key);
            freed += entry.size;
            debug!(region = %self.name, size = entry.size, "evicted cache entry");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(url: &str, body: &[u8]) -> CachedResponse {
        CachedResponse {
            url: url.to_string(),
            status: 200,
            content_type: Some("text/html".to_string()),
            stored_at: Utc::now(),
            body: body.to_vec(),
        }
    }

    #[test]
    fn test_put_get_byte_identical() {
        let dir = tempfile::tempdir().unwrap();
        let store = CacheStore::open(dir.path()).unwrap();
        let region = store.region("recipe-app-v3").unwrap();

        let body = b"<html>offline</html>".to_vec();
        region
            .put(&response("https://app.example/offline.html", &body))
            .unwrap();

        let hit = region
            .get("https://app.example/offline.html")
            .unwrap()
            .unwrap();
        assert_eq!(hit.body, body);
        assert_eq!(hit.status, 200);
        assert_eq!(hit.content_type.as_deref(), Some("text/html"));
    }

    #[test]
    fn test_get_miss_returns_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = CacheStore::open(dir.path()).unwrap();
        let region = store.region("dynamic-cache-v3").unwrap();
        assert!(region.get("https://app.example/missing").unwrap().is_none());
        assert!(!region.contains("https://app.example/missing"));
    }

    #[test]
    fn test_put_overwrites_same_url() {
        let dir = tempfile::tempdir().unwrap();
        let store = CacheStore::open(dir.path()).unwrap();
        let region = store.region("dynamic-cache-v3").unwrap();

        region.put(&response("https://a/x", b"old")).unwrap();
        region.put(&response("https://a/x", b"new")).unwrap();

        assert_eq!(region.entry_count(), 1);
        let hit = region.get("https://a/x").unwrap().unwrap();
        assert_eq!(hit.body, b"new");
    }

    #[test]
    fn test_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = CacheStore::open(dir.path()).unwrap();
            let region = store.region("recipe-app-v3").unwrap();
            region.put(&response("https://a/asset.css", b"body{}")).unwrap();
        }
        let store = CacheStore::open(dir.path()).unwrap();
        let region = store.region("recipe-app-v3").unwrap();
        assert_eq!(region.entry_count(), 1);
        let hit = region.get("https://a/asset.css").unwrap().unwrap();
        assert_eq!(hit.body, b"body{}");
    }

    #[test]
    fn test_lru_eviction_drops_oldest_first() {
        let dir = tempfile::tempdir().unwrap();
        let store = CacheStore::open(dir.path()).unwrap();
        // Budget fits two 40-byte bodies but not three
        let region = store.bounded_region("dynamic-cache-v3", 100).unwrap();

        region.put(&response("https://a/1", &[1u8; 40])).unwrap();
        region.put(&response("https://a/2", &[2u8; 40])).unwrap();
        // Refresh entry 1 so entry 2 is now the oldest
        region.get("https://a/1").unwrap().unwrap();
        region.put(&response("https://a/3", &[3u8; 40])).unwrap();

        assert!(region.contains("https://a/1"));
        assert!(!region.contains("https://a/2"));
        assert!(region.contains("https://a/3"));
        assert!(region.get("https://a/2").unwrap().is_none());
    }

    #[test]
    fn test_unbounded_region_never_evicts() {
        let dir = tempfile::tempdir().unwrap();
        let store = CacheStore::open(dir.path()).unwrap();
        let region = store.region("recipe-app-v3").unwrap();
        for i in 0..20 {
            region
                .put(&response(&format!("https://a/{i}"), &[0u8; 512]))
                .unwrap();
        }
        assert_eq!(region.entry_count(), 20);
    }

    #[test]
    fn test_list_and_delete_regions() {
        let dir = tempfile::tempdir().unwrap();
        let store = CacheStore::open(dir.path()).unwrap();
        store.region("recipe-app-v2").unwrap();
        store.region("recipe-app-v3").unwrap();
        store.region("dynamic-cache-v3").unwrap();

        assert_eq!(
            store.list_regions().unwrap(),
            vec!["dynamic-cache-v3", "recipe-app-v2", "recipe-app-v3"]
        );

        assert!(store.delete_region("recipe-app-v2").unwrap());
        assert!(!store.delete_region("recipe-app-v2").unwrap());
        assert_eq!(
            store.list_regions().unwrap(),
            vec!["dynamic-cache-v3", "recipe-app-v3"]
        );
    }

    #[test]
    fn test_truncated_body_treated_as_miss() {
        let dir = tempfile::tempdir().unwrap();
        let store = CacheStore::open(dir.path()).unwrap();
        let region = store.region("dynamic-cache-v3").unwrap();
        region.put(&response("https://a/x", b"full body")).unwrap();

        let key = CacheRegion::key_for("https://a/x");
        fs::write(dir.path().join("dynamic-cache-v3").join(format!("{key}.bin")), b"cut").unwrap();

        assert!(region.get("https://a/x").unwrap().is_none());
        assert!(!region.contains("https://a/x"));
    }
}

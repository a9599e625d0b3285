use std::io;

/// Classified failures from the persistent store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The backing database could not be opened at all. Persistence is
    /// unavailable; callers degrade to an in-memory store.
    #[error("local storage unavailable: {0}")]
    UnsupportedEnvironment(#[source] rusqlite::Error),

    /// The recipes table predates the synced index. Recoverable: callers
    /// that only need the unsynced subset treat it as an empty result.
    #[error("recipes store has no synced index yet")]
    IndexMissing,

    /// A statement or transaction was rejected. The write is lost.
    #[error("transaction failed: {0}")]
    Transaction(#[from] rusqlite::Error),
}

impl StoreError {
    /// True for conditions a reader may satisfy with an empty result
    /// instead of failing.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, StoreError::IndexMissing)
    }
}

/// Failures from the disk cache regions.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("cache io: {0}")]
    Io(#[from] io::Error),

    #[error("cache entry metadata unreadable: {0}")]
    Metadata(#[from] serde_json::Error),

    /// Network and cache both missed and the offline page is not cached
    /// either, so there is nothing left to serve.
    #[error("offline fallback page is not cached")]
    FallbackMissing,
}

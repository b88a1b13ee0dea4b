// On-disk persistence shared by the structure cache and the vector index


use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::fs;
use tracing::{debug, warn};

/// Source of "now" for freshness decisions
#[derive(Clone)]
pub struct Clock(Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>);

impl Clock {
    #[inline]
    pub fn system() -> Self {
        Self::from_fn(Utc::now)
    }

    /// A clock frozen at `instant`
    #[inline]
    pub fn fixed(instant: DateTime<Utc>) -> Self {
        Self::from_fn(move || instant)
    }

    #[inline]
    pub fn from_fn<F>(now: F) -> Self
    where
        F: Fn() -> DateTime<Utc> + Send + Sync + 'static,
    {
        Self(Arc::new(now))
    }

    #[inline]
    pub fn now(&self) -> DateTime<Utc> {
        (self.0)()
    }

    /// Time elapsed since `then`; timestamps in the future count as zero age
    #[inline]
    pub fn age_of(&self, then: DateTime<Utc>) -> Duration {
        self.now()
            .signed_duration_since(then)
            .to_std()
            .unwrap_or(Duration::ZERO)
    }
}

impl Default for Clock {
    #[inline]
    fn default() -> Self {
        Self::system()
    }
}

impl fmt::Debug for Clock {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Clock").field(&self.now()).finish()
    }
}

/// Read a JSON file. A missing or malformed file is a cache miss, not an error.
pub async fn read_json<T: DeserializeOwned>(path: &Path) -> Option<T> {
    let content = match fs::read(path).await {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!("No cache file at {}", path.display());
            return None;
        }
        Err(e) => {
            warn!("Failed to read cache file {}: {}", path.display(), e);
            return None;
        }
    };

    match serde_json::from_slice(&content) {
        Ok(value) => Some(value),
        Err(e) => {
            warn!("Ignoring corrupt cache file {}: {}", path.display(), e);
            None
        }
    }
}

/// Serialize `value` to `path` via a temporary sibling and a rename, so readers
/// never observe a truncated file.
pub async fn write_json_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .await
            .with_context(|| format!("Failed to create cache directory: {}", parent.display()))?;
    }

    let json = serde_json::to_vec(value).context("Failed to serialize cache file")?;

    let temp_path = path.with_extension("json.tmp");
    fs::write(&temp_path, json)
        .await
        .with_context(|| format!("Failed to write cache file: {}", temp_path.display()))?;

    fs::rename(&temp_path, path)
        .await
        .with_context(|| format!("Failed to rename cache file into {}", path.display()))?;

    debug!("Wrote cache file {}", path.display());
    Ok(())
}

/// Remove a file, treating "already gone" as success
pub async fn remove_if_exists(path: &Path) -> Result<()> {
    match fs::remove_file(path).await {
        Ok(()) => {
            debug!("Removed {}", path.display());
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => {
            Err(e).with_context(|| format!("Failed to remove cache file: {}", path.display()))
        }
    }
}

//! Disk cache for weather icon images.
//!
//! One file per icon key (`{key}@2x.{ext}`) under the cache directory. A file
//! is served without network access while it is fresh for the current local
//! day; otherwise it is refetched lazily. Nothing is ever swept.
//!
//! Concurrent requests for the same key share one download: the in-flight map
//! holds a [`Shared`] future per key and the lookup-or-insert happens under a
//! single lock acquisition.

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Local, Utc};
use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::fs;

use crate::provider::IconFetcher;

/// Global "last cache refresh" marker, shared by every key.
pub const MARKER_FILE: &str = ".last_refresh";
const STAMP_SUFFIX: &str = ".stamp";
const PARTIAL_SUFFIX: &str = ".partial";

/// Distinguishes concurrent temp files aimed at the same target.
static WRITE_SEQ: AtomicU64 = AtomicU64::new(0);

/// How a cached file is judged fresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum FreshnessPolicy {
    /// Any file is fresh if *some* icon was fetched today. A fetch for one key
    /// revalidates every other cached key.
    #[default]
    GlobalMarker,
    /// Each file is fresh only if it was itself fetched today.
    PerEntry,
}

/// Result of an icon lookup. Failures collapse to `Unavailable`, which the
/// renderer shows as the generic "unknown condition" glyph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IconImage {
    Ready(Arc<[u8]>),
    Unavailable,
}

impl IconImage {
    pub fn bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Ready(bytes) => Some(&**bytes),
            Self::Unavailable => None,
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self, Self::Ready(_))
    }
}

type SharedFetch = Shared<BoxFuture<'static, IconImage>>;

#[derive(Clone)]
pub struct IconCache {
    inner: Arc<Inner>,
}

struct Inner {
    dir: PathBuf,
    extension: String,
    policy: FreshnessPolicy,
    fetcher: Arc<dyn IconFetcher>,
    in_flight: Mutex<HashMap<String, SharedFetch>>,
}

impl std::fmt::Debug for IconCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IconCache")
            .field("dir", &self.inner.dir)
            .field("extension", &self.inner.extension)
            .field("policy", &self.inner.policy)
            .finish_non_exhaustive()
    }
}

impl IconCache {
    pub fn new(
        dir: impl Into<PathBuf>,
        extension: impl Into<String>,
        policy: FreshnessPolicy,
        fetcher: Arc<dyn IconFetcher>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                dir: dir.into(),
                extension: extension.into(),
                policy,
                fetcher,
                in_flight: Mutex::new(HashMap::new()),
            }),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.inner.dir
    }

    pub fn policy(&self) -> FreshnessPolicy {
        self.inner.policy
    }

    /// Path of the cached file for `icon_key`.
    pub fn icon_path(&self, icon_key: &str) -> PathBuf {
        self.inner.icon_path(icon_key)
    }

    /// Resolve an icon: fresh disk copy, else join or start the download.
    pub async fn get_image(&self, icon_key: &str) -> IconImage {
        if !is_valid_key(icon_key) {
            tracing::warn!("Rejected icon key {:?}", icon_key);
            return IconImage::Unavailable;
        }

        if let Some(bytes) = self.inner.read_fresh(icon_key).await {
            tracing::debug!("Icon {} served from disk", icon_key);
            return IconImage::Ready(bytes);
        }

        self.join_or_start(icon_key).await
    }

    /// Number of downloads currently in flight.
    pub fn in_flight(&self) -> usize {
        self.inner.in_flight.lock().len()
    }

    /// Remove every cached file and the refresh marker.
    ///
    /// # Errors
    /// Returns the first I/O error other than a missing directory.
    pub async fn clear(&self) -> io::Result<()> {
        let mut entries = match fs::read_dir(&self.inner.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(e),
        };
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_file() {
                fs::remove_file(entry.path()).await?;
            }
        }
        tracing::info!("Icon cache cleared: {}", self.inner.dir.display());
        Ok(())
    }

    /// Live handles on the in-flight download for `icon_key` (map entry included).
    #[cfg(test)]
    fn handles(&self, icon_key: &str) -> usize {
        self.inner
            .in_flight
            .lock()
            .get(icon_key)
            .and_then(Shared::strong_count)
            .unwrap_or(0)
    }

    fn join_or_start(&self, icon_key: &str) -> SharedFetch {
        let mut in_flight = self.inner.in_flight.lock();
        if let Some(existing) = in_flight.get(icon_key) {
            tracing::debug!("Joining in-flight fetch for icon {}", icon_key);
            return existing.clone();
        }

        let inner = Arc::clone(&self.inner);
        let key = icon_key.to_string();
        let fetch = async move {
            let image = inner.fetch_and_store(&key).await;
            inner.in_flight.lock().remove(&key);
            image
        }
        .boxed()
        .shared();

        in_flight.insert(icon_key.to_string(), fetch.clone());
        fetch
    }
}

impl Inner {
    fn icon_path(&self, icon_key: &str) -> PathBuf {
        self.dir.join(format!("{}@2x.{}", icon_key, self.extension))
    }

    fn stamp_path(&self, icon_key: &str) -> PathBuf {
        match self.policy {
            FreshnessPolicy::GlobalMarker => self.dir.join(MARKER_FILE),
            FreshnessPolicy::PerEntry => {
                let mut name = self.icon_path(icon_key).into_os_string();
                name.push(STAMP_SUFFIX);
                PathBuf::from(name)
            }
        }
    }

    async fn read_fresh(&self, icon_key: &str) -> Option<Arc<[u8]>> {
        if !self.is_fresh(icon_key).await {
            return None;
        }
        match fs::read(self.icon_path(icon_key)).await {
            Ok(bytes) => Some(Arc::from(bytes)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => None,
            Err(e) => {
                tracing::warn!("Failed to read cached icon {}: {}", icon_key, e);
                None
            }
        }
    }

    async fn is_fresh(&self, icon_key: &str) -> bool {
        let Ok(raw) = fs::read_to_string(self.stamp_path(icon_key)).await else {
            return false;
        };
        match DateTime::parse_from_rfc3339(raw.trim()) {
            Ok(stamp) => is_today(stamp.with_timezone(&Utc)),
            Err(e) => {
                tracing::warn!("Ignoring unreadable icon cache stamp: {}", e);
                false
            }
        }
    }

    async fn fetch_and_store(&self, icon_key: &str) -> IconImage {
        match self.fetcher.fetch_icon_bytes(icon_key).await {
            Ok(bytes) => {
                if let Err(e) = self.store(icon_key, &bytes).await {
                    tracing::warn!("Failed to cache icon {}: {}", icon_key, e);
                } else {
                    tracing::info!("Cached icon {} ({} bytes)", icon_key, bytes.len());
                }
                IconImage::Ready(Arc::from(bytes))
            }
            Err(e) => {
                tracing::warn!("Icon {} unavailable: {}", icon_key, e);
                IconImage::Unavailable
            }
        }
    }

    async fn store(&self, icon_key: &str, bytes: &[u8]) -> io::Result<()> {
        fs::create_dir_all(&self.dir).await?;
        write_atomic(&self.icon_path(icon_key), bytes).await?;
        self.record_fetch(icon_key, Utc::now()).await
    }

    async fn record_fetch(&self, icon_key: &str, at: DateTime<Utc>) -> io::Result<()> {
        write_atomic(&self.stamp_path(icon_key), at.to_rfc3339().as_bytes()).await
    }
}

/// Write to a uniquely named sibling temp file, then rename over the target.
/// Concurrent writers to one target each rename a complete file; the last wins.
async fn write_atomic(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let seq = WRITE_SEQ.fetch_add(1, Ordering::Relaxed);
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(format!(".{}.{}{}", std::process::id(), seq, PARTIAL_SUFFIX));
    let tmp = PathBuf::from(tmp);

    if let Err(e) = fs::write(&tmp, bytes).await {
        let _ = fs::remove_file(&tmp).await;
        return Err(e);
    }
    fs::rename(&tmp, path).await
}

fn is_today(stamp: DateTime<Utc>) -> bool {
    stamp.with_timezone(&Local).date_naive() == Local::now().date_naive()
}

/// Icon keys become file names; anything that could escape the directory is refused.
fn is_valid_key(icon_key: &str) -> bool {
    !icon_key.is_empty()
        && !icon_key.starts_with('.')
        && !icon_key.contains("..")
        && !icon_key.contains(['/', '\\'])
}

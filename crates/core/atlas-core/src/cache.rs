//! TTL-gated spec caching.

use std::future::Future;
use std::sync::Arc;

use anyhow::Result;
use atlas_model::Timestamped;
use chrono::{Duration, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value as JsonValue;

/// Per-node cache handle provided by the host storage layer. Stages only
/// ever read and write specs through this contract.
pub trait SpecCache: Send + Sync {
    fn get(&self, key: &str) -> Option<JsonValue>;
    fn set(&self, key: &str, value: JsonValue);
}

/// View of a shared cache scoped to one node, by key prefixing.
pub struct ScopedCache {
    inner: Arc<dyn SpecCache>,
    prefix: String,
}

impl ScopedCache {
    pub fn new(inner: Arc<dyn SpecCache>, node_name: &str) -> Self {
        Self {
            inner,
            prefix: format!("{node_name}/"),
        }
    }
}

impl SpecCache for ScopedCache {
    fn get(&self, key: &str) -> Option<JsonValue> {
        self.inner.get(&format!("{}{key}", self.prefix))
    }

    fn set(&self, key: &str, value: JsonValue) {
        self.inner.set(&format!("{}{key}", self.prefix), value)
    }
}

/// Reuse a cached spec while fresh; refetch when stale.
///
/// A fresh cached spec is returned without invoking `fetch` at all. When the
/// spec is stale (or absent) `fetch` runs once; on success the new spec is
/// stored with its refreshed fetch date, on failure (or an empty upstream
/// answer) the previous, possibly stale spec is kept rather than erroring
/// the node.
pub async fn cached_fetch<T, F, Fut>(
    cache: &dyn SpecCache,
    key: &str,
    ttl: Duration,
    fetch: F,
) -> Option<T>
where
    T: Timestamped + Serialize + DeserializeOwned,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<Option<T>>>,
{
    let cached: Option<T> = cache
        .get(key)
        .and_then(|value| serde_json::from_value(value).ok());

    if let Some(spec) = &cached {
        if spec.is_fresh(ttl, Utc::now()) {
            tracing::trace!(target: "atlas_core", key, "cache hit, spec fresh");
            return cached;
        }
    }

    match fetch().await {
        Ok(Some(fresh)) => {
            match serde_json::to_value(&fresh) {
                Ok(value) => cache.set(key, value),
                Err(err) => {
                    tracing::warn!(target: "atlas_core", key, error = ?err, "spec not serializable, skipping cache write");
                }
            }
            Some(fresh)
        }
        Ok(None) => {
            tracing::debug!(target: "atlas_core", key, "upstream returned no spec, keeping cached value");
            cached
        }
        Err(err) => {
            tracing::warn!(
                target: "atlas_core",
                key,
                error = ?err,
                "spec refetch failed, keeping stale value"
            );
            cached
        }
    }
}

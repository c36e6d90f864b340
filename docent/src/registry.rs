//! Process-wide cache of per-tenant engines.
//!
//! Only the registry creates or destroys engines. The map is guarded by a
//! single `RwLock`: reads of a clean cached engine take the read half (the
//! hot path), while creation, destruction, and dirty-flag reloads
//! serialize on the write half, so a concurrent `get` during a destroy
//! blocks until the destroy completes.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rustc_hash::FxHashMap;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::engine::Engine;
use crate::error::DocentError;
use crate::models::{Embedder, Generator, Reranker};
use crate::tenant::{CacheKey, TenantContext};

/// Pause between destroying an engine and recreating it, letting file
/// handles release.
const DESTROY_SETTLE: Duration = Duration::from_millis(500);

#[derive(Default)]
struct RegistryInner {
    engines: FxHashMap<CacheKey, Arc<Engine>>,
    last_reload: FxHashMap<CacheKey, DateTime<Utc>>,
    needs_reload: FxHashMap<CacheKey, bool>,
}

pub struct TenantRegistry {
    inner: RwLock<RegistryInner>,
    collection_name: String,
    embedder: Arc<dyn Embedder>,
    reranker: Arc<dyn Reranker>,
    generator: Arc<dyn Generator>,
}

impl TenantRegistry {
    pub fn new(
        collection_name: impl Into<String>,
        embedder: Arc<dyn Embedder>,
        reranker: Arc<dyn Reranker>,
        generator: Arc<dyn Generator>,
    ) -> Self {
        Self {
            inner: RwLock::new(RegistryInner::default()),
            collection_name: collection_name.into(),
            embedder,
            reranker,
            generator,
        }
    }

    /// Resolves the tenant's engine, creating it on first use.
    ///
    /// `force_reload` destroys any cached instance first. Otherwise a set
    /// dirty flag triggers an in-place vector reload under the write lock
    /// before the engine is returned.
    pub async fn get(
        &self,
        ctx: &TenantContext,
        force_reload: bool,
    ) -> Result<Arc<Engine>, DocentError> {
        let key = ctx.cache_key();

        if force_reload {
            let mut inner = self.inner.write().await;
            if let Some(old) = inner.engines.remove(&key) {
                info!(resource_id = %ctx.resource_id, "force reload: destroying cached engine");
                old.close().await;
                inner.last_reload.remove(&key);
                tokio::time::sleep(DESTROY_SETTLE).await;
            }
            inner.needs_reload.remove(&key);
            return self.create_locked(&mut inner, ctx, key).await;
        }

        // Hot path: cached engine with a clean flag.
        {
            let inner = self.inner.read().await;
            if let Some(engine) = inner.engines.get(&key) {
                if !inner.needs_reload.get(&key).copied().unwrap_or(false) {
                    return Ok(Arc::clone(engine));
                }
            }
        }

        let mut inner = self.inner.write().await;
        if let Some(engine) = inner.engines.get(&key).cloned() {
            if inner.needs_reload.get(&key).copied().unwrap_or(false) {
                info!(resource_id = %ctx.resource_id, "dirty flag set: reloading vector store");
                let documents = engine.reload_vectors().await?;
                inner.needs_reload.insert(key.clone(), false);
                inner.last_reload.insert(key, Utc::now());
                debug!(documents, "dirty-flag reload complete");
            }
            return Ok(engine);
        }

        self.create_locked(&mut inner, ctx, key).await
    }

    async fn create_locked(
        &self,
        inner: &mut RegistryInner,
        ctx: &TenantContext,
        key: CacheKey,
    ) -> Result<Arc<Engine>, DocentError> {
        info!(resource_id = %ctx.resource_id, "creating engine");
        let engine = Arc::new(
            Engine::open(
                ctx.clone(),
                &self.collection_name,
                Arc::clone(&self.embedder),
                Arc::clone(&self.reranker),
                Arc::clone(&self.generator),
            )
            .await?,
        );
        inner.engines.insert(key.clone(), Arc::clone(&engine));
        inner.last_reload.insert(key.clone(), Utc::now());
        inner.needs_reload.insert(key, false);
        Ok(engine)
    }

    /// Destroys the tenant's cached engine if present and marks the key
    /// dirty either way, so the next `get` observes fresh on-disk state.
    /// Returns whether an instance was destroyed.
    pub async fn invalidate(&self, ctx: &TenantContext) -> bool {
        let key = ctx.cache_key();
        let mut inner = self.inner.write().await;
        let destroyed = match inner.engines.remove(&key) {
            Some(engine) => {
                info!(resource_id = %ctx.resource_id, "destroying cached engine");
                engine.close().await;
                inner.last_reload.remove(&key);
                true
            }
            None => false,
        };
        inner.needs_reload.insert(key, true);
        destroyed
    }

    /// Sets the dirty flag without touching any live instance. The next
    /// `get` for this tenant reloads exactly once.
    pub async fn mark_dirty(&self, ctx: &TenantContext) {
        let key = ctx.cache_key();
        let mut inner = self.inner.write().await;
        inner.needs_reload.insert(key, true);
        debug!(resource_id = %ctx.resource_id, "dirty flag set");
    }

    /// When the tenant's engine last (re)loaded its vector store.
    pub async fn last_reload(&self, ctx: &TenantContext) -> Option<DateTime<Utc>> {
        let inner = self.inner.read().await;
        inner.last_reload.get(&ctx.cache_key()).copied()
    }

    /// Closes every engine's record-store connection and clears the map.
    pub async fn close_all(&self) {
        let mut inner = self.inner.write().await;
        for engine in inner.engines.values() {
            engine.close().await;
        }
        inner.engines.clear();
        inner.last_reload.clear();
        inner.needs_reload.clear();
    }
}

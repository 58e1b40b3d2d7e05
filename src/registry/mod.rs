//! 惰性提供方注册表：按需解析并缓存模型构造器
//!
//! Lazy provider registry. Resolves a treatment's provider to a model
//! factory on first use and caches it for the life of the registry.
//!
//! Cache hits read an `ArcSwap` snapshot without locking; misses are
//! serialised by a mutex and re-check the snapshot before loading, so a
//! locator is loaded at most once even when the registry is shared.

pub mod loader;

pub use loader::{FactoryTable, LoadError, ModelFactory, ProviderLoader};

use crate::types::SdkConfig;
use crate::{Error, Result};
use arc_swap::ArcSwap;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::{debug, error};

/// Cache key: provider alone is not enough, two providers may share a module.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProviderKey {
    pub provider: String,
    pub module_path: String,
    pub class_name: String,
}

impl ProviderKey {
    pub fn new(provider: &str, locator: &SdkConfig) -> Self {
        Self {
            provider: provider.to_string(),
            module_path: locator.module_path.clone(),
            class_name: locator.class_name.clone(),
        }
    }
}

type FactoryMap = HashMap<ProviderKey, Arc<dyn ModelFactory>>;

pub struct ProviderRegistry {
    loader: Box<dyn ProviderLoader>,
    cache: ArcSwap<FactoryMap>,
    populate: Mutex<()>,
}

impl ProviderRegistry {
    pub fn new(loader: impl ProviderLoader + 'static) -> Self {
        Self {
            loader: Box::new(loader),
            cache: ArcSwap::from_pointee(HashMap::new()),
            populate: Mutex::new(()),
        }
    }

    /// Resolve the factory for `provider` at `locator`.
    ///
    /// Fails with [`Error::DependencyMissing`] when the loader cannot supply
    /// it; failures are not cached.
    pub fn resolve(&self, provider: &str, locator: &SdkConfig) -> Result<Arc<dyn ModelFactory>> {
        let key = ProviderKey::new(provider, locator);
        if let Some(factory) = self.cache.load().get(&key) {
            return Ok(factory.clone());
        }

        // A poisoned lock only means another resolver panicked; the cache
        // snapshot itself is never left half-written.
        let _guard = self
            .populate
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(factory) = self.cache.load().get(&key) {
            return Ok(factory.clone());
        }

        let factory = self
            .loader
            .load(locator)
            .map_err(|e| dependency_missing(provider, e))?;

        let mut next = FactoryMap::clone(&self.cache.load());
        next.insert(key, factory.clone());
        self.cache.store(Arc::new(next));
        debug!(
            "Lazily loaded {} for provider {}",
            locator.class_name, provider
        );
        Ok(factory)
    }

    pub fn is_cached(&self, provider: &str, locator: &SdkConfig) -> bool {
        self.cache
            .load()
            .contains_key(&ProviderKey::new(provider, locator))
    }

    pub fn cached_count(&self) -> usize {
        self.cache.load().len()
    }
}

fn dependency_missing(provider: &str, err: LoadError) -> Error {
    error!("Failed to load model class for provider {}: {}", provider, err);
    let hint = match &err {
        LoadError::ModuleNotFound { module_path } => format!(
            "The {} provider requires additional dependencies: register a factory for module '{}'",
            provider, module_path
        ),
        LoadError::ClassNotFound { .. } => format!(
            "Model class for provider {} not found; check the treatment's sdk_config",
            provider
        ),
    };
    Error::DependencyMissing {
        provider: provider.to_string(),
        reason: err.to_string(),
        hint,
    }
}

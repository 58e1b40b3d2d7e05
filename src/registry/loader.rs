//! Loader strategies that turn an SDK locator into a model factory.

use crate::types::{ChatModel, ModelConfig, SdkConfig};
use std::collections::HashMap;
use std::sync::Arc;

/// Constructor for one provider's model client.
pub trait ModelFactory: Send + Sync {
    fn create(&self, config: ModelConfig) -> anyhow::Result<Box<dyn ChatModel>>;
}

impl<F> ModelFactory for F
where
    F: Fn(ModelConfig) -> anyhow::Result<Box<dyn ChatModel>> + Send + Sync,
{
    fn create(&self, config: ModelConfig) -> anyhow::Result<Box<dyn ChatModel>> {
        (self)(config)
    }
}

/// Why a locator could not be loaded.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LoadError {
    #[error("module '{module_path}' is not available")]
    ModuleNotFound { module_path: String },

    #[error("class '{class_name}' not found in module '{module_path}'")]
    ClassNotFound {
        module_path: String,
        class_name: String,
    },
}

/// Strategy used by [`super::ProviderRegistry`] on a cache miss.
pub trait ProviderLoader: Send + Sync {
    fn load(&self, locator: &SdkConfig) -> Result<Arc<dyn ModelFactory>, LoadError>;
}

/// Compiled-in table of constructors, registered by the application at
/// start-up. A module with no registered class counts as not installed.
#[derive(Default)]
pub struct FactoryTable {
    modules: HashMap<String, HashMap<String, Arc<dyn ModelFactory>>>,
}

impl FactoryTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        mut self,
        module_path: impl Into<String>,
        class_name: impl Into<String>,
        factory: Arc<dyn ModelFactory>,
    ) -> Self {
        self.modules
            .entry(module_path.into())
            .or_default()
            .insert(class_name.into(), factory);
        self
    }

    /// Register a closure constructor.
    pub fn register_fn<F>(
        self,
        module_path: impl Into<String>,
        class_name: impl Into<String>,
        factory: F,
    ) -> Self
    where
        F: Fn(ModelConfig) -> anyhow::Result<Box<dyn ChatModel>> + Send + Sync + 'static,
    {
        self.register(module_path, class_name, Arc::new(factory))
    }

    pub fn contains(&self, locator: &SdkConfig) -> bool {
        self.modules
            .get(&locator.module_path)
            .map(|classes| classes.contains_key(&locator.class_name))
            .unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.modules.values().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ProviderLoader for FactoryTable {
    fn load(&self, locator: &SdkConfig) -> Result<Arc<dyn ModelFactory>, LoadError> {
        let classes =
            self.modules
                .get(&locator.module_path)
                .ok_or_else(|| LoadError::ModuleNotFound {
                    module_path: locator.module_path.clone(),
                })?;
        classes
            .get(&locator.class_name)
            .cloned()
            .ok_or_else(|| LoadError::ClassNotFound {
                module_path: locator.module_path.clone(),
                class_name: locator.class_name.clone(),
            })
    }
}

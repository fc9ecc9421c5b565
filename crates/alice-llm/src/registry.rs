use std::collections::HashMap;
use std::sync::Arc;

use alice_core::{LLMError, LLMProvider};

/// Alias → provider map. The chat path uses the default alias, the cheap
/// classification prompts usually go through the router alias.
#[derive(Clone)]
pub struct LLMRegistry {
    providers: HashMap<String, Arc<dyn LLMProvider>>,
    default_alias: String,
    router_alias: Option<String>,
}

impl std::fmt::Debug for LLMRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LLMRegistry")
            .field("providers", &self.providers.keys().collect::<Vec<_>>())
            .field("default_alias", &self.default_alias)
            .field("router_alias", &self.router_alias)
            .finish()
    }
}

impl LLMRegistry {
    pub fn new() -> Self {
        Self {
            providers: HashMap::new(),
            default_alias: "default".to_string(),
            router_alias: None,
        }
    }

    /// Registry with a single provider under the default alias.
    pub fn single(provider: Arc<dyn LLMProvider>) -> Self {
        let mut registry = Self::new();
        registry.register("default", provider);
        registry
    }

    pub fn register(&mut self, alias: impl Into<String>, provider: Arc<dyn LLMProvider>) {
        self.providers.insert(alias.into(), provider);
    }

    pub fn set_default(&mut self, alias: impl Into<String>) {
        self.default_alias = alias.into();
    }

    pub fn set_router(&mut self, alias: impl Into<String>) {
        self.router_alias = Some(alias.into());
    }

    pub fn default_alias(&self) -> &str {
        &self.default_alias
    }

    pub fn get(&self, alias: &str) -> Result<Arc<dyn LLMProvider>, LLMError> {
        self.providers
            .get(alias)
            .cloned()
            .ok_or_else(|| LLMError::Config(format!("LLM alias not found: {}", alias)))
    }

    pub fn default(&self) -> Result<Arc<dyn LLMProvider>, LLMError> {
        self.get(&self.default_alias)
    }

    pub fn router(&self) -> Result<Arc<dyn LLMProvider>, LLMError> {
        match &self.router_alias {
            Some(alias) => self.get(alias),
            None => self.default(),
        }
    }

    /// Resolve an alias, treating the reserved names `default` and `router`
    /// as the configured selections when no provider is registered under them.
    pub fn resolve(&self, alias: &str) -> Result<Arc<dyn LLMProvider>, LLMError> {
        if let Some(provider) = self.providers.get(alias) {
            return Ok(provider.clone());
        }
        match alias {
            "default" => self.default(),
            "router" => self.router(),
            other => Err(LLMError::Config(format!("LLM alias not found: {}", other))),
        }
    }

    pub fn has(&self, alias: &str) -> bool {
        self.providers.contains_key(alias)
    }

    pub fn aliases(&self) -> Vec<String> {
        self.providers.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

impl Default for LLMRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockLLMProvider;

    #[test]
    fn test_registry_basic() {
        let mut registry = LLMRegistry::new();
        registry.register("default", Arc::new(MockLLMProvider::new("test")));
        assert!(registry.has("default"));
        assert!(!registry.has("unknown"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_registry_default_and_router() {
        let mut registry = LLMRegistry::new();
        registry.register("main", Arc::new(MockLLMProvider::new("main")));
        registry.register("cheap", Arc::new(MockLLMProvider::new("cheap")));
        registry.set_default("main");
        registry.set_router("cheap");

        assert!(registry.default().is_ok());
        assert!(registry.router().is_ok());
        assert_eq!(registry.default_alias(), "main");
    }

    #[test]
    fn test_router_falls_back_to_default() {
        let registry = LLMRegistry::single(Arc::new(MockLLMProvider::new("only")));
        assert!(registry.router().is_ok());
    }

    #[test]
    fn test_resolve_reserved_aliases() {
        let mut registry = LLMRegistry::new();
        registry.register("main", Arc::new(MockLLMProvider::new("main")));
        registry.set_default("main");

        assert!(registry.resolve("default").is_ok());
        assert!(registry.resolve("router").is_ok());
        assert!(registry.resolve("main").is_ok());
        assert!(registry.resolve("missing").is_err());
    }
}

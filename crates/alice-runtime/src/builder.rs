use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use tracing::{debug, info};

use alice_core::{AliceError, LLMProvider, MessageStore, Result, SummaryStore};
use alice_llm::providers::{ProviderBuilder, ProviderType};
use alice_llm::{LLMOracle, LLMRegistry, Oracle, OracleConfig, PromptKind};
use alice_memory::{
    BackgroundRunner, ChatStateConfig, ChatStateTracker, ConsolidationConfig, ConsolidationEngine,
    ConsolidationScheduler,
};
use alice_storage::{ChatStores, StorageConfig, create_stores};

use crate::context::ContextAssembler;
use crate::runtime::Alice;
use crate::spec::AliceSpec;

#[derive(Default)]
pub struct AliceBuilder {
    spec: Option<AliceSpec>,
    llm: Option<Arc<dyn LLMProvider>>,
    llm_registry: Option<LLMRegistry>,
    oracle: Option<Arc<dyn Oracle>>,
    oracle_config: Option<OracleConfig>,
    consolidation: Option<ConsolidationConfig>,
    chat_state: Option<ChatStateConfig>,
    stores: Option<ChatStores>,
    storage_config: Option<StorageConfig>,
    runner: Option<Arc<dyn BackgroundRunner>>,
    system_prompt: Option<String>,
    history_window: Option<usize>,
}

impl AliceBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_spec(spec: AliceSpec) -> Self {
        Self {
            system_prompt: Some(spec.system_prompt.clone()),
            history_window: Some(spec.history_window),
            consolidation: Some(spec.memory.clone()),
            chat_state: Some(spec.chat_state.clone()),
            oracle_config: Some(spec.oracle.clone()),
            spec: Some(spec),
            ..Default::default()
        }
    }

    pub fn from_yaml(yaml_content: &str) -> Result<Self> {
        let spec = AliceSpec::from_yaml(yaml_content)?;
        Ok(Self::from_spec(spec))
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(AliceError::IoError)?;
        Self::from_yaml(&content)
    }

    /// Build a provider for every `llms` entry of the spec.
    pub fn auto_configure_llms(mut self) -> Result<Self> {
        let spec = self
            .spec
            .as_ref()
            .ok_or_else(|| AliceError::Config("Cannot auto-configure LLMs without spec".into()))?;

        if spec.llms.is_empty() {
            debug!("Spec declares no llms, expecting providers from the caller");
            return Ok(self);
        }

        let mut registry = LLMRegistry::new();
        for (alias, config) in &spec.llms {
            let provider_type = ProviderType::from_str(&config.provider)
                .map_err(|e| AliceError::Config(e.to_string()))?;

            let mut builder = ProviderBuilder::new()
                .provider(provider_type)
                .model(&config.model)
                .defaults(config.sampling());
            if let Some(ref env) = config.api_key_env {
                builder = builder.api_key_env(env);
            }
            if let Some(ref url) = config.base_url {
                builder = builder.base_url(url);
            }

            let provider = builder.build().map_err(|e| AliceError::LLM(e.to_string()))?;
            info!(alias = %alias, provider = %provider_type.as_str(), model = %config.model, "Configured LLM");
            registry.register(alias, Arc::new(provider));
        }

        registry.set_default(&spec.llm.default);
        if let Some(ref router) = spec.llm.router {
            registry.set_router(router);
        }

        self.llm_registry = Some(registry);
        Ok(self)
    }

    /// Open the stores named by the storage config (or the spec's).
    pub async fn auto_configure_storage(mut self) -> Result<Self> {
        if self.stores.is_some() {
            return Ok(self);
        }
        let config = self.effective_storage_config();
        self.stores = Some(create_stores(&config).await?);
        Ok(self)
    }

    fn effective_storage_config(&self) -> StorageConfig {
        self.storage_config
            .clone()
            .or_else(|| self.spec.as_ref().map(|s| s.storage.clone()))
            .unwrap_or_default()
    }

    pub fn llm(mut self, llm: Arc<dyn LLMProvider>) -> Self {
        self.llm = Some(llm);
        self
    }

    pub fn llm_alias(mut self, alias: impl Into<String>, provider: Arc<dyn LLMProvider>) -> Self {
        self.llm_registry
            .get_or_insert_with(LLMRegistry::new)
            .register(alias, provider);
        self
    }

    pub fn llm_registry(mut self, registry: LLMRegistry) -> Self {
        self.llm_registry = Some(registry);
        self
    }

    /// Replace the LLM-backed oracle, e.g. with a scripted one.
    pub fn oracle(mut self, oracle: Arc<dyn Oracle>) -> Self {
        self.oracle = Some(oracle);
        self
    }

    pub fn oracle_config(mut self, config: OracleConfig) -> Self {
        self.oracle_config = Some(config);
        self
    }

    pub fn consolidation(mut self, config: ConsolidationConfig) -> Self {
        self.consolidation = Some(config);
        self
    }

    pub fn chat_state(mut self, config: ChatStateConfig) -> Self {
        self.chat_state = Some(config);
        self
    }

    pub fn stores(
        mut self,
        messages: Arc<dyn MessageStore>,
        summaries: Arc<dyn SummaryStore>,
    ) -> Self {
        self.stores = Some(ChatStores {
            messages,
            summaries,
        });
        self
    }

    pub fn storage_config(mut self, config: StorageConfig) -> Self {
        self.storage_config = Some(config);
        self
    }

    pub fn runner(mut self, runner: Arc<dyn BackgroundRunner>) -> Self {
        self.runner = Some(runner);
        self
    }

    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    pub fn history_window(mut self, n: usize) -> Self {
        self.history_window = Some(n);
        self
    }

    /// Call from inside a tokio runtime unless a runner is set explicitly;
    /// the background runner is chosen here.
    pub fn build(self) -> Result<Alice> {
        let defaults = AliceSpec::default();
        let name = self
            .spec
            .as_ref()
            .map(|s| s.name.clone())
            .unwrap_or_else(|| defaults.name.clone());
        let system_prompt = self.system_prompt.unwrap_or(defaults.system_prompt);
        let history_window = self.history_window.unwrap_or(defaults.history_window);
        if history_window == 0 {
            return Err(AliceError::Config("history_window must be greater than 0".into()));
        }

        let consolidation = self.consolidation.unwrap_or_default();
        consolidation.validate()?;
        let chat_state = self.chat_state.unwrap_or_default();
        chat_state.validate()?;

        let mut llm_registry = self.llm_registry.unwrap_or_default();
        if let Some(llm) = self.llm {
            if !llm_registry.has("default") {
                llm_registry.register("default", llm);
            }
        }
        if let Some(ref spec) = self.spec {
            llm_registry.set_default(&spec.llm.default);
            if let Some(ref router) = spec.llm.router {
                llm_registry.set_router(router);
            }
        }

        if llm_registry.is_empty() {
            return Err(AliceError::Config(
                "At least one LLM provider is required".into(),
            ));
        }
        llm_registry.default().map_err(|_| {
            AliceError::Config(format!(
                "Default LLM '{}' is not registered",
                llm_registry.default_alias()
            ))
        })?;
        let llm_registry = Arc::new(llm_registry);

        let oracle: Arc<dyn Oracle> = match self.oracle {
            Some(oracle) => oracle,
            None => {
                let config = self.oracle_config.unwrap_or_default();
                config
                    .validate()
                    .map_err(|e| AliceError::Config(e.to_string()))?;
                for kind in PromptKind::ALL {
                    let alias = config.alias_for(kind);
                    llm_registry.resolve(alias).map_err(|_| {
                        AliceError::Config(format!(
                            "Oracle prompt '{}' uses unknown LLM alias '{}'",
                            kind, alias
                        ))
                    })?;
                }
                Arc::new(LLMOracle::new(llm_registry.clone()).with_config(config))
            }
        };

        let stores = match self.stores {
            Some(stores) => stores,
            None => match self.storage_config.or_else(|| self.spec.map(|s| s.storage)) {
                None | Some(StorageConfig::Memory) => ChatStores::in_memory(),
                Some(other) => {
                    return Err(AliceError::Config(format!(
                        "Storage {:?} must be opened with auto_configure_storage() before build()",
                        other
                    )));
                }
            },
        };

        let tracker = chat_state.enabled.then(|| {
            Arc::new(ChatStateTracker::new(
                stores.messages.clone(),
                oracle.clone(),
                chat_state.window_or(history_window),
            ))
        });

        let engine = Arc::new(ConsolidationEngine::new(
            stores.messages.clone(),
            stores.summaries.clone(),
            oracle,
            consolidation.clone(),
        ));
        let scheduler = match self.runner {
            Some(runner) => ConsolidationScheduler::with_runner(engine, runner),
            None => ConsolidationScheduler::new(engine),
        };

        let context = ContextAssembler::new(
            system_prompt,
            stores.messages.clone(),
            stores.summaries.clone(),
        )
        .with_history_window(history_window)
        .with_summary_window(consolidation.summary_window);

        info!(
            agent = %name,
            llms = llm_registry.len(),
            runner = scheduler.runner_name(),
            chat_state = tracker.is_some(),
            "Alice ready"
        );

        let alice = Alice::new(
            name,
            llm_registry,
            stores.messages,
            stores.summaries,
            context,
            Arc::new(scheduler),
        );
        Ok(match tracker {
            Some(tracker) => alice.with_chat_state(tracker),
            None => alice,
        })
    }
}

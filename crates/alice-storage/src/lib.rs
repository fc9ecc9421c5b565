//! Persistent chat history and summary stores for the Alice agent

#[cfg(feature = "sqlite")]
mod sqlite;

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;

pub use alice_core::{AliceError, MessageStore, Result, SummaryStore};
use alice_memory::{InMemoryMessageStore, InMemorySummaryStore};

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteChatStore;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StorageConfig {
    /// Process-local; lost on exit.
    #[default]
    Memory,
    Sqlite { path: String },
}

/// Message and summary store handles backed by the same storage.
#[derive(Clone)]
pub struct ChatStores {
    pub messages: Arc<dyn MessageStore>,
    pub summaries: Arc<dyn SummaryStore>,
}

impl ChatStores {
    pub fn in_memory() -> Self {
        Self {
            messages: Arc::new(InMemoryMessageStore::new()),
            summaries: Arc::new(InMemorySummaryStore::new()),
        }
    }
}

pub async fn create_stores(config: &StorageConfig) -> Result<ChatStores> {
    match config {
        StorageConfig::Memory => Ok(ChatStores::in_memory()),

        #[cfg(feature = "sqlite")]
        StorageConfig::Sqlite { path } => {
            let store = SqliteChatStore::new(path).await?;
            info!(path = %path, "Opened SQLite chat store");
            Ok(ChatStores {
                messages: Arc::new(store.clone()),
                summaries: Arc::new(store),
            })
        }

        #[cfg(not(feature = "sqlite"))]
        StorageConfig::Sqlite { path } => {
            info!(path = %path, "SQLite storage requested without the sqlite feature");
            Err(AliceError::Config(
                "SQLite storage requires the 'sqlite' feature".into(),
            ))
        }
    }
}

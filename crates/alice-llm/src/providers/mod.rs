mod unified;

pub use unified::{ProviderBuilder, ProviderType, UnifiedLLMProvider};

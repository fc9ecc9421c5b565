//! Error types shared across the workspace

use thiserror::Error;

use crate::traits::llm::LLMError;

#[derive(Debug, Error)]
pub enum AliceError {
    #[error("LLM error: {0}")]
    LLM(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid spec: {0}")]
    InvalidSpec(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Invalid summary decision: {0}")]
    Decision(String),

    #[error("Template error: {0}")]
    TemplateError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("{0}")]
    Other(String),
}

impl From<LLMError> for AliceError {
    fn from(err: LLMError) -> Self {
        AliceError::LLM(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, AliceError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_llm_error_conversion() {
        let err: AliceError = LLMError::Network("connection reset".into()).into();
        assert!(matches!(err, AliceError::LLM(_)));
        assert!(err.to_string().contains("connection reset"));
    }

    #[test]
    fn test_yaml_error_conversion() {
        let parsed: std::result::Result<Vec<u32>, _> = serde_yaml::from_str("{ not: a list");
        let err: AliceError = parsed.unwrap_err().into();
        assert!(err.to_string().starts_with("YAML error"));
    }
}

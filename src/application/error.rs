use std::error::Error as StdError;

use thiserror::Error;

use crate::{
    cache::CacheError, config::LoadError, content::ContentError, edge::EdgeError,
    infra::error::InfraError, kv::KvError, warmup::WarmupError,
};

/// Flattened error chain, outermost first.
#[derive(Debug, Clone)]
pub struct ErrorReport {
    pub source: &'static str,
    pub messages: Vec<String>,
}

impl ErrorReport {
    pub fn from_error(source: &'static str, error: &dyn StdError) -> Self {
        let mut messages = vec![error.to_string()];
        let mut current = error.source();
        while let Some(inner) = current {
            messages.push(inner.to_string());
            current = inner.source();
        }
        Self { source, messages }
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] LoadError),
    #[error(transparent)]
    Infra(#[from] InfraError),
    #[error(transparent)]
    Kv(#[from] KvError),
    #[error(transparent)]
    Cache(#[from] CacheError),
    #[error(transparent)]
    Edge(#[from] EdgeError),
    #[error(transparent)]
    Content(#[from] ContentError),
    #[error(transparent)]
    Warmup(#[from] WarmupError),
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl AppError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::Unexpected(message.into())
    }

    /// Process exit code for the operations binary.
    pub fn exit_code(&self) -> i32 {
        match self {
            AppError::Config(_) | AppError::Validation(_) => 2,
            AppError::Kv(_) | AppError::Cache(_) => 3,
            AppError::Edge(_) | AppError::Content(_) | AppError::Warmup(_) => 4,
            AppError::Infra(_) | AppError::Unexpected(_) => 1,
        }
    }

    pub fn report(&self) -> ErrorReport {
        ErrorReport::from_error("application::error::AppError", self)
    }
}

use std::time::Duration;

use thiserror::Error;

use crate::provider::ProviderError;

/// Generation pipeline taxonomy. Timeouts, provider failures and malformed
/// output are absorbed by the tier chain and never surface; only
/// `IncompleteOutput` (strict mode) reaches callers.
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("provider call timed out after {0:?}")]
    ProviderTimeout(Duration),
    #[error(transparent)]
    Provider(#[from] ProviderError),
    #[error("provider output contained no usable block")]
    MalformedOutput,
    #[error("required blocks missing after all generation tiers")]
    IncompleteOutput,
    #[error("profile not found for user")]
    ProfileNotFound,
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl GenerationError {
    /// True for the failures the tier chain is allowed to swallow on its way
    /// to the next tier.
    pub fn is_absorbable(&self) -> bool {
        matches!(
            self,
            GenerationError::ProviderTimeout(_)
                | GenerationError::Provider(_)
                | GenerationError::MalformedOutput
        )
    }
}

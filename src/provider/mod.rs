use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("provider unavailable: {0}")]
    Unavailable(String),
    #[error("provider returned an error: {0}")]
    Api(String),
}

/// The generative text provider: an untrusted, latency-variable black box.
/// Deployments register a concrete client through `AppState::from_parts`;
/// the orchestrator only ever sees this contract and wraps every call in a
/// timeout race.
#[async_trait]
pub trait TextProvider: Send + Sync {
    async fn complete(
        &self,
        prompt: &str,
        max_tokens: u32,
        temperature: f32,
    ) -> Result<String, ProviderError>;

    fn model_name(&self) -> &str;
}

/// Stand-in used when no provider is configured: every call fails, so the
/// orchestrator falls straight through to the local tier.
pub struct DisabledProvider;

#[async_trait]
impl TextProvider for DisabledProvider {
    async fn complete(
        &self,
        _prompt: &str,
        _max_tokens: u32,
        _temperature: f32,
    ) -> Result<String, ProviderError> {
        Err(ProviderError::Unavailable("no provider configured".into()))
    }

    fn model_name(&self) -> &str {
        "disabled"
    }
}

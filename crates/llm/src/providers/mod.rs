pub mod openai;

use ravedigest_core::config::OpenAiConfig;

use crate::provider::{LlmError, LlmProvider};

/// Construct the configured provider. Spec requires only OpenAI (§6); the
/// teacher's factory additionally dispatched on `claude`/`ollama` which have
/// no counterpart here and were dropped.
pub fn create_provider(openai_config: &OpenAiConfig) -> Result<Box<dyn LlmProvider>, LlmError> {
    let api_key = openai_config
        .api_key
        .as_ref()
        .ok_or_else(|| LlmError::NotConfigured("OPENAI_API_KEY not set".into()))?;
    let base_url = openai_config.base_url.as_deref().unwrap_or("https://api.openai.com");
    Ok(Box::new(openai::OpenAiProvider::new(
        api_key.clone(),
        openai_config.model.clone(),
        base_url.to_string(),
    )))
}

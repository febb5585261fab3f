pub mod gemini;
pub mod ollama;
pub mod openai;

use chargewatch_core::config::{LlmConfig, OllamaConfig, ProviderKind};

use crate::provider::{LlmError, LlmProvider};

/// Create the appropriate LLM provider based on config.
pub fn create_provider(
    llm_config: &LlmConfig,
    ollama_config: &OllamaConfig,
) -> Result<Box<dyn LlmProvider>, LlmError> {
    match llm_config.provider {
        ProviderKind::Gemini => {
            let api_key = llm_config
                .gemini_api_key
                .as_ref()
                .ok_or_else(|| LlmError::NotConfigured("GEMINI_API_KEY not set".into()))?;
            Ok(Box::new(gemini::GeminiProvider::new(
                api_key.clone(),
                llm_config.gemini_model.clone(),
            )))
        }
        ProviderKind::OpenAi => {
            let api_key = llm_config
                .openai_api_key
                .as_ref()
                .ok_or_else(|| LlmError::NotConfigured("OPENAI_API_KEY not set".into()))?;
            let base_url = llm_config
                .openai_base_url
                .as_deref()
                .unwrap_or(openai::OPENAI_DEFAULT_BASE_URL);
            Ok(Box::new(openai::OpenAiProvider::new(
                api_key.clone(),
                llm_config.openai_model.clone(),
                base_url.to_string(),
            )))
        }
        ProviderKind::Ollama => Ok(Box::new(ollama::OllamaProvider::new(
            ollama_config.url.clone(),
            ollama_config.model.clone(),
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn llm(provider: ProviderKind) -> LlmConfig {
        LlmConfig {
            provider,
            ..LlmConfig::default()
        }
    }

    fn ollama() -> OllamaConfig {
        OllamaConfig {
            url: "http://localhost:11434".into(),
            model: "llama3.2".into(),
        }
    }

    #[test]
    fn missing_key_is_not_configured() {
        let err = create_provider(&llm(ProviderKind::Gemini), &ollama())
            .err()
            .unwrap();
        assert!(err.to_string().contains("GEMINI_API_KEY"));
        assert!(create_provider(&llm(ProviderKind::OpenAi), &ollama()).is_err());
    }

    #[test]
    fn provider_names_follow_config() {
        let mut config = llm(ProviderKind::Gemini);
        config.gemini_api_key = Some("k".into());
        assert_eq!(create_provider(&config, &ollama()).unwrap().name(), "gemini");

        config.provider = ProviderKind::OpenAi;
        config.openai_api_key = Some("k".into());
        assert_eq!(create_provider(&config, &ollama()).unwrap().name(), "openai");

        let ollama_provider = create_provider(&llm(ProviderKind::Ollama), &ollama()).unwrap();
        assert_eq!(ollama_provider.name(), "ollama");
    }
}

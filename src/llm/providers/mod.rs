//! LLM provider implementations.
//!
//! `build(config, api_key)` is the factory — called at startup.

pub mod dummy;
pub mod openai_compatible;

use tracing::warn;

use crate::config::LlmConfig;
use crate::llm::{LlmProvider, ProviderError};

/// Construct a `LlmProvider` from config and an optional API key.
///
/// `api_key` is sourced from the environment (never TOML) and is `None` for
/// keyless local models.
pub fn build(config: &LlmConfig, api_key: Option<String>) -> Result<LlmProvider, ProviderError> {
    match config.provider.as_str() {
        "dummy" => Ok(LlmProvider::Dummy(dummy::DummyProvider)),
        "openai" | "openai-compatible" => {
            if api_key.is_none() && config.provider == "openai" {
                warn!("LLM_API_KEY not set — requests to the OpenAI endpoint will be rejected");
            }
            let oai = &config.openai;
            let p = openai_compatible::OpenAiCompatibleProvider::new(
                oai.api_base_url.clone(),
                oai.model.clone(),
                oai.temperature,
                oai.timeout_seconds,
                oai.json_mode,
                api_key,
            )?;
            Ok(LlmProvider::OpenAiCompatible(p))
        }
        _ => Err(ProviderError::UnknownProvider(config.provider.clone())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    #[test]
    fn builds_dummy() {
        let cfg = Config::test_default(std::path::Path::new("/tmp"));
        let p = build(&cfg.llm, None).unwrap();
        assert_eq!(p.name(), "dummy");
    }

    #[test]
    fn builds_openai_without_key() {
        let mut cfg = Config::test_default(std::path::Path::new("/tmp"));
        cfg.llm.provider = "openai-compatible".into();
        let p = build(&cfg.llm, None).unwrap();
        assert_eq!(p.name(), "openai-compatible");
    }

    #[test]
    fn unknown_provider_errors() {
        let mut cfg = Config::test_default(std::path::Path::new("/tmp"));
        cfg.llm.provider = "carrier-pigeon".into();
        match build(&cfg.llm, None) {
            Err(ProviderError::UnknownProvider(name)) => assert_eq!(name, "carrier-pigeon"),
            other => panic!("expected UnknownProvider, got {other:?}"),
        }
    }
}

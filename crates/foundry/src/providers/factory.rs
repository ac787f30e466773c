use super::{base::Provider, configs::ProviderConfig, openai::OpenAiProvider, vllm::VllmProvider};
use anyhow::Result;
use strum_macros::EnumIter;

#[derive(EnumIter, Debug)]
pub enum ProviderType {
    OpenAi,
    Vllm,
}

pub fn get_provider(config: ProviderConfig) -> Result<Box<dyn Provider + Send + Sync>> {
    match config {
        ProviderConfig::OpenAi(openai_config) => Ok(Box::new(OpenAiProvider::new(openai_config)?)),
        ProviderConfig::Vllm(vllm_config) => Ok(Box::new(VllmProvider::new(vllm_config)?)),
    }
}

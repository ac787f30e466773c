/// Unified enum to wrap different provider configurations
#[derive(Debug, Clone)]
pub enum ProviderConfig {
    OpenAi(OpenAiProviderConfig),
    Vllm(VllmProviderConfig),
}

/// An OpenAI-compatible endpoint with bearer-token auth
#[derive(Debug, Clone)]
pub struct OpenAiProviderConfig {
    pub host: String,
    pub api_key: String,
    pub model: String,
    pub temperature: Option<f32>,
    pub max_tokens: Option<i32>,
    pub stop: Option<Vec<String>>,
}

/// A vLLM OpenAI-compatible server; the api key is ignored by default
/// ("EMPTY" convention) so no auth header is sent
#[derive(Debug, Clone)]
pub struct VllmProviderConfig {
    pub host: String,
    pub model: String,
    pub temperature: Option<f32>,
    pub max_tokens: Option<i32>,
    pub stop: Option<Vec<String>>,
}

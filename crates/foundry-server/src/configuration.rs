use crate::error::{to_env_var, ConfigError};
use config::{Config, Environment};
use foundry::providers::configs::{OpenAiProviderConfig, ProviderConfig, VllmProviderConfig};
use foundry::providers::vllm;
use serde::Deserialize;
use std::net::SocketAddr;

#[derive(Debug, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl ServerSettings {
    pub fn socket_addr(&self) -> SocketAddr {
        format!("{}:{}", self.host, self.port)
            .parse()
            .expect("Failed to parse socket address")
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "lowercase", tag = "type")]
pub enum ProviderSettings {
    OpenAi {
        #[serde(default = "default_openai_host")]
        host: String,
        api_key: String,
        #[serde(default = "default_openai_model")]
        model: String,
        #[serde(default)]
        temperature: Option<f32>,
        #[serde(default)]
        max_tokens: Option<i32>,
    },
    Vllm {
        #[serde(default = "default_vllm_host")]
        host: String,
        #[serde(default = "default_vllm_model")]
        model: String,
        #[serde(default)]
        temperature: Option<f32>,
        #[serde(default)]
        max_tokens: Option<i32>,
    },
}

impl ProviderSettings {
    pub fn into_config(self) -> ProviderConfig {
        match self {
            ProviderSettings::OpenAi {
                host,
                api_key,
                model,
                temperature,
                max_tokens,
            } => ProviderConfig::OpenAi(OpenAiProviderConfig {
                host,
                api_key,
                model,
                temperature,
                max_tokens,
                stop: None,
            }),
            ProviderSettings::Vllm {
                host,
                model,
                temperature,
                max_tokens,
            } => ProviderConfig::Vllm(VllmProviderConfig {
                host,
                model,
                temperature,
                max_tokens,
                stop: None,
            }),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct VectorSettings {
    #[serde(default = "default_weaviate_url")]
    pub url: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_knowledge_class")]
    pub knowledge_class: String,
}

impl Default for VectorSettings {
    fn default() -> Self {
        Self {
            url: default_weaviate_url(),
            api_key: None,
            knowledge_class: default_knowledge_class(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct DatabaseSettings {
    #[serde(default = "default_database_path")]
    pub path: String,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            path: default_database_path(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct EmbeddingSettings {
    #[serde(default = "default_vllm_host")]
    pub url: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_encoder_model")]
    pub model: String,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            url: default_vllm_host(),
            api_key: None,
            model: default_encoder_model(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub server: ServerSettings,
    pub provider: ProviderSettings,
    #[serde(default)]
    pub vector: VectorSettings,
    #[serde(default)]
    pub database: DatabaseSettings,
    #[serde(default)]
    pub embedding: EmbeddingSettings,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        Self::load_and_validate()
    }

    fn load_and_validate() -> Result<Self, ConfigError> {
        let config = Config::builder()
            .set_default("server.host", default_host())?
            .set_default("server.port", default_port() as i64)?
            // Layer on the environment variables
            .add_source(
                Environment::with_prefix("FOUNDRY")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let result: Result<Self, config::ConfigError> = config.try_deserialize();

        // Surface missing fields as the env var the operator has to set
        match result {
            Ok(settings) => Ok(settings),
            Err(err) => {
                tracing::debug!("Configuration error: {:?}", &err);

                let error_str = err.to_string();
                if error_str.starts_with("missing field") {
                    let field = error_str
                        .trim_start_matches("missing field `")
                        .trim_end_matches('`');
                    let env_var = to_env_var(field);
                    Err(ConfigError::MissingEnvVar { env_var })
                } else if let config::ConfigError::NotFound(field) = &err {
                    let env_var = to_env_var(field);
                    Err(ConfigError::MissingEnvVar { env_var })
                } else {
                    Err(ConfigError::Other(err))
                }
            }
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_openai_host() -> String {
    "https://api.openai.com".to_string()
}

fn default_openai_model() -> String {
    "gpt-4o".to_string()
}

fn default_vllm_host() -> String {
    vllm::VLLM_HOST.to_string()
}

fn default_vllm_model() -> String {
    vllm::VLLM_MODEL.to_string()
}

fn default_weaviate_url() -> String {
    "http://localhost:8080".to_string()
}

fn default_knowledge_class() -> String {
    "Knowledge".to_string()
}

fn default_database_path() -> String {
    "foundry.db".to_string()
}

fn default_encoder_model() -> String {
    "BAAI/bge-m3".to_string()
}

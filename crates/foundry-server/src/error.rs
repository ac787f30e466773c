use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required environment variable: {env_var}")]
    MissingEnvVar { env_var: String },

    #[error(transparent)]
    Other(#[from] config::ConfigError),
}

/// Map a settings field path onto the environment variable that sets it,
/// e.g. `provider.type` -> `FOUNDRY_PROVIDER__TYPE`.
pub fn to_env_var(field: &str) -> String {
    format!("FOUNDRY_{}", field.to_uppercase().replace('.', "__"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_env_var() {
        assert_eq!(to_env_var("type"), "FOUNDRY_TYPE");
        assert_eq!(to_env_var("provider.api_key"), "FOUNDRY_PROVIDER__API_KEY");
    }
}

//! Configuration loader for YAML files and environment resolution

use crate::config::types::*;
use crate::errors::ConfigError;
use std::env;
use std::path::Path;
use tokio::fs;

/// Overrides the port of `server.bind_addr`.
pub const PORT_ENV: &str = "PORT";
/// `"true"` turns API key checking on.
pub const API_KEY_CHECK_ENABLED_ENV: &str = "API_KEY_CHECK_ENABLED";
pub const API_KEY_ENV: &str = "API_KEY";

pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from a YAML file
    pub async fn from_file<P: AsRef<Path>>(path: P) -> Result<ServiceConfig, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .await
            .map_err(|source| ConfigError::Read {
                path: path.to_path_buf(),
                source,
            })?;
        log::info!("Loaded configuration from {}", path.display());
        Self::from_str(&content)
    }

    /// Load configuration from a YAML string
    pub fn from_str(content: &str) -> Result<ServiceConfig, ConfigError> {
        let mut config: ServiceConfig = if content.trim().is_empty() {
            ServiceConfig::default()
        } else {
            serde_yaml::from_str(content)?
        };
        Self::resolve_environment(&mut config);
        config.validate()?;
        Ok(config)
    }

    /// Defaults plus environment overrides, for running without a file.
    pub fn from_env() -> Result<ServiceConfig, ConfigError> {
        let mut config = ServiceConfig::default();
        Self::resolve_environment(&mut config);
        config.validate()?;
        Ok(config)
    }

    /// Load `path` when given, otherwise fall back to [`ConfigLoader::from_env`].
    pub async fn load(path: Option<&Path>) -> Result<ServiceConfig, ConfigError> {
        match path {
            Some(path) => Self::from_file(path).await,
            None => Self::from_env(),
        }
    }

    fn resolve_environment(config: &mut ServiceConfig) {
        if let Ok(port) = env::var(PORT_ENV) {
            let port = port.trim();
            if !port.is_empty() {
                config.server.bind_addr = with_port(&config.server.bind_addr, port);
            }
        }

        if let Ok(flag) = env::var(API_KEY_CHECK_ENABLED_ENV) {
            config.auth.enabled = flag.trim().eq_ignore_ascii_case("true");
        }
        Self::resolve_auth(&mut config.auth);
    }

    fn resolve_auth(auth: &mut AuthConfig) {
        if let Ok(api_key) = env::var(API_KEY_ENV) {
            auth.api_key = Some(api_key);
        }

        // Resolve API key from a named environment variable
        if let Some(env_var) = &auth.api_key_env {
            match env::var(env_var) {
                Ok(api_key) => auth.api_key = Some(api_key),
                Err(_) => log::warn!("auth.api_key_env names {} but it is not set", env_var),
            }
        }
    }
}

fn with_port(bind_addr: &str, port: &str) -> String {
    match bind_addr.rsplit_once(':') {
        Some((host, _)) => format!("{}:{}", host, port),
        None => format!("{}:{}", bind_addr, port),
    }
}

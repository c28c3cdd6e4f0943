//! Configuration types for the execution service

use crate::engine::EngineSettings;
use crate::errors::ConfigError;
use crate::languages::{LanguageProfile, LanguageRegistry};
use crate::sandbox::ResourceLimits;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::time::Duration;

const BYTES_PER_MB: u64 = 1024 * 1024;
/// Largest `memory_mb` whose byte count still fits the runtime's signed limit.
pub const MAX_MEMORY_MB: u64 = i64::MAX as u64 / BYTES_PER_MB;

/// Root of the YAML configuration file. Every section is optional.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ServiceConfig {
    #[serde(default)]
    pub server: ServerSection,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub execution: ExecutionConfig,
    /// Extra profiles, or replacements for the built-in ones (matched by id).
    #[serde(default)]
    pub languages: Vec<LanguageProfile>,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerSection {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
    #[serde(default)]
    pub enable_cors: bool,
    /// Origins allowed when CORS is on. Absent means any origin.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cors_origins: Option<Vec<String>>,
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
    /// Executions allowed in flight at once; further requests get 503.
    #[serde(default = "default_max_concurrent_executions")]
    pub max_concurrent_executions: usize,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            enable_cors: false,
            cors_origins: None,
            max_body_bytes: default_max_body_bytes(),
            max_concurrent_executions: default_max_concurrent_executions(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AuthConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub api_key: Option<String>,
    /// Environment variable holding the key; wins over `api_key` when set.
    #[serde(default)]
    pub api_key_env: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionConfig {
    #[serde(default = "default_timeout_ms")]
    pub default_timeout_ms: u64,
    #[serde(default = "default_max_timeout_ms")]
    pub max_timeout_ms: u64,
    #[serde(default = "default_memory_mb")]
    pub memory_mb: u64,
    #[serde(default = "default_cpu_share")]
    pub cpu_share: f64,
    #[serde(default = "default_pids_limit")]
    pub pids_limit: Option<i64>,
    #[serde(default = "default_syntax_check_timeout_ms")]
    pub syntax_check_timeout_ms: u64,
    #[serde(default = "default_max_output_bytes")]
    pub max_output_bytes: usize,
    #[serde(default = "default_true")]
    pub fail_on_stderr: bool,
    #[serde(default = "default_true")]
    pub network_disabled: bool,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            default_timeout_ms: default_timeout_ms(),
            max_timeout_ms: default_max_timeout_ms(),
            memory_mb: default_memory_mb(),
            cpu_share: default_cpu_share(),
            pids_limit: default_pids_limit(),
            syntax_check_timeout_ms: default_syntax_check_timeout_ms(),
            max_output_bytes: default_max_output_bytes(),
            fail_on_stderr: true,
            network_disabled: true,
        }
    }
}

impl ExecutionConfig {
    pub fn default_timeout(&self) -> Duration {
        Duration::from_millis(self.default_timeout_ms)
    }

    pub fn max_timeout(&self) -> Duration {
        Duration::from_millis(self.max_timeout_ms)
    }

    pub fn limits(&self) -> ResourceLimits {
        ResourceLimits {
            memory_bytes: i64::try_from(self.memory_mb.saturating_mul(BYTES_PER_MB))
                .unwrap_or(i64::MAX),
            cpu_share: self.cpu_share,
            pids_limit: self.pids_limit,
        }
    }

    pub fn engine_settings(&self) -> EngineSettings {
        EngineSettings {
            limits: self.limits(),
            syntax_check_timeout: Duration::from_millis(self.syntax_check_timeout_ms),
            max_output_bytes: self.max_output_bytes,
            fail_on_stderr: self.fail_on_stderr,
            network_disabled: self.network_disabled,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl ServiceConfig {
    /// Built-in language profiles plus the configured ones.
    pub fn language_registry(&self) -> LanguageRegistry {
        LanguageRegistry::with_overrides(self.languages.iter().cloned())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.bind_addr.trim().is_empty() {
            return Err(ConfigError::Invalid("server.bind_addr cannot be empty".to_string()));
        }
        if let Err(e) = self.server.bind_addr.parse::<SocketAddr>() {
            return Err(ConfigError::Invalid(format!(
                "server.bind_addr '{}' is not an IP:port address: {}",
                self.server.bind_addr, e
            )));
        }
        if self.server.max_body_bytes == 0 {
            return Err(ConfigError::Invalid(
                "server.max_body_bytes must be greater than 0".to_string(),
            ));
        }
        if self.server.max_concurrent_executions == 0 {
            return Err(ConfigError::Invalid(
                "server.max_concurrent_executions must be greater than 0".to_string(),
            ));
        }

        let exec = &self.execution;
        if exec.default_timeout_ms == 0 || exec.max_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "execution timeouts must be greater than 0".to_string(),
            ));
        }
        if exec.default_timeout_ms > exec.max_timeout_ms {
            return Err(ConfigError::Invalid(format!(
                "execution.default_timeout_ms ({}) exceeds max_timeout_ms ({})",
                exec.default_timeout_ms, exec.max_timeout_ms
            )));
        }
        if exec.memory_mb < 6 {
            // Docker refuses memory limits below 6MB.
            return Err(ConfigError::Invalid(
                "execution.memory_mb must be at least 6".to_string(),
            ));
        }
        if exec.memory_mb > MAX_MEMORY_MB {
            return Err(ConfigError::Invalid(format!(
                "execution.memory_mb must be at most {}",
                MAX_MEMORY_MB
            )));
        }
        if !(exec.cpu_share > 0.0 && exec.cpu_share.is_finite()) {
            return Err(ConfigError::Invalid(
                "execution.cpu_share must be a positive number".to_string(),
            ));
        }
        if exec.syntax_check_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "execution.syntax_check_timeout_ms must be greater than 0".to_string(),
            ));
        }
        if exec.max_output_bytes == 0 {
            return Err(ConfigError::Invalid(
                "execution.max_output_bytes must be greater than 0".to_string(),
            ));
        }

        for profile in &self.languages {
            if profile.id.trim().is_empty() {
                return Err(ConfigError::Invalid("language id cannot be empty".to_string()));
            }
            if profile.image.trim().is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "language '{}' image cannot be empty",
                    profile.id
                )));
            }
            if profile.file_extension.trim_start_matches('.').is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "language '{}' file_extension cannot be empty",
                    profile.id
                )));
            }
            if profile.syntax_check.is_empty() || profile.run.is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "language '{}' needs both syntax_check and run commands",
                    profile.id
                )));
            }
        }

        if self.auth.enabled && self.auth.api_key.as_deref().unwrap_or("").is_empty() {
            log::warn!("API key checking is enabled but no key is configured; /api requests will fail");
        }

        Ok(())
    }
}

fn default_bind_addr() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_max_body_bytes() -> usize {
    1024 * 1024
}

fn default_max_concurrent_executions() -> usize {
    16
}

fn default_timeout_ms() -> u64 {
    5_000
}

fn default_max_timeout_ms() -> u64 {
    30_000
}

fn default_memory_mb() -> u64 {
    64
}

fn default_cpu_share() -> f64 {
    0.5
}

fn default_pids_limit() -> Option<i64> {
    Some(64)
}

fn default_syntax_check_timeout_ms() -> u64 {
    10_000
}

fn default_max_output_bytes() -> usize {
    1024 * 1024
}

fn default_true() -> bool {
    true
}

fn default_log_level() -> String {
    "info".to_string()
}

//! Sandboxed, resource-bounded execution of untrusted source code.
//!
//! A caller submits source text, a language name and a timeout. The engine
//! resolves the language to a profile, parses the code in a throwaway sandbox,
//! runs it in a second sandbox with hard CPU, memory and network limits, and
//! returns either the program's stdout or exactly one classified error.
//!
//! # Architecture Overview
//!
//! - **Language registry** ([`languages`]): per-language data (image, file name, check and run commands)
//! - **Sandbox runtime** ([`sandbox`]): container lifecycle behind the [`SandboxRuntime`] trait, with a Docker client (and an in-memory fake behind the `test-util` feature)
//! - **Syntax validator** ([`validator`]): parse-only check in its own instance
//! - **Execution engine** ([`engine`]): the pipeline, deadline race and guaranteed teardown
//! - **Result normalizer** ([`normalizer`]): raw exit signals to the caller-facing outcome
//! - **Configuration** ([`config`]): YAML service configuration with environment overrides

pub mod config;
pub mod engine;
pub mod errors;
pub mod languages;
pub mod normalizer;
pub mod sandbox;
pub mod types;
pub mod validator;

pub use config::{ConfigLoader, ServiceConfig};
pub use engine::{EngineSettings, ExecutionEngine};
pub use errors::{ConfigError, ErrorKind, ExecutionError, SandboxError};
pub use languages::{LanguageProfile, LanguageRegistry};
pub use sandbox::{DockerSandbox, SandboxRuntime};
#[cfg(any(test, feature = "test-util"))]
pub use sandbox::{FakeRun, FakeSandbox};
pub use types::{ErrorDetail, ExecutionRequest, ExecutionResult};
pub use validator::{SyntaxValidator, ValidationResult};

//! Service configuration
//!
//! YAML file with `server`, `auth`, `execution`, `languages` and `logging`
//! sections. Every field has a default, and `PORT`, `API_KEY_CHECK_ENABLED`
//! and `API_KEY` from the environment override the file.

pub mod loader;
pub mod types;

pub use loader::*;
pub use types::*;

//! Configuration system for the meli search proxy.
//!
//! Provides TOML-based configuration with:
//! - `[server]`, `[upstream]` and `[oauth]` sections, all optional
//! - Config file layering (user config dir + project-local overrides)
//! - Environment overrides for the port and OAuth credentials

pub mod discovery;
pub mod error;
pub mod types;

pub use discovery::{
    LoadedConfig, apply_env_overrides, load_config_file, load_config_with_options,
    user_config_dir, user_config_path,
};
pub use error::{ConfigError, Result};
pub use types::*;

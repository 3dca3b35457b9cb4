//! Configuration for the Ferrogram runtime.
//!
//! Settings are layered with figment: built-in defaults, programmatic
//! overrides, configuration files, then `FERROGRAM_*` environment variables.
//! [`validate_config`] runs afterwards, from
//! [`FerrogramRuntime::from_config`](crate::FerrogramRuntime::from_config).

pub mod error;
pub mod loader;
pub mod schema;
pub mod validation;

pub use error::{ConfigError, ConfigResult};
pub use loader::{ConfigLoader, ENV_PREFIX, PROFILE_ENV, Profile, load_config, load_config_from_file};
pub use schema::{
    BotConfig, CommandsConfig, FerrogramConfig, LogFormat, LogLevel, LogOutput, LogRotation,
    LoggingConfig, SpanEventConfig, WebhookConfig,
};
pub use validation::validate_config;

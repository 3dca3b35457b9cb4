//! Ferrogram Runtime - configuration, logging and lifecycle for one bot.
//!
//! This crate provides:
//! - Layered configuration ([`ConfigLoader`], [`FerrogramConfig`])
//! - Logging setup ([`LoggingBuilder`])
//! - The [`FerrogramRuntime`] that wires the API client, entity store,
//!   dispatcher, command router and transports together
//!
//! ```ignore
//! use ferrogram_runtime::{BotContext, FerrogramRuntime};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let runtime = FerrogramRuntime::builder().build()?;
//!
//!     runtime.commands().on("ping", |ctx: Arc<BotContext>, message: Handle<Message>, _args: Vec<String>| async move {
//!         ctx.reply(&message, "pong!").await.map(|_| ())
//!     })?;
//!
//!     // Polls, or serves the webhook, until Ctrl+C
//!     runtime.run().await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod context;
pub mod error;
pub mod logging;
pub mod runtime;

pub use config::{ConfigError, ConfigLoader, ConfigResult, FerrogramConfig};
pub use context::BotContext;
pub use error::{RuntimeError, RuntimeResult};
pub use logging::LoggingBuilder;
pub use runtime::{FerrogramRuntime, RuntimeBuilder};

// Re-export tracing for use by bot code
pub use tracing;
pub use tracing_subscriber;

/// Logging macros.
pub mod prelude {
    pub use tracing::{Level, debug, error, info, instrument, span, trace, warn};
}

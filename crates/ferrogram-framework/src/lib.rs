//! # Ferrogram Framework
//!
//! The ingestion logic that sits between the transports and user code:
//!
//! - [`UpdateDispatcher`]: classifies envelopes, keeps the entity caches
//!   current and emits typed events
//! - [`CommandRouter`]: prefix-stripping, alias-resolving, middleware-gated
//!   command registry
//!
//! Both are generic over the *owner* type `C` that command handlers receive,
//! usually an application context holding the API client.

pub mod command;
pub mod dispatcher;
pub mod error;

pub use command::{
    CommandHandler, CommandOptions, CommandRegistration, CommandRouter, DEFAULT_PREFIX,
    IntoCommandResult, Middleware, ParsedCommand, PassThrough, TriggerOutcome, parse_command,
};
pub use dispatcher::{BotIdentity, UpdateDispatcher};
pub use error::{RouterError, RouterResult};

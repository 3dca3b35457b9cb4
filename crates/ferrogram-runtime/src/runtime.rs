//! Lifecycle orchestration.
//!
//! [`FerrogramRuntime`] wires one bot together: the API client, the entity
//! store, the event bus, the command router, the dispatcher and both
//! transports. Only one transport runs at a time, chosen by
//! `webhook.enabled`.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use ferrogram_runtime::FerrogramRuntime;
//!
//! let runtime = FerrogramRuntime::builder()
//!     .config_file("ferrogram.toml")
//!     .build()?;
//!
//! runtime.commands().on("ping", ping)?;
//! runtime.run().await?;
//! ```

use std::future::Future;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tokio::signal;
use tracing::{info, warn};

use crate::config::{ConfigLoader, FerrogramConfig, validate_config};
use crate::context::BotContext;
use crate::error::{RuntimeError, RuntimeResult};
use crate::logging;
use ferrogram_core::{BotEvent, EventBus, Handle, Store, User};
use ferrogram_framework::{BotIdentity, CommandRouter, UpdateDispatcher};
use ferrogram_transport::{BotApi, PollTransport, PushTransport, WebhookOptions};

/// One running bot.
pub struct FerrogramRuntime {
    config: FerrogramConfig,
    context: Arc<BotContext>,
    dispatcher: Arc<UpdateDispatcher<BotContext>>,
    poller: Arc<PollTransport>,
    push: PushTransport,
}

impl FerrogramRuntime {
    pub fn builder() -> RuntimeBuilder {
        RuntimeBuilder::new()
    }

    /// Creates a runtime from loaded configuration.
    ///
    /// Validates the configuration and initializes logging. Fails when no
    /// token is configured.
    pub fn from_config(config: FerrogramConfig) -> RuntimeResult<Self> {
        validate_config(&config)?;
        logging::init_from_config(&config.logging);

        let token = config
            .bot
            .token
            .as_deref()
            .filter(|token| !token.is_empty())
            .ok_or(RuntimeError::MissingToken)?;
        let api = Arc::new(BotApi::with_timeout(
            &config.bot.api_url,
            token,
            Duration::from_millis(config.bot.request_timeout_ms),
        )?);

        let store = Arc::new(Store::new(&config.cache));
        let events = Arc::new(EventBus::new());
        let context = Arc::new(BotContext::new(
            Arc::clone(&api),
            Arc::clone(&store),
            Arc::clone(&events),
        ));

        let router = Arc::new(CommandRouter::new(Arc::clone(&context)));
        router.set_prefix(config.commands.prefix.clone())?;

        let dispatcher = Arc::new(UpdateDispatcher::new(store, events, router));
        let poller = Arc::new(PollTransport::new(
            api,
            dispatcher.clone(),
            config.polling.clone(),
        ));
        let push = PushTransport::with_config(dispatcher.clone(), &config.webhook.push_config());

        info!(
            api_url = %config.bot.api_url,
            prefix = %config.commands.prefix,
            webhook = config.webhook.enabled,
            "Runtime initialized from configuration"
        );

        Ok(Self {
            config,
            context,
            dispatcher,
            poller,
            push,
        })
    }

    pub fn config(&self) -> &FerrogramConfig {
        &self.config
    }

    pub fn context(&self) -> &Arc<BotContext> {
        &self.context
    }

    pub fn api(&self) -> &Arc<BotApi> {
        self.context.api()
    }

    pub fn store(&self) -> &Arc<Store> {
        self.dispatcher.store()
    }

    /// The command registry.
    pub fn commands(&self) -> &Arc<CommandRouter<BotContext>> {
        self.dispatcher.router()
    }

    /// The event bus; register listeners here.
    pub fn events(&self) -> &Arc<EventBus> {
        self.dispatcher.events()
    }

    pub fn dispatcher(&self) -> &Arc<UpdateDispatcher<BotContext>> {
        &self.dispatcher
    }

    pub fn poller(&self) -> &Arc<PollTransport> {
        &self.poller
    }

    pub fn push(&self) -> &PushTransport {
        &self.push
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Fetches the bot's own user and fires [`BotEvent::Ready`].
    ///
    /// The dispatcher uses this identity to tell the bot joining or leaving a
    /// chat apart from other members, and to match `/command@username`.
    pub async fn login(&self) -> RuntimeResult<Handle<User>> {
        let payload = self.api().get_me().await?;
        let me = self.store().users.upsert(&payload, None)?;

        let identity = BotIdentity::from(&*me.read());
        info!(id = identity.id, username = ?identity.username, "Logged in");
        self.dispatcher.set_me(identity);

        self.events().emit(&BotEvent::Ready { me: me.clone() });
        Ok(me)
    }

    /// Starts long polling. Returns `false` if it is already running.
    pub fn start_polling(&self) -> bool {
        self.poller.start()
    }

    /// Stops long polling and waits for the request in flight.
    pub async fn stop_polling(&self) {
        self.poller.shutdown().await;
    }

    /// Registers the webhook (when `webhook.url` is set) and starts the
    /// receiver.
    pub async fn start_webhook(&self) -> RuntimeResult<SocketAddr> {
        let webhook = &self.config.webhook;

        if let Some(url) = &webhook.url {
            let options = WebhookOptions {
                allowed_updates: self.config.polling.allowed_updates.clone(),
                drop_pending_updates: Some(webhook.drop_pending_updates),
                secret_token: webhook.secret_token.clone(),
                ..Default::default()
            };
            self.api().set_webhook(url, &options).await?;
            info!(url = %url, "Webhook registered");
        }

        let addr = self
            .push
            .create_server(
                &webhook.path,
                &webhook.host,
                webhook.port,
                webhook.tls.as_ref(),
            )
            .await?;
        Ok(addr)
    }

    /// Logs in and starts the configured transport.
    pub async fn start(&self) -> RuntimeResult<()> {
        self.login().await?;

        if self.config.webhook.enabled {
            self.start_webhook().await?;
        } else if !self.start_polling() {
            warn!("Polling is already running");
        }
        Ok(())
    }

    /// Stops both transports.
    pub async fn stop(&self) {
        self.stop_polling().await;
        self.push.close().await;
        info!("Runtime stopped");
    }

    /// Runs until Ctrl+C or SIGTERM.
    pub async fn run(&self) -> RuntimeResult<()> {
        self.start().await?;
        info!("Ferrogram runtime is now running. Press Ctrl+C to stop.");

        let signal = wait_for_shutdown().await;
        self.stop().await;
        signal
    }

    /// Runs until `shutdown` completes.
    pub async fn run_until<F>(&self, shutdown: F) -> RuntimeResult<()>
    where
        F: Future<Output = ()>,
    {
        self.start().await?;
        shutdown.await;
        self.stop().await;
        Ok(())
    }
}

/// Waits for Ctrl+C, or SIGTERM on unix.
async fn wait_for_shutdown() -> RuntimeResult<()> {
    #[cfg(unix)]
    {
        let mut sigterm = signal::unix::signal(signal::unix::SignalKind::terminate())?;
        tokio::select! {
            result = signal::ctrl_c() => {
                result?;
                info!("Received Ctrl+C, shutting down");
            }
            _ = sigterm.recv() => {
                info!("Received SIGTERM, shutting down");
            }
        }
    }

    #[cfg(not(unix))]
    {
        signal::ctrl_c().await?;
        info!("Received Ctrl+C, shutting down");
    }

    Ok(())
}

// =============================================================================
// RuntimeBuilder
// =============================================================================

/// Loads configuration, then builds a [`FerrogramRuntime`].
pub struct RuntimeBuilder {
    config_loader: ConfigLoader,
    token: Option<String>,
}

impl RuntimeBuilder {
    /// Searches the current directory and the environment.
    pub fn new() -> Self {
        Self {
            config_loader: ConfigLoader::new().with_current_dir(),
            token: None,
        }
    }

    pub fn config_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_loader = self.config_loader.file(path);
        self
    }

    pub fn profile(mut self, profile: impl AsRef<str>) -> Self {
        self.config_loader = self.config_loader.profile(profile);
        self
    }

    pub fn search_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_loader = self.config_loader.search_path(path);
        self
    }

    pub fn without_env(mut self) -> Self {
        self.config_loader = self.config_loader.without_env();
        self
    }

    pub fn merge(mut self, config: FerrogramConfig) -> Self {
        self.config_loader = self.config_loader.merge(config);
        self
    }

    /// Overrides whatever token the configuration sources provide.
    pub fn token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn build(self) -> RuntimeResult<FerrogramRuntime> {
        let mut config = self.config_loader.load()?;
        if let Some(token) = self.token {
            config.bot.token = Some(token);
        }
        FerrogramRuntime::from_config(config)
    }
}

impl Default for RuntimeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_with_token() -> FerrogramConfig {
        let mut config = FerrogramConfig::default();
        config.bot.token = Some("123:test".into());
        config
    }

    #[test]
    fn test_missing_token() {
        let result = FerrogramRuntime::from_config(FerrogramConfig::default());
        assert!(matches!(result, Err(RuntimeError::MissingToken)));
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let mut config = config_with_token();
        config.commands.prefix = String::new();
        let result = FerrogramRuntime::from_config(config);
        assert!(matches!(result, Err(RuntimeError::Config(_))));
    }

    #[test]
    fn test_prefix_reaches_router() {
        let mut config = config_with_token();
        config.commands.prefix = "!".into();

        let runtime = FerrogramRuntime::from_config(config).unwrap();

        assert_eq!(runtime.commands().prefix(), "!");
        assert_eq!(runtime.store().users.capacity(), runtime.config().cache.users);
    }

    #[test]
    fn test_builder_token_override() {
        let runtime = FerrogramRuntime::builder()
            .search_path(std::env::temp_dir().join("ferrogram-runtime-empty"))
            .without_env()
            .token("456:override")
            .build()
            .unwrap();

        assert_eq!(runtime.config().bot.token.as_deref(), Some("456:override"));
    }
}

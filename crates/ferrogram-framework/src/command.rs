//! Prefix-based text command routing.
//!
//! A [`CommandRouter`] keeps an ordered registry of commands, each with a
//! lowercase name and optional aliases. The dispatcher feeds it every text
//! message that starts with the router's prefix.
//!
//! # Execution
//!
//! [`CommandRouter::trigger`] looks a command up by exact name, then by alias.
//! The matched registration and the message then pass through the router's
//! [`Middleware`], which returns the message to run the handler with, or
//! `None` to veto execution. Handler errors and panics are caught here and
//! reported to the error hook; they never reach the dispatcher.
//!
//! ```rust,ignore
//! use ferrogram_framework::{CommandOptions, CommandRouter};
//!
//! let router = CommandRouter::new(app);
//!
//! router.on("ping", |app: Arc<App>, message, _args| async move {
//!     app.reply(&message, "pong!").await
//! })?;
//!
//! router.on_with("help", CommandOptions::new().alias("h"), help_handler)?;
//!
//! // Only run commands for allowed chats
//! router.use_middleware(|_cmd, message: Handle<Message>| async move {
//!     let allowed = message.read().chat_id() == ADMIN_CHAT;
//!     allowed.then_some(message)
//! });
//! ```

use std::any::Any;
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use futures::future::BoxFuture;
use parking_lot::RwLock;
use tracing::{debug, error, trace};

use crate::error::{RouterError, RouterResult};
use ferrogram_core::{Handle, Message};

/// The default command prefix.
pub const DEFAULT_PREFIX: &str = "/";

// ============================================================================
// Handler and middleware traits
// ============================================================================

/// Return values a command handler may produce.
pub trait IntoCommandResult {
    fn into_command_result(self) -> anyhow::Result<()>;
}

impl IntoCommandResult for () {
    fn into_command_result(self) -> anyhow::Result<()> {
        Ok(())
    }
}

impl<E> IntoCommandResult for Result<(), E>
where
    E: Into<anyhow::Error>,
{
    fn into_command_result(self) -> anyhow::Result<()> {
        self.map_err(Into::into)
    }
}

/// A command handler, invoked with the router's owner, the message and the
/// arguments following the command name.
///
/// Implemented for every `Fn(Arc<C>, Handle<Message>, Vec<String>) -> impl Future`
/// whose output is `()` or a `Result<(), E>`.
pub trait CommandHandler<C>: Send + Sync + 'static {
    fn call(
        &self,
        owner: Arc<C>,
        message: Handle<Message>,
        args: Vec<String>,
    ) -> BoxFuture<'static, anyhow::Result<()>>;
}

impl<C, F, Fut, R> CommandHandler<C> for F
where
    C: Send + Sync + 'static,
    F: Fn(Arc<C>, Handle<Message>, Vec<String>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoCommandResult,
{
    fn call(
        &self,
        owner: Arc<C>,
        message: Handle<Message>,
        args: Vec<String>,
    ) -> BoxFuture<'static, anyhow::Result<()>> {
        let fut = self(owner, message, args);
        Box::pin(async move { fut.await.into_command_result() })
    }
}

/// A gate run before every command handler.
///
/// Returns the message the handler should see, or `None` to skip the handler.
pub trait Middleware<C>: Send + Sync + 'static {
    fn call(
        &self,
        command: Arc<CommandRegistration<C>>,
        message: Handle<Message>,
    ) -> BoxFuture<'static, Option<Handle<Message>>>;
}

impl<C, F, Fut> Middleware<C> for F
where
    C: 'static,
    F: Fn(Arc<CommandRegistration<C>>, Handle<Message>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Option<Handle<Message>>> + Send + 'static,
{
    fn call(
        &self,
        command: Arc<CommandRegistration<C>>,
        message: Handle<Message>,
    ) -> BoxFuture<'static, Option<Handle<Message>>> {
        Box::pin(self(command, message))
    }
}

/// Middleware that passes every message through unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassThrough;

impl<C: 'static> Middleware<C> for PassThrough {
    fn call(
        &self,
        _command: Arc<CommandRegistration<C>>,
        message: Handle<Message>,
    ) -> BoxFuture<'static, Option<Handle<Message>>> {
        Box::pin(std::future::ready(Some(message)))
    }
}

// ============================================================================
// Registration
// ============================================================================

/// Options accepted by [`CommandRouter::on_with`].
#[derive(Debug, Clone, Default)]
pub struct CommandOptions {
    pub aliases: Vec<String>,
}

impl CommandOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an alias.
    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.aliases.push(alias.into());
        self
    }
}

/// A registered command.
pub struct CommandRegistration<C> {
    name: String,
    aliases: Vec<String>,
    handler: Arc<dyn CommandHandler<C>>,
}

impl<C> CommandRegistration<C> {
    /// The primary, lowercase name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Lowercase aliases.
    pub fn aliases(&self) -> &[String] {
        &self.aliases
    }

    fn matches_alias(&self, name: &str) -> bool {
        self.aliases.iter().any(|alias| alias == name)
    }
}

impl<C> fmt::Debug for CommandRegistration<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandRegistration")
            .field("name", &self.name)
            .field("aliases", &self.aliases)
            .finish_non_exhaustive()
    }
}

fn normalize_name(name: &str) -> RouterResult<String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(RouterError::InvalidRegistration(
            "command name must not be empty".into(),
        ));
    }
    if trimmed.chars().any(char::is_whitespace) {
        return Err(RouterError::InvalidRegistration(format!(
            "command name {trimmed:?} contains whitespace"
        )));
    }
    Ok(trimmed.to_lowercase())
}

// ============================================================================
// Router
// ============================================================================

/// How a [`CommandRouter::trigger`] call ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerOutcome {
    /// No command or alias matched.
    NotFound,
    /// The middleware returned `None`.
    Vetoed,
    /// The handler finished successfully.
    Completed,
    /// The handler returned an error or panicked.
    Failed,
}

type ErrorHook = Arc<dyn Fn(&str, &anyhow::Error) + Send + Sync>;

/// Registry of text commands owned by `C`.
pub struct CommandRouter<C> {
    owner: Arc<C>,
    prefix: RwLock<String>,
    commands: RwLock<Vec<Arc<CommandRegistration<C>>>>,
    middleware: RwLock<Arc<dyn Middleware<C>>>,
    on_error: RwLock<Option<ErrorHook>>,
}

impl<C: Send + Sync + 'static> CommandRouter<C> {
    /// Creates an empty router whose handlers receive `owner`.
    pub fn new(owner: Arc<C>) -> Self {
        Self {
            owner,
            prefix: RwLock::new(DEFAULT_PREFIX.to_owned()),
            commands: RwLock::new(Vec::new()),
            middleware: RwLock::new(Arc::new(PassThrough)),
            on_error: RwLock::new(None),
        }
    }

    /// Returns the value handlers are invoked with.
    pub fn owner(&self) -> &Arc<C> {
        &self.owner
    }

    /// Registers a command without aliases.
    pub fn on<H>(&self, name: &str, handler: H) -> RouterResult<()>
    where
        H: CommandHandler<C>,
    {
        self.on_with(name, CommandOptions::default(), handler)
    }

    /// Registers a command.
    ///
    /// Names and aliases are matched case-insensitively. Registering a name
    /// that already exists replaces that registration in place.
    pub fn on_with<H>(&self, name: &str, options: CommandOptions, handler: H) -> RouterResult<()>
    where
        H: CommandHandler<C>,
    {
        let name = normalize_name(name)?;
        let aliases = options
            .aliases
            .iter()
            .map(|alias| normalize_name(alias))
            .collect::<RouterResult<Vec<_>>>()?;

        let registration = Arc::new(CommandRegistration {
            name,
            aliases,
            handler: Arc::new(handler),
        });

        let mut commands = self.commands.write();
        match commands.iter_mut().find(|cmd| cmd.name == registration.name) {
            Some(existing) => {
                debug!(command = %registration.name, "Replacing command");
                *existing = registration;
            }
            None => {
                debug!(command = %registration.name, aliases = ?registration.aliases, "Registered command");
                commands.push(registration);
            }
        }
        Ok(())
    }

    /// Removes a command by its primary name. Aliases are not matched.
    pub fn off(&self, name: &str) -> bool {
        let name = name.trim().to_lowercase();
        let mut commands = self.commands.write();
        let before = commands.len();
        commands.retain(|cmd| cmd.name != name);
        commands.len() != before
    }

    /// Replaces the middleware.
    pub fn use_middleware<M>(&self, middleware: M)
    where
        M: Middleware<C>,
    {
        *self.middleware.write() = Arc::new(middleware);
    }

    /// Sets the prefix messages must start with to be treated as commands.
    pub fn set_prefix(&self, prefix: impl Into<String>) -> RouterResult<()> {
        let prefix = prefix.into();
        if prefix.is_empty() || prefix.chars().any(char::is_whitespace) {
            return Err(RouterError::InvalidPrefix(prefix));
        }
        *self.prefix.write() = prefix;
        Ok(())
    }

    pub fn prefix(&self) -> String {
        self.prefix.read().clone()
    }

    /// Installs a hook receiving `(command name, error)` for failed handlers.
    pub fn on_error<F>(&self, hook: F)
    where
        F: Fn(&str, &anyhow::Error) + Send + Sync + 'static,
    {
        *self.on_error.write() = Some(Arc::new(hook));
    }

    /// Looks up a command by name, then by alias.
    pub fn find(&self, name: &str) -> Option<Arc<CommandRegistration<C>>> {
        let name = name.to_lowercase();
        let commands = self.commands.read();
        commands
            .iter()
            .find(|cmd| cmd.name == name)
            .or_else(|| commands.iter().find(|cmd| cmd.matches_alias(&name)))
            .cloned()
    }

    /// Primary names of every registered command, in registration order.
    pub fn names(&self) -> Vec<String> {
        self.commands
            .read()
            .iter()
            .map(|cmd| cmd.name.clone())
            .collect()
    }

    /// Runs the command `name` for `message`.
    ///
    /// An unknown name is a silent no-op.
    pub async fn trigger(
        &self,
        name: &str,
        message: Handle<Message>,
        args: Vec<String>,
    ) -> TriggerOutcome {
        let Some(command) = self.find(name) else {
            trace!(command = name, "No such command");
            return TriggerOutcome::NotFound;
        };

        let middleware = self.middleware.read().clone();
        let gate = middleware.call(Arc::clone(&command), message);
        let message = match AssertUnwindSafe(gate).catch_unwind().await {
            Ok(Some(message)) => message,
            Ok(None) => {
                debug!(command = %command.name, "Command vetoed by middleware");
                return TriggerOutcome::Vetoed;
            }
            Err(panic) => {
                let err = anyhow::anyhow!("middleware panicked: {}", panic_message(&*panic));
                self.report(&command.name, &err);
                return TriggerOutcome::Vetoed;
            }
        };

        let handler = Arc::clone(&command.handler);
        let owner = Arc::clone(&self.owner);
        let run = async move { handler.call(owner, message, args).await };

        match AssertUnwindSafe(run).catch_unwind().await {
            Ok(Ok(())) => {
                trace!(command = %command.name, "Command completed");
                TriggerOutcome::Completed
            }
            Ok(Err(err)) => {
                self.report(&command.name, &err);
                TriggerOutcome::Failed
            }
            Err(panic) => {
                let err = anyhow::anyhow!("handler panicked: {}", panic_message(&*panic));
                self.report(&command.name, &err);
                TriggerOutcome::Failed
            }
        }
    }

    fn report(&self, command: &str, err: &anyhow::Error) {
        error!(command, error = %err, "Command failed");
        let hook = self.on_error.read().clone();
        if let Some(hook) = hook {
            hook(command, err);
        }
    }
}

impl<C> fmt::Debug for CommandRouter<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandRouter")
            .field("prefix", &*self.prefix.read())
            .field("commands", &self.commands.read().len())
            .finish_non_exhaustive()
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(msg) = panic.downcast_ref::<&str>() {
        (*msg).to_owned()
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_owned()
    }
}

// ============================================================================
// Parsing
// ============================================================================

/// A command extracted from message text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedCommand {
    /// Lowercase command name.
    pub name: String,
    pub args: Vec<String>,
}

/// Extracts a command from `text`.
///
/// The text must start with `prefix`. The first whitespace-separated token
/// after it is the name; the remaining tokens are the arguments. A name of the
/// form `cmd@bot` is accepted only when `bot` matches `bot_username`
/// (case-insensitively), or when the bot's username is unknown.
pub fn parse_command(prefix: &str, text: &str, bot_username: Option<&str>) -> Option<ParsedCommand> {
    let rest = text.strip_prefix(prefix)?;
    let mut tokens = rest.split_whitespace();
    let head = tokens.next()?;

    let name = match head.split_once('@') {
        Some((name, target)) => {
            if let Some(username) = bot_username
                && !target.eq_ignore_ascii_case(username)
            {
                return None;
            }
            name
        }
        None => head,
    };
    if name.is_empty() {
        return None;
    }

    Some(ParsedCommand {
        name: name.to_lowercase(),
        args: tokens.map(str::to_owned).collect(),
    })
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use ferrogram_core::{EntityManager, MessagePayload};
    use tokio_test::{assert_err, assert_ok};

    use super::*;

    #[derive(Default)]
    struct Owner {
        calls: AtomicUsize,
        args: parking_lot::Mutex<Vec<Vec<String>>>,
    }

    fn message(text: &str) -> Handle<Message> {
        let payload: MessagePayload = serde_json::from_value(serde_json::json!({
            "message_id": 1,
            "chat": {"id": 5, "type": "private"},
            "from": {"id": 9},
            "text": text,
        }))
        .unwrap();
        EntityManager::<Message>::default()
            .upsert(&payload, None)
            .unwrap()
    }

    fn counting_router() -> CommandRouter<Owner> {
        let router = CommandRouter::new(Arc::new(Owner::default()));
        router
            .on_with(
                "ping",
                CommandOptions::new().alias("p"),
                |owner: Arc<Owner>, _message: Handle<Message>, args: Vec<String>| async move {
                    owner.calls.fetch_add(1, Ordering::SeqCst);
                    owner.args.lock().push(args);
                },
            )
            .unwrap();
        router
    }

    #[tokio::test]
    async fn test_trigger_is_case_insensitive() {
        let router = counting_router();

        assert_eq!(router.trigger("PING", message("/PING"), vec![]).await, TriggerOutcome::Completed);
        assert_eq!(router.trigger("ping", message("/ping"), vec![]).await, TriggerOutcome::Completed);
        assert_eq!(router.owner().calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_alias_and_args() {
        let router = counting_router();

        let outcome = router
            .trigger("p", message("/p a b"), vec!["a".into(), "b".into()])
            .await;

        assert_eq!(outcome, TriggerOutcome::Completed);
        assert_eq!(*router.owner().args.lock(), vec![vec!["a".to_owned(), "b".to_owned()]]);
    }

    #[tokio::test]
    async fn test_unknown_command_is_noop() {
        let router = counting_router();
        assert_eq!(router.trigger("nope", message("/nope"), vec![]).await, TriggerOutcome::NotFound);
        assert_eq!(router.owner().calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_middleware_veto() {
        let router = counting_router();
        router.use_middleware(
            |_cmd: Arc<CommandRegistration<Owner>>, _message: Handle<Message>| async move {
                None::<Handle<Message>>
            },
        );

        assert_eq!(router.trigger("ping", message("/ping"), vec![]).await, TriggerOutcome::Vetoed);
        assert_eq!(router.owner().calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_middleware_sees_registration() {
        let router = counting_router();
        router.use_middleware(
            |cmd: Arc<CommandRegistration<Owner>>, message: Handle<Message>| async move {
                (cmd.name() == "ping").then_some(message)
            },
        );

        assert_eq!(router.trigger("p", message("/p"), vec![]).await, TriggerOutcome::Completed);
    }

    #[tokio::test]
    async fn test_failures_reach_hook_not_caller() {
        let router = CommandRouter::new(Arc::new(Owner::default()));
        let failures = Arc::new(parking_lot::Mutex::new(Vec::new()));
        {
            let failures = Arc::clone(&failures);
            router.on_error(move |command, err| failures.lock().push(format!("{command}: {err}")));
        }
        router
            .on("fail", |_: Arc<Owner>, _: Handle<Message>, _: Vec<String>| async move {
                Err::<(), _>(anyhow::anyhow!("nope"))
            })
            .unwrap();
        router
            .on("boom", |_: Arc<Owner>, _: Handle<Message>, _: Vec<String>| async move {
                panic!("handler exploded") as ()
            })
            .unwrap();

        assert_eq!(router.trigger("fail", message("/fail"), vec![]).await, TriggerOutcome::Failed);
        assert_eq!(router.trigger("boom", message("/boom"), vec![]).await, TriggerOutcome::Failed);

        let failures = failures.lock();
        assert_eq!(failures[0], "fail: nope");
        assert_eq!(failures[1], "boom: handler panicked: handler exploded");
    }

    #[tokio::test]
    async fn test_register_replace_and_remove() {
        let router = counting_router();

        assert_err!(router.on("", |_: Arc<Owner>, _: Handle<Message>, _: Vec<String>| async {}));
        assert_err!(router.on("two words", |_: Arc<Owner>, _: Handle<Message>, _: Vec<String>| async {}));
        assert_ok!(router.on("PING", |_: Arc<Owner>, _: Handle<Message>, _: Vec<String>| async {}));
        assert_eq!(router.names(), vec!["ping".to_owned()]);

        // Aliases of the replaced registration are gone.
        assert!(router.find("p").is_none());
        assert!(!router.off("p"));
        assert!(router.off("Ping"));
        assert!(router.names().is_empty());
    }

    #[test]
    fn test_set_prefix() {
        let router = counting_router();
        assert_err!(router.set_prefix(""));
        assert_err!(router.set_prefix("! "));
        assert_ok!(router.set_prefix("!"));
        assert_eq!(router.prefix(), "!");
    }

    #[test]
    fn test_parse_command() {
        let parsed = parse_command("/", "/Ping  a   b", None).unwrap();
        assert_eq!(parsed.name, "ping");
        assert_eq!(parsed.args, vec!["a", "b"]);

        assert_eq!(parse_command("/", "/ping@MyBot", Some("mybot")).unwrap().name, "ping");
        assert!(parse_command("/", "/ping@otherbot", Some("mybot")).is_none());
        assert!(parse_command("/", "ping", None).is_none());
        assert!(parse_command("/", "/", None).is_none());
        assert_eq!(parse_command("!", "! echo hi", None).unwrap().name, "echo");
    }
}

//! Ping Bot
//!
//! A small command bot showing the pieces of Ferrogram working together:
//! commands with aliases, the error hook, event listeners and a message
//! collector.
//!
//! # Usage
//!
//! ```bash
//! FERROGRAM_BOT__TOKEN=123:abc cargo run --package ping-bot
//! cargo run --package ping-bot -- --config ferrogram.toml --profile dev
//! ```

use clap::Parser;
use ferrogram::prelude::*;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "ping-bot", about = "A small Telegram command bot")]
struct Args {
    /// Configuration file, in place of the usual search.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Bot token, overriding the configured one.
    #[arg(short, long)]
    token: Option<String>,

    /// Configuration profile, e.g. `dev` to also load `ferrogram.dev.toml`.
    #[arg(short, long)]
    profile: Option<String>,
}

// ============================================================================
// Command Handlers
// ============================================================================

async fn ping(ctx: Arc<BotContext>, message: Handle<Message>, _args: Vec<String>) -> anyhow::Result<()> {
    ctx.reply(&message, "pong!").await?;
    Ok(())
}

async fn echo(ctx: Arc<BotContext>, message: Handle<Message>, args: Vec<String>) -> anyhow::Result<()> {
    if args.is_empty() {
        ctx.reply(&message, "Nothing to echo.").await?;
    } else {
        ctx.reply(&message, &args.join(" ")).await?;
    }
    Ok(())
}

async fn whoami(ctx: Arc<BotContext>, message: Handle<Message>, _args: Vec<String>) -> anyhow::Result<()> {
    let author = message.read().author_id;
    let text = match author.and_then(|id| ctx.store().users.get(&id)) {
        Some(user) => {
            let user = user.read();
            format!(
                "You are {} ({})",
                user.full_name().unwrap_or_else(|| "someone".into()),
                user.id
            )
        }
        None => "I don't know who you are.".to_string(),
    };
    ctx.reply(&message, &text).await?;
    Ok(())
}

fn is_ballot(message: &Message) -> bool {
    matches!(message.content(), Some("+1" | "-1"))
}

async fn vote(ctx: Arc<BotContext>, message: Handle<Message>, args: Vec<String>) -> anyhow::Result<()> {
    let chat_id = message.read().chat_id();
    let question = if args.is_empty() {
        "this".to_string()
    } else {
        args.join(" ")
    };
    ctx.reply(&message, &format!("Vote on {question}: send +1 or -1 within a minute."))
        .await?;

    let ballots = ctx.events().collect_messages(
        chat_id,
        is_ballot,
        CollectOptions::new().max(10).time(Duration::from_secs(60)),
    );

    // Handlers run inside dispatch; the tally waits on its own task.
    tokio::spawn(async move {
        let ballots = ballots.await;
        let yes = ballots
            .messages
            .iter()
            .filter(|ballot| ballot.read().content() == Some("+1"))
            .count();
        let no = ballots.messages.len() - yes;

        let text = format!("Result for {question}: {yes} for, {no} against.");
        if let Err(err) = ctx.send_text(chat_id, &text).await {
            warn!(chat_id, error = %err, "Failed to announce vote result");
        }
    });
    Ok(())
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut builder = FerrogramRuntime::builder();
    if let Some(path) = &args.config {
        builder = builder.config_file(path);
    }
    if let Some(profile) = &args.profile {
        builder = builder.profile(profile);
    }
    if let Some(token) = args.token {
        builder = builder.token(token);
    }
    let runtime = builder.build()?;

    let commands = runtime.commands();
    commands.on("ping", ping)?;
    commands.on_with("echo", CommandOptions::new().alias("say"), echo)?;
    commands.on_with("whoami", CommandOptions::new().alias("me"), whoami)?;
    commands.on("vote", vote)?;
    commands.on_error(|name, err| warn!(command = name, error = %err, "Command failed"));

    runtime.events().on(|event| match event {
        BotEvent::Ready { me } => {
            info!(username = ?me.read().username, "Bot is ready");
        }
        BotEvent::ChatJoined { chat, .. } => {
            info!(chat_id = chat.read().id, "Joined chat");
        }
        BotEvent::ChatLeft { chat, .. } => {
            info!(chat_id = chat.read().id, "Left chat");
        }
        _ => {}
    });

    info!(prefix = %commands.prefix(), commands = ?commands.names(), "Commands registered");

    runtime.run().await?;
    Ok(())
}

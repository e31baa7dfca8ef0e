//! Bot notification demo - runs the announcement flows against an in-memory store.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use bot_notify::{Backends, BotConfig, BotNotifier, BroadcastBus, Channel, MemoryBackend};

/// Bot notification demo.
#[derive(Parser)]
#[command(name = "bot-notify-demo")]
#[command(about = "Send bot notifications against an in-memory chat store")]
#[command(version)]
pub struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Display name of the demo channel
    #[arg(long, global = true, default_value = "General")]
    channel: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Remove a member from the channel and notify them
    Remove {
        /// Username of the removed member
        #[arg(long, default_value = "carol")]
        user: String,

        /// Username of the member doing the removal
        #[arg(long, default_value = "alice")]
        by: String,
    },

    /// Archive the channel and notify every other member
    Archive {
        /// Username of the member archiving the channel
        #[arg(long, default_value = "alice")]
        by: String,

        /// Other channel members
        #[arg(long, value_delimiter = ',', default_value = "bob,carol")]
        members: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("bot_notify=debug,info")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    let store = Arc::new(MemoryBackend::new());
    let bus = Arc::new(BroadcastBus::default());
    let mut events = bus.subscribe();

    let notifier = BotNotifier::start(Backends::in_memory(&store, bus), BotConfig::from_env());
    let bot = notifier
        .try_provision()
        .await
        .context("Failed to provision bot account")?;
    println!("Bot account: {} ({})", bot.username, bot.id);

    let channel = Channel::open(cli.channel.to_lowercase(), &cli.channel);

    match cli.command {
        Commands::Remove { user, by } => {
            let removed = store.add_user(&user).await;
            let actor = store.add_user(&by).await;
            store.add_channel(channel.clone(), &[actor.id.as_str()]).await;

            let queued = notifier.member_removed(&removed.id, &actor.id, &channel).await;
            println!("Queued {queued} notification(s)");
        }

        Commands::Archive { by, members } => {
            let archiver = store.add_user(&by).await;
            let mut member_ids = vec![archiver.id.clone()];
            for name in &members {
                member_ids.push(store.add_user(name).await.id);
            }
            let ids: Vec<&str> = member_ids.iter().map(String::as_str).collect();
            store.add_channel(channel.clone(), &ids).await;

            let queued = notifier.channel_archived(&channel, &archiver.id).await;
            println!("Queued {queued} notification(s)");
        }
    }

    notifier.shutdown().await;

    for post in store.posts().await {
        println!("[{}] {}", post.channel_id, post.message);
    }

    let mut event_count = 0;
    while let Ok(event) = events.try_recv() {
        println!(
            "{} {}: {}",
            event.timestamp().to_rfc3339(),
            event.name(),
            serde_json::to_string(&event)?
        );
        event_count += 1;
    }
    println!("{event_count} realtime event(s) published");

    Ok(())
}

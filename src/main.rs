// main.rs - Cogbot Entry Point
// Boots the localizer and the module loader, connects to Discord and routes
// prefixed messages to the loaded cogs.
//
// Key Features:
// - botconfig.txt configuration with environment overrides
// - Cogs loaded through the module loader at startup and managed at runtime
// - Per-guild reply language via the preferences cog
// - Console interface and graceful shutdown that unloads every module

mod commands;
mod config;
mod error;
mod localizer;
mod modules;
mod store;

use std::sync::Arc;

use log::{debug, error, info};
use serde_json::json;
use serenity::{
    async_trait,
    client::{Client, Context, EventHandler},
    model::{channel::Message, gateway::Ready},
    prelude::GatewayIntents,
};
use tokio::io::{self, AsyncBufReadExt, BufReader};
use tokio::signal;
use tokio::sync::{mpsc, RwLock};

use crate::commands::preferences::{self, PreferencesCog};
use crate::commands::{general, parse_invocation, split_message, Invocation, DISCORD_MESSAGE_LIMIT};
use crate::config::BotConfig;
use crate::localizer::{Localizer, LocalizerOptions};
use crate::modules::{Lifecycle, Lookup, ModuleInfo, ModuleLoader, ModuleServices, UnloadReason};

// ============================================================================
// EVENT HANDLER
// ============================================================================

struct Handler {
    config: Arc<BotConfig>,
    localizer: Arc<Localizer>,
    loader: Arc<RwLock<ModuleLoader>>,
}

impl Handler {
    /// Language to answer in: the guild's preference, else the default.
    async fn language_for(&self, guild_id: Option<u64>) -> String {
        if let Some(guild_id) = guild_id {
            let loader = self.loader.read().await;
            if let Some(prefs) =
                loader.find_base_as::<PreferencesCog>(preferences::SIGNATURE, Lookup::Signature)
            {
                if let Some(language) = prefs.language_for(guild_id).await {
                    return language;
                }
            }
        }
        self.config.default_language.clone()
    }
}

#[async_trait]
impl EventHandler for Handler {
    async fn ready(&self, _: Context, ready: Ready) {
        info!("[MAIN] ✅ Connected as {} to {} guild(s)", ready.user.name, ready.guilds.len());
        println!("✅ Bot connected as {}!", ready.user.name);
    }

    async fn message(&self, ctx: Context, msg: Message) {
        if msg.author.bot {
            return;
        }
        let Some(parsed) = parse_invocation(&self.config.prefix, &msg.content) else {
            return;
        };

        let guild_id = msg.guild_id.map(|id| id.0);
        let language = self.language_for(guild_id).await;
        let invocation = Invocation::new(parsed, msg.author.id.0, msg.author.name.clone(), guild_id, language);
        let is_owner = self.config.is_owner(invocation.author_id);
        info!(
            "[MAIN] [{}] '{}' from {} ({})",
            invocation.id, invocation.command, invocation.author_name, invocation.author_id
        );

        let reply = match commands::dispatch(
            &self.loader,
            &self.localizer,
            &invocation,
            &self.config.prefix,
            is_owner,
        )
        .await
        {
            Ok(Some(reply)) => reply,
            Ok(None) => return,
            Err(e) => {
                error!("[MAIN] [{}] ❌ Command '{}' failed: {}", invocation.id, invocation.command, e);
                self.localizer
                    .translate(&invocation.language, "error.generic", &[])
                    .await
            }
        };

        for chunk in split_message(&reply, DISCORD_MESSAGE_LIMIT) {
            if let Err(e) = msg.channel_id.say(&ctx.http, chunk).await {
                error!("[MAIN] [{}] ❌ Failed to send reply: {}", invocation.id, e);
                break;
            }
        }
        debug!("[MAIN] [{}] Reply sent", invocation.id);
    }
}

// ============================================================================
// MODULE REGISTRATION
// ============================================================================

fn register_modules(loader: &mut ModuleLoader, config: &BotConfig) {
    let cogs_dir = config.languages_dir.join("cogs");

    loader.register(ModuleInfo::new(
        "general",
        "cogs/general",
        json!({ "languages": cogs_dir.join("general") }),
    ));
    loader.provide("cogs/general", general::factory());

    loader.register(ModuleInfo::new(
        "preferences",
        "cogs/preferences",
        json!({
            "table": "guild_preferences",
            "languages": cogs_dir.join("preferences"),
            "default_timezone": config.default_timezone.to_string(),
            "enforce_default_timezone": config.enforce_default_timezone,
        }),
    ));
    loader.provide("cogs/preferences", preferences::factory());
}

// ============================================================================
// COMMAND LINE INTERFACE
// ============================================================================

async fn handle_command_line(shutdown_tx: mpsc::Sender<String>, loader: Arc<RwLock<ModuleLoader>>, localizer: Arc<Localizer>) {
    use tokio::io::AsyncWriteExt;
    use tokio::time::{sleep, Duration};

    println!("📝 Command line interface active. Type 'help' for available commands.");

    // Wait for bot to connect and show connection messages before showing prompt
    sleep(Duration::from_millis(1500)).await;

    let stdin = io::stdin();
    let mut reader = BufReader::new(stdin).lines();
    let mut stdout = io::stdout();

    if stdout.write_all(b"\n> ").await.is_err() || stdout.flush().await.is_err() {
        eprintln!("❌ Failed to write initial prompt");
        return;
    }

    loop {
        match reader.next_line().await {
            Ok(Some(line)) => {
                let command = line.trim().to_lowercase();

                match command.as_str() {
                    "quit" | "q" | "exit" => {
                        println!("⏹️  Shutting down bot...");
                        if shutdown_tx.send("quit".to_string()).await.is_err() {
                            eprintln!("❌ Failed to send shutdown signal");
                        }
                        break;
                    }
                    "help" | "h" => {
                        println!("🤖 Available commands:");
                        println!("  quit, q, exit  - Stop the bot gracefully");
                        println!("  help, h        - Show this help message");
                        println!("  status         - Show bot status");
                        println!("  modules        - List registered modules and their state");
                    }
                    "status" => {
                        let loaded = loader.read().await.loaded_names().len();
                        let languages = localizer.languages().await;
                        println!("🤖 Bot Status: Running");
                        println!("📦 Loaded modules: {}", loaded);
                        println!("🌐 Languages: {}", languages.join(", "));
                    }
                    "modules" => {
                        let loader = loader.read().await;
                        for name in loader.registered() {
                            let loaded = loader.loaded_names().iter().any(|n| n == name);
                            match loader.state_of(name) {
                                Some(state) if loaded => println!("  📦 {} - {}", name, state),
                                _ => println!("  ⚪ {} - not loaded", name),
                            }
                        }
                    }
                    "" => {}
                    _ => {
                        println!("❓ Unknown command: '{}'. Type 'help' for available commands.", command);
                    }
                }

                if stdout.write_all(b"> ").await.is_err() || stdout.flush().await.is_err() {
                    eprintln!("❌ Failed to write prompt");
                    break;
                }
            }
            Ok(None) => break,
            Err(e) => {
                eprintln!("❌ Error reading command line: {}", e);
                break;
            }
        }
    }
}

// ============================================================================
// STARTUP
// ============================================================================

#[tokio::main]
async fn main() {
    // Initialize logger - must be done before any logging calls
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_secs()
        .init();

    let (config, source) = match BotConfig::load() {
        Ok(loaded) => loaded,
        Err(e) => {
            error!("[MAIN] ❌ Failed to load configuration: {}", e);
            eprintln!("❌ Failed to load configuration: {}", e);
            eprintln!("Create a botconfig.txt file in the project root with: DISCORD_TOKEN=your_token_here and PREFIX=^");
            return;
        }
    };
    match &source {
        Some(path) => println!("✅ Configuration loaded from {}", path),
        None => println!("✅ Configuration loaded from environment"),
    }
    println!("🤖 Starting bot with prefix: '{}'", config.prefix);
    let config = Arc::new(config);

    let localizer = Arc::new(Localizer::new(LocalizerOptions {
        default_language: config.default_language.clone(),
        ..Default::default()
    }));
    let base_dir = config.languages_dir.join("base");
    if let Err(e) = localizer.load_base(&base_dir).await {
        error!("[MAIN] ❌ Failed to load base strings from {}: {}", base_dir.display(), e);
        eprintln!("❌ Failed to load base strings from {}: {}", base_dir.display(), e);
        return;
    }

    let services = ModuleServices {
        localizer: localizer.clone(),
        lifecycle: Lifecycle::new(),
        data_dir: config.data_dir.clone(),
    };
    let mut loader = ModuleLoader::new(services, config.default_modules.clone());
    register_modules(&mut loader, &config);

    match loader.load_modules(config.load_all_modules).await {
        Ok(initialized) => println!(
            "✅ {} module(s) ready: {}",
            initialized.len(),
            initialized.join(", ")
        ),
        Err(e) => {
            error!("[MAIN] ❌ Failed to load modules: {}", e);
            eprintln!("❌ Failed to load modules: {}", e);
            return;
        }
    }
    let loader = Arc::new(RwLock::new(loader));

    // Configure bot intents
    let intents = GatewayIntents::non_privileged() | GatewayIntents::MESSAGE_CONTENT;

    let handler = Handler {
        config: config.clone(),
        localizer: localizer.clone(),
        loader: loader.clone(),
    };
    let mut client = match Client::builder(&config.discord_token, intents)
        .event_handler(handler)
        .await
    {
        Ok(client) => client,
        Err(e) => {
            error!("[MAIN] ❌ Error creating Discord client: {:?}", e);
            eprintln!("❌ Error creating Discord client: {:?}", e);
            eprintln!("Check your token in botconfig.txt file");
            return;
        }
    };

    // Set up command line interface for graceful shutdown
    let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<String>(1);
    let cmd_task = tokio::spawn(handle_command_line(shutdown_tx, loader.clone(), localizer.clone()));

    println!("🚀 Bot is running...");
    println!("💡 Use 'quit' command to stop gracefully, or press Ctrl+C");
    tokio::select! {
        _ = signal::ctrl_c() => {
            println!("\n⏹️ Stopping bot gracefully...");
        }
        shutdown_signal = shutdown_rx.recv() => {
            if let Some(signal) = shutdown_signal {
                println!("📡 Received '{}' command, stopping bot gracefully...", signal);
            }
        }
        result = client.start() => {
            if let Err(why) = result {
                error!("[MAIN] ❌ Client error: {:?}", why);
                eprintln!("❌ Client error: {:?}", why);
            }
        }
    }

    let unloaded = loader.write().await.unload_all(UnloadReason::Shutdown).await;
    info!("[MAIN] 📤 Unloaded {} module(s)", unloaded);

    cmd_task.abort();
    println!("✅ Bot stopped");
}

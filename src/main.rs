use anyhow::Result;
use dotenvy::dotenv;
use std::sync::Arc;
use std::time::Duration;
use teloxide::prelude::*;
use tokio::time::sleep;

use vidrelay::cli::{Cli, Commands};
use vidrelay::core::{config, init_logger, log_startup_configuration, AppError, AppResult};
use vidrelay::download::source::parse_link;
use vidrelay::download::{ingest, DeliveryCache, DeliveryConfig, ProviderRegistry};
use vidrelay::storage::{create_pool, DbPool};
use vidrelay::telegram::{create_bot, schema, setup_bot_commands, Bot, HandlerDeps, InMemorySessionStore, TelegramPlatform};

/// Main entry point for the Telegram bot
///
/// Parses CLI arguments and dispatches to appropriate subcommand.
///
/// # Errors
/// Returns an error if initialization fails (logging, database, bot creation).
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse_args();

    std::panic::set_hook(Box::new(|panic_info| {
        log::error!("Panic caught: {:?}", panic_info);
        if let Some(location) = panic_info.location() {
            log::error!("Panic at {}:{}:{}", location.file(), location.line(), location.column());
        }
    }));

    // Load environment variables from .env if present
    let _ = dotenv();

    // Initialize logger (console + file)
    init_logger(&config::LOG_FILE_PATH)?;

    match cli.command {
        Some(Commands::Run) | None => run_bot().await,
        Some(Commands::Probe { url }) => Ok(run_probe(&url).await?),
        Some(Commands::Formats { url }) => Ok(run_formats(open_database()?, &url).await?),
    }
}

fn open_database() -> Result<Arc<DbPool>> {
    Ok(Arc::new(create_pool(&config::DATABASE_PATH)?))
}

async fn run_probe(url: &str) -> AppResult<()> {
    let providers = ProviderRegistry::default_registry();
    let url = parse_link(url).ok_or_else(|| AppError::Config(format!("not a link: {}", url)))?;
    let gate = providers
        .resolve(&url)
        .ok_or_else(|| AppError::Config(format!("no provider handles {}", url)))?;

    let probe = gate.probe(&url).await?;
    println!("{}", serde_json::to_string_pretty(&probe)?);
    Ok(())
}

async fn run_formats(pool: Arc<DbPool>, url: &str) -> AppResult<()> {
    let providers = ProviderRegistry::default_registry();

    let outcome = ingest(&pool, &providers, url).await?;
    let report = serde_json::json!({
        "video": outcome.video,
        "is_new": outcome.is_new,
        "formats": outcome.formats,
    });
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

async fn run_bot() -> Result<()> {
    let bot_init_start = std::time::Instant::now();
    log::info!("Starting bot...");
    log_startup_configuration();

    let db_pool = open_database()?;
    let bot = create_bot()?;

    let bot_info = bot.get_me().await?;
    log::info!("Bot username: {:?}, id: {}", bot_info.username, bot_info.id.0);

    if let Err(e) = setup_bot_commands(&bot).await {
        log::warn!("Failed to set bot commands: {}", e);
    }

    let providers = Arc::new(ProviderRegistry::default_registry());
    let platform = Arc::new(TelegramPlatform::new(bot.clone()));
    let delivery = Arc::new(DeliveryCache::new(
        db_pool.clone(),
        providers.clone(),
        platform,
        DeliveryConfig::from_env(),
    ));
    let deps = HandlerDeps::new(
        db_pool,
        providers,
        delivery,
        Arc::new(InMemorySessionStore::new()),
        bot_info.username.clone(),
        bot_info.id,
    );
    let handler = schema(deps);

    log::info!("================================================");
    log::info!("Bot initialization complete in {:.2}s", bot_init_start.elapsed().as_secs_f64());
    log::info!("================================================");

    let max_retries = config::retry::MAX_DISPATCHER_RETRIES;
    let mut retry_count = 0;
    loop {
        let bot_clone: Bot = bot.clone();
        let handler_clone = handler.clone();

        // Separate task so a dispatcher panic surfaces through the JoinHandle
        let handle = tokio::spawn(async move {
            use teloxide::update_listeners::Polling;

            let listener = Polling::builder(bot_clone.clone()).drop_pending_updates().build();

            Dispatcher::builder(bot_clone, handler_clone)
                .dependencies(DependencyMap::new())
                .enable_ctrlc_handler()
                .build()
                .dispatch_with_listener(
                    listener,
                    LoggingErrorHandler::with_custom_text("An error from the update listener"),
                )
                .await
        });

        match handle.await {
            Ok(()) => {
                log::info!("Dispatcher shutdown gracefully");
                break;
            }
            Err(join_err) if join_err.is_panic() => {
                log::error!("Dispatcher panicked: {}", join_err);
                if retry_count >= max_retries {
                    log::error!("Max retries reached after panic. Exiting...");
                    break;
                }
                retry_count += 1;
                log::info!(
                    "Restarting dispatcher (attempt {}/{})...",
                    retry_count,
                    max_retries
                );
                sleep(backoff(retry_count)).await;
            }
            Err(join_err) => {
                log::warn!("Dispatcher task was cancelled: {}", join_err);
                break;
            }
        }
    }

    Ok(())
}

/// Linear backoff between dispatcher restarts
fn backoff(retry_count: u32) -> Duration {
    config::retry::dispatcher_delay() * retry_count
}

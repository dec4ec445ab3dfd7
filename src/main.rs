// ABOUTME: Main entry point for the skidbot Discord bot
// ABOUTME: Parses the CLI, initializes logging, config, and process handlers, then runs the dispatcher

use anyhow::Result;
use clap::{Parser, Subcommand};
use skidbot::{config::Config, error, paths};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "skidbot", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Connect to Discord and serve events (default)
    Run,
    /// Print the command table that would be registered, without connecting
    Commands {
        /// Print the descriptors as JSON
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Log panics before they unwind; contained task panics are reported by the dispatcher
    skidbot::install_panic_hook();

    // Initialize logging: stderr plus a daily rolling file
    let log_dir = paths::log_dir();
    std::fs::create_dir_all(&log_dir)?;
    let file_appender = tracing_appender::rolling::daily(&log_dir, "skidbot.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,serenity=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(non_blocking),
        )
        .init();

    // Load configuration
    dotenvy::dotenv().ok();
    let config = Config::load()?;

    match cli.command.unwrap_or(Command::Run) {
        Command::Commands { json } => {
            let table = skidbot::command_table(&config)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&table)?);
            } else {
                for descriptor in &table {
                    println!("/{:<16} {}", descriptor.name, descriptor.description);
                }
            }
            Ok(())
        }
        Command::Run => {
            tracing::info!(
                flags = %config.flags.path,
                marker = %config.marker.name,
                presence_period_secs = config.presence.period_secs,
                manifest = config.commands.manifest.as_deref().unwrap_or("builtin"),
                "Starting skidbot"
            );

            // Interrupt exits immediately; in-flight handlers are abandoned
            tokio::spawn(async {
                match tokio::signal::ctrl_c().await {
                    Ok(()) => {
                        tracing::info!("Interrupt received, shutting down");
                        std::process::exit(0);
                    }
                    Err(e) => tracing::error!(error = %e, "Failed to listen for interrupt"),
                }
            });

            if let Err(e) = skidbot::run(config).await {
                error::report_critical("run", &format!("{:#}", e));
                return Err(e);
            }
            Ok(())
        }
    }
}

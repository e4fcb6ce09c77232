//! Tradewire - Command-line client for the cTrader Open API
//!
//! Connects to an Open API endpoint, authorizes the application and streams
//! account events to the log.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use tradewire::catalog::payload_type::{self, OA_CLIENT_DISCONNECT_EVENT};
use tradewire::config::{self, Config};
use tradewire::dispatch::Event;
use tradewire::{Catalog, Client, Dispatcher};

/// Tradewire - cTrader Open API client
#[derive(Parser)]
#[command(name = "tradewire")]
#[command(version)]
#[command(about = "Talk to a cTrader Open API endpoint", long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the server version
    Version,

    /// List the trading accounts bound to the access token
    Accounts,

    /// Exchange the refresh token and store the new tokens
    Refresh {
        /// Where to write the updated configuration
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Stream the events of one account
    Watch {
        /// Trading account id
        #[arg(short, long)]
        account: i64,

        /// Symbols to subscribe spot quotes for
        #[arg(short, long)]
        symbol: Vec<i64>,
    },

    /// Show current configuration
    Config {
        /// Generate sample configuration
        #[arg(long)]
        generate: bool,

        /// Output path for generated config
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    // Load configuration
    let config = if let Some(config_path) = &cli.config {
        Config::load(config_path)?
    } else {
        Config::load_default().unwrap_or_default()
    };

    match cli.command {
        Commands::Version => {
            let client = connect(&config).await?;
            let version = client.version().await;
            client.close().await;
            println!("Server version: {}", version?);
        }
        Commands::Accounts => {
            let client = connect(&config).await?;
            let accounts = client.account_list_by_access_token().await;
            client.close().await;
            for account in accounts? {
                println!(
                    "{}\t{}\t{}\t{}",
                    account.ctid_trader_account_id,
                    if account.is_live.unwrap_or(false) { "live" } else { "demo" },
                    account.trader_login.map(|l| l.to_string()).unwrap_or_default(),
                    account.broker_title_short.as_deref().unwrap_or("-"),
                );
            }
        }
        Commands::Refresh { output } => {
            let mut client = connect(&config).await?;
            let refreshed = client.refresh_token().await;
            client.close().await;
            let refreshed = refreshed?;

            let mut updated = config.clone();
            updated.credentials = client.credentials().clone();
            let path = output
                .or(cli.config)
                .unwrap_or_else(|| PathBuf::from("./tradewire.toml"));
            updated.save(&path)?;
            println!(
                "Tokens refreshed, valid for {}s, written to: {}",
                refreshed.expires_in,
                path.display()
            );
        }
        Commands::Watch { account, symbol } => {
            run_watch(&config, account, &symbol).await?;
        }
        Commands::Config { generate, output } => {
            if generate {
                let sample = config::generate_sample_config()?;
                if let Some(path) = output {
                    std::fs::write(&path, &sample)?;
                    println!("Configuration written to: {}", path.display());
                } else {
                    println!("{}", sample);
                }
            } else {
                println!("{}", toml::to_string_pretty(&config)?);
            }
        }
    }

    Ok(())
}

/// Connect and authorize the application
async fn connect(config: &Config) -> anyhow::Result<Client> {
    let dispatcher = Dispatcher::new(config.to_session_config(), Catalog::open_api());
    let client = Client::new(dispatcher, config.credentials.clone())
        .with_request_timeout(config.request_timeout());

    tracing::info!(
        "Connecting to {}:{}",
        config.endpoint.host,
        config.endpoint.port
    );
    client.connect().await?;
    client.application_auth().await?;
    Ok(client)
}

/// Log the events of one account until interrupted
async fn run_watch(config: &Config, account_id: i64, symbols: &[i64]) -> anyhow::Result<()> {
    let client = connect(config).await?;
    let account = client.account(account_id).await?;

    let trader = account.trader().await?;
    tracing::info!(
        "Account {} balance {} ({} digits)",
        account.id(),
        trader.balance,
        trader.money_digits.unwrap_or(2)
    );

    let router = account.router();
    let mut spots = router.on_spot();
    let mut executions = router.on_execution();
    let mut order_errors = router.on_order_error();
    let mut trader_updates = router.on_trader_update();
    let mut margin = router.on_margin_changed();
    let mut invalidated = router.on_token_invalidated();
    let mut account_disconnects = router.on_account_disconnect();
    let mut client_disconnects = client.on(OA_CLIENT_DISCONNECT_EVENT);
    let mut closed = client.on_conn_closed();

    // streams are open before the first spot can arrive
    if !symbols.is_empty() {
        account.subscribe_spots(symbols).await?;
    }

    println!("Watching account {}. Press Ctrl+C to stop.", account.id());

    loop {
        tokio::select! {
            Some(event) = spots.recv() => log_event(&event),
            Some(event) = executions.recv() => log_event(&event),
            Some(event) = order_errors.recv() => log_event(&event),
            Some(event) = trader_updates.recv() => log_event(&event),
            Some(event) = margin.recv() => log_event(&event),
            Some(event) = invalidated.recv() => {
                log_event(&event);
                tracing::warn!("Access token invalidated");
                break;
            }
            Some(event) = account_disconnects.recv() => {
                log_event(&event);
                break;
            }
            Some(event) = client_disconnects.recv() => {
                log_event(&event);
                break;
            }
            reason = closed.recv() => {
                if let Some(reason) = reason {
                    tracing::error!("Session closed: {}", reason);
                }
                return Ok(());
            }
            _ = tokio::signal::ctrl_c() => {
                println!("\nShutting down...");
                break;
            }
        }
    }

    if !symbols.is_empty() {
        if let Err(e) = account.unsubscribe_spots(symbols).await {
            tracing::warn!("Failed to unsubscribe spots: {}", e);
        }
    }
    if let Err(e) = account.logout().await {
        tracing::warn!("Logout failed: {}", e);
    }
    client.close().await;
    tracing::info!("Session closed");

    Ok(())
}

fn log_event(event: &Event) {
    match &event.payload {
        Ok(payload) => tracing::info!("{}: {:?}", payload_type::name(event.payload_type), payload),
        Err(e) => tracing::warn!("{}: {}", payload_type::name(event.payload_type), e),
    }
}

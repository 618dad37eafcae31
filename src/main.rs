//! CLI entry point for swarm-courier.
//!
//! This binary provides a command-line interface for the courier library,
//! supporting identity management, configuration management, one-shot
//! sending and a polling receive loop.

use anyhow::Result;
use clap::{Parser, Subcommand};
use log::{error, info, warn};
use std::path::PathBuf;
use std::time::Duration;
use swarm_courier::{
    crypto::Identity,
    defaults::{MAX_POLL_DELAY_SECS, POLL_DELAY_SECS},
    storage::{self, MessageStore},
    utils::{CourierConfig, StoreBackend, DEFAULT_CONFIG_FILE},
    Client, ClientConfig, HttpTransport, PlainMessage,
};
use tokio::signal;

type CliClient = Client<HttpTransport, Box<dyn MessageStore>>;

/// Swarm Courier - anonymous store-and-forward messaging over storage-node swarms
#[derive(Parser)]
#[command(name = "courier")]
#[command(about = "Send and receive sealed messages through storage-node swarms")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(author = env!("CARGO_PKG_AUTHORS"))]
struct Cli {
    /// Configuration file path
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Verbose logging (can be used multiple times)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Quiet mode (suppress non-error output)
    #[arg(short, long)]
    quiet: bool,

    /// Data directory for the identity seed and message database
    #[arg(short, long, value_name = "DIR")]
    data_dir: Option<PathBuf>,

    /// Keep retrieved messages in memory instead of the database
    #[arg(long)]
    memory: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate and inspect the identity
    Keys {
        #[command(subcommand)]
        action: KeyCommands,
    },
    /// Send one message
    Send {
        /// Recipient session ID
        to: String,
        /// Message text
        text: String,
    },
    /// Poll for new messages and print them
    Poll {
        /// Run a single cycle and exit
        #[arg(long)]
        once: bool,
    },
    /// Poll for new messages and answer each with its own text
    Echo,
    /// Decrypt and print every message recorded locally
    History,
    /// Generate and validate configuration files
    Config {
        #[command(subcommand)]
        action: ConfigCommands,
    },
}

#[derive(Subcommand)]
enum KeyCommands {
    /// Generate a new identity seed
    Generate {
        /// Force overwrite of an existing seed
        #[arg(short, long)]
        force: bool,
    },
    /// Display the session ID
    Show,
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Generate a default configuration file
    Generate {
        /// Output file path
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Validate configuration file
    Validate {
        /// Configuration file to validate
        file: Option<PathBuf>,
    },
    /// Show current configuration
    Show {
        /// Show only specific section
        #[arg(short, long)]
        section: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = CourierConfig::load(cli.config.as_deref())?;

    setup_logging(cli.verbose, cli.quiet, &config.logging.level)?;

    if let Some(data_dir) = cli.data_dir {
        config.storage.data_dir = data_dir;
    }
    if cli.memory {
        config.storage.backend = StoreBackend::Memory;
    }

    config.ensure_directories()?;

    match cli.command {
        Commands::Keys { action } => handle_key_commands(action, &config),
        Commands::Send { to, text } => handle_send_command(&to, &text, &config).await,
        Commands::Poll { once } => handle_poll_command(once, false, &config).await,
        Commands::Echo => handle_poll_command(false, true, &config).await,
        Commands::History => handle_history_command(&config),
        Commands::Config { action } => handle_config_commands(action, &config),
    }
}

fn setup_logging(verbose: u8, quiet: bool, configured: &str) -> Result<()> {
    let log_level = if quiet {
        "error"
    } else {
        match verbose {
            0 => configured,
            1 => "debug",
            _ => "trace",
        }
    };

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level))
        .format_timestamp_secs()
        .init();

    Ok(())
}

fn build_client(config: &CourierConfig) -> Result<CliClient> {
    let (identity, created) = Identity::load_or_generate(config.storage.seed_path())?;
    if created {
        println!("✓ New identity saved to {}", config.storage.seed_path().display());
    }

    let store = storage::open_store(config)?;
    let transport = HttpTransport::new(config.network.request_timeout())?;

    Ok(Client::new(identity, store, transport, ClientConfig::from(config)))
}

fn handle_key_commands(action: KeyCommands, config: &CourierConfig) -> Result<()> {
    let seed_path = config.storage.seed_path();

    match action {
        KeyCommands::Generate { force } => {
            if seed_path.exists() && !force {
                return Err(anyhow::anyhow!(
                    "Identity already exists at {}. Use --force to overwrite.",
                    seed_path.display()
                ));
            }

            let identity = Identity::generate();
            identity.save_seed(&seed_path)?;

            println!("✓ Identity generated successfully");
            println!("  Session ID: {}", identity.session_id());
            println!("  Saved to: {}", seed_path.display());
        }
        KeyCommands::Show => {
            let identity = Identity::load_seed(&seed_path)?;
            println!("{}", identity.session_id());
        }
    }
    Ok(())
}

async fn handle_send_command(to: &str, text: &str, config: &CourierConfig) -> Result<()> {
    let mut client = build_client(config)?;

    client.update().await?;
    let result = client.send_to(to, text).await;
    client.close()?;
    result?;

    println!("✓ Message sent to {}", to);
    Ok(())
}

async fn handle_poll_command(once: bool, echo: bool, config: &CourierConfig) -> Result<()> {
    let mut client = build_client(config)?;
    info!("Polling as {}", client.session_id());

    if once {
        let result = run_cycle(&mut client, echo).await;
        client.close()?;
        result?;
        return Ok(());
    }

    let base_delay = Duration::from_secs(POLL_DELAY_SECS);
    let max_delay = Duration::from_secs(MAX_POLL_DELAY_SECS);
    let mut delay = base_delay;

    loop {
        match run_cycle(&mut client, echo).await {
            Ok(_) => delay = base_delay,
            Err(e) if !e.is_recoverable() => {
                error!("Poll cycle failed permanently: {}", e);
                client.close()?;
                return Err(e.into());
            }
            Err(e) => {
                delay = (delay + base_delay).min(max_delay);
                warn!("Poll cycle failed, retrying in {}s: {}", delay.as_secs(), e);
            }
        }

        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = signal::ctrl_c() => {
                info!("Shutdown signal received");
                break;
            }
        }
    }

    client.close()?;
    Ok(())
}

async fn run_cycle(client: &mut CliClient, echo: bool) -> swarm_courier::Result<usize> {
    client.update().await?;
    let messages = client.fetch_new_messages().await?;

    for message in &messages {
        print_message(message);

        if !echo {
            continue;
        }
        let Some(body) = &message.body else {
            continue;
        };
        if let Err(e) = client.send_message(&message.from, &message.reply(body.clone())).await {
            error!("Echo to {} failed: {}", message.from, e);
        }
    }

    Ok(messages.len())
}

fn print_message(message: &PlainMessage) {
    let sent_at = chrono::DateTime::from_timestamp_millis(message.timestamp as i64)
        .map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| "-".to_string());
    let sender = message.display_name.as_deref().unwrap_or(&message.from);

    match &message.body {
        Some(body) => println!("[{}] {}: {}", sent_at, sender, body),
        None => println!("[{}] {}: <no text>", sent_at, sender),
    }
}

fn handle_history_command(config: &CourierConfig) -> Result<()> {
    let mut client = build_client(config)?;
    let raw_messages = client.store().messages()?;

    for raw in &raw_messages {
        match client.decrypt_message(raw) {
            Ok(message) => print_message(&message),
            Err(e) => warn!("Skipping {}: {}", raw.hash, e),
        }
    }

    client.close()?;
    Ok(())
}

fn handle_config_commands(action: ConfigCommands, config: &CourierConfig) -> Result<()> {
    match action {
        ConfigCommands::Generate { output } => {
            let output = output.unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
            CourierConfig::default().save(&output)?;
            println!("✓ Configuration written to {}", output.display());
        }
        ConfigCommands::Validate { file } => {
            let file = file.unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
            CourierConfig::from_file(&file)?;
            println!("✓ Configuration {} is valid", file.display());
        }
        ConfigCommands::Show { section } => match section {
            None => print!("{}", config.to_toml_string()?),
            Some(name) => {
                let value = toml::Value::try_from(config)?;
                let section = value
                    .get(&name)
                    .ok_or_else(|| anyhow::anyhow!("Unknown section: {}", name))?;
                print!("{}", toml::to_string_pretty(section)?);
            }
        },
    }
    Ok(())
}

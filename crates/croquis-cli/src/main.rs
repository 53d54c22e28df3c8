mod cli;
mod config;
mod decks;
mod history;
mod settings;
mod storage;

use clap::Parser;
use color_eyre::{eyre::eyre, Result};
use croquis_core::store::RecordStore;
use croquis_storage::IdentitySource;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::cli::{Command, ConfigCommand};

fn main() -> Result<()> {
    color_eyre::install()?;
    init_tracing();

    let cli = cli::Cli::parse();
    let config = config::load()?;
    match cli.command {
        Command::Config(ConfigCommand::Init) => init_config(&config)?,
        Command::Identity => print_identity(&config)?,
        command => {
            // Every record command needs the machine key; derive it once up front.
            let identity = storage::identity_from_config(&config);
            let key = storage::machine_key(&identity)?;
            let store = storage::store_from_config(&config, &key)?;
            run_store_command(command, &store)?;
        }
    }

    Ok(())
}

fn init_tracing() {
    // RUST_LOG wins; logs go to stderr so command output stays clean.
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr);
    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();
}

fn run_store_command<S: RecordStore>(command: Command, store: &S) -> Result<()> {
    match command {
        Command::Health => {
            run_store_health(store)?;
            println!("Storage: ok");
        }
        Command::Deck(cmd) => decks::handle(cmd, store).map_err(report)?,
        Command::Settings(cmd) => settings::handle(cmd, store).map_err(report)?,
        Command::History(cmd) => history::handle(cmd, store).map_err(report)?,
        Command::Config(_) | Command::Identity => {}
    }
    Ok(())
}

fn report(err: anyhow::Error) -> color_eyre::Report {
    eyre!("{err:#}")
}

fn run_store_health<S: RecordStore>(store: &S) -> Result<()> {
    let probe_path = "health/probe.dat";
    let payload = b"ok";
    store.put(probe_path, payload)?;
    let round_trip = store.get(probe_path)?;
    store.delete(probe_path)?;

    if round_trip != payload {
        color_eyre::eyre::bail!("storage round-trip failed");
    }
    Ok(())
}

fn init_config(config: &config::Config) -> Result<()> {
    let path = config::write_default_if_missing(config)?;
    println!("Config initialized at {}", path.display());
    Ok(())
}

fn print_identity(config: &config::Config) -> Result<()> {
    let identity = storage::identity_from_config(config);
    let key = storage::machine_key(&identity)?;
    println!("source: {}", identity.name());
    println!("key fingerprint: {}", key.fingerprint());
    println!(
        "data dir: {}",
        storage::data_dir_from_config(config)?.display()
    );
    Ok(())
}

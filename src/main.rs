//! Adsterra Statistics Bot CLI - main entry point

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use teloxide::Bot;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use adsterra_bot::{
    bot, date_range, metrics, report, AdsterraClient, Config, CredentialStore, Engine, GroupBy,
    RangeOption, SessionStore,
};

#[derive(Parser)]
#[command(name = "adsterra_bot")]
#[command(about = "Telegram bot for Adsterra publisher statistics", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to the YAML config (defaults to ./config.yml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Address to expose Prometheus metrics (e.g., 0.0.0.0:9898)
    #[arg(long, env = "METRICS_ADDR", global = true)]
    metrics_addr: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the bot (long polling)
    Run,

    /// Check an API key against Adsterra and print the status code
    Probe {
        /// Adsterra publisher API key
        key: String,
    },

    /// Print a statistics report to stdout
    Stats {
        /// Adsterra publisher API key
        #[arg(long, env = "ADSTERRA_API_KEY")]
        key: String,

        /// today | yesterday | last_7_days | last_10_days | last_30_days | this_month
        #[arg(short, long, default_value = "last_7_days")]
        range: RangeOption,

        /// date | domain | country
        #[arg(short, long, default_value = "date")]
        group_by: GroupBy,
    },
}

impl Commands {
    fn name(&self) -> &'static str {
        match self {
            Commands::Run => "run",
            Commands::Probe { .. } => "probe",
            Commands::Stats { .. } => "stats",
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("adsterra_bot=info".parse()?),
        )
        .init();

    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref()).context("Failed to load configuration")?;

    // The flag wins over the config file.
    let metrics_addr = match cli.metrics_addr.as_deref() {
        Some(addr) => match addr.parse::<SocketAddr>() {
            Ok(socket) => Some(socket),
            Err(err) => {
                warn!(%addr, "Invalid metrics address: {}", err);
                None
            }
        },
        None => config.metrics_addr,
    };
    if let Some(socket) = metrics_addr {
        metrics::spawn_metrics_server(socket);
    }

    let command_name = cli.command.name();
    metrics::record_handler_start(command_name);
    let start = Instant::now();

    let result = execute_command(cli.command, config).await;

    metrics::record_handler_result(command_name, start.elapsed(), result.is_ok());

    result
}

async fn execute_command(command: Commands, config: Config) -> anyhow::Result<()> {
    let client = AdsterraClient::with_base_url(config.api_url.clone(), config.request_timeout)
        .context("Failed to build Adsterra client")?;

    match command {
        Commands::Run => run_bot(config, client).await?,
        Commands::Probe { key } => {
            let status = client
                .probe_status(key.trim())
                .await
                .context("Adsterra probe failed")?;
            println!("{}", status);
            if status != 200 {
                anyhow::bail!("API key rejected with status {}", status);
            }
        }
        Commands::Stats {
            key,
            range,
            group_by,
        } => {
            let dates = date_range(range);
            debug!(start = %dates.start, end = %dates.end, %group_by, "Fetching statistics");
            let rows = client
                .get_statistics(&dates, group_by, key.trim())
                .await
                .context("Failed to fetch statistics")?;
            println!(
                "{} to {} Group by: {}\n\n{}",
                dates.start_param(),
                dates.end_param(),
                group_by,
                report::format_statistics(&rows)
            );
        }
    }

    Ok(())
}

async fn run_bot(config: Config, client: AdsterraClient) -> anyhow::Result<()> {
    let token = config.require_token()?.to_string();
    let credentials = CredentialStore::open(&config.users_file).with_context(|| {
        format!(
            "Failed to open credential store {}",
            config.users_file.display()
        )
    })?;
    info!(
        users = credentials.len().await,
        path = %config.users_file.display(),
        "Credential store loaded"
    );

    let engine = Arc::new(Engine::new(
        client,
        credentials,
        SessionStore::new(config.session_ttl),
    ));

    // Evict abandoned conversations in the background.
    let sweeper = {
        let engine = engine.clone();
        let period = config.session_ttl.max(std::time::Duration::from_secs(60));
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            loop {
                ticker.tick().await;
                let purged = engine.sessions().purge_expired().await;
                if purged > 0 {
                    debug!(purged, "Expired sessions removed");
                }
            }
        })
    };

    bot::run(Bot::new(token), engine).await;
    sweeper.abort();

    info!("Bot stopped");
    Ok(())
}

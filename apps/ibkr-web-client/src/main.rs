//! IBKR Web Client Binary
//!
//! Keeps a Client Portal gateway session alive, or runs one query and prints
//! the JSON result.
//!
//! # Usage
//!
//! ```bash
//! cargo run -p ibkr-web-client -- keep-alive
//! cargo run -p ibkr-web-client -- history 265598 --bar 1h --period 1d
//! cargo run -p ibkr-web-client -- conid AAPL --exchange NASDAQ
//! ```
//!
//! # Environment Variables
//!
//! ## Required
//! - `IBKR_BASE_URL`: gateway base URL, e.g. `https://localhost:5000/v1/api`
//!
//! ## Optional
//! - `IBKR_ACCEPT_INVALID_CERTS`: accept the gateway's self-signed certificate (default: false)
//! - `IBKR_KEEP_ALIVE_SECS`: keep-alive interval (default: 60)
//! - `IBKR_PACING_SCOPE`: `global` | `per-endpoint` (default: global)
//! - `IBKR_METRICS_ADDR`: Prometheus listener, e.g. `0.0.0.0:9090` (default: disabled)
//! - `OTEL_ENABLED`: Enable OpenTelemetry (default: true)
//! - `RUST_LOG`: Log level (default: info)

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use ibkr_web_client::api::{
    BarSize, ContractSearchApi, HistoricalDataQuery, MarketDataApi, PortfolioApi, TimePeriod,
};
use ibkr_web_client::config::{GatewayConfig, TlsVerification};
use ibkr_web_client::gateway::GatewayClient;
use ibkr_web_client::observability::{MetricsConfig, init_metrics};
use ibkr_web_client::telemetry;
use serde_json::{Value, json};
use tokio::signal;
use tokio_util::sync::CancellationToken;

/// Client Portal gateway session keeper and query tool.
#[derive(Parser)]
#[command(name = "ibkr-web-client", version)]
struct Cli {
    /// Gateway base URL (overrides IBKR_BASE_URL)
    #[arg(long)]
    base_url: Option<String>,

    /// Accept the gateway's self-signed TLS certificate
    #[arg(long)]
    accept_invalid_certs: bool,

    /// Serve Prometheus metrics on this address
    #[arg(long, env = "IBKR_METRICS_ADDR")]
    metrics_addr: Option<SocketAddr>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Keep the session alive until Ctrl+C or SIGTERM
    KeepAlive,

    #[command(flatten)]
    Query(Query),
}

/// One-shot commands that connect, print a JSON result and disconnect.
#[derive(Subcommand)]
enum Query {
    /// List portfolio accounts
    Accounts,

    /// Show an account summary
    Summary {
        /// Account identifier, e.g. U1234567
        account_id: String,
    },

    /// Fetch historical bars
    History {
        /// Contract identifier
        conid: i64,

        /// Bar size (1min, 5min, 1h, 1d, ...)
        #[arg(long, default_value = "1h", value_parser = parse_bar)]
        bar: BarSize,

        /// Total span (30min, 8h, 1d, 1w, 6m, 1y, ...)
        #[arg(long, default_value = "1w", value_parser = parse_period)]
        period: TimePeriod,

        /// Exchange to source data from
        #[arg(long)]
        exchange: Option<String>,

        /// Include bars outside regular trading hours
        #[arg(long)]
        outside_rth: bool,
    },

    /// Search stock contracts by symbol
    Search {
        /// Symbol or company name
        symbol: String,
    },

    /// Resolve a stock symbol to its conid on an exchange
    Conid {
        /// Stock symbol
        symbol: String,

        /// Listing exchange, e.g. NASDAQ
        #[arg(long)]
        exchange: String,

        /// Look for the non-US listing
        #[arg(long)]
        non_us: bool,
    },
}

fn parse_bar(s: &str) -> Result<BarSize, String> {
    BarSize::parse(s).ok_or_else(|| format!("unsupported bar size '{s}'"))
}

fn parse_period(s: &str) -> Result<TimePeriod, String> {
    TimePeriod::parse(s).ok_or_else(|| format!("unsupported period '{s}'"))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    load_dotenv();
    let cli = Cli::parse();

    let _telemetry_guard = telemetry::init_telemetry();

    if let Some(addr) = cli.metrics_addr {
        init_metrics(&MetricsConfig::with_addr(addr))?;
    }

    let config = load_config(&cli)?;
    log_config(&config);

    let client = GatewayClient::new(config);
    run(cli.command, client).await
}

async fn run(command: Command, client: GatewayClient) -> anyhow::Result<()> {
    match command {
        Command::KeepAlive => keep_alive(&client).await,
        Command::Query(query) => {
            let value = run_query(query, &client).await?;
            println!("{}", serde_json::to_string_pretty(&value)?);
            Ok(())
        }
    }
}

async fn keep_alive(client: &GatewayClient) -> anyhow::Result<()> {
    let shutdown = CancellationToken::new();
    let signals = tokio::spawn(await_shutdown(shutdown.clone()));
    let result = client.run_keep_alive(&shutdown).await;
    signals.abort();
    tracing::info!("Keep-alive stopped");
    result.context("keep-alive loop failed")
}

async fn run_query(query: Query, client: &GatewayClient) -> anyhow::Result<Value> {
    let session = Arc::new(
        client
            .connect_scoped()
            .await
            .context("failed to connect to the gateway")?,
    );

    let value = match query {
        Query::Accounts => {
            PortfolioApi::new(session)
                .portfolio_accounts()
                .await?
        }
        Query::Summary { account_id } => {
            PortfolioApi::new(session)
                .account_summary(&account_id)
                .await?
        }
        Query::History {
            conid,
            bar,
            period,
            exchange,
            outside_rth,
        } => {
            let mut history = HistoricalDataQuery::new(conid, bar)
                .with_period(period)
                .with_outside_rth(outside_rth);
            if let Some(exchange) = exchange {
                history = history.with_exchange(exchange);
            }
            MarketDataApi::new(session).historical_data(&history).await?
        }
        Query::Search { symbol } => {
            ContractSearchApi::new(session)
                .search_contract(&symbol)
                .await?
        }
        Query::Conid {
            symbol,
            exchange,
            non_us,
        } => {
            let conid = ContractSearchApi::new(session)
                .contract_for_stock(&symbol, &exchange, !non_us)
                .await?;
            json!({ "symbol": symbol, "exchange": exchange, "conid": conid })
        }
    };

    Ok(value)
}

/// Build the configuration from the environment and CLI overrides.
fn load_config(cli: &Cli) -> anyhow::Result<GatewayConfig> {
    let mut config = GatewayConfig::from_lookup(|key| {
        if key == "IBKR_BASE_URL" && cli.base_url.is_some() {
            return cli.base_url.clone();
        }
        std::env::var(key).ok()
    })?;

    if cli.accept_invalid_certs {
        config.connection.tls = TlsVerification::AcceptInvalidCerts;
    }

    let validation = config.validate()?;
    for warning in &validation.warnings {
        tracing::warn!(warning = %warning, "Configuration warning");
    }

    Ok(config)
}

/// Log the parsed configuration.
fn log_config(config: &GatewayConfig) {
    tracing::info!(
        base_url = %config.connection.normalized_base_url(),
        keep_alive_secs = config.connection.keep_alive_interval.as_secs(),
        request_timeout_secs = config.connection.request_timeout.as_secs(),
        pacing = config.pacing.as_str(),
        accept_invalid_certs = config.connection.tls.accepts_invalid_certs(),
        "Configuration loaded"
    );
    match serde_json::to_string(config) {
        Ok(json) => tracing::debug!(config = %json, "Effective configuration"),
        Err(e) => tracing::warn!(error = %e, "Failed to serialize configuration"),
    }
}

/// Load .env file from current directory or any ancestor directory.
fn load_dotenv() {
    if dotenvy::dotenv().is_ok() {
        return;
    }

    if let Ok(cwd) = std::env::current_dir() {
        for dir in cwd.ancestors().skip(1) {
            let env_path = dir.join(".env");
            if env_path.exists() {
                let _ = dotenvy::from_path(&env_path);
                return;
            }
        }
    }
}

/// Wait for shutdown signal (SIGTERM or SIGINT), then cancel the token.
async fn await_shutdown(shutdown_token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, initiating shutdown");
        }
    }

    shutdown_token.cancel();
}

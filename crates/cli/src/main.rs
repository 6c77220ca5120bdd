use anyhow::Result;
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use ibridge::{Bridge, BridgeConfig};
use ibridge_core::{
    Action, ConnectionParams, Duration, DurationUnit, EndDateTime, HistoricalRequest,
    InstrumentDescriptor, OrderSpec, OrderType, SecType,
};
use ibridge_gateway::TcpGateway;
use ibridge_ledger::TradeLedger;
use rust_decimal::Decimal;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "ibridge")]
#[command(about = "Synchronous broker-gateway bridge — probe, fetch bars, and submit audited trades")]
#[command(version)]
struct Cli {
    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Gateway hostname
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// Gateway port
    #[arg(long, default_value = "7497")]
    port: u16,

    /// Client identity for the session
    #[arg(long, default_value = "10645")]
    client_id: i64,

    /// Path to the trade ledger CSV
    #[arg(long, env = "IBRIDGE_LEDGER", default_value = "submitted_orders.csv")]
    ledger: PathBuf,

    /// Per-round-trip timeout in seconds
    #[arg(long, default_value = "15")]
    timeout_secs: u64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Test the gateway connection and list managed accounts
    Connect,

    /// Fetch historical bars for a currency pair
    Fetch {
        /// Currency pair token, e.g. AUD.CAD
        #[arg(long, default_value = "AUD.CAD")]
        pair: String,

        /// Lookback amount
        #[arg(long, default_value = "30")]
        duration_amount: u32,

        /// Lookback unit (S, D, W, M, Y)
        #[arg(long, default_value = "D")]
        duration_unit: DurationUnit,

        /// Bar size, passed through to the broker (e.g. "1 hour")
        #[arg(long, default_value = "1 hour")]
        bar_size: String,

        /// What to show (e.g. MIDPOINT, BID, ASK, BID_ASK)
        #[arg(long, default_value = "MIDPOINT")]
        what_to_show: String,

        /// Restrict to regular trading hours
        #[arg(long)]
        use_rth: bool,

        /// End date (YYYY-MM-DD); leaving any end component unset means "now"
        #[arg(long)]
        end_date: Option<NaiveDate>,

        /// End hour (0-23)
        #[arg(long)]
        end_hour: Option<u32>,

        /// End minute (0-59)
        #[arg(long)]
        end_minute: Option<u32>,

        /// End second (0-59)
        #[arg(long)]
        end_second: Option<u32>,
    },

    /// Submit a trade and record it in the ledger
    Trade {
        /// Asset symbol
        #[arg(long)]
        symbol: String,

        /// Security type (STK, CASH, CRYPTO, BOND, FUND)
        #[arg(long, default_value = "STK")]
        sec_type: SecType,

        /// Currency
        #[arg(long, default_value = "USD")]
        currency: String,

        /// Exchange
        #[arg(long, default_value = "SMART")]
        exchange: String,

        /// Primary exchange
        #[arg(long)]
        primary_exchange: Option<String>,

        /// BUY or SELL
        #[arg(long, default_value = "BUY")]
        action: Action,

        /// MKT or LMT
        #[arg(long, default_value = "MKT")]
        order_type: OrderType,

        /// Trade amount
        #[arg(long)]
        quantity: Decimal,

        /// Limit price (required for LMT)
        #[arg(long)]
        limit_price: Option<Decimal>,
    },

    /// Print the trade ledger
    Ledger,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    fmt().with_env_filter(filter).with_target(false).init();

    let params = ConnectionParams::new(cli.host.clone(), cli.port, cli.client_id);
    let ledger = Arc::new(TradeLedger::open(&cli.ledger));
    let bridge = Bridge::with_config(
        TcpGateway::new(),
        Arc::clone(&ledger),
        BridgeConfig {
            round_trip_timeout: std::time::Duration::from_secs(cli.timeout_secs),
        },
    )?;

    match cli.command {
        Commands::Connect => {
            let accounts = bridge.test_connection(&params)?;
            println!(
                "Connection successful! Managed accounts: {}",
                accounts.join(", ")
            );
        }

        Commands::Fetch {
            pair,
            duration_amount,
            duration_unit,
            bar_size,
            what_to_show,
            use_rth,
            end_date,
            end_hour,
            end_minute,
            end_second,
        } => {
            // The fetcher requires a verified session; probe first, the
            // same scoped-connection test the dashboard button ran.
            bridge.test_connection(&params)?;

            let request = HistoricalRequest {
                end: EndDateTime {
                    date: end_date,
                    hour: end_hour,
                    minute: end_minute,
                    second: end_second,
                },
                duration: Duration::new(duration_amount, duration_unit),
                bar_size,
                what_to_show,
                use_rth,
            };
            let series = bridge.fetch_chart(&pair, &request, &params)?;
            println!(
                "fetched data for: {} ({} bars, {})",
                series.contract.canonical_pair(),
                series.bars.len(),
                series.what_to_show
            );
            for bar in &series.bars {
                println!(
                    "{}  open {}  high {}  low {}  close {}",
                    bar.timestamp, bar.open, bar.high, bar.low, bar.close
                );
            }
        }

        Commands::Trade {
            symbol,
            sec_type,
            currency,
            exchange,
            primary_exchange,
            action,
            order_type,
            quantity,
            limit_price,
        } => {
            let spec = OrderSpec {
                descriptor: InstrumentDescriptor {
                    symbol,
                    sec_type,
                    currency,
                    exchange,
                    primary_exchange,
                },
                action,
                order_type,
                quantity,
                limit_price,
            };
            let record = bridge.submit_trade(&spec, &params)?;
            println!(
                "{} {} {} — order {} (perm {}) recorded at {}",
                record.action, record.size, record.symbol, record.order_id, record.perm_id,
                record.timestamp
            );
        }

        Commands::Ledger => {
            let rows = ledger.load()?;
            if rows.is_empty() {
                println!("ledger is empty");
            }
            for r in rows {
                println!(
                    "{}  {} {} {}  order {}  client {}  perm {}  contract {}  {}{}",
                    r.timestamp,
                    r.action,
                    r.size,
                    r.symbol,
                    r.order_id,
                    r.client_id,
                    r.perm_id,
                    r.contract_id,
                    r.order_type,
                    r.limit_price
                        .map(|p| format!(" @ {}", p))
                        .unwrap_or_default()
                );
            }
        }
    }

    Ok(())
}

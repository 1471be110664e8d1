use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use foliotrack::core::log::init_logging;
use rust_decimal::Decimal;

#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to optional configuration file
    #[arg(short, long, global = true)]
    config_path: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

impl From<Commands> for foliotrack::AppCommand {
    fn from(cmd: Commands) -> foliotrack::AppCommand {
        match cmd {
            Commands::Summary => foliotrack::AppCommand::Summary,
            Commands::Snapshot => foliotrack::AppCommand::Snapshot,
            Commands::Breakdown => foliotrack::AppCommand::Breakdown,
            Commands::History => foliotrack::AppCommand::History,
            Commands::RefreshAssets => foliotrack::AppCommand::RefreshAssets,
            Commands::Add {
                portfolio,
                symbol,
                quantity,
                currency,
            } => foliotrack::AppCommand::Add {
                portfolio,
                symbol,
                quantity,
                currency,
            },
            Commands::Set {
                portfolio,
                symbol,
                position,
                target_ratio,
            } => foliotrack::AppCommand::Set {
                portfolio,
                symbol,
                position,
                target_ratio,
            },
            Commands::Remove { portfolio, symbol } => {
                foliotrack::AppCommand::Remove { portfolio, symbol }
            }
            Commands::Search { query, limit } => foliotrack::AppCommand::Search { query, limit },
            Commands::Setup => unreachable!("Setup command should be handled separately"),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Create default configuration
    Setup,
    /// Display portfolio summaries with current values and weights
    Summary,
    /// Record today's total value data point
    Snapshot,
    /// Display asset type and geographic breakdowns
    Breakdown,
    /// Display the recorded total value history
    History,
    /// Refresh quote data for all known assets
    RefreshAssets,
    /// Add a position to a portfolio
    Add {
        /// Portfolio name; created if it does not exist
        portfolio: String,
        /// Ticker symbol, e.g. AAPL
        symbol: String,
        /// Number of units to add
        quantity: Decimal,
        /// Currency for a newly created portfolio (defaults to your currency)
        #[arg(long)]
        currency: Option<foliotrack::core::Currency>,
    },
    /// Edit a holding's position and/or target allocation
    Set {
        /// Portfolio name
        portfolio: String,
        /// Ticker symbol, e.g. AAPL
        symbol: String,
        /// New position (replaces the current one)
        position: Option<Decimal>,
        /// Target allocation within the portfolio, 0 to 100
        #[arg(long)]
        target_ratio: Option<Decimal>,
    },
    /// Remove a holding from a portfolio
    Remove {
        /// Portfolio name
        portfolio: String,
        /// Ticker symbol, e.g. AAPL
        symbol: String,
    },
    /// Search for symbols by name
    Search {
        query: String,
        /// Maximum number of results
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    let result = match cli.command {
        Some(Commands::Setup) => setup(),
        Some(cmd) => foliotrack::run_command(cmd.into(), cli.config_path.as_deref()).await,
        None => {
            Cli::command().print_help()?;
            Ok(())
        }
    };

    if let Err(e) = &result {
        tracing::error!(error = %e, "Application failed");
    }
    result
}

fn setup() -> anyhow::Result<()> {
    use anyhow::Context;

    let path = foliotrack::core::AppConfig::default_config_path()?;

    if path.exists() {
        anyhow::bail!("Configuration file already exists at {}", path.display());
    }

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }

    let default_config = r#"---
user: "me"
currency: "USD"

providers:
  yahoo:
    base_url: "https://query1.finance.yahoo.com"
"#;

    std::fs::write(&path, default_config)
        .with_context(|| format!("Failed to write config file to {}", path.display()))?;

    tracing::info!("Created default configuration at {}", path.display());
    Ok(())
}

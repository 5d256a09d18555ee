use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use clap::{Parser, Subcommand};
use portfolio_ledger::{
    app::Portfolio,
    config::{Config, OversellPolicy},
    services::ManualMapping,
};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "portfolio-ledger")]
#[command(about = "Import broker statements and rebuild FIFO holdings")]
struct Cli {
    /// SQLite database file, overrides DATABASE_URL
    #[arg(long, global = true)]
    database: Option<String>,

    /// `cap` or `reject`, overrides OVERSELL_POLICY
    #[arg(long, global = true)]
    oversell_policy: Option<OversellPolicy>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    #[command(subcommand)]
    Account(AccountCommand),

    /// Import one or more broker exports into an account
    Import {
        #[arg(long)]
        account: i64,

        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Recompute the holdings of an account from its transactions
    Rebuild {
        #[arg(long)]
        account: i64,
    },

    /// Record a quote for an asset
    Price {
        #[arg(long)]
        asset: i64,

        price: Decimal,

        /// `YYYY-MM-DD HH:MM:SS`, defaults to now
        #[arg(long)]
        at: Option<String>,
    },

    #[command(subcommand)]
    Registry(RegistryCommand),
}

#[derive(Subcommand)]
enum AccountCommand {
    /// Create a broker account
    Create {
        #[arg(long)]
        user: i64,

        #[arg(long)]
        broker: String,

        #[arg(long)]
        name: String,
    },

    /// Get or create the account for manually tracked commodities
    Synthetic {
        #[arg(long)]
        user: i64,
    },
}

#[derive(Subcommand)]
enum RegistryCommand {
    /// List ISINs still without a symbol
    Pending,

    /// Retry the lookup for every pending ISIN
    Enrich,

    /// Set the identity of an ISIN by hand
    Set {
        isin: String,

        symbol: String,

        #[arg(long)]
        exchange: Option<String>,

        #[arg(long)]
        mic: Option<String>,

        #[arg(long)]
        suffix: Option<String>,

        #[arg(long)]
        currency: Option<String>,
    },
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config = Config::from_env()?;
    if let Some(database) = cli.database {
        config.database_url = shellexpand::tilde(&database).into_owned();
    }
    if let Some(policy) = cli.oversell_policy {
        config.oversell_policy = policy;
    }

    let portfolio = Portfolio::connect(&config)
        .await
        .with_context(|| format!("Failed to open database at {}", config.database_url))?;

    match cli.command {
        Command::Account(AccountCommand::Create { user, broker, name }) => {
            print_json(&portfolio.create_account(user, &broker, &name).await?)?;
        }
        Command::Account(AccountCommand::Synthetic { user }) => {
            print_json(&portfolio.ensure_synthetic_account(user).await?)?;
        }
        Command::Import { account, files } => {
            let jobs: Vec<(i64, PathBuf)> = files.into_iter().map(|path| (account, path)).collect();
            print_json(&portfolio.import_batch(&jobs).await)?;
        }
        Command::Rebuild { account } => {
            print_json(&portfolio.rebuild(account).await?)?;
        }
        Command::Price { asset, price, at } => {
            let at = match at {
                Some(at) => NaiveDateTime::parse_from_str(&at, "%Y-%m-%d %H:%M:%S")
                    .with_context(|| format!("Invalid timestamp '{}'", at))?,
                None => chrono::Utc::now().naive_utc(),
            };
            portfolio.update_asset_price(asset, price, at).await?;
        }
        Command::Registry(RegistryCommand::Pending) => {
            print_json(&portfolio.resolver().pending().await?)?;
        }
        Command::Registry(RegistryCommand::Enrich) => {
            print_json(&portfolio.resolver().enrich_pending().await?)?;
        }
        Command::Registry(RegistryCommand::Set {
            isin,
            symbol,
            exchange,
            mic,
            suffix,
            currency,
        }) => {
            let mapping = ManualMapping {
                isin,
                symbol,
                exchange,
                mic,
                quote_suffix: suffix,
                currency,
            };
            print_json(&portfolio.resolver().set_manual(&mapping).await?)?;
        }
    }

    Ok(())
}

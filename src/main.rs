use anyhow::Context;
use clap::{Parser, Subcommand};
use economy_service::config::Config;
use economy_service::models::page::PageRequest;
use economy_service::models::types::Metadata;
use economy_service::stacking::SplitSpec;
use economy_service::util::random::GrantAmount;
use economy_service::{Registry, db::Db};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;

// cargo run --bin economy-admin -- give-item --storage <id> --item <id> --amount 5

#[derive(Debug, Parser)]
#[command(name = "economy-admin", version, about = "Inspect and operate the game economy")]
struct Args {
    /// TOML config file (if omitted, use env/.env)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override database URL
    #[arg(long)]
    database_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Apply pending schema migrations
    Migrate,
    /// Print a storage with all of its stacks and balances
    Storage { id: String },
    /// Print a product with its rewards and prices
    Product { id: String },
    /// Print a shop and its products
    Shop { id: String },
    /// List products
    Products {
        #[arg(long, default_value_t = 0)]
        page_size: i64,
        #[arg(long, default_value = "")]
        page_token: String,
    },
    /// Grant an item to a storage, optionally a random amount in [min, max]
    GiveItem {
        #[arg(long)]
        storage: String,
        #[arg(long)]
        item: String,
        #[arg(long, conflicts_with_all = ["min", "max"])]
        amount: Option<i64>,
        #[arg(long, requires = "max")]
        min: Option<i64>,
        #[arg(long, requires = "min")]
        max: Option<i64>,
        /// JSON document attached to newly created stacks
        #[arg(long)]
        metadata: Option<String>,
    },
    /// Grant currency to a storage
    GiveCurrency {
        #[arg(long)]
        storage: String,
        #[arg(long)]
        currency: String,
        #[arg(long)]
        amount: i64,
    },
    /// Split a stack into equal chunks
    Split {
        #[arg(long)]
        storage: String,
        #[arg(long)]
        stack: String,
        #[arg(long)]
        chunks: i64,
    },
    /// Merge stack `from` into stack `to`
    Merge {
        #[arg(long)]
        to: String,
        #[arg(long)]
        from: String,
    },
    /// Buy a product with one of its prices
    Buy {
        #[arg(long)]
        product: String,
        #[arg(long)]
        price: String,
        #[arg(long)]
        paying: String,
        /// Defaults to the paying storage
        #[arg(long)]
        receiving: Option<String>,
    },
    /// Print one config value
    GetConfig { key: String },
    /// Store a config value, replacing any previous one
    SetConfig { key: String, value: String },
    /// List config values by key
    Configs {
        #[arg(long, default_value_t = 0)]
        page_size: i64,
        #[arg(long, default_value = "")]
        page_token: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut cfg = match &args.config {
        Some(path) => Config::load(path)?,
        None => Config::from_env()?,
    };
    if let Some(url) = args.database_url {
        cfg.database_url = url;
    }

    init_tracing(&cfg.log_filter)?;

    if let Command::Migrate = args.command {
        let db = Db::new(&cfg.database_url, cfg.pool_max_size)?;
        db.init().await.context("migration failed")?;
        tracing::info!("database is up to date");
        return Ok(());
    }

    let registry = Registry::connect(Arc::new(cfg)).await?;
    let services = &registry.services;

    match args.command {
        Command::Migrate => {}
        Command::Storage { id } => print_json(&services.storage.get(&id).await?)?,
        Command::Product { id } => print_json(&services.product.get(&id).await?)?,
        Command::Shop { id } => print_json(&services.shop.get(&id).await?)?,
        Command::Products { page_size, page_token } => {
            print_json(&services.product.list(&PageRequest::new(page_size, page_token)).await?)?
        }
        Command::GiveItem {
            storage,
            item,
            amount,
            min,
            max,
            metadata,
        } => {
            let amount = match (amount, min, max) {
                (Some(n), _, _) => GrantAmount::Exact(n),
                (None, Some(min), Some(max)) => GrantAmount::Range { min, max },
                _ => anyhow::bail!("either --amount or --min/--max is required"),
            };
            let metadata = metadata
                .as_deref()
                .map(Metadata::parse)
                .transpose()
                .context("--metadata is not valid JSON")?;
            print_json(&services.storage.give_item(&storage, &item, amount, metadata).await?)?
        }
        Command::GiveCurrency {
            storage,
            currency,
            amount,
        } => print_json(
            &services
                .storage
                .give_currency(&storage, &currency, GrantAmount::Exact(amount))
                .await?,
        )?,
        Command::Split { storage, stack, chunks } => print_json(
            &services
                .storage
                .split_stack(&storage, &stack, SplitSpec::Chunks(chunks))
                .await?,
        )?,
        Command::Merge { to, from } => print_json(&services.storage.merge_stack(&to, &from).await?)?,
        Command::Buy {
            product,
            price,
            paying,
            receiving,
        } => {
            let receiving = receiving.unwrap_or_else(|| paying.clone());
            print_json(&services.product.buy(&product, &price, &paying, &receiving).await?)?
        }
        Command::GetConfig { key } => print_json(&services.config.get(&key).await?)?,
        Command::SetConfig { key, value } => print_json(&services.config.set(&key, &value).await?)?,
        Command::Configs { page_size, page_token } => {
            print_json(&services.config.list(&PageRequest::new(page_size, page_token)).await?)?
        }
    }

    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// `RUST_LOG` wins over the configured filter when set.
fn init_tracing(filter: &str) -> anyhow::Result<()> {
    use tracing_subscriber::{EnvFilter, prelude::*};

    color_eyre::install().map_err(|e| anyhow::anyhow!(e))?;

    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(filter))?;

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr)
                .with_timer(tracing_subscriber::fmt::time::uptime()),
        )
        .with(tracing_error::ErrorLayer::default())
        .init();
    Ok(())
}

use std::env;
use std::sync::Arc;

use anyhow::{Context, bail};
use records::status::check_status;
use records::views::listing;
use records::{BackendTarget, EntityKind, QueryCache};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

const USAGE: &str = "usage: records status | records list <table> [search term]";

fn init_logging() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();

    let args: Vec<String> = env::args().skip(1).collect();
    let target = BackendTarget::from_env()?;
    if let BackendTarget::Rest(config) = &target {
        tracing::info!("Using backend at {}", config.url);
    }
    let backend = target.connect();

    match args.first().map(String::as_str) {
        Some("status") => {
            let status = check_status(backend.as_ref()).await;
            println!("Database Status");
            for (kind, count) in &status.tables {
                println!("  {:<10} {}", kind.table(), count);
            }
        }
        Some("list") => {
            let kind: EntityKind = args
                .get(1)
                .context(USAGE)?
                .parse()
                .map_err(anyhow::Error::msg)?;
            let term = args[2..].join(" ");
            let listing = listing(kind, backend, Arc::new(QueryCache::new()), &term).await;

            if let Some(error) = listing.error {
                bail!(error);
            }
            println!("{}", listing.title);
            println!("{}", listing.headers.join("\t"));
            if listing.rows.is_empty() {
                println!("{}", listing.empty_message);
            }
            for row in &listing.rows {
                println!("{}", row.join("\t"));
            }
        }
        _ => bail!(USAGE),
    }

    Ok(())
}

//! Feed snapshot - run the feeds for one region group and print them as JSON
//!
//! Usage: `feed-snapshot <group> [transactions|subscriptions|population ...]`

use anyhow::Result;
use kr_realty_backend::config::Config;
use kr_realty_backend::ingestion::pipeline::FeedService;
use kr_realty_backend::ingestion::rank::{DisplayMode, SubscriptionView};
use kr_realty_backend::ingestion::DataKind;
use serde::Serialize;
use std::env;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

fn print_feed<T: Serialize>(name: &str, feed: &T) -> Result<()> {
    println!("=== {} ===", name);
    println!("{}", serde_json::to_string_pretty(feed)?);
    Ok(())
}

fn parse_kind(name: &str) -> Option<DataKind> {
    match name {
        "transactions" => Some(DataKind::Transactions),
        "subscriptions" => Some(DataKind::Subscriptions),
        "population" => Some(DataKind::Population),
        _ => None,
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    // Logs go to stderr so stdout stays valid JSON sections
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let config = Config::from_env()?;
    let service = FeedService::from_config(&config)?;

    let args: Vec<String> = env::args().skip(1).collect();
    let group = args
        .first()
        .cloned()
        .unwrap_or_else(|| service.catalog().default_group().key.clone());
    let feeds = if args.len() > 1 {
        args[1..].to_vec()
    } else {
        vec![
            "transactions".to_string(),
            "subscriptions".to_string(),
            "population".to_string(),
        ]
    };

    info!("Snapshot for {}", group);

    for name in feeds {
        let Some(kind) = parse_kind(&name) else {
            warn!("Unknown feed: {}", name);
            continue;
        };

        match kind {
            DataKind::Transactions => {
                let feed = service.transactions(&group, DisplayMode::All, None).await;
                info!("{}: {:?}, {} records", kind, feed.source, feed.records.len());
                print_feed(&name, &feed)?;
            }
            DataKind::Subscriptions => {
                let feed = service
                    .subscriptions(&group, SubscriptionView::Calendar, DisplayMode::All)
                    .await;
                info!("{}: {:?}, {} records", kind, feed.source, feed.records.len());
                print_feed(&name, &feed)?;
            }
            DataKind::Population => {
                let feed = service.population(&group, DisplayMode::All).await;
                info!("{}: {:?}, {} records", kind, feed.source, feed.records.len());
                print_feed(&name, &feed)?;
            }
        }
    }

    Ok(())
}

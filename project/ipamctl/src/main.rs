mod cli;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use cli::{Cli, Commands};
use libipam::{IpamConfig, IpamService, IpamStore, XlineIpamStore};
use log::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    env_logger::init();

    let cfg = IpamConfig::from_file(&cli.config)
        .with_context(|| format!("Failed to load config {}", cli.config.display()))?;
    let store = XlineIpamStore::connect(cfg.store_options()?)
        .await
        .context("Failed to connect xline")?;
    let ipam = IpamService::new(Arc::new(store))
        .with_keyspace(cfg.keyspace())
        .with_retry_policy(cfg.retry_policy());

    match cli.command {
        Commands::Allocate {
            segment,
            timeout_secs,
        } => {
            let timeout = timeout_secs
                .map(Duration::from_secs)
                .or(cfg.allocation_timeout());
            let address = match timeout {
                Some(t) => ipam.allocate_address_within(&segment, t).await,
                None => ipam.allocate_address(&segment).await,
            }
            .with_context(|| format!("Failed to allocate from {segment}"))?;
            info!("allocated {address} from {segment}");
            println!("{address}");
        }
        Commands::Show { segment } => match ipam.segment_usage(&segment).await? {
            Some(record) => println!("{}", serde_json::to_string_pretty(&record)?),
            None => println!("no record for {segment}"),
        },
        Commands::Dump => {
            let prefix = ipam.keyspace().app_prefix();
            for (key, value) in ipam.store().list(&prefix).await? {
                println!("=================================================");
                println!("Key: {key}");
                println!("Value: {}", String::from_utf8_lossy(&value));
            }
        }
    }

    Ok(())
}

//! Command-line interface for rigwatch.
//!
//! One-shot queries and device control against the API. The daemon is
//! the polling host; this binary fetches fresh state per invocation.

use std::env;

use anyhow::{Context, Result};

use rigwatch::client::{DEFAULT_PAYOUT_PAGE, MiningApi, PrivateClient, PublicClient, RatesApi};
use rigwatch::config::{Config, DisplayCurrency};
use rigwatch::control::{self, DeviceAction};
use rigwatch::model::{AccountBalances, MiningRig, Payout, build_rate_table};

#[tokio::main]
async fn main() -> Result<()> {
    rigwatch::tracing::init();

    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        usage();
        std::process::exit(1);
    }

    match args[1].as_str() {
        "balances" => cmd_balances().await?,
        "rigs" => cmd_rigs().await?,
        "rig" if args.len() == 3 => cmd_rig(&args[2]).await?,
        "payouts" => cmd_payouts().await?,
        "device" if args.len() == 5 => {
            let action: DeviceAction = args[4]
                .parse()
                .with_context(|| format!("unknown action {:?}, expected start or stop", args[4]))?;
            cmd_device(&args[2], &args[3], action).await?;
        }
        other => {
            eprintln!("Unknown or incomplete command: {}", other);
            usage();
            std::process::exit(1);
        }
    }

    Ok(())
}

fn usage() {
    eprintln!("Usage: rigwatch-cli <command>");
    eprintln!();
    eprintln!("Commands:");
    eprintln!("  balances                              Show account balances");
    eprintln!("  rigs                                  List mining rigs");
    eprintln!("  rig <rig-id>                          Show one rig in detail");
    eprintln!("  payouts                               List recent payouts");
    eprintln!("  device <rig-id> <device-id> <start|stop>");
    eprintln!("                                        Start or stop a device");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  RIGWATCH_ORG_ID, RIGWATCH_API_KEY, RIGWATCH_API_SECRET (required)");
    eprintln!("  RIGWATCH_CURRENCY                     Display currency (default BTC)");
}

fn make_client() -> Result<(Config, PrivateClient)> {
    let config = Config::from_env()?;
    let client = PrivateClient::new(config.credentials());
    Ok((config, client))
}

async fn cmd_balances() -> Result<()> {
    let (config, client) = make_client()?;
    let accounts = client.accounts().await.context("failed to fetch accounts")?;
    let balances = AccountBalances::parse(&accounts);

    println!("Total:     {:.8} BTC", balances.total);
    println!("Available: {:.8} BTC", balances.available);
    println!("Pending:   {:.8} BTC", balances.pending);

    if config.currency != DisplayCurrency::Btc {
        let rates = PublicClient::new()
            .exchange_rates()
            .await
            .context("failed to fetch exchange rates")?;
        let table = build_rate_table(&rates);
        match table.get(&format!("BTC-{}", config.currency)) {
            Some(&rate) => {
                let display = balances.converted(rate);
                println!();
                println!("At {rate} BTC-{}:", config.currency);
                println!("Total:     {:.2} {}", display.total, config.currency);
                println!("Available: {:.2} {}", display.available, config.currency);
                println!("Pending:   {:.2} {}", display.pending, config.currency);
            }
            None => println!("(no exchange rate for {})", config.currency),
        }
    }

    Ok(())
}

async fn cmd_rigs() -> Result<()> {
    let (_, client) = make_client()?;
    let data = client.mining_rigs().await.context("failed to fetch rigs")?;

    let rigs: Vec<MiningRig> = data
        .get("miningRigs")
        .and_then(|rigs| rigs.as_array())
        .map(|entries| entries.iter().map(MiningRig::parse).collect())
        .unwrap_or_default();

    if rigs.is_empty() {
        println!("No rigs.");
        return Ok(());
    }

    for rig in &rigs {
        println!(
            "{}  {}  {}  {} device(s)  unpaid {:.8} BTC",
            rig.id,
            rig.name,
            rig.status,
            rig.num_devices(),
            rig.unpaid_amount,
        );
        for algorithm in rig.algorithms() {
            println!("  {} {:.2} {}", algorithm.name, algorithm.speed, algorithm.unit);
        }
    }

    Ok(())
}

async fn cmd_rig(rig_id: &str) -> Result<()> {
    let (_, client) = make_client()?;
    let data = client
        .mining_rig(rig_id)
        .await
        .with_context(|| format!("failed to fetch rig {rig_id}"))?;
    let rig = MiningRig::parse(&data);

    println!("Rig:    {} ({})", rig.name, rig.id);
    println!("Status: {}", rig.status);
    if let Some(highest) = rig.highest_temperature() {
        println!("Hottest device: {highest} °C");
    }

    for device in rig.devices() {
        println!();
        println!("  {} ({})", device.name, device.id);
        println!("    status {}  temp {} °C  load {:.0}%  fan {:.0} rpm",
            device.status, device.temperature, device.load, device.rpm);
        if let Some(algorithm) = device.active_algorithm() {
            println!("    {} {:.2} {}", algorithm.name, algorithm.speed, algorithm.unit);
        }
    }

    Ok(())
}

async fn cmd_payouts() -> Result<()> {
    let (_, client) = make_client()?;
    let data = client
        .rig_payouts(DEFAULT_PAYOUT_PAGE)
        .await
        .context("failed to fetch payouts")?;

    let mut payouts: Vec<Payout> = data
        .get("list")
        .and_then(|list| list.as_array())
        .map(|entries| entries.iter().map(Payout::parse).collect())
        .unwrap_or_default();
    payouts.sort_by_key(|payout| payout.created);

    if payouts.is_empty() {
        println!("No payouts.");
        return Ok(());
    }

    for payout in &payouts {
        println!(
            "{}  {:.8} {} (fee {:.8})  {}",
            fmt_created(payout.created),
            payout.amount,
            payout.currency,
            payout.fee,
            payout.account_type,
        );
    }

    Ok(())
}

async fn cmd_device(rig_id: &str, device_id: &str, action: DeviceAction) -> Result<()> {
    let (_, client) = make_client()?;
    let outcome = control::toggle_device(&client, rig_id, device_id, action).await;

    println!("{}", outcome.message);
    if !outcome.success {
        std::process::exit(1);
    }
    Ok(())
}

/// Render an epoch-milliseconds timestamp as a UTC date.
fn fmt_created(created_ms: i64) -> String {
    time::OffsetDateTime::from_unix_timestamp(created_ms / 1000)
        .map(|when| {
            when.format(time::macros::format_description!(
                "[year]-[month]-[day] [hour]:[minute]"
            ))
            .unwrap_or_else(|_| created_ms.to_string())
        })
        .unwrap_or_else(|_| created_ms.to_string())
}

//! Headless front-end: one subcommand per query plus a blocking `watch`.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::sync::Arc;
use ticker_monitor::{
    constants::DEFAULT_TOP_LIMIT, AlertRegistry, AlertSpec, CoinGeckoClient, CoinInfo,
    MarketDataError, MarketDataProvider, MonitorEvent, TickerId,
};
use tokio::sync::broadcast::error::RecvError;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Crypto Tracker - prices, coin details and price alerts from CoinGecko.
#[derive(Parser, Debug)]
#[command(name = "ticker-monitor", version, about)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show the current USD price of a coin (e.g. bitcoin)
    Price { ticker: String },
    /// Show name, price, market cap, 24h change and supply of a coin
    Info { ticker: String },
    /// List the largest coins by market cap
    Top {
        #[arg(long, default_value_t = DEFAULT_TOP_LIMIT)]
        limit: usize,
    },
    /// Search coins by name or symbol
    Search { query: String },
    /// Notify every 15s while the price is on either side of the target, until Ctrl-C
    Watch { ticker: String, target_price: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ticker_monitor=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    let client = Arc::new(CoinGeckoClient::from_env().context("failed to create client")?);

    match args.command {
        Command::Price { ticker } => check_price(&*client, &TickerId::new(&ticker)).await,
        Command::Info { ticker } => show_info(&*client, &TickerId::new(&ticker)).await,
        Command::Top { limit } => show_top(&*client, limit).await,
        Command::Search { query } => search(&*client, &query).await,
        Command::Watch {
            ticker,
            target_price,
        } => watch(client, &ticker, &target_price).await,
    }
}

async fn check_price(client: &dyn MarketDataProvider, ticker: &TickerId) -> Result<()> {
    match client.get_price(ticker).await {
        Ok(Some(quote)) => println!("Current price of {}: ${}", ticker, quote.price_usd),
        Ok(None) => println!("Error: Could not fetch price for {}.", ticker),
        Err(e) => return Err(e).with_context(|| format!("price request for {ticker} failed")),
    }
    Ok(())
}

fn display(value: Option<f64>) -> String {
    value.map_or_else(|| "n/a".to_string(), |v| v.to_string())
}

fn format_info(info: &CoinInfo) -> String {
    format!(
        "Name: {}\nCurrent Price: ${}\nMarket Cap: ${}\n24h Change: {}%\nTotal Supply: {}\nCirculating Supply: {}",
        info.name.as_deref().unwrap_or("n/a"),
        display(info.current_price),
        display(info.market_cap),
        display(info.price_change_percentage_24h),
        display(info.total_supply),
        display(info.circulating_supply),
    )
}

async fn show_info(client: &dyn MarketDataProvider, ticker: &TickerId) -> Result<()> {
    match client.get_info(ticker).await {
        Ok(info) => println!("{}", format_info(&info)),
        Err(MarketDataError::NotFound { .. }) => {
            println!("Error: Could not fetch info for this cryptocurrency.")
        }
        Err(MarketDataError::PartialData { missing, .. }) => {
            tracing::debug!(?missing, "Coin info incomplete");
            println!("Error: Some data is missing for this cryptocurrency.")
        }
        Err(e) => return Err(e).with_context(|| format!("info request for {ticker} failed")),
    }
    Ok(())
}

async fn show_top(client: &dyn MarketDataProvider, limit: usize) -> Result<()> {
    let top = client
        .get_top_cryptos(limit)
        .await
        .context("top list request failed")?;

    println!("Top {} Cryptos:", limit);
    for coin in top {
        println!(
            "{} - ${} - Market Cap: ${}",
            coin.name,
            display(coin.current_price),
            display(coin.market_cap)
        );
    }
    Ok(())
}

async fn search(client: &dyn MarketDataProvider, query: &str) -> Result<()> {
    let hits = client.search(query).await.context("search request failed")?;
    if hits.is_empty() {
        println!("No coins match {:?}.", query);
    }
    for hit in hits {
        println!("{:<30} {}", hit.id, hit.display_name());
    }
    Ok(())
}

async fn watch(client: Arc<CoinGeckoClient>, ticker: &str, target_price: &str) -> Result<()> {
    let spec = match AlertSpec::parse(ticker, target_price) {
        Ok(spec) => spec,
        Err(e) => {
            println!("Please enter a valid target price. ({})", e);
            return Ok(());
        }
    };

    let registry = AlertRegistry::new(client);
    let mut events = registry.subscribe();
    let info = registry.start(spec).await?;
    println!(
        "Monitoring {} for price: ${}",
        info.spec().ticker,
        info.spec().target_price
    );

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            event = events.recv() => match event {
                Ok(event @ MonitorEvent::PriceAlert { .. }) => println!("Notification: {}", event),
                Ok(event @ MonitorEvent::Diagnostic { .. }) => println!("Error: {}", event),
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Event subscriber lagged");
                }
                Err(RecvError::Closed) => break,
            },
        }
    }

    let stopped = registry.stop_all().await;
    tracing::info!(stopped, "Shut down");
    Ok(())
}

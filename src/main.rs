use anyhow::Context;
use derivlink::app::ExchangeManager;
use derivlink::config::Config;
use derivlink::domain::Platform;
use tokio::signal;
use tracing::{error, info, warn};

const CONFIG_ENV: &str = "DERIVLINK_CONFIG";

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    let _ = rustls::crypto::ring::default_provider().install_default();

    let path = std::env::var(CONFIG_ENV).unwrap_or_else(|_| "config.toml".into());
    let config = match Config::load(&path).with_context(|| format!("loading {path}")) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config: {e:#}");
            std::process::exit(1);
        }
    };

    config.init_logging();
    info!(accounts = config.accounts.len(), "derivlink starting");

    if let Err(e) = run(config).await {
        error!(error = %e, "Fatal error");
        std::process::exit(1);
    }

    info!("derivlink stopped");
}

async fn run(config: Config) -> anyhow::Result<()> {
    let manager = ExchangeManager::from_config(&config);

    for id in manager.account_ids() {
        if let Err(e) = manager.test_connection(&id).await {
            if e.is_fatal() {
                warn!(account = %id, "Credentials rejected; account disabled");
                manager.unregister(&id);
            }
        }
    }

    if config.watch.symbols.is_empty() {
        info!("No watch symbols configured");
        return Ok(());
    }

    let platform = config.watch.platform.unwrap_or(Platform::Binance);
    let stream = manager.market_stream(platform, false);
    stream.set_on_ticker(|ticker| {
        info!(
            symbol = %ticker.symbol,
            last = %ticker.last_price,
            mark = %ticker.effective_mark_price(),
            change = %ticker.change_24h,
            "Ticker"
        );
    });
    stream.set_on_kline(|symbol, interval, kline| {
        info!(symbol, interval, open_time = kline.open_time, close = %kline.close, "Kline");
    });

    for symbol in &config.watch.symbols {
        stream
            .subscribe_ticker(symbol)
            .await
            .with_context(|| format!("subscribing {symbol} tickers on {platform}"))?;
        for interval in &config.watch.intervals {
            stream
                .subscribe_kline(symbol, interval)
                .await
                .with_context(|| format!("subscribing {symbol} {interval} klines on {platform}"))?;
        }
    }

    signal::ctrl_c().await.context("waiting for ctrl-c")?;
    info!("Shutdown signal received");
    stream.close().await;
    Ok(())
}

pub mod cli;
mod slack;

use std::sync::Arc;

use clap::Parser;

use feed::observer::{FeedConfig, FeedObserver, TradeSource};
use monitor::alert::{AlertSink, LogSink};
use monitor::registry::MonitorRegistry;
use monitor::store::json_file::JsonFileStore;

use cli::Cli;
use slack::SlackWebhookSink;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    common::logger::init_logger("coinjumps");
    let cli = Cli::parse();

    let store = Arc::new(JsonFileStore::new(&cli.store_path));
    let observer = FeedObserver::new(FeedConfig::new(cli.feed_url.clone()));

    let sink: Arc<dyn AlertSink> = match cli.slack_webhook.clone() {
        Some(url) => Arc::new(SlackWebhookSink::new(url)),
        None => {
            tracing::warn!("no slack webhook configured, alerts will only be logged");
            Arc::new(LogSink)
        }
    };

    let feed: Arc<dyn TradeSource> = Arc::new(observer.clone());
    let registry = MonitorRegistry::new(store, feed, sink);
    registry.load().await?;

    tracing::info!(
        store = %cli.store_path.display(),
        feed_url = %cli.feed_url,
        status = %observer.current_status().status,
        "coinjumps running, ctrl-c to exit"
    );
    tokio::signal::ctrl_c().await?;

    registry.shutdown().await;
    Ok(())
}

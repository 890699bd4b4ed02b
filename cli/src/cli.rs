use std::path::PathBuf;

use clap::Parser;

#[derive(Debug, Parser)]
#[clap(name = "coinjumps", version)]
pub struct Cli {
    /// Websocket endpoint of the live trade feed
    #[clap(long, default_value = "wss://trades.coincap.io/ws")]
    pub feed_url: String,

    /// Where the monitor configuration is persisted
    #[clap(long, default_value = "coinjumps/configurations.json")]
    pub store_path: PathBuf,

    /// Slack incoming-webhook URL; when omitted, alerts go to the log only
    #[clap(long, env = "COINJUMPS_SLACK_WEBHOOK")]
    pub slack_webhook: Option<String>,
}

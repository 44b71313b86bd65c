use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Error, anyhow};
use chrono_tz::Tz;
use clap::Parser;

/// REST api caching Deutsche Bahn stops and enriching them with generated text
#[derive(Debug, Clone, Parser)]
#[command(version, about)]
pub struct Config {
    /// Address the http server listens on
    #[arg(long, env = "BIND_ADDRESS", default_value = "127.0.0.1:5000")]
    pub bind: SocketAddr,

    #[arg(long, env = "DATABASE_URL", default_value = "sqlite://stops.db")]
    pub database_url: String,

    /// Scratch file every generated tourism guide is written to
    #[arg(long, env = "GUIDE_PATH", default_value = "guide.txt")]
    pub guide_path: PathBuf,

    /// Host used for links when a request carries no Host header
    #[arg(long, env = "PUBLIC_HOST", default_value = "localhost:5000")]
    pub public_host: String,

    /// Timezone `last_updated` timestamps are written in
    #[arg(long, env = "STOPS_TIMEZONE", default_value = "Europe/Berlin")]
    pub timezone: String,

    #[arg(long, env = "TRANSIT_API_URL", default_value = "https://v6.db.transport.rest")]
    pub transit_api_url: String,

    #[arg(
        long,
        env = "GEMINI_API_URL",
        default_value = "https://generativelanguage.googleapis.com"
    )]
    pub gemini_api_url: String,

    #[arg(long, env = "GEMINI_MODEL", default_value = "gemini-2.0-flash")]
    pub gemini_model: String,

    #[arg(long, env = "GOOGLE_API_KEY", hide_env_values = true)]
    pub google_api_key: String,

    /// Timeout for every outbound request, in seconds
    #[arg(long, env = "REQUEST_TIMEOUT_SECS", default_value_t = 30)]
    pub request_timeout_secs: u64,

    /// gRPC endpoint spans are exported to. Export is off when unset.
    #[arg(long, env = "OTLP_ENDPOINT")]
    pub otlp_endpoint: Option<String>,

    #[arg(long, env = "LOG_DIR", default_value = "./logs")]
    pub log_dir: PathBuf,
}

impl Config {
    pub fn tz(&self) -> Result<Tz, Error> {
        self.timezone
            .parse()
            .map_err(|_| anyhow!("unknown timezone {}", self.timezone))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

pub const APP_DIR_NAME: &str = "wallapop-watcher";

#[derive(Debug, Clone, Parser)]
#[command(name = "wallapop-watcher", version, about = "Notifies about new items in your Wallapop saved searches")]
pub struct Config {
    /// Directory holding headers.json and last_items.json
    #[arg(long, env = "WATCHER_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// One-shot file with a pasted request (fetch snippet, header JSON or token)
    #[arg(long, env = "WATCHER_HEADERS_FILE")]
    pub headers_file: Option<PathBuf>,

    /// Ask for credentials at startup even if stored headers exist
    #[arg(long, env = "WATCHER_INTERACTIVE")]
    pub interactive: bool,

    /// Never prompt; an expired credential stops the watcher
    #[arg(long, conflicts_with = "interactive")]
    pub no_prompt: bool,

    /// Forget the last seen items and start with fresh baselines
    #[arg(long, env = "WATCHER_CLEAR_CACHE")]
    pub clear_cache: bool,

    /// Seconds between poll cycles
    #[arg(long, env = "WATCHER_INTERVAL", default_value_t = 10)]
    pub interval: u64,

    /// Milliseconds to wait before each search request
    #[arg(long, env = "WATCHER_REQUEST_DELAY_MS", default_value_t = 1500)]
    pub request_delay_ms: u64,

    /// Per-request timeout in seconds
    #[arg(long, env = "WATCHER_TIMEOUT", default_value_t = 15)]
    pub timeout: u64,

    /// Open each new item in the default browser
    #[arg(long, env = "WATCHER_OPEN_BROWSER")]
    pub open_browser: bool,

    /// Show a desktop notification for new items and fatal errors
    #[arg(long, env = "WATCHER_DESKTOP_NOTIFY")]
    pub desktop_notify: bool,
}

impl Config {
    pub fn data_dir(&self) -> PathBuf {
        self.data_dir.clone().unwrap_or_else(default_data_dir)
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval)
    }

    pub fn request_delay(&self) -> Duration {
        Duration::from_millis(self.request_delay_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }
}

pub fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR_NAME)
}

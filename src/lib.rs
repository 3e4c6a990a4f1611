pub mod api;
pub mod config;
pub mod credentials;
pub mod error;
pub mod json_db;
pub mod notifier;
pub mod prompt;
pub mod query;
pub mod scanner;
pub mod storage;
pub mod types;
pub mod watcher;

pub use api::{MarketplaceApi, WallapopClient};
pub use credentials::{extract, CredentialSource};
pub use error::{ExtractionError, MonitorError, Result};
pub use json_db::JsonDatabase;
pub use notifier::{NotificationHook, Notifier};
pub use scanner::{AlertScanner, CycleReport, PollOutcome};
pub use storage::Storage;
pub use types::{HeaderTemplate, Item, LastItemsTable, NewItem, SavedSearch};
pub use watcher::{InitialCredentials, WatchState, Watcher};

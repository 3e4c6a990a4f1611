use crate::error::Result;
use crate::types::{HeaderTemplate, LastItemsTable};
use async_trait::async_trait;

#[async_trait]
pub trait Storage: Send + Sync {
    /// Initialize the storage (e.g. ensure the directory exists)
    async fn init(&self) -> Result<()>;

    /// Load the stored header template; read failures count as "nothing stored"
    async fn load_headers(&self) -> Option<HeaderTemplate>;

    /// Replace the stored header template
    async fn save_headers(&self, headers: &HeaderTemplate) -> Result<()>;

    /// Load the last-seen item table; empty when absent, unreadable or cleared
    async fn load_last_items(&self) -> LastItemsTable;

    /// Replace the stored last-seen item table
    async fn save_last_items(&self, table: &LastItemsTable) -> Result<()>;
}

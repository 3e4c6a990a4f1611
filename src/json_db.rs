use crate::error::{MonitorError, Result};
use crate::storage::Storage;
use crate::types::{HeaderTemplate, LastItemsTable};
use async_trait::async_trait;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;

pub const HEADERS_FILE: &str = "headers.json";
pub const LAST_ITEMS_FILE: &str = "last_items.json";

/// File-backed store: one JSON document per kind of state under `base_path`.
pub struct JsonDatabase {
    base_path: PathBuf,
    clear_last_items: bool,
}

impl JsonDatabase {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            base_path: path.as_ref().to_path_buf(),
            clear_last_items: false,
        }
    }

    /// Ignore whatever last-items table is on disk and start from an empty one.
    pub fn with_cleared_last_items(mut self, clear: bool) -> Self {
        self.clear_last_items = clear;
        self
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    async fn save_to_file<T: Serialize + Sync>(&self, filename: &str, data: &T) -> Result<()> {
        let file_path = self.base_path.join(filename);
        let temp_path = self.base_path.join(format!("{}.tmp", filename));

        let json = serde_json::to_string_pretty(data)?;

        let mut file = fs::File::create(&temp_path).await.map_err(|e| {
            MonitorError::Persistence(format!("Failed to create temp file {:?}: {}", temp_path, e))
        })?;

        file.write_all(json.as_bytes()).await.map_err(|e| {
            MonitorError::Persistence(format!("Failed to write to temp file: {}", e))
        })?;

        file.flush()
            .await
            .map_err(|e| MonitorError::Persistence(format!("Failed to flush temp file: {}", e)))?;
        drop(file);

        fs::rename(&temp_path, &file_path).await.map_err(|e| {
            MonitorError::Persistence(format!("Failed to rename temp file to {:?}: {}", file_path, e))
        })?;

        debug!("Saved {:?}", file_path);
        Ok(())
    }

    /// Missing, empty, unreadable or unparsable files all load as `None`.
    async fn load_from_file<T: for<'a> Deserialize<'a>>(&self, filename: &str) -> Option<T> {
        let file_path = self.base_path.join(filename);

        if !file_path.exists() {
            return None;
        }

        let content = match fs::read_to_string(&file_path).await {
            Ok(content) => content,
            Err(e) => {
                warn!("Failed to read {:?}, ignoring it: {}", file_path, e);
                return None;
            }
        };

        if content.trim().is_empty() {
            return None;
        }

        match serde_json::from_str(&content) {
            Ok(data) => Some(data),
            Err(e) => {
                warn!("Failed to parse {:?}, ignoring it: {}", file_path, e);
                None
            }
        }
    }
}

#[async_trait]
impl Storage for JsonDatabase {
    async fn init(&self) -> Result<()> {
        if !self.base_path.exists() {
            fs::create_dir_all(&self.base_path).await.map_err(|e| {
                MonitorError::Persistence(format!("Failed to create data directory: {}", e))
            })?;
        }
        Ok(())
    }

    async fn load_headers(&self) -> Option<HeaderTemplate> {
        let headers = self.load_from_file::<HeaderTemplate>(HEADERS_FILE).await?;
        if headers.is_empty() {
            return None;
        }
        info!("Loaded {} stored headers", headers.len());
        Some(headers)
    }

    async fn save_headers(&self, headers: &HeaderTemplate) -> Result<()> {
        self.save_to_file(HEADERS_FILE, headers).await
    }

    async fn load_last_items(&self) -> LastItemsTable {
        if self.clear_last_items {
            info!("Starting with an empty last-items table");
            return LastItemsTable::new();
        }

        match self.load_from_file::<LastItemsTable>(LAST_ITEMS_FILE).await {
            Some(table) => {
                info!("Loaded last items for {} queries from disk", table.len());
                table
            }
            None => LastItemsTable::new(),
        }
    }

    async fn save_last_items(&self, table: &LastItemsTable) -> Result<()> {
        self.save_to_file(LAST_ITEMS_FILE, table).await
    }
}

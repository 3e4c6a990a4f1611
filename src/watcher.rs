use crate::credentials::{extract, CredentialSource};
use crate::error::Result;
use crate::notifier::Notifier;
use crate::scanner::AlertScanner;
use crate::storage::Storage;
use crate::types::{HeaderTemplate, LastItemsTable};
use log::{debug, error, info, warn};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

pub const NO_CREDENTIAL_MESSAGE: &str = "No credential available. Closing the watcher.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchState {
    AwaitingCredentials,
    Polling,
    Stopped,
}

/// 启动时可用的凭据来源，优先级：注入值 > 一次性文件 > 已保存的请求头
#[derive(Debug, Clone, Default)]
pub struct InitialCredentials {
    pub injected: Option<HeaderTemplate>,
    pub headers_file: Option<PathBuf>,
    /// 忽略已保存的请求头，直接向凭据来源索取
    pub ignore_stored: bool,
}

pub struct Watcher {
    scanner: AlertScanner,
    storage: Arc<dyn Storage>,
    notifier: Notifier,
    credentials: Option<Box<dyn CredentialSource>>,
    interval: Duration,
    headers: Option<HeaderTemplate>,
    table: LastItemsTable,
    state: WatchState,
}

impl Watcher {
    pub fn new(
        scanner: AlertScanner,
        storage: Arc<dyn Storage>,
        notifier: Notifier,
        credentials: Option<Box<dyn CredentialSource>>,
        interval: Duration,
    ) -> Self {
        Self {
            scanner,
            storage,
            notifier,
            credentials,
            interval,
            headers: None,
            table: LastItemsTable::new(),
            state: WatchState::AwaitingCredentials,
        }
    }

    pub fn state(&self) -> WatchState {
        self.state
    }

    pub fn headers(&self) -> Option<&HeaderTemplate> {
        self.headers.as_ref()
    }

    pub fn table(&self) -> &LastItemsTable {
        &self.table
    }

    /// 加载状态并决定初始状态
    pub async fn start(&mut self, initial: InitialCredentials) -> Result<WatchState> {
        self.table = self.storage.load_last_items().await;
        self.headers = None;

        if let Some(headers) = initial.injected.filter(HeaderTemplate::is_usable) {
            info!("使用注入的请求头");
            self.storage.save_headers(&headers).await?;
            self.headers = Some(headers);
        } else if let Some(headers) = self.read_headers_file(initial.headers_file).await {
            info!("使用凭据文件中的请求头");
            self.storage.save_headers(&headers).await?;
            self.headers = Some(headers);
        } else if !initial.ignore_stored {
            self.headers = self
                .storage
                .load_headers()
                .await
                .filter(HeaderTemplate::is_usable);
        }

        self.state = if self.headers.is_some() {
            WatchState::Polling
        } else {
            WatchState::AwaitingCredentials
        };
        debug!("初始状态: {:?}", self.state);
        Ok(self.state)
    }

    async fn read_headers_file(&self, path: Option<PathBuf>) -> Option<HeaderTemplate> {
        let path = path?;
        let text = match tokio::fs::read_to_string(&path).await {
            Ok(text) => text,
            Err(e) => {
                warn!("无法读取凭据文件 {:?}: {}", path, e);
                return None;
            }
        };
        match extract(&text) {
            Ok((headers, _)) => Some(headers),
            Err(e) => {
                warn!("凭据文件 {:?} 无法使用: {}", path, e);
                None
            }
        }
    }

    /// 执行一次状态转换（不包含轮询间隔的等待）
    pub async fn step(&mut self) -> Result<WatchState> {
        self.state = match self.state {
            WatchState::AwaitingCredentials => self.acquire_credentials().await?,
            WatchState::Polling => self.poll().await?,
            WatchState::Stopped => WatchState::Stopped,
        };
        Ok(self.state)
    }

    async fn acquire_credentials(&mut self) -> Result<WatchState> {
        let headers = match &self.credentials {
            Some(source) => source.request().await.filter(HeaderTemplate::is_usable),
            None => None,
        };

        match headers {
            Some(headers) => {
                self.storage.save_headers(&headers).await?;
                self.headers = Some(headers);
                info!("已获取新的凭据，继续监控");
                Ok(WatchState::Polling)
            }
            None => {
                self.notifier.notify_error(NO_CREDENTIAL_MESSAGE);
                Ok(WatchState::Stopped)
            }
        }
    }

    async fn poll(&mut self) -> Result<WatchState> {
        let headers = match &self.headers {
            Some(headers) => headers,
            None => return Ok(WatchState::AwaitingCredentials),
        };

        let result = self
            .scanner
            .run_cycle(headers, &mut self.table, &self.notifier)
            .await;

        let next = match result {
            Ok(report) => {
                debug!("本轮扫描完成: {:?}", report);
                WatchState::Polling
            }
            Err(e) if e.is_auth() => {
                warn!("凭据被拒绝，需要重新获取: {}", e);
                self.headers = None;
                WatchState::AwaitingCredentials
            }
            Err(e) => {
                error!("扫描错误: {}", e);
                WatchState::Polling
            }
        };

        if self.table.is_dirty() {
            self.storage.save_last_items(&self.table).await?;
            self.table.mark_clean();
        }

        Ok(next)
    }

    /// 持续运行直到进入 `Stopped`；持久化写入失败时返回错误
    pub async fn run(&mut self) -> Result<()> {
        info!("开始监控保存的搜索，轮询间隔: {:?}", self.interval);

        loop {
            match self.state {
                WatchState::Stopped => {
                    info!("监控已停止");
                    return Ok(());
                }
                WatchState::Polling => {
                    self.step().await?;
                    tokio::time::sleep(self.interval).await;
                }
                WatchState::AwaitingCredentials => {
                    self.step().await?;
                }
            }
        }
    }
}

use anyhow::Result;
use clap::Parser;
use log::{error, info};
use std::sync::Arc;
use wallapop_watcher::config::Config;
use wallapop_watcher::credentials::CredentialSource;
use wallapop_watcher::prompt::StdinPrompt;
use wallapop_watcher::storage::Storage;
use wallapop_watcher::{AlertScanner, InitialCredentials, JsonDatabase, Notifier, WallapopClient, Watcher};

#[tokio::main]
async fn main() -> Result<()> {
    // 加载环境变量
    dotenv::dotenv().ok();

    // 初始化日志
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = Config::parse();
    info!("启动 Wallapop 监控...");

    // 存储
    let data_dir = config.data_dir();
    info!("数据目录: {:?}", data_dir);
    let db = JsonDatabase::new(&data_dir).with_cleared_last_items(config.clear_cache);
    db.init().await?;
    let storage: Arc<dyn Storage> = Arc::new(db);

    // 创建 API 客户端
    let client = WallapopClient::new(config.timeout())?;
    let scanner = AlertScanner::new(Box::new(client), config.request_delay());

    let notifier = Notifier::new()
        .open_browser(config.open_browser)
        .desktop(config.desktop_notify);

    let credentials: Option<Box<dyn CredentialSource>> = if config.no_prompt {
        None
    } else {
        Some(Box::new(StdinPrompt))
    };

    let mut watcher = Watcher::new(scanner, storage, notifier, credentials, config.interval());
    watcher
        .start(InitialCredentials {
            injected: None,
            headers_file: config.headers_file.clone(),
            ignore_stored: config.interactive,
        })
        .await?;

    match watcher.run().await {
        Ok(_) => info!("监控正常关闭"),
        Err(e) => {
            error!("监控错误: {}", e);
            return Err(e.into());
        }
    }

    Ok(())
}

use crate::types::NewItem;
use log::{error, info, warn};

const APP_NAME: &str = "Wallapop Watcher";

/// 外部通知钩子（可选），只为副作用调用
pub trait NotificationHook: Send + Sync {
    fn on_new_item(&self, item: &NewItem) -> anyhow::Result<()>;

    fn on_error(&self, message: &str) -> anyhow::Result<()>;
}

/// 新商品与错误的通知出口，任何通道失败都不会向上传播
#[derive(Default)]
pub struct Notifier {
    hook: Option<Box<dyn NotificationHook>>,
    open_browser: bool,
    desktop: bool,
}

impl Notifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_hook(mut self, hook: Box<dyn NotificationHook>) -> Self {
        self.hook = Some(hook);
        self
    }

    pub fn open_browser(mut self, enabled: bool) -> Self {
        self.open_browser = enabled;
        self
    }

    pub fn desktop(mut self, enabled: bool) -> Self {
        self.desktop = enabled;
        self
    }

    pub fn notify_new_item(&self, item: &NewItem) {
        info!(
            "🔔 新商品 [{}]: {} - {} - {}",
            item.keywords, item.title, item.price, item.url
        );

        if let Some(hook) = &self.hook {
            if let Err(e) = hook.on_new_item(item) {
                warn!("通知钩子执行失败: {}", e);
            }
        }

        if self.desktop {
            self.show_desktop(&format!("New item: {}", item.title), &format!("{}\n{}", item.price, item.url));
        }

        if self.open_browser {
            if let Err(e) = webbrowser::open(&item.url) {
                warn!("无法在浏览器中打开 {}: {}", item.url, e);
            }
        }
    }

    pub fn notify_error(&self, message: &str) {
        error!("{}", message);

        if let Some(hook) = &self.hook {
            if let Err(e) = hook.on_error(message) {
                warn!("通知钩子执行失败: {}", e);
            }
        }

        if self.desktop {
            self.show_desktop(APP_NAME, message);
        }
    }

    fn show_desktop(&self, summary: &str, body: &str) {
        let result = notify_rust::Notification::new()
            .summary(summary)
            .body(body)
            .appname(APP_NAME)
            .show();

        if let Err(e) = result {
            warn!("桌面通知发送失败: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use parking_lot::Mutex;
    use std::sync::Arc;

    struct FailingHook {
        calls: Arc<Mutex<Vec<String>>>,
    }

    impl NotificationHook for FailingHook {
        fn on_new_item(&self, item: &NewItem) -> anyhow::Result<()> {
            self.calls.lock().push(item.id.clone());
            anyhow::bail!("hook is down")
        }

        fn on_error(&self, message: &str) -> anyhow::Result<()> {
            self.calls.lock().push(message.to_string());
            anyhow::bail!("hook is down")
        }
    }

    fn item() -> NewItem {
        NewItem {
            id: "4".to_string(),
            title: "Bike".to_string(),
            price: "100 EUR".to_string(),
            url: "https://es.wallapop.com/item/bike-4".to_string(),
            keywords: "bike".to_string(),
            found_at: Utc::now(),
        }
    }

    #[test]
    fn test_hook_failures_are_swallowed() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let notifier = Notifier::new().with_hook(Box::new(FailingHook { calls: calls.clone() }));

        notifier.notify_new_item(&item());
        notifier.notify_error("no credential");

        assert_eq!(*calls.lock(), vec!["4".to_string(), "no credential".to_string()]);
    }

    #[test]
    fn test_notifier_without_channels_only_logs() {
        let notifier = Notifier::new();
        notifier.notify_new_item(&item());
        notifier.notify_error("boom");
    }
}

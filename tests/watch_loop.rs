use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::json;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio_test::assert_ok;
use wallapop_watcher::watcher::NO_CREDENTIAL_MESSAGE;
use wallapop_watcher::{
    AlertScanner, CredentialSource, HeaderTemplate, InitialCredentials, Item, JsonDatabase,
    MarketplaceApi, MonitorError, NewItem, NotificationHook, Notifier, Result, SavedSearch, Storage,
    WatchState, Watcher,
};

fn token() -> String {
    format!("eyJ0eXAiOiJKV1QiLCJhbGciOiJSUzI1NiJ9.{}", "b".repeat(64))
}

fn headers() -> HeaderTemplate {
    let mut headers = HeaderTemplate::new();
    headers.set_token(&token());
    headers.insert("X-DeviceId", "device");
    headers
}

fn alerts(queries: &[serde_json::Value]) -> Result<Vec<SavedSearch>> {
    Ok(queries
        .iter()
        .map(|q| SavedSearch {
            query: q.as_object().cloned().unwrap(),
        })
        .collect())
}

fn items(ids: &[u32]) -> Result<Vec<Item>> {
    Ok(ids
        .iter()
        .map(|id| Item {
            id: id.to_string(),
            title: format!("Bike {}", id),
            price: None,
            web_slug: Some(format!("bike-{}", id)),
        })
        .collect())
}

#[derive(Default)]
struct ScriptedApi {
    alerts: Mutex<VecDeque<Result<Vec<SavedSearch>>>>,
    searches: Mutex<VecDeque<Result<Vec<Item>>>>,
    search_calls: Arc<Mutex<usize>>,
}

#[async_trait]
impl MarketplaceApi for ScriptedApi {
    async fn fetch_saved_alerts(&self, headers: &HeaderTemplate) -> Result<Vec<SavedSearch>> {
        assert!(headers.is_usable());
        self.alerts
            .lock()
            .pop_front()
            .unwrap_or_else(|| Err(MonitorError::Transport("script exhausted".to_string())))
    }

    async fn search(&self, _headers: &HeaderTemplate, _identity: &str) -> Result<Vec<Item>> {
        *self.search_calls.lock() += 1;
        self.searches
            .lock()
            .pop_front()
            .unwrap_or_else(|| Err(MonitorError::Transport("script exhausted".to_string())))
    }
}

#[derive(Default)]
struct Recorder {
    items: Mutex<Vec<NewItem>>,
    errors: Mutex<Vec<String>>,
}

struct RecordingHook(Arc<Recorder>);

impl NotificationHook for RecordingHook {
    fn on_new_item(&self, item: &NewItem) -> anyhow::Result<()> {
        self.0.items.lock().push(item.clone());
        Ok(())
    }

    fn on_error(&self, message: &str) -> anyhow::Result<()> {
        self.0.errors.lock().push(message.to_string());
        Ok(())
    }
}

struct FixedSource(Option<HeaderTemplate>);

#[async_trait]
impl CredentialSource for FixedSource {
    async fn request(&self) -> Option<HeaderTemplate> {
        self.0.clone()
    }
}

struct Harness {
    watcher: Watcher,
    recorder: Arc<Recorder>,
    search_calls: Arc<Mutex<usize>>,
    storage: Arc<JsonDatabase>,
    _temp: TempDir,
}

async fn harness(
    alert_script: Vec<Result<Vec<SavedSearch>>>,
    search_script: Vec<Result<Vec<Item>>>,
    source: Option<Box<dyn CredentialSource>>,
) -> Harness {
    let temp = TempDir::new().unwrap();
    let storage = Arc::new(JsonDatabase::new(temp.path()));
    assert_ok!(storage.init().await);

    let api = ScriptedApi {
        alerts: Mutex::new(alert_script.into_iter().collect()),
        searches: Mutex::new(search_script.into_iter().collect()),
        ..ScriptedApi::default()
    };
    let search_calls = api.search_calls.clone();

    let recorder = Arc::new(Recorder::default());
    let notifier = Notifier::new().with_hook(Box::new(RecordingHook(recorder.clone())));
    let watcher = Watcher::new(
        AlertScanner::new(Box::new(api), Duration::ZERO),
        storage.clone(),
        notifier,
        source,
        Duration::ZERO,
    );

    Harness {
        watcher,
        recorder,
        search_calls,
        storage,
        _temp: temp,
    }
}

fn injected() -> InitialCredentials {
    InitialCredentials {
        injected: Some(headers()),
        ..InitialCredentials::default()
    }
}

#[tokio::test]
async fn test_baseline_then_single_notification() {
    let bike = json!({"keywords": "bike", "order_by": "price_low_to_high"});
    let mut h = harness(
        vec![alerts(&[bike.clone()]), alerts(&[bike])],
        vec![items(&[1, 2, 3]), items(&[1, 2, 3, 4])],
        None,
    )
    .await;

    assert_eq!(h.watcher.start(injected()).await.unwrap(), WatchState::Polling);
    assert_eq!(h.storage.load_headers().await, Some(headers()));

    assert_eq!(h.watcher.step().await.unwrap(), WatchState::Polling);
    assert!(h.recorder.items.lock().is_empty());

    assert_eq!(h.watcher.step().await.unwrap(), WatchState::Polling);
    let notified = h.recorder.items.lock().clone();
    assert_eq!(notified.len(), 1);
    assert_eq!(notified[0].id, "4");
    assert_eq!(notified[0].keywords, "bike");
    assert_eq!(notified[0].url, "https://es.wallapop.com/item/bike-4");

    let stored = h.storage.load_last_items().await;
    assert_eq!(
        stored.get("keywords=bike&order_by=price_low_to_high").unwrap(),
        &["1", "2", "3", "4"].map(String::from)
    );
}

#[tokio::test]
async fn test_alerts_401_clears_credential_and_stops_without_source() {
    let mut h = harness(
        vec![Err(MonitorError::Auth("HTTP 401".to_string()))],
        vec![],
        None,
    )
    .await;

    h.watcher.start(injected()).await.unwrap();
    assert_eq!(h.watcher.step().await.unwrap(), WatchState::AwaitingCredentials);
    assert!(h.watcher.headers().is_none());
    assert_eq!(*h.search_calls.lock(), 0);

    assert_eq!(h.watcher.step().await.unwrap(), WatchState::Stopped);
    assert_eq!(*h.recorder.errors.lock(), vec![NO_CREDENTIAL_MESSAGE.to_string()]);

    // run() returns at once from Stopped
    assert_ok!(h.watcher.run().await);
}

#[tokio::test]
async fn test_search_401_reacquires_from_source() {
    let queries = [json!({"keywords": "bike"}), json!({"keywords": "lamp"})];
    let mut fresh = headers();
    fresh.insert("X-DeviceId", "new-device");

    let mut h = harness(
        vec![alerts(&queries), alerts(&queries)],
        vec![
            Err(MonitorError::Auth("HTTP 401".to_string())),
            items(&[1]),
            items(&[2]),
        ],
        Some(Box::new(FixedSource(Some(fresh.clone())))),
    )
    .await;

    h.watcher.start(injected()).await.unwrap();
    assert_eq!(h.watcher.step().await.unwrap(), WatchState::AwaitingCredentials);
    assert_eq!(*h.search_calls.lock(), 1);

    assert_eq!(h.watcher.step().await.unwrap(), WatchState::Polling);
    assert_eq!(h.watcher.headers(), Some(&fresh));
    assert_eq!(h.storage.load_headers().await, Some(fresh));

    assert_eq!(h.watcher.step().await.unwrap(), WatchState::Polling);
    assert_eq!(*h.search_calls.lock(), 3);
    assert_eq!(h.watcher.table().len(), 2);
}

#[tokio::test]
async fn test_source_returning_nothing_is_terminal() {
    let mut h = harness(vec![], vec![], Some(Box::new(FixedSource(None)))).await;

    assert_eq!(
        h.watcher.start(InitialCredentials::default()).await.unwrap(),
        WatchState::AwaitingCredentials
    );
    assert_eq!(h.watcher.step().await.unwrap(), WatchState::Stopped);
    assert_eq!(h.recorder.errors.lock().len(), 1);
}

#[tokio::test]
async fn test_transport_error_keeps_polling() {
    let mut h = harness(
        vec![Err(MonitorError::Transport("HTTP 503".to_string()))],
        vec![],
        None,
    )
    .await;

    h.watcher.start(injected()).await.unwrap();
    assert_eq!(h.watcher.step().await.unwrap(), WatchState::Polling);
    assert!(h.watcher.headers().is_some());
    assert!(h.recorder.errors.lock().is_empty());
}

#[tokio::test]
async fn test_starts_from_stored_headers_and_file() {
    let mut h = harness(vec![], vec![], None).await;
    assert_ok!(h.storage.save_headers(&headers()).await);
    assert_eq!(
        h.watcher.start(InitialCredentials::default()).await.unwrap(),
        WatchState::Polling
    );

    // ignore_stored forces a fresh acquisition
    assert_eq!(
        h.watcher
            .start(InitialCredentials {
                ignore_stored: true,
                ..InitialCredentials::default()
            })
            .await
            .unwrap(),
        WatchState::AwaitingCredentials
    );
    assert!(h.watcher.headers().is_none());
    assert_eq!(h.watcher.state(), WatchState::AwaitingCredentials);

    let file = h._temp.path().join("request.txt");
    std::fs::write(
        &file,
        format!(
            r#"fetch("https://api.wallapop.com/api/v3/searchalerts/savedsearch/", {{"headers": {{"authorization": "Bearer {}"}}, "method": "GET"}});"#,
            token()
        ),
    )
    .unwrap();
    assert_eq!(
        h.watcher
            .start(InitialCredentials {
                headers_file: Some(file),
                ignore_stored: true,
                ..InitialCredentials::default()
            })
            .await
            .unwrap(),
        WatchState::Polling
    );
    assert_eq!(h.watcher.headers().and_then(|h| h.token()), Some(token().as_str()));
}

#[tokio::test]
async fn test_last_items_saved_only_when_changed() {
    let bike = json!({"keywords": "bike"});
    let mut h = harness(
        vec![alerts(&[bike.clone()]), alerts(&[bike.clone()]), alerts(&[])],
        vec![items(&[1]), items(&[1])],
        None,
    )
    .await;
    let last_items = h._temp.path().join("last_items.json");

    h.watcher.start(injected()).await.unwrap();
    h.watcher.step().await.unwrap();
    assert!(last_items.exists());

    std::fs::remove_file(&last_items).unwrap();
    h.watcher.step().await.unwrap();
    assert!(!last_items.exists());

    // the alert was deleted remotely, so its entry is pruned and saved
    h.watcher.step().await.unwrap();
    assert!(last_items.exists());
    assert!(h.storage.load_last_items().await.is_empty());
}

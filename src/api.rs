use crate::error::{MonitorError, Result};
use crate::types::{HeaderTemplate, Item, SavedSearch};
use async_trait::async_trait;
use log::{debug, warn};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, StatusCode};
use serde_json::Value;
use std::time::Duration;

pub const API_BASE: &str = "https://api.wallapop.com/api/v3";
const SAVED_SEARCH_PATH: &str = "/searchalerts/savedsearch/";
const SEARCH_PATH: &str = "/search";
const SEARCH_SOURCE: &str = "search_box";

/// 由 HTTP 客户端自行管理的请求头，不从模板中转发
const SKIPPED_HEADERS: &[&str] = &["host", "connection", "content-length", "accept-encoding"];

/// 远程市场接口
#[async_trait]
pub trait MarketplaceApi: Send + Sync {
    /// 获取用户保存的搜索提醒
    async fn fetch_saved_alerts(&self, headers: &HeaderTemplate) -> Result<Vec<SavedSearch>>;

    /// 按规范化的查询字符串搜索商品
    async fn search(&self, headers: &HeaderTemplate, identity: &str) -> Result<Vec<Item>>;
}

pub struct WallapopClient {
    client: Client,
    base_url: String,
}

impl WallapopClient {
    pub fn new(timeout: Duration) -> Result<Self> {
        Self::with_base_url(API_BASE, timeout)
    }

    pub fn with_base_url(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn search_url(&self, identity: &str) -> String {
        let search_id = uuid::Uuid::new_v4();
        let mut url = format!(
            "{}{}?source={}&search_id={}",
            self.base_url, SEARCH_PATH, SEARCH_SOURCE, search_id
        );
        if !identity.is_empty() {
            url.push('&');
            url.push_str(identity);
        }
        url
    }

    async fn get_json(&self, url: &str, headers: &HeaderTemplate, auth_statuses: &[StatusCode]) -> Result<Value> {
        let response = self
            .client
            .get(url)
            .headers(to_header_map(headers))
            .send()
            .await?;

        let status = response.status();
        if auth_statuses.contains(&status) {
            warn!("令牌无效或已过期 [{}]: {}", status, url);
            return Err(MonitorError::Auth(format!("HTTP {} from {}", status, url)));
        }

        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            warn!("API 请求失败 [{}]: {}", status, truncate(&text, 200));
            return Err(MonitorError::Transport(format!(
                "HTTP {} from {}: {}",
                status,
                url,
                truncate(&text, 200)
            )));
        }

        Ok(response.json().await?)
    }
}

#[async_trait]
impl MarketplaceApi for WallapopClient {
    async fn fetch_saved_alerts(&self, headers: &HeaderTemplate) -> Result<Vec<SavedSearch>> {
        let url = format!("{}{}", self.base_url, SAVED_SEARCH_PATH);
        debug!("请求保存的搜索: {}", url);

        let body = self
            .get_json(&url, headers, &[StatusCode::BAD_REQUEST, StatusCode::UNAUTHORIZED])
            .await?;
        let alerts = parse_saved_alerts(body)?;

        debug!("成功获取 {} 个保存的搜索", alerts.len());
        Ok(alerts)
    }

    async fn search(&self, headers: &HeaderTemplate, identity: &str) -> Result<Vec<Item>> {
        let url = self.search_url(identity);
        debug!("请求搜索结果: {}", url);

        let body = self.get_json(&url, headers, &[StatusCode::UNAUTHORIZED]).await?;
        let items = parse_search_items(&body)?;

        debug!("搜索返回 {} 个商品", items.len());
        Ok(items)
    }
}

/// 保存的搜索列表；也接受包在 `data` 字段里的响应
pub fn parse_saved_alerts(body: Value) -> Result<Vec<SavedSearch>> {
    let list = match body {
        Value::Array(_) => body,
        Value::Object(mut map) => match map.remove("data") {
            Some(data @ Value::Array(_)) => data,
            _ => {
                return Err(MonitorError::InvalidResponse(
                    "saved searches response is not a list".to_string(),
                ))
            }
        },
        _ => {
            return Err(MonitorError::InvalidResponse(
                "saved searches response is not a list".to_string(),
            ))
        }
    };

    Ok(serde_json::from_value(list)?)
}

/// 商品列表位于 `data.section.payload.items`，路径缺失视为空结果
pub fn parse_search_items(body: &Value) -> Result<Vec<Item>> {
    match body.pointer("/data/section/payload/items") {
        Some(items) => Ok(serde_json::from_value(items.clone())?),
        None => Ok(Vec::new()),
    }
}

/// 将请求头模板转换为 reqwest 的 HeaderMap，跳过无效或由传输层管理的头
pub fn to_header_map(headers: &HeaderTemplate) -> HeaderMap {
    let mut map = HeaderMap::new();
    for (name, value) in headers.iter() {
        let lower = name.to_ascii_lowercase();
        if name.starts_with(':') || SKIPPED_HEADERS.contains(&lower.as_str()) {
            continue;
        }
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value.trim()),
        ) {
            (Ok(name), Ok(value)) => {
                map.insert(name, value);
            }
            _ => warn!("跳过无效的请求头: {}", name),
        }
    }
    map
}

fn truncate(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

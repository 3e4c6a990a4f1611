use crate::api::MarketplaceApi;
use crate::error::Result;
use crate::notifier::Notifier;
use crate::types::{HeaderTemplate, Item, LastItemsTable, NewItem, Observation, SavedSearch};
use log::{debug, info};
use std::collections::HashSet;
use std::time::Duration;

/// 单个保存搜索的轮询结果
#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome {
    /// 没有关键词，不请求
    Skipped,
    /// 首次见到该查询，记录基线，不通知
    Baseline(usize),
    /// 之前未见过的商品，按结果顺序
    NewItems(Vec<Item>),
    Unchanged,
}

/// 一轮完整轮询的统计
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub alerts: usize,
    pub polled: usize,
    pub new_items: usize,
    pub pruned: usize,
    pub table_changed: bool,
}

pub struct AlertScanner {
    api: Box<dyn MarketplaceApi>,
    request_delay: Duration,
}

impl AlertScanner {
    pub fn new(api: Box<dyn MarketplaceApi>, request_delay: Duration) -> Self {
        Self { api, request_delay }
    }

    /// 轮询单个保存的搜索并更新表
    pub async fn poll_query(
        &self,
        headers: &HeaderTemplate,
        alert: &SavedSearch,
        table: &mut LastItemsTable,
    ) -> Result<PollOutcome> {
        let keywords = match alert.keywords() {
            Some(k) => k,
            None => {
                debug!("跳过没有关键词的搜索: {:?}", alert.query);
                return Ok(PollOutcome::Skipped);
            }
        };
        let identity = alert.identity();

        // 每次搜索请求前都等待，前面总有一次提醒列表请求
        if !self.request_delay.is_zero() {
            tokio::time::sleep(self.request_delay).await;
        }

        let items = self.api.search(headers, &identity).await?;
        let ids: Vec<String> = items.iter().map(|item| item.id.clone()).collect();

        let outcome = match table.observe(&identity, &ids) {
            Observation::Baseline(count) => {
                info!("✅ 首次检查 '{}'，记录 {} 个商品", keywords, count);
                PollOutcome::Baseline(count)
            }
            Observation::New(fresh) => {
                let mut fresh: HashSet<String> = fresh.into_iter().collect();
                // 用 remove 保证同一结果里重复的 ID 只通知一次
                let new_items: Vec<Item> = items
                    .into_iter()
                    .filter(|item| fresh.remove(&item.id))
                    .collect();
                info!("发现 '{}' 的 {} 个新商品", keywords, new_items.len());
                PollOutcome::NewItems(new_items)
            }
            Observation::Unchanged => {
                debug!("'{}' 没有新商品", keywords);
                PollOutcome::Unchanged
            }
        };

        Ok(outcome)
    }

    /// 对所有保存的搜索执行一轮轮询
    ///
    /// 拿到提醒列表后先清理不再存在的查询，再逐个搜索。
    /// 认证错误或传输错误都会中止本轮剩余的查询；此前已写入表的更新保留。
    pub async fn run_cycle(
        &self,
        headers: &HeaderTemplate,
        table: &mut LastItemsTable,
        notifier: &Notifier,
    ) -> Result<CycleReport> {
        info!("获取保存的搜索...");
        let alerts = self.api.fetch_saved_alerts(headers).await?;

        let current: HashSet<String> = alerts.iter().map(SavedSearch::identity).collect();
        let mut report = CycleReport {
            alerts: alerts.len(),
            pruned: table.prune(&current),
            ..CycleReport::default()
        };
        if report.pruned > 0 {
            info!("清理了 {} 个已删除的搜索", report.pruned);
        }

        for alert in &alerts {
            match self.poll_query(headers, alert, table).await? {
                PollOutcome::Skipped => continue,
                PollOutcome::NewItems(items) => {
                    let keywords = alert.keywords().unwrap_or_default();
                    for item in &items {
                        notifier.notify_new_item(&NewItem::from_item(item, keywords));
                    }
                    report.new_items += items.len();
                }
                PollOutcome::Baseline(_) | PollOutcome::Unchanged => {}
            }
            report.polled += 1;
        }

        report.table_changed = table.is_dirty();

        Ok(report)
    }
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashSet};
use std::fmt;

pub const ITEM_WEB_BASE: &str = "https://es.wallapop.com/item";

/// 保存的搜索（提醒），只读取其过滤参数
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SavedSearch {
    #[serde(default)]
    pub query: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Price {
    pub amount: f64,
    #[serde(default)]
    pub currency: String,
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.currency.is_empty() {
            write!(f, "{}", self.amount)
        } else {
            write!(f, "{} {}", self.amount, self.currency)
        }
    }
}

/// 搜索结果中的商品
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,

    #[serde(default)]
    pub title: String,

    #[serde(default)]
    pub price: Option<Price>,

    #[serde(default)]
    pub web_slug: Option<String>,
}

impl Item {
    pub fn url(&self) -> String {
        let slug = self.web_slug.as_deref().unwrap_or(&self.id);
        format!("{}/{}", ITEM_WEB_BASE, slug)
    }

    pub fn price_text(&self) -> String {
        self.price
            .as_ref()
            .map(|p| p.to_string())
            .unwrap_or_else(|| "?".to_string())
    }
}

fn string_or_number<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "item id must be a string or number, got {}",
            other
        ))),
    }
}

/// 新商品事件，交给通知器
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewItem {
    pub id: String,
    pub title: String,
    pub price: String,
    pub url: String,
    pub keywords: String,
    pub found_at: DateTime<Utc>,
}

impl NewItem {
    pub fn from_item(item: &Item, keywords: &str) -> Self {
        Self {
            id: item.id.clone(),
            title: item.title.clone(),
            price: item.price_text(),
            url: item.url(),
            keywords: keywords.to_string(),
            found_at: Utc::now(),
        }
    }
}

/// Strips a leading `Bearer` scheme (any case) from an authorization value.
pub fn strip_bearer(value: &str) -> &str {
    let value = value.trim();
    match (value.get(..6), value.get(6..)) {
        (Some(scheme), Some(rest))
            if scheme.eq_ignore_ascii_case("bearer")
                && (rest.is_empty() || rest.starts_with(char::is_whitespace)) =>
        {
            rest.trim_start()
        }
        _ => value,
    }
}

/// HTTP header name -> value, replayed on every request.
///
/// Names are unique ignoring case, also when loaded from disk.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "BTreeMap<String, String>", into = "BTreeMap<String, String>")]
pub struct HeaderTemplate(BTreeMap<String, String>);

impl HeaderTemplate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a header, replacing any existing entry whose name differs only by case.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        self.0.retain(|existing, _| !existing.eq_ignore_ascii_case(&name));
        self.0.insert(name, value.into());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// The bearer token without its prefix, if non-empty.
    pub fn token(&self) -> Option<&str> {
        self.get("authorization")
            .map(strip_bearer)
            .filter(|t| !t.is_empty())
    }

    pub fn is_usable(&self) -> bool {
        self.token().is_some()
    }

    pub fn set_token(&mut self, token: &str) {
        self.insert("Authorization", format!("Bearer {}", strip_bearer(token)));
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for HeaderTemplate {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut template = HeaderTemplate::new();
        for (name, value) in iter {
            template.insert(name, value);
        }
        template
    }
}

impl From<BTreeMap<String, String>> for HeaderTemplate {
    fn from(raw: BTreeMap<String, String>) -> Self {
        raw.into_iter().collect()
    }
}

impl From<HeaderTemplate> for BTreeMap<String, String> {
    fn from(headers: HeaderTemplate) -> Self {
        headers.0
    }
}

/// Result of feeding one query's current item IDs into the table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Observation {
    /// First time this identity is seen; IDs recorded without notifying.
    Baseline(usize),
    /// IDs that were not known before, in result order.
    New(Vec<String>),
    Unchanged,
}

/// Query identity -> item IDs seen so far.
///
/// IDs are only ever appended; a whole entry disappears only through [`LastItemsTable::prune`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LastItemsTable {
    entries: BTreeMap<String, Vec<String>>,
    #[serde(skip)]
    dirty: bool,
}

impl LastItemsTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, identity: &str) -> bool {
        self.entries.contains_key(identity)
    }

    pub fn get(&self, identity: &str) -> Option<&[String]> {
        self.entries.get(identity).map(|ids| ids.as_slice())
    }

    pub fn observe(&mut self, identity: &str, current: &[String]) -> Observation {
        match self.entries.get_mut(identity) {
            None => {
                let mut baseline: Vec<String> = Vec::with_capacity(current.len());
                for id in current {
                    if !baseline.contains(id) {
                        baseline.push(id.clone());
                    }
                }
                let count = baseline.len();
                self.entries.insert(identity.to_string(), baseline);
                self.dirty = true;
                Observation::Baseline(count)
            }
            Some(known) => {
                let fresh: Vec<String> = {
                    let mut seen: HashSet<&str> = known.iter().map(|s| s.as_str()).collect();
                    current
                        .iter()
                        .filter(|id| seen.insert(id.as_str()))
                        .cloned()
                        .collect()
                };
                if fresh.is_empty() {
                    return Observation::Unchanged;
                }
                known.extend(fresh.iter().cloned());
                self.dirty = true;
                Observation::New(fresh)
            }
        }
    }

    /// Drops every identity not in `keep`; returns how many were removed.
    pub fn prune(&mut self, keep: &HashSet<String>) -> usize {
        let before = self.entries.len();
        self.entries.retain(|identity, _| keep.contains(identity));
        let removed = before - self.entries.len();
        if removed > 0 {
            self.dirty = true;
        }
        removed
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn mark_clean(&mut self) {
        self.dirty = false;
    }

    pub fn identities(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(|k| k.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

//! Turning pasted browser captures into a header template.
//!
//! Three shapes are accepted:
//! - a JSON object of header names to values (`{"authorization": "Bearer ..."}`)
//! - a `fetch("https://api.wallapop.com/...", {...})` snippet from the devtools
//!   "Copy as fetch" menu
//! - a bare token, which is combined with [`default_headers`]

use crate::error::ExtractionError;
use crate::types::{strip_bearer, HeaderTemplate};
use async_trait::async_trait;
use serde_json::{Map, Value};

/// Shortest token accepted as plausibly real. Nothing is verified beyond the length.
pub const MIN_TOKEN_LEN: usize = 50;

const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/128.0.0.0 Safari/537.36";
const DEFAULT_APP_VERSION: &str = "83540";

/// Something able to hand over a fresh header template, e.g. by asking the user.
#[async_trait]
pub trait CredentialSource: Send + Sync {
    /// `None` means no credential could be obtained.
    async fn request(&self) -> Option<HeaderTemplate>;
}

/// Browser-like headers the web client sends, with a new random device id.
pub fn default_headers() -> HeaderTemplate {
    let device_id = uuid::Uuid::new_v4().to_string();
    [
        ("Accept", "application/json"),
        ("User-Agent", DEFAULT_USER_AGENT),
        ("Origin", "https://es.wallapop.com"),
        ("Referer", "https://es.wallapop.com/"),
        ("X-AppVersion", DEFAULT_APP_VERSION),
        ("X-DeviceOS", "0"),
        ("X-DeviceId", device_id.as_str()),
    ]
    .into_iter()
    .collect()
}

/// Parses pasted text into a header template and the bare token it carries.
pub fn extract(raw: &str) -> Result<(HeaderTemplate, String), ExtractionError> {
    let text = raw.trim();

    if text.starts_with('{') {
        let object = parse_object(text)?;
        // A pasted fetch options object rather than a plain header dump
        if object.get("headers").map_or(false, Value::is_object) {
            return from_fetch_options(&object);
        }
        return from_header_dict(&object);
    }

    if let (Some(start), Some(end)) = (text.find('{'), text.rfind('}')) {
        if start < end {
            let object = parse_object(&text[start..=end])?;
            return from_fetch_options(&object);
        }
    }

    from_bare_token(text)
}

fn parse_object(text: &str) -> Result<Map<String, Value>, ExtractionError> {
    match serde_json::from_str::<Value>(text) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(other) => Err(ExtractionError::NotJson(format!(
            "expected a JSON object, got {}",
            type_name(&other)
        ))),
        Err(e) => Err(ExtractionError::NotJson(e.to_string())),
    }
}

fn from_fetch_options(
    options: &Map<String, Value>,
) -> Result<(HeaderTemplate, String), ExtractionError> {
    let mut headers = HeaderTemplate::new();
    if let Some(Value::Object(raw)) = options.get("headers") {
        for (name, value) in raw {
            if let Some(value) = value_as_header(value) {
                headers.insert(name.as_str(), value);
            }
        }
    }

    finish(
        headers,
        options.get("method").and_then(Value::as_str),
        options.get("referrer").and_then(Value::as_str),
    )
}

fn from_header_dict(raw: &Map<String, Value>) -> Result<(HeaderTemplate, String), ExtractionError> {
    let mut headers = HeaderTemplate::new();
    let mut method = None;
    let mut referrer = None;

    for (name, value) in raw {
        match name.to_ascii_lowercase().as_str() {
            "method" => method = value.as_str(),
            "referrer" => referrer = value.as_str(),
            _ => {
                if let Some(value) = value_as_header(value) {
                    headers.insert(title_case(name), value);
                }
            }
        }
    }

    finish(headers, method, referrer)
}

fn from_bare_token(text: &str) -> Result<(HeaderTemplate, String), ExtractionError> {
    let token = strip_bearer(text);
    if token.is_empty() || token.contains(char::is_whitespace) {
        return Err(ExtractionError::NotJson(
            "expected a JSON object, a fetch(...) snippet or a bare token".to_string(),
        ));
    }

    let mut headers = default_headers();
    headers.set_token(token);
    finish(headers, None, None)
}

fn finish(
    mut headers: HeaderTemplate,
    method: Option<&str>,
    referrer: Option<&str>,
) -> Result<(HeaderTemplate, String), ExtractionError> {
    if let Some(method) = method.map(str::trim) {
        if !method.eq_ignore_ascii_case("GET") {
            return Err(ExtractionError::WrongMethod(method.to_ascii_uppercase()));
        }
    }

    let token = match headers.token() {
        Some(token) if token.len() >= MIN_TOKEN_LEN => token.to_string(),
        _ => return Err(ExtractionError::MissingToken { min: MIN_TOKEN_LEN }),
    };
    headers.set_token(&token);

    if let Some(referrer) = referrer.map(str::trim).filter(|r| !r.is_empty()) {
        headers.insert("Referer", referrer);
    }

    Ok((headers, token))
}

fn value_as_header(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// `x-deviceid` -> `X-Deviceid`, `user-agent` -> `User-Agent`.
fn title_case(name: &str) -> String {
    name.split('-')
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => {
                    first.to_ascii_uppercase().to_string() + &chars.as_str().to_ascii_lowercase()
                }
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join("-")
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

use super::{BatchResult, GatewayError, GatewayResult, ListQuery, Page, RecordGateway};
use crate::model::{Record, RowId, DEFAULT_ID_FIELD};
use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Method, Url};
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, warn};

const MAX_ERROR_BODY: usize = 300;

/// Retry policy for gateway requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Extra attempts after the first one. `0` disables retrying.
    pub retries: u32,
    pub delay: Duration,
    pub status_codes: Vec<u16>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retries: 2,
            delay: Duration::from_millis(300),
            status_codes: vec![408, 409, 425, 429, 500, 502, 503, 504],
        }
    }
}

/// Everything the HTTP gateway needs, resolved up front by the caller.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: String,
    pub headers: BTreeMap<String, String>,
    pub timeout: Duration,
    pub retry: RetryPolicy,
    pub id_field: String,
    /// Page size sent when a query does not carry its own `limit`.
    pub page_size: Option<usize>,
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            headers: BTreeMap::new(),
            timeout: Duration::from_secs(30),
            retry: RetryPolicy::default(),
            id_field: DEFAULT_ID_FIELD.to_string(),
            page_size: None,
        }
    }
}

#[derive(Deserialize)]
struct ListResponse {
    #[serde(default)]
    list: Vec<Record>,
    #[serde(rename = "pageInfo", default)]
    page_info: Option<PageInfo>,
}

#[derive(Deserialize)]
struct PageInfo {
    #[serde(rename = "totalRows", default)]
    total_rows: Option<usize>,
}

/// Record gateway backed by the NocoDB v2 data API.
pub struct HttpGateway {
    client: Client,
    base_url: Url,
    retry: RetryPolicy,
    id_field: String,
    page_size: Option<usize>,
}

impl HttpGateway {
    pub fn new(config: &ClientConfig) -> GatewayResult<Self> {
        let base_url = Url::parse(&config.base_url)
            .map_err(|e| GatewayError::Config(format!("{}: {}", config.base_url, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(GatewayError::Config(format!(
                "{} cannot be used as a base URL",
                config.base_url
            )));
        }

        let mut headers = HeaderMap::new();
        for (name, value) in &config.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| GatewayError::Config(format!("header '{}': {}", name, e)))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| GatewayError::Config(format!("header '{}': {}", name, e)))?;
            headers.insert(name, value);
        }

        let client = Client::builder()
            .user_agent(concat!("nocodb-cli/", env!("CARGO_PKG_VERSION")))
            .timeout(config.timeout)
            .default_headers(headers)
            .build()
            .map_err(|e| GatewayError::Config(format!("http client: {}", e)))?;

        Ok(Self {
            client,
            base_url,
            retry: config.retry.clone(),
            id_field: config.id_field.clone(),
            page_size: config.page_size,
        })
    }

    fn records_url(&self, table: &str) -> GatewayResult<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| GatewayError::Config(format!("bad base URL {}", self.base_url)))?
            .pop_if_empty()
            .extend(["api", "v2", "tables", table, "records"]);
        Ok(url)
    }

    fn send(&self, method: Method, url: Url, body: Option<&Value>) -> GatewayResult<Value> {
        let mut attempt: u32 = 0;
        loop {
            let mut request = self.client.request(method.clone(), url.clone());
            if let Some(body) = body {
                request = request.json(body);
            }

            let error = match request.send() {
                Ok(response) => {
                    let status = response.status();
                    let text = response
                        .text()
                        .map_err(|e| GatewayError::Transport(e.to_string()))?;
                    if status.is_success() {
                        return decode_body(&text);
                    }
                    let error = GatewayError::Status {
                        status: status.as_u16(),
                        message: error_message(&text, status.canonical_reason()),
                    };
                    if !self.retry.status_codes.contains(&status.as_u16()) {
                        return Err(error);
                    }
                    error
                }
                Err(e) if e.is_connect() || e.is_timeout() => {
                    GatewayError::Transport(e.to_string())
                }
                Err(e) => return Err(GatewayError::Transport(e.to_string())),
            };

            if attempt >= self.retry.retries {
                return Err(error);
            }
            attempt += 1;
            warn!(
                %method,
                url = %url,
                attempt,
                max = self.retry.retries,
                error = %error,
                "retrying request"
            );
            std::thread::sleep(self.retry.delay);
        }
    }

    fn write(&self, method: Method, table: &str, body: Value) -> GatewayResult<BatchResult> {
        let url = self.records_url(table)?;
        let value = self.send(method, url, Some(&body))?;
        Ok(BatchResult {
            rows: rows_from_value(value)?,
        })
    }
}

impl RecordGateway for HttpGateway {
    fn list_page(&self, table: &str, query: &ListQuery) -> GatewayResult<Page> {
        let mut url = self.records_url(table)?;
        {
            let mut pairs = url.query_pairs_mut();
            if let Some(clause) = &query.where_clause {
                pairs.append_pair("where", clause);
            }
            if let Some(limit) = query.limit.or(self.page_size) {
                pairs.append_pair("limit", &limit.to_string());
            }
            if query.offset > 0 {
                pairs.append_pair("offset", &query.offset.to_string());
            }
            if let Some(sort) = &query.sort {
                pairs.append_pair("sort", sort);
            }
            if let Some(fields) = &query.fields {
                pairs.append_pair("fields", fields);
            }
        }

        debug!(url = %url, "listing rows");
        let value = self.send(Method::GET, url, None)?;
        let response: ListResponse =
            serde_json::from_value(value).map_err(|e| GatewayError::Decode(e.to_string()))?;

        // Without a reported total, treat this page as the last one.
        let total_rows = response
            .page_info
            .and_then(|p| p.total_rows)
            .unwrap_or(query.offset + response.list.len());

        Ok(Page {
            rows: response.list,
            total_rows,
        })
    }

    fn create_many(&mut self, table: &str, records: &[Record]) -> GatewayResult<BatchResult> {
        let body = serde_json::to_value(records).map_err(|e| GatewayError::Decode(e.to_string()))?;
        self.write(Method::POST, table, body)
    }

    fn update_many(&mut self, table: &str, records: &[Record]) -> GatewayResult<BatchResult> {
        let body = serde_json::to_value(records).map_err(|e| GatewayError::Decode(e.to_string()))?;
        self.write(Method::PATCH, table, body)
    }

    fn delete_many(&mut self, table: &str, ids: &[RowId]) -> GatewayResult<BatchResult> {
        let body = Value::Array(
            ids.iter()
                .map(|id| Value::Object(Record::new().with_identity(&self.id_field, id).into_inner()))
                .collect(),
        );
        self.write(Method::DELETE, table, body)
    }
}

fn decode_body(text: &str) -> GatewayResult<Value> {
    if text.trim().is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_str(text).map_err(|e| GatewayError::Decode(e.to_string()))
}

fn rows_from_value(value: Value) -> GatewayResult<Vec<Record>> {
    match value {
        Value::Null => Ok(Vec::new()),
        Value::Array(items) => items
            .into_iter()
            .map(|item| match item {
                Value::Object(map) => Ok(Record::from(map)),
                other => Err(GatewayError::Decode(format!(
                    "expected row objects, got {}",
                    other
                ))),
            })
            .collect(),
        Value::Object(map) => Ok(vec![Record::from(map)]),
        other => Err(GatewayError::Decode(format!(
            "expected rows, got {}",
            other
        ))),
    }
}

/// Pull NocoDB's `msg`/`message` out of an error body, falling back to the raw text.
fn error_message(body: &str, reason: Option<&str>) -> String {
    if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(body) {
        for key in ["msg", "message", "error"] {
            if let Some(Value::String(msg)) = map.get(key) {
                return msg.clone();
            }
        }
    }
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return reason.unwrap_or("request failed").to_string();
    }
    if trimmed.chars().count() > MAX_ERROR_BODY {
        let cut: String = trimmed.chars().take(MAX_ERROR_BODY).collect();
        return format!("{}...", cut);
    }
    trimmed.to_string()
}

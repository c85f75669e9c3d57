use crate::commands::{ReconcileOptions, DEFAULT_BATCH_SIZE};
use crate::error::{NocoError, Result};
use crate::gateway::http::{ClientConfig, RetryPolicy};
use crate::model::DEFAULT_ID_FIELD;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

const CONFIG_FILENAME: &str = "config.json";
pub const CONFIG_DIR_ENV: &str = "NOCODB_CONFIG_DIR";
pub const BASE_URL_ENV: &str = "NOCODB_BASE_URL";
pub const TOKEN_ENV: &str = "NOCODB_TOKEN";
pub const TOKEN_HEADER: &str = "xc-token";

/// Keys accepted by [`NocoConfig::get`] and [`NocoConfig::set`].
pub const CONFIG_KEYS: &[&str] = &[
    "baseUrl",
    "baseId",
    "timeoutMs",
    "retryCount",
    "retryDelay",
    "retryStatusCodes",
    "idField",
    "batchSize",
    "pageSize",
];

/// Request and reconciliation tuning.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    pub timeout_ms: u64,
    pub retry_count: u32,
    /// Pause between retries, in milliseconds.
    pub retry_delay: u64,
    pub retry_status_codes: Vec<u16>,
    pub id_field: String,
    pub batch_size: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_size: Option<usize>,
}

impl Default for Settings {
    fn default() -> Self {
        let retry = RetryPolicy::default();
        Self {
            timeout_ms: 30_000,
            retry_count: retry.retries,
            retry_delay: retry.delay.as_millis() as u64,
            retry_status_codes: retry.status_codes,
            id_field: DEFAULT_ID_FIELD.to_string(),
            batch_size: DEFAULT_BATCH_SIZE,
            page_size: None,
        }
    }
}

/// Configuration for the CLI, stored in `<config dir>/config.json`
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct NocoConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_id: Option<String>,

    /// Sent with every request, e.g. `xc-token`.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,

    #[serde(default)]
    pub settings: Settings,
}

/// Directory holding `config.json`. `NOCODB_CONFIG_DIR` wins over the platform default.
pub fn config_dir() -> Result<PathBuf> {
    if let Some(dir) = std::env::var_os(CONFIG_DIR_ENV) {
        return Ok(PathBuf::from(dir));
    }
    ProjectDirs::from("com", "nocodb", "nocodb")
        .map(|dirs| dirs.config_dir().to_path_buf())
        .ok_or_else(|| NocoError::Config("Could not determine config dir".to_string()))
}

impl NocoConfig {
    /// Load config from the given directory, or return defaults if not found
    pub fn load<P: AsRef<Path>>(config_dir: P) -> Result<Self> {
        let config_path = config_dir.as_ref().join(CONFIG_FILENAME);

        if !config_path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&config_path)?;
        let config: NocoConfig = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Save config to the given directory
    pub fn save<P: AsRef<Path>>(&self, config_dir: P) -> Result<()> {
        let config_dir = config_dir.as_ref();
        if !config_dir.exists() {
            fs::create_dir_all(config_dir)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        fs::write(config_dir.join(CONFIG_FILENAME), content)?;
        Ok(())
    }

    /// Apply `NOCODB_BASE_URL` and `NOCODB_TOKEN`, read through `lookup`.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(BASE_URL_ENV).filter(|v| !v.is_empty()) {
            self.base_url = Some(url);
        }
        if let Some(token) = lookup(TOKEN_ENV).filter(|v| !v.is_empty()) {
            self.headers.insert(TOKEN_HEADER.to_string(), token);
        }
    }

    pub fn client_config(&self) -> Result<ClientConfig> {
        let base_url = self
            .base_url
            .clone()
            .filter(|url| !url.trim().is_empty())
            .ok_or_else(|| {
                NocoError::Config(format!(
                    "Base URL is not set. Run `nocodb config set baseUrl <url>` or set {}",
                    BASE_URL_ENV
                ))
            })?;

        Ok(ClientConfig {
            base_url,
            headers: self.headers.clone(),
            timeout: Duration::from_millis(self.settings.timeout_ms),
            retry: RetryPolicy {
                retries: self.settings.retry_count,
                delay: Duration::from_millis(self.settings.retry_delay),
                status_codes: self.settings.retry_status_codes.clone(),
            },
            id_field: self.settings.id_field.clone(),
            page_size: self.settings.page_size,
        })
    }

    pub fn reconcile_options(&self) -> ReconcileOptions {
        ReconcileOptions {
            id_field: self.settings.id_field.clone(),
            batch_size: self.settings.batch_size,
            page_size: self.settings.page_size,
        }
    }

    pub fn get(&self, key: &str) -> Option<String> {
        let s = &self.settings;
        match key {
            "baseUrl" => Some(self.base_url.clone().unwrap_or_default()),
            "baseId" => Some(self.base_id.clone().unwrap_or_default()),
            "timeoutMs" => Some(s.timeout_ms.to_string()),
            "retryCount" => Some(s.retry_count.to_string()),
            "retryDelay" => Some(s.retry_delay.to_string()),
            "retryStatusCodes" => Some(
                s.retry_status_codes
                    .iter()
                    .map(u16::to_string)
                    .collect::<Vec<_>>()
                    .join(","),
            ),
            "idField" => Some(s.id_field.clone()),
            "batchSize" => Some(s.batch_size.to_string()),
            "pageSize" => Some(s.page_size.map(|n| n.to_string()).unwrap_or_default()),
            _ => None,
        }
    }

    /// Set a key from its string form. Errors are user-facing messages.
    pub fn set(&mut self, key: &str, value: &str) -> std::result::Result<(), String> {
        let value = value.trim();
        let s = &mut self.settings;
        match key {
            "baseUrl" => self.base_url = non_empty(value),
            "baseId" => self.base_id = non_empty(value),
            "timeoutMs" => s.timeout_ms = positive(key, value)?,
            "retryCount" => s.retry_count = number(key, value)?,
            "retryDelay" => s.retry_delay = number(key, value)?,
            "retryStatusCodes" => {
                s.retry_status_codes = value
                    .split(',')
                    .map(str::trim)
                    .filter(|code| !code.is_empty())
                    .map(|code| match code.parse::<u16>() {
                        Ok(n) if (100..=599).contains(&n) => Ok(n),
                        _ => Err(format!("{} must be HTTP status codes, got '{}'", key, code)),
                    })
                    .collect::<std::result::Result<_, _>>()?
            }
            "idField" => {
                if value.is_empty() {
                    return Err("idField cannot be empty".to_string());
                }
                s.id_field = value.to_string();
            }
            "batchSize" => s.batch_size = positive(key, value)?,
            "pageSize" => {
                s.page_size = match value {
                    "" | "default" => None,
                    _ => Some(positive(key, value)?),
                }
            }
            _ => {
                return Err(format!(
                    "Unknown config key: {}. Known keys: {}",
                    key,
                    CONFIG_KEYS.join(", ")
                ))
            }
        }
        Ok(())
    }
}

fn non_empty(value: &str) -> Option<String> {
    (!value.is_empty()).then(|| value.to_string())
}

fn number<T: std::str::FromStr>(key: &str, value: &str) -> std::result::Result<T, String> {
    value
        .parse()
        .map_err(|_| format!("{} must be a non-negative integer, got '{}'", key, value))
}

fn positive<T>(key: &str, value: &str) -> std::result::Result<T, String>
where
    T: std::str::FromStr + PartialOrd + Default,
{
    let n: T = number(key, value)?;
    if n <= T::default() {
        return Err(format!("{} must be greater than zero", key));
    }
    Ok(n)
}

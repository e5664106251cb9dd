use std::fs;
use std::path::Path;

use url::Url;

use crate::domain::timeline::TimelinePolicy;
use crate::infrastructure::api_client::DEFAULT_API_BASE_URL;
use crate::infrastructure::error::ApiError;

const CLIENT_JSON: &str = "client.json";
const API_BASE_URL_ENV: &str = "ROOTINE_API_BASE_URL";

fn default_client_config() -> serde_json::Value {
    serde_json::json!({
        "schema": 1,
        "apiBaseUrl": DEFAULT_API_BASE_URL,
        "timeline": {
            "pxPerMinute": TimelinePolicy::default().px_per_minute,
            "minBlockHeightPx": TimelinePolicy::default().min_block_height_px
        }
    })
}

pub fn ensure_default_configs(config_dir: &Path) -> Result<(), ApiError> {
    let path = config_dir.join(CLIENT_JSON);
    if !path.exists() {
        let formatted = serde_json::to_string_pretty(&default_client_config())?;
        fs::write(path, format!("{formatted}\n"))?;
    }
    Ok(())
}

fn read_config(path: &Path) -> Result<serde_json::Value, ApiError> {
    let raw = fs::read_to_string(path)?;
    let parsed: serde_json::Value = serde_json::from_str(&raw)?;
    let schema = parsed
        .get("schema")
        .and_then(serde_json::Value::as_u64)
        .ok_or_else(|| ApiError::InvalidConfig(format!("missing schema in {}", path.display())))?;
    if schema != 1 {
        return Err(ApiError::InvalidConfig(format!(
            "unsupported schema {} in {}",
            schema,
            path.display()
        )));
    }
    Ok(parsed)
}

pub fn load_client_config(config_dir: &Path) -> Result<serde_json::Value, ApiError> {
    read_config(&config_dir.join(CLIENT_JSON))
}

/// Resolves the API base URL: environment override first, then the config
/// file, then the built-in default.
pub fn read_api_base_url(config_dir: &Path) -> Result<Url, ApiError> {
    read_api_base_url_from_lookup(config_dir, |key| std::env::var(key).ok())
}

fn read_api_base_url_from_lookup<F>(config_dir: &Path, lookup: F) -> Result<Url, ApiError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(raw) = lookup(API_BASE_URL_ENV)
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
    {
        return parse_base_url(&raw);
    }

    let config = load_client_config(config_dir)?;
    let configured = config
        .get("apiBaseUrl")
        .and_then(serde_json::Value::as_str)
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .unwrap_or(DEFAULT_API_BASE_URL);
    parse_base_url(configured)
}

fn parse_base_url(raw: &str) -> Result<Url, ApiError> {
    let url = Url::parse(raw)
        .map_err(|error| ApiError::InvalidConfig(format!("invalid api base URL {raw}: {error}")))?;
    if url.cannot_be_a_base() {
        return Err(ApiError::InvalidConfig(format!(
            "api base URL cannot be a base: {raw}"
        )));
    }
    Ok(url)
}

/// Timeline geometry from the config file. Missing or out-of-range values
/// fall back to the defaults rather than failing the whole client.
pub fn read_timeline_policy(config_dir: &Path) -> Result<TimelinePolicy, ApiError> {
    let config = load_client_config(config_dir)?;
    let defaults = TimelinePolicy::default();
    let timeline = config.get("timeline");
    let px_per_minute = timeline
        .and_then(|section| section.get("pxPerMinute"))
        .and_then(serde_json::Value::as_u64)
        .filter(|value| (1..=120).contains(value))
        .map(|value| value as u32)
        .unwrap_or(defaults.px_per_minute);
    let min_block_height_px = timeline
        .and_then(|section| section.get("minBlockHeightPx"))
        .and_then(serde_json::Value::as_u64)
        .filter(|value| (1..=1000).contains(value))
        .map(|value| value as u32)
        .unwrap_or(defaults.min_block_height_px);
    Ok(TimelinePolicy {
        px_per_minute,
        min_block_height_px,
    })
}

pub fn save_api_base_url(config_dir: &Path, base_url: &str) -> Result<(), ApiError> {
    let base_url = base_url.trim();
    let parsed = parse_base_url(base_url)?;

    let path = config_dir.join(CLIENT_JSON);
    let mut config = read_config(&path)?;
    let object = config.as_object_mut().ok_or_else(|| {
        ApiError::InvalidConfig(format!("invalid object structure in {}", path.display()))
    })?;
    object.insert(
        "apiBaseUrl".to_string(),
        serde_json::Value::String(parsed.to_string()),
    );

    let formatted = serde_json::to_string_pretty(&config)?;
    fs::write(path, format!("{formatted}\n"))?;
    Ok(())
}

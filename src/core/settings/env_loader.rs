use std::env;

use anyhow::{anyhow, Result};
use tracing::{debug, warn};
use validator::Validate;

use super::datasource_settings_entity::DataSourceConfig;
use crate::domain::common::model::Resolution;

/// Server-level settings read from the environment.
#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub bind_addr: String,
    pub log_dir: Option<String>,
    pub datasource: DataSourceConfig,
}

/// Loads `.env` (if present) and builds the settings from `DPAPI_*` variables.
pub fn load_from_env() -> Result<ServerSettings> {
    if let Ok(path) = dotenvy::dotenv() {
        debug!("Loaded environment from {}", path.display());
    }

    let url = env::var("DPAPI_URL").map_err(|_| anyhow!("DPAPI_URL must be set"))?;
    let mut datasource = DataSourceConfig::new(url);

    datasource.is_frun = env::var("DPAPI_IS_FRUN")
        .map(|v| parse_bool(&v))
        .unwrap_or(false);
    datasource.alias = env::var("DPAPI_ALIAS").unwrap_or_default();
    datasource.basic_auth = env::var("DPAPI_BASIC_AUTH").ok().filter(|v| !v.is_empty());

    if let Ok(code) = env::var("DPAPI_RESOLUTION") {
        match Resolution::from_code(&code) {
            Some(res) => datasource.resolution = res,
            None => warn!("Ignoring unknown DPAPI_RESOLUTION {:?}", code),
        }
    }

    if let Ok(pins) = env::var("DPAPI_PROVIDER_VERSIONS") {
        for (provider, version) in parse_version_pins(&pins) {
            datasource = datasource.with_provider_version(&provider, &version);
        }
    }

    datasource.validate()?;

    Ok(ServerSettings {
        bind_addr: env::var("DPAPI_BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string()),
        log_dir: env::var("DPAPI_LOG_DIR").ok().filter(|v| !v.is_empty()),
        datasource,
    })
}

fn parse_bool(value: &str) -> bool {
    matches!(value.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes")
}

/// `ALERTS=v1,JOBS=LATEST` → pairs; malformed entries are skipped.
fn parse_version_pins(value: &str) -> Vec<(String, String)> {
    value
        .split(',')
        .filter_map(|entry| {
            let (provider, version) = entry.split_once('=')?;
            let (provider, version) = (provider.trim(), version.trim());
            if provider.is_empty() || version.is_empty() {
                warn!("Skipping malformed provider version pin {:?}", entry);
                return None;
            }
            Some((provider.to_string(), version.to_string()))
        })
        .collect()
}

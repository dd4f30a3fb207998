use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::domain::common::model::Resolution;
use crate::domain::query::dto::panel_query::SelectableValue;

const ROUTE_PATH: &str = "/analytics";
const LATEST_VERSION: &str = "LATEST";

/// Version pin for one data provider.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataProviderConfig {
    #[serde(default)]
    pub data_provider: SelectableValue<String>,
    #[serde(default)]
    pub version: SelectableValue<String>,
}

/// Connection settings of one data-source instance.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct DataSourceConfig {
    /// Base URL of the analytics service (or of the host proxy in front of it).
    #[validate(url)]
    pub url: String,
    /// Direct destination mode: root is the base URL and a CSRF token is required.
    #[serde(default, rename = "isFRUN")]
    pub is_frun: bool,
    /// Routing segment placed before `/analytics` outside of direct mode.
    #[serde(default)]
    pub alias: String,
    /// Resolution used when no config query picks one.
    #[serde(default)]
    pub resolution: Resolution,
    #[serde(default)]
    pub data_provider_configs: HashMap<String, DataProviderConfig>,
    /// Pre-computed `Authorization` header value.
    #[serde(default)]
    pub basic_auth: Option<String>,
    #[serde(default)]
    pub with_credentials: bool,
}

impl DataSourceConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    pub fn with_provider_version(mut self, provider: &str, version: &str) -> Self {
        self.data_provider_configs.insert(
            provider.to_string(),
            DataProviderConfig {
                data_provider: SelectableValue::of(provider),
                version: SelectableValue::of(version),
            },
        );
        self
    }

    /// Root every service path is appended to.
    pub fn root_url(&self) -> String {
        let base = self.url.trim_end_matches('/');
        if self.is_frun {
            base.to_string()
        } else {
            format!("{}/{}{}", base, urlencoding::encode(&self.alias), ROUTE_PATH)
        }
    }

    /// Pinned version of `provider`; empty when unpinned or `LATEST`.
    /// With `for_path` a concrete version is returned as `/<version>`.
    pub fn effective_version(&self, provider: &str, for_path: bool) -> String {
        let version = self
            .data_provider_configs
            .get(provider)
            .and_then(|cfg| cfg.version.value.clone())
            .filter(|v| v != LATEST_VERSION)
            .unwrap_or_default();

        if for_path && !version.is_empty() {
            format!("/{}", version)
        } else {
            version
        }
    }
}

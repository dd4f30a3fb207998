//! Data-source API DTOs
use serde::Deserialize;
use validator::Validate;

use crate::domain::query::dto::panel_query::PanelQuery;
use crate::domain::query::dto::provider_dto::DpFilterResponse;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderSearchQuery {
    pub query: Option<String>,
    #[serde(default)]
    pub query_id: String,
}

/// Filter discovery. With `related`, `filter` is refreshed only when it
/// triggers a refresh; the response is `null` otherwise.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct FilterSearchRequest {
    #[validate(length(min = 1))]
    pub provider: String,
    #[serde(default)]
    pub query_id: String,
    pub filter: Option<DpFilterResponse>,
    pub query: Option<PanelQuery>,
    #[serde(default)]
    pub related: bool,
}

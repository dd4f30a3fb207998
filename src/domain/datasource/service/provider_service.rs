//! Provider and filter discovery used by the query editor and dashboard variables.

use anyhow::Result;
use tracing::debug;

use super::data_source::{DataSource, FILTERS_PATH, LIST_PATH};
use crate::core::client::fetcher::FetchRequest;
use crate::domain::common::model::FilterType;
use crate::domain::query::dto::panel_query::PanelQuery;
use crate::domain::query::dto::provider_dto::{
    DpFilterResponse, DpResponse, FilterSearchBody, MetricFindValue, TextValuePair,
    VariableQuery, VariableQueryType,
};

impl DataSource {
    /// Lists providers as `{text: description, value: name}`, narrowed to
    /// entries containing `query` (case-insensitive) when given.
    pub async fn search_data_providers(
        &self,
        query: Option<&str>,
        query_id: &str,
    ) -> Result<Vec<TextValuePair>> {
        let url = format!("{}{}", self.config.root_url(), LIST_PATH);
        let request =
            FetchRequest::get(url).with_request_id(format!("{}{}-searchdp", self.uid, query_id));
        let providers: Vec<DpResponse> = serde_json::from_value(self.send(request).await?)?;

        let needle = query.map(str::to_lowercase).filter(|q| !q.is_empty());
        Ok(providers
            .into_iter()
            .map(|p| TextValuePair {
                text: p.description,
                value: p.name,
            })
            .filter(|pair| match &needle {
                Some(q) => {
                    pair.text.to_lowercase().contains(q) || pair.value.to_lowercase().contains(q)
                }
                None => true,
            })
            .collect())
    }

    /// Filter metadata of `provider`. With `filter`, only the options of that
    /// filter are requested, restricted by the filters already set on `query`.
    pub async fn search_data_provider_filters(
        &self,
        provider: &str,
        query_id: &str,
        filter: Option<&DpFilterResponse>,
        query: Option<&PanelQuery>,
    ) -> Result<Vec<DpFilterResponse>> {
        let mut body = FilterSearchBody {
            provider_name: provider.to_string(),
            provider_version: self.config.effective_version(provider, false),
            name: None,
            filters: None,
        };
        if let Some(filter) = filter {
            let current = query.map(|q| q.data_provider_filters.as_slice()).unwrap_or_default();
            body.name = Some(filter.key.clone());
            body.filters = Some(self.request_builder().build_filters(current, None));
        }

        let request_id = format!("{}{}-searchfilters", self.uid, query_id);
        self.post_filters(body, Some(request_id)).await
    }

    /// Refreshed options of `filter` after a selection changed; `None` when the
    /// filter does not depend on other selections.
    pub async fn related_filter_options(
        &self,
        provider: &str,
        query_id: &str,
        filter: &DpFilterResponse,
        query: &PanelQuery,
    ) -> Result<Option<Vec<DpFilterResponse>>> {
        if !filter.trigger_refresh {
            return Ok(None);
        }
        debug!(provider, filter = %filter.key, "Refreshing related filter options");
        self.search_data_provider_filters(provider, query_id, Some(filter), Some(query))
            .await
            .map(Some)
    }

    /// Dashboard variable values: attribute values, measure names or
    /// dimension keys of a provider.
    pub async fn metric_find_query(&self, query: &VariableQuery) -> Result<Vec<MetricFindValue>> {
        let provider = query.data_provider.as_str();
        if provider.is_empty() {
            return Ok(Vec::new());
        }
        let body = FilterSearchBody {
            provider_name: provider.to_string(),
            provider_version: self.config.effective_version(provider, true),
            name: None,
            filters: None,
        };
        let filters = self.post_filters(body, None).await?;
        Ok(match query.query_type.value {
            Some(kind) => metric_values(&filters, kind, query.value.as_str()),
            None => Vec::new(),
        })
    }

    async fn post_filters(
        &self,
        body: FilterSearchBody,
        request_id: Option<String>,
    ) -> Result<Vec<DpFilterResponse>> {
        let url = format!("{}{}", self.config.root_url(), FILTERS_PATH);
        let mut request = FetchRequest::post(url, serde_json::to_value(&body)?);
        request.request_id = request_id;
        Ok(serde_json::from_value(self.send(request).await?)?)
    }
}

/// Later matches replace earlier ones for attributes and measures;
/// dimensions accumulate.
fn metric_values(
    filters: &[DpFilterResponse],
    kind: VariableQueryType,
    attribute: &str,
) -> Vec<MetricFindValue> {
    let keys_of = |f: &DpFilterResponse| {
        f.values
            .iter()
            .map(|v| MetricFindValue { text: v.key.clone() })
            .collect::<Vec<_>>()
    };
    let mut values = Vec::new();
    for filter in filters {
        match kind {
            VariableQueryType::Attribute
                if !attribute.is_empty()
                    && filter.key == attribute
                    && (filter.filter_type == Some(FilterType::Attribute) || filter.is_attribute) =>
            {
                values = keys_of(filter);
            }
            VariableQueryType::Measure if filter.filter_type == Some(FilterType::Measure) => {
                values = keys_of(filter);
            }
            VariableQueryType::Dimension if filter.filter_type == Some(FilterType::Dimension) => {
                values.push(MetricFindValue {
                    text: filter.key.clone(),
                });
            }
            _ => {}
        }
    }
    values
}

//! Provider and filter metadata exchanged with `/providers` and `/providers/filters`.

use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;

use super::panel_query::SelectableValue;
use crate::domain::common::model::FilterType;

/// Entry of the provider listing.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DpResponse {
    pub name: String,
    pub description: String,
    pub service: String,
    pub domain: String,
    pub version: Vec<String>,
    pub plan: String,
    pub calm_market: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeyLabelPair {
    pub key: String,
    pub label: String,
}

/// Filter metadata of a provider.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DpFilterResponse {
    pub key: String,
    pub name: String,
    pub description: String,
    pub values: Vec<KeyLabelPair>,
    pub is_attribute: bool,
    pub is_multiple: bool,
    /// Selecting a value of this filter changes the options of related filters.
    pub trigger_refresh: bool,
    pub group: String,
    #[serde(rename = "type")]
    pub filter_type: Option<FilterType>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextValuePair {
    pub text: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricFindValue {
    pub text: String,
}

/// Which part of the filter metadata a dashboard variable lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VariableQueryType {
    #[serde(rename = "ATTR")]
    Attribute,
    #[serde(rename = "MEAS")]
    Measure,
    #[serde(rename = "DIM")]
    Dimension,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VariableQuery {
    pub data_provider: SelectableValue<String>,
    #[serde(rename = "type")]
    pub query_type: SelectableValue<VariableQueryType>,
    pub value: SelectableValue<String>,
}

/// Wire filter `{key, values}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestFilter {
    pub key: String,
    pub values: Vec<String>,
}

/// Body of `POST /providers/filters`.
#[skip_serializing_none]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterSearchBody {
    pub provider_name: String,
    pub provider_version: String,
    pub name: Option<String>,
    pub filters: Option<Vec<RequestFilter>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn filter_metadata_tolerates_missing_fields() {
        let f: DpFilterResponse = serde_json::from_value(json!({
            "key": "service",
            "type": "attribute",
            "triggerRefresh": true,
            "values": [{ "key": "S1", "label": "Service 1" }]
        }))
        .unwrap();
        assert_eq!(f.filter_type, Some(FilterType::Attribute));
        assert!(f.trigger_refresh);
        assert!(!f.is_multiple);
        assert_eq!(f.values[0].key, "S1");
    }

    #[test]
    fn filter_search_body_omits_unset_fields() {
        let body = FilterSearchBody {
            provider_name: "ALERTS".into(),
            provider_version: "".into(),
            name: None,
            filters: None,
        };
        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            json!({ "providerName": "ALERTS", "providerVersion": "" })
        );
    }
}

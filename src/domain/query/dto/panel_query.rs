use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use validator::Validate;

use crate::core::util::template_util::ScopedVars;
use crate::domain::common::model::{AggrMethod, FirstDayOfWeek, Format, Resolution};

/// `{label, value}` pair as bound by the query editors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectableValue<T> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<T>,
}

impl<T> Default for SelectableValue<T> {
    fn default() -> Self {
        Self {
            label: None,
            value: None,
        }
    }
}

impl SelectableValue<String> {
    pub fn of(value: &str) -> Self {
        Self {
            label: Some(value.to_string()),
            value: Some(value.to_string()),
        }
    }

    /// Value, or empty when unset.
    pub fn as_str(&self) -> &str {
        self.value.as_deref().unwrap_or_default()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConfigQueryResolution {
    pub default: Option<Resolution>,
    pub auto_decide: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct QueryDrilldownMeasure {
    pub value: SelectableValue<String>,
    pub aggr_method: SelectableValue<AggrMethod>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryDrilldown {
    pub dimensions: Vec<SelectableValue<String>>,
    pub measures: Vec<QueryDrilldownMeasure>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DataProviderFilter {
    pub key: SelectableValue<String>,
    pub values: Vec<SelectableValue<String>>,
    pub key_selected: bool,
    pub values_selected: bool,
}

/// One dashboard panel query.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PanelQuery {
    pub ref_id: String,
    pub hide: bool,
    /// Legend label, also the name of the placeholder series.
    pub name: String,
    #[serde(rename = "type")]
    pub format: Format,
    /// Carries resolution and behavior flags for the whole batch instead of data.
    pub is_config: bool,
    pub data_provider: SelectableValue<String>,
    #[serde(alias = "filters")]
    pub data_provider_filters: Vec<DataProviderFilter>,
    pub resolution: Option<ConfigQueryResolution>,
    pub drilldown: QueryDrilldown,
    pub ignore_semantic_period: bool,
    pub complete_time_series_with_zero: bool,
    pub progress_last_data_point: bool,
    pub first_day_of_week: Option<FirstDayOfWeek>,
}

/// Relative (`now-6h`) or absolute range expression as typed in the time picker.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawTimeRange {
    #[serde(default)]
    pub from: String,
    #[serde(default)]
    pub to: String,
}

impl RawTimeRange {
    pub fn is_relative(&self) -> bool {
        self.from.trim_start().starts_with("now") && self.to.trim_start().starts_with("now")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeRange {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
    #[serde(default)]
    pub raw: RawTimeRange,
}

impl TimeRange {
    pub fn span_minutes(&self) -> f64 {
        (self.to - self.from).num_seconds() as f64 / 60.0
    }
}

/// One query execution cycle as requested by the host.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct QueryRequest {
    pub targets: Vec<PanelQuery>,
    pub range: TimeRange,
    #[serde(default)]
    #[validate(range(min = 1))]
    pub max_data_points: Option<u32>,
    #[serde(default)]
    pub scoped_vars: ScopedVars,
    /// IANA name or `+HH:MM`; UTC when absent.
    #[serde(default)]
    pub timezone: Option<String>,
    #[serde(default)]
    pub dashboard_id: Option<Value>,
    #[serde(default)]
    pub panel_id: Option<Value>,
}

impl QueryRequest {
    /// `<dashboardId>-<panelId>` prefix of the sub-batch request ids.
    pub fn request_id_prefix(&self) -> String {
        format!("{}-{}", id_label(&self.dashboard_id), id_label(&self.panel_id))
    }
}

fn id_label(value: &Option<Value>) -> String {
    match value {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => "0".to_string(),
        Some(other) => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn deserializes_editor_query_with_defaults() {
        let q: PanelQuery = serde_json::from_value(json!({
            "refId": "A",
            "name": "Alerts",
            "type": "table",
            "dataProvider": { "label": "Alerts", "value": "ALERTS" },
            "filters": [{ "key": { "value": "service" }, "values": [{ "value": "$svc" }] }]
        }))
        .unwrap();

        assert_eq!(q.format, Format::Table);
        assert_eq!(q.data_provider.as_str(), "ALERTS");
        assert_eq!(q.data_provider_filters.len(), 1);
        assert!(q.drilldown.measures.is_empty());
        assert!(!q.is_config);
    }

    #[test]
    fn selectable_enum_values_may_be_partial() {
        let measures: Vec<QueryDrilldownMeasure> = serde_json::from_value(json!([
            { "value": { "value": "count" }, "aggrMethod": { "label": "Sum", "value": "SUM" } },
            { "value": { "value": "avg_time" }, "aggrMethod": { "label": "Average" } },
            { "value": { "value": "errors" } }
        ]))
        .unwrap();

        assert_eq!(measures[0].aggr_method.value, Some(AggrMethod::Sum));
        assert_eq!(measures[1].aggr_method.label.as_deref(), Some("Average"));
        assert_eq!(measures[1].aggr_method.value, None);
        assert_eq!(measures[2].aggr_method, SelectableValue::default());
        assert_eq!(
            serde_json::to_value(&measures[1].aggr_method).unwrap(),
            json!({ "label": "Average" })
        );
    }

    #[test]
    fn relative_ranges_start_with_now() {
        let rel = RawTimeRange { from: "now-6h".into(), to: "now".into() };
        let abs = RawTimeRange { from: "2024-01-01T00:00:00Z".into(), to: "now".into() };
        assert!(rel.is_relative());
        assert!(!abs.is_relative());
    }

    #[test]
    fn request_id_prefix_accepts_numbers_and_strings() {
        let req: QueryRequest = serde_json::from_value(json!({
            "targets": [],
            "range": { "from": "2024-01-01T00:00:00Z", "to": "2024-01-01T01:00:00Z" },
            "dashboardId": 12,
            "panelId": "p3"
        }))
        .unwrap();
        assert_eq!(req.request_id_prefix(), "12-p3");
        assert_eq!(req.range.span_minutes(), 60.0);
    }
}

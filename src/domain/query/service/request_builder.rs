use crate::core::settings::datasource_settings_entity::DataSourceConfig;
use crate::core::util::template_util::{expand_values, ScopedVars, VariableInterpolator};
use crate::domain::query::dto::panel_query::{DataProviderFilter, PanelQuery};
use crate::domain::query::dto::provider_dto::RequestFilter;
use crate::domain::query::dto::wire_request::{RequestColumns, RequestFragment, RequestMetric};

/// Translates panel queries into their wire form.
pub struct RequestBuilder<'a> {
    config: &'a DataSourceConfig,
    interpolator: &'a dyn VariableInterpolator,
}

impl<'a> RequestBuilder<'a> {
    pub fn new(config: &'a DataSourceConfig, interpolator: &'a dyn VariableInterpolator) -> Self {
        Self {
            config,
            interpolator,
        }
    }

    pub fn build(&self, query: &PanelQuery, scoped_vars: &ScopedVars) -> RequestFragment {
        let provider = query.data_provider.as_str();
        let version = self.config.effective_version(provider, false);

        let mut columns = RequestColumns::default();
        for dimension in &query.drilldown.dimensions {
            if let Some(value) = dimension.value.as_deref() {
                columns
                    .dimensions
                    .extend(expand_values(value, scoped_vars, self.interpolator));
            }
        }
        for measure in &query.drilldown.measures {
            let field = measure.value.as_str();
            if field.is_empty() {
                continue;
            }
            let method = measure.aggr_method.value;
            columns.metrics.extend(
                expand_values(field, scoped_vars, self.interpolator)
                    .into_iter()
                    .map(|measure| RequestMetric { measure, method }),
            );
        }

        RequestFragment {
            ref_id: query.ref_id.clone(),
            name: query.name.clone(),
            provider: provider.to_string(),
            version: (!version.is_empty()).then_some(version),
            columns,
            filters: self.build_filters(&query.data_provider_filters, Some(scoped_vars)),
        }
    }

    /// Filters with a key; values are expanded only when `scoped_vars` is given.
    pub fn build_filters(
        &self,
        filters: &[DataProviderFilter],
        scoped_vars: Option<&ScopedVars>,
    ) -> Vec<RequestFilter> {
        filters
            .iter()
            .filter(|f| !f.key.as_str().is_empty())
            .map(|f| {
                let values = f
                    .values
                    .iter()
                    .filter_map(|v| v.value.as_deref())
                    .filter(|v| !v.is_empty())
                    .flat_map(|v| match scoped_vars {
                        Some(vars) => expand_values(v, vars, self.interpolator),
                        None => vec![v.to_string()],
                    })
                    .collect();
                RequestFilter {
                    key: f.key.as_str().to_string(),
                    values,
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::util::template_util::{ScopedVar, ScopedVariableInterpolator};
    use crate::domain::common::model::AggrMethod;
    use crate::domain::query::dto::panel_query::{
        QueryDrilldown, QueryDrilldownMeasure, SelectableValue,
    };
    use serde_json::json;

    fn vars() -> ScopedVars {
        let mut vars = ScopedVars::new();
        vars.insert("svc".into(), ScopedVar { text: None, value: json!(["S1", "S2"]) });
        vars.insert("dim".into(), ScopedVar { text: None, value: json!("region") });
        vars
    }

    fn filter(key: &str, values: &[&str]) -> DataProviderFilter {
        DataProviderFilter {
            key: SelectableValue::of(key),
            values: values.iter().map(|v| SelectableValue::of(v)).collect(),
            ..Default::default()
        }
    }

    fn measure(field: &str, method: AggrMethod) -> QueryDrilldownMeasure {
        QueryDrilldownMeasure {
            value: SelectableValue::of(field),
            aggr_method: SelectableValue {
                label: None,
                value: Some(method),
            },
        }
    }

    fn query() -> PanelQuery {
        PanelQuery {
            ref_id: "A".into(),
            name: "Alerts".into(),
            data_provider: SelectableValue::of("ALERTS"),
            data_provider_filters: vec![
                filter("service", &["$svc", "S9"]),
                filter("", &["dropped"]),
            ],
            drilldown: QueryDrilldown {
                dimensions: vec![SelectableValue::of("${dim}"), SelectableValue::of("status")],
                measures: vec![measure("count", AggrMethod::Sum), measure("", AggrMethod::Avg)],
            },
            ..Default::default()
        }
    }

    #[test]
    fn builds_fragment_with_expanded_variables() {
        let cfg = DataSourceConfig::new("https://calm").with_provider_version("ALERTS", "v2");
        let interpolator = ScopedVariableInterpolator::default();
        let fragment = RequestBuilder::new(&cfg, &interpolator).build(&query(), &vars());

        assert_eq!(fragment.version.as_deref(), Some("v2"));
        assert_eq!(fragment.filters.len(), 1);
        assert_eq!(fragment.filters[0].values, vec!["S1", "S2", "S9"]);
        assert_eq!(fragment.columns.dimensions, vec!["region", "status"]);
    }

    #[test]
    fn drops_measures_without_field() {
        let cfg = DataSourceConfig::new("https://calm");
        let interpolator = ScopedVariableInterpolator::default();
        let fragment = RequestBuilder::new(&cfg, &interpolator).build(&query(), &vars());

        assert_eq!(
            fragment.columns.metrics,
            vec![RequestMetric {
                measure: "count".into(),
                method: Some(AggrMethod::Sum)
            }]
        );
    }

    #[test]
    fn latest_version_is_omitted_from_wire() {
        let cfg = DataSourceConfig::new("https://calm").with_provider_version("ALERTS", "LATEST");
        let interpolator = ScopedVariableInterpolator::default();
        let fragment = RequestBuilder::new(&cfg, &interpolator).build(&query(), &vars());

        assert_eq!(fragment.version, None);
        let wire = serde_json::to_value(&fragment).unwrap();
        assert!(wire.get("version").is_none());
        assert_eq!(wire["refId"], "A");
    }

    #[test]
    fn filters_without_scope_keep_literal_values() {
        let cfg = DataSourceConfig::new("https://calm");
        let interpolator = ScopedVariableInterpolator::default();
        let filters = RequestBuilder::new(&cfg, &interpolator)
            .build_filters(&query().data_provider_filters, None);

        assert_eq!(filters[0].values, vec!["$svc", "S9"]);
    }
}

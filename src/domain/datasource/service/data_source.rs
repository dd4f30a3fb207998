use std::sync::Arc;

use anyhow::Result;
use chrono::Duration;
use futures::future::{BoxFuture, FutureExt};
use futures::stream::{BoxStream, FuturesUnordered, StreamExt};
use http::header::{AUTHORIZATION, CONTENT_TYPE};
use http::{HeaderMap, HeaderValue};
use thiserror::Error;
use tokio::runtime::Handle;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::core::client::fetcher::{FetchRequest, Fetcher};
use crate::core::settings::datasource_settings_entity::DataSourceConfig;
use crate::core::util::template_util::VariableInterpolator;
use crate::core::util::timestamp_codec::{TimeZoneSpec, TimestampCodec};
use crate::domain::common::model::{Format, Resolution};
use crate::domain::query::dto::panel_query::{PanelQuery, QueryRequest};
use crate::domain::query::dto::result_frame::{QueryError, QueryErrorData, QueryResult};
use crate::domain::query::dto::wire_request::{
    DataRequestBody, RequestEnvelope, RequestFragment, WireFormat, WireTimeRange,
};
use crate::domain::query::service::request_builder::RequestBuilder;
use crate::domain::query::service::resolution_planner::auto_resolution;
use crate::domain::query::service::response_reconstructor::{
    error_from_response, ResponseReconstructor,
};
use crate::domain::query::service::semantic_period_service::SemanticPeriodEngine;
use crate::domain::query::service::series_completion::ReconstructionSettings;

pub const DATA_PATH: &str = "/providers/data";
pub const LIST_PATH: &str = "/providers";
pub const FILTERS_PATH: &str = "/providers/filters";

pub const CSRF_TOKEN_HEADER: &str = "x-csrf-token";
const TIMESTAMP_FORMAT: &str = "unix";
const RAW_TABLE_TYPE: &str = "raw";
const NETWORK_ERROR: &str = "Network Error";

/// Periods for which raw data is limited to the last two hours.
const RAW_CLAMPED_PERIODS: [&str; 2] = ["L2H", "C2H"];
const RAW_MAX_HOURS: i64 = 2;

/// Failed call to the analytics service outside of the data path.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct UpstreamError {
    pub status: u16,
    pub message: String,
}

/// Result shape of one `/providers/data` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubBatch {
    TimeSeries,
    RawTable,
    Table,
}

impl SubBatch {
    fn for_format(format: Format) -> Self {
        match format {
            Format::Timeseries => SubBatch::TimeSeries,
            Format::RawTable => SubBatch::RawTable,
            Format::Table | Format::LastTable => SubBatch::Table,
        }
    }

    fn wire_format(&self) -> WireFormat {
        match self {
            SubBatch::TimeSeries => WireFormat::TimeSeries,
            SubBatch::RawTable | SubBatch::Table => WireFormat::Table,
        }
    }

    fn request_suffix(&self) -> &'static str {
        match self {
            SubBatch::TimeSeries => "timeseries",
            SubBatch::RawTable => "tableraw",
            SubBatch::Table => "table",
        }
    }
}

/// Everything one query cycle sends, before dispatch.
#[derive(Debug, Clone)]
pub struct QueryPlan {
    pub envelope: RequestEnvelope,
    pub settings: ReconstructionSettings,
    pub batches: Vec<(SubBatch, Vec<RequestFragment>)>,
}

/// One configured data-source instance.
pub struct DataSource {
    pub(super) config: DataSourceConfig,
    pub(super) fetcher: Arc<dyn Fetcher>,
    pub(super) interpolator: Arc<dyn VariableInterpolator>,
    periods: SemanticPeriodEngine,
    pub(super) uid: String,
    headers: Arc<RwLock<HeaderMap>>,
}

impl DataSource {
    /// Creates the instance; in direct destination mode the CSRF token is
    /// fetched in the background when a runtime is available.
    pub fn new(
        config: DataSourceConfig,
        fetcher: Arc<dyn Fetcher>,
        interpolator: Arc<dyn VariableInterpolator>,
    ) -> Self {
        let source = Self {
            headers: Arc::new(RwLock::new(base_headers(&config))),
            periods: SemanticPeriodEngine::default(),
            uid: Uuid::new_v4().simple().to_string(),
            config,
            fetcher,
            interpolator,
        };

        if source.config.is_frun {
            match Handle::try_current() {
                Ok(handle) => {
                    handle.spawn(refresh_csrf_token(
                        source.fetcher.clone(),
                        source.config.url.clone(),
                        source.headers.clone(),
                    ));
                }
                Err(_) => warn!("No async runtime; CSRF token not fetched"),
            }
        }
        source
    }

    pub fn with_period_engine(mut self, periods: SemanticPeriodEngine) -> Self {
        self.periods = periods;
        self
    }

    /// Fetches the CSRF token now and stores it for later calls.
    pub async fn refresh_csrf_token(&self) {
        refresh_csrf_token(
            self.fetcher.clone(),
            self.config.url.clone(),
            self.headers.clone(),
        )
        .await;
    }

    /// Snapshot of the headers every service call carries.
    pub async fn headers(&self) -> HeaderMap {
        self.headers.read().await.clone()
    }

    pub(super) fn request_builder(&self) -> RequestBuilder<'_> {
        RequestBuilder::new(&self.config, self.interpolator.as_ref())
    }

    /// Partitions the targets and resolves the request envelope.
    pub fn plan(&self, request: &QueryRequest) -> QueryPlan {
        let builder = self.request_builder();
        let mut config_query: Option<&PanelQuery> = None;
        let mut batches: Vec<(SubBatch, Vec<RequestFragment>)> = Vec::new();

        for target in request.targets.iter().filter(|t| !t.hide) {
            if target.is_config {
                match config_query {
                    None => config_query = Some(target),
                    Some(_) => debug!(ref_id = %target.ref_id, "Skipping repeated config query"),
                }
                continue;
            }
            if target.data_provider.as_str().is_empty() {
                continue;
            }

            let batch = SubBatch::for_format(target.format);
            let fragment = builder.build(target, &request.scoped_vars);
            match batches.iter_mut().find(|(b, _)| *b == batch) {
                Some((_, fragments)) => fragments.push(fragment),
                None => batches.push((batch, vec![fragment])),
            }
        }

        let resolution = match config_query.and_then(|c| c.resolution.as_ref()) {
            Some(r) if r.auto_decide => {
                auto_resolution(request.range.span_minutes(), request.max_data_points)
            }
            Some(r) => r.default.unwrap_or(self.config.resolution),
            None => self.config.resolution,
        };

        let timezone = match request.timezone.as_deref() {
            Some(name) => TimeZoneSpec::parse(name).unwrap_or_else(|| {
                warn!("Unknown timezone '{}', using UTC", name);
                TimeZoneSpec::Utc
            }),
            None => TimeZoneSpec::Utc,
        };

        let ignore_period = config_query.is_some_and(|c| c.ignore_semantic_period);
        let period = if ignore_period {
            String::new()
        } else {
            self.periods.encode(&request.range.raw, resolution)
        };

        let to = request.range.to;
        let mut from = request.range.from;
        if resolution == Resolution::Raw
            && RAW_CLAMPED_PERIODS.contains(&period.as_str())
            && (to - from).num_hours() > RAW_MAX_HOURS
        {
            from = to - Duration::hours(RAW_MAX_HOURS);
        }

        let first_day_of_week = config_query
            .and_then(|c| c.first_day_of_week)
            .unwrap_or_default();

        let envelope = RequestEnvelope {
            timestamp_format: TIMESTAMP_FORMAT.to_string(),
            time_range: WireTimeRange {
                semantic: period.clone(),
                from: TimestampCodec::format(from, &timezone).unwrap_or_default(),
                to: TimestampCodec::format(to, &timezone).unwrap_or_default(),
            },
            resolution,
            timezone: timezone.offset_string(request.range.from),
            first_week_day: first_day_of_week,
        };

        let settings = ReconstructionSettings {
            resolution,
            from,
            to,
            timezone,
            complete_series_with_zeros: config_query
                .is_some_and(|c| c.complete_time_series_with_zero),
            progress_last_data_point: config_query.is_some_and(|c| c.progress_last_data_point),
            selected_period: period,
            first_day_of_week,
        };

        QueryPlan {
            envelope,
            settings,
            batches,
        }
    }

    /// Runs one query cycle. Each non-empty sub-batch is sent concurrently;
    /// results arrive in completion order.
    pub async fn query(&self, request: &QueryRequest) -> BoxStream<'static, QueryResult> {
        let plan = self.plan(request);
        info!(
            resolution = plan.envelope.resolution.as_code(),
            period = %plan.envelope.time_range.semantic,
            batches = plan.batches.len(),
            "Dispatching query"
        );

        let headers = self.headers().await;
        let url = format!("{}{}", self.config.root_url(), DATA_PATH);
        let prefix = request.request_id_prefix();
        let reconstructor = Arc::new(ResponseReconstructor::new(plan.settings));

        let pending: FuturesUnordered<BoxFuture<'static, QueryResult>> = plan
            .batches
            .into_iter()
            .map(|(batch, queries)| {
                let body = DataRequestBody {
                    format: batch.wire_format(),
                    envelope: plan.envelope.clone(),
                    table_type: (batch == SubBatch::RawTable).then(|| RAW_TABLE_TYPE.to_string()),
                    queries,
                };
                let request_id = format!("{}-querydata-{}", prefix, batch.request_suffix());
                run_sub_batch(
                    self.fetcher.clone(),
                    reconstructor.clone(),
                    url.clone(),
                    headers.clone(),
                    request_id,
                    batch,
                    body,
                )
                .boxed()
            })
            .collect();

        pending.boxed()
    }

    /// Drains [`DataSource::query`] into a list.
    pub async fn query_all(&self, request: &QueryRequest) -> Vec<QueryResult> {
        self.query(request).await.collect().await
    }
}

fn base_headers(config: &DataSourceConfig) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    if let Some(auth) = config.basic_auth.as_deref().filter(|a| !a.is_empty()) {
        match HeaderValue::from_str(auth) {
            Ok(value) => {
                headers.insert(AUTHORIZATION, value);
            }
            Err(e) => warn!("Ignoring invalid basic auth header: {}", e),
        }
    }
    headers
}

async fn refresh_csrf_token(
    fetcher: Arc<dyn Fetcher>,
    url: String,
    headers: Arc<RwLock<HeaderMap>>,
) {
    let mut request_headers = headers.read().await.clone();
    request_headers.insert(CSRF_TOKEN_HEADER, HeaderValue::from_static("fetch"));

    match fetcher.fetch(FetchRequest::get(url).with_headers(request_headers)).await {
        Ok(response) if response.is_success() => {
            match response.headers.get(CSRF_TOKEN_HEADER) {
                Some(token) => {
                    headers.write().await.insert(CSRF_TOKEN_HEADER, token.clone());
                    debug!("CSRF token refreshed");
                }
                None => warn!("CSRF token missing from response"),
            }
        }
        Ok(response) => warn!(
            "CSRF token refresh failed: Error {}: {}",
            response.status.as_u16(),
            response.status_text
        ),
        Err(e) => warn!("CSRF token refresh failed: {}", e),
    }
}

async fn run_sub_batch(
    fetcher: Arc<dyn Fetcher>,
    reconstructor: Arc<ResponseReconstructor>,
    url: String,
    headers: HeaderMap,
    request_id: String,
    batch: SubBatch,
    body: DataRequestBody,
) -> QueryResult {
    let queries = body.queries.clone();
    let payload = match serde_json::to_value(&body) {
        Ok(payload) => payload,
        Err(e) => return failed(format!("Could not encode request: {}", e), 0, NETWORK_ERROR),
    };

    let request = FetchRequest::post(url, payload)
        .with_headers(headers)
        .with_request_id(request_id);

    match fetcher.fetch(request).await {
        Ok(response) => match batch {
            SubBatch::TimeSeries => reconstructor.reconstruct_time_series(&queries, response),
            SubBatch::RawTable | SubBatch::Table => {
                reconstructor.reconstruct_tables(&queries, response)
            }
        },
        Err(e) => {
            warn!(batch = batch.request_suffix(), "Data request failed: {}", e);
            failed(e.to_string(), 0, NETWORK_ERROR)
        }
    }
}

fn failed(message: String, status: u16, status_text: &str) -> QueryResult {
    QueryResult {
        data: Vec::new(),
        error: Some(QueryError {
            data: QueryErrorData {
                message,
                error: None,
            },
            status,
            status_text: status_text.to_string(),
        }),
    }
}

fn not_working(reason: &str) -> ConnectionStatus {
    ConnectionStatus {
        status: "error".into(),
        message: format!("Data source is not working: {}", reason),
        title: "Error".into(),
    }
}

/// Connection check result in the host's shape.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct ConnectionStatus {
    pub status: String,
    pub message: String,
    pub title: String,
}

impl DataSource {
    /// GET `<root>/providers`; working iff the service answers 200. Transport
    /// failures are reported as a failed check, not as an error.
    pub async fn test_datasource(&self) -> Result<ConnectionStatus> {
        let url = format!("{}{}", self.config.root_url(), LIST_PATH);
        let outcome = self
            .fetcher
            .fetch(FetchRequest::get(url).with_headers(self.headers().await))
            .await;

        Ok(match outcome {
            Ok(response) if response.status == http::StatusCode::OK => ConnectionStatus {
                status: "success".into(),
                message: "Data source is working".into(),
                title: "Success".into(),
            },
            Ok(response) => not_working(&response.status_text),
            Err(e) => {
                warn!("Connection test failed: {}", e);
                not_working(&e.to_string())
            }
        })
    }

    pub(super) async fn send(&self, request: FetchRequest) -> Result<serde_json::Value> {
        let response = self.fetcher.fetch(request.with_headers(self.headers().await)).await?;
        if !response.is_success() {
            let error = error_from_response(&response);
            return Err(UpstreamError {
                status: error.status,
                message: error.data.message,
            }
            .into());
        }
        Ok(response.data)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::core::client::fetcher::FetchResponse;
    use crate::core::util::template_util::{ScopedVar, ScopedVariableInterpolator, ScopedVars};
    use crate::domain::query::dto::panel_query::{
        ConfigQueryResolution, RawTimeRange, SelectableValue, TimeRange,
    };
    use async_trait::async_trait;
    use chrono::{DateTime, Utc};
    use http::{Method, StatusCode};
    use serde_json::{json, Value};
    use std::sync::Mutex;

    /// Records requests and answers by URL suffix / request id.
    #[derive(Default)]
    pub(crate) struct MockFetcher {
        pub requests: Mutex<Vec<FetchRequest>>,
        pub responses: Mutex<Vec<(String, FetchResponse)>>,
    }

    impl MockFetcher {
        pub fn respond(&self, key: &str, status: StatusCode, data: Value) {
            self.respond_with_headers(key, status, HeaderMap::new(), data);
        }

        pub fn respond_with_headers(
            &self,
            key: &str,
            status: StatusCode,
            headers: HeaderMap,
            data: Value,
        ) {
            self.responses.lock().unwrap().push((
                key.to_string(),
                FetchResponse {
                    status,
                    status_text: status.canonical_reason().unwrap_or_default().to_string(),
                    headers,
                    data,
                },
            ));
        }

        pub fn recorded(&self) -> Vec<FetchRequest> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Fetcher for MockFetcher {
        async fn fetch(&self, request: FetchRequest) -> Result<FetchResponse> {
            self.requests.lock().unwrap().push(request.clone());
            let id = request.request_id.clone().unwrap_or_default();
            let responses = self.responses.lock().unwrap();
            responses
                .iter()
                .rev()
                .find(|(key, _)| id.ends_with(key.as_str()) || request.url.ends_with(key.as_str()))
                .map(|(_, response)| response.clone())
                .ok_or_else(|| anyhow::anyhow!("connection refused"))
        }
    }

    pub(crate) fn source(config: DataSourceConfig, fetcher: Arc<MockFetcher>) -> DataSource {
        DataSource::new(config, fetcher, Arc::new(ScopedVariableInterpolator::default()))
    }

    fn at(rfc: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(rfc).unwrap().with_timezone(&Utc)
    }

    fn panel(ref_id: &str, format: Format) -> PanelQuery {
        PanelQuery {
            ref_id: ref_id.into(),
            name: format!("query {}", ref_id),
            format,
            data_provider: SelectableValue::of("ALERTS"),
            ..Default::default()
        }
    }

    fn config_query(resolution: ConfigQueryResolution) -> PanelQuery {
        PanelQuery {
            ref_id: "CFG".into(),
            is_config: true,
            resolution: Some(resolution),
            ..Default::default()
        }
    }

    fn request(targets: Vec<PanelQuery>, from: &str, to: &str, raw: (&str, &str)) -> QueryRequest {
        QueryRequest {
            targets,
            range: TimeRange {
                from: at(from),
                to: at(to),
                raw: RawTimeRange {
                    from: raw.0.into(),
                    to: raw.1.into(),
                },
            },
            max_data_points: None,
            scoped_vars: ScopedVars::new(),
            timezone: None,
            dashboard_id: Some(json!(7)),
            panel_id: Some(json!(3)),
        }
    }

    fn six_hours(targets: Vec<PanelQuery>) -> QueryRequest {
        request(targets, "2024-01-01T00:00:00Z", "2024-01-01T06:00:00Z", ("now-6h", "now"))
    }

    #[test]
    fn partitions_targets_by_result_shape() {
        let mut hidden = panel("H", Format::Timeseries);
        hidden.hide = true;
        let mut no_provider = panel("N", Format::Table);
        no_provider.data_provider = SelectableValue::default();

        let src = source(DataSourceConfig::new("https://calm"), Arc::new(MockFetcher::default()));
        let plan = src.plan(&six_hours(vec![
            panel("A", Format::Timeseries),
            panel("B", Format::Table),
            panel("C", Format::RawTable),
            panel("D", Format::LastTable),
            hidden,
            no_provider,
        ]));

        let shape: Vec<(SubBatch, Vec<&str>)> = plan
            .batches
            .iter()
            .map(|(b, q)| (*b, q.iter().map(|f| f.ref_id.as_str()).collect()))
            .collect();
        assert_eq!(
            shape,
            vec![
                (SubBatch::TimeSeries, vec!["A"]),
                (SubBatch::Table, vec!["B", "D"]),
                (SubBatch::RawTable, vec!["C"]),
            ]
        );
    }

    #[test]
    fn first_config_query_drives_resolution() {
        let src = source(DataSourceConfig::new("https://calm"), Arc::new(MockFetcher::default()));
        let mut second = config_query(ConfigQueryResolution {
            default: Some(Resolution::Year),
            auto_decide: false,
        });
        second.data_provider = SelectableValue::of("ALERTS");

        let plan = src.plan(&six_hours(vec![
            config_query(ConfigQueryResolution {
                default: Some(Resolution::Day),
                auto_decide: false,
            }),
            second,
            panel("A", Format::Timeseries),
        ]));

        assert_eq!(plan.envelope.resolution, Resolution::Day);
        assert_eq!(plan.batches.len(), 1);
        assert_eq!(plan.batches[0].1.len(), 1);
    }

    #[test]
    fn auto_decide_uses_range_and_max_points() {
        let src = source(DataSourceConfig::new("https://calm"), Arc::new(MockFetcher::default()));
        let mut req = six_hours(vec![config_query(ConfigQueryResolution {
            default: Some(Resolution::Year),
            auto_decide: true,
        })]);
        req.max_data_points = Some(20);
        assert_eq!(src.plan(&req).envelope.resolution, Resolution::Min30);
    }

    #[test]
    fn envelope_carries_period_and_local_timestamps() {
        let src = source(DataSourceConfig::new("https://calm"), Arc::new(MockFetcher::default()));
        let mut req = request(
            vec![panel("A", Format::Timeseries)],
            "2024-01-01T08:00:00Z",
            "2024-01-01T10:00:00Z",
            ("now-2h/h", "now/h"),
        );
        req.timezone = Some("+02:00".into());

        let envelope = src.plan(&req).envelope;
        assert_eq!(envelope.time_range.semantic, "L2H");
        assert_eq!(envelope.time_range.from, "20240101100000");
        assert_eq!(envelope.time_range.to, "20240101120000");
        assert_eq!(envelope.timezone, "+02:00");
        assert_eq!(envelope.timestamp_format, "unix");
    }

    #[test]
    fn ignore_semantic_period_sends_empty_code() {
        let src = source(DataSourceConfig::new("https://calm"), Arc::new(MockFetcher::default()));
        let mut cfg = config_query(ConfigQueryResolution::default());
        cfg.ignore_semantic_period = true;
        let plan = src.plan(&six_hours(vec![cfg, panel("A", Format::Timeseries)]));
        assert_eq!(plan.envelope.time_range.semantic, "");
    }

    #[test]
    fn raw_resolution_clamps_range_to_two_hours() {
        let src = source(DataSourceConfig::new("https://calm"), Arc::new(MockFetcher::default()));
        let plan = src.plan(&six_hours(vec![
            config_query(ConfigQueryResolution {
                default: Some(Resolution::Raw),
                auto_decide: false,
            }),
            panel("A", Format::RawTable),
        ]));
        assert_eq!(plan.envelope.time_range.semantic, "L2H");
        assert_eq!(plan.envelope.time_range.from, "20240101040000");
        assert_eq!(plan.settings.from, at("2024-01-01T04:00:00Z"));
    }

    #[test]
    fn period_engine_is_replaceable() {
        let src = source(DataSourceConfig::new("https://calm"), Arc::new(MockFetcher::default()))
            .with_period_engine(SemanticPeriodEngine::unrestricted());
        let plan = src.plan(&six_hours(vec![
            config_query(ConfigQueryResolution {
                default: Some(Resolution::Raw),
                auto_decide: false,
            }),
            panel("A", Format::RawTable),
        ]));
        assert_eq!(plan.envelope.time_range.semantic, "L6H");
        assert_eq!(plan.envelope.time_range.from, "20240101000000");
    }

    #[tokio::test]
    async fn dispatches_one_call_per_sub_batch() {
        let fetcher = Arc::new(MockFetcher::default());
        fetcher.respond("querydata-timeseries", StatusCode::OK, json!([[]]));
        fetcher.respond("querydata-table", StatusCode::OK, json!([{ "columns": [], "rows": [] }]));
        fetcher.respond("querydata-tableraw", StatusCode::OK, json!([{ "columns": [], "rows": [] }]));

        let mut cfg = DataSourceConfig::new("https://calm");
        cfg.alias = "eu".into();
        cfg.basic_auth = Some("Basic dXNlcjpwdw==".into());
        let src = source(cfg, fetcher.clone());

        let results = src
            .query_all(&six_hours(vec![
                panel("A", Format::Timeseries),
                panel("B", Format::Table),
                panel("C", Format::RawTable),
            ]))
            .await;

        assert_eq!(results.len(), 3);
        assert!(results.iter().all(|r| r.error.is_none()));

        let mut requests = fetcher.recorded();
        requests.sort_by(|a, b| a.request_id.cmp(&b.request_id));
        let ids: Vec<_> = requests.iter().map(|r| r.request_id.clone().unwrap()).collect();
        assert_eq!(
            ids,
            vec!["7-3-querydata-table", "7-3-querydata-tableraw", "7-3-querydata-timeseries"]
        );

        for r in &requests {
            assert_eq!(r.method, Method::POST);
            assert_eq!(r.url, "https://calm/eu/analytics/providers/data");
            assert_eq!(r.headers[AUTHORIZATION], "Basic dXNlcjpwdw==");
            assert_eq!(r.headers[CONTENT_TYPE], "application/json");
        }

        let raw = requests[1].body.as_ref().unwrap();
        assert_eq!(raw["format"], "table");
        assert_eq!(raw["tableType"], "raw");
        assert_eq!(raw["queries"][0]["refId"], "C");
        let series = requests[2].body.as_ref().unwrap();
        assert_eq!(series["format"], "time_series");
        assert!(series.get("tableType").is_none());
        assert_eq!(series["timeRange"]["semantic"], "L6H");
    }

    #[tokio::test]
    async fn one_failing_sub_batch_leaves_others_intact() {
        let fetcher = Arc::new(MockFetcher::default());
        fetcher.respond("querydata-timeseries", StatusCode::OK, json!([[]]));
        // No response registered for the table call: the mock refuses it.
        let src = source(DataSourceConfig::new("https://calm"), fetcher);

        let results = src
            .query_all(&six_hours(vec![panel("A", Format::Timeseries), panel("B", Format::Table)]))
            .await;

        assert_eq!(results.len(), 2);
        let failed: Vec<_> = results.iter().filter_map(|r| r.error.as_ref()).collect();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].status, 0);
        assert_eq!(failed[0].status_text, "Network Error");
        let ok = results.iter().find(|r| r.error.is_none()).unwrap();
        assert_eq!(ok.series().next().unwrap().name, "query A");
    }

    #[tokio::test]
    async fn variables_are_expanded_into_filters() {
        let fetcher = Arc::new(MockFetcher::default());
        fetcher.respond("querydata-timeseries", StatusCode::OK, json!([[]]));
        let src = source(DataSourceConfig::new("https://calm"), fetcher.clone());

        let mut query = panel("A", Format::Timeseries);
        query.data_provider_filters = vec![crate::domain::query::dto::panel_query::DataProviderFilter {
            key: SelectableValue::of("service"),
            values: vec![SelectableValue::of("$svc")],
            ..Default::default()
        }];
        let mut req = six_hours(vec![query]);
        req.scoped_vars
            .insert("svc".into(), ScopedVar { text: None, value: json!(["S1", "S2"]) });

        src.query_all(&req).await;
        let body = fetcher.recorded()[0].body.clone().unwrap();
        assert_eq!(body["queries"][0]["filters"][0]["values"], json!(["S1", "S2"]));
    }

    #[tokio::test]
    async fn csrf_token_is_stored_and_sent() {
        let fetcher = Arc::new(MockFetcher::default());
        let mut headers = HeaderMap::new();
        headers.insert(CSRF_TOKEN_HEADER, HeaderValue::from_static("tok-1"));
        fetcher.respond_with_headers("https://frun/dp", StatusCode::OK, headers, Value::Null);

        let mut cfg = DataSourceConfig::new("https://frun/dp");
        cfg.is_frun = true;
        let src = source(cfg, fetcher.clone());
        src.refresh_csrf_token().await;

        assert_eq!(src.headers().await[CSRF_TOKEN_HEADER], "tok-1");
        let fetch_call = fetcher
            .recorded()
            .into_iter()
            .find(|r| r.headers.get(CSRF_TOKEN_HEADER).is_some_and(|v| v == "fetch"));
        assert!(fetch_call.is_some());
    }

    #[tokio::test]
    async fn csrf_failure_is_not_fatal() {
        let fetcher = Arc::new(MockFetcher::default());
        let mut cfg = DataSourceConfig::new("https://frun/dp");
        cfg.is_frun = true;
        let src = source(cfg, fetcher);
        src.refresh_csrf_token().await;
        assert!(src.headers().await.get(CSRF_TOKEN_HEADER).is_none());
    }

    #[tokio::test]
    async fn connectivity_check_requires_200() {
        let fetcher = Arc::new(MockFetcher::default());
        fetcher.respond("/providers", StatusCode::OK, json!([]));
        let src = source(DataSourceConfig::new("https://calm"), fetcher.clone());
        assert_eq!(src.test_datasource().await.unwrap().status, "success");

        fetcher.respond("/providers", StatusCode::FORBIDDEN, Value::Null);
        let status = src.test_datasource().await.unwrap();
        assert_eq!(status.status, "error");
        assert_eq!(status.message, "Data source is not working: Forbidden");
    }

    #[tokio::test]
    async fn unreachable_service_is_a_failed_check() {
        let fetcher = Arc::new(MockFetcher::default());
        let src = source(DataSourceConfig::new("https://calm"), fetcher);

        let status = src.test_datasource().await.unwrap();
        assert_eq!(
            status,
            ConnectionStatus {
                status: "error".into(),
                message: "Data source is not working: connection refused".into(),
                title: "Error".into(),
            }
        );
    }
}

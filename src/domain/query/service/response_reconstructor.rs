//! Turns `/providers/data` responses into host-ready frames.

use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};

use super::diagnostics::{Diagnostics, CORRELATION_ID_HEADER};
use super::series_completion::{
    complete_with_fill, progress_last_point, sort_points, ReconstructionSettings, MAX_GRID_POINTS,
};
use crate::core::client::fetcher::FetchResponse;
use crate::domain::query::dto::result_frame::{
    Frame, QueryError, QueryErrorData, QueryResult, ResultColumn, ResultSeries, ResultTable,
    SeriesPoint,
};
use crate::domain::query::dto::wire_request::RequestFragment;
use crate::domain::query::dto::wire_response::{
    wire_number, wire_timestamp_millis, RawSeries, RawTable,
};

const FILL_VALUE: f64 = 0.0;
const TIME_COLUMN: &str = "time";

pub struct ResponseReconstructor {
    settings: ReconstructionSettings,
}

impl ResponseReconstructor {
    pub fn new(settings: ReconstructionSettings) -> Self {
        Self { settings }
    }

    /// One or more series per query, aligned with `queries` by position.
    pub fn reconstruct_time_series(
        &self,
        queries: &[RequestFragment],
        response: FetchResponse,
    ) -> QueryResult {
        let mut diagnostics = Diagnostics::from_response(&response, &self.settings.timezone);
        let body = self.decode::<Vec<Option<Vec<Option<RawSeries>>>>>(response, &mut diagnostics);
        let body = match body {
            Ok(body) => body,
            Err(error) => return with_diagnostics(queries, diagnostics, Vec::new(), Some(error)),
        };

        debug!(
            resolution = self.settings.resolution.as_code(),
            period = %self.settings.selected_period,
            queries = queries.len(),
            "Reconstructing time series"
        );

        let mut body = body.into_iter();
        let mut frames = Vec::new();
        for query in queries {
            let returned: Vec<RawSeries> = body
                .next()
                .flatten()
                .unwrap_or_default()
                .into_iter()
                .flatten()
                .collect();
            let single = returned.len() == 1;
            if returned.is_empty() {
                frames.push(Frame::Series(placeholder_series(query)));
                continue;
            }
            for raw in returned {
                let series = self.build_series(query, raw, single, &mut diagnostics);
                frames.push(Frame::Series(series));
            }
        }

        with_diagnostics(queries, diagnostics, frames, None)
    }

    /// One table per query, aligned with `queries` by position.
    pub fn reconstruct_tables(
        &self,
        queries: &[RequestFragment],
        response: FetchResponse,
    ) -> QueryResult {
        let mut diagnostics = Diagnostics::from_response(&response, &self.settings.timezone);
        let body = match self.decode::<Vec<Option<RawTable>>>(response, &mut diagnostics) {
            Ok(body) => body,
            Err(error) => return with_diagnostics(queries, diagnostics, Vec::new(), Some(error)),
        };

        let mut body = body.into_iter();
        let frames = queries
            .iter()
            .map(|query| {
                let raw = body.next().flatten().unwrap_or_default();
                Frame::Table(self.build_table(query, raw))
            })
            .collect();

        with_diagnostics(queries, diagnostics, frames, None)
    }

    fn build_series(
        &self,
        query: &RequestFragment,
        raw: RawSeries,
        single: bool,
        diagnostics: &mut Diagnostics,
    ) -> ResultSeries {
        let tz = &self.settings.timezone;
        let mut points: Vec<SeriesPoint> = raw
            .data_points
            .iter()
            .map(|p| SeriesPoint(wire_number(&p.0), wire_timestamp_millis(&p.1, tz)))
            .collect();

        sort_points(&mut points);
        if self.settings.progress_last_data_point {
            progress_last_point(&mut points, &self.settings);
        }
        if self.settings.complete_series_with_zeros && single {
            let filled = complete_with_fill(points, &self.settings, FILL_VALUE);
            if filled.truncated {
                diagnostics.push_warning(&format!(
                    "Series '{}' was filled with zeros for its first {} buckets only",
                    raw.serie_name, MAX_GRID_POINTS
                ));
            }
            points = filled.points;
        }

        let labels: BTreeMap<String, String> = raw
            .attributes
            .iter()
            .map(|a| (a.key.clone(), a.value_string()))
            .collect();

        ResultSeries {
            ref_id: query.ref_id.clone(),
            name: raw.serie_name,
            labels,
            points,
        }
    }

    fn build_table(&self, query: &RequestFragment, raw: RawTable) -> ResultTable {
        let time_columns: Vec<usize> = raw
            .columns
            .iter()
            .enumerate()
            .filter(|(_, c)| c.column_type == TIME_COLUMN)
            .map(|(i, _)| i)
            .collect();

        let rows = raw
            .rows
            .into_iter()
            .map(|mut row| {
                for &i in &time_columns {
                    if let Some(cell) = row.get_mut(i) {
                        *cell = wire_timestamp_millis(cell, &self.settings.timezone)
                            .map(Value::from)
                            .unwrap_or(Value::Null);
                    }
                }
                row
            })
            .collect();

        let name = raw
            .name
            .filter(|n| !n.is_empty())
            .or_else(|| (!query.name.is_empty()).then(|| query.name.clone()));

        ResultTable {
            ref_id: query.ref_id.clone(),
            name,
            columns: raw
                .columns
                .into_iter()
                .map(|c| ResultColumn {
                    text: c.text,
                    column_type: c.column_type,
                })
                .collect(),
            rows,
        }
    }

    /// Body of a successful response, or the query error describing the failure.
    fn decode<T: DeserializeOwned>(
        &self,
        response: FetchResponse,
        diagnostics: &mut Diagnostics,
    ) -> Result<T, QueryError> {
        if !response.is_success() || has_remote_error(&response.data) {
            let error = error_from_response(&response);
            warn!(
                status = error.status,
                "Analytics service reported an error: {}", error.data.message
            );
            diagnostics.push_error(&error.data.message);
            return Err(error);
        }

        let status = response.status.as_u16();
        let status_text = response.status_text.clone();
        serde_json::from_value::<T>(response.data).map_err(|e| {
            let message = format!("Unexpected response format: {}", e);
            warn!("{}", message);
            diagnostics.push_error(&message);
            QueryError {
                data: QueryErrorData {
                    message,
                    error: None,
                },
                status,
                status_text,
            }
        })
    }
}

fn has_remote_error(data: &Value) -> bool {
    data.get("error").is_some_and(|e| !e.is_null())
}

fn text_of(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// Maps a failed response to the host's query-error shape, quoting the
/// correlation id when the service sent one.
pub fn error_from_response(response: &FetchResponse) -> QueryError {
    let error = text_of(response.data.get("error"));
    let mut message = text_of(response.data.get("message"))
        .or_else(|| error.clone())
        .unwrap_or_else(|| format!("Error {}: {}", response.status.as_u16(), response.status_text));

    if let Some(id) = response.header_str(CORRELATION_ID_HEADER) {
        message = format!("{} (correlation id: {})", message, id);
    }

    QueryError {
        data: QueryErrorData { message, error },
        status: response.status.as_u16(),
        status_text: response.status_text.clone(),
    }
}

fn placeholder_series(query: &RequestFragment) -> ResultSeries {
    ResultSeries {
        ref_id: query.ref_id.clone(),
        name: query.name.clone(),
        labels: BTreeMap::new(),
        points: Vec::new(),
    }
}

/// Prepends the diagnostics frame (if any) to the reconstructed frames.
fn with_diagnostics(
    queries: &[RequestFragment],
    diagnostics: Diagnostics,
    frames: Vec<Frame>,
    error: Option<QueryError>,
) -> QueryResult {
    let mut data = Vec::with_capacity(frames.len() + 1);
    if !diagnostics.is_empty() {
        let ref_id = queries.first().map(|q| q.ref_id.as_str()).unwrap_or_default();
        data.push(Frame::Table(diagnostics.into_table(ref_id)));
    }
    data.extend(frames);
    QueryResult { data, error }
}

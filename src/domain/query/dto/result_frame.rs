//! Host-ready results: labeled series and typed tables.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// `[value, epochMillis]`; a `None` time marks an unreadable timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SeriesPoint(pub Option<f64>, pub Option<i64>);

impl SeriesPoint {
    pub fn new(value: f64, time: i64) -> Self {
        Self(Some(value), Some(time))
    }

    pub fn value(&self) -> Option<f64> {
        self.0
    }

    pub fn time(&self) -> Option<i64> {
        self.1
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultSeries {
    pub ref_id: String,
    pub name: String,
    pub labels: BTreeMap<String, String>,
    #[serde(rename = "datapoints")]
    pub points: Vec<SeriesPoint>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultColumn {
    pub text: String,
    #[serde(rename = "type")]
    pub column_type: String,
}

impl ResultColumn {
    pub fn new(text: &str, column_type: &str) -> Self {
        Self {
            text: text.to_string(),
            column_type: column_type.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultTable {
    pub ref_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub columns: Vec<ResultColumn>,
    pub rows: Vec<Vec<Value>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Frame {
    Series(ResultSeries),
    Table(ResultTable),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryErrorData {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Failure of one sub-batch, rendered by the host as the query-error state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryError {
    pub data: QueryErrorData,
    pub status: u16,
    pub status_text: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    pub data: Vec<Frame>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<QueryError>,
}

impl QueryResult {
    pub fn series(&self) -> impl Iterator<Item = &ResultSeries> {
        self.data.iter().filter_map(|f| match f {
            Frame::Series(s) => Some(s),
            Frame::Table(_) => None,
        })
    }

    pub fn tables(&self) -> impl Iterator<Item = &ResultTable> {
        self.data.iter().filter_map(|f| match f {
            Frame::Table(t) => Some(t),
            Frame::Series(_) => None,
        })
    }
}

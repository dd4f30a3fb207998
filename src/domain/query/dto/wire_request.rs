//! Request body of `POST /providers/data`.

use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;

use super::provider_dto::RequestFilter;
use crate::domain::common::model::{AggrMethod, FirstDayOfWeek, Resolution};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestMetric {
    pub measure: String,
    pub method: Option<AggrMethod>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RequestColumns {
    pub dimensions: Vec<String>,
    pub metrics: Vec<RequestMetric>,
}

/// Wire form of one panel query.
#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestFragment {
    pub ref_id: String,
    pub name: String,
    pub provider: String,
    /// Absent means latest.
    pub version: Option<String>,
    pub columns: RequestColumns,
    pub filters: Vec<RequestFilter>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WireFormat {
    #[serde(rename = "time_series")]
    TimeSeries,
    #[serde(rename = "table")]
    Table,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireTimeRange {
    /// Semantic period code (`L2H`), empty when the range is absolute.
    pub semantic: String,
    pub from: String,
    pub to: String,
}

/// Settings shared by every sub-batch of one query cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestEnvelope {
    pub timestamp_format: String,
    pub time_range: WireTimeRange,
    pub resolution: Resolution,
    pub timezone: String,
    pub first_week_day: FirstDayOfWeek,
}

#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataRequestBody {
    pub format: WireFormat,
    #[serde(flatten)]
    pub envelope: RequestEnvelope,
    pub table_type: Option<String>,
    pub queries: Vec<RequestFragment>,
}

//! Response shapes of `POST /providers/data`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::util::timestamp_codec::{TimeZoneSpec, TimestampCodec};

/// Timestamp as sent by the service: epoch millis (number or numeric
/// string) or a 14-digit wall-clock string. `None` when unreadable.
pub fn wire_timestamp_millis(raw: &Value, tz: &TimeZoneSpec) -> Option<i64> {
    match raw {
        Value::Number(n) => n.as_f64().filter(|f| f.is_finite()).map(|f| f as i64),
        Value::String(s) => {
            let s = s.trim();
            if s.len() == 14 && s.bytes().all(|b| b.is_ascii_digit()) {
                TimestampCodec::parse_to_epoch_millis(s, Some(tz))
            } else {
                s.parse::<f64>().ok().filter(|f| f.is_finite()).map(|f| f as i64)
            }
        }
        _ => None,
    }
}

/// Numeric value of a wire cell; strings holding numbers are accepted.
pub fn wire_number(raw: &Value) -> Option<f64> {
    match raw {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RawAttribute {
    pub key: String,
    pub value: Value,
}

impl RawAttribute {
    pub fn value_string(&self) -> String {
        match &self.value {
            Value::String(s) => s.clone(),
            Value::Null => String::new(),
            other => other.to_string(),
        }
    }
}

/// `[value, timestamp]` pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawDataPoint(pub Value, pub Value);

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawSeries {
    pub serie_name: String,
    pub attributes: Vec<RawAttribute>,
    pub data_points: Vec<RawDataPoint>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RawColumn {
    #[serde(alias = "TEXT")]
    pub text: String,
    #[serde(rename = "type", alias = "TYPE")]
    pub column_type: String,
}

/// Table payload; the service uses either upper- or lower-case keys.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RawTable {
    #[serde(alias = "NAME")]
    pub name: Option<String>,
    #[serde(alias = "COLUMNS")]
    pub columns: Vec<RawColumn>,
    #[serde(alias = "ROWS")]
    pub rows: Vec<Vec<Value>>,
}

/// Entry of the log-messages response header.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LogMessage {
    pub time: Value,
    pub content: String,
    #[serde(rename = "type")]
    pub kind: String,
}

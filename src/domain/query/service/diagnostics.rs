use chrono::Utc;
use serde_json::{json, Value};
use tracing::warn;

use crate::core::client::fetcher::FetchResponse;
use crate::core::util::timestamp_codec::TimeZoneSpec;
use crate::domain::query::dto::result_frame::{ResultColumn, ResultTable};
use crate::domain::query::dto::wire_response::{wire_timestamp_millis, LogMessage};

/// Response header carrying `[{time, content, type}]` messages.
pub const LOG_MESSAGES_HEADER: &str = "x-log-messages";
pub const CORRELATION_ID_HEADER: &str = "x-correlation-id";

pub const DIAGNOSTICS_FRAME_NAME: &str = "Logs";

fn level_for(kind: &str) -> &'static str {
    match kind {
        "W" => "warn",
        "E" => "error",
        _ => "info",
    }
}

/// Rows collected from a response before they become a table frame.
#[derive(Debug, Default)]
pub struct Diagnostics {
    rows: Vec<Vec<Value>>,
}

impl Diagnostics {
    /// Reads the log-messages header; an unreadable header is ignored.
    pub fn from_response(response: &FetchResponse, tz: &TimeZoneSpec) -> Self {
        let mut diagnostics = Self::default();
        let Some(raw) = response.header_str(LOG_MESSAGES_HEADER) else {
            return diagnostics;
        };
        match serde_json::from_str::<Vec<LogMessage>>(raw) {
            Ok(messages) => {
                for m in messages {
                    let time = wire_timestamp_millis(&m.time, tz).map(Value::from);
                    diagnostics.push(time.unwrap_or(Value::Null), &m.content, level_for(&m.kind));
                }
            }
            Err(e) => warn!("Ignoring malformed {} header: {}", LOG_MESSAGES_HEADER, e),
        }
        diagnostics
    }

    pub fn push_error(&mut self, message: &str) {
        self.push(json!(Utc::now().timestamp_millis()), message, "error");
    }

    pub fn push_warning(&mut self, message: &str) {
        self.push(json!(Utc::now().timestamp_millis()), message, "warn");
    }

    fn push(&mut self, time: Value, content: &str, level: &str) {
        self.rows.push(vec![time, json!(content), json!(level)]);
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn into_table(self, ref_id: &str) -> ResultTable {
        ResultTable {
            ref_id: ref_id.to_string(),
            name: Some(DIAGNOSTICS_FRAME_NAME.to_string()),
            columns: vec![
                ResultColumn::new("time", "time"),
                ResultColumn::new("content", "string"),
                ResultColumn::new("level", "string"),
            ],
            rows: self.rows,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::{HeaderMap, HeaderValue, StatusCode};

    fn response_with_header(value: &str) -> FetchResponse {
        let mut headers = HeaderMap::new();
        headers.insert(LOG_MESSAGES_HEADER, HeaderValue::from_str(value).unwrap());
        FetchResponse {
            status: StatusCode::OK,
            status_text: "OK".into(),
            headers,
            data: Value::Null,
        }
    }

    #[test]
    fn maps_message_types_to_levels() {
        let resp = response_with_header(
            concat!(
                r#"[{"time":"19700101000001","content":"slow","type":"W"},"#,
                r#"{"time":1000,"content":"boom","type":"E"},"#,
                r#"{"time":1000,"content":"hello","type":"I"}]"#
            ),
        );
        let table = Diagnostics::from_response(&resp, &TimeZoneSpec::Utc).into_table("A");
        let levels: Vec<_> = table.rows.iter().map(|r| r[2].clone()).collect();
        assert_eq!(levels, vec![json!("warn"), json!("error"), json!("info")]);
        assert_eq!(table.rows[0][0], json!(1000));
        assert_eq!(table.name.as_deref(), Some("Logs"));
    }

    #[test]
    fn malformed_header_yields_nothing() {
        let resp = response_with_header("not json");
        assert!(Diagnostics::from_response(&resp, &TimeZoneSpec::Utc).is_empty());
    }
}

//! Shared domain types (Resolution, Format, FirstDayOfWeek, etc.)

use chrono::{Duration, Weekday};
use serde::{Deserialize, Serialize};

/// Time bucket granularity understood by the analytics service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Resolution {
    #[default]
    #[serde(rename = "H")]
    Hour,
    #[serde(rename = "D")]
    Day,
    #[serde(rename = "W")]
    Week,
    #[serde(rename = "M")]
    Month,
    #[serde(rename = "Y")]
    Year,
    #[serde(rename = "R")]
    Raw,
    #[serde(rename = "P")]
    Period,
    #[serde(rename = "10S")]
    Sec10,
    #[serde(rename = "15S")]
    Sec15,
    #[serde(rename = "1Mi")]
    Min1,
    #[serde(rename = "5Mi")]
    Min5,
    #[serde(rename = "10Mi")]
    Min10,
    #[serde(rename = "15Mi")]
    Min15,
    #[serde(rename = "30Mi")]
    Min30,
}

impl Resolution {
    pub fn as_code(&self) -> &'static str {
        match self {
            Resolution::Hour => "H",
            Resolution::Day => "D",
            Resolution::Week => "W",
            Resolution::Month => "M",
            Resolution::Year => "Y",
            Resolution::Raw => "R",
            Resolution::Period => "P",
            Resolution::Sec10 => "10S",
            Resolution::Sec15 => "15S",
            Resolution::Min1 => "1Mi",
            Resolution::Min5 => "5Mi",
            Resolution::Min10 => "10Mi",
            Resolution::Min15 => "15Mi",
            Resolution::Min30 => "30Mi",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code.trim() {
            "H" => Some(Resolution::Hour),
            "D" => Some(Resolution::Day),
            "W" => Some(Resolution::Week),
            "M" => Some(Resolution::Month),
            "Y" => Some(Resolution::Year),
            "R" => Some(Resolution::Raw),
            "P" => Some(Resolution::Period),
            "10S" => Some(Resolution::Sec10),
            "15S" => Some(Resolution::Sec15),
            "1Mi" => Some(Resolution::Min1),
            "5Mi" => Some(Resolution::Min5),
            "10Mi" => Some(Resolution::Min10),
            "15Mi" => Some(Resolution::Min15),
            "30Mi" => Some(Resolution::Min30),
            _ => None,
        }
    }

    /// Fixed duration of one bucket.
    ///
    /// Month and Year are approximations (30 and 365 days); raw and period
    /// buckets have no natural width and count as one minute.
    pub fn step(&self) -> Duration {
        match self {
            Resolution::Hour => Duration::hours(1),
            Resolution::Day => Duration::days(1),
            Resolution::Week => Duration::days(7),
            Resolution::Month => Duration::days(30),
            Resolution::Year => Duration::days(365),
            Resolution::Sec10 => Duration::seconds(10),
            Resolution::Sec15 => Duration::seconds(15),
            Resolution::Min1 => Duration::minutes(1),
            Resolution::Min5 => Duration::minutes(5),
            Resolution::Min10 => Duration::minutes(10),
            Resolution::Min15 => Duration::minutes(15),
            Resolution::Min30 => Duration::minutes(30),
            Resolution::Raw | Resolution::Period => Duration::minutes(1),
        }
    }

    pub fn step_millis(&self) -> i64 {
        self.step().num_milliseconds()
    }
}

/// Result shape requested by a panel query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    #[default]
    Timeseries,
    Table,
    #[serde(rename = "rawtable")]
    RawTable,
    #[serde(rename = "lasttable")]
    LastTable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AggrMethod {
    Avg,
    Min,
    Max,
    Sum,
    Percent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterType {
    Measure,
    Dimension,
    Attribute,
}

/// Day a week bucket starts on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum FirstDayOfWeek {
    #[serde(rename = "SA")]
    Saturday,
    #[serde(rename = "SU")]
    Sunday,
    #[default]
    #[serde(rename = "MO")]
    Monday,
}

impl FirstDayOfWeek {
    pub fn as_code(&self) -> &'static str {
        match self {
            FirstDayOfWeek::Saturday => "SA",
            FirstDayOfWeek::Sunday => "SU",
            FirstDayOfWeek::Monday => "MO",
        }
    }

    pub fn weekday(&self) -> Weekday {
        match self {
            FirstDayOfWeek::Saturday => Weekday::Sat,
            FirstDayOfWeek::Sunday => Weekday::Sun,
            FirstDayOfWeek::Monday => Weekday::Mon,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolution_codes_match_wire_names() {
        for res in [
            Resolution::Hour,
            Resolution::Raw,
            Resolution::Sec15,
            Resolution::Min30,
        ] {
            let json = serde_json::to_value(res).unwrap();
            assert_eq!(json, serde_json::json!(res.as_code()));
            assert_eq!(Resolution::from_code(res.as_code()), Some(res));
        }
        assert_eq!(Resolution::from_code("X"), None);
    }

    #[test]
    fn format_deserializes_ui_values() {
        let f: Format = serde_json::from_str("\"rawtable\"").unwrap();
        assert_eq!(f, Format::RawTable);
        let f: Format = serde_json::from_str("\"timeseries\"").unwrap();
        assert_eq!(f, Format::Timeseries);
    }

    #[test]
    fn unknown_resolutions_step_by_one_minute() {
        assert_eq!(Resolution::Raw.step_millis(), 60_000);
        assert_eq!(Resolution::Week.step_millis(), 7 * 86_400_000);
    }
}

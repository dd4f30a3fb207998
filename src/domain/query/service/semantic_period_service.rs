//! Compact "semantic period" codes (`L2H`, `C1D`) for relative time ranges.
//!
//! The analytics service understands rolling windows natively: `L<n><unit>`
//! covers the last `n` units, `C<n><unit>` the current one. Relative ranges
//! typed in the time picker are mapped onto these codes; anything that does not
//! fit (absolute instants, future offsets, multi-unit offsets) has no code.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::domain::common::model::Resolution;
use crate::domain::query::dto::panel_query::RawTimeRange;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeriodPrefix {
    Last,
    Current,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeriodUnit {
    Minute,
    Hour,
    Day,
    Week,
    Month,
    Year,
}

impl PeriodUnit {
    /// Time-picker unit suffix; unknown suffixes count as minutes.
    pub fn from_suffix(suffix: &str) -> Self {
        match suffix {
            "h" => PeriodUnit::Hour,
            "d" => PeriodUnit::Day,
            "w" => PeriodUnit::Week,
            "M" => PeriodUnit::Month,
            "y" => PeriodUnit::Year,
            _ => PeriodUnit::Minute,
        }
    }

    pub fn as_code(&self) -> &'static str {
        match self {
            PeriodUnit::Minute => "Mi",
            PeriodUnit::Hour => "H",
            PeriodUnit::Day => "D",
            PeriodUnit::Week => "W",
            PeriodUnit::Month => "M",
            PeriodUnit::Year => "Y",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SemanticPeriod {
    pub prefix: PeriodPrefix,
    pub magnitude: u32,
    pub unit: PeriodUnit,
}

impl fmt::Display for SemanticPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let prefix = match self.prefix {
            PeriodPrefix::Last => 'L',
            PeriodPrefix::Current => 'C',
        };
        write!(f, "{}{}{}", prefix, self.magnitude, self.unit.as_code())
    }
}

/// Resolution-specific rewrite applied after a period has been parsed.
pub trait PeriodRestriction: Send + Sync {
    fn restrict(&self, period: SemanticPeriod) -> SemanticPeriod;
}

/// Caps a period to at most `max` units of `unit`; other units collapse to the cap.
#[derive(Debug, Clone, Copy)]
pub struct MaxWindowRestriction {
    pub max: u32,
    pub unit: PeriodUnit,
}

impl PeriodRestriction for MaxWindowRestriction {
    fn restrict(&self, period: SemanticPeriod) -> SemanticPeriod {
        if period.unit != self.unit || period.magnitude > self.max {
            SemanticPeriod {
                prefix: period.prefix,
                magnitude: self.max,
                unit: self.unit,
            }
        } else {
            period
        }
    }
}

/// Raw data is only served for two hours at most.
pub const RAW_WINDOW: MaxWindowRestriction = MaxWindowRestriction {
    max: 2,
    unit: PeriodUnit::Hour,
};

/// `now[-<n><unit>][/<unit>]`
#[derive(Debug, PartialEq, Eq)]
struct RelativeExpr<'a> {
    offset: Option<(u32, &'a str)>,
    floor: Option<&'a str>,
}

fn parse_relative(expr: &str) -> Option<RelativeExpr<'_>> {
    let expr = expr.trim();
    if expr.contains('+') {
        return None;
    }
    let (head, floor) = match expr.split_once('/') {
        Some((head, floor)) => (head, Some(floor)),
        None => (expr, None),
    };
    if let Some(floor) = floor {
        if floor.is_empty() || !floor.chars().all(|c| c.is_ascii_alphabetic()) {
            return None;
        }
    }

    let rest = head.strip_prefix("now")?;
    if rest.is_empty() {
        return Some(RelativeExpr { offset: None, floor });
    }

    let offset = rest.strip_prefix('-')?;
    let split = offset.find(|c: char| !c.is_ascii_digit())?;
    let (digits, unit) = offset.split_at(split);
    if digits.is_empty() || unit.is_empty() || !unit.chars().all(|c| c.is_ascii_alphabetic()) {
        return None;
    }
    let magnitude = digits.parse().ok()?;
    Some(RelativeExpr {
        offset: Some((magnitude, unit)),
        floor,
    })
}

/// Encodes relative ranges as semantic periods, with per-resolution restrictions.
#[derive(Clone)]
pub struct SemanticPeriodEngine {
    restrictions: HashMap<Resolution, Arc<dyn PeriodRestriction>>,
}

impl Default for SemanticPeriodEngine {
    fn default() -> Self {
        Self::unrestricted().with_restriction(Resolution::Raw, RAW_WINDOW)
    }
}

impl SemanticPeriodEngine {
    pub fn unrestricted() -> Self {
        Self {
            restrictions: HashMap::new(),
        }
    }

    pub fn with_restriction(
        mut self,
        resolution: Resolution,
        restriction: impl PeriodRestriction + 'static,
    ) -> Self {
        self.restrictions.insert(resolution, Arc::new(restriction));
        self
    }

    pub fn parse(&self, raw: &RawTimeRange, resolution: Resolution) -> Option<SemanticPeriod> {
        if !raw.is_relative() {
            return None;
        }
        let to = parse_relative(&raw.to)?;
        let from = parse_relative(&raw.from)?;

        let prefix = match (to.offset, from.offset) {
            (Some((1, _)), _) => PeriodPrefix::Last,
            (Some(_), _) => return None,
            (None, Some(_)) => PeriodPrefix::Last,
            (None, None) => PeriodPrefix::Current,
        };

        let (magnitude, unit) = match from.offset {
            Some((n, suffix)) => (n, PeriodUnit::from_suffix(suffix)),
            None => {
                let unit = to
                    .floor
                    .or(from.floor)
                    .map(PeriodUnit::from_suffix)
                    .unwrap_or(PeriodUnit::Hour);
                (1, unit)
            }
        };
        if magnitude == 0 {
            return None;
        }

        let period = SemanticPeriod {
            prefix,
            magnitude,
            unit,
        };
        Some(match self.restrictions.get(&resolution) {
            Some(restriction) => restriction.restrict(period),
            None => period,
        })
    }

    /// Period code for the range, empty when the range has none.
    pub fn encode(&self, raw: &RawTimeRange, resolution: Resolution) -> String {
        self.parse(raw, resolution)
            .map(|p| p.to_string())
            .unwrap_or_default()
    }
}

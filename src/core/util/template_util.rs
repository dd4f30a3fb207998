//! Template-variable substitution for filter and drilldown values.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Variable value as provided by the dashboard (`text` for display, `value`
/// a string, number or list for multi-value variables).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScopedVar {
    #[serde(default)]
    pub text: Option<Value>,
    #[serde(default)]
    pub value: Value,
}

pub type ScopedVars = HashMap<String, ScopedVar>;

/// Host capability expanding `$var` style references.
pub trait VariableInterpolator: Send + Sync {
    /// Expands every variable in `target`; multi-value variables are joined with commas.
    fn interpolate_csv(&self, target: &str, scoped_vars: &ScopedVars) -> String;
}

static VARIABLE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$(\w+)|\$\{(\w+)(?::\w+)?\}|\[\[(\w+)\]\]|\{\{\s*(\w+)\s*\}\}")
        .expect("variable pattern is valid")
});

/// Interpolator reading from the request's scoped variables plus a set of
/// instance-wide variables. Unknown references are left untouched.
#[derive(Debug, Clone, Default)]
pub struct ScopedVariableInterpolator {
    globals: ScopedVars,
}

impl ScopedVariableInterpolator {
    pub fn new(globals: ScopedVars) -> Self {
        Self { globals }
    }

    fn lookup<'a>(&'a self, name: &str, scoped_vars: &'a ScopedVars) -> Option<&'a ScopedVar> {
        scoped_vars.get(name).or_else(|| self.globals.get(name))
    }
}

impl VariableInterpolator for ScopedVariableInterpolator {
    fn interpolate_csv(&self, target: &str, scoped_vars: &ScopedVars) -> String {
        VARIABLE_PATTERN
            .replace_all(target, |caps: &Captures| {
                let name = (1..=4)
                    .find_map(|i| caps.get(i))
                    .map(|m| m.as_str())
                    .unwrap_or_default();
                match self.lookup(name, scoped_vars) {
                    Some(var) => csv_value(&var.value),
                    None => caps[0].to_string(),
                }
            })
            .into_owned()
    }
}

fn csv_value(value: &Value) -> String {
    match value {
        Value::Array(items) => items.iter().map(csv_value).collect::<Vec<_>>().join(","),
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// True when `value` must go through variable expansion.
pub fn is_variable_reference(value: &str) -> bool {
    value.starts_with('$') || value.starts_with("{{")
}

/// Expands a possibly-variable value into its discrete values.
pub fn expand_values(
    value: &str,
    scoped_vars: &ScopedVars,
    interpolator: &dyn VariableInterpolator,
) -> Vec<String> {
    if is_variable_reference(value) {
        interpolator
            .interpolate_csv(value, scoped_vars)
            .split(',')
            .map(str::to_string)
            .collect()
    } else {
        vec![value.to_string()]
    }
}

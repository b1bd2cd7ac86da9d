//! Tracer configuration as accepted over RPC.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ApiError, Result};

/// Per-request tracer configuration.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TraceConfig {
    /// Collector name or inline script source.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tracer: Option<String>,
    /// Execution budget, Go duration syntax (`500ms`, `5s`, `1m30s`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<String>,
    /// Wrap results in the Parity nested schema.
    #[serde(default, alias = "nestedOutput")]
    pub nested_trace_output: bool,
    /// Historical re-execution depth, passed through to the executor.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reexec: Option<u64>,
}

impl TraceConfig {
    #[must_use]
    pub fn with_tracer(mut self, tracer: impl Into<String>) -> Self {
        self.tracer = Some(tracer.into());
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: impl Into<String>) -> Self {
        self.timeout = Some(timeout.into());
        self
    }

    #[must_use]
    pub const fn nested(mut self, nested: bool) -> Self {
        self.nested_trace_output = nested;
        self
    }

    /// Parsed execution budget.
    pub fn timeout(&self) -> Result<Option<Duration>> {
        self.timeout
            .as_deref()
            .map(|raw| {
                parse_duration(raw).map_err(|reason| ApiError::InvalidTimeout {
                    value: raw.to_string(),
                    reason,
                })
            })
            .transpose()
    }
}

/// Configuration for `trace_call`-style entry points.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TraceCallConfig {
    #[serde(flatten)]
    pub trace: TraceConfig,
    /// Account overrides, passed through to the executor untouched.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state_overrides: Option<Value>,
}

impl From<TraceConfig> for TraceCallConfig {
    fn from(trace: TraceConfig) -> Self {
        Self {
            trace,
            state_overrides: None,
        }
    }
}

/// Longest duration Go accepts: `i64::MAX` nanoseconds, about 292 years.
pub const MAX_DURATION: Duration = Duration::from_nanos(9_223_372_036_854_775_807);

/// Parse a Go-style duration such as `300ms`, `1.5s` or `1h2m`.
///
/// Totals above [`MAX_DURATION`] are rejected.
pub fn parse_duration(input: &str) -> std::result::Result<Duration, String> {
    let mut rest = input.trim();
    if rest.is_empty() {
        return Err("empty duration".to_string());
    }
    if rest == "0" {
        return Ok(Duration::ZERO);
    }

    let mut secs = 0f64;
    while !rest.is_empty() {
        let num_end = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(rest.len());
        if num_end == 0 {
            return Err(format!("expected a number at '{rest}'"));
        }
        let number: f64 = rest[..num_end]
            .parse()
            .map_err(|_| format!("bad number '{}'", &rest[..num_end]))?;
        rest = &rest[num_end..];

        let unit_end = rest
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(rest.len());
        let scale = match &rest[..unit_end] {
            "ns" => 1e-9,
            "us" | "µs" => 1e-6,
            "ms" => 1e-3,
            "s" => 1.0,
            "m" => 60.0,
            "h" => 3600.0,
            "" => return Err(format!("missing unit in '{input}'")),
            unit => return Err(format!("unknown unit '{unit}'")),
        };
        secs += number * scale;
        rest = &rest[unit_end..];
    }
    let duration = Duration::try_from_secs_f64(secs).map_err(|e| e.to_string())?;
    if duration > MAX_DURATION {
        return Err(format!("duration '{input}' out of range"));
    }
    Ok(duration)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("5s"), Ok(Duration::from_secs(5)));
        assert_eq!(parse_duration("500ms"), Ok(Duration::from_millis(500)));
        assert_eq!(parse_duration("1m30s"), Ok(Duration::from_secs(90)));
        assert_eq!(parse_duration("1.5s"), Ok(Duration::from_millis(1500)));
        assert_eq!(parse_duration("0"), Ok(Duration::ZERO));
        assert!(parse_duration("").is_err());
        assert!(parse_duration("5").unwrap_err().contains("missing unit"));
        assert!(parse_duration("3d").unwrap_err().contains("unknown unit"));
        assert!(parse_duration("-1s").is_err());
    }

    #[test]
    fn test_parse_duration_range() {
        assert_eq!(parse_duration("2562047h"), Ok(Duration::from_secs(2_562_047 * 3600)));
        assert!(
            parse_duration("10000000000000000000s")
                .unwrap_err()
                .contains("out of range")
        );
        assert!(parse_duration("2562048h").is_err());
    }

    #[test]
    fn test_wire_names() {
        let config: TraceCallConfig = serde_json::from_value(json!({
            "tracer": "stateDiffTracer",
            "timeout": "10s",
            "nestedTraceOutput": true,
            "stateOverrides": { "0x00": {} }
        }))
        .unwrap();
        assert_eq!(config.trace.tracer.as_deref(), Some("stateDiffTracer"));
        assert!(config.trace.nested_trace_output);
        assert_eq!(config.trace.timeout().unwrap(), Some(Duration::from_secs(10)));
        assert!(config.state_overrides.is_some());

        let alias: TraceConfig = serde_json::from_value(json!({ "nestedOutput": true })).unwrap();
        assert!(alias.nested_trace_output);
        assert!(alias.tracer.is_none());
    }

    #[test]
    fn test_invalid_timeout() {
        let config = TraceConfig::default().with_timeout("soon");
        let err = config.timeout().unwrap_err();
        assert!(matches!(err, ApiError::InvalidTimeout { value, .. } if value == "soon"));
    }
}

//! Telemetry state and the wire record it is refreshed from.

use crate::error::{BikeError, Result};
use serde::{Deserialize, Serialize};

/// Current power (watts) and cadence (rpm) of the bike.
///
/// Always replaced as a pair; never patched field by field.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TelemetryStats {
    pub power: f64,
    pub cadence: f64,
}

impl TelemetryStats {
    pub fn new(power: f64, cadence: f64) -> Self {
        Self { power, cadence }
    }
}

/// Body of `GET /metrics`: `{"power": <number>, "cadence": <number>}`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricsSample {
    pub power: f64,
    pub cadence: f64,
}

impl MetricsSample {
    /// Parse a response body. Anything but an object with two numeric
    /// fields is a malformed response.
    pub fn parse(body: &str) -> Result<Self> {
        let value: serde_json::Value = serde_json::from_str(body)
            .map_err(|e| BikeError::MalformedResponse(e.to_string()))?;
        // Derived struct deserialization also accepts arrays.
        if !value.is_object() {
            return Err(BikeError::MalformedResponse(format!(
                "expected a JSON object, got {}",
                value
            )));
        }
        let sample: MetricsSample = serde_json::from_value(value)
            .map_err(|e| BikeError::MalformedResponse(e.to_string()))?;
        sample.validate()?;
        Ok(sample)
    }

    /// Both fields must be finite and non-negative.
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [("power", self.power), ("cadence", self.cadence)] {
            if !value.is_finite() || value < 0.0 {
                return Err(BikeError::InvalidSample(format!("{} = {}", name, value)));
            }
        }
        Ok(())
    }
}

impl From<MetricsSample> for TelemetryStats {
    fn from(sample: MetricsSample) -> Self {
        Self {
            power: sample.power,
            cadence: sample.cadence,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid_body() {
        let sample = MetricsSample::parse(r#"{"power":200,"cadence":90}"#).unwrap();
        assert_eq!(sample, MetricsSample { power: 200.0, cadence: 90.0 });
        assert_eq!(TelemetryStats::from(sample), TelemetryStats::new(200.0, 90.0));
    }

    #[test]
    fn test_parse_ignores_extra_fields() {
        let sample = MetricsSample::parse(r#"{"power":1.5,"cadence":2,"hr":120}"#).unwrap();
        assert_eq!(sample.power, 1.5);
    }

    #[test]
    fn test_parse_empty_body_is_malformed() {
        let err = MetricsSample::parse("").unwrap_err();
        assert!(matches!(err, BikeError::MalformedResponse(_)));
    }

    #[test]
    fn test_parse_missing_field_is_malformed() {
        let err = MetricsSample::parse(r#"{"power":200}"#).unwrap_err();
        assert!(matches!(err, BikeError::MalformedResponse(_)));
    }

    #[test]
    fn test_parse_non_numeric_field_is_malformed() {
        let err = MetricsSample::parse(r#"{"power":"fast","cadence":90}"#).unwrap_err();
        assert!(matches!(err, BikeError::MalformedResponse(_)));
    }

    #[test]
    fn test_parse_non_object_is_malformed() {
        assert!(MetricsSample::parse("[200, 90]").is_err());
        assert!(MetricsSample::parse("null").is_err());
    }

    #[test]
    fn test_negative_value_rejected() {
        let err = MetricsSample::parse(r#"{"power":-5,"cadence":90}"#).unwrap_err();
        assert!(matches!(err, BikeError::InvalidSample(_)));
    }

    #[test]
    fn test_stats_serialize_shape() {
        let json = serde_json::to_value(TelemetryStats::new(200.0, 90.0)).unwrap();
        assert_eq!(json, serde_json::json!({"power": 200.0, "cadence": 90.0}));
    }
}

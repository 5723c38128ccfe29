//! Prometheus HTTP API response decoding.
//!
//! Envelope: `{"status": "success"|"error", "data": {"resultType", "result"},
//! "errorType", "error"}`. Sample values arrive as decimal strings so that
//! `NaN` and `±Inf` survive JSON.

use aegis_core::{LabelSet, LabeledSample, MetricValue, MetricsError, Series, TimeSeriesPoint};
use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct Envelope {
    pub status: String,
    #[serde(default)]
    pub data: Option<ResultData>,
    #[serde(default)]
    pub error_type: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ResultData {
    pub result_type: String,
    pub result: Value,
}

#[derive(Debug, Deserialize)]
struct RawSample(f64, String);

#[derive(Debug, Deserialize)]
struct RawVectorEntry {
    #[serde(default)]
    metric: LabelSet,
    value: RawSample,
}

#[derive(Debug, Deserialize)]
struct RawMatrixEntry {
    #[serde(default)]
    metric: LabelSet,
    #[serde(default)]
    values: Vec<RawSample>,
}

fn invalid(reason: impl Into<String>) -> MetricsError {
    MetricsError::InvalidResponse {
        reason: reason.into(),
    }
}

fn point(raw: RawSample) -> Result<TimeSeriesPoint, MetricsError> {
    let value = parse_sample_value(&raw.1)?;
    Ok(TimeSeriesPoint::new(raw.0, value))
}

/// Parse a Prometheus sample value (`"1.5"`, `"NaN"`, `"+Inf"`, `"-Inf"`).
pub fn parse_sample_value(raw: &str) -> Result<f64, MetricsError> {
    raw.parse::<f64>()
        .map_err(|_| invalid(format!("sample value {:?} is not a number", raw)))
}

/// Decode a response body into a typed result.
pub fn decode_body(body: &str) -> Result<MetricValue, MetricsError> {
    let envelope: Envelope =
        serde_json::from_str(body).map_err(|e| invalid(format!("malformed envelope: {}", e)))?;
    decode_envelope(envelope)
}

pub(crate) fn decode_envelope(envelope: Envelope) -> Result<MetricValue, MetricsError> {
    if envelope.status != "success" {
        return Err(MetricsError::QueryFailed {
            error_type: envelope.error_type.unwrap_or_else(|| "unknown".to_string()),
            message: envelope.error.unwrap_or_else(|| envelope.status.clone()),
        });
    }

    let data = envelope.data.ok_or_else(|| invalid("missing data"))?;
    match data.result_type.as_str() {
        "scalar" => {
            let raw: RawSample = serde_json::from_value(data.result)
                .map_err(|e| invalid(format!("bad scalar: {}", e)))?;
            Ok(MetricValue::Scalar(point(raw)?))
        }
        "vector" => {
            let entries: Vec<RawVectorEntry> = serde_json::from_value(data.result)
                .map_err(|e| invalid(format!("bad vector: {}", e)))?;
            let samples = entries
                .into_iter()
                .map(|entry| {
                    Ok(LabeledSample {
                        labels: entry.metric,
                        point: point(entry.value)?,
                    })
                })
                .collect::<Result<Vec<_>, MetricsError>>()?;
            Ok(MetricValue::Vector(samples))
        }
        "matrix" => {
            let entries: Vec<RawMatrixEntry> = serde_json::from_value(data.result)
                .map_err(|e| invalid(format!("bad matrix: {}", e)))?;
            let series = entries
                .into_iter()
                .map(|entry| {
                    let points = entry
                        .values
                        .into_iter()
                        .map(point)
                        .collect::<Result<Vec<_>, MetricsError>>()?;
                    Ok(Series {
                        labels: entry.metric,
                        points,
                    })
                })
                .collect::<Result<Vec<_>, MetricsError>>()?;
            Ok(MetricValue::Matrix(series))
        }
        other => Err(MetricsError::UnexpectedResult {
            expected: "scalar, vector or matrix".to_string(),
            got: other.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_vector() {
        let body = r#"{"status":"success","data":{"resultType":"vector","result":[
            {"metric":{"__name__":"up","job":"node"},"value":[1700000000.123,"1"]}
        ]}}"#;
        let value = decode_body(body).unwrap();
        match value {
            MetricValue::Vector(samples) => {
                assert_eq!(samples.len(), 1);
                assert_eq!(samples[0].labels["job"], "node");
                assert_eq!(samples[0].point, TimeSeriesPoint::new(1700000000.123, 1.0));
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_decode_matrix() {
        let body = r#"{"status":"success","data":{"resultType":"matrix","result":[
            {"metric":{"instance":"a"},"values":[[10,"1.5"],[25,"2.5"]]},
            {"metric":{"instance":"b"},"values":[]}
        ]}}"#;
        let series = decode_body(body).unwrap().into_matrix().unwrap();
        assert_eq!(series.len(), 2);
        assert_eq!(
            series[0].points,
            vec![TimeSeriesPoint::new(10.0, 1.5), TimeSeriesPoint::new(25.0, 2.5)]
        );
        assert!(series[1].points.is_empty());
    }

    #[test]
    fn test_decode_scalar_and_special_values() {
        let body = r#"{"status":"success","data":{"resultType":"scalar","result":[5,"+Inf"]}}"#;
        assert_eq!(
            decode_body(body).unwrap(),
            MetricValue::Scalar(TimeSeriesPoint::new(5.0, f64::INFINITY))
        );
        assert!(parse_sample_value("NaN").unwrap().is_nan());
        assert_eq!(parse_sample_value("-Inf").unwrap(), f64::NEG_INFINITY);
        assert!(parse_sample_value("abc").is_err());
    }

    #[test]
    fn test_decode_error_status() {
        let body = r#"{"status":"error","errorType":"bad_data","error":"parse error at char 4"}"#;
        assert_eq!(
            decode_body(body).unwrap_err(),
            MetricsError::QueryFailed {
                error_type: "bad_data".to_string(),
                message: "parse error at char 4".to_string(),
            }
        );
    }

    #[test]
    fn test_decode_string_result_is_unexpected() {
        let body = r#"{"status":"success","data":{"resultType":"string","result":[1,"hello"]}}"#;
        assert!(matches!(
            decode_body(body),
            Err(MetricsError::UnexpectedResult { ref got, .. }) if got == "string"
        ));
    }

    #[test]
    fn test_decode_garbage() {
        assert!(matches!(
            decode_body("<html>502 Bad Gateway</html>"),
            Err(MetricsError::InvalidResponse { .. })
        ));
        assert!(matches!(
            decode_body(r#"{"status":"success"}"#),
            Err(MetricsError::InvalidResponse { .. })
        ));
    }
}

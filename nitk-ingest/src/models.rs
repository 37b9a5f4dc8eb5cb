//! Metric and result models
//!
//! A metric is either a single number or an ordered series of labelled band
//! values. Persisted rows, query responses and live payloads all carry the
//! same shape.

use chrono::{DateTime, Utc};
use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;

/// Kind tag stored in `processing_metrics.metric_type`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricType {
    Numeric,
    Spectrum,
}

impl MetricType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricType::Numeric => "numeric",
            MetricType::Spectrum => "spectrum",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "numeric" => Some(MetricType::Numeric),
            "spectrum" => Some(MetricType::Spectrum),
            _ => None,
        }
    }
}

/// One labelled band value; `None` means the band could not be computed
#[derive(Debug, Clone, PartialEq)]
pub struct SpectrumPoint {
    pub label: String,
    pub value: Option<f64>,
}

impl SpectrumPoint {
    pub fn new(label: impl Into<String>, value: Option<f64>) -> Self {
        Self {
            label: label.into(),
            value: value.and_then(finite),
        }
    }
}

/// Ordered spectrum, serialized as `{label: value}` in band order
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Spectrum(pub Vec<SpectrumPoint>);

impl Spectrum {
    pub fn get(&self, label: &str) -> Option<Option<f64>> {
        self.0.iter().find(|p| p.label == label).map(|p| p.value)
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|p| p.label.as_str())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Serialize for Spectrum {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(self.0.iter().map(|p| (&p.label, p.value)))
    }
}

/// A named metric ready for persistence
#[derive(Debug, Clone, PartialEq)]
pub enum Metric {
    Numeric { name: String, value: Option<f64> },
    Spectrum { name: String, points: Vec<SpectrumPoint> },
}

impl Metric {
    pub fn numeric(name: impl Into<String>, value: f64) -> Self {
        Metric::Numeric {
            name: name.into(),
            value: finite(value),
        }
    }

    pub fn spectrum(name: impl Into<String>, points: Vec<SpectrumPoint>) -> Self {
        Metric::Spectrum {
            name: name.into(),
            points,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Metric::Numeric { name, .. } | Metric::Spectrum { name, .. } => name,
        }
    }

    pub fn metric_type(&self) -> MetricType {
        match self {
            Metric::Numeric { .. } => MetricType::Numeric,
            Metric::Spectrum { .. } => MetricType::Spectrum,
        }
    }
}

/// `Some(v)` when `v` is finite; NaN and infinities have no JSON or REAL form
pub fn finite(v: f64) -> Option<f64> {
    v.is_finite().then_some(v)
}

/// Collapse a level series to the scalar stored per band: first element, or 0.0 when empty
pub fn scalar_from_series(series: &[f64]) -> f64 {
    series.first().copied().unwrap_or(0.0)
}

/// Metrics of a stored result, in insertion order
#[derive(Debug, Clone, PartialEq, Default)]
pub struct StoredMetrics {
    entries: Vec<StoredMetric>,
}

#[derive(Debug, Clone, PartialEq)]
enum StoredMetric {
    Numeric(String, Option<f64>),
    Spectrum(String, Spectrum),
}

impl StoredMetrics {
    pub fn push_numeric(&mut self, name: String, value: Option<f64>) {
        self.entries.push(StoredMetric::Numeric(name, value));
    }

    pub fn push_spectrum(&mut self, name: String, spectrum: Spectrum) {
        self.entries.push(StoredMetric::Spectrum(name, spectrum));
    }

    /// Numeric value by name; outer `None` when absent, inner when NULL
    pub fn numeric(&self, name: &str) -> Option<Option<f64>> {
        self.entries.iter().find_map(|e| match e {
            StoredMetric::Numeric(n, v) if n == name => Some(*v),
            _ => None,
        })
    }

    pub fn spectrum(&self, name: &str) -> Option<&Spectrum> {
        self.entries.iter().find_map(|e| match e {
            StoredMetric::Spectrum(n, s) if n == name => Some(s),
            _ => None,
        })
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| match e {
            StoredMetric::Numeric(n, _) | StoredMetric::Spectrum(n, _) => n.as_str(),
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Serialize for StoredMetrics {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for entry in &self.entries {
            match entry {
                StoredMetric::Numeric(name, value) => map.serialize_entry(name, value)?,
                StoredMetric::Spectrum(name, spectrum) => map.serialize_entry(name, spectrum)?,
            }
        }
        map.end()
    }
}

/// One persisted processing result with its metrics
#[derive(Debug, Clone, Serialize)]
pub struct StoredResult {
    pub id: i64,
    pub file_path: String,
    pub file_dir: String,
    pub file_name: String,
    pub timestamp: DateTime<Utc>,
    pub metrics: StoredMetrics,
}

/// Live message pushed to every subscriber after a successful save
#[derive(Debug, Clone, Serialize)]
pub struct LivePayload {
    pub file_path: String,
    pub sampling_rate: f64,
    pub duration: f64,
    pub channels: f64,
    pub leq: Option<f64>,
    pub laeq: Option<f64>,
    pub lceq: Option<f64>,
    pub peak_spl: Option<f64>,
    pub peak_aspl: Option<f64>,
    pub peak_cspl: Option<f64>,
    pub total_kurtosis: Option<f64>,
    pub a_weighted_kurtosis: Option<f64>,
    pub c_weighted_kurtosis: Option<f64>,
    pub frequency_spl: Spectrum,
    pub frequency_kurtosis: Spectrum,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_non_finite_values_become_none() {
        assert_eq!(finite(f64::NAN), None);
        assert_eq!(finite(f64::NEG_INFINITY), None);
        assert_eq!(finite(1.5), Some(1.5));
        assert_eq!(
            Metric::numeric("leq", f64::INFINITY),
            Metric::Numeric {
                name: "leq".to_string(),
                value: None
            }
        );
    }

    #[test]
    fn test_scalar_from_series() {
        assert_eq!(scalar_from_series(&[71.2, 70.9]), 71.2);
        assert_eq!(scalar_from_series(&[]), 0.0);
    }

    #[test]
    fn test_spectrum_serializes_in_band_order() {
        let spectrum = Spectrum(vec![
            SpectrumPoint::new("63 Hz", Some(3.1)),
            SpectrumPoint::new("125 Hz", None),
            SpectrumPoint::new("16000 Hz", Some(2.9)),
        ]);
        let json = serde_json::to_string(&spectrum).unwrap();
        assert_eq!(json, r#"{"63 Hz":3.1,"125 Hz":null,"16000 Hz":2.9}"#);
    }

    #[test]
    fn test_stored_metrics_flatten_to_one_object() {
        let mut metrics = StoredMetrics::default();
        metrics.push_numeric("leq".to_string(), Some(80.0));
        metrics.push_numeric("total_kurtosis".to_string(), None);
        metrics.push_spectrum(
            "frequency_spl".to_string(),
            Spectrum(vec![SpectrumPoint::new("63 Hz", Some(60.0))]),
        );

        let value = serde_json::to_value(&metrics).unwrap();
        assert_eq!(value["leq"], 80.0);
        assert!(value["total_kurtosis"].is_null());
        assert_eq!(value["frequency_spl"]["63 Hz"], 60.0);
        assert_eq!(metrics.numeric("total_kurtosis"), Some(None));
        assert_eq!(metrics.numeric("missing"), None);
    }

    #[test]
    fn test_metric_type_tags() {
        assert_eq!(MetricType::parse("numeric"), Some(MetricType::Numeric));
        assert_eq!(MetricType::Spectrum.as_str(), "spectrum");
        assert_eq!(MetricType::parse("vector"), None);
    }
}

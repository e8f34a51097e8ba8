use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::Deserialize;

/// Raw configuration document as it appears on disk. Unknown fields are
/// ignored; everything is optional here so that validation can produce
/// errors that name the violating field instead of serde's offsets.
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RawConfig {
    pub name: Option<String>,
    pub target_service_url: Option<String>,
    pub test_duration: Option<String>,
    pub traffic_pattern: Option<RawTrafficPattern>,
    pub thread_pool: Option<RawThreadPool>,
    pub request_templates: Vec<RawRequestTemplate>,
    pub parameter_sources: BTreeMap<String, RawParameterSource>,
    pub metrics: Option<RawMetricsOptions>,
    pub circuit_breaker: Option<RawCircuitBreaker>,
    pub request_timeout: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RawTrafficPattern {
    #[serde(rename = "type")]
    pub pattern_type: Option<String>,
    pub target_tps: Option<f64>,
    pub start_tps: Option<f64>,
    pub spike_tps: Option<f64>,
    pub spike_start_time: Option<String>,
    pub spike_duration: Option<String>,
    pub ramp_duration: Option<String>,
    pub pattern_file: Option<PathBuf>,
    pub time_in_milliseconds: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RawThreadPool {
    pub core_size: Option<usize>,
    pub max_size: Option<usize>,
    pub queue_size: Option<usize>,
    pub keep_alive_time: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RawRequestTemplate {
    pub name: Option<String>,
    pub weight: Option<u32>,
    pub method: Option<String>,
    pub url_template: Option<String>,
    pub headers: BTreeMap<String, String>,
    pub body_template: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RawParameterSource {
    #[serde(rename = "type")]
    pub source_type: Option<String>,
    pub distribution: Option<String>,
    pub range: Option<Vec<f64>>,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub mean: Option<f64>,
    pub stddev: Option<f64>,
    pub path: Option<PathBuf>,
    pub column: Option<String>,
    pub selection: Option<String>,
    pub max_lines: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RawMetricsOptions {
    pub response_time_percentiles: Option<Vec<f64>>,
    pub output_file: Option<String>,
    pub resource_monitoring: Option<RawResourceMonitoring>,
}

#[derive(Debug, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RawResourceMonitoring {
    pub enabled: bool,
    pub sample_interval: Option<String>,
}

impl Default for RawResourceMonitoring {
    fn default() -> Self {
        Self {
            enabled: true,
            sample_interval: None,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RawCircuitBreaker {
    pub enabled: bool,
    pub error_threshold: Option<f64>,
    pub window_size: Option<usize>,
}

impl Default for RawCircuitBreaker {
    fn default() -> Self {
        Self {
            enabled: true,
            error_threshold: None,
            window_size: None,
        }
    }
}

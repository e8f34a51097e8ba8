use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use reqwest::{Method, Url};

use crate::error::ConfigError;
use crate::params::{DEFAULT_MAX_LINES, FileSourceSpec, ParameterSource};
use crate::request::RequestTemplate;
use crate::traffic::{TrafficProfile, load_pattern_points};

use super::parse::parse_duration_value;
use super::types::{RawConfig, RawParameterSource, RawRequestTemplate, RawTrafficPattern};

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_CORE_SIZE: usize = 8;
const DEFAULT_MAX_SIZE: usize = 32;
const DEFAULT_QUEUE_SIZE: usize = 1000;
const DEFAULT_KEEP_ALIVE: Duration = Duration::from_secs(60);
const DEFAULT_BREAKER_THRESHOLD: f64 = 0.5;
const DEFAULT_BREAKER_WINDOW: usize = 100;
const DEFAULT_SAMPLE_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy)]
pub struct PoolConfig {
    pub core_size: usize,
    pub max_size: usize,
    pub queue_size: usize,
    pub keep_alive: Duration,
}

#[derive(Debug, Clone)]
pub struct MetricsOptions {
    pub percentiles: Vec<f64>,
    pub output_file: Option<String>,
    pub resource_monitoring: bool,
    pub sample_interval: Duration,
}

#[derive(Debug, Clone, Copy)]
pub struct BreakerSettings {
    pub error_threshold: f64,
    pub window_size: usize,
}

/// Fully validated, immutable description of one test run. Construction
/// is the only place configuration errors can arise; every subsystem
/// downstream trusts these invariants.
#[derive(Debug)]
pub struct TestSpec {
    pub name: String,
    pub base_url: Option<Url>,
    pub duration: Duration,
    pub profile: TrafficProfile,
    pub pool: PoolConfig,
    pub templates: Vec<RequestTemplate>,
    pub sources: BTreeMap<String, Arc<ParameterSource>>,
    pub metrics: MetricsOptions,
    pub breaker: Option<BreakerSettings>,
    pub request_timeout: Duration,
}

impl TestSpec {
    /// Validate a raw document. Relative file paths resolve against
    /// `base_dir` (the config file's directory).
    ///
    /// # Errors
    ///
    /// Returns an error naming the violating field for any invariant the
    /// document breaks.
    pub fn from_raw(raw: RawConfig, base_dir: &Path) -> Result<Self, ConfigError> {
        let name = raw
            .name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .ok_or(ConfigError::NameBlank)?
            .to_owned();

        let base_url = match raw.target_service_url.as_deref().map(str::trim) {
            Some(url) if !url.is_empty() => Some(parse_base_url(url)?),
            _ => None,
        };

        let duration = match raw.test_duration.as_deref() {
            Some(value) => parse_duration_value("testDuration", value)?,
            None => return Err(ConfigError::DurationMissing),
        };

        let profile = build_profile(
            raw.traffic_pattern.as_ref().ok_or(ConfigError::PatternMissing)?,
            base_dir,
        )?;

        let pool = build_pool(raw.thread_pool.as_ref())?;
        let templates = build_templates(&raw.request_templates)?;
        let sources = build_sources(&raw.parameter_sources, base_dir)?;

        let metrics = build_metrics(raw.metrics.as_ref())?;
        let breaker = build_breaker(raw.circuit_breaker.as_ref())?;

        let request_timeout = match raw.request_timeout.as_deref() {
            Some(value) => parse_duration_value("requestTimeout", value)?,
            None => DEFAULT_REQUEST_TIMEOUT,
        };

        Ok(Self {
            name,
            base_url,
            duration,
            profile,
            pool,
            templates,
            sources,
            metrics,
            breaker,
            request_timeout,
        })
    }
}

fn parse_base_url(url: &str) -> Result<Url, ConfigError> {
    // A trailing slash keeps Url::join from eating the last path
    // segment when templates use relative paths.
    let normalized = if url.ends_with('/') {
        url.to_owned()
    } else {
        format!("{}/", url)
    };
    Url::parse(&normalized).map_err(|err| ConfigError::InvalidTargetUrl { source: err })
}

fn build_profile(
    raw: &RawTrafficPattern,
    base_dir: &Path,
) -> Result<TrafficProfile, ConfigError> {
    let pattern_type = raw
        .pattern_type
        .as_deref()
        .map(str::trim)
        .unwrap_or_default()
        .to_ascii_lowercase();

    let target_tps = || {
        let tps = raw
            .target_tps
            .ok_or(ConfigError::PatternFieldMissing { field: "targetTps" })?;
        if tps > 0.0 {
            Ok(tps)
        } else {
            Err(ConfigError::PatternTpsNotPositive { field: "targetTps" })
        }
    };

    match pattern_type.as_str() {
        "stable" => Ok(TrafficProfile::Stable {
            target_tps: target_tps()?,
        }),
        "rampup" => {
            let start_tps = raw.start_tps.unwrap_or(0.0);
            if start_tps < 0.0 {
                return Err(ConfigError::PatternTpsNegative { field: "startTps" });
            }
            let ramp = raw
                .ramp_duration
                .as_deref()
                .ok_or(ConfigError::PatternFieldMissing {
                    field: "rampDuration",
                })
                .and_then(|value| parse_duration_value("trafficPattern.rampDuration", value))?;
            Ok(TrafficProfile::Ramp {
                start_tps,
                target_tps: target_tps()?,
                ramp,
            })
        }
        "spike" => {
            let spike_tps = raw
                .spike_tps
                .ok_or(ConfigError::PatternFieldMissing { field: "spikeTps" })?;
            if spike_tps < 0.0 {
                return Err(ConfigError::PatternTpsNegative { field: "spikeTps" });
            }
            let start = raw
                .spike_start_time
                .as_deref()
                .ok_or(ConfigError::PatternFieldMissing {
                    field: "spikeStartTime",
                })
                .and_then(|value| parse_duration_value("trafficPattern.spikeStartTime", value))?;
            let duration = raw
                .spike_duration
                .as_deref()
                .ok_or(ConfigError::PatternFieldMissing {
                    field: "spikeDuration",
                })
                .and_then(|value| parse_duration_value("trafficPattern.spikeDuration", value))?;
            Ok(TrafficProfile::Spike {
                base_tps: target_tps()?,
                spike_tps,
                start,
                duration,
            })
        }
        "custom" => {
            let path = raw
                .pattern_file
                .as_ref()
                .ok_or(ConfigError::PatternFileMissing)?;
            let resolved = resolve_path(base_dir, path);
            let points = load_pattern_points(&resolved, raw.time_in_milliseconds)?;
            Ok(TrafficProfile::Custom { points })
        }
        other => Err(ConfigError::UnknownPatternType {
            value: other.to_owned(),
        }),
    }
}

fn build_pool(raw: Option<&super::types::RawThreadPool>) -> Result<PoolConfig, ConfigError> {
    let core_size = raw.and_then(|pool| pool.core_size).unwrap_or(DEFAULT_CORE_SIZE);
    let max_size = raw
        .and_then(|pool| pool.max_size)
        .unwrap_or_else(|| core_size.max(DEFAULT_MAX_SIZE));
    let queue_size = raw
        .and_then(|pool| pool.queue_size)
        .unwrap_or(DEFAULT_QUEUE_SIZE);
    let keep_alive = match raw.and_then(|pool| pool.keep_alive_time.as_deref()) {
        Some(value) => parse_duration_value("threadPool.keepAliveTime", value)?,
        None => DEFAULT_KEEP_ALIVE,
    };

    if core_size < 1 {
        return Err(ConfigError::PoolCoreSizeZero);
    }
    if max_size < core_size {
        return Err(ConfigError::PoolMaxBelowCore);
    }
    Ok(PoolConfig {
        core_size,
        max_size,
        queue_size,
        keep_alive,
    })
}

fn build_templates(raw: &[RawRequestTemplate]) -> Result<Vec<RequestTemplate>, ConfigError> {
    if raw.is_empty() {
        return Err(ConfigError::NoRequestTemplates);
    }

    let mut templates = Vec::with_capacity(raw.len());
    for (index, entry) in raw.iter().enumerate() {
        let name = entry
            .name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .ok_or(ConfigError::TemplateNameBlank { index })?
            .to_owned();

        let weight = entry.weight.unwrap_or(1);
        if weight < 1 {
            return Err(ConfigError::TemplateWeightZero { index });
        }

        let method_text = entry.method.as_deref().unwrap_or("GET").trim();
        let method = Method::from_bytes(method_text.to_ascii_uppercase().as_bytes()).map_err(
            |_| ConfigError::TemplateInvalidMethod {
                index,
                value: method_text.to_owned(),
            },
        )?;

        let url = entry
            .url_template
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
            .ok_or(ConfigError::TemplateUrlBlank { index })?
            .to_owned();

        templates.push(RequestTemplate {
            name,
            weight,
            method,
            url,
            headers: entry
                .headers
                .iter()
                .map(|(header, value)| (header.clone(), value.clone()))
                .collect(),
            body: entry.body_template.clone(),
        });
    }
    Ok(templates)
}

fn build_sources(
    raw: &BTreeMap<String, RawParameterSource>,
    base_dir: &Path,
) -> Result<BTreeMap<String, Arc<ParameterSource>>, ConfigError> {
    let mut sources = BTreeMap::new();
    for (name, entry) in raw {
        let source = build_source(name, entry, base_dir)?;
        sources.insert(name.clone(), Arc::new(source));
    }
    Ok(sources)
}

fn build_source(
    name: &str,
    raw: &RawParameterSource,
    base_dir: &Path,
) -> Result<ParameterSource, ConfigError> {
    let source_type = raw
        .source_type
        .as_deref()
        .map(str::trim)
        .unwrap_or_default()
        .to_ascii_lowercase();

    let bound = |index: usize, field: Option<f64>| -> Option<f64> {
        field.or_else(|| raw.range.as_ref().and_then(|range| range.get(index).copied()))
    };

    match source_type.as_str() {
        "random" => {
            let distribution = raw
                .distribution
                .as_deref()
                .map(str::trim)
                .unwrap_or("uniform")
                .to_ascii_lowercase();
            let min = bound(0, raw.min);
            let max = bound(1, raw.max);
            match distribution.as_str() {
                "uniform" => {
                    let min = min.ok_or_else(|| ConfigError::SourceFieldMissing {
                        name: name.to_owned(),
                        field: "min",
                    })?;
                    let max = max.ok_or_else(|| ConfigError::SourceFieldMissing {
                        name: name.to_owned(),
                        field: "max",
                    })?;
                    ParameterSource::uniform_int(name, min.floor() as i64, max.floor() as i64)
                }
                "normal" => {
                    let mean = raw.mean.ok_or_else(|| ConfigError::SourceFieldMissing {
                        name: name.to_owned(),
                        field: "mean",
                    })?;
                    let stddev = raw.stddev.ok_or_else(|| ConfigError::SourceFieldMissing {
                        name: name.to_owned(),
                        field: "stddev",
                    })?;
                    let min = min.ok_or_else(|| ConfigError::SourceFieldMissing {
                        name: name.to_owned(),
                        field: "min",
                    })?;
                    let max = max.ok_or_else(|| ConfigError::SourceFieldMissing {
                        name: name.to_owned(),
                        field: "max",
                    })?;
                    ParameterSource::truncated_normal(name, mean, stddev, min, max)
                }
                other => Err(ConfigError::UnknownDistribution {
                    name: name.to_owned(),
                    value: other.to_owned(),
                }),
            }
        }
        "file" => {
            let path = raw.path.as_ref().ok_or_else(|| ConfigError::SourcePathMissing {
                name: name.to_owned(),
            })?;
            let mut spec = FileSourceSpec::new(name, resolve_path(base_dir, path));
            spec.column = raw.column.clone();
            spec.max_lines = raw.max_lines.unwrap_or(DEFAULT_MAX_LINES);

            let selection = raw
                .selection
                .as_deref()
                .map(str::trim)
                .unwrap_or("round-robin")
                .to_ascii_lowercase();
            match selection.as_str() {
                "round-robin" => ParameterSource::file_round_robin(&spec),
                "random" => ParameterSource::file_random(&spec),
                other => Err(ConfigError::UnknownSelection {
                    name: name.to_owned(),
                    value: other.to_owned(),
                }),
            }
        }
        other => Err(ConfigError::UnknownSourceType {
            name: name.to_owned(),
            value: other.to_owned(),
        }),
    }
}

fn build_metrics(
    raw: Option<&super::types::RawMetricsOptions>,
) -> Result<MetricsOptions, ConfigError> {
    let percentiles = raw
        .and_then(|metrics| metrics.response_time_percentiles.clone())
        .unwrap_or_default();
    for percentile in &percentiles {
        if !(*percentile > 0.0 && *percentile <= 100.0) {
            return Err(ConfigError::PercentileOutOfRange);
        }
    }

    let monitoring = raw.and_then(|metrics| metrics.resource_monitoring.as_ref());
    let resource_monitoring = monitoring.map_or(true, |section| section.enabled);
    let sample_interval = match monitoring.and_then(|section| section.sample_interval.as_deref()) {
        Some(value) => parse_duration_value("metrics.resourceMonitoring.sampleInterval", value)?,
        None => DEFAULT_SAMPLE_INTERVAL,
    };

    Ok(MetricsOptions {
        percentiles,
        output_file: raw.and_then(|metrics| metrics.output_file.clone()),
        resource_monitoring,
        sample_interval,
    })
}

fn build_breaker(
    raw: Option<&super::types::RawCircuitBreaker>,
) -> Result<Option<BreakerSettings>, ConfigError> {
    let Some(section) = raw else {
        return Ok(None);
    };
    if !section.enabled {
        return Ok(None);
    }

    let error_threshold = section.error_threshold.unwrap_or(DEFAULT_BREAKER_THRESHOLD);
    if !(0.0..=1.0).contains(&error_threshold) {
        return Err(ConfigError::BreakerThresholdOutOfRange);
    }
    let window_size = section.window_size.unwrap_or(DEFAULT_BREAKER_WINDOW);
    if window_size < 1 {
        return Err(ConfigError::BreakerWindowZero);
    }
    Ok(Some(BreakerSettings {
        error_threshold,
        window_size,
    }))
}

fn resolve_path(base_dir: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base_dir.join(path)
    }
}

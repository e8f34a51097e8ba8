use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config '{path}': {source}")]
    ReadConfig {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse JSON config '{path}': {source}")]
    ParseJson {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("Failed to parse TOML config '{path}': {source}")]
    ParseToml {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("Unsupported config extension '{ext}'. Use .json or .toml.")]
    UnsupportedExtension { ext: String },
    #[error("Config 'name' must not be blank.")]
    NameBlank,
    #[error("Config 'targetServiceUrl' is invalid: {source}")]
    InvalidTargetUrl {
        #[source]
        source: url::ParseError,
    },
    #[error("Config 'testDuration' is required.")]
    DurationMissing,
    #[error("Config '{field}' has invalid duration '{value}'.")]
    InvalidDuration { field: &'static str, value: String },
    #[error("Config '{field}' duration overflowed.")]
    DurationOverflow { field: &'static str },
    #[error("Config '{field}' must be > 0.")]
    DurationZero { field: &'static str },
    #[error("Config 'trafficPattern' is required.")]
    PatternMissing,
    #[error("Config 'trafficPattern.type' '{value}' is not one of stable, rampUp, spike, custom.")]
    UnknownPatternType { value: String },
    #[error("Config 'trafficPattern.{field}' is required.")]
    PatternFieldMissing { field: &'static str },
    #[error("Config 'trafficPattern.{field}' must be > 0.")]
    PatternTpsNotPositive { field: &'static str },
    #[error("Config 'trafficPattern.{field}' must not be negative.")]
    PatternTpsNegative { field: &'static str },
    #[error("Config 'trafficPattern.patternFile' is required for custom patterns.")]
    PatternFileMissing,
    #[error("Failed to read pattern file '{path}': {source}")]
    ReadPatternFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Pattern file '{path}' has no header row.")]
    PatternFileNoHeader { path: PathBuf },
    #[error("Pattern file '{path}' is missing a time or tps column.")]
    PatternFileMissingColumns { path: PathBuf },
    #[error("Pattern file '{path}' contains no valid rows.")]
    PatternFileEmpty { path: PathBuf },
    #[error("Config 'threadPool.coreSize' must be >= 1.")]
    PoolCoreSizeZero,
    #[error("Config 'threadPool.maxSize' must be >= coreSize.")]
    PoolMaxBelowCore,
    #[error("Config 'requestTemplates' must contain at least one template.")]
    NoRequestTemplates,
    #[error("Config 'requestTemplates[{index}].name' must not be blank.")]
    TemplateNameBlank { index: usize },
    #[error("Config 'requestTemplates[{index}].weight' must be >= 1.")]
    TemplateWeightZero { index: usize },
    #[error("Config 'requestTemplates[{index}].method' '{value}' is not a valid HTTP method.")]
    TemplateInvalidMethod { index: usize, value: String },
    #[error("Config 'requestTemplates[{index}].urlTemplate' must not be blank.")]
    TemplateUrlBlank { index: usize },
    #[error("Config 'parameterSources.{name}.type' '{value}' is not one of random, file.")]
    UnknownSourceType { name: String, value: String },
    #[error("Config 'parameterSources.{name}.distribution' '{value}' is not one of uniform, normal.")]
    UnknownDistribution { name: String, value: String },
    #[error("Config 'parameterSources.{name}.{field}' is required.")]
    SourceFieldMissing { name: String, field: &'static str },
    #[error("Config 'parameterSources.{name}' requires min <= max.")]
    SourceMinAboveMax { name: String },
    #[error("Config 'parameterSources.{name}.stddev' must be > 0.")]
    SourceStddevNotPositive { name: String },
    #[error("Config 'parameterSources.{name}' requires min < max.")]
    SourceRangeEmpty { name: String },
    #[error("Config 'parameterSources.{name}.path' is required for file sources.")]
    SourcePathMissing { name: String },
    #[error("Failed to read parameter file '{path}': {source}")]
    ReadParameterFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Parameter file '{path}' has no column '{column}'.")]
    ParameterColumnMissing { path: PathBuf, column: String },
    #[error("Parameter file '{path}' produced no values.")]
    ParameterFileEmpty { path: PathBuf },
    #[error("Config 'parameterSources.{name}.selection' '{value}' is not one of random, round-robin.")]
    UnknownSelection { name: String, value: String },
    #[error("Config 'circuitBreaker.errorThreshold' must be within [0, 1].")]
    BreakerThresholdOutOfRange,
    #[error("Config 'circuitBreaker.windowSize' must be >= 1.")]
    BreakerWindowZero,
    #[error("Config 'metrics.responseTimePercentiles' entries must be within (0, 100].")]
    PercentileOutOfRange,
}

use std::path::Path;

use crate::error::ConfigError;

use super::spec::TestSpec;
use super::types::RawConfig;

/// Read, parse, and validate a test specification. JSON is the primary
/// format; `.toml` documents are accepted with the same shape.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed, or if
/// validation rejects the document.
pub fn load_test_spec(path: &Path) -> Result<TestSpec, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|err| ConfigError::ReadConfig {
        path: path.to_path_buf(),
        source: err,
    })?;

    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .unwrap_or("json")
        .to_ascii_lowercase();

    let raw: RawConfig = match extension.as_str() {
        "json" => serde_json::from_str(&contents).map_err(|err| ConfigError::ParseJson {
            path: path.to_path_buf(),
            source: err,
        })?,
        "toml" => toml::from_str(&contents).map_err(|err| ConfigError::ParseToml {
            path: path.to_path_buf(),
            source: err,
        })?,
        other => {
            return Err(ConfigError::UnsupportedExtension {
                ext: other.to_owned(),
            });
        }
    };

    let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
    TestSpec::from_raw(raw, base_dir)
}

use std::path::PathBuf;

use tracing::warn;

use crate::error::ConfigError;

use super::DEFAULT_MAX_LINES;

/// Where and how to load file-backed parameter values.
#[derive(Debug, Clone)]
pub struct FileSourceSpec {
    pub name: String,
    pub path: PathBuf,
    pub column: Option<String>,
    pub max_lines: usize,
}

impl FileSourceSpec {
    #[must_use]
    pub fn new(name: &str, path: PathBuf) -> Self {
        Self {
            name: name.to_owned(),
            path,
            column: None,
            max_lines: DEFAULT_MAX_LINES,
        }
    }
}

/// Load parameter values once, up front. CSV files (by extension) are
/// read by named column or column 0; anything else is one value per
/// line. Blank lines are skipped, whitespace trimmed, and files longer
/// than `max_lines` are truncated with a warning.
///
/// # Errors
///
/// Returns an error if the file cannot be read, a named column is
/// missing, or no values remain after filtering.
pub fn load_values(spec: &FileSourceSpec) -> Result<Vec<String>, ConfigError> {
    let contents =
        std::fs::read_to_string(&spec.path).map_err(|err| ConfigError::ReadParameterFile {
            path: spec.path.clone(),
            source: err,
        })?;

    let is_csv = spec
        .path
        .extension()
        .map_or(false, |ext| ext.eq_ignore_ascii_case("csv"));

    let values = if is_csv {
        load_csv_values(spec, &contents)?
    } else {
        load_plain_values(spec, &contents)
    };

    if values.is_empty() {
        return Err(ConfigError::ParameterFileEmpty {
            path: spec.path.clone(),
        });
    }
    Ok(values)
}

fn load_plain_values(spec: &FileSourceSpec, contents: &str) -> Vec<String> {
    let mut values: Vec<String> = Vec::new();
    for line in contents.lines() {
        if values.len() >= spec.max_lines {
            warn_truncated(spec);
            break;
        }
        let trimmed = line.trim();
        if !trimmed.is_empty() {
            values.push(trimmed.to_owned());
        }
    }
    values
}

fn load_csv_values(spec: &FileSourceSpec, contents: &str) -> Result<Vec<String>, ConfigError> {
    let mut lines = contents.lines();

    let column_index = match spec.column.as_deref() {
        Some(column) => {
            let header = lines.next().unwrap_or_default();
            header
                .split(',')
                .position(|field| field.trim().eq_ignore_ascii_case(column))
                .ok_or_else(|| ConfigError::ParameterColumnMissing {
                    path: spec.path.clone(),
                    column: column.to_owned(),
                })?
        }
        None => 0,
    };

    let mut values: Vec<String> = Vec::new();
    for line in lines {
        if values.len() >= spec.max_lines {
            warn_truncated(spec);
            break;
        }
        if line.trim().is_empty() {
            continue;
        }
        let field = line
            .split(',')
            .nth(column_index)
            .map(str::trim)
            .unwrap_or_default();
        if !field.is_empty() {
            values.push(field.to_owned());
        }
    }
    Ok(values)
}

fn warn_truncated(spec: &FileSourceSpec) {
    warn!(
        "Parameter source '{}' exceeds {} lines; truncating '{}'.",
        spec.name,
        spec.max_lines,
        spec.path.display()
    );
}

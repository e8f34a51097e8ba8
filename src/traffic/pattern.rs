use std::path::Path;

use regex::Regex;
use tracing::warn;

use crate::error::ConfigError;

/// Load `(elapsed_ms, tps)` points for a custom profile from a CSV file.
///
/// The header must contain one column matching `/time|^t$/i` and one
/// matching `/tps|rate/i`. Malformed rows are skipped with a warning.
/// Times are seconds unless `times_in_millis` is set. Points come back
/// sorted by time.
///
/// # Errors
///
/// Returns an error if the file cannot be read, the header is missing a
/// required column, or no valid rows remain.
pub fn load_pattern_points(
    path: &Path,
    times_in_millis: bool,
) -> Result<Vec<(u64, f64)>, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|err| ConfigError::ReadPatternFile {
        path: path.to_path_buf(),
        source: err,
    })?;

    let mut lines = contents.lines();
    let header = lines.next().ok_or_else(|| ConfigError::PatternFileNoHeader {
        path: path.to_path_buf(),
    })?;

    let (time_idx, tps_idx) =
        locate_columns(header).ok_or_else(|| ConfigError::PatternFileMissingColumns {
            path: path.to_path_buf(),
        })?;

    let mut points: Vec<(u64, f64)> = Vec::new();
    for (line_no, line) in lines.enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        match parse_row(line, time_idx, tps_idx, times_in_millis) {
            Some(point) => points.push(point),
            None => {
                warn!(
                    "Skipping malformed pattern row {} in '{}': {}",
                    line_no.saturating_add(2),
                    path.display(),
                    line
                );
            }
        }
    }

    if points.is_empty() {
        return Err(ConfigError::PatternFileEmpty {
            path: path.to_path_buf(),
        });
    }

    points.sort_by_key(|&(time_ms, _)| time_ms);
    Ok(points)
}

fn locate_columns(header: &str) -> Option<(usize, usize)> {
    let time_re = Regex::new(r"(?i)time|^t$").ok()?;
    let tps_re = Regex::new(r"(?i)tps|rate").ok()?;

    let mut time_idx = None;
    let mut tps_idx = None;
    for (idx, column) in header.split(',').enumerate() {
        let column = column.trim();
        if time_idx.is_none() && time_re.is_match(column) {
            time_idx = Some(idx);
        } else if tps_idx.is_none() && tps_re.is_match(column) {
            tps_idx = Some(idx);
        }
    }
    time_idx.zip(tps_idx)
}

fn parse_row(
    line: &str,
    time_idx: usize,
    tps_idx: usize,
    times_in_millis: bool,
) -> Option<(u64, f64)> {
    let fields: Vec<&str> = line.split(',').map(str::trim).collect();
    let time: f64 = fields.get(time_idx)?.parse().ok()?;
    let tps: f64 = fields.get(tps_idx)?.parse().ok()?;
    if !time.is_finite() || !tps.is_finite() || time < 0.0 || tps < 0.0 {
        return None;
    }
    let time_ms = if times_in_millis {
        time
    } else {
        time * 1000.0
    };
    Some((time_ms.round() as u64, tps))
}

mod file;


use std::sync::atomic::{AtomicUsize, Ordering};

use rand::Rng;
use rand_distr::{Distribution, Normal};

use crate::error::ConfigError;

pub use file::{FileSourceSpec, load_values};

pub const DEFAULT_MAX_LINES: usize = 100_000;

/// A named, thread-safe generator of one string value per call.
#[derive(Debug)]
pub enum ParameterSource {
    UniformInt {
        min: i64,
        max: i64,
    },
    TruncatedNormal {
        mean: f64,
        stddev: f64,
        min: f64,
        max: f64,
        whole: bool,
    },
    FileRoundRobin {
        values: Vec<String>,
        cursor: AtomicUsize,
    },
    FileRandom {
        values: Vec<String>,
    },
}

impl ParameterSource {
    /// # Errors
    ///
    /// Returns an error if `min > max`.
    pub fn uniform_int(name: &str, min: i64, max: i64) -> Result<Self, ConfigError> {
        if min > max {
            return Err(ConfigError::SourceMinAboveMax {
                name: name.to_owned(),
            });
        }
        Ok(Self::UniformInt { min, max })
    }

    /// # Errors
    ///
    /// Returns an error if `stddev <= 0` or `min >= max`.
    pub fn truncated_normal(
        name: &str,
        mean: f64,
        stddev: f64,
        min: f64,
        max: f64,
    ) -> Result<Self, ConfigError> {
        if !(stddev > 0.0) {
            return Err(ConfigError::SourceStddevNotPositive {
                name: name.to_owned(),
            });
        }
        if !(min < max) {
            return Err(ConfigError::SourceRangeEmpty {
                name: name.to_owned(),
            });
        }
        Ok(Self::TruncatedNormal {
            mean,
            stddev,
            min,
            max,
            whole: mean.fract() == 0.0 && stddev.fract() == 0.0,
        })
    }

    /// # Errors
    ///
    /// Returns an error if the backing file cannot be read or yields no
    /// values.
    pub fn file_round_robin(spec: &FileSourceSpec) -> Result<Self, ConfigError> {
        Ok(Self::FileRoundRobin {
            values: load_values(spec)?,
            cursor: AtomicUsize::new(0),
        })
    }

    /// # Errors
    ///
    /// Returns an error if the backing file cannot be read or yields no
    /// values.
    pub fn file_random(spec: &FileSourceSpec) -> Result<Self, ConfigError> {
        Ok(Self::FileRandom {
            values: load_values(spec)?,
        })
    }

    /// Produce the next value. Safe to call from any thread.
    #[must_use]
    pub fn next(&self) -> String {
        match *self {
            Self::UniformInt { min, max } => {
                rand::thread_rng().gen_range(min..=max).to_string()
            }
            Self::TruncatedNormal {
                mean,
                stddev,
                min,
                max,
                whole,
            } => {
                let value = sample_truncated(mean, stddev, min, max);
                if whole {
                    format!("{:.0}", value)
                } else {
                    format!("{:.1}", value)
                }
            }
            Self::FileRoundRobin {
                ref values,
                ref cursor,
            } => {
                let len = values.len().max(1);
                let index = cursor
                    .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |current| {
                        Some(current.saturating_add(1).checked_rem(len).unwrap_or(0))
                    })
                    .unwrap_or(0);
                values.get(index).cloned().unwrap_or_default()
            }
            Self::FileRandom { ref values } => {
                if values.is_empty() {
                    return String::new();
                }
                let index = rand::thread_rng().gen_range(0..values.len());
                values.get(index).cloned().unwrap_or_default()
            }
        }
    }
}

fn sample_truncated(mean: f64, stddev: f64, min: f64, max: f64) -> f64 {
    let Ok(normal) = Normal::new(mean, stddev) else {
        return min;
    };
    let mut rng = rand::thread_rng();
    // Rejection sampling; the range was validated non-empty at
    // construction so this terminates with overwhelming probability. The
    // iteration cap guards degenerate mean/stddev pairs.
    for _ in 0..10_000 {
        let draw = normal.sample(&mut rng);
        if draw >= min && draw < max {
            return draw;
        }
    }
    min
}

use std::sync::Arc;

use regex::Regex;
use reqwest::header::HeaderMap;

/// A single predicate over (status, headers, body).
#[derive(Clone)]
pub enum ValidationRule {
    StatusRange { lo: u16, hi: u16 },
    BodyContains { fragment: String },
    BodyMatches { pattern: Regex },
    HeaderEquals { name: String, value: String },
    BodySizeRange { lo: usize, hi: usize },
    Custom {
        description: String,
        check: Arc<dyn Fn(u16, &HeaderMap, &str) -> bool + Send + Sync>,
    },
}

impl std::fmt::Debug for ValidationRule {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.kind())
    }
}

impl ValidationRule {
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match *self {
            Self::StatusRange { .. } => "status-range",
            Self::BodyContains { .. } => "body-contains",
            Self::BodyMatches { .. } => "body-matches",
            Self::HeaderEquals { .. } => "header-equals",
            Self::BodySizeRange { .. } => "body-size",
            Self::Custom { .. } => "custom",
        }
    }

    fn check(&self, status: u16, headers: &HeaderMap, body: &str) -> Result<(), String> {
        match *self {
            Self::StatusRange { lo, hi } => {
                if status >= lo && status <= hi {
                    Ok(())
                } else {
                    Err(format!("status {} outside [{}, {}]", status, lo, hi))
                }
            }
            Self::BodyContains { ref fragment } => {
                if body.contains(fragment.as_str()) {
                    Ok(())
                } else {
                    Err(format!("body does not contain '{}'", fragment))
                }
            }
            Self::BodyMatches { ref pattern } => {
                if pattern.is_match(body) {
                    Ok(())
                } else {
                    Err(format!("body does not match /{}/", pattern.as_str()))
                }
            }
            Self::HeaderEquals {
                ref name,
                ref value,
            } => {
                let actual = headers
                    .get(name.as_str())
                    .and_then(|header| header.to_str().ok());
                if actual == Some(value.as_str()) {
                    Ok(())
                } else {
                    Err(format!(
                        "header '{}' is {:?}, expected '{}'",
                        name, actual, value
                    ))
                }
            }
            Self::BodySizeRange { lo, hi } => {
                let size = body.len();
                if size >= lo && size <= hi {
                    Ok(())
                } else {
                    Err(format!("body size {} outside [{}, {}]", size, lo, hi))
                }
            }
            Self::Custom {
                ref description,
                ref check,
            } => {
                if check(status, headers, body) {
                    Ok(())
                } else {
                    Err(description.clone())
                }
            }
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ValidationOutcome {
    pub ok: bool,
    pub failures: Vec<(&'static str, String)>,
}

/// An optional, composable pipeline of response rules. When absent,
/// success is defined purely by a 2xx status.
#[derive(Debug, Clone, Default)]
pub struct ResponseValidator {
    rules: Vec<ValidationRule>,
}

impl ResponseValidator {
    #[must_use]
    pub fn new(rules: Vec<ValidationRule>) -> Self {
        Self { rules }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Run every rule; failures accumulate rather than short-circuit so
    /// the error report names each violated rule.
    #[must_use]
    pub fn validate(&self, status: u16, headers: &HeaderMap, body: &str) -> ValidationOutcome {
        let mut failures: Vec<(&'static str, String)> = Vec::new();
        for rule in &self.rules {
            if let Err(description) = rule.check(status, headers, body) {
                failures.push((rule.kind(), description));
            }
        }
        ValidationOutcome {
            ok: failures.is_empty(),
            failures,
        }
    }
}

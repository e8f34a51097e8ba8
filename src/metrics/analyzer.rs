use std::collections::VecDeque;

use crate::util::epoch_ms;

/// Per-key sample retention bound.
const MAX_SAMPLES_PER_KEY: usize = 100;
/// How many recent samples each report entry carries.
const REPORT_SAMPLES: usize = 3;
/// Error-body text kept per sample; responses are truncated, not stored
/// whole.
const MAX_BODY_CHARS: usize = 2048;

#[derive(Debug, Clone)]
pub struct ResponseErrorSample {
    pub timestamp_ms: u64,
    pub status: u16,
    pub body: String,
}

#[derive(Debug, Clone)]
pub struct ExceptionSample {
    pub timestamp_ms: u64,
    pub message: String,
}

#[derive(Debug, Default)]
struct StatusEntry {
    status: u16,
    count: u64,
    samples: VecDeque<ResponseErrorSample>,
}

#[derive(Debug, Default)]
struct ExceptionEntry {
    kind: String,
    count: u64,
    samples: VecDeque<ExceptionSample>,
}

/// Bounded samples of error responses (status >= 400 only) and
/// transport exceptions, grouped by status code and exception kind.
/// Entries keep insertion order so report ties break deterministically.
#[derive(Debug, Default)]
pub struct ErrorAnalyzer {
    statuses: Vec<StatusEntry>,
    exceptions: Vec<ExceptionEntry>,
}

impl ErrorAnalyzer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_error_response(&mut self, status: u16, body: &str) {
        let entry = match self.statuses.iter_mut().find(|entry| entry.status == status) {
            Some(entry) => entry,
            None => {
                self.statuses.push(StatusEntry {
                    status,
                    ..StatusEntry::default()
                });
                match self.statuses.last_mut() {
                    Some(entry) => entry,
                    None => return,
                }
            }
        };
        entry.count = entry.count.saturating_add(1);
        if entry.samples.len() >= MAX_SAMPLES_PER_KEY {
            entry.samples.pop_front();
        }
        entry.samples.push_back(ResponseErrorSample {
            timestamp_ms: epoch_ms(),
            status,
            body: truncate(body),
        });
    }

    pub fn record_exception(&mut self, kind: &str, message: &str) {
        let entry = match self.exceptions.iter_mut().find(|entry| entry.kind == kind) {
            Some(entry) => entry,
            None => {
                self.exceptions.push(ExceptionEntry {
                    kind: kind.to_owned(),
                    ..ExceptionEntry::default()
                });
                match self.exceptions.last_mut() {
                    Some(entry) => entry,
                    None => return,
                }
            }
        };
        entry.count = entry.count.saturating_add(1);
        if entry.samples.len() >= MAX_SAMPLES_PER_KEY {
            entry.samples.pop_front();
        }
        entry.samples.push_back(ExceptionSample {
            timestamp_ms: epoch_ms(),
            message: truncate(message),
        });
    }

    /// Top-N status codes and exception kinds by count (ties keep
    /// insertion order), each with its most recent samples, newest
    /// first.
    #[must_use]
    pub fn report(&self, top_n: usize) -> ErrorReport {
        let mut statuses: Vec<StatusErrorSummary> = self
            .statuses
            .iter()
            .map(|entry| StatusErrorSummary {
                status: entry.status,
                count: entry.count,
                recent: recent_of(&entry.samples),
            })
            .collect();
        statuses.sort_by(|left, right| right.count.cmp(&left.count));
        statuses.truncate(top_n);

        let mut exceptions: Vec<ExceptionSummary> = self
            .exceptions
            .iter()
            .map(|entry| ExceptionSummary {
                kind: entry.kind.clone(),
                count: entry.count,
                recent: recent_of(&entry.samples),
            })
            .collect();
        exceptions.sort_by(|left, right| right.count.cmp(&left.count));
        exceptions.truncate(top_n);

        ErrorReport {
            statuses,
            exceptions,
        }
    }

    pub fn reset(&mut self) {
        self.statuses.clear();
        self.exceptions.clear();
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.statuses.is_empty() && self.exceptions.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct StatusErrorSummary {
    pub status: u16,
    pub count: u64,
    pub recent: Vec<ResponseErrorSample>,
}

#[derive(Debug, Clone)]
pub struct ExceptionSummary {
    pub kind: String,
    pub count: u64,
    pub recent: Vec<ExceptionSample>,
}

#[derive(Debug, Clone, Default)]
pub struct ErrorReport {
    pub statuses: Vec<StatusErrorSummary>,
    pub exceptions: Vec<ExceptionSummary>,
}

impl ErrorReport {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.statuses.is_empty() && self.exceptions.is_empty()
    }
}

fn recent_of<T: Clone>(samples: &VecDeque<T>) -> Vec<T> {
    samples
        .iter()
        .rev()
        .take(REPORT_SAMPLES)
        .cloned()
        .collect()
}

fn truncate(text: &str) -> String {
    if text.len() <= MAX_BODY_CHARS {
        return text.to_owned();
    }
    let mut cut = MAX_BODY_CHARS;
    while cut > 0 && !text.is_char_boundary(cut) {
        cut = cut.saturating_sub(1);
    }
    text.get(..cut).unwrap_or_default().to_owned()
}

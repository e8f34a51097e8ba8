use thiserror::Error;

/// Failures while turning a template into a concrete HTTP request.
///
/// These never abort a run: the owning worker records the unit as
/// skipped and moves on.
#[derive(Debug, Error)]
pub enum GenerateError {
    #[error("No request templates available for selection.")]
    NoTemplates,
    #[error("Rendered URL '{url}' is invalid: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
    #[error("Header name '{name}' is invalid.")]
    InvalidHeaderName { name: String },
    #[error("Header '{name}' has a non-printable value after substitution.")]
    InvalidHeaderValue { name: String },
    #[error("Failed to build request for template '{template}': {source}")]
    BuildRequestFailed {
        template: String,
        #[source]
        source: reqwest::Error,
    },
}

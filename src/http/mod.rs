pub mod rate;


use std::time::Duration;

use reqwest::Client;

use crate::error::HttpError;

pub use rate::RateRegulator;

/// Build the shared HTTP client. The client-level timeout is the
/// per-request hard cap; workers add their own guard on top so a stalled
/// body read cannot outlive the cap either.
///
/// # Errors
///
/// Returns an error if the underlying client cannot be constructed.
pub fn build_client(request_timeout: Duration) -> Result<Client, HttpError> {
    Client::builder()
        .timeout(request_timeout)
        .connect_timeout(request_timeout.min(Duration::from_secs(10)))
        .build()
        .map_err(|err| HttpError::BuildClientFailed { source: err })
}

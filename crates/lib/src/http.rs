//! Shared outbound HTTP client settings.

use std::time::Duration;

/// Upper bound for any single outbound request (connect, send and body).
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// reqwest client whose requests fail with a timeout error after `timeout`.
pub(crate) fn client(timeout: Duration) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .unwrap_or_default()
}

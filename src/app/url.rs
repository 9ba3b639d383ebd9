//! URL validation and normalization for job targets.

use log::warn;

use crate::config::MAX_URL_LENGTH;
use crate::error_handling::JobConfigError;

/// Validates and normalizes a job URL.
///
/// Adds an `https://` prefix when the URL carries no scheme at all, then checks
/// that the result parses and uses the http or https scheme. URLs longer than
/// `MAX_URL_LENGTH` (before or after normalization) are rejected.
///
/// # Arguments
///
/// * `url` - The URL string to validate and normalize
///
/// # Returns
///
/// The normalized URL, or `JobConfigError::InvalidUrl` describing the rejection.
pub fn validate_and_normalize_url(url: &str) -> Result<String, JobConfigError> {
    let url = url.trim();
    if url.len() > MAX_URL_LENGTH {
        warn!(
            "Rejecting URL exceeding maximum length ({} > {}): {}...",
            url.len(),
            MAX_URL_LENGTH,
            url.chars().take(50).collect::<String>()
        );
        return Err(JobConfigError::InvalidUrl(format!(
            "URL exceeds {MAX_URL_LENGTH} characters"
        )));
    }

    let normalized = if url.contains("://") {
        url.to_string()
    } else {
        format!("https://{url}")
    };
    if normalized.len() > MAX_URL_LENGTH {
        return Err(JobConfigError::InvalidUrl(format!(
            "URL exceeds {MAX_URL_LENGTH} characters"
        )));
    }

    match url::Url::parse(&normalized) {
        Ok(parsed) => match parsed.scheme() {
            "http" | "https" if parsed.host_str().is_some() => Ok(normalized),
            "http" | "https" => Err(JobConfigError::InvalidUrl(format!("no host in {url}"))),
            scheme => {
                warn!("Rejecting unsupported scheme for URL: {url}");
                Err(JobConfigError::InvalidUrl(format!(
                    "unsupported scheme {scheme}"
                )))
            }
        },
        Err(e) => {
            warn!("Rejecting invalid URL: {url}");
            Err(JobConfigError::InvalidUrl(format!("{url}: {e}")))
        }
    }
}

//! Retrying send helper for idempotent requests.
//!
//! Only read-oriented requests (catalog listings, `SELECT` queries) go
//! through [`send_json`]. Writes are sent exactly once: replaying an
//! `INSERT` batch after an ambiguous failure could duplicate rows.

use std::time::Duration;

use crate::ApiError;

/// Maximum number of retry attempts for transient failures.
///
/// With exponential backoff (1s, 2s, 4s) the total wait before giving up
/// is 7 seconds.
pub const MAX_RETRIES: u32 = 3;

/// Maximum length of the response body preview included in error logs.
const BODY_PREVIEW_LEN: usize = 500;

/// Sends an idempotent request and parses the response body as JSON.
///
/// The `build_request` closure is called on each attempt since a
/// [`reqwest::RequestBuilder`] is consumed by `.send()`.
///
/// Retries connection errors, timeouts, HTTP 429 and HTTP 5xx up to
/// [`MAX_RETRIES`] times. Other 4xx statuses are permanent.
///
/// # Errors
///
/// Returns [`ApiError`] if the request fails after all retries, the server
/// returns a non-retryable status, or the body is not valid JSON.
#[allow(clippy::future_not_send)]
pub async fn send_json<F>(build_request: F) -> Result<serde_json::Value, ApiError>
where
    F: Fn() -> reqwest::RequestBuilder,
{
    send_json_with_backoff(build_request, MAX_RETRIES, Duration::from_secs(1)).await
}

#[allow(clippy::future_not_send)]
async fn send_json_with_backoff<F>(
    build_request: F,
    max_retries: u32,
    base_delay: Duration,
) -> Result<serde_json::Value, ApiError>
where
    F: Fn() -> reqwest::RequestBuilder,
{
    let mut attempt = 0;

    loop {
        let retryable = match build_request().send().await {
            Err(e) if is_transient(&e) => ApiError::Http(e),
            Err(e) => return Err(ApiError::Http(e)),
            Ok(response) => {
                let status = response.status();
                if status.is_success() {
                    let text = response.text().await?;
                    return serde_json::from_str(&text).map_err(|e| {
                        log::error!(
                            "JSON parse failed: {e}\n  body preview: {}",
                            preview(&text)
                        );
                        ApiError::Json(e)
                    });
                }

                let body = response.text().await.unwrap_or_default();
                let error = ApiError::Status {
                    status: status.as_u16(),
                    body,
                };
                if !is_retryable_status(status) {
                    return Err(error);
                }
                error
            }
        };

        if attempt >= max_retries {
            log::error!("Giving up after {max_retries} retries: {retryable}");
            return Err(retryable);
        }

        attempt += 1;
        let delay = base_delay * (1 << (attempt - 1));
        log::warn!("  {retryable}; retry {attempt}/{max_retries} in {delay:?}...");
        tokio::time::sleep(delay).await;
    }
}

/// Returns `true` for statuses worth retrying (429 and 5xx).
fn is_retryable_status(status: reqwest::StatusCode) -> bool {
    status == reqwest::StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

/// Returns `true` if the error is likely transient and worth retrying.
/// Timeouts, refused connections and interrupted bodies. Errors raised
/// while building or encoding the request never succeed on replay.
fn is_transient(e: &reqwest::Error) -> bool {
    e.is_timeout() || e.is_connect() || e.is_body()
}

fn preview(text: &str) -> &str {
    if text.len() <= BODY_PREVIEW_LEN {
        return text;
    }
    let mut end = BODY_PREVIEW_LEN;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

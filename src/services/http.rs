//! Status and body handling shared by every HTTP client in the crate.

use std::time::Duration;

use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;

use crate::error::{AppError, AppResult};

const MAX_ERROR_BODY_CHARS: usize = 512;

pub(crate) fn build_client(timeout: Duration) -> AppResult<Client> {
    Ok(Client::builder()
        .timeout(timeout.max(Duration::from_millis(1)))
        .build()?)
}

/// Maps 404 to `NotFound` and every other non-2xx status to `Server`.
pub(crate) async fn check_status(response: Response, what: &str) -> AppResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    if status == StatusCode::NOT_FOUND {
        return Err(AppError::NotFound(what.to_string()));
    }
    Err(AppError::Server {
        status: status.as_u16(),
        body: truncate(&body),
    })
}

pub(crate) async fn decode_json<T: DeserializeOwned>(response: Response, what: &str) -> AppResult<T> {
    let text = response.text().await?;
    serde_json::from_str(&text).map_err(|e| AppError::Decode(format!("{}: {}", what, e)))
}

fn truncate(body: &str) -> String {
    if body.chars().count() <= MAX_ERROR_BODY_CHARS {
        return body.to_string();
    }
    let mut cut: String = body.chars().take(MAX_ERROR_BODY_CHARS).collect();
    cut.push_str("...");
    cut
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn long_error_bodies_are_truncated() {
        let long = "x".repeat(MAX_ERROR_BODY_CHARS + 10);
        let cut = truncate(&long);
        assert!(cut.ends_with("..."));
        assert_eq!(cut.chars().count(), MAX_ERROR_BODY_CHARS + 3);
        assert_eq!(truncate("short"), "short");
    }
}

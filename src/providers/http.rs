//! Blocking `ureq` calls bridged onto the async runtime.

use std::time::Duration;

use tokio::task;

use crate::assessment::SourceError;

pub(crate) fn agent(timeout: Duration) -> ureq::Agent {
    ureq::AgentBuilder::new().timeout(timeout).build()
}

/// Runs a blocking request on the blocking pool. A panicked or cancelled
/// worker is reported as an unavailable source.
pub(crate) async fn run_blocking<T, F>(call: F) -> Result<T, SourceError>
where
    F: FnOnce() -> Result<T, SourceError> + Send + 'static,
    T: Send + 'static,
{
    task::spawn_blocking(call)
        .await
        .map_err(|err| SourceError::unavailable(format!("request worker failed: {err}")))?
}

/// Maps a `ureq` failure onto the source error taxonomy.
pub(crate) fn classify(error: ureq::Error) -> SourceError {
    match error {
        ureq::Error::Status(code, response) => {
            let body = response.into_string().unwrap_or_default();
            classify_status(code, &body)
        }
        ureq::Error::Transport(transport) => {
            SourceError::unavailable(format!("transport error: {transport}"))
        }
    }
}

pub(crate) fn classify_status(code: u16, body: &str) -> SourceError {
    let detail = truncate(body.trim(), 200);
    match code {
        400 | 401 | 403 | 404 | 413 | 415 | 422 => {
            SourceError::rejected(format!("HTTP {code}: {detail}"))
        }
        _ => SourceError::unavailable(format!("HTTP {code}: {detail}")),
    }
}

pub(crate) fn read_body(response: ureq::Response) -> Result<String, SourceError> {
    response
        .into_string()
        .map_err(|err| SourceError::unavailable(format!("failed to read response body: {err}")))
}

fn truncate(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((index, _)) => &text[..index],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assessment::FailureKind;

    #[test]
    fn client_errors_are_rejections() {
        for code in [400, 401, 403, 415] {
            assert_eq!(
                classify_status(code, "bad").kind(),
                FailureKind::SourceRejected
            );
        }
    }

    #[test]
    fn throttling_and_server_errors_are_transient() {
        for code in [408, 429, 500, 502, 503] {
            let error = classify_status(code, "");
            assert_eq!(error.kind(), FailureKind::SourceUnavailable);
            assert!(error.is_retryable());
        }
    }

    #[test]
    fn long_bodies_are_truncated() {
        let body = "x".repeat(1_000);
        let message = classify_status(500, &body).to_string();
        assert!(message.len() < 300);
    }

    #[tokio::test]
    async fn blocking_results_are_forwarded() {
        let value = run_blocking(|| Ok::<_, SourceError>(7)).await;
        assert_eq!(value, Ok(7));
    }
}

use std::future::Future;
use std::time::Instant;

use tokio::time::{sleep, timeout};
use tracing::{debug, warn};

use crate::assessment::{SourceError, SourceKind};
use crate::orchestrator::config::AdapterConfig;
use crate::orchestrator::constants::TARGET;
use crate::orchestrator::types::AdapterReport;

/// Runs `call` under the per-attempt deadline, retrying transient failures with
/// capped exponential backoff. Rejections and malformed payloads end the loop
/// on the first attempt.
pub(crate) async fn call_with_retry<T, F, Fut>(
    source: SourceKind,
    config: &AdapterConfig,
    mut call: F,
) -> AdapterReport<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, SourceError>>,
{
    let started = Instant::now();
    let max_attempts = config.max_attempts();
    let mut attempts: u32 = 0;

    loop {
        attempts += 1;

        let outcome = match timeout(config.timeout, call()).await {
            Ok(outcome) => outcome,
            Err(_) => Err(SourceError::Timeout {
                elapsed: config.timeout,
            }),
        };

        let error = match outcome {
            Ok(value) => return AdapterReport::succeeded(value, attempts, started.elapsed()),
            Err(error) => error,
        };

        if !error.is_retryable() || attempts >= max_attempts {
            debug!(
                target: TARGET,
                source = source.as_str(),
                attempts,
                kind = error.kind().as_str(),
                "giving up on source"
            );
            return AdapterReport::failed(error, attempts, started.elapsed());
        }

        let delay = config.backoff_for(attempts);
        warn!(
            target: TARGET,
            source = source.as_str(),
            attempt = attempts,
            %error,
            ?delay,
            "transient source failure, retrying"
        );
        sleep(delay).await;
    }
}

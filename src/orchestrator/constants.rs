use std::time::Duration;

pub(crate) const TARGET: &str = "assessment_orchestrator";

pub(crate) const DEFAULT_MAX_RETRIES: u32 = 2;
pub(crate) const DEFAULT_BASE_BACKOFF: Duration = Duration::from_millis(250);
pub(crate) const DEFAULT_MAX_BACKOFF: Duration = Duration::from_secs(4);
pub(crate) const DEFAULT_SPEECH_TIMEOUT: Duration = Duration::from_secs(15);
pub(crate) const DEFAULT_GRADER_TIMEOUT: Duration = Duration::from_secs(120);

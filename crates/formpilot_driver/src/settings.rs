use std::time::Duration;

/// Every delay, timeout, and retry budget used by the work loops. Defaults
/// match the timings the target pages were tuned against.
#[derive(Debug, Clone)]
pub struct DriverSettings {
    /// Pause between simulated keystrokes.
    pub typing_delay: Duration,
    /// Settle time before and after typing a full value.
    pub after_typing_wait: Duration,
    /// Pause before pressing Enter on a verified result.
    pub before_enter_wait: Duration,
    /// Time allowed for the page to react to Enter.
    pub after_enter_wait: Duration,
    /// Settle time after clearing the input between items.
    pub after_clear_wait: Duration,
    /// Attempts to locate the search input before giving up on the job.
    pub locate_retry_max: u32,
    /// Backoff between locate attempts.
    pub locate_retry_delay: Duration,
    /// Ceiling for the loading indicator to disappear.
    pub loading_timeout: Duration,
    /// Poll interval while waiting on the loading indicator.
    pub loading_poll_interval: Duration,
    /// Ceiling for the expected result to show up in the dropdown.
    pub result_timeout: Duration,
    /// Poll interval while waiting on the result dropdown.
    pub result_poll_interval: Duration,
    /// Settle time before submitting the entry form.
    pub before_submit_wait: Duration,
}

impl Default for DriverSettings {
    fn default() -> Self {
        Self {
            typing_delay: Duration::from_millis(5),
            after_typing_wait: Duration::from_millis(300),
            before_enter_wait: Duration::from_millis(150),
            after_enter_wait: Duration::from_millis(2500),
            after_clear_wait: Duration::from_millis(500),
            locate_retry_max: 20,
            locate_retry_delay: Duration::from_millis(500),
            loading_timeout: Duration::from_secs(15),
            loading_poll_interval: Duration::from_millis(200),
            result_timeout: Duration::from_secs(15),
            result_poll_interval: Duration::from_millis(250),
            before_submit_wait: Duration::from_millis(500),
        }
    }
}

impl DriverSettings {
    /// Near-zero timings for tests: same code paths, no real waiting.
    pub fn instant() -> Self {
        Self {
            typing_delay: Duration::ZERO,
            after_typing_wait: Duration::ZERO,
            before_enter_wait: Duration::ZERO,
            after_enter_wait: Duration::ZERO,
            after_clear_wait: Duration::ZERO,
            locate_retry_max: 3,
            locate_retry_delay: Duration::from_millis(1),
            loading_timeout: Duration::from_millis(20),
            loading_poll_interval: Duration::from_millis(1),
            result_timeout: Duration::from_millis(20),
            result_poll_interval: Duration::from_millis(1),
            before_submit_wait: Duration::ZERO,
        }
    }
}

use std::collections::BTreeSet;
use std::time::Duration;

/// Decides whether a finished attempt should be re-submitted.
///
/// `max_retries` counts retries after the initial attempt: a policy with
/// `max_retries = 2` allows up to three attempts total. The delay between
/// attempts is a flat `base_delay_ms` on purpose; callers wanting a growing
/// backoff model it through their own status-code selection.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum number of retries after the initial attempt.
    pub max_retries: u32,
    /// Flat delay before each re-submission, in milliseconds.
    pub base_delay_ms: u64,
    /// HTTP status codes eligible for retry. Duplicates collapse.
    pub retryable_status: BTreeSet<u16>,
    /// Whether transport-level failures (DNS, reset, timeout) are retried.
    pub retry_on_network_error: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 0,
            base_delay_ms: 0,
            retryable_status: BTreeSet::new(),
            retry_on_network_error: false,
        }
    }
}

impl RetryPolicy {
    /// Decides whether the attempt that just finished should be retried.
    ///
    /// `retries` is the number of retries already performed for this
    /// request. `status` is `None` when no HTTP response was received;
    /// `network_error` marks transport-level failures. Statuses in
    /// `[200, 400)` never retry, even when listed in `retryable_status`.
    pub fn should_retry(&self, retries: u32, status: Option<u16>, network_error: bool) -> bool {
        if retries >= self.max_retries {
            return false;
        }
        if network_error {
            return self.retry_on_network_error;
        }
        match status {
            Some(code) if (200..400).contains(&code) => false,
            Some(code) => self.retryable_status.contains(&code),
            None => false,
        }
    }

    /// Delay to wait before the next attempt.
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::RetryPolicy;

    fn policy(max_retries: u32, codes: &[u16], on_network: bool) -> RetryPolicy {
        RetryPolicy {
            max_retries,
            base_delay_ms: 0,
            retryable_status: codes.iter().copied().collect(),
            retry_on_network_error: on_network,
        }
    }

    #[test]
    fn retries_listed_status_until_budget_is_spent() {
        let policy = policy(2, &[500, 503], false);
        assert!(policy.should_retry(0, Some(500), false));
        assert!(policy.should_retry(1, Some(503), false));
        assert!(!policy.should_retry(2, Some(500), false));
    }

    #[test]
    fn unlisted_status_is_terminal() {
        let policy = policy(3, &[500], false);
        assert!(!policy.should_retry(0, Some(404), false));
        assert!(!policy.should_retry(0, Some(502), false));
    }

    #[test]
    fn success_range_never_retries_even_when_listed() {
        let policy = policy(3, &[200, 301], false);
        assert!(!policy.should_retry(0, Some(200), false));
        assert!(!policy.should_retry(0, Some(301), false));
    }

    #[test]
    fn network_errors_follow_the_network_flag() {
        assert!(policy(1, &[], true).should_retry(0, None, true));
        assert!(!policy(1, &[], false).should_retry(0, None, true));
    }

    #[test]
    fn zero_budget_means_first_outcome_is_terminal() {
        let policy = policy(0, &[500], true);
        assert!(!policy.should_retry(0, Some(500), false));
        assert!(!policy.should_retry(0, None, true));
    }

    #[test]
    fn missing_status_without_network_error_is_terminal() {
        // Init-class failures: no response, not a transport error.
        assert!(!policy(3, &[500], true).should_retry(0, None, false));
    }

    #[test]
    fn duplicate_status_codes_collapse() {
        let policy = RetryPolicy {
            retryable_status: [500u16, 500, 500].into_iter().collect(),
            ..RetryPolicy::default()
        };
        assert_eq!(policy.retryable_status.len(), 1);
    }
}

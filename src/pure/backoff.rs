// Exponential backoff math, adapted near-verbatim from the teacher's
// `pure::connection_pool::calculate_backoff_duration`, reused for job-queue
// and launcher retry scheduling (§4.6, §4.7).

use std::time::Duration;

pub fn calculate_backoff_duration(attempt: u32, base: Duration, max: Duration) -> Duration {
    let backoff_ms = base.as_millis().saturating_mul(1u128 << attempt.min(32));
    let backoff = Duration::from_millis(backoff_ms.min(u64::MAX as u128) as u64);
    std::cmp::min(backoff, max)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_per_attempt() {
        let base = Duration::from_millis(100);
        let max = Duration::from_secs(30);
        assert_eq!(calculate_backoff_duration(0, base, max), Duration::from_millis(100));
        assert_eq!(calculate_backoff_duration(1, base, max), Duration::from_millis(200));
        assert_eq!(calculate_backoff_duration(2, base, max), Duration::from_millis(400));
    }

    #[test]
    fn backoff_caps_at_max() {
        let base = Duration::from_millis(100);
        let max = Duration::from_secs(30);
        assert_eq!(calculate_backoff_duration(20, base, max), max);
    }
}

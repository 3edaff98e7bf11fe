// Utility functions for the personalization engine

use std::future::Future;
use std::time::Duration;
use tokio::time::timeout;

/// Compute exponential decay for time-based scoring
pub fn exponential_decay(age_hours: f32, half_life_hours: f32) -> f32 {
    (-age_hours / half_life_hours * 0.693).exp()
}

/// Bound a collaborator call by a deadline.
///
/// Returns `Err(deadline_ms)` when the deadline elapses so callers can fold
/// the waited duration into their typed timeout error.
pub async fn run_with_timeout<F>(deadline_ms: u64, future: F) -> Result<F::Output, u64>
where
    F: Future,
{
    match timeout(Duration::from_millis(deadline_ms), future).await {
        Ok(out) => Ok(out),
        Err(_) => Err(deadline_ms),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exponential_decay() {
        // One half-life should land near 0.5
        let score = exponential_decay(24.0, 24.0);
        assert!((score - 0.5).abs() < 0.01);

        // Zero age decays to 1.0
        let score_fresh = exponential_decay(0.0, 24.0);
        assert!((score_fresh - 1.0).abs() < 0.001);

        // Older is always smaller
        assert!(exponential_decay(48.0, 24.0) < exponential_decay(24.0, 24.0));
    }

    #[tokio::test]
    async fn test_run_with_timeout_passes_result() {
        let out = run_with_timeout(1_000, async { 42u32 }).await;
        assert_eq!(out, Ok(42));
    }

    #[tokio::test]
    async fn test_run_with_timeout_elapses() {
        let out = run_with_timeout(10, async {
            tokio::time::sleep(Duration::from_millis(200)).await;
            42u32
        })
        .await;
        assert_eq!(out, Err(10));
    }
}

use std::time::Duration;

/// Delay inserted after each chunk to emulate a live feed.
///
/// Timing is best effort. Dropping the future returned by [`pause`](Self::pause)
/// abandons the wait, which is how an aborted exchange stops pacing.
#[derive(Debug, Clone, Copy)]
pub struct Pacer {
    delay: Duration,
}

impl Pacer {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    pub async fn pause(&self) {
        if self.delay.is_zero() {
            return;
        }
        tokio::time::sleep(self.delay).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[tokio::test]
    async fn test_pacer_zero_delay_returns_immediately() {
        let pacer = Pacer::new(Duration::ZERO);
        let start = Instant::now();
        for _ in 0..100 {
            pacer.pause().await;
        }
        assert!(start.elapsed() < Duration::from_millis(50));
    }

    #[tokio::test]
    async fn test_pacer_waits_at_least_delay() {
        let pacer = Pacer::new(Duration::from_millis(30));
        let start = Instant::now();
        pacer.pause().await;
        assert!(start.elapsed() >= Duration::from_millis(30));
    }

    #[tokio::test]
    async fn test_pacer_pause_is_cancellable() {
        let pacer = Pacer::new(Duration::from_secs(30));
        let start = Instant::now();
        let result = tokio::time::timeout(Duration::from_millis(20), pacer.pause()).await;
        assert!(result.is_err());
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn test_pacer_reports_delay() {
        let pacer = Pacer::new(Duration::from_millis(60));
        assert_eq!(pacer.delay(), Duration::from_millis(60));
    }
}

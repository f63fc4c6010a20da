use std::future::Future;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Time left until `last_check + interval`; zero when a check is already due.
pub fn next_check_delay(last_check: Option<i64>, interval_ms: u64, now_ms: i64) -> Duration {
    let elapsed = now_ms.saturating_sub(last_check.unwrap_or(0)).max(0) as u64;
    Duration::from_millis(interval_ms.saturating_sub(elapsed))
}

/// At most one pending timer. Rescheduling or dropping aborts the previous one.
#[derive(Default)]
pub struct UpdateScheduler {
    pending: Option<JoinHandle<()>>,
}

impl UpdateScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule<F>(&mut self, delay: Duration, fire: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.cancel();
        tracing::debug!("Next update check in {:?}", delay);
        self.pending = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            fire.await;
        }));
    }

    pub fn cancel(&mut self) {
        if let Some(handle) = self.pending.take() {
            handle.abort();
        }
    }

    pub fn is_scheduled(&self) -> bool {
        self.pending.as_ref().is_some_and(|h| !h.is_finished())
    }
}

impl Drop for UpdateScheduler {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn delay_counts_down_from_last_check() {
        let hour = 3_600_000;
        assert_eq!(next_check_delay(None, hour, 10_000_000), Duration::ZERO);
        assert_eq!(
            next_check_delay(Some(1_000_000), hour, 1_000_000 + 600_000),
            Duration::from_millis(3_000_000)
        );
        assert_eq!(
            next_check_delay(Some(1_000_000), hour, 1_000_000 + hour as i64),
            Duration::ZERO
        );
    }

    #[tokio::test(start_paused = true)]
    async fn fires_after_delay_and_cancel_aborts() {
        let fired = Arc::new(AtomicUsize::new(0));
        let mut scheduler = UpdateScheduler::new();

        let counter = fired.clone();
        scheduler.schedule(Duration::from_secs(60), async move {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        assert!(scheduler.is_scheduled());
        tokio::time::sleep(Duration::from_secs(61)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);

        let counter = fired.clone();
        scheduler.schedule(Duration::from_secs(60), async move {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        scheduler.cancel();
        assert!(!scheduler.is_scheduled());
        tokio::time::sleep(Duration::from_secs(120)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }
}

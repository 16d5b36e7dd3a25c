//! Bounded retry of failed resolution runs.
//!
//! At most one timer is pending at a time. Each href gets one pass through
//! the delay schedule; scheduling for a different href starts over. A timer
//! that fires after the page has moved on is dropped.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::navigation::{Trigger, TriggerCause};
use crate::page::Page;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    Scheduled { attempt: usize, delay: Duration },
    AlreadyPending,
    Exhausted,
}

#[derive(Default)]
struct RetryState {
    href: Option<String>,
    attempts: usize,
    pending: Option<JoinHandle<()>>,
    generation: u64,
}

impl RetryState {
    fn cancel(&mut self) {
        if let Some(handle) = self.pending.take() {
            handle.abort();
        }
        self.generation += 1;
    }
}

pub struct RetryScheduler {
    delays: Vec<Duration>,
    state: Arc<Mutex<RetryState>>,
    page: Arc<dyn Page>,
    tx: UnboundedSender<Trigger>,
}

impl RetryScheduler {
    /// Fired retries are sent on `tx` as [`TriggerCause::Retry`] triggers.
    pub fn new(delays: Vec<Duration>, page: Arc<dyn Page>, tx: UnboundedSender<Trigger>) -> Self {
        Self {
            delays,
            state: Arc::new(Mutex::new(RetryState::default())),
            page,
            tx,
        }
    }

    /// Schedule another attempt for `href`. Must be called from within a
    /// tokio runtime.
    pub fn schedule(&self, href: &str) -> RetryDecision {
        let mut state = self.state.lock().unwrap();

        if state.href.as_deref() != Some(href) {
            state.cancel();
            state.href = Some(href.to_string());
            state.attempts = 0;
        }

        if state.pending.is_some() {
            return RetryDecision::AlreadyPending;
        }

        let Some(&delay) = self.delays.get(state.attempts) else {
            debug!(href, attempts = state.attempts, "retries exhausted");
            return RetryDecision::Exhausted;
        };

        state.attempts += 1;
        state.generation += 1;
        let attempt = state.attempts;
        let generation = state.generation;

        let shared = Arc::clone(&self.state);
        let page = Arc::clone(&self.page);
        let tx = self.tx.clone();
        let href = href.to_string();
        debug!(%href, attempt, delay_ms = delay.as_millis() as u64, "retry scheduled");

        state.pending = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            {
                let mut state = shared.lock().unwrap();
                if state.generation != generation {
                    return;
                }
                state.pending = None;
            }
            if page.href() != href {
                debug!(%href, attempt, "page moved on, dropping retry");
                return;
            }
            let _ = tx.send(Trigger {
                href,
                href_changed: false,
                cause: TriggerCause::Retry(attempt),
            });
        }));

        RetryDecision::Scheduled { attempt, delay }
    }

    /// Drop the pending timer, keeping the attempt count.
    pub fn cancel(&self) {
        self.state.lock().unwrap().cancel();
    }

    /// Drop the pending timer and forget the attempt count.
    pub fn reset(&self) {
        let mut state = self.state.lock().unwrap();
        state.cancel();
        state.href = None;
        state.attempts = 0;
    }

    pub fn attempts(&self) -> usize {
        self.state.lock().unwrap().attempts
    }

    pub fn is_pending(&self) -> bool {
        self.state.lock().unwrap().pending.is_some()
    }
}

impl Drop for RetryScheduler {
    fn drop(&mut self) {
        if let Ok(mut state) = self.state.lock() {
            state.cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page::{StaticPage, StaticPageState};
    use tokio::sync::mpsc;

    fn delays() -> Vec<Duration> {
        [350, 900, 1800]
            .into_iter()
            .map(Duration::from_millis)
            .collect()
    }

    fn setup(href: &str) -> (Arc<StaticPage>, RetryScheduler, mpsc::UnboundedReceiver<Trigger>) {
        let page = Arc::new(StaticPage::new(StaticPageState {
            href: href.to_string(),
            ..Default::default()
        }));
        let (tx, rx) = mpsc::unbounded_channel();
        let retry = RetryScheduler::new(delays(), page.clone(), tx);
        (page, retry, rx)
    }

    #[tokio::test(start_paused = true)]
    async fn follows_schedule_then_exhausts() {
        let (_page, retry, mut rx) = setup("a");

        for (i, ms) in [350u64, 900, 1800].into_iter().enumerate() {
            let started = tokio::time::Instant::now();
            assert_eq!(
                retry.schedule("a"),
                RetryDecision::Scheduled {
                    attempt: i + 1,
                    delay: Duration::from_millis(ms)
                }
            );
            let trigger = rx.recv().await.unwrap();
            assert_eq!(trigger.cause, TriggerCause::Retry(i + 1));
            assert_eq!(trigger.href, "a");
            assert!(started.elapsed() >= Duration::from_millis(ms));
        }

        assert_eq!(retry.schedule("a"), RetryDecision::Exhausted);
        assert_eq!(retry.attempts(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn pending_timer_coalesces() {
        let (_page, retry, mut rx) = setup("a");
        assert!(matches!(retry.schedule("a"), RetryDecision::Scheduled { .. }));
        assert_eq!(retry.schedule("a"), RetryDecision::AlreadyPending);
        assert!(retry.is_pending());

        rx.recv().await.unwrap();
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(rx.try_recv().is_err());
        assert_eq!(retry.attempts(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn new_href_resets_counter() {
        let (page, retry, mut rx) = setup("a");
        retry.schedule("a");
        rx.recv().await.unwrap();
        retry.schedule("a");
        rx.recv().await.unwrap();
        assert_eq!(retry.attempts(), 2);

        page.update(|s| s.href = "b".to_string());
        assert_eq!(
            retry.schedule("b"),
            RetryDecision::Scheduled {
                attempt: 1,
                delay: Duration::from_millis(350)
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn fired_timer_dropped_after_navigation() {
        let (page, retry, mut rx) = setup("a");
        retry.schedule("a");
        page.update(|s| s.href = "b".to_string());

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(rx.try_recv().is_err());
        assert!(!retry.is_pending());
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_stops_pending_timer() {
        let (_page, retry, mut rx) = setup("a");
        retry.schedule("a");
        retry.cancel();
        assert!(!retry.is_pending());

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(rx.try_recv().is_err());

        retry.reset();
        assert_eq!(retry.attempts(), 0);
    }
}

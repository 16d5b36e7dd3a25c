//! Navigation detection.
//!
//! The host reports two kinds of change: render-tree mutations, which come
//! in bursts and are debounced on the trailing edge, and history events,
//! which fire immediately. Either one becomes a [`Trigger`] carrying
//! whether the href moved since the last one.

use std::time::Duration;

use tokio::sync::mpsc::UnboundedReceiver;
use tokio::time::{sleep_until, Instant};

use crate::page::Page;
use crate::proxy::HostMessage;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerCause {
    Initial,
    Mutation,
    History,
    /// A retry timer fired; the payload is the attempt number.
    Retry(usize),
    Intercepted,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Trigger {
    pub href: String,
    pub href_changed: bool,
    pub cause: TriggerCause,
}

/// What the host pushes at us.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostEvent {
    Mutation,
    History,
    Intercepted(HostMessage),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Signal {
    Navigate(Trigger),
    Intercepted(HostMessage),
}

pub struct NavigationMonitor {
    debounce: Duration,
    last_href: Option<String>,
    mutation_deadline: Option<Instant>,
}

impl NavigationMonitor {
    pub fn new(debounce: Duration) -> Self {
        Self {
            debounce,
            last_href: None,
            mutation_deadline: None,
        }
    }

    fn observe(&mut self, href: String, cause: TriggerCause) -> Trigger {
        let href_changed = self.last_href.as_deref() != Some(href.as_str());
        self.last_href = Some(href.clone());
        Trigger {
            href,
            href_changed,
            cause,
        }
    }

    pub fn initial(&mut self, page: &dyn Page) -> Trigger {
        self.observe(page.href(), TriggerCause::Initial)
    }

    /// Push the debounce deadline out. Only the last mutation of a burst
    /// produces a trigger.
    pub fn on_mutation(&mut self, now: Instant) {
        self.mutation_deadline = Some(now + self.debounce);
    }

    pub fn on_history(&mut self, page: &dyn Page) -> Trigger {
        self.observe(page.href(), TriggerCause::History)
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.mutation_deadline
    }

    /// The debounce window closed.
    pub fn on_deadline(&mut self, page: &dyn Page) -> Option<Trigger> {
        self.mutation_deadline.take()?;
        Some(self.observe(page.href(), TriggerCause::Mutation))
    }

    /// Wait for the next thing worth acting on. `None` once the event
    /// stream has closed. Cancel-safe: a pending debounce survives being
    /// dropped mid-wait.
    pub async fn next(
        &mut self,
        events: &mut UnboundedReceiver<HostEvent>,
        page: &dyn Page,
    ) -> Option<Signal> {
        loop {
            let deadline = self.mutation_deadline;
            tokio::select! {
                event = events.recv() => match event? {
                    HostEvent::Mutation => self.on_mutation(Instant::now()),
                    HostEvent::History => return Some(Signal::Navigate(self.on_history(page))),
                    HostEvent::Intercepted(msg) => return Some(Signal::Intercepted(msg)),
                },
                _ = wait_for(deadline) => {
                    if let Some(trigger) = self.on_deadline(page) {
                        return Some(Signal::Navigate(trigger));
                    }
                }
            }
        }
    }
}

async fn wait_for(deadline: Option<Instant>) {
    match deadline {
        Some(at) => sleep_until(at).await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page::{StaticPage, StaticPageState};
    use tokio::sync::mpsc;

    fn page(href: &str) -> StaticPage {
        StaticPage::new(StaticPageState {
            href: href.to_string(),
            ..Default::default()
        })
    }

    #[tokio::test(start_paused = true)]
    async fn mutation_burst_fires_once_after_quiet_period() {
        let page = page("a");
        let mut monitor = NavigationMonitor::new(Duration::from_millis(500));
        monitor.initial(&page);
        let (tx, mut rx) = mpsc::unbounded_channel();

        let start = Instant::now();
        for _ in 0..5 {
            tx.send(HostEvent::Mutation).unwrap();
        }
        tokio::spawn({
            let tx = tx.clone();
            async move {
                tokio::time::sleep(Duration::from_millis(300)).await;
                tx.send(HostEvent::Mutation).unwrap();
            }
        });

        let signal = monitor.next(&mut rx, &page).await.unwrap();
        assert_eq!(
            signal,
            Signal::Navigate(Trigger {
                href: "a".to_string(),
                href_changed: false,
                cause: TriggerCause::Mutation,
            })
        );
        assert!(start.elapsed() >= Duration::from_millis(800));
        assert_eq!(monitor.deadline(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn history_fires_immediately_and_reports_change() {
        let page = page("a");
        let mut monitor = NavigationMonitor::new(Duration::from_millis(500));
        assert!(monitor.initial(&page).href_changed);

        let (tx, mut rx) = mpsc::unbounded_channel();
        page.update(|s| s.href = "b".to_string());
        tx.send(HostEvent::History).unwrap();

        let start = Instant::now();
        let Some(Signal::Navigate(trigger)) = monitor.next(&mut rx, &page).await else {
            panic!("expected a navigation");
        };
        assert_eq!(start.elapsed(), Duration::ZERO);
        assert!(trigger.href_changed);
        assert_eq!(trigger.cause, TriggerCause::History);
    }

    #[tokio::test(start_paused = true)]
    async fn mutation_after_href_change_reports_change() {
        let page = page("a");
        let mut monitor = NavigationMonitor::new(Duration::from_millis(500));
        monitor.initial(&page);
        page.update(|s| s.href = "b".to_string());

        monitor.on_mutation(Instant::now());
        tokio::time::sleep(Duration::from_millis(500)).await;
        let trigger = monitor.on_deadline(&page).unwrap();
        assert!(trigger.href_changed);
        assert!(monitor.on_deadline(&page).is_none());
    }

    #[tokio::test]
    async fn closed_stream_ends() {
        let page = page("a");
        let mut monitor = NavigationMonitor::new(Duration::from_millis(500));
        let (tx, mut rx) = mpsc::unbounded_channel::<HostEvent>();
        drop(tx);
        assert_eq!(monitor.next(&mut rx, &page).await, None);
    }
}

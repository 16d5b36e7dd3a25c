//! Run numbering and staleness checks.
//!
//! Every resolution run takes a [`RunToken`] that remembers the run number
//! and the href it started on. Any later run, or any navigation away,
//! makes the token stale; the pipeline calls [`RunToken::checkpoint`] after
//! each suspension point and bails out with [`RunAbort::Stale`] once it is.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tracing::debug;

use crate::error::RunAbort;
use crate::page::Page;

pub struct RunController {
    latest: Arc<AtomicU64>,
    page: Arc<dyn Page>,
}

impl RunController {
    pub fn new(page: Arc<dyn Page>) -> Self {
        Self {
            latest: Arc::new(AtomicU64::new(0)),
            page,
        }
    }

    /// Start a new run, superseding every earlier one.
    pub fn begin(&self) -> RunToken {
        let id = self.latest.fetch_add(1, Ordering::SeqCst) + 1;
        RunToken {
            id,
            href: self.page.href(),
            latest: Arc::clone(&self.latest),
            page: Arc::clone(&self.page),
        }
    }

    /// Mark every outstanding run stale without starting a new one.
    pub fn invalidate(&self) {
        self.latest.fetch_add(1, Ordering::SeqCst);
    }

    pub fn current_id(&self) -> u64 {
        self.latest.load(Ordering::SeqCst)
    }
}

#[derive(Clone)]
pub struct RunToken {
    pub id: u64,
    pub href: String,
    latest: Arc<AtomicU64>,
    page: Arc<dyn Page>,
}

impl RunToken {
    pub fn is_stale(&self) -> bool {
        self.latest.load(Ordering::SeqCst) != self.id || self.page.href() != self.href
    }

    pub fn checkpoint(&self, stage: &'static str) -> Result<(), RunAbort> {
        if self.is_stale() {
            debug!(run = self.id, stage, href = %self.href, "run is stale, discarding");
            return Err(RunAbort::Stale);
        }
        Ok(())
    }
}

impl std::fmt::Debug for RunToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunToken")
            .field("id", &self.id)
            .field("href", &self.href)
            .finish()
    }
}

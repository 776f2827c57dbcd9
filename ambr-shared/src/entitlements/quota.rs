use std::sync::Arc;
use std::time::Duration;

use chrono::{NaiveDate, Timelike, Utc};
use parking_lot::Mutex;

/// Result of an attempt to consume one unit of daily swipe quota.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsumeOutcome {
    Consumed { remaining: u32 },
    Exhausted,
}

#[derive(Debug)]
struct DayWindow {
    day: NaiveDate,
    used: u32,
}

/// Per-user, per-UTC-day swipe counter.
///
/// Consumption is atomic under one lock, so two rapid swipes cannot both
/// pass the final unit. The day rolls over only through [`roll_over`],
/// driven by the scheduled midnight task, never by request handling, so a
/// skewed client clock cannot reset the count. The ledger is consulted only
/// while the tier is Free; a mid-day upgrade bypasses it via the gate
/// without touching the stored value.
///
/// [`roll_over`]: SwipeQuotaLedger::roll_over
#[derive(Debug)]
pub struct SwipeQuotaLedger {
    allowance: u32,
    inner: Mutex<DayWindow>,
}

impl SwipeQuotaLedger {
    pub fn new(allowance: u32) -> Self {
        Self {
            allowance,
            inner: Mutex::new(DayWindow {
                day: Utc::now().date_naive(),
                used: 0,
            }),
        }
    }

    pub fn allowance(&self) -> u32 {
        self.allowance
    }

    pub fn remaining(&self) -> u32 {
        let inner = self.inner.lock();
        self.allowance.saturating_sub(inner.used)
    }

    pub fn try_consume(&self) -> ConsumeOutcome {
        let mut inner = self.inner.lock();
        if inner.used >= self.allowance {
            return ConsumeOutcome::Exhausted;
        }
        inner.used += 1;
        ConsumeOutcome::Consumed {
            remaining: self.allowance - inner.used,
        }
    }

    /// Reverts one consumption after a rolled-back decision write.
    pub fn refund(&self) {
        let mut inner = self.inner.lock();
        inner.used = inner.used.saturating_sub(1);
    }

    /// Scheduled day-boundary transition. A no-op while the day is
    /// unchanged, so calling it defensively costs nothing.
    pub fn roll_over(&self, day: NaiveDate) {
        let mut inner = self.inner.lock();
        if inner.day != day {
            tracing::info!(%day, used = inner.used, "swipe quota reset at day boundary");
            inner.day = day;
            inner.used = 0;
        }
    }

    /// Spawns the midnight-UTC reset loop.
    pub fn spawn_daily_reset(self: Arc<Self>) -> tokio::task::JoinHandle<()> {
        let ledger = self;
        tokio::spawn(async move {
            loop {
                let now = Utc::now();
                let elapsed_today = u64::from(now.time().num_seconds_from_midnight());
                let until_midnight = Duration::from_secs(86_400 - elapsed_today.min(86_399));
                tokio::time::sleep(until_midnight).await;
                ledger.roll_over(Utc::now().date_naive());
            }
        })
    }
}

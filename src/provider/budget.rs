use std::sync::atomic::{AtomicI64, AtomicU32, Ordering};

/// Caps outbound provider calls per UTC day.
///
/// The counter resets when the UTC day changes. Refused calls are not counted.
pub struct ApiCallBudget {
    daily_limit: u32,
    calls_today: AtomicU32,
    current_day: AtomicI64,
}

impl ApiCallBudget {
    pub fn new(daily_limit: u32) -> Self {
        Self {
            daily_limit,
            calls_today: AtomicU32::new(0),
            current_day: AtomicI64::new(Self::utc_day_now()),
        }
    }

    pub fn daily_limit(&self) -> u32 {
        self.daily_limit
    }

    /// Reserve one call. Returns `false` once today's limit is reached.
    pub fn try_acquire(&self) -> bool {
        self.maybe_reset();
        self.calls_today
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |used| {
                (used < self.daily_limit).then_some(used + 1)
            })
            .is_ok()
    }

    /// Number of provider calls remaining today.
    pub fn remaining(&self) -> u32 {
        self.maybe_reset();
        let used = self.calls_today.load(Ordering::Acquire);
        self.daily_limit.saturating_sub(used)
    }

    /// Reset counter if the UTC day has changed (compare-and-swap).
    fn maybe_reset(&self) {
        let today = Self::utc_day_now();
        let stored = self.current_day.load(Ordering::Acquire);
        if today != stored
            && self
                .current_day
                .compare_exchange(stored, today, Ordering::AcqRel, Ordering::Relaxed)
                .is_ok()
        {
            self.calls_today.store(0, Ordering::Release);
        }
    }

    fn utc_day_now() -> i64 {
        chrono::Utc::now().timestamp() / 86400
    }
}

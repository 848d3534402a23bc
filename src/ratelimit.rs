//! Interval rate limiting for task admissions
//!
//! The limiter answers one question for the scheduler: may another task be
//! admitted right now, and if not, how long until it is worth asking again.
//! It owns no timers; the scheduler arms a resume timer from the returned
//! wait hint, which keeps this module synchronous and unit-testable.
//!
//! Two active modes:
//!
//! - **Fixed window**: a counter reset at window boundaries. Cheap, but
//!   allows a burst at the end of one window followed by a burst at the
//!   start of the next.
//! - **Sliding window** (strict): one timestamp per admission, kept in a
//!   circular buffer; the cap holds over every rolling interval.

use crate::config::QueueConfig;
use std::time::{Duration, Instant};

/// Evicted-prefix length beyond which the sliding tick buffer is compacted
const TICK_COMPACT_THRESHOLD: usize = 256;

enum Mode {
    Disabled,
    Fixed {
        /// Admissions counted since the last window boundary
        count: usize,
        /// Deadline of the current window, set when the window timer arms
        window_end: Option<Instant>,
        /// Most recent admission instant
        last_admit: Option<Instant>,
    },
    Sliding {
        /// Admission timestamps; `start..` are live, `..start` evicted
        ticks: Vec<Instant>,
        start: usize,
    },
}

pub(crate) struct IntervalLimiter {
    interval: Duration,
    cap: usize,
    carryover: bool,
    mode: Mode,
}

impl IntervalLimiter {
    pub(crate) fn new(config: &QueueConfig) -> Self {
        let mode = if config.interval_ignored() {
            Mode::Disabled
        } else if config.strict {
            Mode::Sliding {
                ticks: Vec::new(),
                start: 0,
            }
        } else {
            Mode::Fixed {
                count: 0,
                window_end: None,
                last_admit: None,
            }
        };
        Self {
            interval: config.interval,
            cap: config.interval_cap,
            carryover: config.carryover_interval_count,
            mode,
        }
    }

    pub(crate) fn is_ignored(&self) -> bool {
        matches!(self.mode, Mode::Disabled)
    }

    pub(crate) fn is_fixed(&self) -> bool {
        matches!(self.mode, Mode::Fixed { .. })
    }

    pub(crate) fn cap(&self) -> usize {
        self.cap
    }

    /// Whether the current accounting leaves room for another admission
    pub(crate) fn allows_another(&mut self, now: Instant) -> bool {
        self.evict(now);
        match &self.mode {
            Mode::Disabled => true,
            Mode::Fixed { count, .. } => *count < self.cap,
            Mode::Sliding { ticks, start } => ticks.len() - start < self.cap,
        }
    }

    /// Whether admission must wait, and for how long.
    ///
    /// `Some(delay)` means "blocked; wake the scheduler after `delay`". In
    /// fixed mode the window deadline and the spacing since the last
    /// admission are consulted only while no window timer is armed; an armed
    /// timer already guarantees a wake-up at the boundary. Reaching the end
    /// of an expired window resets the count (to `pending` under carryover).
    pub(crate) fn paused_until(
        &mut self,
        now: Instant,
        window_timer_active: bool,
        pending: usize,
    ) -> Option<Duration> {
        self.evict(now);
        let interval = self.interval;
        let carryover = self.carryover;
        let cap = self.cap;
        match &mut self.mode {
            Mode::Disabled => None,
            Mode::Fixed {
                count,
                window_end,
                last_admit,
            } => {
                if window_timer_active {
                    return None;
                }
                if let Some(end) = *window_end {
                    if end > now {
                        return Some(end - now);
                    }
                }
                if let Some(last) = *last_admit {
                    let elapsed = now.saturating_duration_since(last);
                    if elapsed < interval {
                        return Some(interval - elapsed);
                    }
                }
                *count = if carryover { pending } else { 0 };
                None
            }
            Mode::Sliding { ticks, start } => {
                if ticks.len() - *start < cap {
                    return None;
                }
                ticks
                    .get(*start)
                    .map(|oldest| interval - now.saturating_duration_since(*oldest))
            }
        }
    }

    /// Record an admission
    pub(crate) fn consume(&mut self, now: Instant) {
        match &mut self.mode {
            Mode::Disabled => {}
            Mode::Fixed {
                count, last_admit, ..
            } => {
                *count += 1;
                *last_admit = Some(now);
            }
            Mode::Sliding { ticks, .. } => ticks.push(now),
        }
    }

    /// Admissions counted against the current interval
    pub(crate) fn admitted(&mut self, now: Instant) -> usize {
        self.evict(now);
        match &self.mode {
            Mode::Disabled => 0,
            Mode::Fixed { count, .. } => *count,
            Mode::Sliding { ticks, start } => ticks.len() - start,
        }
    }

    /// The window timer armed; record the window deadline (fixed mode)
    pub(crate) fn window_started(&mut self, now: Instant) {
        if let Mode::Fixed { window_end, .. } = &mut self.mode {
            *window_end = Some(now + self.interval);
        }
    }

    /// A window boundary elapsed; reset the count and roll the deadline
    pub(crate) fn on_window_boundary(&mut self, now: Instant, pending: usize) {
        let carryover = self.carryover;
        let interval = self.interval;
        if let Mode::Fixed {
            count, window_end, ..
        } = &mut self.mode
        {
            *count = if carryover { pending } else { 0 };
            *window_end = Some(now + interval);
        }
    }

    /// Release memory held for expired accounting; called when idle
    pub(crate) fn compact(&mut self, now: Instant) {
        self.evict(now);
        if let Mode::Sliding { ticks, start } = &mut self.mode {
            if *start > 0 {
                ticks.drain(..*start);
                *start = 0;
            }
        }
    }

    /// Advance the start index past expired ticks; compact the backing
    /// buffer when the evicted prefix dominates it or everything expired
    fn evict(&mut self, now: Instant) {
        let Mode::Sliding { ticks, start } = &mut self.mode else {
            return;
        };
        let Some(cutoff) = now.checked_sub(self.interval) else {
            return;
        };
        while *start < ticks.len() && ticks[*start] <= cutoff {
            *start += 1;
        }
        if *start == ticks.len() {
            ticks.clear();
            *start = 0;
        } else if *start > TICK_COMPACT_THRESHOLD && *start * 2 > ticks.len() {
            ticks.drain(..*start);
            *start = 0;
        }
    }
}

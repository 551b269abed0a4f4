//! Per-calendar-day quota for the metered AI collaborator.
//!
//! The meter is a two-state machine (`Available` / `Blocked`) keyed by the
//! current calendar day. A stored count for any other day is treated as 0
//! when checked, without writing; the next increment overwrites it.
//!
//! Days are stored as `YYYY-MM-DD`. Records from early releases carry the
//! day as `Sun Oct 18 2026`; those still count for their day and are
//! rewritten in the current form by the next increment.
//!
//! [`QuotaMeter::increment`] is the gate itself, not an after-the-fact log:
//! callers check, increment, and only then perform the metered action. The
//! increment is a compare-and-swap on the stored record, so concurrent
//! writers sharing one medium never lose a count or overshoot the limit.

use std::fmt;
use std::sync::Arc;

use chrono::NaiveDate;
use serde::Serialize;
use tracing::{debug, info, instrument};

use crate::clock::Clock;
use crate::error::StoreResult;
use crate::keys;
use crate::models::AiUsage;
use crate::record::RecordStore;

/// Calls allowed per calendar day unless configured otherwise.
pub const DEFAULT_DAILY_LIMIT: u32 = 3;

/// Snapshot of today's usage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuotaStatus {
    pub count: u32,
    pub limit: u32,
    pub remaining: u32,
    pub is_blocked: bool,
}

impl QuotaStatus {
    fn new(count: u32, limit: u32) -> Self {
        Self {
            count,
            limit,
            remaining: limit.saturating_sub(count),
            is_blocked: count >= limit,
        }
    }
}

impl fmt::Display for QuotaStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{} used, {} remaining{}",
            self.count,
            self.limit,
            self.remaining,
            if self.is_blocked { " (blocked)" } else { "" }
        )
    }
}

/// Daily counter gating calls to a rate-limited service.
#[derive(Clone)]
pub struct QuotaMeter {
    store: RecordStore,
    clock: Arc<dyn Clock>,
    limit: u32,
}

impl QuotaMeter {
    /// Meter with [`DEFAULT_DAILY_LIMIT`].
    pub fn new(store: RecordStore, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            clock,
            limit: DEFAULT_DAILY_LIMIT,
        }
    }

    /// Override the daily limit.
    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = limit;
        self
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    /// Today's status. Never writes.
    pub fn check_status(&self) -> QuotaStatus {
        let today = self.clock.today();
        let usage: Option<AiUsage> = self.store.try_read(keys::AI_USAGE);
        let count = match usage {
            Some(u) if is_day(&u.date, today) => u.count,
            _ => 0,
        };
        QuotaStatus::new(count, self.limit)
    }

    /// Consume one unit of today's quota.
    ///
    /// When already blocked, nothing is written and the unchanged (blocked)
    /// status is returned.
    pub fn increment(&self) -> StoreResult<QuotaStatus> {
        self.consume().map(|(_, status)| status)
    }

    /// Consume one unit if any is left. `None` means the limit was already
    /// reached and nothing was consumed.
    pub fn try_acquire(&self) -> StoreResult<Option<QuotaStatus>> {
        let (consumed, status) = self.consume()?;
        Ok(consumed.then_some(status))
    }

    #[instrument(skip(self), fields(limit = self.limit))]
    fn consume(&self) -> StoreResult<(bool, QuotaStatus)> {
        let day = self.clock.today();
        let today = day_key(day);
        let limit = self.limit;
        let mut consumed = false;

        let usage = self.store.update(
            keys::AI_USAGE,
            || AiUsage {
                date: today.clone(),
                count: 0,
            },
            |usage| {
                consumed = false;
                if !is_day(&usage.date, day) {
                    usage.count = 0;
                }
                usage.date = today.clone();
                if usage.count >= limit {
                    return false;
                }
                usage.count += 1;
                consumed = true;
                true
            },
        )?;

        let status = QuotaStatus::new(usage.count, limit);
        if !consumed {
            info!(count = status.count, "daily quota exhausted");
        } else {
            debug!(count = status.count, remaining = status.remaining, "quota consumed");
        }
        Ok((consumed, status))
    }
}

fn day_key(day: NaiveDate) -> String {
    day.format("%Y-%m-%d").to_string()
}

/// Legacy day stamp, e.g. `Sun Oct 18 2026`.
const LEGACY_DAY_FORMAT: &str = "%a %b %d %Y";

/// Whether a stored day stamp, current or legacy, names `day`.
fn is_day(stored: &str, day: NaiveDate) -> bool {
    let stored = stored.trim();
    stored == day_key(day)
        || NaiveDate::parse_from_str(stored, LEGACY_DAY_FORMAT).is_ok_and(|d| d == day)
}

// ── tests ────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};

    use super::*;
    use crate::clock::ManualClock;

    fn setup(limit: u32) -> (RecordStore, ManualClock, QuotaMeter) {
        let store = RecordStore::in_memory();
        let clock = ManualClock::new(Utc.with_ymd_and_hms(2026, 10, 18, 9, 0, 0).unwrap());
        let meter = QuotaMeter::new(store.clone(), Arc::new(clock.clone())).with_limit(limit);
        (store, clock, meter)
    }

    #[test]
    fn fresh_day_is_available() {
        let (_, _, meter) = setup(3);
        let status = meter.check_status();
        assert_eq!(status, QuotaStatus::new(0, 3));
        assert!(!status.is_blocked);
    }

    #[test]
    fn quota_of_three_scenario() {
        let (_, _, meter) = setup(3);
        let remaining: Vec<u32> = (0..3).map(|_| meter.increment().unwrap().remaining).collect();
        assert_eq!(remaining, vec![2, 1, 0]);

        let fourth = meter.increment().unwrap();
        assert_eq!(fourth.remaining, 0);
        assert!(fourth.is_blocked);
        assert_eq!(fourth.count, 3);
    }

    #[test]
    fn boundary_holds_for_any_limit() {
        for limit in [1, 2, 5, 10] {
            let (_, _, meter) = setup(limit);
            for _ in 0..limit {
                meter.increment().unwrap();
            }
            assert!(meter.check_status().is_blocked);
            let after = meter.increment().unwrap();
            assert_eq!(after.count, limit);
            assert_eq!(meter.check_status().count, limit);
        }
    }

    #[test]
    fn zero_limit_is_always_blocked() {
        let (store, _, meter) = setup(0);
        assert!(meter.check_status().is_blocked);
        assert!(meter.increment().unwrap().is_blocked);
        assert!(!store.contains(keys::AI_USAGE));
    }

    #[test]
    fn rollover_reports_zero_without_writing() {
        let (store, clock, meter) = setup(3);
        for _ in 0..3 {
            meter.increment().unwrap();
        }
        let before = store.raw(keys::AI_USAGE);

        clock.advance(Duration::days(1));
        let status = meter.check_status();
        assert_eq!(status.count, 0);
        assert!(!status.is_blocked);
        assert_eq!(store.raw(keys::AI_USAGE), before);
    }

    #[test]
    fn increment_after_rollover_starts_new_day() {
        let (store, clock, meter) = setup(3);
        for _ in 0..3 {
            meter.increment().unwrap();
        }
        clock.advance(Duration::days(1));

        let status = meter.increment().unwrap();
        assert_eq!(status.count, 1);
        let usage: AiUsage = store.try_read(keys::AI_USAGE).unwrap();
        assert_eq!(usage.date, "2026-10-19");
    }

    #[test]
    fn legacy_day_stamp_still_counts_for_today() {
        let (store, clock, meter) = setup(3);
        store
            .write_raw(keys::AI_USAGE, r#"{"date":"Sun Oct 18 2026","count":2}"#)
            .unwrap();
        assert_eq!(meter.check_status().count, 2);

        let status = meter.increment().unwrap();
        assert_eq!(status.count, 3);
        assert!(status.is_blocked);
        let usage: AiUsage = store.try_read(keys::AI_USAGE).unwrap();
        assert_eq!(usage.date, "2026-10-18");

        clock.advance(Duration::days(1));
        store
            .write_raw(keys::AI_USAGE, r#"{"date":"Sun Oct 18 2026","count":3}"#)
            .unwrap();
        assert_eq!(meter.check_status().count, 0);
    }

    #[test]
    fn day_stamps_in_both_forms() {
        let day = NaiveDate::from_ymd_opt(2026, 10, 4).unwrap();
        assert!(is_day("2026-10-04", day));
        assert!(is_day("Sun Oct 04 2026", day));
        assert!(!is_day("Sat Oct 03 2026", day));
        assert!(!is_day("2026-10-03", day));
        assert!(!is_day("garbage", day));
    }

    #[test]
    fn corrupt_usage_record_counts_as_zero() {
        let (store, _, meter) = setup(3);
        store.write_raw(keys::AI_USAGE, "???").unwrap();
        assert_eq!(meter.check_status().count, 0);
        assert_eq!(meter.increment().unwrap().count, 1);
    }

    #[test]
    fn concurrent_increments_never_exceed_limit() {
        let (_, _, meter) = setup(50);
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let meter = meter.clone();
                std::thread::spawn(move || {
                    for _ in 0..20 {
                        meter.increment().unwrap();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        let status = meter.check_status();
        assert_eq!(status.count, 50);
        assert!(status.is_blocked);
    }

    #[test]
    fn try_acquire_reports_whether_a_unit_was_taken() {
        let (_, _, meter) = setup(2);
        assert_eq!(meter.try_acquire().unwrap().map(|s| s.count), Some(1));
        let last = meter.try_acquire().unwrap().unwrap();
        assert_eq!(last.count, 2);
        assert!(last.is_blocked);
        assert_eq!(meter.try_acquire().unwrap(), None);
    }

    #[test]
    fn status_display() {
        assert_eq!(QuotaStatus::new(1, 3).to_string(), "1/3 used, 2 remaining");
        assert_eq!(
            QuotaStatus::new(3, 3).to_string(),
            "3/3 used, 0 remaining (blocked)"
        );
    }
}

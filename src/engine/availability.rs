use std::collections::BTreeSet;

use chrono::{NaiveDate, NaiveDateTime};

use crate::model::*;

// ── Blocked-date calculation ──────────────────────────────────────

/// Every calendar day touched by `[start, end]`, both ends included.
///
/// Steps by calendar day rather than by 24 hours, so DST transitions never
/// skip or repeat a date. `start > end` yields an empty set.
pub fn expand_days(start: NaiveDateTime, end: NaiveDateTime) -> BTreeSet<NaiveDate> {
    let mut days = BTreeSet::new();
    if start > end {
        return days;
    }
    let last = end.date();
    let mut day = start.date();
    while day <= last {
        days.insert(day);
        match day.succ_opt() {
            Some(next) => day = next,
            None => break,
        }
    }
    days
}

/// Union of the days covered by each span.
pub fn expand_all<I>(spans: I) -> BTreeSet<NaiveDate>
where
    I: IntoIterator<Item = Span>,
{
    let mut days = BTreeSet::new();
    for span in spans {
        days.extend(expand_days(span.start, span.end));
    }
    days
}

/// Dates a booking calendar must grey out for one space.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockedDates {
    /// Anything before this day is in the past.
    pub today: NaiveDate,
    pub unavailable: BTreeSet<NaiveDate>,
    pub reserved: BTreeSet<NaiveDate>,
}

impl BlockedDates {
    pub fn new(today: NaiveDate, windows: &[UnavailabilityWindow], reservations: &[Reservation]) -> Self {
        Self {
            today,
            unavailable: expand_all(windows.iter().map(UnavailabilityWindow::span)),
            reserved: expand_all(reservations.iter().map(Reservation::span)),
        }
    }

    /// Nothing but the past is blocked.
    pub fn open(today: NaiveDate) -> Self {
        Self {
            today,
            unavailable: BTreeSet::new(),
            reserved: BTreeSet::new(),
        }
    }

    pub fn is_blocked(&self, date: NaiveDate) -> bool {
        date < self.today || self.unavailable.contains(&date) || self.reserved.contains(&date)
    }

    /// Free days in `[from, to]`, e.g. to render a month view.
    pub fn free_days(&self, from: NaiveDate, to: NaiveDate) -> Vec<NaiveDate> {
        from.iter_days()
            .take_while(|d| *d <= to)
            .filter(|d| !self.is_blocked(*d))
            .collect()
    }
}

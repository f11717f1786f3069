use chrono::{Datelike, NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;

use crate::defaults::fallback_price;
use crate::model::*;

/// End of the billing period starting at `start`, at 23:59:59.999.
///
/// Both plans use "advance the period, then step back to day zero":
/// - Monthly: month + 1 keeping the day of month (a day past the end of
///   that month spills into the one after), then day zero, i.e. the last
///   day of the preceding month. 2024-01-15 ends 2024-01-31, 2024-01-31
///   spills to 2024-03-02 and ends 2024-02-29.
/// - Yearly: year + 1, January, day zero, i.e. Dec 31 of the start year
///   (2024-03-10 ends 2024-12-31). The field description of the end date
///   reads as Dec 31 of the following year; the worked example wins.
///
/// `None` only outside chrono's representable range.
pub fn compute_end_date(kind: SubscriptionType, start: NaiveDateTime) -> Option<NaiveDateTime> {
    let last_day = match kind {
        SubscriptionType::Monthly => {
            let (mut year, mut month) = next_month(start.year(), start.month());
            if start.day() > days_in_month(year, month)? {
                (year, month) = next_month(year, month);
            }
            day_zero(year, month)?
        }
        SubscriptionType::Yearly => day_zero(start.year() + 1, 1)?,
    };
    last_day.and_hms_milli_opt(23, 59, 59, 999)
}

/// The catalog price for `kind`, or the built-in default when the catalog
/// has none.
pub fn plan_price(kind: SubscriptionType, catalog: &[Plan]) -> Decimal {
    catalog
        .iter()
        .find(|p| p.kind == kind)
        .map(|p| p.price)
        .unwrap_or_else(|| fallback_price(kind))
}

fn next_month(year: i32, month: u32) -> (i32, u32) {
    if month == 12 { (year + 1, 1) } else { (year, month + 1) }
}

/// Day 0 of a month: the last day of the month before it.
fn day_zero(year: i32, month: u32) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(year, month, 1)?.pred_opt()
}

fn days_in_month(year: i32, month: u32) -> Option<u32> {
    let (ny, nm) = next_month(year, month);
    day_zero(ny, nm).map(|d| d.day())
}

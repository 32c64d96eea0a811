//! Recurring date arithmetic.
//!
//! Month-based frequencies add calendar months and fall back to the last day
//! of the target month when the day does not exist there.

use crate::entities::recurring_template::Frequency;
use chrono::{Datelike, Days, Months, NaiveDate};

impl Frequency {
    /// Calendar months per period, `None` for day-based frequencies
    #[must_use]
    pub const fn months(self) -> Option<u32> {
        match self {
            Self::Weekly => None,
            Self::Monthly => Some(1),
            Self::Quarterly => Some(3),
            Self::Yearly => Some(12),
        }
    }
}

/// Date one period after `date`.
///
/// Returns `None` only when the result would leave chrono's supported range.
#[must_use]
pub fn next_occurrence(frequency: Frequency, date: NaiveDate) -> Option<NaiveDate> {
    match frequency.months() {
        None => date.checked_add_days(Days::new(7)),
        Some(months) => date.checked_add_months(Months::new(months)),
    }
}

/// Like [`next_occurrence`], but moves month-based results back to
/// `anchor_day` when the target month has that day.
///
/// Without the anchor a monthly schedule starting on the 31st drifts to the
/// 29th after February and stays there.
#[must_use]
pub fn next_occurrence_anchored(
    frequency: Frequency,
    date: NaiveDate,
    anchor_day: u32,
) -> Option<NaiveDate> {
    let next = next_occurrence(frequency, date)?;
    if frequency.months().is_none() || next.day() >= anchor_day {
        return Some(next);
    }
    let clamped = anchor_day.min(last_day_of_month(next.year(), next.month())?);
    next.with_day(clamped)
}

/// Last calendar day of `month` in `year`
#[must_use]
pub fn last_day_of_month(year: i32, month: u32) -> Option<u32> {
    let first = NaiveDate::from_ymd_opt(year, month, 1)?;
    let first_of_next = first.checked_add_months(Months::new(1))?;
    first_of_next.pred_opt().map(|d| d.day())
}

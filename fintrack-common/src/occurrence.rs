use chrono::{Duration, Months, NaiveDateTime};

use crate::types::Frequency;

/// Computes the instant at which a recurring transaction fires next, one
/// frequency unit after `base`.
///
/// Calendar-unit frequencies (MONTHLY, QUARTERLY, YEARLY) preserve the
/// day-of-month. When the target month is shorter, the result clamps to the
/// last day of that month (Jan 31 + 1 month = Feb 28, or Feb 29 in a leap
/// year). The time of day is always preserved.
pub fn next_occurrence(base: NaiveDateTime, frequency: Frequency) -> NaiveDateTime {
    match frequency {
        Frequency::Daily => base + Duration::days(1),
        Frequency::Weekly => base + Duration::days(7),
        Frequency::Biweekly => base + Duration::days(14),
        Frequency::Monthly => base + Months::new(1),
        Frequency::Quarterly => base + Months::new(3),
        Frequency::Yearly => base + Months::new(12),
    }
}

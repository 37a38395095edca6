/// Pro-rated billing for mid-month enrollments.
///
/// Formula: (cycle fee / total days in month) x days remaining, rounded
/// half-up at the cent. All arithmetic is done in integer cents so the
/// displayed figures and the charged figures can never drift apart.
use chrono::{Datelike, NaiveDate};
use serde::Serialize;

use crate::config::BillingSettings;
use crate::errors::AppError;
use crate::models::{BillingCycle, Money};

/// Total days in the calendar month containing `date`, leap years included.
/// Computed as the day before the 1st of the following month.
pub fn total_days_in_month(date: NaiveDate) -> u32 {
    let (year, month) = if date.month() == 12 {
        (date.year() + 1, 1)
    } else {
        (date.year(), date.month() + 1)
    };
    let first_of_next = NaiveDate::from_ymd_opt(year, month, 1)
        .expect("first of month is always a valid date");
    first_of_next
        .pred_opt()
        .expect("date has a predecessor")
        .day()
}

/// Days remaining in the month from `date`, inclusive of `date` itself.
pub fn days_remaining_in_month(date: NaiveDate) -> u32 {
    total_days_in_month(date) - date.day() + 1
}

/// Whether a first-cycle charge should be pro-rated.
///
/// Pro-rating applies only when the payment recurs, the enrollment is after
/// the 1st of its month, and the course has already started. Enrolling on or
/// before the course start means billing begins with the course's first full
/// month, so there is no partial period.
pub fn should_prorate(
    enrollment_date: NaiveDate,
    course_start_date: Option<NaiveDate>,
    billing_cycle: BillingCycle,
) -> bool {
    if billing_cycle == BillingCycle::OneTime {
        return false;
    }

    if enrollment_date.day() == 1 {
        return false;
    }

    if let Some(start_date) = course_start_date {
        if enrollment_date <= start_date {
            return false;
        }
    }

    true
}

/// Pro-rated fee for the first billing cycle.
///
/// Returns the full fee unchanged when pro-rating does not apply.
pub fn prorated_fee(
    full_fee: Money,
    enrollment_date: NaiveDate,
    course_start_date: Option<NaiveDate>,
    billing_cycle: BillingCycle,
) -> Money {
    if !should_prorate(enrollment_date, course_start_date, billing_cycle) {
        return full_fee;
    }

    let total_days = total_days_in_month(enrollment_date) as i128;
    let days_remaining = days_remaining_in_month(enrollment_date) as i128;
    let scaled = full_fee.cents() as i128 * days_remaining;

    // Round half-up at the cent: floor((2n + d) / 2d) for non-negative n.
    let cents = (scaled * 2 + total_days) / (total_days * 2);
    Money::from_cents(cents as i64)
}

/// Pro-rating breakdown for display. Bit-exact with [`prorated_fee`].
#[derive(Debug, Clone, Serialize)]
pub struct ProrationInfo {
    pub is_prorated: bool,
    pub prorated_fee: Money,
    pub full_fee: Money,
    pub days_remaining: u32,
    pub total_days: u32,
    pub savings_amount: Money,
}

/// Compute the full pro-rating breakdown for an enrollment.
///
/// Fails fast on a negative fee; fees come from course records and must be
/// non-negative by contract.
pub fn proration_info(
    full_fee: Money,
    enrollment_date: NaiveDate,
    course_start_date: Option<NaiveDate>,
    billing_cycle: BillingCycle,
) -> Result<ProrationInfo, AppError> {
    if full_fee.is_negative() {
        return Err(AppError::InvalidInput(format!(
            "course fee cannot be negative: {}",
            full_fee
        )));
    }

    let is_prorated = should_prorate(enrollment_date, course_start_date, billing_cycle);
    let fee = prorated_fee(full_fee, enrollment_date, course_start_date, billing_cycle);

    Ok(ProrationInfo {
        is_prorated,
        prorated_fee: fee,
        full_fee,
        days_remaining: days_remaining_in_month(enrollment_date),
        total_days: total_days_in_month(enrollment_date),
        savings_amount: if is_prorated {
            full_fee - fee
        } else {
            Money::ZERO
        },
    })
}

/// The next date a recurring charge is raised after `from`, on the
/// configured billing day. `None` for one-time fees.
///
/// The billing day is clamped to the target month's length, so a billing day
/// of 31 lands on Feb 29 in a leap year.
pub fn next_billing_date(
    from: NaiveDate,
    billing_cycle: BillingCycle,
    settings: &BillingSettings,
) -> Option<NaiveDate> {
    let months = billing_cycle.months()?;

    let zero_based = from.month0() + months;
    let year = from.year() + (zero_based / 12) as i32;
    let month = zero_based % 12 + 1;

    let anchor = NaiveDate::from_ymd_opt(year, month, 1)
        .expect("first of month is always a valid date");
    let day = settings.billing_day.min(total_days_in_month(anchor));

    NaiveDate::from_ymd_opt(year, month, day)
}

/// The date an account is closed: the configured closure day/month of the
/// calendar year in which the holder turns 30. Closure runs on this set
/// date, not on the individual birthday.
pub fn account_closure_date(date_of_birth: NaiveDate, settings: &BillingSettings) -> NaiveDate {
    let year = date_of_birth.year() + 30;
    let anchor = NaiveDate::from_ymd_opt(year, settings.closure_month, 1)
        .expect("validated closure month");
    let day = settings.closure_day.min(total_days_in_month(anchor));

    NaiveDate::from_ymd_opt(year, settings.closure_month, day)
        .expect("clamped closure day is always valid")
}

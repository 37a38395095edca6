/// Property-based tests using proptest
/// Tests invariants that should hold for all inputs
use chrono::{Duration, NaiveDate, TimeZone, Utc};
use proptest::prelude::*;

use edu_accounts_api::billing::{
    days_remaining_in_month, prorated_fee, total_days_in_month,
};
use edu_accounts_api::education::resolve_education_level;
use edu_accounts_api::ledger::with_running_balance;
use edu_accounts_api::models::{
    BillingCycle, Course, EducationLevel, Enrollment, EnrollmentStatus, EnrollmentWithCourse,
    Money, Transaction, TransactionStatus, TransactionType,
};
use edu_accounts_api::targeting::age_in_years;
use uuid::Uuid;

fn arb_date() -> impl Strategy<Value = NaiveDate> {
    (1990i32..2100, 1u32..=12, 1u32..=31)
        .prop_filter_map("invalid calendar date", |(y, m, d)| {
            NaiveDate::from_ymd_opt(y, m, d)
        })
}

fn arb_level() -> impl Strategy<Value = EducationLevel> {
    prop::sample::select(vec![
        EducationLevel::Primary,
        EducationLevel::Secondary,
        EducationLevel::PostSecondary,
        EducationLevel::Tertiary,
        EducationLevel::Postgraduate,
    ])
}

fn test_transaction(amount_cents: i64, offset_minutes: i64) -> Transaction {
    let base = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    Transaction {
        id: Uuid::new_v4(),
        account_id: Uuid::new_v4(),
        transaction_type: TransactionType::TopUp,
        amount: Money::from_cents(amount_cents),
        description: None,
        reference: None,
        status: TransactionStatus::Completed,
        created_at: base + Duration::minutes(offset_minutes),
    }
}

fn test_enrollment(level: Option<EducationLevel>) -> EnrollmentWithCourse {
    EnrollmentWithCourse {
        enrollment: Enrollment {
            id: Uuid::new_v4(),
            account_id: Uuid::new_v4(),
            course_id: Uuid::new_v4(),
            enrollment_date: NaiveDate::from_ymd_opt(2024, 1, 15).unwrap(),
            status: EnrollmentStatus::Active,
            created_at: Utc::now(),
            updated_at: None,
        },
        course: Course {
            id: Uuid::new_v4(),
            name: "Course".to_string(),
            provider: "Provider".to_string(),
            fee: Money::from_cents(1_000),
            billing_cycle: BillingCycle::Monthly,
            course_run_start: None,
            course_run_end: None,
            education_level: level,
            created_at: Utc::now(),
        },
    }
}

// Property: the month partitions into elapsed days and remaining days
proptest! {
    #[test]
    fn days_remaining_partitions_the_month(date in arb_date()) {
        use chrono::Datelike;
        let total = total_days_in_month(date);
        let remaining = days_remaining_in_month(date);
        prop_assert_eq!(remaining + (date.day() - 1), total);
        prop_assert!(remaining >= 1);
        prop_assert!((28..=31).contains(&total));
    }
}

// Property: pro-rating never charges more than the full fee or less than zero
proptest! {
    #[test]
    fn prorated_fee_bounded_by_full_fee(
        fee_cents in 0i64..100_000_000,
        date in arb_date(),
    ) {
        let full = Money::from_cents(fee_cents);
        let prorated = prorated_fee(full, date, None, BillingCycle::Monthly);
        prop_assert!(prorated >= Money::ZERO);
        prop_assert!(prorated <= full);
    }

    #[test]
    fn first_of_month_always_full_fee(
        fee_cents in 0i64..100_000_000,
        year in 1990i32..2100,
        month in 1u32..=12,
    ) {
        let date = NaiveDate::from_ymd_opt(year, month, 1).unwrap();
        let full = Money::from_cents(fee_cents);
        prop_assert_eq!(prorated_fee(full, date, None, BillingCycle::Monthly), full);
    }

    #[test]
    fn one_time_fees_never_change(
        fee_cents in 0i64..100_000_000,
        date in arb_date(),
    ) {
        let full = Money::from_cents(fee_cents);
        prop_assert_eq!(prorated_fee(full, date, None, BillingCycle::OneTime), full);
    }
}

// Property: ledger reconstruction is exact in integer cents
proptest! {
    #[test]
    fn latest_ledger_entry_matches_current_balance(
        balance_cents in -1_000_000i64..1_000_000,
        amounts in prop::collection::vec(-100_000i64..100_000, 0..50),
    ) {
        let transactions: Vec<Transaction> = amounts
            .iter()
            .enumerate()
            .map(|(i, &cents)| test_transaction(cents, i as i64))
            .collect();

        let entries = with_running_balance(Money::from_cents(balance_cents), transactions);

        if let Some(latest) = entries.first() {
            prop_assert_eq!(latest.balance_after, Money::from_cents(balance_cents));
        }
        // Each entry differs from the next-older one by exactly its amount
        for pair in entries.windows(2) {
            prop_assert_eq!(
                pair[0].balance_after - pair[0].transaction.amount,
                pair[1].balance_after
            );
        }
    }
}

// Property: education-level resolution ignores enrollment order
proptest! {
    #[test]
    fn resolution_is_order_independent(
        levels in prop::collection::vec(prop::option::of(arb_level()), 0..8),
    ) {
        let forward: Vec<_> = levels.iter().map(|l| test_enrollment(*l)).collect();
        let mut backward = forward.clone();
        backward.reverse();

        prop_assert_eq!(
            resolve_education_level(&forward),
            resolve_education_level(&backward)
        );
    }

    #[test]
    fn resolved_level_is_maximum_priority(
        levels in prop::collection::vec(arb_level(), 1..8),
    ) {
        let enrollments: Vec<_> = levels.iter().map(|l| test_enrollment(Some(*l))).collect();
        let expected = levels.iter().copied().max_by_key(|l| l.priority());
        prop_assert_eq!(resolve_education_level(&enrollments), expected);
    }
}

// Property: money survives a string round trip
proptest! {
    #[test]
    fn money_string_round_trip(cents in -1_000_000_000i64..1_000_000_000) {
        let money = Money::from_cents(cents);
        let parsed: Money = money.to_string().parse().unwrap();
        prop_assert_eq!(parsed, money);
    }

    #[test]
    fn money_parse_never_panics(s in "\\PC*") {
        let _ = s.parse::<Money>();
    }
}

// Property: age is exact-calendar and monotonic in the observation date
proptest! {
    #[test]
    fn age_increments_exactly_on_birthdays(dob in arb_date(), years_later in 0u32..80) {
        use chrono::Datelike;
        // Observe on the anniversary date itself (skip Feb 29 birthdays,
        // which have no anniversary in common years)
        if let Some(on) = NaiveDate::from_ymd_opt(
            dob.year() + years_later as i32,
            dob.month(),
            dob.day(),
        ) {
            prop_assert_eq!(age_in_years(dob, on), years_later);
            // The day before, the age is one less (or zero at the floor)
            let before = on.pred_opt().unwrap();
            prop_assert_eq!(
                age_in_years(dob, before),
                years_later.saturating_sub(1)
            );
        }
    }
}

/// Unit tests for batch top-up targeting
/// Tests the age function, criteria matching, the education-account gate,
/// and the structured remarks blob
use chrono::{NaiveDate, Utc};
use edu_accounts_api::models::{
    AccountHolder, AccountStatus, AccountType, EducationLevel, Money, ResidentialStatus,
};
use edu_accounts_api::targeting::{
    age_in_years, BatchRemarks, EducationLevelFilter, SchoolingStatus, Targeting,
    TargetingCriteria,
};
use uuid::Uuid;

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn account(age_years: i32, balance_cents: i64, level: Option<EducationLevel>) -> AccountHolder {
    AccountHolder {
        id: Uuid::new_v4(),
        name: "Test Holder".to_string(),
        nric: "S1234567A".to_string(),
        // Born on Jan 1, so the age is exact for any mid-year "today"
        date_of_birth: date(2024 - age_years, 1, 1),
        balance: Money::from_cents(balance_cents),
        education_level: level,
        status: AccountStatus::Active,
        account_type: AccountType::Education,
        residential_status: ResidentialStatus::Citizen,
        created_at: Utc::now(),
        updated_at: None,
    }
}

fn today() -> NaiveDate {
    date(2024, 6, 15)
}

fn not_in_school(_: Uuid) -> bool {
    false
}

#[cfg(test)]
mod age_tests {
    use super::*;

    #[test]
    fn test_age_before_birthday_in_year() {
        assert_eq!(age_in_years(date(2000, 9, 10), date(2024, 6, 15)), 23);
    }

    #[test]
    fn test_age_on_birthday() {
        assert_eq!(age_in_years(date(2000, 6, 15), date(2024, 6, 15)), 24);
    }

    #[test]
    fn test_age_after_birthday_in_year() {
        assert_eq!(age_in_years(date(2000, 2, 1), date(2024, 6, 15)), 24);
    }

    #[test]
    fn test_age_never_negative() {
        assert_eq!(age_in_years(date(2025, 1, 1), date(2024, 6, 15)), 0);
    }
}

#[cfg(test)]
mod criteria_tests {
    use super::*;

    fn customized(criteria: TargetingCriteria) -> Targeting {
        Targeting::Customized { criteria }
    }

    #[test]
    fn test_age_and_balance_ranges_inclusive() {
        let targeting = customized(TargetingCriteria {
            min_age: Some(18),
            max_age: Some(30),
            min_balance: Some(Money::from_cents(10_000)),
            max_balance: Some(Money::from_cents(50_000)),
            ..Default::default()
        });

        // Age 25, balance $200: inside both ranges
        let a = account(25, 20_000, None);
        assert!(targeting.matches(&a, today(), &not_in_school));

        // Boundary values are accepted
        let a = account(18, 10_000, None);
        assert!(targeting.matches(&a, today(), &not_in_school));
        let a = account(30, 50_000, None);
        assert!(targeting.matches(&a, today(), &not_in_school));
    }

    #[test]
    fn test_balance_above_max_rejected() {
        let targeting = customized(TargetingCriteria {
            min_age: Some(18),
            max_age: Some(30),
            min_balance: Some(Money::from_cents(10_000)),
            max_balance: Some(Money::from_cents(15_000)),
            ..Default::default()
        });

        let a = account(25, 20_000, None);
        assert!(!targeting.matches(&a, today(), &not_in_school));
    }

    #[test]
    fn test_age_outside_range_rejected() {
        let targeting = customized(TargetingCriteria {
            min_age: Some(18),
            max_age: Some(30),
            ..Default::default()
        });

        assert!(!targeting.matches(&account(17, 0, None), today(), &not_in_school));
        assert!(!targeting.matches(&account(31, 0, None), today(), &not_in_school));
    }

    #[test]
    fn test_education_filter_any_entry_accepts() {
        let targeting = customized(TargetingCriteria {
            education_status: vec![
                EducationLevelFilter::Secondary,
                EducationLevelFilter::Tertiary,
            ],
            ..Default::default()
        });

        assert!(targeting.matches(
            &account(20, 0, Some(EducationLevel::Tertiary)),
            today(),
            &not_in_school
        ));
        assert!(!targeting.matches(
            &account(20, 0, Some(EducationLevel::Primary)),
            today(),
            &not_in_school
        ));
        assert!(!targeting.matches(&account(20, 0, None), today(), &not_in_school));
    }

    #[test]
    fn test_none_sentinel_accepts_unset_level() {
        let targeting = customized(TargetingCriteria {
            education_status: vec![EducationLevelFilter::None],
            ..Default::default()
        });

        assert!(targeting.matches(&account(20, 0, None), today(), &not_in_school));
        assert!(!targeting.matches(
            &account(20, 0, Some(EducationLevel::Primary)),
            today(),
            &not_in_school
        ));
    }

    #[test]
    fn test_schooling_status() {
        let holder = account(20, 0, None);
        let in_school = |id: Uuid| id == holder.id;

        let wants_in_school = customized(TargetingCriteria {
            schooling_status: SchoolingStatus::InSchool,
            ..Default::default()
        });
        assert!(wants_in_school.matches(&holder, today(), &in_school));
        assert!(!wants_in_school.matches(&holder, today(), &not_in_school));

        let wants_not_in_school = customized(TargetingCriteria {
            schooling_status: SchoolingStatus::NotInSchool,
            ..Default::default()
        });
        assert!(!wants_not_in_school.matches(&holder, today(), &in_school));
        assert!(wants_not_in_school.matches(&holder, today(), &not_in_school));
    }
}

#[cfg(test)]
mod gate_tests {
    use super::*;

    #[test]
    fn test_everyone_still_requires_active_education_account() {
        let targeting = Targeting::Everyone;

        assert!(targeting.matches(&account(20, 0, None), today(), &not_in_school));

        let mut inactive = account(20, 0, None);
        inactive.status = AccountStatus::Inactive;
        assert!(!targeting.matches(&inactive, today(), &not_in_school));

        let mut student = account(20, 0, None);
        student.account_type = AccountType::Student;
        assert!(!targeting.matches(&student, today(), &not_in_school));

        let mut foreigner = account(20, 0, None);
        foreigner.residential_status = ResidentialStatus::Foreigner;
        assert!(!targeting.matches(&foreigner, today(), &not_in_school));
    }

    #[test]
    fn test_eligible_accounts_preserves_order() {
        let a = account(20, 0, None);
        let b = account(22, 0, None);
        let mut c = account(24, 0, None);
        c.status = AccountStatus::Pending;
        let accounts = vec![a.clone(), b.clone(), c];

        let eligible = Targeting::Everyone.eligible_accounts(&accounts, today(), &not_in_school);
        let ids: Vec<Uuid> = eligible.iter().map(|a| a.id).collect();
        assert_eq!(ids, vec![a.id, b.id]);
    }
}

#[cfg(test)]
mod remarks_tests {
    use super::*;

    #[test]
    fn test_targeting_serde_carries_discriminator() {
        let everyone = serde_json::to_value(Targeting::Everyone).unwrap();
        assert_eq!(everyone["targetingType"], "everyone");

        let customized = serde_json::to_value(Targeting::Customized {
            criteria: TargetingCriteria {
                min_age: Some(18),
                ..Default::default()
            },
        })
        .unwrap();
        assert_eq!(customized["targetingType"], "customized");
        assert_eq!(customized["criteria"]["minAge"], 18);
    }

    #[test]
    fn test_remarks_blob_round_trip() {
        let remarks = BatchRemarks {
            description: "June top-up".to_string(),
            internal_remark: Some("approved by finance".to_string()),
            reference_id: "BATCH-1718000000000".to_string(),
            targeting: Targeting::Customized {
                criteria: TargetingCriteria {
                    min_age: Some(18),
                    max_age: Some(30),
                    education_status: vec![EducationLevelFilter::Tertiary],
                    ..Default::default()
                },
            },
            eligible_account_count: 42,
        };

        let blob = serde_json::to_string(&remarks).unwrap();
        assert!(blob.contains("targetingType"));

        let parsed = BatchRemarks::from_remarks(&blob).unwrap();
        assert_eq!(parsed.reference_id, remarks.reference_id);
        assert_eq!(parsed.eligible_account_count, 42);
        match parsed.targeting {
            Targeting::Customized { criteria } => {
                assert_eq!(criteria.min_age, Some(18));
                assert_eq!(criteria.education_status, vec![EducationLevelFilter::Tertiary]);
            }
            Targeting::Everyone => panic!("expected customized targeting"),
        }
    }

    #[test]
    fn test_legacy_free_form_remarks_yield_none() {
        assert!(BatchRemarks::from_remarks("manual top-up, see ticket 123").is_none());
        assert!(BatchRemarks::from_remarks("").is_none());
    }
}

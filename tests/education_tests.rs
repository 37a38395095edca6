/// Unit tests for education-level derivation
/// Tests the priority ordering, the active-enrollment filter, and display labels
use chrono::{NaiveDate, Utc};
use edu_accounts_api::education::{format_education_level, resolve_education_level};
use edu_accounts_api::models::{
    BillingCycle, Course, EducationLevel, Enrollment, EnrollmentStatus, EnrollmentWithCourse,
    Money,
};
use uuid::Uuid;

fn enrollment_with_course(
    status: EnrollmentStatus,
    level: Option<EducationLevel>,
) -> EnrollmentWithCourse {
    let course_id = Uuid::new_v4();
    EnrollmentWithCourse {
        enrollment: Enrollment {
            id: Uuid::new_v4(),
            account_id: Uuid::new_v4(),
            course_id,
            enrollment_date: NaiveDate::from_ymd_opt(2024, 2, 15).unwrap(),
            status,
            created_at: Utc::now(),
            updated_at: None,
        },
        course: Course {
            id: course_id,
            name: "Test Course".to_string(),
            provider: "Test Provider".to_string(),
            fee: Money::from_cents(10_000),
            billing_cycle: BillingCycle::Monthly,
            course_run_start: None,
            course_run_end: None,
            education_level: level,
            created_at: Utc::now(),
        },
    }
}

#[cfg(test)]
mod resolution_tests {
    use super::*;

    #[test]
    fn test_no_enrollments_resolves_to_none() {
        assert_eq!(resolve_education_level(&[]), None);
    }

    #[test]
    fn test_single_active_enrollment() {
        let enrollments = vec![enrollment_with_course(
            EnrollmentStatus::Active,
            Some(EducationLevel::Secondary),
        )];
        assert_eq!(
            resolve_education_level(&enrollments),
            Some(EducationLevel::Secondary)
        );
    }

    #[test]
    fn test_highest_priority_wins() {
        let enrollments = vec![
            enrollment_with_course(EnrollmentStatus::Active, Some(EducationLevel::Primary)),
            enrollment_with_course(EnrollmentStatus::Active, Some(EducationLevel::Tertiary)),
            enrollment_with_course(EnrollmentStatus::Active, Some(EducationLevel::Secondary)),
        ];
        assert_eq!(
            resolve_education_level(&enrollments),
            Some(EducationLevel::Tertiary)
        );
    }

    #[test]
    fn test_order_does_not_matter() {
        let forward = vec![
            enrollment_with_course(EnrollmentStatus::Active, Some(EducationLevel::Postgraduate)),
            enrollment_with_course(EnrollmentStatus::Active, Some(EducationLevel::Primary)),
        ];
        let backward = vec![
            enrollment_with_course(EnrollmentStatus::Active, Some(EducationLevel::Primary)),
            enrollment_with_course(EnrollmentStatus::Active, Some(EducationLevel::Postgraduate)),
        ];
        assert_eq!(
            resolve_education_level(&forward),
            resolve_education_level(&backward)
        );
        assert_eq!(
            resolve_education_level(&forward),
            Some(EducationLevel::Postgraduate)
        );
    }

    #[test]
    fn test_courses_without_level_skipped() {
        let enrollments = vec![
            enrollment_with_course(EnrollmentStatus::Active, None),
            enrollment_with_course(EnrollmentStatus::Active, Some(EducationLevel::Primary)),
        ];
        assert_eq!(
            resolve_education_level(&enrollments),
            Some(EducationLevel::Primary)
        );

        let unset_only = vec![enrollment_with_course(EnrollmentStatus::Active, None)];
        assert_eq!(resolve_education_level(&unset_only), None);
    }

    #[test]
    fn test_non_active_enrollments_ignored() {
        let enrollments = vec![
            enrollment_with_course(EnrollmentStatus::Completed, Some(EducationLevel::Postgraduate)),
            enrollment_with_course(EnrollmentStatus::Withdrawn, Some(EducationLevel::Tertiary)),
            enrollment_with_course(EnrollmentStatus::Active, Some(EducationLevel::Secondary)),
        ];
        assert_eq!(
            resolve_education_level(&enrollments),
            Some(EducationLevel::Secondary)
        );
    }
}

#[cfg(test)]
mod label_tests {
    use super::*;

    #[test]
    fn test_labels() {
        assert_eq!(format_education_level(None), "Not Set");
        assert_eq!(format_education_level(Some(EducationLevel::Primary)), "Primary");
        assert_eq!(
            format_education_level(Some(EducationLevel::PostSecondary)),
            "Post-Secondary"
        );
        assert_eq!(
            format_education_level(Some(EducationLevel::Postgraduate)),
            "Post-Graduate"
        );
    }
}

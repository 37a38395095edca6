/// Education-level derivation from active enrollments.
///
/// An account holder's aggregate level is the highest-priority level among
/// the courses they are actively enrolled in (see the priority table on
/// `EducationLevel`).
use crate::models::{EducationLevel, EnrollmentStatus, EnrollmentWithCourse};

/// Resolve the aggregate education level from a holder's enrollments.
///
/// Only `active` enrollments count; the filter is applied here so a caller
/// passing an unfiltered list cannot inflate the derived level. Enrollments
/// whose course has no level set are skipped. Returns `None` when nothing
/// qualifies.
pub fn resolve_education_level(enrollments: &[EnrollmentWithCourse]) -> Option<EducationLevel> {
    let mut highest: Option<EducationLevel> = None;

    for enrollment in enrollments {
        if enrollment.enrollment.status != EnrollmentStatus::Active {
            continue;
        }
        let Some(level) = enrollment.course.education_level else {
            continue;
        };

        if highest.map_or(0, |h| h.priority()) < level.priority() {
            highest = Some(level);
        }
    }

    highest
}

/// Human label for an education level; a missing level reads "Not Set".
pub fn format_education_level(level: Option<EducationLevel>) -> &'static str {
    match level {
        None => "Not Set",
        Some(EducationLevel::Primary) => "Primary",
        Some(EducationLevel::Secondary) => "Secondary",
        Some(EducationLevel::PostSecondary) => "Post-Secondary",
        Some(EducationLevel::Tertiary) => "Tertiary",
        Some(EducationLevel::Postgraduate) => "Post-Graduate",
    }
}

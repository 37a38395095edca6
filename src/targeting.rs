/// Batch top-up targeting.
///
/// A scheduled batch top-up stores who it applies to as a structured remarks
/// blob; eligibility is recomputed from those criteria whenever the batch is
/// previewed or executed. Targeting is a tagged union rather than a loose
/// bag of fields: either everyone, or an explicit criteria record.
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{is_education_account, AccountHolder, AccountStatus, EducationLevel, Money};

/// Exact calendar age in whole years at `on`.
///
/// This is the single age function used by both eligibility previews and
/// batch execution; the count decrements by one before the birthday in the
/// current year. Never negative.
pub fn age_in_years(date_of_birth: NaiveDate, on: NaiveDate) -> u32 {
    let mut years = on.year() - date_of_birth.year();
    if (on.month(), on.day()) < (date_of_birth.month(), date_of_birth.day()) {
        years -= 1;
    }
    years.max(0) as u32
}

/// Schooling-status criterion: whether the holder has at least one active
/// enrollment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchoolingStatus {
    #[default]
    All,
    InSchool,
    NotInSchool,
}

/// One entry of the education-level criterion. `None` is the sentinel that
/// accepts holders without a level set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EducationLevelFilter {
    None,
    Primary,
    Secondary,
    PostSecondary,
    Tertiary,
    Postgraduate,
}

impl EducationLevelFilter {
    pub fn accepts(self, level: Option<EducationLevel>) -> bool {
        match (self, level) {
            (EducationLevelFilter::None, None) => true,
            (EducationLevelFilter::Primary, Some(EducationLevel::Primary)) => true,
            (EducationLevelFilter::Secondary, Some(EducationLevel::Secondary)) => true,
            (EducationLevelFilter::PostSecondary, Some(EducationLevel::PostSecondary)) => true,
            (EducationLevelFilter::Tertiary, Some(EducationLevel::Tertiary)) => true,
            (EducationLevelFilter::Postgraduate, Some(EducationLevel::Postgraduate)) => true,
            _ => false,
        }
    }
}

impl From<EducationLevel> for EducationLevelFilter {
    fn from(level: EducationLevel) -> Self {
        match level {
            EducationLevel::Primary => EducationLevelFilter::Primary,
            EducationLevel::Secondary => EducationLevelFilter::Secondary,
            EducationLevel::PostSecondary => EducationLevelFilter::PostSecondary,
            EducationLevel::Tertiary => EducationLevelFilter::Tertiary,
            EducationLevel::Postgraduate => EducationLevelFilter::Postgraduate,
        }
    }
}

/// Customized targeting criteria. Every present field must be satisfied;
/// absent fields impose no constraint. Age and balance bounds are inclusive.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TargetingCriteria {
    pub min_age: Option<u32>,
    pub max_age: Option<u32>,
    pub min_balance: Option<Money>,
    pub max_balance: Option<Money>,
    /// Accepted levels; empty means no education-level constraint.
    pub education_status: Vec<EducationLevelFilter>,
    pub schooling_status: SchoolingStatus,
}

impl TargetingCriteria {
    fn matches<F>(&self, account: &AccountHolder, today: NaiveDate, is_in_school: &F) -> bool
    where
        F: Fn(Uuid) -> bool,
    {
        if self.min_age.is_some() || self.max_age.is_some() {
            let age = age_in_years(account.date_of_birth, today);
            if self.min_age.is_some_and(|min| age < min) {
                return false;
            }
            if self.max_age.is_some_and(|max| age > max) {
                return false;
            }
        }

        if self.min_balance.is_some_and(|min| account.balance < min) {
            return false;
        }
        if self.max_balance.is_some_and(|max| account.balance > max) {
            return false;
        }

        if !self.education_status.is_empty()
            && !self
                .education_status
                .iter()
                .any(|filter| filter.accepts(account.education_level))
        {
            return false;
        }

        match self.schooling_status {
            SchoolingStatus::All => true,
            SchoolingStatus::InSchool => is_in_school(account.id),
            SchoolingStatus::NotInSchool => !is_in_school(account.id),
        }
    }
}

/// Who a batch top-up applies to.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "targetingType", rename_all = "snake_case")]
pub enum Targeting {
    /// Every active education account.
    Everyone,
    /// Active education accounts matching the criteria.
    Customized { criteria: TargetingCriteria },
}

impl Targeting {
    /// Whether `account` is eligible under this targeting as of `today`.
    ///
    /// Only active education accounts are ever candidates; that gate is the
    /// first check regardless of the targeting mode.
    pub fn matches<F>(&self, account: &AccountHolder, today: NaiveDate, is_in_school: &F) -> bool
    where
        F: Fn(Uuid) -> bool,
    {
        if account.status != AccountStatus::Active
            || !is_education_account(account.account_type, account.residential_status)
        {
            return false;
        }

        match self {
            Targeting::Everyone => true,
            Targeting::Customized { criteria } => criteria.matches(account, today, is_in_school),
        }
    }

    /// Filter `accounts` down to the eligible ones, preserving order.
    pub fn eligible_accounts<'a, F>(
        &self,
        accounts: &'a [AccountHolder],
        today: NaiveDate,
        is_in_school: &F,
    ) -> Vec<&'a AccountHolder>
    where
        F: Fn(Uuid) -> bool,
    {
        accounts
            .iter()
            .filter(|account| self.matches(account, today, is_in_school))
            .collect()
    }
}

/// Structured remarks stored on a batch schedule.
///
/// Serialized as a single JSON blob in the schedule's `remarks` column, with
/// the targeting union flattened in (so the blob carries the
/// `targetingType` discriminator alongside the descriptive fields).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchRemarks {
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub internal_remark: Option<String>,
    pub reference_id: String,
    #[serde(flatten)]
    pub targeting: Targeting,
    pub eligible_account_count: usize,
}

impl BatchRemarks {
    /// Parse the remarks blob stored on a batch schedule.
    ///
    /// Legacy schedules may hold free-form text here; those yield `None`
    /// and the caller treats the eligible set as empty.
    pub fn from_remarks(remarks: &str) -> Option<Self> {
        serde_json::from_str(remarks).ok()
    }
}

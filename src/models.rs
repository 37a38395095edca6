use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use bigdecimal::num_bigint::BigInt;
use bigdecimal::rounding::RoundingMode;
use bigdecimal::{BigDecimal, ToPrimitive};

// ============ Money ============

/// A monetary amount held in integer minor units (cents).
///
/// Balances and fees are accumulated in cents so that ledger reconstruction
/// is exact; `BigDecimal` is only used when crossing the database boundary.
/// Positive amounts are credits, negative amounts are debits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Money(i64);

impl Money {
    pub const ZERO: Money = Money(0);

    pub fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    pub fn cents(self) -> i64 {
        self.0
    }

    pub fn is_negative(self) -> bool {
        self.0 < 0
    }

    pub fn is_positive(self) -> bool {
        self.0 > 0
    }

    /// Convert a database `NUMERIC` value, rounding half-up at the cent.
    pub fn from_bigdecimal(value: &BigDecimal) -> Result<Self, ParseMoneyError> {
        let scaled = value.with_scale_round(2, RoundingMode::HalfUp);
        let (cents, _) = scaled.as_bigint_and_exponent();
        cents
            .to_i64()
            .map(Money)
            .ok_or_else(|| ParseMoneyError(format!("amount out of range: {}", value)))
    }

    pub fn to_bigdecimal(self) -> BigDecimal {
        BigDecimal::new(BigInt::from(self.0), 2)
    }
}

impl std::ops::Add for Money {
    type Output = Money;
    fn add(self, rhs: Money) -> Money {
        Money(self.0 + rhs.0)
    }
}

impl std::ops::Sub for Money {
    type Output = Money;
    fn sub(self, rhs: Money) -> Money {
        Money(self.0 - rhs.0)
    }
}

impl std::ops::Neg for Money {
    type Output = Money;
    fn neg(self) -> Money {
        Money(-self.0)
    }
}

impl std::iter::Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Money {
        Money(iter.map(|m| m.0).sum())
    }
}

impl fmt::Display for Money {
    /// Formats as a plain decimal string, e.g. `155.17` or `-20.00`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{}{}.{:02}", sign, abs / 100, abs % 100)
    }
}

/// Error raised for malformed currency strings from upstream.
#[derive(Debug, Clone)]
pub struct ParseMoneyError(pub String);

impl fmt::Display for ParseMoneyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid money amount: {}", self.0)
    }
}

impl std::error::Error for ParseMoneyError {}

impl FromStr for Money {
    type Err = ParseMoneyError;

    /// Parses a decimal string with at most two fraction digits.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let (negative, digits) = match trimmed.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, trimmed),
        };

        let (whole, frac) = match digits.split_once('.') {
            Some((w, f)) => (w, f),
            None => (digits, ""),
        };

        if whole.is_empty() && frac.is_empty() {
            return Err(ParseMoneyError(s.to_string()));
        }
        if !whole.chars().all(|c| c.is_ascii_digit()) {
            return Err(ParseMoneyError(s.to_string()));
        }
        if frac.len() > 2 || !frac.chars().all(|c| c.is_ascii_digit()) {
            return Err(ParseMoneyError(s.to_string()));
        }

        let whole_value: i64 = if whole.is_empty() {
            0
        } else {
            whole.parse().map_err(|_| ParseMoneyError(s.to_string()))?
        };
        let frac_value: i64 = if frac.is_empty() {
            0
        } else {
            // "5" means 50 cents, "05" means 5 cents.
            let padded = format!("{:0<2}", frac);
            padded.parse().map_err(|_| ParseMoneyError(s.to_string()))?
        };

        let cents = whole_value
            .checked_mul(100)
            .and_then(|v| v.checked_add(frac_value))
            .ok_or_else(|| ParseMoneyError(s.to_string()))?;

        Ok(Money(if negative { -cents } else { cents }))
    }
}

impl Serialize for Money {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Money {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct MoneyVisitor;

        impl<'de> Visitor<'de> for MoneyVisitor {
            type Value = Money;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a decimal amount as a string or number")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Money, E> {
                Money::from_str(v).map_err(E::custom)
            }

            fn visit_f64<E: de::Error>(self, v: f64) -> Result<Money, E> {
                if !v.is_finite() {
                    return Err(E::custom("non-finite money amount"));
                }
                Ok(Money::from_cents((v * 100.0).round() as i64))
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<Money, E> {
                v.checked_mul(100)
                    .map(Money::from_cents)
                    .ok_or_else(|| E::custom("money amount out of range"))
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<Money, E> {
                i64::try_from(v)
                    .ok()
                    .and_then(|v| v.checked_mul(100))
                    .map(Money::from_cents)
                    .ok_or_else(|| E::custom("money amount out of range"))
            }
        }

        deserializer.deserialize_any(MoneyVisitor)
    }
}

// ============ Domain Enums ============

/// Education level classification, declared lowest to highest priority.
///
/// Priority table: postgraduate(5) > tertiary(4) > post_secondary(3) >
/// secondary(2) > primary(1); an unset level counts as 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EducationLevel {
    Primary,
    Secondary,
    PostSecondary,
    Tertiary,
    Postgraduate,
}

impl EducationLevel {
    pub fn priority(self) -> u8 {
        match self {
            EducationLevel::Primary => 1,
            EducationLevel::Secondary => 2,
            EducationLevel::PostSecondary => 3,
            EducationLevel::Tertiary => 4,
            EducationLevel::Postgraduate => 5,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            EducationLevel::Primary => "primary",
            EducationLevel::Secondary => "secondary",
            EducationLevel::PostSecondary => "post_secondary",
            EducationLevel::Tertiary => "tertiary",
            EducationLevel::Postgraduate => "postgraduate",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "primary" => Some(EducationLevel::Primary),
            "secondary" => Some(EducationLevel::Secondary),
            "post_secondary" => Some(EducationLevel::PostSecondary),
            "tertiary" => Some(EducationLevel::Tertiary),
            "postgraduate" => Some(EducationLevel::Postgraduate),
            _ => None,
        }
    }
}

/// How often a course fee recurs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BillingCycle {
    Monthly,
    Quarterly,
    Biannually,
    Yearly,
    OneTime,
}

impl BillingCycle {
    pub fn as_str(self) -> &'static str {
        match self {
            BillingCycle::Monthly => "monthly",
            BillingCycle::Quarterly => "quarterly",
            BillingCycle::Biannually => "biannually",
            BillingCycle::Yearly => "yearly",
            BillingCycle::OneTime => "one_time",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "monthly" => Some(BillingCycle::Monthly),
            "quarterly" => Some(BillingCycle::Quarterly),
            "biannually" => Some(BillingCycle::Biannually),
            "yearly" => Some(BillingCycle::Yearly),
            "one_time" => Some(BillingCycle::OneTime),
            _ => None,
        }
    }

    /// Cycle length in whole months; `None` for one-time fees.
    pub fn months(self) -> Option<u32> {
        match self {
            BillingCycle::Monthly => Some(1),
            BillingCycle::Quarterly => Some(3),
            BillingCycle::Biannually => Some(6),
            BillingCycle::Yearly => Some(12),
            BillingCycle::OneTime => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountStatus {
    Active,
    Inactive,
    Pending,
}

impl AccountStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            AccountStatus::Active => "active",
            AccountStatus::Inactive => "inactive",
            AccountStatus::Pending => "pending",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "active" => Some(AccountStatus::Active),
            "inactive" => Some(AccountStatus::Inactive),
            "pending" => Some(AccountStatus::Pending),
            _ => None,
        }
    }
}

/// Account product type. Only education accounts carry a balance and can
/// receive top-ups; student accounts are registration-only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountType {
    Education,
    Student,
}

impl AccountType {
    pub fn as_str(self) -> &'static str {
        match self {
            AccountType::Education => "education",
            AccountType::Student => "student",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "education" => Some(AccountType::Education),
            "student" => Some(AccountType::Student),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResidentialStatus {
    Citizen,
    PermanentResident,
    Foreigner,
}

impl ResidentialStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ResidentialStatus::Citizen => "sc",
            ResidentialStatus::PermanentResident => "pr",
            ResidentialStatus::Foreigner => "fr",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "sc" => Some(ResidentialStatus::Citizen),
            "pr" => Some(ResidentialStatus::PermanentResident),
            "fr" => Some(ResidentialStatus::Foreigner),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnrollmentStatus {
    Active,
    Completed,
    Withdrawn,
}

impl EnrollmentStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            EnrollmentStatus::Active => "active",
            EnrollmentStatus::Completed => "completed",
            EnrollmentStatus::Withdrawn => "withdrawn",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "active" => Some(EnrollmentStatus::Active),
            "completed" => Some(EnrollmentStatus::Completed),
            "withdrawn" => Some(EnrollmentStatus::Withdrawn),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    TopUp,
    CourseCharge,
    Refund,
}

impl TransactionType {
    pub fn as_str(self) -> &'static str {
        match self {
            TransactionType::TopUp => "top_up",
            TransactionType::CourseCharge => "course_charge",
            TransactionType::Refund => "refund",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "top_up" => Some(TransactionType::TopUp),
            "course_charge" => Some(TransactionType::CourseCharge),
            "refund" => Some(TransactionType::Refund),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    Pending,
    Completed,
    Failed,
}

impl TransactionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            TransactionStatus::Pending => "pending",
            TransactionStatus::Completed => "completed",
            TransactionStatus::Failed => "failed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(TransactionStatus::Pending),
            "completed" => Some(TransactionStatus::Completed),
            "failed" => Some(TransactionStatus::Failed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScheduleType {
    Individual,
    Batch,
}

impl ScheduleType {
    pub fn as_str(self) -> &'static str {
        match self {
            ScheduleType::Individual => "individual",
            ScheduleType::Batch => "batch",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "individual" => Some(ScheduleType::Individual),
            "batch" => Some(ScheduleType::Batch),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScheduleStatus {
    Scheduled,
    Processing,
    Completed,
    Cancelled,
    Failed,
}

impl ScheduleStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ScheduleStatus::Scheduled => "scheduled",
            ScheduleStatus::Processing => "processing",
            ScheduleStatus::Completed => "completed",
            ScheduleStatus::Cancelled => "cancelled",
            ScheduleStatus::Failed => "failed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "scheduled" => Some(ScheduleStatus::Scheduled),
            "processing" => Some(ScheduleStatus::Processing),
            "completed" => Some(ScheduleStatus::Completed),
            "cancelled" => Some(ScheduleStatus::Cancelled),
            "failed" => Some(ScheduleStatus::Failed),
            _ => None,
        }
    }
}

/// Whether an account may receive top-ups. Student accounts carry no
/// balance, and foreign residents are outside the scheme.
pub fn is_education_account(
    account_type: AccountType,
    residential_status: ResidentialStatus,
) -> bool {
    account_type == AccountType::Education && residential_status != ResidentialStatus::Foreigner
}

// ============ Database Models ============

/// An education-account holder with a monetary balance.
///
/// The balance is mutated only by applying transactions; the education level
/// is mutated only by the education-level sync workflow.
#[derive(Debug, Clone, Serialize)]
pub struct AccountHolder {
    pub id: Uuid,
    pub name: String,
    /// National registration identifier, used for admin search.
    pub nric: String,
    pub date_of_birth: NaiveDate,
    pub balance: Money,
    /// Derived from active enrollments; `None` when the holder has no
    /// active course with a level set.
    pub education_level: Option<EducationLevel>,
    pub status: AccountStatus,
    pub account_type: AccountType,
    pub residential_status: ResidentialStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// A course offered by a third-party provider.
#[derive(Debug, Clone, Serialize)]
pub struct Course {
    pub id: Uuid,
    pub name: String,
    pub provider: String,
    /// Fee per billing cycle.
    pub fee: Money,
    pub billing_cycle: BillingCycle,
    pub course_run_start: Option<NaiveDate>,
    pub course_run_end: Option<NaiveDate>,
    pub education_level: Option<EducationLevel>,
    pub created_at: DateTime<Utc>,
}

/// Links an account holder to a course.
#[derive(Debug, Clone, Serialize)]
pub struct Enrollment {
    pub id: Uuid,
    pub account_id: Uuid,
    pub course_id: Uuid,
    pub enrollment_date: NaiveDate,
    pub status: EnrollmentStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// An enrollment with its course embedded, as returned by the enrollment
/// read queries. Education-level resolution reads the course level from here.
#[derive(Debug, Clone, Serialize)]
pub struct EnrollmentWithCourse {
    #[serde(flatten)]
    pub enrollment: Enrollment,
    pub course: Course,
}

/// Immutable ledger entry. Positive amounts are credits (top-ups), negative
/// amounts are debits (course charges).
#[derive(Debug, Clone, Serialize)]
pub struct Transaction {
    pub id: Uuid,
    pub account_id: Uuid,
    #[serde(rename = "type")]
    pub transaction_type: TransactionType,
    pub amount: Money,
    pub description: Option<String>,
    pub reference: Option<String>,
    pub status: TransactionStatus,
    pub created_at: DateTime<Utc>,
}

/// A scheduled or executed top-up, individual or batch.
#[derive(Debug, Clone, Serialize)]
pub struct TopUpSchedule {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub schedule_type: ScheduleType,
    pub scheduled_date: NaiveDate,
    pub scheduled_time: NaiveTime,
    pub amount: Money,
    /// Set for individual top-ups only.
    pub account_id: Option<Uuid>,
    pub account_name: Option<String>,
    /// Set for batch top-ups only.
    pub rule_name: Option<String>,
    pub eligible_count: Option<i32>,
    pub processed_count: Option<i32>,
    pub status: ScheduleStatus,
    pub executed_date: Option<DateTime<Utc>>,
    /// Structured remarks; for batch schedules this holds the serialized
    /// targeting criteria (`BatchRemarks`).
    pub remarks: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A third-party course provider.
#[derive(Debug, Clone, Serialize)]
pub struct Provider {
    pub id: Uuid,
    pub name: String,
    pub is_active: bool,
    /// Levels this provider is allowed to teach.
    pub education_levels: Vec<EducationLevel>,
}

// ============ API Request Models ============

/// Request payload for creating an enrollment.
#[derive(Debug, Deserialize)]
pub struct CreateEnrollmentRequest {
    pub account_id: Uuid,
    pub course_id: Uuid,
    /// Defaults to today when omitted.
    pub enrollment_date: Option<NaiveDate>,
}

/// Request payload for updating an enrollment's lifecycle status.
#[derive(Debug, Deserialize)]
pub struct UpdateEnrollmentRequest {
    pub status: EnrollmentStatus,
}

/// Query parameters for the proration preview endpoint.
#[derive(Debug, Deserialize)]
pub struct ProrationQueryParams {
    pub enrollment_date: NaiveDate,
}

/// Request payload for creating a top-up (individual or batch).
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTopUpRequest {
    #[serde(rename = "type")]
    pub schedule_type: ScheduleType,
    pub amount: Money,
    pub description: String,
    #[serde(default)]
    pub internal_remark: Option<String>,
    /// Individual top-ups: accounts to credit.
    #[serde(default)]
    pub account_ids: Vec<Uuid>,
    /// Batch top-ups: rule name shown in the schedule list.
    #[serde(default)]
    pub rule_name: Option<String>,
    /// Batch top-ups: who gets credited.
    #[serde(default)]
    pub targeting: Option<crate::targeting::Targeting>,
    /// Apply immediately instead of scheduling.
    #[serde(default)]
    pub execute_now: bool,
    #[serde(default)]
    pub scheduled_date: Option<NaiveDate>,
    #[serde(default)]
    pub scheduled_time: Option<NaiveTime>,
}

/// Request payload for previewing batch-targeting eligibility.
#[derive(Debug, Deserialize)]
pub struct TopUpPreviewRequest {
    pub targeting: crate::targeting::Targeting,
}

use crate::errors::AppError;
use crate::models::{
    AccountHolder, AccountStatus, AccountType, BillingCycle, Course, EducationLevel, Enrollment,
    EnrollmentStatus, EnrollmentWithCourse, Money, Provider, ResidentialStatus, ScheduleStatus,
    ScheduleType, TopUpSchedule, Transaction, TransactionStatus, TransactionType,
};
use bigdecimal::BigDecimal;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use std::collections::HashSet;
use uuid::Uuid;

/// Database storage for accounts, enrollments, the transaction ledger and
/// top-up schedules.
///
/// Uses sequential runtime queries with manual row mapping; enum columns are
/// stored as text and fail fast on unrecognized values.
pub struct AccountStorage {
    pool: PgPool,
}

/// Parameters for inserting a top-up schedule row.
#[derive(Debug)]
pub struct NewTopUpSchedule {
    pub schedule_type: ScheduleType,
    pub scheduled_date: NaiveDate,
    pub scheduled_time: NaiveTime,
    pub amount: Money,
    pub account_id: Option<Uuid>,
    pub account_name: Option<String>,
    pub rule_name: Option<String>,
    pub eligible_count: Option<i32>,
    pub processed_count: Option<i32>,
    pub status: ScheduleStatus,
    pub executed_date: Option<DateTime<Utc>>,
    pub remarks: Option<String>,
}

fn parse_enum<T>(
    column: &str,
    value: &str,
    parse: impl Fn(&str) -> Option<T>,
) -> Result<T, AppError> {
    parse(value).ok_or_else(|| {
        AppError::InvalidInput(format!("unrecognized {} value: {}", column, value))
    })
}

fn parse_enum_opt<T>(
    column: &str,
    value: Option<String>,
    parse: impl Fn(&str) -> Option<T>,
) -> Result<Option<T>, AppError> {
    value.map(|v| parse_enum(column, &v, parse)).transpose()
}

fn money_column(row: &PgRow, column: &str) -> Result<Money, AppError> {
    let value: BigDecimal = row.try_get(column)?;
    Ok(Money::from_bigdecimal(&value)?)
}

fn account_from_row(row: &PgRow) -> Result<AccountHolder, AppError> {
    Ok(AccountHolder {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        nric: row.try_get("nric")?,
        date_of_birth: row.try_get("date_of_birth")?,
        balance: money_column(row, "balance")?,
        education_level: parse_enum_opt(
            "education_level",
            row.try_get("education_level")?,
            EducationLevel::parse,
        )?,
        status: parse_enum("status", row.try_get::<String, _>("status")?.as_str(), AccountStatus::parse)?,
        account_type: parse_enum(
            "account_type",
            row.try_get::<String, _>("account_type")?.as_str(),
            AccountType::parse,
        )?,
        residential_status: parse_enum(
            "residential_status",
            row.try_get::<String, _>("residential_status")?.as_str(),
            ResidentialStatus::parse,
        )?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn course_from_row(row: &PgRow) -> Result<Course, AppError> {
    Ok(Course {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        provider: row.try_get("provider")?,
        fee: money_column(row, "fee")?,
        billing_cycle: parse_enum(
            "billing_cycle",
            row.try_get::<String, _>("billing_cycle")?.as_str(),
            BillingCycle::parse,
        )?,
        course_run_start: row.try_get("course_run_start")?,
        course_run_end: row.try_get("course_run_end")?,
        education_level: parse_enum_opt(
            "education_level",
            row.try_get("education_level")?,
            EducationLevel::parse,
        )?,
        created_at: row.try_get("created_at")?,
    })
}

fn enrollment_from_row(row: &PgRow) -> Result<Enrollment, AppError> {
    Ok(Enrollment {
        id: row.try_get("id")?,
        account_id: row.try_get("account_id")?,
        course_id: row.try_get("course_id")?,
        enrollment_date: row.try_get("enrollment_date")?,
        status: parse_enum(
            "status",
            row.try_get::<String, _>("status")?.as_str(),
            EnrollmentStatus::parse,
        )?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn transaction_from_row(row: &PgRow) -> Result<Transaction, AppError> {
    Ok(Transaction {
        id: row.try_get("id")?,
        account_id: row.try_get("account_id")?,
        transaction_type: parse_enum(
            "type",
            row.try_get::<String, _>("type")?.as_str(),
            TransactionType::parse,
        )?,
        amount: money_column(row, "amount")?,
        description: row.try_get("description")?,
        reference: row.try_get("reference")?,
        status: parse_enum(
            "status",
            row.try_get::<String, _>("status")?.as_str(),
            TransactionStatus::parse,
        )?,
        created_at: row.try_get("created_at")?,
    })
}

fn schedule_from_row(row: &PgRow) -> Result<TopUpSchedule, AppError> {
    Ok(TopUpSchedule {
        id: row.try_get("id")?,
        schedule_type: parse_enum(
            "type",
            row.try_get::<String, _>("type")?.as_str(),
            ScheduleType::parse,
        )?,
        scheduled_date: row.try_get("scheduled_date")?,
        scheduled_time: row.try_get("scheduled_time")?,
        amount: money_column(row, "amount")?,
        account_id: row.try_get("account_id")?,
        account_name: row.try_get("account_name")?,
        rule_name: row.try_get("rule_name")?,
        eligible_count: row.try_get("eligible_count")?,
        processed_count: row.try_get("processed_count")?,
        status: parse_enum(
            "status",
            row.try_get::<String, _>("status")?.as_str(),
            ScheduleStatus::parse,
        )?,
        executed_date: row.try_get("executed_date")?,
        remarks: row.try_get("remarks")?,
        created_at: row.try_get("created_at")?,
    })
}

impl AccountStorage {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    // ---- Accounts ----

    pub async fn fetch_account(&self, id: Uuid) -> Result<AccountHolder, AppError> {
        let row = sqlx::query("SELECT * FROM account_holders WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Account {} not found", id)))?;

        account_from_row(&row)
    }

    pub async fn list_active_accounts(&self) -> Result<Vec<AccountHolder>, AppError> {
        let rows = sqlx::query("SELECT * FROM account_holders WHERE status = 'active' ORDER BY name")
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(account_from_row).collect()
    }

    /// Persist the derived education level, including an explicit null.
    pub async fn update_education_level(
        &self,
        account_id: Uuid,
        level: Option<EducationLevel>,
    ) -> Result<(), AppError> {
        let result = sqlx::query(
            "UPDATE account_holders SET education_level = $1, updated_at = now() WHERE id = $2",
        )
        .bind(level.map(|l| l.as_str()))
        .bind(account_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Account {} not found", account_id)));
        }
        Ok(())
    }

    // ---- Enrollments ----

    /// Active enrollments for an account, with the course embedded.
    pub async fn fetch_active_enrollments(
        &self,
        account_id: Uuid,
    ) -> Result<Vec<EnrollmentWithCourse>, AppError> {
        let rows = sqlx::query(
            r#"
            SELECT e.id, e.account_id, e.course_id, e.enrollment_date, e.status,
                   e.created_at, e.updated_at,
                   c.id AS c_id, c.name AS c_name, c.provider AS c_provider,
                   c.fee AS c_fee, c.billing_cycle AS c_billing_cycle,
                   c.course_run_start AS c_course_run_start,
                   c.course_run_end AS c_course_run_end,
                   c.education_level AS c_education_level,
                   c.created_at AS c_created_at
            FROM enrollments e
            JOIN courses c ON c.id = e.course_id
            WHERE e.account_id = $1 AND e.status = 'active'
            ORDER BY e.enrollment_date DESC
            "#,
        )
        .bind(account_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                let enrollment = enrollment_from_row(row)?;
                let course = Course {
                    id: row.try_get("c_id")?,
                    name: row.try_get("c_name")?,
                    provider: row.try_get("c_provider")?,
                    fee: money_column(row, "c_fee")?,
                    billing_cycle: parse_enum(
                        "billing_cycle",
                        row.try_get::<String, _>("c_billing_cycle")?.as_str(),
                        BillingCycle::parse,
                    )?,
                    course_run_start: row.try_get("c_course_run_start")?,
                    course_run_end: row.try_get("c_course_run_end")?,
                    education_level: parse_enum_opt(
                        "education_level",
                        row.try_get("c_education_level")?,
                        EducationLevel::parse,
                    )?,
                    created_at: row.try_get("c_created_at")?,
                };
                Ok(EnrollmentWithCourse { enrollment, course })
            })
            .collect()
    }

    pub async fn insert_enrollment(
        &self,
        account_id: Uuid,
        course_id: Uuid,
        enrollment_date: NaiveDate,
    ) -> Result<Enrollment, AppError> {
        let row = sqlx::query(
            r#"
            INSERT INTO enrollments (account_id, course_id, enrollment_date, status)
            VALUES ($1, $2, $3, 'active')
            RETURNING *
            "#,
        )
        .bind(account_id)
        .bind(course_id)
        .bind(enrollment_date)
        .fetch_one(&self.pool)
        .await?;

        enrollment_from_row(&row)
    }

    pub async fn update_enrollment_status(
        &self,
        id: Uuid,
        status: EnrollmentStatus,
    ) -> Result<Enrollment, AppError> {
        let row = sqlx::query(
            "UPDATE enrollments SET status = $1, updated_at = now() WHERE id = $2 RETURNING *",
        )
        .bind(status.as_str())
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Enrollment {} not found", id)))?;

        enrollment_from_row(&row)
    }

    /// Delete an enrollment, returning the owning account id so the caller
    /// can re-sync the derived education level.
    pub async fn delete_enrollment(&self, id: Uuid) -> Result<Uuid, AppError> {
        let row = sqlx::query("DELETE FROM enrollments WHERE id = $1 RETURNING account_id")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Enrollment {} not found", id)))?;

        Ok(row.try_get("account_id")?)
    }

    /// Account ids holding at least one active enrollment.
    pub async fn in_school_account_ids(&self) -> Result<HashSet<Uuid>, AppError> {
        let rows = sqlx::query("SELECT DISTINCT account_id FROM enrollments WHERE status = 'active'")
            .fetch_all(&self.pool)
            .await?;

        rows.iter()
            .map(|row| Ok(row.try_get("account_id")?))
            .collect()
    }

    // ---- Courses & providers ----

    pub async fn fetch_course(&self, id: Uuid) -> Result<Course, AppError> {
        let row = sqlx::query("SELECT * FROM courses WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Course {} not found", id)))?;

        course_from_row(&row)
    }

    pub async fn list_providers(&self) -> Result<Vec<Provider>, AppError> {
        let rows = sqlx::query("SELECT * FROM providers ORDER BY name")
            .fetch_all(&self.pool)
            .await?;

        rows.iter()
            .map(|row| {
                let levels: Vec<String> = row.try_get("education_levels")?;
                let education_levels = levels
                    .iter()
                    .map(|l| parse_enum("education_level", l, EducationLevel::parse))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Provider {
                    id: row.try_get("id")?,
                    name: row.try_get("name")?,
                    is_active: row.try_get("is_active")?,
                    education_levels,
                })
            })
            .collect()
    }

    // ---- Ledger ----

    pub async fn list_transactions(&self, account_id: Uuid) -> Result<Vec<Transaction>, AppError> {
        let rows = sqlx::query(
            "SELECT * FROM transactions WHERE account_id = $1 ORDER BY created_at DESC",
        )
        .bind(account_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(transaction_from_row).collect()
    }

    /// Apply a signed amount to an account: the balance update and the
    /// ledger append commit together, so the ledger invariant (sum of
    /// transactions equals the balance) cannot be broken part-way.
    pub async fn apply_transaction(
        &self,
        account_id: Uuid,
        transaction_type: TransactionType,
        amount: Money,
        description: &str,
        reference: &str,
    ) -> Result<Transaction, AppError> {
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query(
            "UPDATE account_holders SET balance = balance + $1, updated_at = now() WHERE id = $2",
        )
        .bind(amount.to_bigdecimal())
        .bind(account_id)
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Account {} not found", account_id)));
        }

        let row = sqlx::query(
            r#"
            INSERT INTO transactions (account_id, type, amount, description, reference, status)
            VALUES ($1, $2, $3, $4, $5, 'completed')
            RETURNING *
            "#,
        )
        .bind(account_id)
        .bind(transaction_type.as_str())
        .bind(amount.to_bigdecimal())
        .bind(description)
        .bind(reference)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        transaction_from_row(&row)
    }

    // ---- Top-up schedules ----

    pub async fn insert_schedule(
        &self,
        schedule: NewTopUpSchedule,
    ) -> Result<TopUpSchedule, AppError> {
        let row = sqlx::query(
            r#"
            INSERT INTO top_up_schedules
                (type, scheduled_date, scheduled_time, amount, account_id, account_name,
                 rule_name, eligible_count, processed_count, status, executed_date, remarks)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            RETURNING *
            "#,
        )
        .bind(schedule.schedule_type.as_str())
        .bind(schedule.scheduled_date)
        .bind(schedule.scheduled_time)
        .bind(schedule.amount.to_bigdecimal())
        .bind(schedule.account_id)
        .bind(schedule.account_name)
        .bind(schedule.rule_name)
        .bind(schedule.eligible_count)
        .bind(schedule.processed_count)
        .bind(schedule.status.as_str())
        .bind(schedule.executed_date)
        .bind(schedule.remarks)
        .fetch_one(&self.pool)
        .await?;

        schedule_from_row(&row)
    }

    pub async fn list_schedules(&self) -> Result<Vec<TopUpSchedule>, AppError> {
        let rows = sqlx::query("SELECT * FROM top_up_schedules ORDER BY created_at DESC")
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(schedule_from_row).collect()
    }

    pub async fn fetch_schedule(&self, id: Uuid) -> Result<TopUpSchedule, AppError> {
        let row = sqlx::query("SELECT * FROM top_up_schedules WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Top-up schedule {} not found", id)))?;

        schedule_from_row(&row)
    }

    /// Cancel a schedule. Only `scheduled` orders can be cancelled.
    pub async fn cancel_schedule(&self, id: Uuid) -> Result<TopUpSchedule, AppError> {
        let row = sqlx::query(
            r#"
            UPDATE top_up_schedules SET status = 'cancelled'
            WHERE id = $1 AND status = 'scheduled'
            RETURNING *
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => schedule_from_row(&row),
            None => {
                // Distinguish "missing" from "not cancellable".
                let existing = self.fetch_schedule(id).await?;
                Err(AppError::BadRequest(format!(
                    "Top-up schedule {} is {} and cannot be cancelled",
                    id,
                    existing.status.as_str()
                )))
            }
        }
    }
}

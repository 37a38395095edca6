use crate::billing;
use crate::config::Config;
use crate::db_storage::{AccountStorage, NewTopUpSchedule};
use crate::education::format_education_level;
use crate::education_sync::EducationLevelSync;
use crate::errors::{AppError, ResultExt};
use crate::ledger::with_running_balance;
use crate::models::*;
use crate::targeting::{age_in_years, BatchRemarks};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use moka::future::Cache;
use serde_json::json;
use sqlx::PgPool;
use std::collections::HashSet;
use std::sync::Arc;
use uuid::Uuid;

/// Shared application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub db: PgPool,
    /// Application configuration.
    pub config: Config,
    /// Storage layer over the pool.
    pub storage: Arc<AccountStorage>,
    /// Per-account education level sync orchestrator.
    pub education_sync: Arc<EducationLevelSync>,
    /// Cache of account ids with at least one active enrollment, used by
    /// schooling-status targeting. Single entry, short TTL.
    pub in_school_cache: Cache<&'static str, Arc<HashSet<Uuid>>>,
}

impl AppState {
    /// The set of in-school account ids, via the cache.
    async fn in_school_ids(&self) -> Result<Arc<HashSet<Uuid>>, AppError> {
        self.in_school_cache
            .try_get_with("in_school", async {
                self.storage.in_school_account_ids().await.map(Arc::new)
            })
            .await
            .map_err(|e: Arc<AppError>| (*e).clone())
    }
}

fn eligible_account_json(account: &AccountHolder, today: chrono::NaiveDate) -> serde_json::Value {
    json!({
        "id": account.id,
        "name": account.name,
        "balance": account.balance,
        "age": age_in_years(account.date_of_birth, today),
        "educationLevel": format_education_level(account.education_level),
    })
}

/// Health check endpoint.
///
/// Returns the service status, version, and health information.
///
/// # Returns
///
/// * `(StatusCode, Json<serde_json::Value>)` - HTTP 200 OK with health status JSON.
pub async fn health() -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::OK,
        Json(json!({
            "status": "healthy",
            "service": "edu-accounts-api",
            "version": "0.1.0"
        })),
    )
}

/// GET /api/v1/accounts/:id
///
/// Retrieves an account holder with their formatted education level and
/// scheduled closure date.
pub async fn get_account(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, AppError> {
    tracing::info!("GET /accounts/{}", id);

    let account = state.storage.fetch_account(id).await?;
    let closure_date = billing::account_closure_date(account.date_of_birth, &state.config.billing);
    let education_label = format_education_level(account.education_level);

    Ok(Json(json!({
        "account": account,
        "educationLevelLabel": education_label,
        "closureDate": closure_date,
    })))
}

/// GET /api/v1/accounts/:id/ledger
///
/// Returns the account's transactions annotated with a running balance,
/// newest first. The chronologically last entry's balance equals the
/// account's current balance.
pub async fn get_account_ledger(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, AppError> {
    tracing::info!("GET /accounts/{}/ledger", id);

    let account = state.storage.fetch_account(id).await?;
    let transactions = state.storage.list_transactions(id).await?;
    let entries = with_running_balance(account.balance, transactions);

    Ok(Json(json!({
        "accountId": account.id,
        "currentBalance": account.balance,
        "entries": entries,
    })))
}

/// GET /api/v1/accounts/:id/closure-date
///
/// The date the account will be closed: the configured closure day of the
/// year the holder turns 30.
pub async fn get_account_closure_date(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, AppError> {
    tracing::info!("GET /accounts/{}/closure-date", id);

    let account = state.storage.fetch_account(id).await?;
    let closure_date = billing::account_closure_date(account.date_of_birth, &state.config.billing);

    Ok(Json(json!({
        "accountId": account.id,
        "dateOfBirth": account.date_of_birth,
        "closureDate": closure_date,
    })))
}

/// GET /api/v1/courses/:id/proration?enrollment_date=YYYY-MM-DD
///
/// Pro-rating preview for enrolling in a course on a given date. Uses the
/// same computation as enrollment itself, so the preview and the eventual
/// charge always agree.
pub async fn get_course_proration(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Query(params): Query<ProrationQueryParams>,
) -> Result<Json<serde_json::Value>, AppError> {
    tracing::info!(
        "GET /courses/{}/proration - enrollment_date: {}",
        id,
        params.enrollment_date
    );

    let course = state.storage.fetch_course(id).await?;
    let proration = billing::proration_info(
        course.fee,
        params.enrollment_date,
        course.course_run_start,
        course.billing_cycle,
    )?;
    let next_billing_date = billing::next_billing_date(
        params.enrollment_date,
        course.billing_cycle,
        &state.config.billing,
    );

    Ok(Json(json!({
        "courseId": course.id,
        "courseName": course.name,
        "billingCycle": course.billing_cycle,
        "proration": proration,
        "nextBillingDate": next_billing_date,
    })))
}

/// POST /api/v1/enrollments
///
/// Enrolls an account holder in a course. The first billing cycle is charged
/// immediately (pro-rated when applicable) and the account's education level
/// is re-synced from its active enrollments.
///
/// # Arguments
///
/// * `state` - The application state.
/// * `payload` - Account, course, and optional enrollment date.
///
/// # Returns
///
/// * `Result<(StatusCode, Json<serde_json::Value>), AppError>` - 201 with the
///   enrollment, the charge, and the pro-rating breakdown.
pub async fn create_enrollment(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateEnrollmentRequest>,
) -> Result<(StatusCode, Json<serde_json::Value>), AppError> {
    tracing::info!(
        "POST /enrollments - account: {}, course: {}",
        payload.account_id,
        payload.course_id
    );

    let account = state.storage.fetch_account(payload.account_id).await?;
    if account.status != AccountStatus::Active {
        return Err(AppError::BadRequest(format!(
            "Account {} is not active",
            account.id
        )));
    }

    let course = state.storage.fetch_course(payload.course_id).await?;
    let enrollment_date = payload
        .enrollment_date
        .unwrap_or_else(|| Utc::now().date_naive());

    let proration = billing::proration_info(
        course.fee,
        enrollment_date,
        course.course_run_start,
        course.billing_cycle,
    )?;

    let enrollment = state
        .storage
        .insert_enrollment(account.id, course.id, enrollment_date)
        .await
        .context("Failed to create enrollment")?;

    // First-cycle charge: a debit, paired with the balance update.
    let reference = format!("CHARGE-{}", Utc::now().timestamp_millis());
    let charge = state
        .storage
        .apply_transaction(
            account.id,
            TransactionType::CourseCharge,
            -proration.prorated_fee,
            &format!("Course charge: {}", course.name),
            &reference,
        )
        .await
        .context("Failed to apply first-cycle course charge")?;

    // Best-effort: a sync failure surfaces but does not roll back the
    // enrollment or the charge.
    let education_level = state.education_sync.sync_account(account.id).await?;

    let next_billing_date =
        billing::next_billing_date(enrollment_date, course.billing_cycle, &state.config.billing);

    tracing::info!(
        "Enrollment {} created, charged {} ({})",
        enrollment.id,
        proration.prorated_fee,
        reference
    );

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "enrollment": enrollment,
            "charge": charge,
            "proration": proration,
            "nextBillingDate": next_billing_date,
            "educationLevel": format_education_level(education_level),
        })),
    ))
}

/// PATCH /api/v1/enrollments/:id
///
/// Updates an enrollment's lifecycle status, then re-syncs the owning
/// account's education level.
pub async fn update_enrollment(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateEnrollmentRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    tracing::info!("PATCH /enrollments/{} - status: {:?}", id, payload.status);

    let enrollment = state
        .storage
        .update_enrollment_status(id, payload.status)
        .await?;
    let education_level = state
        .education_sync
        .sync_account(enrollment.account_id)
        .await?;

    Ok(Json(json!({
        "enrollment": enrollment,
        "educationLevel": format_education_level(education_level),
    })))
}

/// DELETE /api/v1/enrollments/:id
///
/// Removes an enrollment and re-syncs the owning account's education level.
pub async fn delete_enrollment(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, AppError> {
    tracing::info!("DELETE /enrollments/{}", id);

    let account_id = state.storage.delete_enrollment(id).await?;
    let education_level = state.education_sync.sync_account(account_id).await?;

    Ok(Json(json!({
        "deleted": true,
        "accountId": account_id,
        "educationLevel": format_education_level(education_level),
    })))
}

/// POST /api/v1/top-ups/preview
///
/// Previews which accounts a batch targeting would credit, without creating
/// anything.
pub async fn preview_top_up(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<TopUpPreviewRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    tracing::info!("POST /top-ups/preview");

    let today = Utc::now().date_naive();
    let accounts = state.storage.list_active_accounts().await?;
    let in_school = state.in_school_ids().await?;

    let eligible =
        payload
            .targeting
            .eligible_accounts(&accounts, today, &|id| in_school.contains(&id));

    Ok(Json(json!({
        "eligibleCount": eligible.len(),
        "accounts": eligible
            .iter()
            .map(|a| eligible_account_json(a, today))
            .collect::<Vec<_>>(),
    })))
}

/// POST /api/v1/top-ups
///
/// Creates a top-up order: individual (one schedule row per named account)
/// or batch (one schedule row with the targeting stored as a structured
/// remarks blob). With `executeNow` the credits are applied immediately and
/// the order is recorded as completed; otherwise a date and time are
/// required and the order waits as `scheduled`.
pub async fn create_top_up(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateTopUpRequest>,
) -> Result<(StatusCode, Json<serde_json::Value>), AppError> {
    tracing::info!(
        "POST /top-ups - type: {:?}, execute_now: {}",
        payload.schedule_type,
        payload.execute_now
    );

    if !payload.amount.is_positive() {
        return Err(AppError::BadRequest(
            "Top-up amount must be greater than zero".to_string(),
        ));
    }
    if payload.description.trim().is_empty() {
        return Err(AppError::BadRequest("Description is required".to_string()));
    }
    if !payload.execute_now && (payload.scheduled_date.is_none() || payload.scheduled_time.is_none())
    {
        return Err(AppError::BadRequest(
            "Scheduled top-ups require a date and time".to_string(),
        ));
    }

    let now = Utc::now();
    let scheduled_date = payload.scheduled_date.unwrap_or_else(|| now.date_naive());
    let scheduled_time = payload.scheduled_time.unwrap_or_else(|| now.time());
    let status = if payload.execute_now {
        ScheduleStatus::Completed
    } else {
        ScheduleStatus::Scheduled
    };
    let executed_date = payload.execute_now.then_some(now);

    match payload.schedule_type {
        ScheduleType::Individual => {
            if payload.account_ids.is_empty() {
                return Err(AppError::BadRequest(
                    "Individual top-ups require at least one account".to_string(),
                ));
            }

            let reference = format!("TOPUP-{}", now.timestamp_millis());
            let mut schedules = Vec::with_capacity(payload.account_ids.len());

            for account_id in &payload.account_ids {
                let account = state.storage.fetch_account(*account_id).await?;

                if payload.execute_now {
                    state
                        .storage
                        .apply_transaction(
                            account.id,
                            TransactionType::TopUp,
                            payload.amount,
                            &payload.description,
                            &reference,
                        )
                        .await
                        .context("Failed to apply individual top-up")?;
                }

                let schedule = state
                    .storage
                    .insert_schedule(NewTopUpSchedule {
                        schedule_type: ScheduleType::Individual,
                        scheduled_date,
                        scheduled_time,
                        amount: payload.amount,
                        account_id: Some(account.id),
                        account_name: Some(account.name.clone()),
                        rule_name: None,
                        eligible_count: None,
                        processed_count: payload.execute_now.then_some(1),
                        status,
                        executed_date,
                        remarks: payload.internal_remark.clone(),
                    })
                    .await
                    .context("Failed to record individual top-up schedule")?;

                schedules.push(schedule);
            }

            tracing::info!(
                "Individual top-up {} created for {} account(s), executed: {}",
                reference,
                schedules.len(),
                payload.execute_now
            );

            Ok((
                StatusCode::CREATED,
                Json(json!({
                    "reference": reference,
                    "executed": payload.execute_now,
                    "schedules": schedules,
                })),
            ))
        }
        ScheduleType::Batch => {
            let targeting = payload.targeting.clone().ok_or_else(|| {
                AppError::BadRequest("Batch top-ups require targeting".to_string())
            })?;

            let today = now.date_naive();
            let accounts = state.storage.list_active_accounts().await?;
            let in_school = state.in_school_ids().await?;
            let eligible =
                targeting.eligible_accounts(&accounts, today, &|id| in_school.contains(&id));

            let reference = format!("BATCH-{}", now.timestamp_millis());
            let remarks = BatchRemarks {
                description: payload.description.clone(),
                internal_remark: payload.internal_remark.clone(),
                reference_id: reference.clone(),
                targeting,
                eligible_account_count: eligible.len(),
            };
            let remarks_json = serde_json::to_string(&remarks)
                .map_err(|e| AppError::InternalError(format!("Failed to encode remarks: {}", e)))?;

            if payload.execute_now {
                for account in &eligible {
                    state
                        .storage
                        .apply_transaction(
                            account.id,
                            TransactionType::TopUp,
                            payload.amount,
                            &payload.description,
                            &reference,
                        )
                        .await
                        .context("Failed to apply batch top-up")?;
                }
            }

            let schedule = state
                .storage
                .insert_schedule(NewTopUpSchedule {
                    schedule_type: ScheduleType::Batch,
                    scheduled_date,
                    scheduled_time,
                    amount: payload.amount,
                    account_id: None,
                    account_name: None,
                    rule_name: payload.rule_name.clone(),
                    eligible_count: Some(eligible.len() as i32),
                    processed_count: payload.execute_now.then_some(eligible.len() as i32),
                    status,
                    executed_date,
                    remarks: Some(remarks_json),
                })
                .await
                .context("Failed to record batch top-up schedule")?;

            tracing::info!(
                "Batch top-up {} created, eligible: {}, executed: {}",
                reference,
                eligible.len(),
                payload.execute_now
            );

            Ok((
                StatusCode::CREATED,
                Json(json!({
                    "reference": reference,
                    "executed": payload.execute_now,
                    "eligibleCount": eligible.len(),
                    "schedule": schedule,
                })),
            ))
        }
    }
}

/// GET /api/v1/top-ups
///
/// Lists all top-up schedules, newest first.
pub async fn list_top_ups(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<TopUpSchedule>>, AppError> {
    tracing::info!("GET /top-ups");

    let schedules = state.storage.list_schedules().await?;
    Ok(Json(schedules))
}

/// GET /api/v1/top-ups/:id/eligible
///
/// Recomputes the current eligible set for a batch schedule from its stored
/// targeting criteria. Legacy schedules with free-form remarks yield an
/// empty set.
pub async fn get_top_up_eligible(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, AppError> {
    tracing::info!("GET /top-ups/{}/eligible", id);

    let schedule = state.storage.fetch_schedule(id).await?;
    if schedule.schedule_type != ScheduleType::Batch {
        return Err(AppError::BadRequest(format!(
            "Top-up schedule {} is not a batch order",
            id
        )));
    }

    let remarks = schedule
        .remarks
        .as_deref()
        .and_then(BatchRemarks::from_remarks);

    let Some(remarks) = remarks else {
        tracing::warn!(
            "Top-up schedule {} has no parseable targeting remarks, treating eligible set as empty",
            id
        );
        return Ok(Json(json!({
            "scheduleId": schedule.id,
            "eligibleCount": 0,
            "accounts": [],
        })));
    };

    let today = Utc::now().date_naive();
    let accounts = state.storage.list_active_accounts().await?;
    let in_school = state.in_school_ids().await?;
    let eligible = remarks
        .targeting
        .eligible_accounts(&accounts, today, &|id| in_school.contains(&id));

    Ok(Json(json!({
        "scheduleId": schedule.id,
        "referenceId": remarks.reference_id,
        "description": remarks.description,
        "eligibleCount": eligible.len(),
        "accounts": eligible
            .iter()
            .map(|a| eligible_account_json(a, today))
            .collect::<Vec<_>>(),
    })))
}

/// POST /api/v1/top-ups/:id/cancel
///
/// Cancels a pending schedule. Only `scheduled` orders can be cancelled;
/// completed, processing, or already-cancelled orders are rejected.
pub async fn cancel_top_up(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<TopUpSchedule>, AppError> {
    tracing::info!("POST /top-ups/{}/cancel", id);

    let schedule = state.storage.cancel_schedule(id).await?;
    Ok(Json(schedule))
}

/// GET /api/v1/providers
///
/// Lists course providers and the education levels they may teach.
pub async fn list_providers(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<Provider>>, AppError> {
    tracing::info!("GET /providers");

    let providers = state.storage.list_providers().await?;
    Ok(Json(providers))
}

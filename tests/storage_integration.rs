use std::env;
use std::sync::Arc;

use chrono::NaiveDate;
use uuid::Uuid;

use edu_accounts_api::db::Database;
use edu_accounts_api::db_storage::AccountStorage;
use edu_accounts_api::education_sync::EducationLevelSync;
use edu_accounts_api::ledger::with_running_balance;
use edu_accounts_api::models::{Money, TransactionType};

/// Integration smoke test for the storage layer and the ledger invariant.
/// Marked ignored to avoid running against production by accident; set TEST_DATABASE_URL to run.
#[tokio::test]
#[ignore]
async fn ledger_invariant_smoke_test() -> anyhow::Result<()> {
    let db_url = env::var("TEST_DATABASE_URL")
        .or_else(|_| env::var("DATABASE_URL"))
        .map_err(|_| anyhow::anyhow!("Set TEST_DATABASE_URL or DATABASE_URL to run this test"))?;

    let db = Database::new(&db_url)
        .await
        .map_err(|e| anyhow::anyhow!(e))?;
    let storage = Arc::new(AccountStorage::new(db.pool.clone()));

    // Unique NRIC to avoid conflicts on repeated runs.
    let nric = format!("T{:07}Z", Uuid::new_v4().as_u128() % 10_000_000);
    let row: (Uuid,) = sqlx::query_as(
        r#"
        INSERT INTO account_holders
            (name, nric, date_of_birth, balance, status, account_type, residential_status)
        VALUES ($1, $2, $3, 0, 'active', 'education', 'sc')
        RETURNING id
        "#,
    )
    .bind("Ledger Smoke Test")
    .bind(&nric)
    .bind(NaiveDate::from_ymd_opt(2004, 3, 12).unwrap())
    .fetch_one(&db.pool)
    .await?;
    let account_id = row.0;

    storage
        .apply_transaction(
            account_id,
            TransactionType::TopUp,
            Money::from_cents(5_000),
            "Smoke test top-up",
            "TOPUP-TEST",
        )
        .await
        .map_err(|e| anyhow::anyhow!(e.to_string()))?;
    storage
        .apply_transaction(
            account_id,
            TransactionType::CourseCharge,
            Money::from_cents(-2_000),
            "Smoke test charge",
            "CHARGE-TEST",
        )
        .await
        .map_err(|e| anyhow::anyhow!(e.to_string()))?;

    let account = storage
        .fetch_account(account_id)
        .await
        .map_err(|e| anyhow::anyhow!(e.to_string()))?;
    assert_eq!(account.balance, Money::from_cents(3_000));

    let transactions = storage
        .list_transactions(account_id)
        .await
        .map_err(|e| anyhow::anyhow!(e.to_string()))?;
    assert_eq!(transactions.len(), 2);

    let entries = with_running_balance(account.balance, transactions);
    assert_eq!(entries[0].balance_after, account.balance);

    // No enrollments: the synced level is an explicit null.
    let sync = EducationLevelSync::new(storage);
    let level = sync
        .sync_account(account_id)
        .await
        .map_err(|e| anyhow::anyhow!(e.to_string()))?;
    assert_eq!(level, None);

    Ok(())
}

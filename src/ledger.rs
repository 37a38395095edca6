/// Running-balance reconstruction for the transaction ledger.
///
/// The ledger is append-only: the sum of all transactions for an account,
/// applied in `created_at` order, equals the current balance. Reconstruction
/// works backwards from the current balance so no separate starting-balance
/// column is needed.
use serde::Serialize;

use crate::models::{Money, Transaction};

/// A transaction annotated with the balance immediately after it applied.
#[derive(Debug, Clone, Serialize)]
pub struct LedgerEntry {
    #[serde(flatten)]
    pub transaction: Transaction,
    pub balance_after: Money,
}

/// Annotate `transactions` with the balance after each one, given the
/// account's current balance.
///
/// Accumulation is always chronological (oldest first) regardless of input
/// order: the starting balance is `current_balance - sum(amounts)`, and each
/// amount is applied in `created_at` order. The returned entries are in
/// newest-first display order; the chronologically last entry's
/// `balance_after` equals `current_balance` exactly, since everything is
/// accumulated in integer cents.
pub fn with_running_balance(
    current_balance: Money,
    mut transactions: Vec<Transaction>,
) -> Vec<LedgerEntry> {
    transactions.sort_by_key(|t| t.created_at);

    let total: Money = transactions.iter().map(|t| t.amount).sum();
    let mut running_balance = current_balance - total;

    let mut entries: Vec<LedgerEntry> = transactions
        .into_iter()
        .map(|transaction| {
            running_balance = running_balance + transaction.amount;
            LedgerEntry {
                balance_after: running_balance,
                transaction,
            }
        })
        .collect();

    entries.reverse();
    entries
}

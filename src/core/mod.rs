//! Core business logic - Storage-backed lending operations, independent of any front end.

pub mod availability;
pub mod bundle;
pub mod calendar;
pub mod contract;
pub mod inventory;
pub mod notification;
pub mod reservation;
pub mod search;

use crate::errors::Result;
use sea_orm::DatabaseTransaction;

/// Commits `txn` when `result` is a success and rolls it back otherwise.
pub(crate) async fn commit_or_rollback<T>(
    txn: DatabaseTransaction,
    result: Result<T>,
) -> Result<T> {
    match result {
        Ok(value) => {
            txn.commit().await?;
            Ok(value)
        }
        Err(e) => {
            txn.rollback().await?;
            Err(e)
        }
    }
}


//! Hand-over and take-back - Signing approved lines into a contract and closing them on return.

use crate::{
    core::{
        availability::{self, DateRange},
        bundle::{self, Bundle, BundleKey},
        calendar, commit_or_rollback, inventory,
        reservation::ensure_transition,
    },
    entities::{Contract, contract, reservation, reservation::ReservationStatus},
    errors::{Error, Result},
};
use chrono::Utc;
use sea_orm::{DatabaseTransaction, Set, TransactionTrait, prelude::*};
use tracing::{info, instrument};

/// What to hand over.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Handover {
    /// Lines of the bundle to sign; must all be approved
    pub line_ids: Vec<i64>,
    /// Printed on the contract
    pub note: Option<String>,
    /// Member of the borrowing delegation who picks the items up
    pub delegated_user_id: Option<i64>,
}

/// Signs the selected approved lines of a bundle into a new contract.
///
/// Every selected line starts today; an end date already in the past moves to today. The
/// lines are checked against availability for their new period under the allocation lock.
/// Either every line is signed and attached to the contract or nothing is written.
///
/// # Errors
/// - [`Error::Validation`] for an empty selection, a line of another user or pool, or a
///   delegated user who is not a member of the borrowing delegation
/// - [`Error::InvalidTransition`] for a line that is not approved
/// - [`Error::CapacityExceeded`] if moving a line to today would overbook its model
/// - [`Error::NotFound`] for an unknown line or delegated user
#[instrument(skip(db, bundle, handover), fields(bundle = %bundle.key))]
pub async fn sign(
    db: &DatabaseConnection,
    bundle: &Bundle,
    acting_user_id: i64,
    handover: &Handover,
) -> Result<contract::Model> {
    if handover.line_ids.is_empty() {
        return Err(Error::validation("Select at least one line to hand over"));
    }

    let txn = db.begin().await?;
    let result = sign_lines(&txn, bundle, acting_user_id, handover).await;
    let contract = commit_or_rollback(txn, result).await?;

    info!(
        contract_id = contract.id,
        user_id = contract.user_id,
        by_user = acting_user_id,
        lines = handover.line_ids.len(),
        "Contract signed"
    );
    Ok(contract)
}

async fn sign_lines(
    txn: &DatabaseTransaction,
    bundle: &Bundle,
    acting_user_id: i64,
    handover: &Handover,
) -> Result<contract::Model> {
    if let Some(delegated_user_id) = handover.delegated_user_id {
        inventory::require_user(txn, delegated_user_id).await?;
        if !inventory::is_delegation_member(txn, bundle.user_id, delegated_user_id).await? {
            return Err(Error::validation(format!(
                "User {delegated_user_id} may not pick up items for user {}",
                bundle.user_id
            )));
        }
    }

    availability::lock_allocations(
        txn,
        bundle
            .lines
            .iter()
            .filter(|l| handover.line_ids.contains(&l.id))
            .map(|l| (l.inventory_pool_id, l.model_id)),
    )
    .await?;

    let lines = bundle::reload_lines(txn, &handover.line_ids).await?;
    for l in &lines {
        if l.user_id != bundle.user_id || l.inventory_pool_id != bundle.inventory_pool_id {
            return Err(Error::validation(format!(
                "Reservation {} does not belong to bundle {}",
                l.id, bundle.key
            )));
        }
        ensure_transition(l, ReservationStatus::Signed)?;
    }

    let today = calendar::today();
    let group_ids =
        inventory::group_ids_for_user(txn, bundle.user_id, bundle.inventory_pool_id).await?;
    for l in &lines {
        availability::ensure_line_fits(txn, l, DateRange::new(today, l.end_date), &group_ids)
            .await?;
    }

    let now = Utc::now();
    let contract = contract::ActiveModel {
        inventory_pool_id: Set(bundle.inventory_pool_id),
        user_id: Set(bundle.user_id),
        note: Set(handover.note.clone()),
        handed_over_by_user_id: Set(acting_user_id),
        created_at: Set(now),
        ..Default::default()
    }
    .insert(txn)
    .await?;

    for l in lines {
        let period = DateRange::new(today, l.end_date);
        let mut active_model: reservation::ActiveModel = l.into();
        active_model.status = Set(ReservationStatus::Signed);
        active_model.contract_id = Set(Some(contract.id));
        active_model.handed_over_by_user_id = Set(Some(acting_user_id));
        active_model.start_date = Set(period.start());
        active_model.end_date = Set(period.end());
        if let Some(delegated_user_id) = handover.delegated_user_id {
            active_model.delegated_user_id = Set(Some(delegated_user_id));
        }
        active_model.updated_at = Set(now);
        active_model.update(txn).await?;
    }

    Ok(contract)
}

/// Records the return of signed lines and closes them.
///
/// All lines or none. Returns the closed lines.
#[instrument(skip(db, line_ids), fields(lines = line_ids.len()))]
pub async fn take_back(
    db: &DatabaseConnection,
    inventory_pool_id: i64,
    acting_user_id: i64,
    line_ids: &[i64],
) -> Result<Vec<reservation::Model>> {
    if line_ids.is_empty() {
        return Err(Error::validation("Select at least one line to take back"));
    }

    let txn = db.begin().await?;
    let result = close_lines(&txn, inventory_pool_id, acting_user_id, line_ids).await;
    let closed = commit_or_rollback(txn, result).await?;

    info!(
        inventory_pool_id,
        by_user = acting_user_id,
        lines = closed.len(),
        "Items taken back"
    );
    Ok(closed)
}

async fn close_lines(
    txn: &DatabaseTransaction,
    inventory_pool_id: i64,
    acting_user_id: i64,
    line_ids: &[i64],
) -> Result<Vec<reservation::Model>> {
    let lines = bundle::reload_lines(txn, line_ids).await?;
    for l in &lines {
        if l.inventory_pool_id != inventory_pool_id {
            return Err(Error::validation(format!(
                "Reservation {} belongs to inventory pool {}",
                l.id, l.inventory_pool_id
            )));
        }
        ensure_transition(l, ReservationStatus::Closed)?;
    }

    let today = calendar::today();
    let now = Utc::now();
    let mut closed = Vec::with_capacity(lines.len());
    for l in lines {
        let mut active_model: reservation::ActiveModel = l.into();
        active_model.status = Set(ReservationStatus::Closed);
        active_model.returned_date = Set(Some(today));
        active_model.returned_to_user_id = Set(Some(acting_user_id));
        active_model.updated_at = Set(now);
        closed.push(active_model.update(txn).await?);
    }

    Ok(closed)
}

/// Retrieves a contract by its unique ID.
pub async fn get_contract<C>(conn: &C, contract_id: i64) -> Result<Option<contract::Model>>
where
    C: ConnectionTrait,
{
    Contract::find_by_id(contract_id)
        .one(conn)
        .await
        .map_err(Into::into)
}

/// `Signed` while any line of the contract is still out, `Closed` afterwards.
pub async fn contract_status<C>(conn: &C, contract_id: i64) -> Result<ReservationStatus>
where
    C: ConnectionTrait,
{
    Ok(bundle::find_bundle(conn, BundleKey::Contract(contract_id))
        .await?
        .status)
}

//! Reservation line business logic - The per-line state machine and line CRUD.
//!
//! Status scopes are a static mapping from [`ReservationStatus`] to a query condition.
//! Transitions are validated here; bundle and contract operations call into this
//! module for every line they move.

use crate::{
    core::availability::DateRange,
    entities::{Reservation, reservation, reservation::ReservationStatus},
    errors::{Error, Result},
};
use chrono::{NaiveDate, Utc};
use sea_orm::{Condition, Set, prelude::*};
use std::str::FromStr;

impl ReservationStatus {
    /// Every status, in lifecycle order.
    pub const ALL: [Self; 6] = [
        Self::Unsubmitted,
        Self::Submitted,
        Self::Rejected,
        Self::Approved,
        Self::Signed,
        Self::Closed,
    ];

    /// Statuses whose quantity is held against the pool's capacity.
    pub const COMMITTED: [Self; 3] = [Self::Submitted, Self::Approved, Self::Signed];

    /// Statuses in which a line may still be deleted.
    pub const REMOVABLE: [Self; 3] = [Self::Unsubmitted, Self::Submitted, Self::Approved];

    /// Stored value of the status.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Unsubmitted => "unsubmitted",
            Self::Submitted => "submitted",
            Self::Rejected => "rejected",
            Self::Approved => "approved",
            Self::Signed => "signed",
            Self::Closed => "closed",
        }
    }

    /// Counts against availability.
    #[must_use]
    pub const fn is_committed(self) -> bool {
        matches!(self, Self::Submitted | Self::Approved | Self::Signed)
    }

    /// One of [`Self::REMOVABLE`].
    #[must_use]
    pub const fn is_removable(self) -> bool {
        matches!(self, Self::Unsubmitted | Self::Submitted | Self::Approved)
    }

    /// No transition leaves this status.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Rejected | Self::Closed)
    }

    /// Signed and closed lines are grouped by contract instead of by status.
    #[must_use]
    pub const fn is_signed_or_closed(self) -> bool {
        matches!(self, Self::Signed | Self::Closed)
    }

    /// The edges of the lifecycle graph.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Unsubmitted, Self::Submitted)
                | (Self::Submitted, Self::Approved | Self::Rejected)
                | (Self::Approved, Self::Signed)
                | (Self::Signed, Self::Closed)
        )
    }

    /// Query condition selecting lines in this status.
    #[must_use]
    pub fn condition(self) -> Condition {
        Condition::all().add(reservation::Column::Status.eq(self))
    }
}

impl FromStr for ReservationStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s.trim())
            .ok_or_else(|| Error::validation(format!("Unknown reservation status '{s}'")))
    }
}

/// Query condition selecting lines that are grouped by contract.
#[must_use]
pub fn signed_or_closed() -> Condition {
    Condition::any()
        .add(ReservationStatus::Signed.condition())
        .add(ReservationStatus::Closed.condition())
}

impl reservation::Model {
    /// The line's reserved days.
    #[must_use]
    pub fn period(&self) -> DateRange {
        DateRange::new(self.start_date, self.end_date)
    }
}

/// Attributes of a line about to be created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewReservation {
    /// Pool lending the model
    pub inventory_pool_id: i64,
    /// The borrower
    pub user_id: i64,
    /// Person acting for a borrowing delegation
    pub delegated_user_id: Option<i64>,
    /// Reserved model
    pub model_id: i64,
    /// Units, at least one
    pub quantity: i32,
    /// First day
    pub start_date: NaiveDate,
    /// Last day; clamped to `start_date` when earlier
    pub end_date: NaiveDate,
    /// Initial status
    pub status: ReservationStatus,
    /// What the items are needed for
    pub purpose: Option<String>,
}

impl NewReservation {
    /// A single unsubmitted unit, ready to be adjusted with struct update syntax.
    #[must_use]
    pub const fn new(
        inventory_pool_id: i64,
        user_id: i64,
        model_id: i64,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Self {
        Self {
            inventory_pool_id,
            user_id,
            delegated_user_id: None,
            model_id,
            quantity: 1,
            start_date,
            end_date,
            status: ReservationStatus::Unsubmitted,
            purpose: None,
        }
    }
}

/// Creates a reservation line.
///
/// An `end_date` before `start_date` is clamped to `start_date`. Signed and closed lines
/// only come into existence through a hand-over, so they cannot be created here.
///
/// # Errors
/// Returns [`Error::Validation`] if the quantity is not positive or the status is
/// `signed`/`closed`.
pub async fn create_reservation<C>(conn: &C, new: NewReservation) -> Result<reservation::Model>
where
    C: ConnectionTrait,
{
    if new.quantity < 1 {
        return Err(Error::validation(format!(
            "Quantity must be positive, got {}",
            new.quantity
        )));
    }

    if new.status.is_signed_or_closed() {
        return Err(Error::validation(format!(
            "Reservations cannot be created as {}",
            new.status.as_str()
        )));
    }

    let period = DateRange::new(new.start_date, new.end_date);
    let now = Utc::now();

    let line = reservation::ActiveModel {
        inventory_pool_id: Set(new.inventory_pool_id),
        user_id: Set(new.user_id),
        delegated_user_id: Set(new.delegated_user_id),
        model_id: Set(new.model_id),
        quantity: Set(new.quantity),
        start_date: Set(period.start()),
        end_date: Set(period.end()),
        status: Set(new.status),
        purpose: Set(new.purpose),
        contract_id: Set(None),
        handed_over_by_user_id: Set(None),
        returned_date: Set(None),
        returned_to_user_id: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    };

    line.insert(conn).await.map_err(Into::into)
}

/// Retrieves a reservation line by its unique ID.
pub async fn get_reservation<C>(conn: &C, line_id: i64) -> Result<Option<reservation::Model>>
where
    C: ConnectionTrait,
{
    Reservation::find_by_id(line_id)
        .one(conn)
        .await
        .map_err(Into::into)
}

/// Fails with [`Error::InvalidTransition`] unless `line` may move to `to`.
pub fn ensure_transition(line: &reservation::Model, to: ReservationStatus) -> Result<()> {
    if line.status.can_transition_to(to) {
        Ok(())
    } else {
        Err(Error::InvalidTransition {
            line_id: line.id,
            from: line.status,
            to,
        })
    }
}

/// Moves a line to `to`, enforcing the lifecycle graph.
pub async fn transition<C>(
    conn: &C,
    line: reservation::Model,
    to: ReservationStatus,
) -> Result<reservation::Model>
where
    C: ConnectionTrait,
{
    ensure_transition(&line, to)?;

    let mut active_model: reservation::ActiveModel = line.into();
    active_model.status = Set(to);
    active_model.updated_at = Set(Utc::now());
    active_model.update(conn).await.map_err(Into::into)
}

/// Deletes a line if it exists and is still removable.
///
/// Returns `false` instead of failing when the line is gone or already signed/closed,
/// so deleting twice is harmless.
pub async fn delete_reservation<C>(conn: &C, line_id: i64) -> Result<bool>
where
    C: ConnectionTrait,
{
    let Some(line) = get_reservation(conn, line_id).await? else {
        return Ok(false);
    };

    if !line.status.is_removable() {
        tracing::debug!(line_id, status = line.status.as_str(), "refusing to delete line");
        return Ok(false);
    }

    line.delete(conn).await?;
    Ok(true)
}

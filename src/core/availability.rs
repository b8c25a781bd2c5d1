//! Availability calculation - How many units of a model are free in a pool over a period.
//!
//! The arithmetic lives in [`compute`], a pure function over [`AvailabilityInputs`].
//! The async loaders gather those inputs from storage: the borrowable item count, the
//! committed lines overlapping the period, and the partition quotas of the requesting
//! user's verification groups. Nothing in this module changes reservation state; the only
//! write is the allocation lock taken by [`lock_allocations`].

use crate::{
    core::inventory,
    entities::{
        AvailabilityLock, Group, GroupUser, Item, Partition, Reservation, availability_lock, group,
        group_user, item, partition, reservation, reservation::ReservationStatus,
    },
    errors::{Error, Result},
};
use chrono::NaiveDate;
use sea_orm::{
    PaginatorTrait, Set,
    prelude::*,
    sea_query::{Expr, OnConflict},
};
use std::collections::{BTreeSet, HashSet};
use std::fmt;

/// Inclusive day range. The end is never before the start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DateRange {
    start: NaiveDate,
    end: NaiveDate,
}

impl DateRange {
    /// Builds a range, clamping an `end` before `start` up to `start`.
    #[must_use]
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self {
            start,
            end: end.max(start),
        }
    }

    /// A range covering a single day.
    #[must_use]
    pub const fn day(date: NaiveDate) -> Self {
        Self {
            start: date,
            end: date,
        }
    }

    /// First day.
    #[must_use]
    pub const fn start(&self) -> NaiveDate {
        self.start
    }

    /// Last day, inclusive.
    #[must_use]
    pub const fn end(&self) -> NaiveDate {
        self.end
    }

    /// Two ranges overlap when `a.start <= b.end && b.start <= a.end`.
    #[must_use]
    pub fn overlaps(&self, other: &Self) -> bool {
        self.start <= other.end && other.start <= self.end
    }

    /// Whether `date` falls within the range.
    #[must_use]
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    /// Number of days covered, both ends included.
    #[must_use]
    pub fn days(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..={}", self.start, self.end)
    }
}

/// Quota of one verification group for the queried model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GroupQuota {
    /// The limited group
    pub group_id: i64,
    /// Units the group may hold at once
    pub quota: u32,
    /// Units the group's members already hold in the period
    pub allocated: u32,
}

impl GroupQuota {
    /// Units the group can still take; zero when the group is already over its quota.
    #[must_use]
    pub const fn headroom(&self) -> u32 {
        self.quota.saturating_sub(self.allocated)
    }
}

/// Everything [`compute`] needs for one decision.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AvailabilityInputs {
    /// Borrowable units the pool owns
    pub borrowable: u32,
    /// Units held by committed lines overlapping the period
    pub committed: u32,
    /// Quotas of the requesting user's verification groups that cover the model
    pub group_quotas: Vec<GroupQuota>,
}

/// Result of an availability computation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Availability {
    /// Borrowable units the pool owns
    pub borrowable: u32,
    /// Units held by committed lines overlapping the period
    pub committed: u32,
    /// Sum of group headrooms, when a quota applies
    pub group_cap: Option<u32>,
    /// Units that can still be committed
    pub available: u32,
    /// Committed quantity already exceeds capacity or a group quota
    pub overbooked: bool,
}

impl Availability {
    /// Whether `quantity` more units fit.
    #[must_use]
    pub const fn fits(&self, quantity: u32) -> bool {
        quantity <= self.available
    }
}

/// Pure availability arithmetic.
///
/// `available = max(0, borrowable - committed)`, further capped by the summed headroom of
/// the quota groups when there are any. The result never exceeds `borrowable`.
#[must_use]
pub fn compute(inputs: &AvailabilityInputs) -> Availability {
    let free = inputs.borrowable.saturating_sub(inputs.committed);
    let group_cap = if inputs.group_quotas.is_empty() {
        None
    } else {
        Some(
            inputs
                .group_quotas
                .iter()
                .map(GroupQuota::headroom)
                .fold(0_u32, u32::saturating_add),
        )
    };
    let overbooked = inputs.committed > inputs.borrowable
        || inputs.group_quotas.iter().any(|q| q.allocated > q.quota);

    Availability {
        borrowable: inputs.borrowable,
        committed: inputs.committed,
        group_cap,
        available: group_cap.map_or(free, |cap| free.min(cap)),
        overbooked,
    }
}

/// Counts the borrowable items of a model in a pool.
pub async fn borrowable_count<C>(conn: &C, model_id: i64, inventory_pool_id: i64) -> Result<u32>
where
    C: ConnectionTrait,
{
    let count = Item::find()
        .filter(item::Column::ModelId.eq(model_id))
        .filter(item::Column::InventoryPoolId.eq(inventory_pool_id))
        .filter(item::Column::IsBorrowable.eq(true))
        .count(conn)
        .await?;
    Ok(u32::try_from(count)?)
}

/// Loads committed lines of the model in the pool that overlap `range`.
async fn committed_lines<C>(
    conn: &C,
    model_id: i64,
    inventory_pool_id: i64,
    range: DateRange,
    exclude_line_id: Option<i64>,
) -> Result<Vec<reservation::Model>>
where
    C: ConnectionTrait,
{
    let mut query = Reservation::find()
        .filter(reservation::Column::ModelId.eq(model_id))
        .filter(reservation::Column::InventoryPoolId.eq(inventory_pool_id))
        .filter(reservation::Column::Status.is_in(ReservationStatus::COMMITTED))
        .filter(reservation::Column::StartDate.lte(range.end()))
        .filter(reservation::Column::EndDate.gte(range.start()));

    if let Some(line_id) = exclude_line_id {
        query = query.filter(reservation::Column::Id.ne(line_id));
    }

    query.all(conn).await.map_err(Into::into)
}

fn total_quantity<'a>(lines: impl IntoIterator<Item = &'a reservation::Model>) -> Result<u32> {
    lines.into_iter().try_fold(0_u32, |sum, line| {
        Ok(sum.saturating_add(u32::try_from(line.quantity)?))
    })
}

/// Loads the quotas of the verification groups among `group_ids` that limit the model.
async fn group_quotas<C>(
    conn: &C,
    model_id: i64,
    inventory_pool_id: i64,
    group_ids: &[i64],
    lines: &[reservation::Model],
) -> Result<Vec<GroupQuota>>
where
    C: ConnectionTrait,
{
    if group_ids.is_empty() {
        return Ok(Vec::new());
    }

    let verification_groups: Vec<i64> = Group::find()
        .filter(group::Column::Id.is_in(group_ids.iter().copied()))
        .filter(group::Column::InventoryPoolId.eq(inventory_pool_id))
        .filter(group::Column::IsVerificationRequired.eq(true))
        .all(conn)
        .await?
        .into_iter()
        .map(|g| g.id)
        .collect();

    if verification_groups.is_empty() {
        return Ok(Vec::new());
    }

    let partitions = Partition::find()
        .filter(partition::Column::GroupId.is_in(verification_groups))
        .filter(partition::Column::ModelId.eq(model_id))
        .filter(partition::Column::InventoryPoolId.eq(inventory_pool_id))
        .all(conn)
        .await?;

    let mut quotas = Vec::with_capacity(partitions.len());
    for partition in partitions {
        let members: HashSet<i64> = GroupUser::find()
            .filter(group_user::Column::GroupId.eq(partition.group_id))
            .all(conn)
            .await?
            .into_iter()
            .map(|m| m.user_id)
            .collect();

        let allocated = total_quantity(lines.iter().filter(|l| members.contains(&l.user_id)))?;

        quotas.push(GroupQuota {
            group_id: partition.group_id,
            quota: u32::try_from(partition.quantity)?,
            allocated,
        });
    }

    Ok(quotas)
}

/// Full availability breakdown for a model in a pool over `range`.
///
/// `exclude_line_id` removes a line that is being re-evaluated from every sum so it is
/// never counted against itself.
pub async fn availability<C>(
    conn: &C,
    model_id: i64,
    inventory_pool_id: i64,
    range: DateRange,
    group_ids: &[i64],
    exclude_line_id: Option<i64>,
) -> Result<Availability>
where
    C: ConnectionTrait,
{
    let borrowable = borrowable_count(conn, model_id, inventory_pool_id).await?;
    let lines = committed_lines(conn, model_id, inventory_pool_id, range, exclude_line_id).await?;
    let committed = total_quantity(&lines)?;
    let group_quotas = group_quotas(conn, model_id, inventory_pool_id, group_ids, &lines).await?;

    Ok(compute(&AvailabilityInputs {
        borrowable,
        committed,
        group_quotas,
    }))
}

/// Units of a model still free in a pool between `start_date` and `end_date` (inclusive)
/// for a user belonging to `group_ids`.
pub async fn available<C>(
    conn: &C,
    model_id: i64,
    inventory_pool_id: i64,
    start_date: NaiveDate,
    end_date: NaiveDate,
    group_ids: &[i64],
) -> Result<u32>
where
    C: ConnectionTrait,
{
    let range = DateRange::new(start_date, end_date);
    availability(conn, model_id, inventory_pool_id, range, group_ids, None)
        .await
        .map(|a| a.available)
}

/// Checks that `line` fits into `range` next to every other committed line.
///
/// Returns the breakdown on success and [`Error::CapacityExceeded`] otherwise.
pub async fn ensure_line_fits<C>(
    conn: &C,
    line: &reservation::Model,
    range: DateRange,
    group_ids: &[i64],
) -> Result<Availability>
where
    C: ConnectionTrait,
{
    let availability = availability(
        conn,
        line.model_id,
        line.inventory_pool_id,
        range,
        group_ids,
        Some(line.id),
    )
    .await?;
    let requested = u32::try_from(line.quantity)?;

    if availability.fits(requested) {
        Ok(availability)
    } else {
        Err(Error::CapacityExceeded {
            line_id: line.id,
            model_id: line.model_id,
            requested,
            available: availability.available,
        })
    }
}

/// Takes the allocation lock for every `(pool, model)` pair, in sorted order.
///
/// Must run inside the transaction that recomputes availability and commits the
/// status change.
pub async fn lock_allocations<C, I>(conn: &C, pairs: I) -> Result<()>
where
    C: ConnectionTrait,
    I: IntoIterator<Item = (i64, i64)>,
{
    let ordered: BTreeSet<(i64, i64)> = pairs.into_iter().collect();

    for (inventory_pool_id, model_id) in ordered {
        let lock = availability_lock::ActiveModel {
            inventory_pool_id: Set(inventory_pool_id),
            model_id: Set(model_id),
            version: Set(1),
        };

        AvailabilityLock::insert(lock)
            .on_conflict(
                OnConflict::columns([
                    availability_lock::Column::InventoryPoolId,
                    availability_lock::Column::ModelId,
                ])
                .value(
                    availability_lock::Column::Version,
                    Expr::col(availability_lock::Column::Version).add(1),
                )
                .to_owned(),
            )
            .exec_without_returning(conn)
            .await?;

        tracing::trace!(inventory_pool_id, model_id, "allocation lock taken");
    }

    Ok(())
}

/// How a line stands against the pool, in the `for_user(in_total)/borrowable` notation
/// shown next to problematic lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineAvailability {
    /// Units free for the line's user, group quotas applied
    pub for_user: u32,
    /// Units free in the pool regardless of groups
    pub in_total: u32,
    /// Borrowable units the pool owns
    pub borrowable: u32,
    /// Quantity of the line
    pub requested: u32,
}

impl LineAvailability {
    /// The line asks for more than its user can get.
    #[must_use]
    pub const fn is_overbooked(&self) -> bool {
        self.requested > self.for_user
    }
}

impl fmt::Display for LineAvailability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})/{}", self.for_user, self.in_total, self.borrowable)
    }
}

/// Availability of a stored line, excluding the line itself.
pub async fn line_availability<C>(conn: &C, line: &reservation::Model) -> Result<LineAvailability>
where
    C: ConnectionTrait,
{
    let range = DateRange::new(line.start_date, line.end_date);
    let group_ids =
        inventory::group_ids_for_user(conn, line.user_id, line.inventory_pool_id).await?;

    let for_user = availability(
        conn,
        line.model_id,
        line.inventory_pool_id,
        range,
        &group_ids,
        Some(line.id),
    )
    .await?;
    let in_total = availability(
        conn,
        line.model_id,
        line.inventory_pool_id,
        range,
        &[],
        Some(line.id),
    )
    .await?;

    Ok(LineAvailability {
        for_user: for_user.available,
        in_total: in_total.available,
        borrowable: in_total.borrowable,
        requested: u32::try_from(line.quantity)?,
    })
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::core::reservation::NewReservation;
    use crate::test_utils::*;

    #[test]
    fn test_date_range_clamps_end() {
        let range = DateRange::new(day(5), day(2));
        assert_eq!(range.start(), day(5));
        assert_eq!(range.end(), day(5));
        assert_eq!(range.days(), 1);
    }

    #[test]
    fn test_date_range_overlap_is_inclusive() {
        let a = DateRange::new(day(1), day(5));
        assert!(a.overlaps(&DateRange::new(day(5), day(9))));
        assert!(a.overlaps(&DateRange::new(day(0), day(1))));
        assert!(a.overlaps(&DateRange::new(day(2), day(3))));
        assert!(!a.overlaps(&DateRange::new(day(6), day(9))));
        assert!(!DateRange::new(day(6), day(9)).overlaps(&a));
    }

    #[test]
    fn test_compute_never_negative() {
        let result = compute(&AvailabilityInputs {
            borrowable: 3,
            committed: 5,
            group_quotas: vec![],
        });
        assert_eq!(result.available, 0);
        assert!(result.overbooked);
    }

    #[test]
    fn test_compute_caps_by_summed_group_headroom() {
        let result = compute(&AvailabilityInputs {
            borrowable: 10,
            committed: 2,
            group_quotas: vec![
                GroupQuota {
                    group_id: 1,
                    quota: 2,
                    allocated: 1,
                },
                GroupQuota {
                    group_id: 2,
                    quota: 1,
                    allocated: 3,
                },
            ],
        });
        assert_eq!(result.group_cap, Some(1));
        assert_eq!(result.available, 1);
        assert!(result.overbooked);
    }

    #[test]
    fn test_compute_never_exceeds_borrowable() {
        let result = compute(&AvailabilityInputs {
            borrowable: 2,
            committed: 0,
            group_quotas: vec![GroupQuota {
                group_id: 1,
                quota: 50,
                allocated: 0,
            }],
        });
        assert_eq!(result.available, 2);
    }

    #[test]
    fn test_line_availability_display() {
        let line = LineAvailability {
            for_user: 2,
            in_total: 3,
            borrowable: 7,
            requested: 4,
        };
        assert_eq!(line.to_string(), "2(3)/7");
        assert!(line.is_overbooked());
    }

    #[tokio::test]
    async fn test_available_without_reservations() -> Result<()> {
        let fx = setup_pool_with_stock(5).await?;

        let free = available(&fx.db, fx.model.id, fx.pool.id, day(1), day(5), &[]).await?;
        assert_eq!(free, 5);
        Ok(())
    }

    #[tokio::test]
    async fn test_unborrowable_items_do_not_count() -> Result<()> {
        let fx = setup_pool_with_stock(2).await?;
        inventory::add_items(&fx.db, fx.pool.id, fx.model.id, 3, false).await?;

        let free = available(&fx.db, fx.model.id, fx.pool.id, day(1), day(5), &[]).await?;
        assert_eq!(free, 2);
        Ok(())
    }

    #[tokio::test]
    async fn test_two_approved_lines_leave_one() -> Result<()> {
        let fx = setup_pool_with_stock(5).await?;
        let other = create_test_user(&fx.db, "other").await?;
        insert_line(
            &fx,
            fx.customer.id,
            2,
            day(1),
            day(5),
            ReservationStatus::Approved,
        )
        .await?;
        insert_line(
            &fx,
            other.id,
            2,
            day(3),
            day(8),
            ReservationStatus::Approved,
        )
        .await?;

        let free = available(&fx.db, fx.model.id, fx.pool.id, day(2), day(4), &[]).await?;
        assert_eq!(free, 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_only_committed_statuses_count() -> Result<()> {
        let fx = setup_pool_with_stock(5).await?;
        for status in [
            ReservationStatus::Unsubmitted,
            ReservationStatus::Rejected,
            ReservationStatus::Submitted,
        ] {
            insert_line(&fx, fx.customer.id, 1, day(1), day(5), status).await?;
        }

        let free = available(&fx.db, fx.model.id, fx.pool.id, day(1), day(5), &[]).await?;
        assert_eq!(free, 4);
        Ok(())
    }

    #[tokio::test]
    async fn test_non_overlapping_reservation_does_not_reduce() -> Result<()> {
        let fx = setup_pool_with_stock(3).await?;
        insert_line(
            &fx,
            fx.customer.id,
            3,
            day(1),
            day(4),
            ReservationStatus::Approved,
        )
        .await?;

        let free = available(&fx.db, fx.model.id, fx.pool.id, day(5), day(9), &[]).await?;
        assert_eq!(free, 3);
        let blocked = available(&fx.db, fx.model.id, fx.pool.id, day(4), day(9), &[]).await?;
        assert_eq!(blocked, 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_other_pool_and_model_are_ignored() -> Result<()> {
        let fx = setup_pool_with_stock(2).await?;
        let other_model = inventory::create_model(&fx.db, "Sony", "Tripod", None, 20.0).await?;
        inventory::add_items(&fx.db, fx.pool.id, other_model.id, 2, true).await?;
        let line = NewReservation {
            model_id: other_model.id,
            quantity: 2,
            status: ReservationStatus::Approved,
            ..NewReservation::new(fx.pool.id, fx.customer.id, fx.model.id, day(1), day(5))
        };
        crate::core::reservation::create_reservation(&fx.db, line).await?;

        let free = available(&fx.db, fx.model.id, fx.pool.id, day(1), day(5), &[]).await?;
        assert_eq!(free, 2);
        Ok(())
    }

    #[tokio::test]
    async fn test_group_quota_caps_member_availability() -> Result<()> {
        let fx = setup_pool_with_stock(5).await?;
        let classmate = create_test_user(&fx.db, "classmate").await?;
        let group = inventory::create_group(&fx.db, fx.pool.id, "Film", true).await?;
        inventory::add_group_member(&fx.db, group.id, fx.customer.id).await?;
        inventory::add_group_member(&fx.db, group.id, classmate.id).await?;
        inventory::set_partition(&fx.db, fx.pool.id, group.id, fx.model.id, 1).await?;
        insert_line(
            &fx,
            classmate.id,
            1,
            day(1),
            day(5),
            ReservationStatus::Approved,
        )
        .await?;

        let free = available(&fx.db, fx.model.id, fx.pool.id, day(2), day(3), &[group.id]).await?;
        assert_eq!(free, 0);

        // Without the group the raw capacity applies
        let raw = available(&fx.db, fx.model.id, fx.pool.id, day(2), day(3), &[]).await?;
        assert_eq!(raw, 4);
        Ok(())
    }

    #[tokio::test]
    async fn test_quota_of_group_without_verification_is_ignored() -> Result<()> {
        let fx = setup_pool_with_stock(5).await?;
        let group = inventory::create_group(&fx.db, fx.pool.id, "Staff", false).await?;
        inventory::add_group_member(&fx.db, group.id, fx.customer.id).await?;
        inventory::set_partition(&fx.db, fx.pool.id, group.id, fx.model.id, 1).await?;

        let free = available(&fx.db, fx.model.id, fx.pool.id, day(1), day(3), &[group.id]).await?;
        assert_eq!(free, 5);
        Ok(())
    }

    #[tokio::test]
    async fn test_ensure_line_fits_excludes_itself() -> Result<()> {
        let fx = setup_pool_with_stock(2).await?;
        let line = insert_line(
            &fx,
            fx.customer.id,
            2,
            day(1),
            day(5),
            ReservationStatus::Submitted,
        )
        .await?;

        let availability =
            ensure_line_fits(&fx.db, &line, DateRange::new(day(1), day(5)), &[]).await?;
        assert_eq!(availability.available, 2);
insert_line(
    &fx,
    fx.customer.id,
    1,
    day(2),
    day(2),
    ReservationStatus::Approved,
)
.await?;
        let result = ensure_line_fits(&fx.db, &line, DateRange::new(day(1), day(5)), &[]).await;
        assert!(matches!(
            result,
            Err(Error::CapacityExceeded {
                requested: 2,
                available: 1,
                ..
            })
        ));
        Ok(())
    }

    #[tokio::test]
    async fn test_line_availability_reports_user_and_total() -> Result<()> {
        let fx = setup_pool_with_stock(7).await?;
        let classmate = create_test_user(&fx.db, "classmate").await?;
        let group = inventory::create_group(&fx.db, fx.pool.id, "Film", true).await?;
        inventory::add_group_member(&fx.db, group.id, fx.customer.id).await?;
        inventory::add_group_member(&fx.db, group.id, classmate.id).await?;
        inventory::set_partition(&fx.db, fx.pool.id, group.id, fx.model.id, 3).await?;
        insert_line(
            &fx,
            classmate.id,
            1,
            day(1),
            day(5),
            ReservationStatus::Approved,
        )
        .await?;
        insert_line(
            &fx,
            fx.manager.id,
            3,
            day(1),
            day(5),
            ReservationStatus::Signed,
        )
        .await?;
        let line = insert_line(
            &fx,
            fx.customer.id,
            4,
            day(1),
            day(5),
            ReservationStatus::Submitted,
        )
        .await?;

        let report = line_availability(&fx.db, &line).await?;
        assert_eq!(report.to_string(), "2(3)/7");
        assert!(report.is_overbooked());
        Ok(())
    }

    #[tokio::test]
    async fn test_lock_allocations_upserts() -> Result<()> {
        let fx = setup_pool_with_stock(1).await?;

        lock_allocations(&fx.db, [(fx.pool.id, fx.model.id)]).await?;
        lock_allocations(&fx.db, [(fx.pool.id, fx.model.id), (fx.pool.id, fx.model.id)]).await?;

        let lock = AvailabilityLock::find_by_id((fx.pool.id, fx.model.id))
            .one(&fx.db)
            .await?
            .unwrap();
        assert_eq!(lock.version, 2);
        Ok(())
    }
}

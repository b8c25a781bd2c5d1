//! Reservation bundles - Orders and contracts derived from reservation lines at read time.
//!
//! A bundle is never stored. Signed and closed lines form a bundle per contract; every
//! other line forms a bundle with the lines of the same user, pool and status. A contract
//! with both signed and closed lines reads as signed until the last line is returned.

use crate::{
    config::settings::LendingSettings,
    core::{
        availability, calendar, commit_or_rollback, inventory,
        notification::{NotificationError, Notifier, record_failure},
        reservation::{self, NewReservation},
    },
    entities::{
        Group, GroupUser, LendableModel, Partition, Reservation, group, group_user, model,
        partition, reservation as line, reservation::ReservationStatus,
    },
    errors::{Error, Result},
};
use chrono::{NaiveDate, Utc};
use sea_orm::{Condition, DatabaseTransaction, QueryOrder, Set, TransactionTrait, prelude::*};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;
use tracing::{info, instrument, warn};

/// Identity of a bundle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BundleKey {
    /// Signed or closed lines handed over under one contract
    Contract(i64),
    /// Lines not handed over yet
    Open {
        status: ReservationStatus,
        user_id: i64,
        inventory_pool_id: i64,
    },
}

impl BundleKey {
    /// The bundle a line belongs to.
    #[must_use]
    pub const fn for_line(line: &line::Model) -> Self {
        match line.contract_id {
            Some(contract_id) => Self::Contract(contract_id),
            None => Self::Open {
                status: line.status,
                user_id: line.user_id,
                inventory_pool_id: line.inventory_pool_id,
            },
        }
    }

    pub(crate) fn condition(self) -> Condition {
        match self {
            Self::Contract(contract_id) => Condition::all()
                .add(line::Column::ContractId.eq(contract_id))
                .add(reservation::signed_or_closed()),
            Self::Open {
                status,
                user_id,
                inventory_pool_id,
            } => status
                .condition()
                .add(line::Column::UserId.eq(user_id))
                .add(line::Column::InventoryPoolId.eq(inventory_pool_id))
                .add(line::Column::ContractId.is_null()),
        }
    }
}

impl fmt::Display for BundleKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Contract(contract_id) => write!(f, "{contract_id}"),
            Self::Open {
                status,
                user_id,
                inventory_pool_id,
            } => write!(f, "{}_{user_id}_{inventory_pool_id}", status.as_str()),
        }
    }
}

impl FromStr for BundleKey {
    type Err = Error;

    /// Parses either a contract id (`"42"`) or `"{status}_{user_id}_{pool_id}"`.
    fn from_str(s: &str) -> Result<Self> {
        let invalid = || Error::validation(format!("Invalid bundle id '{s}'"));

        let parts: Vec<&str> = s.trim().split('_').collect();
        match parts.as_slice() {
            [contract_id] => contract_id.parse().map(Self::Contract).map_err(|_| invalid()),
            [status, user_id, inventory_pool_id] => Ok(Self::Open {
                status: status.parse()?,
                user_id: user_id.parse().map_err(|_| invalid())?,
                inventory_pool_id: inventory_pool_id.parse().map_err(|_| invalid())?,
            }),
            _ => Err(invalid()),
        }
    }
}

/// An order or contract: the lines sharing one [`BundleKey`].
#[derive(Debug, Clone, PartialEq)]
pub struct Bundle {
    /// Identity of the bundle
    pub key: BundleKey,
    /// Status of the lines; `Signed` while any line of a contract is still out
    pub status: ReservationStatus,
    /// The borrower
    pub user_id: i64,
    /// Pool the items come from
    pub inventory_pool_id: i64,
    /// First delegated user found on the lines
    pub delegated_user_id: Option<i64>,
    /// The user belongs to a group of the pool that requires verification
    pub verifiable_user: bool,
    /// Such a group also has a quota for one of the bundle's models
    pub verifiable_user_and_model: bool,
    /// Latest creation time among the lines
    pub created_at: Option<DateTimeUtc>,
    /// Member lines ordered by id
    pub lines: Vec<line::Model>,
}

impl Bundle {
    /// The empty cart of a user in a pool.
    #[must_use]
    pub const fn empty(user_id: i64, inventory_pool_id: i64) -> Self {
        Self::open(ReservationStatus::Unsubmitted, user_id, inventory_pool_id)
    }

    const fn open(status: ReservationStatus, user_id: i64, inventory_pool_id: i64) -> Self {
        Self {
            key: BundleKey::Open {
                status,
                user_id,
                inventory_pool_id,
            },
            status,
            user_id,
            inventory_pool_id,
            delegated_user_id: None,
            verifiable_user: false,
            verifiable_user_and_model: false,
            created_at: None,
            lines: Vec::new(),
        }
    }

    /// Builds a bundle from lines that share `key`. Returns `None` for no lines.
    fn from_lines(key: BundleKey, lines: Vec<line::Model>) -> Option<Self> {
        let first = lines.first()?;
        let status = if lines.iter().any(|l| l.status == ReservationStatus::Signed) {
            ReservationStatus::Signed
        } else {
            lines.iter().map(|l| l.status).max()?
        };
        Some(Self {
            key,
            status,
            user_id: first.user_id,
            inventory_pool_id: first.inventory_pool_id,
            delegated_user_id: lines.iter().find_map(|l| l.delegated_user_id),
            verifiable_user: false,
            verifiable_user_and_model: false,
            created_at: lines.iter().map(|l| l.created_at).max(),
            lines,
        })
    }

    /// No lines, e.g. an empty cart.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Ids of the member lines.
    #[must_use]
    pub fn line_ids(&self) -> Vec<i64> {
        self.lines.iter().map(|l| l.id).collect()
    }

    /// Sum of the line quantities.
    #[must_use]
    pub fn total_quantity(&self) -> i64 {
        self.lines.iter().map(|l| i64::from(l.quantity)).sum()
    }

    /// Earliest start date of the lines.
    #[must_use]
    pub fn min_date(&self) -> Option<NaiveDate> {
        self.lines.iter().map(|l| l.start_date).min()
    }

    /// Latest end date of the lines.
    #[must_use]
    pub fn max_date(&self) -> Option<NaiveDate> {
        self.lines.iter().map(|l| l.end_date).max()
    }

    /// Longest line duration in days, both ends included.
    #[must_use]
    pub fn max_range(&self) -> Option<i64> {
        self.lines.iter().map(|l| l.period().days()).max()
    }

    /// Distinct non-blank purposes in line order, joined by `"; "`.
    #[must_use]
    pub fn purpose_descriptions(&self) -> String {
        let mut seen = HashSet::new();
        self.lines
            .iter()
            .filter_map(|l| l.purpose.as_deref())
            .map(str::trim)
            .filter(|p| !p.is_empty() && seen.insert(*p))
            .collect::<Vec<_>>()
            .join("; ")
    }

    /// The user the items are actually for.
    #[must_use]
    pub fn target_user_id(&self) -> i64 {
        self.delegated_user_id.unwrap_or(self.user_id)
    }

    /// Staff member who handed the items over, once signed.
    #[must_use]
    pub fn handed_over_by_user_id(&self) -> Option<i64> {
        if self.status.is_signed_or_closed() {
            self.lines.first().and_then(|l| l.handed_over_by_user_id)
        } else {
            None
        }
    }

    /// Needs a look by a group manager before approval.
    #[must_use]
    pub const fn is_to_be_verified(&self) -> bool {
        self.verifiable_user_and_model
    }

    /// Replacement price of everything in the bundle.
    pub async fn total_price<C>(&self, conn: &C) -> Result<f64>
    where
        C: ConnectionTrait,
    {
        let model_ids: HashSet<i64> = self.lines.iter().map(|l| l.model_id).collect();
        let prices: HashMap<i64, f64> = LendableModel::find()
            .filter(model::Column::Id.is_in(model_ids))
            .all(conn)
            .await?
            .into_iter()
            .map(|m| (m.id, m.price))
            .collect();

        Ok(self
            .lines
            .iter()
            .map(|l| prices.get(&l.model_id).copied().unwrap_or_default() * f64::from(l.quantity))
            .sum())
    }
}

/// Result of a submit, approve or reject.
#[derive(Debug, Clone)]
pub struct TransitionOutcome {
    /// The bundle the lines belong to after the transition
    pub bundle: Bundle,
    /// Notifications that could not be delivered; the transition itself is committed
    pub notification_failures: Vec<NotificationError>,
}

/// Computes the verification flags of a bundle.
async fn verification_flags<C>(conn: &C, bundle: &mut Bundle) -> Result<()>
where
    C: ConnectionTrait,
{
    let group_ids: Vec<i64> = Group::find()
        .inner_join(GroupUser)
        .filter(group_user::Column::UserId.eq(bundle.user_id))
        .filter(group::Column::InventoryPoolId.eq(bundle.inventory_pool_id))
        .filter(group::Column::IsVerificationRequired.eq(true))
        .all(conn)
        .await?
        .into_iter()
        .map(|g| g.id)
        .collect();

    bundle.verifiable_user = !group_ids.is_empty();
    bundle.verifiable_user_and_model = if bundle.verifiable_user {
        let model_ids: HashSet<i64> = bundle.lines.iter().map(|l| l.model_id).collect();
        Partition::find()
            .filter(partition::Column::GroupId.is_in(group_ids))
            .filter(partition::Column::ModelId.is_in(model_ids))
            .count(conn)
            .await?
            > 0
    } else {
        false
    };

    Ok(())
}

/// Groups lines into bundles, keeping the order in which each bundle is first seen.
pub async fn group_lines<C>(conn: &C, lines: Vec<line::Model>) -> Result<Vec<Bundle>>
where
    C: ConnectionTrait,
{
    let mut order = Vec::new();
    let mut grouped: HashMap<BundleKey, Vec<line::Model>> = HashMap::new();
    for l in lines {
        let key = BundleKey::for_line(&l);
        grouped
            .entry(key)
            .or_insert_with(|| {
                order.push(key);
                Vec::new()
            })
            .push(l);
    }

    let mut bundles = Vec::with_capacity(order.len());
    for key in order {
        let lines = grouped.remove(&key).unwrap_or_default();
        if let Some(mut bundle) = Bundle::from_lines(key, lines) {
            verification_flags(conn, &mut bundle).await?;
            bundles.push(bundle);
        }
    }

    Ok(bundles)
}

/// Loads a bundle by key.
///
/// An open key without lines yields an empty bundle in that status; a contract without
/// lines is [`Error::NotFound`].
pub async fn find_bundle<C>(conn: &C, key: BundleKey) -> Result<Bundle>
where
    C: ConnectionTrait,
{
    let lines = Reservation::find()
        .filter(key.condition())
        .order_by_asc(line::Column::Id)
        .all(conn)
        .await?;

    if lines.is_empty() {
        return match key {
            BundleKey::Contract(contract_id) => Err(Error::not_found("contract", contract_id)),
            BundleKey::Open {
                status,
                user_id,
                inventory_pool_id,
            } => Ok(Bundle::open(status, user_id, inventory_pool_id)),
        };
    }

    group_lines(conn, lines)
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| Error::not_found("bundle", key))
}

/// Re-reads the bundle's lines, failing if any of them is gone.
pub(crate) async fn reload_lines<C>(conn: &C, line_ids: &[i64]) -> Result<Vec<line::Model>>
where
    C: ConnectionTrait,
{
    let lines = Reservation::find()
        .filter(line::Column::Id.is_in(line_ids.iter().copied()))
        .order_by_asc(line::Column::Id)
        .all(conn)
        .await?;

    if let Some(missing) = line_ids
        .iter()
        .find(|id| !lines.iter().any(|l| l.id == **id))
    {
        return Err(Error::not_found("reservation", missing));
    }

    Ok(lines)
}

/// Arguments of [`add_lines`] besides the bundle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddLines {
    /// Number of single-unit lines to create
    pub quantity: u32,
    /// Model to reserve
    pub model_id: i64,
    /// Defaults to the bundle's first start date, else today
    pub start_date: Option<NaiveDate>,
    /// Defaults to the next open day after the bundle's last end date
    pub end_date: Option<NaiveDate>,
    /// Defaults to the bundle's delegated user
    pub delegated_user_id: Option<i64>,
}

impl AddLines {
    /// `quantity` lines of `model_id` with every default applied.
    #[must_use]
    pub const fn new(quantity: u32, model_id: i64) -> Self {
        Self {
            quantity,
            model_id,
            start_date: None,
            end_date: None,
            delegated_user_id: None,
        }
    }
}

/// Adds `request.quantity` lines of one unit each to a bundle.
///
/// Missing dates default to the bundle's time window: its earliest start (or today) and
/// the first open day on or after its latest end (or today). New lines take the bundle's
/// status, its delegated user when none is given, and its purpose when it is submitted.
/// Lines added to an approved bundle are checked against availability under the
/// allocation lock.
///
/// # Errors
/// - [`Error::Validation`] for a quantity outside `1..=max_lines_per_request` or a bundle
///   that no longer accepts lines
/// - [`Error::CapacityExceeded`] if an approved bundle would overbook the model
#[instrument(
    skip(db, settings, bundle, request),
    fields(bundle = %bundle.key, quantity = request.quantity)
)]
pub async fn add_lines(
    db: &DatabaseConnection,
    settings: &LendingSettings,
    bundle: &Bundle,
    request: AddLines,
) -> Result<Vec<line::Model>> {
    if request.quantity == 0 || request.quantity > settings.max_lines_per_request {
        return Err(Error::validation(format!(
            "Quantity must be between 1 and {}, got {}",
            settings.max_lines_per_request, request.quantity
        )));
    }

    if !bundle.status.is_removable() {
        return Err(Error::validation(format!(
            "Bundle {} is {} and does not accept new lines",
            bundle.key,
            bundle.status.as_str()
        )));
    }

    let today = calendar::today();
    let start_date = request
        .start_date
        .unwrap_or_else(|| bundle.min_date().unwrap_or(today));
    let end_date = match request.end_date {
        Some(end_date) => end_date,
        None => {
            calendar::next_open_date(
                db,
                bundle.inventory_pool_id,
                bundle.max_date().unwrap_or(today),
            )
            .await?
        }
    };

    let template = NewReservation {
        delegated_user_id: request.delegated_user_id.or(bundle.delegated_user_id),
        status: bundle.status,
        purpose: if bundle.status == ReservationStatus::Submitted {
            bundle.lines.first().and_then(|l| l.purpose.clone())
        } else {
            None
        },
        ..NewReservation::new(
            bundle.inventory_pool_id,
            bundle.user_id,
            request.model_id,
            start_date,
            end_date,
        )
    };

    let txn = db.begin().await?;
    let result = insert_lines(&txn, bundle, &template, request.quantity).await;
    let lines = commit_or_rollback(txn, result).await?;

    info!(
        bundle = %bundle.key,
        model_id = request.model_id,
        count = lines.len(),
        "Added reservation lines"
    );
    Ok(lines)
}

async fn insert_lines(
    txn: &DatabaseTransaction,
    bundle: &Bundle,
    template: &NewReservation,
    quantity: u32,
) -> Result<Vec<line::Model>> {
    let checked = bundle.status == ReservationStatus::Approved;
    if checked {
        availability::lock_allocations(txn, [(template.inventory_pool_id, template.model_id)])
            .await?;
    }

    let mut lines = Vec::with_capacity(usize::try_from(quantity)?);
    for _ in 0..quantity {
        lines.push(reservation::create_reservation(txn, template.clone()).await?);
    }

    if checked {
        let group_ids =
            inventory::group_ids_for_user(txn, bundle.user_id, bundle.inventory_pool_id).await?;
        for l in &lines {
            availability::ensure_line_fits(txn, l, l.period(), &group_ids).await?;
        }
    }

    Ok(lines)
}

/// Removes a line from a bundle.
///
/// Returns `false` when the bundle is past approval, the line is gone, or it belongs to
/// another bundle.
pub async fn remove_line<C>(conn: &C, bundle: &Bundle, line_id: i64) -> Result<bool>
where
    C: ConnectionTrait,
{
    if !bundle.status.is_removable() {
        return Ok(false);
    }

    let Some(current) = reservation::get_reservation(conn, line_id).await? else {
        return Ok(false);
    };

    if BundleKey::for_line(&current) != bundle.key {
        return Ok(false);
    }

    reservation::delete_reservation(conn, line_id).await
}

/// Submits the user's cart.
///
/// All lines move from unsubmitted to submitted together, optionally sharing a purpose.
/// Availability is not checked here. Two notifications follow, "order submitted" to the
/// customer and "order received" to the pool; their failures do not undo the submit.
#[instrument(skip(db, notifier, bundle, purpose), fields(bundle = %bundle.key))]
pub async fn submit<N>(
    db: &DatabaseConnection,
    notifier: &N,
    bundle: &Bundle,
    purpose: Option<&str>,
) -> Result<TransitionOutcome>
where
    N: Notifier,
{
    if bundle.is_empty() {
        return Err(Error::validation(format!("Bundle {} has no lines to submit", bundle.key)));
    }

    let purpose = purpose.map(str::trim).filter(|p| !p.is_empty());

    let txn = db.begin().await?;
    let result = submit_lines(&txn, &bundle.line_ids(), purpose).await;
    commit_or_rollback(txn, result).await?;

    let submitted = find_bundle(
        db,
        BundleKey::Open {
            status: ReservationStatus::Submitted,
            user_id: bundle.user_id,
            inventory_pool_id: bundle.inventory_pool_id,
        },
    )
    .await?;
    info!(bundle = %submitted.key, lines = submitted.lines.len(), "Order submitted");

    let mut notification_failures = Vec::new();
    record_failure(
        notifier.order_submitted(&submitted).await,
        &mut notification_failures,
    );
    record_failure(
        notifier.order_received(&submitted).await,
        &mut notification_failures,
    );

    Ok(TransitionOutcome {
        bundle: submitted,
        notification_failures,
    })
}

async fn submit_lines(
    txn: &DatabaseTransaction,
    line_ids: &[i64],
    purpose: Option<&str>,
) -> Result<()> {
    let lines = reload_lines(txn, line_ids).await?;

    for l in &lines {
        reservation::ensure_transition(l, ReservationStatus::Submitted)?;
        if l.quantity < 1 {
            return Err(Error::validation(format!(
                "Reservation {} has quantity {}",
                l.id, l.quantity
            )));
        }
        if l.end_date < l.start_date {
            return Err(Error::validation(format!(
                "Reservation {} ends before it starts",
                l.id
            )));
        }
    }

    for l in lines {
        let mut active_model: line::ActiveModel = l.into();
        if let Some(purpose) = purpose {
            active_model.purpose = Set(Some(purpose.to_string()));
        }
        active_model.status = Set(ReservationStatus::Submitted);
        active_model.updated_at = Set(Utc::now());
        active_model.update(txn).await?;
    }

    Ok(())
}

/// Approves a submitted order.
///
/// Every line must fit into the pool next to all other committed lines. When one does not,
/// `force` lets a lending or inventory manager approve anyway. The "order approved"
/// notification is attempted afterwards; its failure is reported, not raised.
///
/// # Errors
/// - [`Error::CapacityExceeded`] when a line does not fit and `force` is not set
/// - [`Error::PermissionDenied`] when forcing without a manager role
/// - [`Error::InvalidTransition`] when a line is no longer submitted
#[instrument(skip(db, notifier, bundle, comment), fields(bundle = %bundle.key))]
pub async fn approve<N>(
    db: &DatabaseConnection,
    notifier: &N,
    bundle: &Bundle,
    comment: &str,
    force: bool,
    acting_user_id: i64,
) -> Result<TransitionOutcome>
where
    N: Notifier,
{
    if bundle.is_empty() {
        return Err(Error::validation(format!("Bundle {} has no lines to approve", bundle.key)));
    }

    let txn = db.begin().await?;
    let result = approve_lines(&txn, bundle, force, acting_user_id).await;
    commit_or_rollback(txn, result).await?;

    let approved = find_bundle(
        db,
        BundleKey::Open {
            status: ReservationStatus::Approved,
            user_id: bundle.user_id,
            inventory_pool_id: bundle.inventory_pool_id,
        },
    )
    .await?;
    info!(bundle = %approved.key, by_user = acting_user_id, force, "Order approved");

    let mut notification_failures = Vec::new();
    record_failure(
        notifier
            .order_approved(&approved, comment, acting_user_id)
            .await,
        &mut notification_failures,
    );

    Ok(TransitionOutcome {
        bundle: approved,
        notification_failures,
    })
}

async fn approve_lines(
    txn: &DatabaseTransaction,
    bundle: &Bundle,
    force: bool,
    acting_user_id: i64,
) -> Result<()> {
    availability::lock_allocations(
        txn,
        bundle
            .lines
            .iter()
            .map(|l| (l.inventory_pool_id, l.model_id)),
    )
    .await?;

    let lines = reload_lines(txn, &bundle.line_ids()).await?;
    for l in &lines {
        reservation::ensure_transition(l, ReservationStatus::Approved)?;
    }

    let group_ids =
        inventory::group_ids_for_user(txn, bundle.user_id, bundle.inventory_pool_id).await?;
    let mut shortage = None;
    for l in &lines {
        match availability::ensure_line_fits(txn, l, l.period(), &group_ids).await {
            Ok(_) => {}
            Err(e @ Error::CapacityExceeded { .. }) => {
                shortage = Some(e);
                break;
            }
            Err(e) => return Err(e),
        }
    }

    if let Some(e) = shortage {
        if !force {
            return Err(e);
        }
        if !inventory::has_manager_role(txn, acting_user_id, bundle.inventory_pool_id).await? {
            return Err(Error::PermissionDenied {
                user_id: acting_user_id,
                inventory_pool_id: bundle.inventory_pool_id,
            });
        }
        warn!(bundle = %bundle.key, by_user = acting_user_id, "Forcing approval: {e}");
    }

    for l in lines {
        reservation::transition(txn, l, ReservationStatus::Approved).await?;
    }

    Ok(())
}

/// Rejects a submitted order, all lines or none.
///
/// A line that is no longer submitted (for example one that was handed over meanwhile)
/// aborts the whole reject with [`Error::InvalidTransition`].
#[instrument(skip(db, notifier, bundle, comment), fields(bundle = %bundle.key))]
pub async fn reject<N>(
    db: &DatabaseConnection,
    notifier: &N,
    bundle: &Bundle,
    comment: &str,
    acting_user_id: i64,
) -> Result<TransitionOutcome>
where
    N: Notifier,
{
    if bundle.is_empty() {
        return Err(Error::validation(format!("Bundle {} has no lines to reject", bundle.key)));
    }

    let txn = db.begin().await?;
    let result = reject_lines(&txn, &bundle.line_ids()).await;
    commit_or_rollback(txn, result).await?;

    let rejected = find_bundle(
        db,
        BundleKey::Open {
            status: ReservationStatus::Rejected,
            user_id: bundle.user_id,
            inventory_pool_id: bundle.inventory_pool_id,
        },
    )
    .await?;
    info!(bundle = %rejected.key, by_user = acting_user_id, "Order rejected");

    let mut notification_failures = Vec::new();
    record_failure(
        notifier
            .order_rejected(&rejected, comment, acting_user_id)
            .await,
        &mut notification_failures,
    );

    Ok(TransitionOutcome {
        bundle: rejected,
        notification_failures,
    })
}

async fn reject_lines(txn: &DatabaseTransaction, line_ids: &[i64]) -> Result<()> {
    let lines = reload_lines(txn, line_ids).await?;
    for l in &lines {
        reservation::ensure_transition(l, ReservationStatus::Rejected)?;
    }

    for l in lines {
        reservation::transition(txn, l, ReservationStatus::Rejected).await?;
    }

    Ok(())
}

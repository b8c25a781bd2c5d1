//! Bundle listing - Scoped, searchable and paginated views over the bundle projection.
//!
//! Status filters apply to lines before they are grouped, so a contract whose lines are
//! partly closed shows up under `closed` with only its closed lines.

use crate::{
    config::settings::LendingSettings,
    core::bundle::{self, Bundle, BundleKey},
    entities::{
        Contract, Item, LendableModel, Reservation, User, item, model, reservation,
        reservation::ReservationStatus, user,
    },
    errors::Result,
};
use chrono::NaiveDate;
use sea_orm::{Condition, QueryOrder, prelude::*};
use std::collections::{HashMap, HashSet};

/// Which bundles to keep by their verification flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum VerificationFilter {
    /// Keep every bundle
    #[default]
    Any,
    /// No quota group limits the bundle's models for this user
    NoVerificationRequired,
    /// A verification group of the user has a quota for one of the models
    ToBeVerified,
    /// The user is in a verification group, whatever the models
    FromVerifiableUsers,
}

impl VerificationFilter {
    const fn keeps(self, bundle: &Bundle) -> bool {
        match self {
            Self::Any => true,
            Self::NoVerificationRequired => !bundle.verifiable_user_and_model,
            Self::ToBeVerified => bundle.verifiable_user_and_model,
            Self::FromVerifiableUsers => bundle.verifiable_user,
        }
    }
}

/// Criteria for [`filter`]. Unset fields do not restrict the result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundleFilter {
    /// Bundles of one borrower
    pub user_id: Option<i64>,
    /// Bundles of one pool
    pub inventory_pool_id: Option<i64>,
    /// Line statuses to include; empty means all
    pub statuses: Vec<ReservationStatus>,
    /// Whitespace separated terms, each of which must match the same line
    pub search_term: Option<String>,
    /// Restriction by verification flags
    pub verification: VerificationFilter,
    /// A single bundle
    pub id: Option<BundleKey>,
    /// Inclusive bounds on the date part of the bundle's `created_at`
    pub created_from: Option<NaiveDate>,
    /// See `created_from`
    pub created_until: Option<NaiveDate>,
    /// 1-based page number
    pub page: u64,
    /// Falls back to the configured page size
    pub per_page: Option<u64>,
    /// `false` returns every match on one page
    pub paginate: bool,
}

impl Default for BundleFilter {
    fn default() -> Self {
        Self {
            user_id: None,
            inventory_pool_id: None,
            statuses: Vec::new(),
            search_term: None,
            verification: VerificationFilter::Any,
            id: None,
            created_from: None,
            created_until: None,
            page: 1,
            per_page: None,
            paginate: true,
        }
    }
}

/// One page of bundles, newest first.
#[derive(Debug, Clone)]
pub struct BundlePage {
    /// Bundles on this page
    pub bundles: Vec<Bundle>,
    /// Matches across all pages
    pub total: u64,
    /// 1-based page number
    pub page: u64,
    /// Page size used
    pub per_page: u64,
}

/// Lowercased text of everything a line can be found by.
struct SearchIndex {
    users: HashMap<i64, Vec<String>>,
    models: HashMap<i64, Vec<String>>,
    notes: HashMap<i64, String>,
    inventory_codes: HashMap<(i64, i64), Vec<String>>,
}

impl SearchIndex {
    async fn load<C>(conn: &C, lines: &[reservation::Model]) -> Result<Self>
    where
        C: ConnectionTrait,
    {
        let user_ids: HashSet<i64> = lines.iter().map(|l| l.user_id).collect();
        let model_ids: HashSet<i64> = lines.iter().map(|l| l.model_id).collect();
        let pool_ids: HashSet<i64> = lines.iter().map(|l| l.inventory_pool_id).collect();
        let contract_ids: HashSet<i64> = lines.iter().filter_map(|l| l.contract_id).collect();

        let users = User::find()
            .filter(user::Column::Id.is_in(user_ids))
            .all(conn)
            .await?
            .into_iter()
            .map(|u| {
                let mut fields = vec![u.login, u.firstname, u.lastname];
                fields.extend(u.badge_id);
                (u.id, lowercase(fields))
            })
            .collect();

        let models = LendableModel::find()
            .filter(model::Column::Id.is_in(model_ids.clone()))
            .all(conn)
            .await?
            .into_iter()
            .map(|m| {
                let mut fields = vec![m.manufacturer, m.product];
                fields.extend(m.version);
                (m.id, lowercase(fields))
            })
            .collect();

        let notes = Contract::find()
            .filter(crate::entities::contract::Column::Id.is_in(contract_ids))
            .all(conn)
            .await?
            .into_iter()
            .filter_map(|c| c.note.map(|note| (c.id, note.to_lowercase())))
            .collect();

        let mut inventory_codes: HashMap<(i64, i64), Vec<String>> = HashMap::new();
        for i in Item::find()
            .filter(item::Column::ModelId.is_in(model_ids))
            .filter(item::Column::InventoryPoolId.is_in(pool_ids))
            .all(conn)
            .await?
        {
            inventory_codes
                .entry((i.inventory_pool_id, i.model_id))
                .or_default()
                .push(i.inventory_code.to_lowercase());
        }

        Ok(Self {
            users,
            models,
            notes,
            inventory_codes,
        })
    }

    fn matches(&self, line: &reservation::Model, term: &str) -> bool {
        if line.contract_id.is_some() && term.parse::<i64>().ok() == line.contract_id {
            return true;
        }

        let contains = |field: &String| field.contains(term);
        self.users.get(&line.user_id).is_some_and(|f| f.iter().any(contains))
            || self.models.get(&line.model_id).is_some_and(|f| f.iter().any(contains))
            || line
                .contract_id
                .and_then(|id| self.notes.get(&id))
                .is_some_and(contains)
            || self
                .inventory_codes
                .get(&(line.inventory_pool_id, line.model_id))
                .is_some_and(|f| f.iter().any(contains))
            || line
                .purpose
                .as_ref()
                .is_some_and(|p| p.to_lowercase().contains(term))
    }
}

fn lowercase(fields: Vec<String>) -> Vec<String> {
    fields.into_iter().map(|f| f.to_lowercase()).collect()
}

/// Lists bundles matching `criteria`, newest first.
pub async fn filter<C>(
    conn: &C,
    settings: &LendingSettings,
    criteria: &BundleFilter,
) -> Result<BundlePage>
where
    C: ConnectionTrait,
{
    let mut condition = Condition::all();
    if let Some(user_id) = criteria.user_id {
        condition = condition.add(reservation::Column::UserId.eq(user_id));
    }
    if let Some(inventory_pool_id) = criteria.inventory_pool_id {
        condition = condition.add(reservation::Column::InventoryPoolId.eq(inventory_pool_id));
    }
    if !criteria.statuses.is_empty() {
        condition = condition.add(reservation::Column::Status.is_in(criteria.statuses.clone()));
    }
    if let Some(key) = criteria.id {
        condition = condition.add(key.condition());
    }

    let lines = Reservation::find()
        .filter(condition)
        .order_by_asc(reservation::Column::Id)
        .all(conn)
        .await?;

    let terms: Vec<String> = criteria
        .search_term
        .as_deref()
        .unwrap_or_default()
        .split_whitespace()
        .map(str::to_lowercase)
        .collect();

    let lines = if terms.is_empty() {
        lines
    } else {
        let index = SearchIndex::load(conn, &lines).await?;
        let found: HashSet<BundleKey> = lines
            .iter()
            .filter(|l| terms.iter().all(|t| index.matches(l, t)))
            .map(BundleKey::for_line)
            .collect();
        lines
            .into_iter()
            .filter(|l| found.contains(&BundleKey::for_line(l)))
            .collect()
    };

    let mut bundles: Vec<Bundle> = bundle::group_lines(conn, lines)
        .await?
        .into_iter()
        .filter(|b| criteria.verification.keeps(b))
        .filter(|b| {
            let created = b.created_at.map(|at| at.date_naive());
            criteria.created_from.is_none_or(|from| created.is_some_and(|d| d >= from))
                && criteria.created_until.is_none_or(|until| created.is_some_and(|d| d <= until))
        })
        .collect();
    bundles.sort_by(|a, b| b.created_at.cmp(&a.created_at));

    let total = u64::try_from(bundles.len())?;
    let page = criteria.page.max(1);
    let per_page = if criteria.paginate {
        criteria.per_page.unwrap_or(settings.page_size).max(1)
    } else {
        total.max(1)
    };

    let skip = usize::try_from((page - 1).saturating_mul(per_page))?;
    let take = usize::try_from(per_page)?;
    let bundles = if criteria.paginate {
        bundles.into_iter().skip(skip).take(take).collect()
    } else {
        bundles
    };

    tracing::debug!(total, page, per_page, "Filtered bundles");
    Ok(BundlePage {
        bundles,
        total,
        page,
        per_page,
    })
}

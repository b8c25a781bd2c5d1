//! Inventory reference data - Pools, models, items, users, roles, groups and quotas.
//!
//! The reservation engine only reads this data. The constructors here are used by the
//! seeding step of the binary and by tests.

use crate::{
    config::settings::PoolConfig,
    core::calendar,
    entities::{
        AccessRight, DelegationUser, GroupUser, InventoryPool, LendableModel, Partition, Role,
        User, access_right, delegation_user, group, group_user, holiday, inventory_pool, item,
        model, partition, user,
    },
    errors::{Error, Result},
};
use chrono::{NaiveDate, Weekday};
use sea_orm::{Set, TransactionTrait, prelude::*};
use std::collections::HashMap;
use std::str::FromStr;
use tracing::{info, warn};

/// Creates an inventory pool open on the given weekdays.
pub async fn create_pool<C>(
    conn: &C,
    name: &str,
    open_weekdays: &[Weekday],
) -> Result<inventory_pool::Model>
where
    C: ConnectionTrait,
{
    if name.trim().is_empty() {
        return Err(Error::validation("Pool name cannot be empty"));
    }

    let pool = inventory_pool::ActiveModel {
        name: Set(name.trim().to_string()),
        open_weekdays: Set(calendar::format_weekdays(open_weekdays)),
        ..Default::default()
    };
    pool.insert(conn).await.map_err(Into::into)
}

/// Finds a pool by its unique name.
pub async fn get_pool_by_name<C>(conn: &C, name: &str) -> Result<Option<inventory_pool::Model>>
where
    C: ConnectionTrait,
{
    InventoryPool::find()
        .filter(inventory_pool::Column::Name.eq(name))
        .one(conn)
        .await
        .map_err(Into::into)
}

/// Closes a pool for an inclusive date range.
pub async fn add_holiday<C>(
    conn: &C,
    inventory_pool_id: i64,
    name: &str,
    start_date: NaiveDate,
    end_date: NaiveDate,
) -> Result<holiday::Model>
where
    C: ConnectionTrait,
{
    if end_date < start_date {
        return Err(Error::validation(format!(
            "Holiday '{name}' ends before it starts"
        )));
    }

    let holiday = holiday::ActiveModel {
        inventory_pool_id: Set(inventory_pool_id),
        name: Set(name.to_string()),
        start_date: Set(start_date),
        end_date: Set(end_date),
        ..Default::default()
    };
    holiday.insert(conn).await.map_err(Into::into)
}

/// Creates a lendable model.
///
/// # Errors
/// Returns an error if the product name is blank or the price is negative or not finite.
pub async fn create_model<C>(
    conn: &C,
    manufacturer: &str,
    product: &str,
    version: Option<String>,
    price: f64,
) -> Result<model::Model>
where
    C: ConnectionTrait,
{
    if product.trim().is_empty() {
        return Err(Error::validation("Model product name cannot be empty"));
    }

    if price < 0.0 || !price.is_finite() {
        return Err(Error::validation(format!("Invalid model price {price}")));
    }

    let model = model::ActiveModel {
        manufacturer: Set(manufacturer.trim().to_string()),
        product: Set(product.trim().to_string()),
        version: Set(version),
        price: Set(price),
        ..Default::default()
    };
    model.insert(conn).await.map_err(Into::into)
}

/// Finds a model by product name.
pub async fn get_model_by_product<C>(conn: &C, product: &str) -> Result<Option<model::Model>>
where
    C: ConnectionTrait,
{
    LendableModel::find()
        .filter(model::Column::Product.eq(product))
        .one(conn)
        .await
        .map_err(Into::into)
}

/// Adds `count` physical units of a model to a pool.
///
/// Inventory codes are derived from pool, model and a running number.
pub async fn add_items<C>(
    conn: &C,
    inventory_pool_id: i64,
    model_id: i64,
    count: u32,
    is_borrowable: bool,
) -> Result<Vec<item::Model>>
where
    C: ConnectionTrait,
{
    let existing = crate::entities::Item::find()
        .filter(item::Column::InventoryPoolId.eq(inventory_pool_id))
        .filter(item::Column::ModelId.eq(model_id))
        .count(conn)
        .await?;

    let mut items = Vec::with_capacity(usize::try_from(count)?);
    for n in 1..=u64::from(count) {
        let item = item::ActiveModel {
            inventory_pool_id: Set(inventory_pool_id),
            model_id: Set(model_id),
            inventory_code: Set(format!(
                "P{inventory_pool_id}-M{model_id}-{:04}",
                existing + n
            )),
            is_borrowable: Set(is_borrowable),
            ..Default::default()
        };
        items.push(item.insert(conn).await?);
    }

    Ok(items)
}

/// Creates a user.
pub async fn create_user<C>(
    conn: &C,
    login: &str,
    firstname: &str,
    lastname: &str,
    email: &str,
    badge_id: Option<String>,
) -> Result<user::Model>
where
    C: ConnectionTrait,
{
    if login.trim().is_empty() {
        return Err(Error::validation("User login cannot be empty"));
    }

    let user = user::ActiveModel {
        login: Set(login.trim().to_string()),
        firstname: Set(firstname.to_string()),
        lastname: Set(lastname.to_string()),
        email: Set(email.to_string()),
        badge_id: Set(badge_id),
        ..Default::default()
    };
    user.insert(conn).await.map_err(Into::into)
}

/// Finds a user by login.
pub async fn get_user_by_login<C>(conn: &C, login: &str) -> Result<Option<user::Model>>
where
    C: ConnectionTrait,
{
    User::find()
        .filter(user::Column::Login.eq(login))
        .one(conn)
        .await
        .map_err(Into::into)
}

/// Fails with [`Error::NotFound`] if the user does not exist.
pub async fn require_user<C>(conn: &C, user_id: i64) -> Result<user::Model>
where
    C: ConnectionTrait,
{
    User::find_by_id(user_id)
        .one(conn)
        .await?
        .ok_or_else(|| Error::not_found("user", user_id))
}

/// Gives a user a role in a pool, replacing any previous role there.
pub async fn grant_role<C>(
    conn: &C,
    user_id: i64,
    inventory_pool_id: i64,
    role: Role,
) -> Result<access_right::Model>
where
    C: ConnectionTrait,
{
    AccessRight::delete_many()
        .filter(access_right::Column::UserId.eq(user_id))
        .filter(access_right::Column::InventoryPoolId.eq(inventory_pool_id))
        .exec(conn)
        .await?;

    let right = access_right::ActiveModel {
        user_id: Set(user_id),
        inventory_pool_id: Set(inventory_pool_id),
        role: Set(role),
    };
    right.insert(conn).await.map_err(Into::into)
}

/// Whether the user may approve, hand over and take back in the pool.
pub async fn has_manager_role<C>(conn: &C, user_id: i64, inventory_pool_id: i64) -> Result<bool>
where
    C: ConnectionTrait,
{
    let right = AccessRight::find_by_id((user_id, inventory_pool_id))
        .one(conn)
        .await?;
    Ok(right.is_some_and(|r| r.role >= Role::LendingManager))
}

impl FromStr for Role {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "customer" => Ok(Self::Customer),
            "group_manager" => Ok(Self::GroupManager),
            "lending_manager" => Ok(Self::LendingManager),
            "inventory_manager" => Ok(Self::InventoryManager),
            other => Err(Error::validation(format!("Unknown role '{other}'"))),
        }
    }
}

/// Creates a group in a pool.
pub async fn create_group<C>(
    conn: &C,
    inventory_pool_id: i64,
    name: &str,
    is_verification_required: bool,
) -> Result<group::Model>
where
    C: ConnectionTrait,
{
    let group = group::ActiveModel {
        inventory_pool_id: Set(inventory_pool_id),
        name: Set(name.to_string()),
        is_verification_required: Set(is_verification_required),
        ..Default::default()
    };
    group.insert(conn).await.map_err(Into::into)
}

/// Adds a user to a group.
pub async fn add_group_member<C>(conn: &C, group_id: i64, user_id: i64) -> Result<()>
where
    C: ConnectionTrait,
{
    let membership = group_user::ActiveModel {
        group_id: Set(group_id),
        user_id: Set(user_id),
    };
    GroupUser::insert(membership)
        .exec_without_returning(conn)
        .await?;
    Ok(())
}

/// Lets `user_id` act for the delegation `delegation_id`.
pub async fn add_delegation_member<C>(conn: &C, delegation_id: i64, user_id: i64) -> Result<()>
where
    C: ConnectionTrait,
{
    if delegation_id == user_id {
        return Err(Error::validation(format!(
            "User {user_id} cannot be a member of their own delegation"
        )));
    }

    let membership = delegation_user::ActiveModel {
        delegation_id: Set(delegation_id),
        user_id: Set(user_id),
    };
    DelegationUser::insert(membership)
        .exec_without_returning(conn)
        .await?;
    Ok(())
}

/// Whether `user_id` may act for the delegation `delegation_id`.
pub async fn is_delegation_member<C>(conn: &C, delegation_id: i64, user_id: i64) -> Result<bool>
where
    C: ConnectionTrait,
{
    Ok(DelegationUser::find_by_id((delegation_id, user_id))
        .one(conn)
        .await?
        .is_some())
}

/// Sets the quota of a group for a model, replacing an existing one.
pub async fn set_partition<C>(
    conn: &C,
    inventory_pool_id: i64,
    group_id: i64,
    model_id: i64,
    quantity: i32,
) -> Result<partition::Model>
where
    C: ConnectionTrait,
{
    if quantity < 0 {
        return Err(Error::validation(format!(
            "Partition quantity cannot be negative, got {quantity}"
        )));
    }

    Partition::delete_many()
        .filter(partition::Column::InventoryPoolId.eq(inventory_pool_id))
        .filter(partition::Column::GroupId.eq(group_id))
        .filter(partition::Column::ModelId.eq(model_id))
        .exec(conn)
        .await?;

    let partition = partition::ActiveModel {
        inventory_pool_id: Set(inventory_pool_id),
        group_id: Set(group_id),
        model_id: Set(model_id),
        quantity: Set(quantity),
        ..Default::default()
    };
    partition.insert(conn).await.map_err(Into::into)
}

/// Ids of the groups in `inventory_pool_id` the user belongs to.
pub async fn group_ids_for_user<C>(
    conn: &C,
    user_id: i64,
    inventory_pool_id: i64,
) -> Result<Vec<i64>>
where
    C: ConnectionTrait,
{
    let groups = crate::entities::Group::find()
        .inner_join(GroupUser)
        .filter(group_user::Column::UserId.eq(user_id))
        .filter(group::Column::InventoryPoolId.eq(inventory_pool_id))
        .all(conn)
        .await?;
    Ok(groups.into_iter().map(|g| g.id).collect())
}

/// Summary of one seeded pool
#[derive(Debug, Clone)]
pub struct SeededPool {
    /// The created pool
    pub pool: inventory_pool::Model,
    /// Seeded models with their borrowable unit count
    pub stock: Vec<(model::Model, u32)>,
}

/// Seeds pools from configuration inside one transaction.
///
/// Pools that already exist by name are skipped, so running the seed twice is harmless.
/// Models are shared across pools and matched by product name.
pub async fn seed_inventory(
    db: &DatabaseConnection,
    pools: &[PoolConfig],
) -> Result<Vec<SeededPool>> {
    let txn = db.begin().await?;
    let mut seeded = Vec::new();

    for pool_config in pools {
        if get_pool_by_name(&txn, &pool_config.name).await?.is_some() {
            warn!("Pool '{}' already exists. Skipping.", pool_config.name);
            continue;
        }

        let weekdays = pool_config
            .open_weekdays
            .iter()
            .map(|d| {
                Weekday::from_str(d).map_err(|_| Error::Config {
                    message: format!("Unknown weekday '{d}' in pool '{}'", pool_config.name),
                })
            })
            .collect::<Result<Vec<_>>>()?;
        let pool = create_pool(&txn, &pool_config.name, &weekdays).await?;

        for holiday in &pool_config.holidays {
            add_holiday(&txn, pool.id, &holiday.name, holiday.start_date, holiday.end_date)
                .await?;
        }

        let mut stock = Vec::new();
        let mut models_by_product = HashMap::new();
        for stock_config in &pool_config.models {
            let model = match get_model_by_product(&txn, &stock_config.product).await? {
                Some(model) => model,
                None => {
                    create_model(
                        &txn,
                        &stock_config.manufacturer,
                        &stock_config.product,
                        stock_config.version.clone(),
                        stock_config.price,
                    )
                    .await?
                }
            };
            add_items(&txn, pool.id, model.id, stock_config.borrowable, true).await?;
            add_items(&txn, pool.id, model.id, stock_config.unborrowable, false).await?;
            models_by_product.insert(stock_config.product.clone(), model.id);
            stock.push((model, stock_config.borrowable));
        }

        let mut users_by_login = HashMap::new();
        for user_config in &pool_config.users {
            let user = match get_user_by_login(&txn, &user_config.login).await? {
                Some(user) => user,
                None => {
                    create_user(
                        &txn,
                        &user_config.login,
                        &user_config.firstname,
                        &user_config.lastname,
                        &user_config.email,
                        user_config.badge_id.clone(),
                    )
                    .await?
                }
            };
            grant_role(&txn, user.id, pool.id, user_config.role.parse()?).await?;
            users_by_login.insert(user_config.login.clone(), user.id);
        }

        for group_config in &pool_config.groups {
            let group = create_group(
                &txn,
                pool.id,
                &group_config.name,
                group_config.verification_required,
            )
            .await?;

            for login in &group_config.members {
                let user_id = users_by_login.get(login).ok_or_else(|| Error::Config {
                    message: format!("Group '{}' lists unknown user '{login}'", group_config.name),
                })?;
                add_group_member(&txn, group.id, *user_id).await?;
            }

            for partition_config in &group_config.partitions {
                let model_id = models_by_product
                    .get(&partition_config.product)
                    .ok_or_else(|| Error::Config {
                        message: format!(
                            "Group '{}' limits unknown model '{}'",
                            group_config.name, partition_config.product
                        ),
                    })?;
                set_partition(
                    &txn,
                    pool.id,
                    group.id,
                    *model_id,
                    i32::try_from(partition_config.quantity)?,
                )
                .await?;
            }
        }

        info!(
            "Seeded pool '{}' with {} models",
            pool.name,
            stock.len()
        );
        seeded.push(SeededPool { pool, stock });
    }

    txn.commit().await?;
    Ok(seeded)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::config::settings::parse_config;
    use crate::core::availability;
    use crate::test_utils::*;
    use sea_orm::{DatabaseBackend, MockDatabase};

    #[tokio::test]
    async fn test_create_model_validation() -> Result<()> {
        let db = MockDatabase::new(DatabaseBackend::Sqlite).into_connection();

        let result = create_model(&db, "Nikon", "  ", None, 10.0).await;
        assert!(matches!(result, Err(Error::Validation { message: _ })));

        let result = create_model(&db, "Nikon", "X12", None, -1.0).await;
        assert!(matches!(result, Err(Error::Validation { message: _ })));

        let result = create_model(&db, "Nikon", "X12", None, f64::NAN).await;
        assert!(matches!(result, Err(Error::Validation { message: _ })));
        Ok(())
    }

    #[tokio::test]
    async fn test_add_items_numbers_inventory_codes() -> Result<()> {
        let fx = setup_pool_with_stock(2).await?;
        let more = add_items(&fx.db, fx.pool.id, fx.model.id, 1, false).await?;

        assert_eq!(
            more[0].inventory_code,
            format!("P{}-M{}-0003", fx.pool.id, fx.model.id)
        );
        assert!(!more[0].is_borrowable);
        Ok(())
    }

    #[tokio::test]
    async fn test_manager_role() -> Result<()> {
        let fx = setup_pool_with_stock(1).await?;

        assert!(has_manager_role(&fx.db, fx.manager.id, fx.pool.id).await?);
        assert!(!has_manager_role(&fx.db, fx.customer.id, fx.pool.id).await?);

        grant_role(&fx.db, fx.customer.id, fx.pool.id, Role::InventoryManager).await?;
        assert!(has_manager_role(&fx.db, fx.customer.id, fx.pool.id).await?);

        grant_role(&fx.db, fx.manager.id, fx.pool.id, Role::GroupManager).await?;
        assert!(!has_manager_role(&fx.db, fx.manager.id, fx.pool.id).await?);
        Ok(())
    }

    #[tokio::test]
    async fn test_group_ids_are_scoped_to_pool() -> Result<()> {
        let fx = setup_pool_with_stock(1).await?;
        let other_pool = create_pool(&fx.db, "B-Ausleihe", &[Weekday::Mon]).await?;
        let here = create_group(&fx.db, fx.pool.id, "Here", false).await?;
        let there = create_group(&fx.db, other_pool.id, "There", false).await?;
        add_group_member(&fx.db, here.id, fx.customer.id).await?;
        add_group_member(&fx.db, there.id, fx.customer.id).await?;

        assert_eq!(
            group_ids_for_user(&fx.db, fx.customer.id, fx.pool.id).await?,
            vec![here.id]
        );
        assert!(group_ids_for_user(&fx.db, fx.manager.id, fx.pool.id).await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_delegation_membership() -> Result<()> {
        let fx = setup_pool_with_stock(1).await?;
        let class = create_test_user(&fx.db, "filmklasse").await?;
        add_delegation_member(&fx.db, class.id, fx.customer.id).await?;

        assert!(is_delegation_member(&fx.db, class.id, fx.customer.id).await?);
        assert!(!is_delegation_member(&fx.db, class.id, fx.manager.id).await?);
        assert!(!is_delegation_member(&fx.db, fx.customer.id, class.id).await?);

        let own = add_delegation_member(&fx.db, class.id, class.id).await;
        assert!(matches!(own, Err(Error::Validation { message: _ })));
        Ok(())
    }

    #[tokio::test]
    async fn test_set_partition_replaces_quota() -> Result<()> {
        let fx = setup_pool_with_stock(1).await?;
        let group = create_group(&fx.db, fx.pool.id, "Film", true).await?;

        set_partition(&fx.db, fx.pool.id, group.id, fx.model.id, 1).await?;
        set_partition(&fx.db, fx.pool.id, group.id, fx.model.id, 4).await?;

        let partitions = Partition::find().all(&fx.db).await?;
        assert_eq!(partitions.len(), 1);
        assert_eq!(partitions[0].quantity, 4);

        let result = set_partition(&fx.db, fx.pool.id, group.id, fx.model.id, -1).await;
        assert!(matches!(result, Err(Error::Validation { message: _ })));
        Ok(())
    }

    #[test]
    fn test_role_from_str() {
        assert_eq!("lending_manager".parse::<Role>().unwrap(), Role::LendingManager);
        assert!("admin".parse::<Role>().is_err());
    }

    #[tokio::test]
    async fn test_seed_inventory_is_idempotent() -> Result<()> {
        let db = setup_test_db().await?;
        let config = parse_config(
            r#"
            [[pools]]
            name = "A-Ausleihe"

            [[pools.models]]
            manufacturer = "Nikon"
            product = "Kamera X12"
            borrowable = 3
            unborrowable = 2

            [[pools.users]]
            login = "petra"
            firstname = "Petra"
            lastname = "K."
            email = "petra@example.com"

            [[pools.users]]
            login = "pius"
            firstname = "Pius"
            lastname = "M."
            email = "pius@example.com"
            role = "lending_manager"

            [[pools.groups]]
            name = "Film"
            verification_required = true
            members = ["petra"]
            partitions = [{ product = "Kamera X12", quantity = 1 }]
            "#,
        )?;

        let seeded = seed_inventory(&db, &config.pools).await?;
        assert_eq!(seeded.len(), 1);
        let pool = &seeded[0].pool;
        let model = &seeded[0].stock[0].0;
        assert_eq!(seeded[0].stock[0].1, 3);

        assert_eq!(availability::borrowable_count(&db, model.id, pool.id).await?, 3);
        let pius = get_user_by_login(&db, "pius").await?.unwrap();
        assert!(has_manager_role(&db, pius.id, pool.id).await?);
        let petra = get_user_by_login(&db, "petra").await?.unwrap();
        assert_eq!(group_ids_for_user(&db, petra.id, pool.id).await?.len(), 1);

        let again = seed_inventory(&db, &config.pools).await?;
        assert!(again.is_empty());
        assert_eq!(availability::borrowable_count(&db, model.id, pool.id).await?, 3);
        Ok(())
    }

    #[tokio::test]
    async fn test_seed_rejects_unknown_member() -> Result<()> {
        let db = setup_test_db().await?;
        let config = parse_config(
            r#"
            [[pools]]
            name = "A-Ausleihe"

            [[pools.groups]]
            name = "Film"
            members = ["nobody"]
            "#,
        )?;

        let result = seed_inventory(&db, &config.pools).await;
        assert!(matches!(result, Err(Error::Config { message: _ })));
        assert!(get_pool_by_name(&db, "A-Ausleihe").await?.is_none());
        Ok(())
    }
}

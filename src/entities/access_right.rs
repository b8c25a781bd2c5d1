//! Access right entity - The role a user holds in one inventory pool.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Role of a user within a pool, lowest privilege first.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    EnumIter,
    DeriveActiveEnum,
    Serialize,
    Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// May borrow
    #[sea_orm(string_value = "customer")]
    Customer,
    /// May manage group memberships
    #[sea_orm(string_value = "group_manager")]
    GroupManager,
    /// May approve, hand over and take back
    #[sea_orm(string_value = "lending_manager")]
    LendingManager,
    /// Full control over the pool's inventory
    #[sea_orm(string_value = "inventory_manager")]
    InventoryManager,
}

/// Access right database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "access_rights")]
pub struct Model {
    /// User holding the right
    #[sea_orm(primary_key, auto_increment = false)]
    pub user_id: i64,
    /// Pool the right applies to
    #[sea_orm(primary_key, auto_increment = false)]
    pub inventory_pool_id: i64,
    /// Granted role
    pub role: Role,
}

/// Defines relationships between `AccessRight` and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each access right belongs to one user
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::UserId",
        to = "super::user::Column::Id"
    )]
    User,
    /// Each access right belongs to one pool
    #[sea_orm(
        belongs_to = "super::inventory_pool::Entity",
        from = "Column::InventoryPoolId",
        to = "super::inventory_pool::Column::Id"
    )]
    InventoryPool,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

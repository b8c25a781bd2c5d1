//! Group entity - A set of users within a pool that may carry partition quotas.
//!
//! Groups requiring verification mark their members' orders for manual review.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Group database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "groups")]
pub struct Model {
    /// Unique identifier for the group
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Pool the group is defined in
    pub inventory_pool_id: i64,
    /// Display name
    pub name: String,
    /// Whether orders of members must be verified by staff
    pub is_verification_required: bool,
}

/// Defines relationships between Group and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each group belongs to one pool
    #[sea_orm(
        belongs_to = "super::inventory_pool::Entity",
        from = "Column::InventoryPoolId",
        to = "super::inventory_pool::Column::Id"
    )]
    InventoryPool,
    /// One group has many members
    #[sea_orm(has_many = "super::group_user::Entity")]
    Members,
    /// One group has many partitions
    #[sea_orm(has_many = "super::partition::Entity")]
    Partitions,
}

impl Related<super::inventory_pool::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::InventoryPool.def()
    }
}

impl Related<super::group_user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Members.def()
    }
}

impl Related<super::partition::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Partitions.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

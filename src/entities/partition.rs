//! Partition entity - A group's quota for one model in one pool.
//!
//! The quota caps how many units of the model the group's members may hold
//! committed at the same time.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Partition database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "partitions")]
pub struct Model {
    /// Unique identifier for the partition
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Pool the quota applies in
    pub inventory_pool_id: i64,
    /// Group owning the quota
    pub group_id: i64,
    /// Model the quota limits
    pub model_id: i64,
    /// Maximum units allocatable to the group
    pub quantity: i32,
}

/// Defines relationships between Partition and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each partition belongs to one group
    #[sea_orm(
        belongs_to = "super::group::Entity",
        from = "Column::GroupId",
        to = "super::group::Column::Id"
    )]
    Group,
}

impl Related<super::group::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Group.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

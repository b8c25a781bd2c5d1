//! Holiday entity - An inclusive date range during which a pool is closed.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Holiday database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "holidays")]
pub struct Model {
    /// Unique identifier for the holiday
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Closed pool
    pub inventory_pool_id: i64,
    /// First closed day
    pub start_date: Date,
    /// Last closed day
    pub end_date: Date,
    /// Shown to borrowers
    pub name: String,
}

/// Defines relationships between Holiday and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each holiday belongs to one pool
    #[sea_orm(
        belongs_to = "super::inventory_pool::Entity",
        from = "Column::InventoryPoolId",
        to = "super::inventory_pool::Column::Id"
    )]
    InventoryPool,
}

impl Related<super::inventory_pool::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::InventoryPool.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

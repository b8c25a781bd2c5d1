//! Item entity - One physical unit of a model owned by a pool.
//!
//! Only borrowable items count towards a model's capacity in the pool.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Item database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "items")]
pub struct Model {
    /// Unique identifier for the item
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Owning pool
    pub inventory_pool_id: i64,
    /// Model this item is a unit of
    pub model_id: i64,
    /// Label printed on the item (e.g., "AUS-1042")
    #[sea_orm(unique)]
    pub inventory_code: String,
    /// Whether the item may be lent out at all
    pub is_borrowable: bool,
}

/// Defines relationships between Item and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each item belongs to one pool
    #[sea_orm(
        belongs_to = "super::inventory_pool::Entity",
        from = "Column::InventoryPoolId",
        to = "super::inventory_pool::Column::Id"
    )]
    InventoryPool,
    /// Each item is a unit of one model
    #[sea_orm(
        belongs_to = "super::model::Entity",
        from = "Column::ModelId",
        to = "super::model::Column::Id"
    )]
    ItemModel,
}

impl Related<super::inventory_pool::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::InventoryPool.def()
    }
}

impl Related<super::model::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ItemModel.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

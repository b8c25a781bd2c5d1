//! Inventory pool entity - A lending desk owning items and opening on certain weekdays.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Inventory pool database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "inventory_pools")]
pub struct Model {
    /// Unique identifier for the pool
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Display name (e.g., "A-Ausleihe")
    #[sea_orm(unique)]
    pub name: String,
    /// Comma separated weekdays the pool is open on (e.g., `"mon,tue,wed,thu,fri"`)
    pub open_weekdays: String,
}

/// Defines relationships between `InventoryPool` and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// One pool owns many items
    #[sea_orm(has_many = "super::item::Entity")]
    Items,
    /// One pool has many reservation lines
    #[sea_orm(has_many = "super::reservation::Entity")]
    Reservations,
    /// One pool defines many holidays
    #[sea_orm(has_many = "super::holiday::Entity")]
    Holidays,
    /// One pool defines many groups
    #[sea_orm(has_many = "super::group::Entity")]
    Groups,
}

impl Related<super::item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Items.def()
    }
}

impl Related<super::reservation::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Reservations.def()
    }
}

impl Related<super::holiday::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Holidays.def()
    }
}

impl Related<super::group::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Groups.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

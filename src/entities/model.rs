//! Model entity - A lendable product definition (e.g., "Nikon X12 Camera").
//!
//! Physical units of a model are items; reservations are made against the model,
//! never against a concrete item.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Model database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "models")]
pub struct Model {
    /// Unique identifier for the model
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Manufacturer name (e.g., "Nikon")
    pub manufacturer: String,
    /// Product name (e.g., "Kamera X12")
    pub product: String,
    /// Optional product version
    pub version: Option<String>,
    /// Price per unit, used for bundle totals
    pub price: f64,
}

/// Defines relationships between Model and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// One model has many physical items
    #[sea_orm(has_many = "super::item::Entity")]
    Items,
    /// One model is reserved by many lines
    #[sea_orm(has_many = "super::reservation::Entity")]
    Reservations,
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

impl ActiveModelBehavior for ActiveModel {}

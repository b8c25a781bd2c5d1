//! Reservation entity - One reservation line of the lending lifecycle.
//!
//! A line reserves `quantity` units of a model in one inventory pool for an inclusive
//! day range. Its `status` walks the state machine
//! `unsubmitted → submitted → {rejected | approved} → signed → closed`.
//! Lines are grouped at read time into bundles; there is no bundle table.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Lifecycle status of a reservation line.
///
/// Variants are ordered along the lifecycle, so `Ord` compares progress.
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
pub enum ReservationStatus {
    /// In the user's cart
    #[sea_orm(string_value = "unsubmitted")]
    Unsubmitted,
    /// Sent to the pool, waiting for a decision
    #[sea_orm(string_value = "submitted")]
    Submitted,
    /// Turned down by staff (terminal)
    #[sea_orm(string_value = "rejected")]
    Rejected,
    /// Accepted by staff, waiting for hand-over
    #[sea_orm(string_value = "approved")]
    Approved,
    /// Handed over under a contract
    #[sea_orm(string_value = "signed")]
    Signed,
    /// Returned (terminal)
    #[sea_orm(string_value = "closed")]
    Closed,
}

/// Reservation line database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "reservations")]
pub struct Model {
    /// Unique identifier for the line
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Pool the units are borrowed from
    pub inventory_pool_id: i64,
    /// Borrower owning the line
    pub user_id: i64,
    /// Member of a delegation actually picking up the items
    pub delegated_user_id: Option<i64>,
    /// Reserved model
    pub model_id: i64,
    /// Number of units (always positive)
    pub quantity: i32,
    /// First reserved day (inclusive)
    pub start_date: Date,
    /// Last reserved day (inclusive, never before `start_date`)
    pub end_date: Date,
    /// Lifecycle status
    pub status: ReservationStatus,
    /// Free-text reason, usually shared by all lines of a bundle
    pub purpose: Option<String>,
    /// Contract the line was signed under
    pub contract_id: Option<i64>,
    /// Staff member who handed the items over
    pub handed_over_by_user_id: Option<i64>,
    /// Day the items came back
    pub returned_date: Option<Date>,
    /// Staff member who took the items back
    pub returned_to_user_id: Option<i64>,
    /// When the line was created
    pub created_at: DateTimeUtc,
    /// When the line was last modified
    pub updated_at: DateTimeUtc,
}

/// Defines relationships between Reservation and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each line belongs to one pool
    #[sea_orm(
        belongs_to = "super::inventory_pool::Entity",
        from = "Column::InventoryPoolId",
        to = "super::inventory_pool::Column::Id"
    )]
    InventoryPool,
    /// Each line belongs to one borrower
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::UserId",
        to = "super::user::Column::Id"
    )]
    User,
    /// Each line reserves one model
    #[sea_orm(
        belongs_to = "super::model::Entity",
        from = "Column::ModelId",
        to = "super::model::Column::Id"
    )]
    ItemModel,
    /// Signed lines belong to one contract
    #[sea_orm(
        belongs_to = "super::contract::Entity",
        from = "Column::ContractId",
        to = "super::contract::Column::Id"
    )]
    Contract,
}

impl Related<super::inventory_pool::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::InventoryPool.def()
    }
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl Related<super::model::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ItemModel.def()
    }
}

impl Related<super::contract::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Contract.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

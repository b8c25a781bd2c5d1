//! Contract entity - The signed record of a hand-over.
//!
//! A contract is created atomically when approved lines are signed. Its lines are the
//! reservations pointing at it through `reservations.contract_id`.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Contract database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "contracts")]
pub struct Model {
    /// Unique identifier for the contract
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Pool the items were handed over from
    pub inventory_pool_id: i64,
    /// Borrower
    pub user_id: i64,
    /// Optional note printed on the contract
    pub note: Option<String>,
    /// Staff member who handed the items over
    pub handed_over_by_user_id: i64,
    /// When the contract was signed
    pub created_at: DateTimeUtc,
}

/// Defines relationships between Contract and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// One contract has many reservation lines
    #[sea_orm(has_many = "super::reservation::Entity")]
    Reservations,
}

impl Related<super::reservation::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Reservations.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

//! Delegation membership entity - People allowed to pick up items for a delegation.
//!
//! A delegation is itself a user (a department, a class) that borrows on behalf of its
//! members. Both columns point at `users`.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Delegation membership database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "delegations_users")]
pub struct Model {
    /// The borrowing delegation
    #[sea_orm(primary_key, auto_increment = false)]
    pub delegation_id: i64,
    /// A member who may act for it
    #[sea_orm(primary_key, auto_increment = false)]
    pub user_id: i64,
}

/// Both sides of a membership are users
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// The delegation user
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::DelegationId",
        to = "super::user::Column::Id"
    )]
    Delegation,
    /// The member user
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::UserId",
        to = "super::user::Column::Id"
    )]
    Member,
}

impl ActiveModelBehavior for ActiveModel {}

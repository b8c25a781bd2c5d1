//! User entity - Borrowers and staff members.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// User database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "users")]
pub struct Model {
    /// Unique identifier for the user
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Login name
    #[sea_orm(unique)]
    pub login: String,
    /// First name
    pub firstname: String,
    /// Last name
    pub lastname: String,
    /// Badge or student card number
    pub badge_id: Option<String>,
    /// Address notifications are sent to
    pub email: String,
}

/// Defines relationships between User and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// One user owns many reservation lines
    #[sea_orm(has_many = "super::reservation::Entity")]
    Reservations,
    /// One user holds many access rights
    #[sea_orm(has_many = "super::access_right::Entity")]
    AccessRights,
}

impl Related<super::reservation::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Reservations.def()
    }
}

impl Related<super::access_right::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::AccessRights.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

//! Group membership entity - Join table between groups and users.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Group membership database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "groups_users")]
pub struct Model {
    /// The group
    #[sea_orm(primary_key, auto_increment = false)]
    pub group_id: i64,
    /// The member
    #[sea_orm(primary_key, auto_increment = false)]
    pub user_id: i64,
}

/// Defines relationships between `GroupUser` and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each membership belongs to one group
    #[sea_orm(
        belongs_to = "super::group::Entity",
        from = "Column::GroupId",
        to = "super::group::Column::Id"
    )]
    Group,
    /// Each membership belongs to one user
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::UserId",
        to = "super::user::Column::Id"
    )]
    User,
}

impl Related<super::group::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Group.def()
    }
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

//! Availability lock entity - One row per (pool, model) written before allocation decisions.
//!
//! Approvals and hand-overs upsert this row inside their transaction. The write takes the
//! database write lock (a row lock on server databases), so two decisions touching the
//! same model in the same pool cannot interleave their read-then-write of availability.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Availability lock database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "availability_locks")]
pub struct Model {
    /// Locked pool
    #[sea_orm(primary_key, auto_increment = false)]
    pub inventory_pool_id: i64,
    /// Locked model
    #[sea_orm(primary_key, auto_increment = false)]
    pub model_id: i64,
    /// Bumped on every allocation decision
    pub version: i64,
}

/// `AvailabilityLock` has no relationships with other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

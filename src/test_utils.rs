//! Shared test utilities for the lending engine.
//!
//! This module provides common helper functions for setting up test databases
//! and creating test entities with sensible defaults.

use crate::{
    core::{
        bundle::Bundle,
        inventory,
        notification::{NotificationError, NotificationKind, Notifier},
    },
    entities::{
        Role, contract, inventory_pool, model, reservation, reservation::ReservationStatus, user,
    },
    errors::Result,
};
use chrono::{Days, NaiveDate, Utc, Weekday};
use sea_orm::{ActiveModelTrait, DatabaseConnection, Set};
use std::sync::Mutex;

type Delivery = std::result::Result<(), NotificationError>;

/// Creates an in-memory `SQLite` database with all tables initialized.
/// This is the standard setup for all integration tests.
pub async fn setup_test_db() -> Result<DatabaseConnection> {
    let db = sea_orm::Database::connect("sqlite::memory:").await?;
    crate::config::database::create_tables(&db).await?;
    Ok(db)
}

/// A fixed day used as the origin of test date ranges.
///
/// # Panics
/// Never for the offsets used in tests.
#[allow(clippy::unwrap_used)]
pub fn day(offset: u64) -> NaiveDate {
    NaiveDate::from_ymd_opt(2030, 3, 1)
        .unwrap()
        .checked_add_days(Days::new(offset))
        .unwrap()
}

/// A pool with stock and two users.
pub struct Fixture {
    pub db: DatabaseConnection,
    /// Open every day, no holidays
    pub pool: inventory_pool::Model,
    /// "Kamera X12", price 100.0
    pub model: model::Model,
    /// Customer of the pool
    pub customer: user::Model,
    /// Lending manager of the pool
    pub manager: user::Model,
}

/// Creates a pool owning `borrowable` units of one model, a customer and a manager.
pub async fn setup_pool_with_stock(borrowable: u32) -> Result<Fixture> {
    let db = setup_test_db().await?;
    let pool = inventory::create_pool(
        &db,
        "A-Ausleihe",
        &[
            Weekday::Mon,
            Weekday::Tue,
            Weekday::Wed,
            Weekday::Thu,
            Weekday::Fri,
            Weekday::Sat,
            Weekday::Sun,
        ],
    )
    .await?;
    let model = inventory::create_model(&db, "Nikon", "Kamera X12", None, 100.0).await?;
    inventory::add_items(&db, pool.id, model.id, borrowable, true).await?;

    let customer = create_test_user(&db, "normin").await?;
    inventory::grant_role(&db, customer.id, pool.id, Role::Customer).await?;
    let manager = create_test_user(&db, "pius").await?;
    inventory::grant_role(&db, manager.id, pool.id, Role::LendingManager).await?;

    Ok(Fixture {
        db,
        pool,
        model,
        customer,
        manager,
    })
}

/// Creates a user whose names are derived from `login`.
pub async fn create_test_user(db: &DatabaseConnection, login: &str) -> Result<user::Model> {
    inventory::create_user(
        db,
        login,
        "Test",
        login,
        &format!("{login}@example.com"),
        None,
    )
    .await
}

/// Inserts a line in any status, bypassing the state machine.
pub async fn insert_line(
    fx: &Fixture,
    user_id: i64,
    quantity: i32,
    start_date: NaiveDate,
    end_date: NaiveDate,
    status: ReservationStatus,
) -> Result<reservation::Model> {
    let now = Utc::now();
    let line = reservation::ActiveModel {
        inventory_pool_id: Set(fx.pool.id),
        user_id: Set(user_id),
        delegated_user_id: Set(None),
        model_id: Set(fx.model.id),
        quantity: Set(quantity),
        start_date: Set(start_date),
        end_date: Set(end_date),
        status: Set(status),
        purpose: Set(None),
        contract_id: Set(None),
        handed_over_by_user_id: Set(None),
        returned_date: Set(None),
        returned_to_user_id: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    };
    line.insert(&fx.db).await.map_err(Into::into)
}

/// Inserts a contract with the note "Ladekabel fehlt", handed over by the fixture's manager.
pub async fn insert_contract(fx: &Fixture, user_id: i64) -> Result<i64> {
    let contract = contract::ActiveModel {
        inventory_pool_id: Set(fx.pool.id),
        user_id: Set(user_id),
        note: Set(Some("Ladekabel fehlt".to_string())),
        handed_over_by_user_id: Set(fx.manager.id),
        created_at: Set(Utc::now()),
        ..Default::default()
    };
    Ok(contract.insert(&fx.db).await?.id)
}

/// Notifier that remembers every event it receives.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    events: Mutex<Vec<(NotificationKind, Option<String>)>>,
}

impl RecordingNotifier {
    fn push(&self, kind: NotificationKind, comment: Option<&str>) {
        if let Ok(mut events) = self.events.lock() {
            events.push((kind, comment.map(str::to_string)));
        }
    }

    /// Kinds of the received events, in order.
    pub fn kinds(&self) -> Vec<NotificationKind> {
        self.events
            .lock()
            .map(|events| events.iter().map(|(kind, _)| *kind).collect())
            .unwrap_or_default()
    }

    /// Comments of approvals and rejections, in order.
    pub fn comments(&self) -> Vec<String> {
        self.events
            .lock()
            .map(|events| events.iter().filter_map(|(_, c)| c.clone()).collect())
            .unwrap_or_default()
    }
}

impl Notifier for RecordingNotifier {
    async fn order_submitted(&self, _bundle: &Bundle) -> Delivery {
        self.push(NotificationKind::OrderSubmitted, None);
        Ok(())
    }

    async fn order_received(&self, _bundle: &Bundle) -> Delivery {
        self.push(NotificationKind::OrderReceived, None);
        Ok(())
    }

    async fn order_approved(
        &self,
        _bundle: &Bundle,
        comment: &str,
        _acting_user_id: i64,
    ) -> Delivery {
        self.push(NotificationKind::OrderApproved, Some(comment));
        Ok(())
    }

    async fn order_rejected(
        &self,
        _bundle: &Bundle,
        comment: &str,
        _acting_user_id: i64,
    ) -> Delivery {
        self.push(NotificationKind::OrderRejected, Some(comment));
        Ok(())
    }
}

/// Notifier whose every delivery fails.
#[derive(Debug, Default)]
pub struct FailingNotifier;

impl Notifier for FailingNotifier {
    async fn order_submitted(&self, bundle: &Bundle) -> Delivery {
        Err(NotificationError::new(NotificationKind::OrderSubmitted, bundle, "mailbox full"))
    }

    async fn order_received(&self, bundle: &Bundle) -> Delivery {
        Err(NotificationError::new(NotificationKind::OrderReceived, bundle, "mailbox full"))
    }

    async fn order_approved(
        &self,
        bundle: &Bundle,
        _comment: &str,
        _acting_user_id: i64,
    ) -> Delivery {
        Err(NotificationError::new(NotificationKind::OrderApproved, bundle, "mailbox full"))
    }

    async fn order_rejected(
        &self,
        bundle: &Bundle,
        _comment: &str,
        _acting_user_id: i64,
    ) -> Delivery {
        Err(NotificationError::new(NotificationKind::OrderRejected, bundle, "mailbox full"))
    }
}

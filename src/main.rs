use chrono::Days;
use dotenvy::dotenv;
use lending_engine::{
    config::{database, settings},
    core::{
        availability, calendar, inventory,
        search::{self, BundleFilter},
    },
    entities::reservation::ReservationStatus,
    errors::Result,
};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Days ahead covered by the startup availability summary
const SUMMARY_DAYS: u64 = 7;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // 1. Initialize tracing (as early as possible)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // 2. Load .env file; variables may also come from the environment
    dotenv().ok();

    // 3. Load settings and seed data
    let config = settings::load_default_config()
        .inspect_err(|e| error!("Failed to load configuration: {}", e))?;

    // 4. Connect and create the schema
    if database::get_database_url().starts_with("sqlite://data/") {
        std::fs::create_dir_all("data")?;
    }
    let db = database::create_connection()
        .await
        .inspect_err(|e| error!("Failed to connect to database: {}", e))?;
    database::create_tables(&db)
        .await
        .inspect(|_| info!("Database initialized successfully."))?;

    // 5. Seed pools that do not exist yet
    let seeded = inventory::seed_inventory(&db, &config.pools)
        .await
        .inspect_err(|e| error!("Failed to seed inventory: {}", e))?;

    // 6. Report what can be lent out this week
    let today = calendar::today();
    let until = today
        .checked_add_days(Days::new(SUMMARY_DAYS))
        .unwrap_or(today);
    for pool in &seeded {
        let open = calendar::next_open_date(&db, pool.pool.id, today).await?;
        for (model, borrowable) in &pool.stock {
            let free =
                availability::available(&db, model.id, pool.pool.id, today, until, &[]).await?;
            info!(
                pool = %pool.pool.name,
                model = %model.product,
                next_open = %open,
                "{free} of {borrowable} units available until {until}"
            );
        }
    }

    let pending = search::filter(
        &db,
        &config.lending,
        &BundleFilter {
            statuses: vec![ReservationStatus::Submitted],
            paginate: false,
            ..BundleFilter::default()
        },
    )
    .await?;
    info!("{} orders waiting for approval", pending.total);

    Ok(())
}

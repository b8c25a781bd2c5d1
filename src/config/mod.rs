/// Database configuration and connection management
pub mod database;

/// Engine settings and inventory seed data loaded from config.toml
pub mod settings;

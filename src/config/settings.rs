//! Engine settings and inventory seed data loaded from config.toml
//!
//! The `[lending]` table tunes request limits. Every `[[pools]]` entry describes an
//! inventory pool together with its stock, users and groups; the binary uses these
//! entries to seed an empty database.

use crate::errors::{Error, Result};
use chrono::NaiveDate;
use serde::Deserialize;
use std::path::Path;

const DEFAULT_CONFIG_PATH: &str = "config.toml";

/// Configuration structure representing the entire config.toml file
#[derive(Debug, Deserialize, Default)]
pub struct Config {
    /// Request limits and paging
    #[serde(default)]
    pub lending: LendingSettings,
    /// Pools to seed
    #[serde(default)]
    pub pools: Vec<PoolConfig>,
}

/// Limits applied by bundle operations.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct LendingSettings {
    /// Upper bound on the number of lines a single `add_lines` call may create
    #[serde(default = "default_max_lines_per_request")]
    pub max_lines_per_request: u32,
    /// Page size used by bundle listings when the caller does not pick one
    #[serde(default = "default_page_size")]
    pub page_size: u64,
}

const fn default_max_lines_per_request() -> u32 {
    100
}

const fn default_page_size() -> u64 {
    20
}

impl Default for LendingSettings {
    fn default() -> Self {
        Self {
            max_lines_per_request: default_max_lines_per_request(),
            page_size: default_page_size(),
        }
    }
}

/// Seed data for one inventory pool
#[derive(Debug, Deserialize, Clone)]
pub struct PoolConfig {
    /// Unique pool name; pools already present by name are skipped
    pub name: String,
    /// Weekday abbreviations the pool is open on
    #[serde(default = "default_open_weekdays")]
    pub open_weekdays: Vec<String>,
    /// Periods the pool is closed
    #[serde(default)]
    pub holidays: Vec<HolidayConfig>,
    /// Models the pool owns
    #[serde(default)]
    pub models: Vec<StockConfig>,
    /// Users with a role in the pool
    #[serde(default)]
    pub users: Vec<UserConfig>,
    /// Groups of the pool
    #[serde(default)]
    pub groups: Vec<GroupConfig>,
}

fn default_open_weekdays() -> Vec<String> {
    ["mon", "tue", "wed", "thu", "fri"]
        .into_iter()
        .map(String::from)
        .collect()
}

/// A closed period of a pool
#[derive(Debug, Deserialize, Clone)]
pub struct HolidayConfig {
    /// Shown to borrowers, e.g. "Weihnachten"
    pub name: String,
    /// First closed day
    pub start_date: NaiveDate,
    /// Last closed day, inclusive
    pub end_date: NaiveDate,
}

/// A model and how many units of it the pool owns
#[derive(Debug, Deserialize, Clone)]
pub struct StockConfig {
    /// Manufacturer name
    pub manufacturer: String,
    /// Product name, unique across pools
    pub product: String,
    /// Optional model version
    #[serde(default)]
    pub version: Option<String>,
    /// Replacement value of one unit
    #[serde(default)]
    pub price: f64,
    /// Units that can be lent out
    pub borrowable: u32,
    /// Units that are owned but not lendable (broken, reference copies)
    #[serde(default)]
    pub unborrowable: u32,
}

/// A user and the role they hold in the pool
#[derive(Debug, Deserialize, Clone)]
pub struct UserConfig {
    /// Unique login; existing users are reused
    pub login: String,
    /// First name
    pub firstname: String,
    /// Last name
    pub lastname: String,
    /// Address for order notifications
    pub email: String,
    /// Number printed on the user's badge
    #[serde(default)]
    pub badge_id: Option<String>,
    /// One of `customer`, `group_manager`, `lending_manager`, `inventory_manager`
    #[serde(default = "default_role")]
    pub role: String,
}

fn default_role() -> String {
    "customer".to_string()
}

/// A group with its members (by login) and per-model quotas (by product name)
#[derive(Debug, Deserialize, Clone)]
pub struct GroupConfig {
    /// Group name
    pub name: String,
    /// Orders of members need verification and are capped by the partitions
    #[serde(default)]
    pub verification_required: bool,
    /// Member logins
    #[serde(default)]
    pub members: Vec<String>,
    /// Per-model quotas
    #[serde(default)]
    pub partitions: Vec<PartitionConfig>,
}

/// Quota of one model for a group
#[derive(Debug, Deserialize, Clone)]
pub struct PartitionConfig {
    /// Product name of a model stocked by the pool
    pub product: String,
    /// Units reserved for the group
    pub quantity: u32,
}

/// Loads configuration from a TOML file
///
/// # Errors
/// Returns an error if:
/// - The file cannot be read
/// - The TOML syntax is invalid
/// - Required fields are missing
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config> {
    let path_ref = path.as_ref();
    tracing::debug!("Loading configuration from {:?}", path_ref);
    let contents = std::fs::read_to_string(path_ref).map_err(|e| Error::Config {
        message: format!("Failed to read config file {path_ref:?}: {e}"),
    })?;

    parse_config(&contents)
}

/// Parses configuration from TOML text.
pub fn parse_config(contents: &str) -> Result<Config> {
    toml::from_str(contents).map_err(|e| Error::Config {
        message: format!("Failed to parse config.toml: {e}"),
    })
}

/// Loads configuration from `LENDING_CONFIG` or the default location (./config.toml)
pub fn load_default_config() -> Result<Config> {
    let path =
        std::env::var("LENDING_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
    load_config(path)
}

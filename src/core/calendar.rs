//! Pool calendar - Opening weekdays and holidays of an inventory pool.
//!
//! Used to move pickup and return dates onto days the pool is actually open.

use crate::{
    core::availability::DateRange,
    entities::{Holiday, InventoryPool, holiday},
    errors::{Error, Result},
};
use chrono::{Datelike, Days, NaiveDate, Utc, Weekday};
use sea_orm::prelude::*;
use std::collections::HashSet;
use std::str::FromStr;

/// How far [`PoolCalendar::next_open_date`] looks ahead before giving up.
const MAX_LOOKAHEAD_DAYS: u64 = 366;

/// The current day in UTC. Hand-over and return dates are taken from here.
#[must_use]
pub fn today() -> NaiveDate {
    Utc::now().date_naive()
}

/// Parses a comma separated weekday list such as `"mon,tue,fri"`.
///
/// Blank entries are ignored; unknown names are a validation error.
pub fn parse_weekdays(raw: &str) -> Result<HashSet<Weekday>> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            Weekday::from_str(s)
                .map_err(|_| Error::validation(format!("Unknown weekday '{s}'")))
        })
        .collect()
}

/// Formats weekdays as stored on the pool row, Monday first.
#[must_use]
pub fn format_weekdays(days: &[Weekday]) -> String {
    let mut sorted = days.to_vec();
    sorted.sort_by_key(Weekday::num_days_from_monday);
    sorted.dedup();
    sorted
        .iter()
        .map(|d| d.to_string().to_lowercase())
        .collect::<Vec<_>>()
        .join(",")
}

/// When a pool is open.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolCalendar {
    open_weekdays: HashSet<Weekday>,
    holidays: Vec<DateRange>,
}

impl PoolCalendar {
    /// Calendar open on `open_weekdays` except during `holidays`.
    #[must_use]
    pub const fn new(open_weekdays: HashSet<Weekday>, holidays: Vec<DateRange>) -> Self {
        Self {
            open_weekdays,
            holidays,
        }
    }

    /// Whether items can be picked up or returned on `date`.
    #[must_use]
    pub fn is_open(&self, date: NaiveDate) -> bool {
        self.open_weekdays.contains(&date.weekday())
            && !self.holidays.iter().any(|h| h.contains(date))
    }

    /// First open day on or after `date`.
    ///
    /// A pool with no open weekday, or closed for longer than a year, returns `date`
    /// unchanged.
    #[must_use]
    pub fn next_open_date(&self, date: NaiveDate) -> NaiveDate {
        if self.open_weekdays.is_empty() {
            return date;
        }

        (0..=MAX_LOOKAHEAD_DAYS)
            .filter_map(|offset| date.checked_add_days(Days::new(offset)))
            .find(|d| self.is_open(*d))
            .unwrap_or(date)
    }
}

/// Loads the calendar of a pool.
pub async fn load_calendar<C>(conn: &C, inventory_pool_id: i64) -> Result<PoolCalendar>
where
    C: ConnectionTrait,
{
    let pool = InventoryPool::find_by_id(inventory_pool_id)
        .one(conn)
        .await?
        .ok_or_else(|| Error::not_found("inventory pool", inventory_pool_id))?;

    let holidays = Holiday::find()
        .filter(holiday::Column::InventoryPoolId.eq(inventory_pool_id))
        .all(conn)
        .await?
        .into_iter()
        .map(|h| DateRange::new(h.start_date, h.end_date))
        .collect();

    Ok(PoolCalendar::new(parse_weekdays(&pool.open_weekdays)?, holidays))
}

/// First day on or after `date` the pool is open.
pub async fn next_open_date<C>(
    conn: &C,
    inventory_pool_id: i64,
    date: NaiveDate,
) -> Result<NaiveDate>
where
    C: ConnectionTrait,
{
    Ok(load_calendar(conn, inventory_pool_id).await?.next_open_date(date))
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::core::inventory;
    use crate::test_utils::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_parse_and_format_weekdays() {
        let days = parse_weekdays("mon, Wed,,fri").unwrap();
        assert_eq!(days.len(), 3);
        assert!(days.contains(&Weekday::Wed));

        assert_eq!(
            format_weekdays(&[Weekday::Fri, Weekday::Mon, Weekday::Fri]),
            "mon,fri"
        );
        assert!(parse_weekdays("mon,funday").is_err());
        assert!(parse_weekdays("").unwrap().is_empty());
    }

    #[test]
    fn test_next_open_date_skips_weekend_and_holiday() {
        let calendar = PoolCalendar::new(
            parse_weekdays("mon,tue,wed,thu,fri").unwrap(),
            vec![DateRange::new(date(2026, 12, 24), date(2026, 12, 28))],
        );

        // Saturday -> Monday
        assert_eq!(calendar.next_open_date(date(2026, 10, 17)), date(2026, 10, 19));
        // Open day stays
        assert_eq!(calendar.next_open_date(date(2026, 10, 16)), date(2026, 10, 16));
        // Thursday in the holiday -> Tuesday after it
        assert_eq!(calendar.next_open_date(date(2026, 12, 24)), date(2026, 12, 29));
    }

    #[test]
    fn test_closed_pool_keeps_date() {
        let calendar = PoolCalendar::new(HashSet::new(), Vec::new());
        assert_eq!(calendar.next_open_date(date(2026, 10, 17)), date(2026, 10, 17));
        assert!(!calendar.is_open(date(2026, 10, 17)));
    }

    #[tokio::test]
    async fn test_load_calendar_from_database() -> Result<()> {
        let db = setup_test_db().await?;
        let pool = inventory::create_pool(&db, "Werkstatt", &[Weekday::Wed]).await?;
        inventory::add_holiday(&db, pool.id, "Inventur", date(2026, 10, 21), date(2026, 10, 21))
            .await?;

        let next = next_open_date(&db, pool.id, date(2026, 10, 19)).await?;
        assert_eq!(next, date(2026, 10, 28));

        let missing = load_calendar(&db, 999).await;
        assert!(matches!(missing, Err(Error::NotFound { .. })));
        Ok(())
    }
}

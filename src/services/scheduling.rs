use chrono::{Datelike, NaiveDate, NaiveTime, Weekday};
use rusqlite::Connection;

use crate::config::AppConfig;
use crate::db::queries;
use crate::models::Slot;

/// Bookable window: a half-open [open, close) interval on configured
/// weekdays, divided into fixed-duration slots.
#[derive(Debug, Clone)]
pub struct BusinessHours {
    pub open: NaiveTime,
    pub close: NaiveTime,
    pub weekdays: Vec<Weekday>,
    pub slot_minutes: u32,
}

impl BusinessHours {
    pub fn new(
        open: NaiveTime,
        close: NaiveTime,
        weekdays: Vec<Weekday>,
        slot_minutes: u32,
    ) -> anyhow::Result<Self> {
        anyhow::ensure!(open < close, "business hours open at or after close");
        anyhow::ensure!(slot_minutes > 0, "slot duration must be positive");

        let interval = (close - open).num_minutes();
        anyhow::ensure!(
            interval % slot_minutes as i64 == 0,
            "business hours interval ({interval} min) is not a multiple of the slot duration ({slot_minutes} min)"
        );

        Ok(Self {
            open,
            close,
            weekdays,
            slot_minutes,
        })
    }

    pub fn from_config(config: &AppConfig) -> anyhow::Result<Self> {
        let open = NaiveTime::parse_from_str(&config.business_open, "%H:%M")
            .map_err(|_| anyhow::anyhow!("invalid BUSINESS_OPEN: {}", config.business_open))?;
        let close = NaiveTime::parse_from_str(&config.business_close, "%H:%M")
            .map_err(|_| anyhow::anyhow!("invalid BUSINESS_CLOSE: {}", config.business_close))?;

        let mut weekdays = vec![];
        for day in config.business_days.split(',') {
            weekdays.push(parse_weekday(day.trim())?);
        }

        Self::new(open, close, weekdays, config.slot_minutes)
    }

    pub fn is_open_day(&self, date: NaiveDate) -> bool {
        self.weekdays.contains(&date.weekday())
    }

    pub fn contains(&self, time: NaiveTime) -> bool {
        time >= self.open && time < self.close
    }

    /// All slot start times of one business day, chronological.
    pub fn slot_times(&self) -> Vec<NaiveTime> {
        let mut times = vec![];
        let mut cursor = self.open;
        while cursor < self.close {
            times.push(cursor);
            cursor += chrono::Duration::minutes(self.slot_minutes as i64);
        }
        times
    }

    pub fn describe_days(&self) -> String {
        self.weekdays
            .iter()
            .map(|d| format!("{d}"))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

fn parse_weekday(s: &str) -> anyhow::Result<Weekday> {
    match s.to_lowercase().as_str() {
        "mon" => Ok(Weekday::Mon),
        "tue" => Ok(Weekday::Tue),
        "wed" => Ok(Weekday::Wed),
        "thu" => Ok(Weekday::Thu),
        "fri" => Ok(Weekday::Fri),
        "sat" => Ok(Weekday::Sat),
        "sun" => Ok(Weekday::Sun),
        _ => Err(anyhow::anyhow!("invalid weekday: {s}")),
    }
}

/// Slots for one date, chronological, with availability computed
/// against active appointments. Closed days yield an empty sequence.
pub fn available_slots(
    conn: &Connection,
    hours: &BusinessHours,
    date: NaiveDate,
) -> anyhow::Result<Vec<Slot>> {
    if !hours.is_open_day(date) {
        return Ok(vec![]);
    }

    let booked = queries::active_times_on_date(conn, date)?;

    Ok(hours
        .slot_times()
        .into_iter()
        .map(|time| Slot {
            time,
            available: !booked.contains(&time),
        })
        .collect())
}

/// True iff no active appointment starts at exactly this time on this
/// date. Purely advisory: the store's uniqueness index is what
/// actually prevents double booking.
pub fn is_available(
    conn: &Connection,
    hours: &BusinessHours,
    date: NaiveDate,
    time: NaiveTime,
) -> anyhow::Result<bool> {
    let slots = available_slots(conn, hours, date)?;
    match slots.iter().find(|s| s.time == time) {
        Some(slot) => Ok(slot.available),
        // Out-of-grid times fall back to a direct lookup so the
        // policy-off mode can still detect exact collisions.
        None => {
            let booked = queries::active_times_on_date(conn, date)?;
            Ok(!booked.contains(&time))
        }
    }
}

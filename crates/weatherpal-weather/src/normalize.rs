//! Raw payload → hourly strip + 5 day list.
//!
//! "Local" throughout is the time zone of the reference time passed in, so
//! callers decide whether that is the device zone or something fixed.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, TimeZone, Timelike};

use crate::payload::{RawEntry, RawForecastPayload};
use crate::types::{ConditionSymbol, DailySample, HourlySample, NormalizedForecast};

/// Days in the daily list.
pub const MAX_DAYS: usize = 5;
/// Hour the daily representative is chosen around.
pub const MIDDAY_HOUR: i64 = 12;
/// Daily description when the provider gives none.
pub const DEFAULT_DESCRIPTION: &str = "Clear";

/// Normalize a provider payload relative to `reference`.
pub fn normalize<Tz: TimeZone>(
    payload: RawForecastPayload,
    reference: &DateTime<Tz>,
) -> NormalizedForecast {
    let tz = reference.timezone();
    let limit = payload.shape.hourly_limit();

    let mut entries = payload.entries;
    entries.sort_by_key(|e| e.timestamp);

    let hourly = hourly_samples(&entries, reference, limit);
    let daily = match payload.daily {
        Some(mut aggregates) => {
            aggregates.sort_by_key(|e| e.timestamp);
            daily_from_aggregates(aggregates, &tz)
        }
        None => daily_from_midday(entries, &tz),
    };

    NormalizedForecast { hourly, daily }
}

fn hourly_samples<Tz: TimeZone>(
    entries: &[RawEntry],
    reference: &DateTime<Tz>,
    limit: usize,
) -> Vec<HourlySample> {
    let tz = reference.timezone();
    let today = reference.date_naive();

    entries
        .iter()
        .filter(|e| e.timestamp > *reference)
        .map(|e| (e, e.timestamp.with_timezone(&tz)))
        .filter(|(_, local)| local.date_naive() == today)
        .take(limit)
        .map(|(e, local)| hourly_sample(e, local.hour() as u8))
        .collect()
}

fn hourly_sample(entry: &RawEntry, hour_of_day: u8) -> HourlySample {
    let icon_key = entry.condition.as_ref().and_then(|c| c.icon.clone());
    HourlySample {
        hour_of_day,
        temperature_celsius: round_temperature(entry.temperature),
        humidity_percent: entry.humidity.unwrap_or(0).clamp(0, 100) as u8,
        condition_symbol: symbol_for(icon_key.as_deref()),
        icon_key,
    }
}

fn group_by_day<Tz: TimeZone>(entries: Vec<RawEntry>, tz: &Tz) -> BTreeMap<NaiveDate, Vec<RawEntry>> {
    let mut days: BTreeMap<NaiveDate, Vec<RawEntry>> = BTreeMap::new();
    for entry in entries {
        let date = entry.timestamp.with_timezone(tz).date_naive();
        days.entry(date).or_default().push(entry);
    }
    days
}

fn daily_from_aggregates<Tz: TimeZone>(aggregates: Vec<RawEntry>, tz: &Tz) -> Vec<DailySample> {
    group_by_day(aggregates, tz)
        .into_iter()
        .take(MAX_DAYS)
        .filter_map(|(date, items)| items.into_iter().next().map(|e| daily_sample(e, date)))
        .collect()
}

fn daily_from_midday<Tz: TimeZone>(entries: Vec<RawEntry>, tz: &Tz) -> Vec<DailySample> {
    group_by_day(entries, tz)
        .into_iter()
        .take(MAX_DAYS)
        .filter_map(|(date, items)| midday_entry(items, tz).map(|e| daily_sample(e, date)))
        .collect()
}

/// Entry whose local hour is closest to noon; the earlier timestamp wins a tie.
fn midday_entry<Tz: TimeZone>(items: Vec<RawEntry>, tz: &Tz) -> Option<RawEntry> {
    items.into_iter().min_by_key(|e| {
        let hour = i64::from(e.timestamp.with_timezone(tz).hour());
        ((hour - MIDDAY_HOUR).abs(), e.timestamp)
    })
}

fn daily_sample(entry: RawEntry, date: NaiveDate) -> DailySample {
    let condition = entry.condition.unwrap_or_default();
    let description = condition
        .main
        .filter(|m| !m.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_DESCRIPTION.to_string());

    DailySample {
        label: date.format("%a").to_string(),
        description,
        temperature_celsius: round_temperature(entry.temperature),
        condition_symbol: symbol_for(condition.icon.as_deref()),
        icon_key: condition.icon,
    }
}

fn symbol_for(icon: Option<&str>) -> ConditionSymbol {
    icon.map(ConditionSymbol::from_icon_code).unwrap_or_default()
}

/// Round half away from zero.
fn round_temperature(celsius: f64) -> i32 {
    celsius.round() as i32
}

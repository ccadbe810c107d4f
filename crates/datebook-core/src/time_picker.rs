//! Time selection for a reminder and its resolution into a point in time.

use std::fmt;
use std::ops::RangeInclusive;
use std::str::FromStr;

use anyhow::anyhow;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::grid::format_long_date;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Period {
    #[serde(rename = "AM")]
    Am,
    #[serde(rename = "PM")]
    Pm,
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Period::Am => f.write_str("AM"),
            Period::Pm => f.write_str("PM"),
        }
    }
}

impl FromStr for Period {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "am" | "a" => Ok(Period::Am),
            "pm" | "p" => Ok(Period::Pm),
            other => Err(anyhow!("expected AM or PM, got: {other}")),
        }
    }
}

/// Clock format preference. `Auto` stands for "ask the device", which has
/// no real source here and settles on the 12-hour clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimeFormat {
    #[default]
    Auto,
    TwelveHour,
    TwentyFourHour,
}

impl TimeFormat {
    pub fn uses_24_hour(self) -> bool {
        matches!(self, TimeFormat::TwentyFourHour)
    }
}

impl FromStr for TimeFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "auto" => Ok(TimeFormat::Auto),
            "12" | "12h" => Ok(TimeFormat::TwelveHour),
            "24" | "24h" => Ok(TimeFormat::TwentyFourHour),
            other => Err(anyhow!("invalid time.format: {other} (expected auto, 12 or 24)")),
        }
    }
}

pub fn hour_options(use_24_hour: bool) -> RangeInclusive<u32> {
    if use_24_hour { 0..=23 } else { 1..=12 }
}

pub fn minute_options() -> RangeInclusive<u32> {
    0..=59
}

/// Wheel label for an hour or minute value.
pub fn format_wheel_value(value: u32) -> String {
    format!("{value:02}")
}

/// Converts a picker value to a 24-hour clock hour.
pub fn to_24_hour(hour: u32, period: Option<Period>, use_24_hour: bool) -> u32 {
    if use_24_hour {
        return hour;
    }
    match period {
        Some(Period::Pm) if hour < 12 => hour + 12,
        Some(Period::Am) if hour == 12 => 0,
        _ => hour,
    }
}

/// Places the chosen time on `base`, seconds zeroed.
///
/// Returns `None` only when the caller passes values outside the
/// [`hour_options`]/[`minute_options`] ranges.
#[instrument(level = "debug")]
pub fn resolve(
    base: NaiveDate,
    hour: u32,
    minute: u32,
    period: Option<Period>,
    use_24_hour: bool,
) -> Option<NaiveDateTime> {
    let hour24 = to_24_hour(hour, period, use_24_hour);
    let resolved = base.and_hms_opt(hour24, minute, 0)?;
    debug!(%resolved, hour24, "resolved reminder time");
    Some(resolved)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TimeSelection {
    pub hour: u32,
    pub minute: u32,
    pub period: Option<Period>,
    pub use_24_hour: bool,
}

impl TimeSelection {
    /// Selection shown when the picker opens: the current wall-clock time
    /// in the active format.
    pub fn initial(now: NaiveTime, use_24_hour: bool) -> Self {
        let raw = now.hour();
        let hour = if use_24_hour {
            raw
        } else {
            match raw % 12 {
                0 => 12,
                h => h,
            }
        };
        Self {
            hour,
            minute: now.minute(),
            period: Some(if raw >= 12 { Period::Pm } else { Period::Am }),
            use_24_hour,
        }
    }

    pub fn resolve_on(&self, base: NaiveDate) -> Option<NaiveDateTime> {
        resolve(base, self.hour, self.minute, self.period, self.use_24_hour)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SelectionError {
    #[error("hour {hour} is not offered; pick {min}..={max}")]
    Hour { hour: u32, min: u32, max: u32 },
    #[error("minute {0} is not offered; pick 0..=59")]
    Minute(u32),
    #[error("AM/PM is not used with the 24-hour clock")]
    PeriodIn24Hour,
}

/// Modal-local picker state for one date.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeModal {
    date: NaiveDate,
    selection: TimeSelection,
}

impl TimeModal {
    pub fn open(date: NaiveDate, now: NaiveTime, format: TimeFormat) -> Self {
        let selection = TimeSelection::initial(now, format.uses_24_hour());
        debug!(%date, ?selection, "opened time picker");
        Self { date, selection }
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn selection(&self) -> TimeSelection {
        self.selection
    }

    pub fn title(&self) -> String {
        format!("Set Time for {}", format_long_date(self.date))
    }

    pub fn set_hour(&mut self, hour: u32) -> Result<(), SelectionError> {
        let range = hour_options(self.selection.use_24_hour);
        if !range.contains(&hour) {
            return Err(SelectionError::Hour {
                hour,
                min: *range.start(),
                max: *range.end(),
            });
        }
        self.selection.hour = hour;
        Ok(())
    }

    pub fn set_minute(&mut self, minute: u32) -> Result<(), SelectionError> {
        if !minute_options().contains(&minute) {
            return Err(SelectionError::Minute(minute));
        }
        self.selection.minute = minute;
        Ok(())
    }

    pub fn set_period(&mut self, period: Period) -> Result<(), SelectionError> {
        if self.selection.use_24_hour {
            return Err(SelectionError::PeriodIn24Hour);
        }
        self.selection.period = Some(period);
        Ok(())
    }

    /// Resolves the current selection. Setters keep the selection inside the
    /// offered ranges, so this only yields `None` if that was bypassed.
    pub fn confirm(&self) -> Option<NaiveDateTime> {
        self.selection.resolve_on(self.date)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Timelike;

    use super::*;

    fn base() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 2, 20).expect("valid date")
    }

    fn clock(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 42).expect("valid time")
    }

    fn hour_of(hour: u32, period: Period) -> u32 {
        resolve(base(), hour, 0, Some(period), false)
            .expect("in range")
            .hour()
    }

    #[test]
    fn twelve_hour_conversion_edges() {
        assert_eq!(hour_of(12, Period::Am), 0);
        assert_eq!(hour_of(12, Period::Pm), 12);
        assert_eq!(hour_of(5, Period::Pm), 17);
        assert_eq!(hour_of(5, Period::Am), 5);
    }

    #[test]
    fn twenty_four_hour_ignores_period() {
        let resolved = resolve(base(), 7, 15, Some(Period::Pm), true).expect("in range");
        assert_eq!((resolved.hour(), resolved.minute()), (7, 15));
    }

    #[test]
    fn resolved_time_keeps_date_and_zeroes_seconds() {
        let resolved = resolve(base(), 6, 30, Some(Period::Pm), false).expect("in range");
        assert_eq!(resolved.date(), base());
        assert_eq!(resolved.second(), 0);
        assert_eq!(resolved.nanosecond(), 0);
        assert_eq!(resolved.hour(), 18);
    }

    #[test]
    fn initial_selection_follows_wall_clock() {
        let pm = TimeSelection::initial(clock(15, 7), false);
        assert_eq!((pm.hour, pm.minute, pm.period), (3, 7, Some(Period::Pm)));

        let midnight = TimeSelection::initial(clock(0, 0), false);
        assert_eq!((midnight.hour, midnight.period), (12, Some(Period::Am)));

        let noon = TimeSelection::initial(clock(12, 1), false);
        assert_eq!((noon.hour, noon.period), (12, Some(Period::Pm)));

        let raw = TimeSelection::initial(clock(15, 7), true);
        assert_eq!(raw.hour, 15);
    }

    #[test]
    fn option_ranges() {
        assert_eq!(hour_options(false).collect::<Vec<_>>().len(), 12);
        assert_eq!(hour_options(false).next(), Some(1));
        assert_eq!(hour_options(true).last(), Some(23));
        assert_eq!(minute_options().count(), 60);
        assert_eq!(format_wheel_value(5), "05");
    }

    #[test]
    fn modal_rejects_values_off_the_wheel() {
        let mut modal = TimeModal::open(base(), clock(9, 0), TimeFormat::Auto);
        assert!(matches!(modal.set_hour(0), Err(SelectionError::Hour { .. })));
        assert_eq!(modal.set_minute(60), Err(SelectionError::Minute(60)));

        let mut modal24 = TimeModal::open(base(), clock(9, 0), TimeFormat::TwentyFourHour);
        assert_eq!(modal24.set_period(Period::Pm), Err(SelectionError::PeriodIn24Hour));
        assert!(modal24.set_hour(0).is_ok());
    }

    #[test]
    fn modal_confirm_resolves_selection() {
        let mut modal = TimeModal::open(base(), clock(9, 0), TimeFormat::TwelveHour);
        modal.set_hour(12).expect("hour");
        modal.set_minute(45).expect("minute");
        modal.set_period(Period::Am).expect("period");
        let resolved = modal.confirm().expect("resolved");
        assert_eq!((resolved.hour(), resolved.minute()), (0, 45));
        assert_eq!(modal.title(), "Set Time for Tuesday, February 20, 2024");
    }

    #[test]
    fn parses_format_and_period() {
        assert_eq!("24".parse::<TimeFormat>().expect("fmt"), TimeFormat::TwentyFourHour);
        assert_eq!("auto".parse::<TimeFormat>().expect("fmt"), TimeFormat::Auto);
        assert!(!TimeFormat::Auto.uses_24_hour());
        assert!("13".parse::<TimeFormat>().is_err());
        assert_eq!("pm".parse::<Period>().expect("period"), Period::Pm);
    }
}

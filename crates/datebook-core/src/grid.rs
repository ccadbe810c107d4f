//! Month grid generation.
//!
//! A month view is always 42 cells (six weeks of seven days, Sunday first).
//! Cells before day 1 are filled from the tail of the previous month and
//! cells after the last day from the head of the next month.

use chrono::{Datelike, Months, NaiveDate};
use serde::Serialize;

use crate::reminder::Reminder;

pub const GRID_CELLS: usize = 42;
pub const GRID_COLUMNS: usize = 7;

const WEEKDAY_LABELS: [&str; 7] = ["Sun", "Mon", "Tue", "Wed", "Thu", "Fri", "Sat"];

const MONTH_NAMES: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

/// One position of the month grid.
///
/// `month` is zero-based and is left unnormalized for adjacent-month cells:
/// a leading cell in a January view carries `month == -1` and the target
/// year. Use [`DayCell::date`] for the real calendar date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DayCell {
    pub day: u32,
    pub month: i32,
    pub year: i32,
    pub belongs_to_current_month: bool,
    pub is_today: bool,
    pub is_selected: bool,
    pub has_reminder: bool,
}

impl DayCell {
    fn outside(year: i32, month: i32, day: u32) -> Self {
        Self {
            day,
            month,
            year,
            belongs_to_current_month: false,
            is_today: false,
            is_selected: false,
            has_reminder: false,
        }
    }

    pub fn date(&self) -> Option<NaiveDate> {
        let (year, month0) = normalize_month(self.year, self.month);
        NaiveDate::from_ymd_opt(year, month0 + 1, self.day)
    }
}

/// Folds an arbitrary zero-based month into `[0, 11]`, carrying whole years.
/// The year saturates at the `i32` bounds.
pub fn normalize_month(year: i32, month: i32) -> (i32, u32) {
    let carry = month.div_euclid(12);
    let month0 = month.rem_euclid(12) as u32;
    (year.saturating_add(carry), month0)
}

fn first_of_month(year: i32, month: i32) -> Option<NaiveDate> {
    let (year, month0) = normalize_month(year, month);
    NaiveDate::from_ymd_opt(year, month0 + 1, 1)
}

/// Number of days in the given zero-based month. Out-of-range months roll
/// into the neighbouring years.
pub fn days_in_month(year: i32, month: i32) -> u32 {
    let Some(first) = first_of_month(year, month) else {
        return 0;
    };
    first
        .checked_add_months(Months::new(1))
        .and_then(|next| next.pred_opt())
        .map(|last| last.day())
        .unwrap_or(31)
}

/// Weekday index of day 1 of the month, Sunday = 0.
pub fn first_weekday(year: i32, month: i32) -> u32 {
    first_of_month(year, month)
        .map(|first| first.weekday().num_days_from_sunday())
        .unwrap_or(0)
}

/// Builds the 42-cell grid for `(year, month)`.
///
/// `month` is zero-based and normalized by floor division, so `12` is the
/// following January and `-1` the previous December.
#[tracing::instrument(skip(reminders), fields(reminders = reminders.len()))]
pub fn build_grid(
    year: i32,
    month: i32,
    today: NaiveDate,
    selected: Option<NaiveDate>,
    reminders: &[Reminder],
) -> Vec<DayCell> {
    let (year, month0) = normalize_month(year, month);
    let month = month0 as i32;

    let leading = first_weekday(year, month);
    let days = days_in_month(year, month);
    let days_in_prev = days_in_month(year, month - 1);

    let mut cells = Vec::with_capacity(GRID_CELLS);

    for i in 0..leading {
        cells.push(DayCell::outside(
            year,
            month - 1,
            (days_in_prev + i + 1).saturating_sub(leading),
        ));
    }

    for day in 1..=days {
        let date = NaiveDate::from_ymd_opt(year, month0 + 1, day);
        let matches = |other: Option<NaiveDate>| date.is_some() && other == date;
        cells.push(DayCell {
            day,
            month,
            year,
            belongs_to_current_month: true,
            is_today: matches(Some(today)),
            is_selected: matches(selected),
            has_reminder: reminders
                .iter()
                .any(|reminder| matches(Some(reminder.date_time.date()))),
        });
    }

    let trailing = GRID_CELLS.saturating_sub(cells.len());
    for day in 1..=trailing as u32 {
        cells.push(DayCell::outside(year, month + 1, day));
    }

    tracing::debug!(
        year,
        month = month0,
        leading,
        days,
        trailing,
        "built month grid"
    );
    cells
}

/// Index of the first cell that belongs to the displayed month.
pub fn leading_count(cells: &[DayCell]) -> usize {
    cells
        .iter()
        .position(|cell| cell.belongs_to_current_month)
        .unwrap_or(0)
}

pub fn weekday_label(index: usize) -> &'static str {
    WEEKDAY_LABELS[index % GRID_COLUMNS]
}

pub fn weekday_labels() -> [&'static str; 7] {
    WEEKDAY_LABELS
}

pub fn month_name(month: i32) -> &'static str {
    MONTH_NAMES[month.rem_euclid(12) as usize]
}

/// Header shown above the grid, e.g. `February 2024`.
pub fn month_title(year: i32, month: i32) -> String {
    let (year, month0) = normalize_month(year, month);
    format!("{} {}", month_name(month0 as i32), year)
}

/// Long English date, e.g. `Thursday, February 15, 2024`.
pub fn format_long_date(date: NaiveDate) -> String {
    date.format("%A, %B %-d, %Y").to_string()
}

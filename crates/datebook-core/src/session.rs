//! Headless calendar screen: the state a month view keeps between events.

use chrono::{Datelike, NaiveDate};
use serde::Serialize;
use tracing::{debug, info, instrument};

use crate::datetime::Clock;
use crate::grid::{self, DayCell, normalize_month};
use crate::reminder::{Reminder, ReminderRepository};
use crate::time_picker::{SelectionError, TimeFormat, TimeModal};

/// Month being displayed; `month` is zero-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MonthCursor {
    pub year: i32,
    pub month: u32,
}

impl MonthCursor {
    pub fn new(year: i32, month: i32) -> Self {
        let (year, month) = normalize_month(year, month);
        Self { year, month }
    }

    pub fn containing(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month0(),
        }
    }

    pub fn previous(self) -> Self {
        Self::new(self.year, self.month as i32 - 1)
    }

    pub fn next(self) -> Self {
        Self::new(self.year, self.month as i32 + 1)
    }

    pub fn title(self) -> String {
        grid::month_title(self.year, self.month as i32)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("grid has 42 cells; index {0} is out of range")]
    CellOutOfRange(usize),
    #[error("cell {0} does not map to a calendar date")]
    InvalidCell(usize),
    #[error("no time picker is open; select a day first")]
    NoModal,
    #[error(transparent)]
    Selection(#[from] SelectionError),
    #[error("selected time cannot be placed on {0}")]
    Unresolvable(NaiveDate),
}

pub struct CalendarSession<R, C> {
    clock: C,
    format: TimeFormat,
    current: MonthCursor,
    selected: Option<NaiveDate>,
    modal: Option<TimeModal>,
    reminders: R,
}

impl<R: ReminderRepository, C: Clock> CalendarSession<R, C> {
    /// Opens on today's month with today selected.
    pub fn new(clock: C, format: TimeFormat, reminders: R) -> Self {
        let today = clock.today();
        Self {
            clock,
            format,
            current: MonthCursor::containing(today),
            selected: Some(today),
            modal: None,
            reminders,
        }
    }

    pub fn current_month(&self) -> MonthCursor {
        self.current
    }

    pub fn selected(&self) -> Option<NaiveDate> {
        self.selected
    }

    pub fn modal(&self) -> Option<&TimeModal> {
        self.modal.as_ref()
    }

    pub fn reminders(&self) -> &[Reminder] {
        self.reminders.list()
    }

    pub fn time_format(&self) -> TimeFormat {
        self.format
    }

    pub fn today(&self) -> NaiveDate {
        self.clock.today()
    }

    pub fn grid(&self) -> Vec<DayCell> {
        grid::build_grid(
            self.current.year,
            self.current.month as i32,
            self.clock.today(),
            self.selected,
            self.reminders.list(),
        )
    }

    pub fn previous_month(&mut self) {
        self.current = self.current.previous();
        debug!(month = %self.current.title(), "navigated back");
    }

    pub fn next_month(&mut self) {
        self.current = self.current.next();
        debug!(month = %self.current.title(), "navigated forward");
    }

    /// Taps grid cell `index`. Adjacent-month cells also move the view.
    #[instrument(skip(self))]
    pub fn select_cell(&mut self, index: usize) -> Result<&TimeModal, SessionError> {
        let cells = self.grid();
        let cell = cells.get(index).ok_or(SessionError::CellOutOfRange(index))?;
        let date = cell.date().ok_or(SessionError::InvalidCell(index))?;
        Ok(self.select_date(date))
    }

    #[instrument(skip(self))]
    pub fn select_date(&mut self, date: NaiveDate) -> &TimeModal {
        self.selected = Some(date);
        let target = MonthCursor::containing(date);
        if target != self.current {
            debug!(from = %self.current.title(), to = %target.title(), "selection moved month");
            self.current = target;
        }
        self.modal
            .insert(TimeModal::open(date, self.clock.time_of_day(), self.format))
    }

    pub fn modal_mut(&mut self) -> Result<&mut TimeModal, SessionError> {
        self.modal.as_mut().ok_or(SessionError::NoModal)
    }

    pub fn close_modal(&mut self) {
        if self.modal.take().is_some() {
            debug!("time picker dismissed");
        }
    }

    /// Resolves the open picker into a reminder and stores it.
    #[instrument(skip(self))]
    pub fn confirm_time(&mut self) -> Result<Reminder, SessionError> {
        let modal = self.modal.as_ref().ok_or(SessionError::NoModal)?;
        let date_time = modal
            .confirm()
            .ok_or(SessionError::Unresolvable(modal.date()))?;

        let reminder = Reminder::new(date_time);
        self.reminders.add(reminder.clone());
        self.modal = None;
        info!(id = %reminder.id, at = %reminder.date_time, "reminder set");
        Ok(reminder)
    }
}

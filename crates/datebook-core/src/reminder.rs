use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const DEFAULT_TITLE: &str = "Reminder";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reminder {
    pub id: String,
    pub date_time: NaiveDateTime,
    pub title: String,
}

impl Reminder {
    pub fn new(date_time: NaiveDateTime) -> Self {
        Self::with_title(date_time, DEFAULT_TITLE)
    }

    pub fn with_title(date_time: NaiveDateTime, title: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            date_time,
            title: title.into(),
        }
    }

    /// Text of the alert shown once a reminder has been accepted.
    pub fn confirmation(&self) -> String {
        format!(
            "Reminder set for {}",
            self.date_time.format("%-m/%-d/%Y, %-I:%M:%S %p")
        )
    }
}

/// Storage seam for reminders. The grid only ever reads the list.
pub trait ReminderRepository {
    fn list(&self) -> &[Reminder];
    fn add(&mut self, reminder: Reminder);
}

/// Process-lifetime reminder list.
#[derive(Debug, Default, Clone)]
pub struct InMemoryReminders {
    items: Vec<Reminder>,
}

impl InMemoryReminders {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ReminderRepository for InMemoryReminders {
    fn list(&self) -> &[Reminder] {
        &self.items
    }

    #[tracing::instrument(skip(self, reminder), fields(id = %reminder.id, at = %reminder.date_time))]
    fn add(&mut self, reminder: Reminder) {
        self.items.push(reminder);
        tracing::debug!(count = self.items.len(), "stored reminder");
    }
}

use std::cell::Cell;

use chrono::{NaiveDate, NaiveDateTime, Timelike};
use datebook_core::commands::run_session;
use datebook_core::config::Config;
use datebook_core::datetime::FixedClock;
use datebook_core::grid::{GRID_CELLS, build_grid, leading_count};
use datebook_core::reminder::{InMemoryReminders, Reminder};
use datebook_core::render::Renderer;
use datebook_core::session::{CalendarSession, MonthCursor};
use datebook_core::signup::{
    SignupClient, SignupError, SignupForm, SignupTransport, TransportResponse, ValidationError,
};
use datebook_core::time_picker::{Period, TimeFormat, resolve};
use serde_json::{Value, json};

fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(y, m, d)
        .and_then(|date| date.and_hms_opt(h, min, 0))
        .expect("valid datetime")
}

#[test]
fn february_leap_grid_with_reminder() {
    let today = NaiveDate::from_ymd_opt(2024, 2, 15).expect("valid date");
    let reminder = Reminder::new(at(2024, 2, 20, 18, 30));
    let cells = build_grid(2024, 1, today, Some(today), &[reminder]);

    assert_eq!(cells.len(), GRID_CELLS);
    let leading = leading_count(&cells);
    assert_eq!(leading, 4);
    assert_eq!(cells[0].day, 28);
    assert_eq!(
        cells
            .iter()
            .filter(|c| c.belongs_to_current_month)
            .count(),
        29
    );
    assert!(cells[leading + 14].is_today);
    assert!(cells[leading + 19].has_reminder);
    assert_eq!(cells.iter().filter(|c| c.has_reminder).count(), 1);
    assert_eq!(cells[GRID_CELLS - 1].day, 9);
}

#[test]
fn picker_resolution_matches_clock_rules() {
    let base = NaiveDate::from_ymd_opt(2024, 2, 20).expect("valid date");
    assert_eq!(
        resolve(base, 6, 30, Some(Period::Pm), false),
        Some(at(2024, 2, 20, 18, 30))
    );
    assert_eq!(
        resolve(base, 12, 0, Some(Period::Am), false),
        Some(at(2024, 2, 20, 0, 0))
    );
    assert_eq!(resolve(base, 18, 30, None, true), Some(at(2024, 2, 20, 18, 30)));
}

#[test]
fn session_sets_reminder_from_tapped_cell() {
    let clock = FixedClock(at(2024, 2, 15, 20, 45));
    let mut session =
        CalendarSession::new(clock, TimeFormat::TwentyFourHour, InMemoryReminders::new());
    session.previous_month();
    session.next_month();
    assert_eq!(session.current_month(), MonthCursor::new(2024, 1));

    let leading = leading_count(&session.grid());
    let modal = session.select_cell(leading + 19).expect("tap feb 20");
    assert_eq!(modal.selection().hour, 20);
    assert_eq!(modal.selection().period, None);

    session
        .modal_mut()
        .expect("picker open")
        .set_hour(7)
        .expect("hour");
    let reminder = session.confirm_time().expect("confirm");
    assert_eq!(reminder.date_time, at(2024, 2, 20, 7, 45));
    assert_eq!(reminder.date_time.second(), 0);
    assert_eq!(session.reminders().len(), 1);
}

#[test]
fn scripted_session_survives_bad_input() {
    let mut cfg = Config::default();
    cfg.apply_overrides(vec![
        ("rc.theme".to_string(), "dark".to_string()),
        ("rc.time.format".to_string(), "12".to_string()),
    ]);
    let mut renderer = Renderer::new(&cfg).expect("renderer");
    let script = "\
frobnicate
select 2024-03-01
period xm
hour 11
minute 5
period am
confirm
prev
reminders
quit
";
    let mut out = Vec::new();
    run_session(
        &cfg,
        &mut renderer,
        FixedClock(at(2024, 2, 15, 9, 0)),
        script.as_bytes(),
        &mut out,
        false,
    )
    .expect("session runs to quit");
    let text = String::from_utf8(out).expect("utf8");

    assert!(text.contains("error: unknown command: frobnicate"));
    assert!(text.contains("Set Time for Friday, March 1, 2024"));
    assert!(text.contains("Reminder set for 3/1/2024, 11:05:00 AM"));
    assert!(text.contains("February 2024"));
    assert!(text.contains("2024-03-01 11:05  Reminder"));
}

struct CountingTransport {
    calls: Cell<usize>,
    status: u16,
    body: Value,
}

impl SignupTransport for CountingTransport {
    async fn post_json(&self, _url: &str, _body: &Value) -> anyhow::Result<TransportResponse> {
        self.calls.set(self.calls.get() + 1);
        Ok(TransportResponse {
            status: self.status,
            body: Some(self.body.clone()),
        })
    }
}

#[tokio::test]
async fn signup_with_empty_password_never_posts() {
    let client = SignupClient::new(
        CountingTransport {
            calls: Cell::new(0),
            status: 201,
            body: Value::Null,
        },
        "http://localhost/register",
    );
    let form = SignupForm::new("Ada", "ada@example.com", "");

    let err = client.submit(&form).await.expect_err("validation fails");
    assert!(matches!(
        err,
        SignupError::Validation(ValidationError::MissingField)
    ));
    assert_eq!(client.transport().calls.get(), 0);
}

#[tokio::test]
async fn signup_server_message_is_surfaced() {
    let client = SignupClient::new(
        CountingTransport {
            calls: Cell::new(0),
            status: 409,
            body: json!({ "message": "Email already registered" }),
        },
        "http://localhost/register",
    );
    let form = SignupForm::new("Ada", "ada@example.com", "secret123");

    let err = client.submit(&form).await.expect_err("server rejects");
    assert_eq!(err.to_string(), "Email already registered");
    assert_eq!(client.transport().calls.get(), 1);
}

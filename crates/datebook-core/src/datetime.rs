use anyhow::{
  Context,
  anyhow
};
use chrono::{
  DateTime,
  Duration,
  NaiveDate,
  NaiveDateTime,
  NaiveTime,
  Utc
};
use chrono_tz::Tz;

use crate::config::Config;

const TIMEZONE_ENV_VAR: &str =
  "DATEBOOK_TIMEZONE";
const TIMEZONE_CONFIG_KEY: &str =
  "timezone";

/// Source of "now" for the calendar. Views read the wall clock only through
/// this so tests can pin it.
pub trait Clock {
  fn now(&self) -> NaiveDateTime;

  fn today(&self) -> NaiveDate {
    self.now().date()
  }

  fn time_of_day(&self) -> NaiveTime {
    self.now().time()
  }
}

#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
  tz: Tz
}

impl SystemClock {
  pub fn new(tz: Tz) -> Self {
    Self { tz }
  }

  pub fn from_config(
    cfg: &Config
  ) -> Self {
    Self::new(resolve_timezone(cfg))
  }

  pub fn timezone(&self) -> Tz {
    self.tz
  }
}

impl Clock for SystemClock {
  fn now(&self) -> NaiveDateTime {
    Utc::now()
      .with_timezone(&self.tz)
      .naive_local()
  }
}

#[derive(Debug, Clone, Copy)]
pub struct FixedClock(
  pub NaiveDateTime
);

impl Clock for FixedClock {
  fn now(&self) -> NaiveDateTime {
    self.0
  }
}

/// Timezone precedence: `DATEBOOK_TIMEZONE`, then the `timezone` config
/// key, then UTC.
pub fn resolve_timezone(
  cfg: &Config
) -> Tz {
  if let Ok(raw) =
    std::env::var(TIMEZONE_ENV_VAR)
    && let Some(tz) = parse_timezone(
      &raw,
      TIMEZONE_ENV_VAR
    )
  {
    return tz;
  }

  if let Some(raw) =
    cfg.get(TIMEZONE_CONFIG_KEY)
    && let Some(tz) = parse_timezone(
      &raw,
      "config:timezone"
    )
  {
    return tz;
  }

  tracing::debug!(
    "no timezone configured; using UTC"
  );
  chrono_tz::UTC
}

fn parse_timezone(
  raw: &str,
  source: &str
) -> Option<Tz> {
  let trimmed = raw.trim();
  if trimmed.is_empty() {
    tracing::warn!(
      source,
      "timezone source was empty"
    );
    return None;
  }

  match trimmed.parse::<Tz>() {
    | Ok(tz) => {
      tracing::info!(
        source,
        timezone = %trimmed,
        "configured timezone"
      );
      Some(tz)
    }
    | Err(err) => {
      tracing::error!(
        source,
        timezone = %trimmed,
        error = %err,
        "failed to parse timezone id"
      );
      None
    }
  }
}

/// Parses a calendar date argument relative to `today`.
#[tracing::instrument(skip(today), fields(input = input))]
pub fn parse_date_expr(
  input: &str,
  today: NaiveDate
) -> anyhow::Result<NaiveDate> {
  let token = input.trim();
  match token
    .to_ascii_lowercase()
    .as_str()
  {
    | "today" => return Ok(today),
    | "tomorrow" => {
      return today
        .checked_add_signed(
          Duration::days(1)
        )
        .ok_or_else(|| {
          anyhow!(
            "failed to advance to \
             tomorrow"
          )
        });
    }
    | "yesterday" => {
      return today
        .checked_sub_signed(
          Duration::days(1)
        )
        .ok_or_else(|| {
          anyhow!(
            "failed to step back to \
             yesterday"
          )
        });
    }
    | _ => {}
  }

  NaiveDate::parse_from_str(
    token, "%Y-%m-%d"
  )
  .with_context(|| {
    format!(
      "unrecognized date expression: \
       {input} (expected \
       today/tomorrow/yesterday or \
       YYYY-MM-DD)"
    )
  })
}

/// Parses a full date-time argument. Bare dates resolve to midnight.
#[tracing::instrument(skip(today), fields(input = input))]
pub fn parse_datetime_expr(
  input: &str,
  today: NaiveDate,
  tz: Tz
) -> anyhow::Result<NaiveDateTime> {
  let token = input.trim();

  for fmt in
    ["%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M"]
  {
    if let Ok(ndt) =
      NaiveDateTime::parse_from_str(
        token, fmt
      )
    {
      return Ok(ndt);
    }
  }

  if let Ok(dt) =
    DateTime::parse_from_rfc3339(token)
  {
    return Ok(
      dt.with_timezone(&tz)
        .naive_local()
    );
  }

  let date =
    parse_date_expr(token, today)
      .with_context(|| {
        "supported formats: \
         today/tomorrow/yesterday, \
         YYYY-MM-DD, YYYY-MM-DDTHH:MM, \
         YYYY-MM-DD HH:MM, RFC3339"
      })?;
  Ok(date.and_time(NaiveTime::MIN))
}

#[cfg(test)]
mod tests {
  use chrono::{
    NaiveDate,
    Timelike
  };

  use super::{
    Clock,
    FixedClock,
    parse_date_expr,
    parse_datetime_expr
  };

  fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 2, 15)
      .expect("valid date")
  }

  #[test]
  fn parses_relative_words() {
    assert_eq!(
      parse_date_expr("today", today())
        .expect("today"),
      today()
    );
    assert_eq!(
      parse_date_expr(
        "Tomorrow",
        today()
      )
      .expect("tomorrow")
      .to_string(),
      "2024-02-16"
    );
    assert_eq!(
      parse_date_expr(
        "yesterday",
        today()
      )
      .expect("yesterday")
      .to_string(),
      "2024-02-14"
    );
  }

  #[test]
  fn rejects_garbage() {
    assert!(
      parse_date_expr(
        "someday",
        today()
      )
      .is_err()
    );
  }

  #[test]
  fn parses_datetime_forms() {
    let tz = chrono_tz::UTC;
    let local = parse_datetime_expr(
      "2024-02-20T18:30",
      today(),
      tz
    )
    .expect("local datetime");
    assert_eq!(
      (local.hour(), local.minute()),
      (18, 30)
    );

    let shifted = parse_datetime_expr(
      "2024-02-20T18:30:00+01:00",
      today(),
      tz
    )
    .expect("rfc3339");
    assert_eq!(shifted.hour(), 17);

    let midnight = parse_datetime_expr(
      "2024-02-20",
      today(),
      tz
    )
    .expect("bare date");
    assert_eq!(midnight.hour(), 0);
  }

  #[test]
  fn fixed_clock_splits_date_and_time() {
    let clock = FixedClock(
      today()
        .and_hms_opt(15, 7, 0)
        .expect("valid time")
    );
    assert_eq!(clock.today(), today());
    assert_eq!(
      clock.time_of_day().hour(),
      15
    );
  }
}

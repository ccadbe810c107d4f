use std::cell::Cell;
use std::io::{self, BufRead, IsTerminal, Write};
use std::rc::Rc;
use std::str::FromStr;

use anyhow::{Context, anyhow};
use chrono::{Datelike, NaiveDate, NaiveDateTime};
use tracing::{debug, info, instrument};

use crate::cli::{Command, LayoutArgs, MonthArgs, ResolveArgs, SignupArgs};
use crate::config::Config;
use crate::datetime::{Clock, SystemClock, parse_date_expr, parse_datetime_expr};
use crate::environment::{HostEnvironment, Theme, WindowSize};
use crate::grid;
use crate::reminder::{InMemoryReminders, Reminder};
use crate::render::{self, Renderer};
use crate::session::{CalendarSession, MonthCursor};
use crate::signup::{
    ERROR_TITLE, HttpTransport, SUCCESS_MESSAGE, SUCCESS_TITLE, SignupClient, SignupForm,
};
use crate::time_picker::{Period, hour_options, minute_options, resolve};

#[instrument(skip(cfg, renderer, command))]
pub fn dispatch(cfg: &Config, renderer: &mut Renderer, command: Command) -> anyhow::Result<()> {
    let clock = SystemClock::from_config(cfg);
    match command {
        Command::Month(args) => cmd_month(renderer, &clock, args),
        Command::Resolve(args) => cmd_resolve(&clock, args),
        Command::Session => {
            let stdin = io::stdin();
            let stdout = io::stdout();
            let terminal = stdout.is_terminal();
            run_session(
                cfg,
                renderer,
                clock,
                stdin.lock(),
                stdout.lock(),
                terminal,
            )
        }
        Command::Signup(args) => cmd_signup(cfg, args),
        Command::Layout(args) => cmd_layout(cfg, renderer, args),
    }
}

#[instrument(skip(renderer, clock, args))]
fn cmd_month(
    renderer: &mut Renderer,
    clock: &SystemClock,
    args: MonthArgs,
) -> anyhow::Result<()> {
    let today = clock.today();
    let year = args.year.unwrap_or(today.year());
    let month0 = args
        .month
        .map(|m| m as i32 - 1)
        .unwrap_or(today.month0() as i32);

    let selected = args
        .select
        .as_deref()
        .map(|raw| parse_date_expr(raw, today))
        .transpose()
        .context("invalid --select date")?;

    let reminders = args
        .reminders
        .iter()
        .map(|raw| {
            parse_datetime_expr(raw, today, clock.timezone())
                .map(Reminder::new)
                .with_context(|| format!("invalid --remind value: {raw}"))
        })
        .collect::<anyhow::Result<Vec<_>>>()?;

    debug!(
        year,
        month = month0,
        ?selected,
        reminders = reminders.len(),
        "rendering month"
    );
    let cells = grid::build_grid(year, month0, today, selected, &reminders);
    renderer.print_month(&grid::month_title(year, month0), &cells)
}

#[instrument(skip(clock, args))]
fn cmd_resolve(clock: &SystemClock, args: ResolveArgs) -> anyhow::Result<()> {
    let resolved = resolve_args(&args, clock.today())?;
    println!("{}", resolved.format("%Y-%m-%dT%H:%M:%S"));
    Ok(())
}

/// Resolves `resolve` arguments against `today`. A 12-hour time without a
/// period keeps its hour as given.
fn resolve_args(args: &ResolveArgs, today: NaiveDate) -> anyhow::Result<NaiveDateTime> {
    let base = parse_date_expr(&args.date, today)?;
    let period = args
        .period
        .as_deref()
        .map(Period::from_str)
        .transpose()?;

    let hours = hour_options(args.use_24_hour);
    if !hours.contains(&args.hour) {
        return Err(anyhow!(
            "hour must be in {}..={} for the {} clock",
            hours.start(),
            hours.end(),
            if args.use_24_hour { "24-hour" } else { "12-hour" }
        ));
    }
    if !minute_options().contains(&args.minute) {
        return Err(anyhow!("minute must be in 0..=59"));
    }

    resolve(base, args.hour, args.minute, period, args.use_24_hour)
        .ok_or_else(|| anyhow!("cannot place {}:{} on {base}", args.hour, args.minute))
}

#[instrument(skip(cfg, args), fields(email = %args.email))]
fn cmd_signup(cfg: &Config, args: SignupArgs) -> anyhow::Result<()> {
    let endpoint = args.endpoint.unwrap_or_else(|| cfg.signup_endpoint());
    let form = SignupForm::new(args.name, args.email, args.password);

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;
    let client = SignupClient::new(HttpTransport::new()?, endpoint);

    match runtime.block_on(client.submit(&form)) {
        Ok(()) => {
            println!("{SUCCESS_TITLE}: {SUCCESS_MESSAGE}");
            Ok(())
        }
        Err(err) => Err(anyhow!("{ERROR_TITLE}: {err}")),
    }
}

fn cmd_layout(cfg: &Config, renderer: &mut Renderer, args: LayoutArgs) -> anyhow::Result<()> {
    let configured = cfg.window_size()?;
    let window = WindowSize {
        width: args.width.unwrap_or(configured.width),
        height: args.height.unwrap_or(configured.height),
    };
    renderer.print_layout(window)
}

/// One line of input to the interactive session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionCommand {
    Previous,
    Next,
    Show,
    SelectCell(usize),
    SelectDate(String),
    Hour(u32),
    Minute(u32),
    Period(Period),
    Confirm,
    Cancel,
    Reminders,
    Theme(Theme),
    Resize(u32, u32),
    Help,
    Quit,
}

impl FromStr for SessionCommand {
    type Err = anyhow::Error;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut words = line.split_whitespace();
        let head = words
            .next()
            .ok_or_else(|| anyhow!("empty command"))?
            .to_ascii_lowercase();
        let mut arg = |name: &str| {
            words
                .next()
                .map(str::to_string)
                .ok_or_else(|| anyhow!("{head} needs {name}"))
        };

        let command = match head.as_str() {
            "prev" | "p" => SessionCommand::Previous,
            "next" | "n" => SessionCommand::Next,
            "show" | "s" => SessionCommand::Show,
            "select" => {
                let target = arg("a cell index or date")?;
                match target.parse::<usize>() {
                    Ok(index) => SessionCommand::SelectCell(index),
                    Err(_) => SessionCommand::SelectDate(target),
                }
            }
            "hour" => SessionCommand::Hour(arg("a value")?.parse().context("invalid hour")?),
            "minute" => {
                SessionCommand::Minute(arg("a value")?.parse().context("invalid minute")?)
            }
            "period" => SessionCommand::Period(arg("AM or PM")?.parse()?),
            "confirm" => SessionCommand::Confirm,
            "cancel" => SessionCommand::Cancel,
            "reminders" => SessionCommand::Reminders,
            "theme" => SessionCommand::Theme(arg("light or dark")?.parse()?),
            "resize" => {
                let width = arg("a width")?.parse().context("invalid width")?;
                let height = arg("a height")?.parse().context("invalid height")?;
                SessionCommand::Resize(width, height)
            }
            "help" | "?" => SessionCommand::Help,
            "quit" | "exit" | "q" => SessionCommand::Quit,
            other => return Err(anyhow!("unknown command: {other} (try help)")),
        };
        Ok(command)
    }
}

const SESSION_HELP: &str = "\
commands:
  prev | next            move one month
  show                   redraw the month
  select <index|date>    pick a grid cell (0-41) or YYYY-MM-DD and open the time picker
  hour <h>               set picker hour
  minute <m>             set picker minute
  period am|pm           set picker period (12-hour clock)
  confirm | cancel       accept or dismiss the picker
  reminders              list reminders
  theme light|dark       switch appearance
  resize <w> <h>         change window size
  quit";

/// Runs the line-driven calendar until `quit` or end of input.
///
/// Command errors are reported on `output` and the loop continues.
#[instrument(skip_all)]
pub fn run_session<C, I, O>(
    cfg: &Config,
    renderer: &mut Renderer,
    clock: C,
    input: I,
    mut output: O,
    terminal: bool,
) -> anyhow::Result<()>
where
    C: Clock,
    I: BufRead,
    O: Write,
{
    let env = HostEnvironment::new(cfg.theme()?, cfg.window_size()?);
    let mut session = CalendarSession::new(clock, cfg.time_format()?, InMemoryReminders::new());

    let theme_changed = Rc::new(Cell::new(None::<Theme>));
    let theme_sub = {
        let theme_changed = Rc::clone(&theme_changed);
        env.theme
            .subscribe(move |theme| theme_changed.set(Some(*theme)))
    };
    let resized = Rc::new(Cell::new(None::<WindowSize>));
    let window_sub = {
        let resized = Rc::clone(&resized);
        env.window.subscribe(move |window| resized.set(Some(*window)))
    };

    info!(month = %session.current_month().title(), "session started");
    write_view(&mut output, renderer, &session, terminal)?;

    for line in input.lines() {
        let line = line.context("failed reading session input")?;
        if line.trim().is_empty() {
            continue;
        }

        let command = match line.parse::<SessionCommand>() {
            Ok(command) => command,
            Err(err) => {
                writeln!(output, "error: {err:#}")?;
                continue;
            }
        };
        debug!(?command, "session command");

        let outcome = apply(&mut session, &env, renderer, &mut output, command, terminal);

        if let Some(theme) = theme_changed.take() {
            renderer.set_theme(theme);
            writeln!(output, "theme: {}", format!("{theme:?}").to_ascii_lowercase())?;
        }
        if let Some(window) = resized.take() {
            render::write_layout(&mut output, window)?;
        }

        match outcome {
            Ok(true) => {}
            Ok(false) => break,
            Err(err) => writeln!(output, "error: {err:#}")?,
        }
    }

    theme_sub.remove();
    window_sub.remove();
    info!(reminders = session.reminders().len(), "session ended");
    Ok(())
}

/// Applies one command; `Ok(false)` ends the session.
fn apply<C: Clock, O: Write>(
    session: &mut CalendarSession<InMemoryReminders, C>,
    env: &HostEnvironment,
    renderer: &Renderer,
    output: &mut O,
    command: SessionCommand,
    terminal: bool,
) -> anyhow::Result<bool> {
    match command {
        SessionCommand::Quit => return Ok(false),
        SessionCommand::Previous => {
            session.previous_month();
            write_view(output, renderer, session, terminal)?;
        }
        SessionCommand::Next => {
            session.next_month();
            write_view(output, renderer, session, terminal)?;
        }
        SessionCommand::Show => write_view(output, renderer, session, terminal)?,
        SessionCommand::SelectCell(index) => {
            let modal = session.select_cell(index)?;
            render::write_modal(&mut *output, modal)?;
        }
        SessionCommand::SelectDate(raw) => {
            let date: NaiveDate = parse_date_expr(&raw, session.today())?;
            let modal = session.select_date(date);
            render::write_modal(&mut *output, modal)?;
        }
        SessionCommand::Hour(hour) => {
            session.modal_mut()?.set_hour(hour)?;
            write_open_modal(output, session)?;
        }
        SessionCommand::Minute(minute) => {
            session.modal_mut()?.set_minute(minute)?;
            write_open_modal(output, session)?;
        }
        SessionCommand::Period(period) => {
            session.modal_mut()?.set_period(period)?;
            write_open_modal(output, session)?;
        }
        SessionCommand::Confirm => {
            let reminder = session.confirm_time()?;
            writeln!(output, "{}", reminder.confirmation())?;
            write_view(output, renderer, session, terminal)?;
        }
        SessionCommand::Cancel => {
            session.close_modal();
            writeln!(output, "cancelled")?;
        }
        SessionCommand::Reminders => render::write_reminders(&mut *output, session.reminders())?,
        SessionCommand::Theme(theme) => env.theme.set(theme),
        SessionCommand::Resize(width, height) => env.window.set(WindowSize { width, height }),
        SessionCommand::Help => writeln!(output, "{SESSION_HELP}")?,
    }
    Ok(true)
}

fn write_view<C: Clock, O: Write>(
    output: &mut O,
    renderer: &Renderer,
    session: &CalendarSession<InMemoryReminders, C>,
    terminal: bool,
) -> anyhow::Result<()> {
    let cursor: MonthCursor = session.current_month();
    render::write_month(
        &mut *output,
        &cursor.title(),
        &session.grid(),
        renderer.paint_theme(terminal),
    )?;
    match session.selected() {
        Some(date) => writeln!(output, "selected: {}", grid::format_long_date(date))?,
        None => writeln!(output, "No date selected")?,
    }
    Ok(())
}

fn write_open_modal<C: Clock, O: Write>(
    output: &mut O,
    session: &CalendarSession<InMemoryReminders, C>,
) -> anyhow::Result<()> {
    if let Some(modal) = session.modal() {
        render::write_modal(&mut *output, modal)?;
    }
    Ok(())
}

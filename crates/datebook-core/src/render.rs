use std::io::{self, IsTerminal, Write};

use unicode_width::UnicodeWidthStr;

use crate::config::Config;
use crate::environment::{Palette, Theme, WindowSize};
use crate::grid::{DayCell, GRID_COLUMNS, weekday_labels};
use crate::reminder::Reminder;
use crate::time_picker::{TimeModal, format_wheel_value, hour_options};

const CELL_WIDTH: usize = 7;

#[derive(Debug, Clone)]
pub struct Renderer {
    color: bool,
    theme: Theme,
}

impl Renderer {
    pub fn new(cfg: &Config) -> anyhow::Result<Self> {
        Ok(Self {
            color: cfg.color()?,
            theme: cfg.theme()?,
        })
    }

    #[tracing::instrument(skip(self, cells))]
    pub fn print_month(&mut self, title: &str, cells: &[DayCell]) -> anyhow::Result<()> {
        let theme = self.paint_theme(io::stdout().is_terminal());
        write_month(io::stdout().lock(), title, cells, theme)
    }

    /// Theme to paint with when writing to a terminal, or `None` for plain text.
    pub fn paint_theme(&self, terminal: bool) -> Option<Theme> {
        (self.color && terminal).then_some(self.theme)
    }

    pub fn set_theme(&mut self, theme: Theme) {
        self.theme = theme;
    }

    pub fn print_layout(&mut self, window: WindowSize) -> anyhow::Result<()> {
        write_layout(io::stdout().lock(), window)
    }
}

/// Writes the title, weekday header and six week rows.
///
/// Today is bracketed, the selected day carries `*` and days with a
/// reminder carry `•`. With a theme, adjacent-month days are dimmed and
/// today/selected are highlighted.
pub fn write_month<W: Write>(
    mut writer: W,
    title: &str,
    cells: &[DayCell],
    theme: Option<Theme>,
) -> anyhow::Result<()> {
    let total_width = CELL_WIDTH * GRID_COLUMNS;
    let title_width = UnicodeWidthStr::width(title);
    let pad = total_width.saturating_sub(title_width) / 2;
    writeln!(writer, "{}{}", " ".repeat(pad), title)?;

    for label in weekday_labels() {
        write!(writer, "{}", pad_cell(label))?;
    }
    writeln!(writer)?;

    for row in cells.chunks(GRID_COLUMNS) {
        for cell in row {
            let text = cell_text(cell);
            let text = match theme {
                Some(theme) => paint(&text, cell_style(cell, theme)),
                None => text,
            };
            write!(writer, "{}", pad_cell(&text))?;
        }
        writeln!(writer)?;
    }

    Ok(())
}

pub fn write_layout<W: Write>(mut writer: W, window: WindowSize) -> anyhow::Result<()> {
    let metrics = window.cell_metrics();
    writeln!(writer, "window      {}x{}", window.width, window.height)?;
    writeln!(writer, "orientation {:?}", window.orientation())?;
    writeln!(writer, "cell        {}x{}", metrics.width, metrics.height)?;
    writeln!(writer, "font size   {:.1}", metrics.font_size)?;
    Ok(())
}

pub fn write_reminders<W: Write>(mut writer: W, reminders: &[Reminder]) -> anyhow::Result<()> {
    if reminders.is_empty() {
        writeln!(writer, "no reminders")?;
        return Ok(());
    }
    for reminder in reminders {
        writeln!(
            writer,
            "{}  {}  {}",
            reminder.date_time.format("%Y-%m-%d %H:%M"),
            reminder.title,
            reminder.id
        )?;
    }
    Ok(())
}

pub fn write_modal<W: Write>(mut writer: W, modal: &TimeModal) -> anyhow::Result<()> {
    let selection = modal.selection();
    writeln!(writer, "{}", modal.title())?;
    let hours = hour_options(selection.use_24_hour);
    writeln!(
        writer,
        "  hour   {} ({}-{})",
        format_wheel_value(selection.hour),
        format_wheel_value(*hours.start()),
        format_wheel_value(*hours.end())
    )?;
    writeln!(writer, "  minute {} (00-59)", format_wheel_value(selection.minute))?;
    if !selection.use_24_hour
        && let Some(period) = selection.period
    {
        writeln!(writer, "  period {period}")?;
    }
    Ok(())
}

fn cell_text(cell: &DayCell) -> String {
    let mut text = if cell.is_today {
        format!("[{}]", cell.day)
    } else {
        cell.day.to_string()
    };
    if cell.is_selected {
        text.push('*');
    }
    if cell.has_reminder {
        text.push('•');
    }
    text
}

/// SGR parameters for a cell, taken from the theme palette as 24-bit colors.
fn cell_style(cell: &DayCell, theme: Theme) -> Option<String> {
    let palette = Palette::for_theme(theme);
    if cell.is_selected {
        Some(format!("1;{}", fg(palette.primary)?))
    } else if cell.is_today {
        Some(format!(
            "1;{};{}",
            fg(palette.text)?,
            bg(palette.today_background)?
        ))
    } else if cell.has_reminder {
        fg(palette.reminder_dot)
    } else if !cell.belongs_to_current_month {
        fg(palette.outside_month_text)
    } else {
        None
    }
}

fn rgb(hex: &str) -> Option<(u8, u8, u8)> {
    let digits = hex.strip_prefix('#')?;
    if digits.len() != 6 {
        return None;
    }
    let channel = |at: usize| u8::from_str_radix(digits.get(at..at + 2)?, 16).ok();
    Some((channel(0)?, channel(2)?, channel(4)?))
}

fn fg(hex: &str) -> Option<String> {
    rgb(hex).map(|(r, g, b)| format!("38;2;{r};{g};{b}"))
}

fn bg(hex: &str) -> Option<String> {
    rgb(hex).map(|(r, g, b)| format!("48;2;{r};{g};{b}"))
}

fn paint(text: &str, code: Option<String>) -> String {
    match code {
        Some(code) => format!("\x1b[{code}m{text}\x1b[0m"),
        None => text.to_string(),
    }
}

fn pad_cell(text: &str) -> String {
    let visible = UnicodeWidthStr::width(strip_ansi(text).as_str());
    let left = CELL_WIDTH.saturating_sub(visible + 1);
    format!("{}{} ", " ".repeat(left), text)
}

fn strip_ansi(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut escaped = false;

    for ch in s.chars() {
        if escaped {
            if ch == 'm' {
                escaped = false;
            }
            continue;
        }

        if ch == '\x1b' {
            escaped = true;
            continue;
        }

        out.push(ch);
    }

    out
}

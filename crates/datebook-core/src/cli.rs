use std::ffi::OsString;
use std::io::IsTerminal;
use std::path::PathBuf;

use anyhow::anyhow;
use clap::{ArgAction, Args, Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone)]
pub struct PreprocessedArgs {
    pub cleaned_args: Vec<OsString>,
    pub rc_overrides: Vec<(String, String)>,
}

#[derive(Debug, Clone)]
pub struct KeyVal {
    pub key: String,
    pub value: String,
}

impl std::str::FromStr for KeyVal {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (k, v) = s
            .split_once('=')
            .ok_or_else(|| anyhow!("expected KEY=VALUE, got: {s}"))?;
        Ok(Self {
            key: k.trim().to_string(),
            value: v.trim().to_string(),
        })
    }
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "datebook",
    version,
    about = "Month calendar with in-memory reminders",
    disable_help_subcommand = true
)]
pub struct GlobalCli {
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[arg(short = 'q', long = "quiet", action = ArgAction::Count, global = true)]
    pub quiet: u8,

    #[arg(
        long = "rc",
        value_parser = clap::builder::ValueParser::new(|s: &str| s.parse::<KeyVal>()),
        action = ArgAction::Append,
        global = true
    )]
    pub rc_overrides: Vec<KeyVal>,

    #[arg(long = "rc-file", global = true)]
    pub rc_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Print a month grid.
    Month(MonthArgs),
    /// Resolve a picker selection into a timestamp.
    Resolve(ResolveArgs),
    /// Drive the calendar interactively from stdin.
    Session,
    /// Register an account with the signup service.
    Signup(SignupArgs),
    /// Show window-derived layout metrics.
    Layout(LayoutArgs),
}

#[derive(Args, Debug, Clone)]
pub struct MonthArgs {
    #[arg(long)]
    pub year: Option<i32>,

    /// Month number, 1-12.
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..=12))]
    pub month: Option<u32>,

    /// Date to mark as selected.
    #[arg(long)]
    pub select: Option<String>,

    /// Reminder timestamp to flag; repeatable.
    #[arg(long = "remind", action = ArgAction::Append)]
    pub reminders: Vec<String>,
}

#[derive(Args, Debug, Clone)]
pub struct ResolveArgs {
    pub date: String,
    pub hour: u32,
    pub minute: u32,
    /// AM or PM; ignored with --24h.
    pub period: Option<String>,

    #[arg(long = "24h")]
    pub use_24_hour: bool,
}

#[derive(Args, Debug, Clone)]
pub struct SignupArgs {
    #[arg(long, default_value = "")]
    pub name: String,

    #[arg(long, default_value = "")]
    pub email: String,

    #[arg(long, default_value = "")]
    pub password: String,

    #[arg(long)]
    pub endpoint: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct LayoutArgs {
    #[arg(long)]
    pub width: Option<u32>,

    #[arg(long)]
    pub height: Option<u32>,
}

pub fn init_tracing(verbose: u8, quiet: u8) -> anyhow::Result<()> {
    let default_level = if quiet >= 2 {
        "error"
    } else if quiet == 1 {
        "warn"
    } else if verbose >= 3 {
        "trace"
    } else if verbose == 2 {
        "debug"
    } else if verbose == 1 {
        "info"
    } else {
        "warn"
    };

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .map_err(|e| anyhow!("invalid RUST_LOG / log filter: {e}"))?;

    let init_result = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .with_level(true)
        .with_writer(std::io::stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .try_init();

    if let Err(err) = init_result {
        debug!(error = %err, "tracing subscriber already set, continuing");
    }

    Ok(())
}

/// Pulls positional `rc.key=value` / `rc.key:value` overrides out of the
/// argument list before clap sees it.
#[tracing::instrument(skip_all)]
pub fn preprocess_args(raw: &[OsString]) -> anyhow::Result<PreprocessedArgs> {
    let mut cleaned = Vec::with_capacity(raw.len());
    let mut overrides: Vec<(String, String)> = Vec::new();

    let mut iter = raw.iter().cloned();
    if let Some(bin) = iter.next() {
        cleaned.push(bin);
    }

    for arg in iter {
        let s = arg.to_string_lossy();
        if let Some(rest) = s.strip_prefix("rc.") {
            let parsed = if let Some((k, v)) = rest.split_once('=') {
                Some((format!("rc.{k}"), v.to_string()))
            } else if let Some((k, v)) = rest.split_once(':') {
                Some((format!("rc.{k}"), v.to_string()))
            } else {
                None
            };

            if let Some((k, v)) = parsed {
                debug!(key = %k, value = %v, "captured positional rc override");
                overrides.push((k, v));
                continue;
            }
        }

        cleaned.push(arg);
    }

    Ok(PreprocessedArgs {
        cleaned_args: cleaned,
        rc_overrides: overrides,
    })
}

#[cfg(test)]
mod tests {
    use std::ffi::OsString;

    use clap::Parser;

    use super::{Command, GlobalCli, preprocess_args};

    fn os(args: &[&str]) -> Vec<OsString> {
        args.iter().map(OsString::from).collect()
    }

    #[test]
    fn positional_rc_overrides_are_extracted() {
        let pre = preprocess_args(&os(&["datebook", "rc.color:off", "month", "rc.theme=dark"]))
            .expect("preprocess");
        assert_eq!(pre.cleaned_args, os(&["datebook", "month"]));
        assert_eq!(
            pre.rc_overrides,
            vec![
                ("rc.color".to_string(), "off".to_string()),
                ("rc.theme".to_string(), "dark".to_string()),
            ]
        );
    }

    #[test]
    fn parses_month_subcommand() {
        let cli = GlobalCli::parse_from(os(&[
            "datebook",
            "-vv",
            "month",
            "--year",
            "2024",
            "--month",
            "2",
            "--remind",
            "2024-02-20T18:30",
        ]));
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Some(Command::Month(args)) => {
                assert_eq!(args.year, Some(2024));
                assert_eq!(args.month, Some(2));
                assert_eq!(args.reminders.len(), 1);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn month_number_is_bounded() {
        assert!(GlobalCli::try_parse_from(os(&["datebook", "month", "--month", "13"])).is_err());
    }

    #[test]
    fn parses_rc_flag() {
        let cli = GlobalCli::parse_from(os(&["datebook", "--rc", "time.format=24", "session"]));
        assert_eq!(cli.rc_overrides[0].key, "time.format");
        assert!(matches!(cli.command, Some(Command::Session)));
    }
}

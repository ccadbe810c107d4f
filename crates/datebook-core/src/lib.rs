pub mod cli;
pub mod commands;
pub mod config;
pub mod datetime;
pub mod environment;
pub mod grid;
pub mod reminder;
pub mod render;
pub mod session;
pub mod signup;
pub mod time_picker;

use std::ffi::OsString;

use clap::Parser;
use tracing::{
  debug,
  info
};

#[tracing::instrument(skip_all)]
pub fn run(
  raw_args: Vec<OsString>
) -> anyhow::Result<()> {
  let pre =
    cli::preprocess_args(&raw_args)?;
  let cli = cli::GlobalCli::parse_from(
    pre.cleaned_args
  );

  cli::init_tracing(
    cli.verbose,
    cli.quiet
  )?;

  info!(
    verbose = cli.verbose,
    quiet = cli.quiet,
    "starting datebook"
  );
  debug!(?pre.rc_overrides, "preprocessed rc overrides");

  let mut cfg = config::Config::load(
    cli.rc_file.as_deref()
  )?;
  cfg.apply_overrides(
    pre.rc_overrides.into_iter().chain(
      cli
        .rc_overrides
        .into_iter()
        .map(|kv| (kv.key, kv.value))
    )
  );

  let mut renderer =
    render::Renderer::new(&cfg)?;

  let command =
    cli.command.unwrap_or_else(|| {
      cli::Command::Month(
        cli::MonthArgs {
          year:      None,
          month:     None,
          select:    None,
          reminders: vec![]
        }
      )
    });
  debug!(?command, "dispatching");

  commands::dispatch(
    &cfg,
    &mut renderer,
    command
  )
}

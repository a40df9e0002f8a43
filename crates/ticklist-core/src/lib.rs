pub mod actions;
pub mod cli;
pub mod commands;
pub mod config;
pub mod controller;
pub mod render;
pub mod shell;
pub mod storage;
pub mod task;
pub mod tasklist;
pub mod theme;

use std::ffi::OsString;
use std::io;

use anyhow::Context;
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
    cli::preprocess_args(&raw_args);
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
    "starting ticklist"
  );
  debug!(?pre.rc_overrides, "preprocessed rc overrides");

  let cfg = config::Config::load(
    cli.ticklistrc.as_deref(),
    pre
      .rc_overrides
      .into_iter()
      .chain(cli.rc_overrides)
  )
  .context(
    "failed to load configuration"
  )?;

  let data_dir =
    config::resolve_data_dir(
      &cfg,
      cli.data.as_deref()
    )
    .context(
      "failed to resolve data \
       directory"
    )?;

  let storage =
    storage::FileStorage::open(
      &data_dir
    )
    .with_context(|| {
      format!(
        "failed to open storage at {}",
        data_dir.display()
      )
    })?;

  let mut controller =
    controller::Controller::open(
      storage
    )?;

  let renderer =
    render::Renderer::new(&cfg);
  let inv = cli::Invocation::parse(
    &cfg, cli.rest
  )?;

  let stdout = io::stdout();
  commands::dispatch(
    &mut controller,
    &cfg,
    &renderer,
    inv,
    &mut stdout.lock()
  )?;

  info!("done");
  Ok(())
}

pub mod cli;
pub mod commands;
pub mod config;
pub mod datetime;
pub mod error;
pub mod profile;
pub mod projection;
pub mod render;
pub mod repository;
pub mod session;
pub mod store;
pub mod task;

#[cfg(test)]
mod test_support;

use std::ffi::OsString;
use std::sync::Arc;

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
  let cli =
    cli::GlobalCli::parse_from(raw_args);

  cli::init_tracing(
    cli.verbose,
    cli.quiet
  )?;

  info!(
    verbose = cli.verbose,
    quiet = cli.quiet,
    "starting tasklist CLI"
  );
  debug!(?cli.command, "parsed command");

  let mut cfg = config::Config::load(
    cli.config.as_deref()
  )?;
  cfg.apply_overrides(
    cli
      .rc_overrides
      .into_iter()
      .map(|kv| (kv.key, kv.value))
  );

  let data_dir =
    config::resolve_data_dir(
      &cfg,
      cli.data.as_deref()
    )
    .context(
      "failed to resolve data \
       directory"
    )?;

  let store = Arc::new(
    store::FileStore::open(&data_dir)
      .with_context(|| {
        format!(
          "failed to open store at {}",
          data_dir.display()
        )
      })?
  );

  let repo =
    repository::TaskRepository::with_key(
      Arc::clone(&store),
      cfg.tasks_key()
    );
  let profile =
    profile::Profile::with_key(
      Arc::clone(&store),
      cfg.username_key()
    );
  let mut renderer =
    render::Renderer::new(&cfg);

  let runtime =
    tokio::runtime::Builder::new_current_thread()
      .enable_all()
      .build()
      .context(
        "failed to start async \
         runtime"
      )?;

  runtime.block_on(commands::dispatch(
    commands::CommandEnv {
      repo:     &repo,
      profile:  &profile,
      cfg:      &cfg,
      renderer: &mut renderer
    },
    cli.command
  ))?;

  info!("done");
  Ok(())
}

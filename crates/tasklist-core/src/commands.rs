use anyhow::{
  Context,
  anyhow
};
use chrono::Utc;
use tracing::{
  info,
  instrument
};

use crate::cli::Command;
use crate::config::Config;
use crate::datetime::parse_due_input;
use crate::profile::{
  Profile,
  display_name
};
use crate::projection::{
  ListFilter,
  ProfileFilter
};
use crate::render::Renderer;
use crate::repository::TaskRepository;
use crate::session::{
  EditSession,
  FieldChange,
  SaveOutcome
};
use crate::store::KeyValueStore;
use crate::task::NewTask;

/// Everything a command handler may
/// touch, wired once at startup.
pub struct CommandEnv<'a, S>
where
  S: KeyValueStore + ?Sized
{
  pub repo:     &'a TaskRepository<S>,
  pub profile:  &'a Profile<S>,
  pub cfg:      &'a Config,
  pub renderer: &'a mut Renderer
}

#[instrument(skip(ctx, command))]
pub async fn dispatch<S>(
  ctx: CommandEnv<'_, S>,
  command: Option<Command>
) -> anyhow::Result<()>
where
  S: KeyValueStore + ?Sized
{
  ctx.repo.load().await;

  match command {
    | None => {
      let filter =
        ctx.cfg.default_filter()?;
      cmd_list(ctx, filter).await
    }
    | Some(Command::List {
      filter
    }) => {
      let filter = match filter {
        | Some(f) => f,
        | None => {
          ctx.cfg.default_filter()?
        }
      };
      cmd_list(ctx, filter).await
    }
    | Some(Command::Add {
      title,
      description,
      priority,
      due
    }) => {
      let due_date = due
        .as_deref()
        .map(parse_due_input)
        .transpose()?;
      let input = NewTask::new(title)
        .with_description(description)
        .with_priority(priority)
        .with_due_date(due_date);
      cmd_add(ctx, input).await
    }
    | Some(Command::Edit {
      id,
      title,
      description,
      priority,
      due,
      clear_due
    }) => {
      let mut changes = vec![];
      if let Some(title) = title {
        changes
          .push(FieldChange::Title(title));
      }
      if let Some(description) =
        description
      {
        changes.push(
          FieldChange::Description(
            description
          )
        );
      }
      if let Some(priority) = priority {
        changes.push(
          FieldChange::Priority(
            priority
          )
        );
      }
      if let Some(due) = due {
        changes.push(
          FieldChange::DueDate(Some(
            parse_due_input(&due)?
          ))
        );
      }
      if clear_due {
        changes.push(
          FieldChange::DueDate(None)
        );
      }
      cmd_edit(ctx, &id, changes).await
    }
    | Some(Command::Toggle {
      id
    }) => cmd_toggle(ctx, &id).await,
    | Some(Command::Delete {
      id
    }) => cmd_delete(ctx, &id).await,
    | Some(Command::Profile {
      completed
    }) => {
      cmd_profile(
        ctx,
        ProfileFilter::from_completed(
          completed
        )
      )
      .await
    }
    | Some(Command::Name {
      name
    }) => cmd_name(ctx, &name).await
  }
}

#[instrument(skip(ctx))]
async fn cmd_list<S>(
  ctx: CommandEnv<'_, S>,
  filter: ListFilter
) -> anyhow::Result<()>
where
  S: KeyValueStore + ?Sized
{
  info!("command list");

  let tasks =
    ctx.repo.project(&filter).await;
  let counts = ctx.repo.counts().await;
  ctx.renderer.print_active_count(counts)?;
  ctx
    .renderer
    .print_task_table(&tasks, Utc::now())
}

#[instrument(skip(ctx, input))]
async fn cmd_add<S>(
  ctx: CommandEnv<'_, S>,
  input: NewTask
) -> anyhow::Result<()>
where
  S: KeyValueStore + ?Sized
{
  info!("command add");

  let task = ctx
    .repo
    .add(input)
    .await
    .context("failed to save task")?;
  println!("Created task {}.", task.id);
  Ok(())
}

#[instrument(skip(ctx, changes))]
async fn cmd_edit<S>(
  ctx: CommandEnv<'_, S>,
  id: &str,
  changes: Vec<FieldChange>
) -> anyhow::Result<()>
where
  S: KeyValueStore + ?Sized
{
  info!("command edit");

  let task = ctx
    .repo
    .get(id)
    .await
    .ok_or_else(|| {
      anyhow!("task not found: {id}")
    })?;

  if changes.is_empty() {
    return ctx
      .renderer
      .print_task_info(&task);
  }

  let mut session = EditSession::new();
  session.start_editing(&task);
  for change in changes {
    session.apply(change)?;
  }

  match session
    .save(ctx.repo)
    .await
    .context("failed to save task")?
  {
    | SaveOutcome::Saved(saved) => {
      println!(
        "Modified task {}.",
        saved.id
      );
      ctx
        .renderer
        .print_task_info(&saved)
    }
    | SaveOutcome::Refused => {
      session.cancel();
      Err(anyhow!(
        "task title must not be empty"
      ))
    }
  }
}

#[instrument(skip(ctx))]
async fn cmd_toggle<S>(
  ctx: CommandEnv<'_, S>,
  id: &str
) -> anyhow::Result<()>
where
  S: KeyValueStore + ?Sized
{
  info!("command toggle");

  let completed = ctx
    .repo
    .toggle_completed(id)
    .await
    .context("failed to toggle task")?;
  if completed {
    println!("Completed task {id}.");
  } else {
    println!("Reopened task {id}.");
  }
  Ok(())
}

#[instrument(skip(ctx))]
async fn cmd_delete<S>(
  ctx: CommandEnv<'_, S>,
  id: &str
) -> anyhow::Result<()>
where
  S: KeyValueStore + ?Sized
{
  info!("command delete");

  match ctx
    .repo
    .delete(id)
    .await
    .context("failed to delete task")?
  {
    | Some(task) => {
      println!(
        "Deleted task {} '{}'.",
        task.id, task.title
      );
    }
    | None => {
      println!("No task with id {id}.");
    }
  }
  Ok(())
}

#[instrument(skip(ctx))]
async fn cmd_profile<S>(
  ctx: CommandEnv<'_, S>,
  filter: ProfileFilter
) -> anyhow::Result<()>
where
  S: KeyValueStore + ?Sized
{
  info!("command profile");

  let name =
    ctx.profile.load_user_name().await;
  let counts = ctx.repo.counts().await;
  ctx.renderer.print_profile_header(
    display_name(&name),
    counts
  )?;

  println!("{}:", filter.label());
  let tasks =
    ctx.repo.project(&filter).await;
  ctx
    .renderer
    .print_task_table(&tasks, Utc::now())
}

#[instrument(skip(ctx))]
async fn cmd_name<S>(
  ctx: CommandEnv<'_, S>,
  name: &str
) -> anyhow::Result<()>
where
  S: KeyValueStore + ?Sized
{
  info!("command name");

  let saved = ctx
    .profile
    .save_user_name(name)
    .await
    .context("failed to save name")?;
  println!(
    "Name saved! Hello, {}!",
    display_name(&saved)
  );
  Ok(())
}

use std::fmt;
use std::str::FromStr;

use anyhow::anyhow;
use serde::Serialize;
use tracing::trace;

use crate::task::{
  Priority,
  Task
};

pub trait TaskFilter {
  fn matches(
    &self,
    task: &Task
  ) -> bool;
}

/// Tabs of the main task list.
#[derive(
  Debug,
  Clone,
  Copy,
  Default,
  PartialEq,
  Eq,
)]
pub enum ListFilter {
  #[default]
  All,
  Urgent,
  Normal,
  Completed
}

impl ListFilter {
  pub const ALL: [ListFilter; 4] = [
    ListFilter::All,
    ListFilter::Urgent,
    ListFilter::Normal,
    ListFilter::Completed
  ];

  pub fn label(self) -> &'static str {
    match self {
      | ListFilter::All => "All",
      | ListFilter::Urgent => "Urgent",
      | ListFilter::Normal => "Normal",
      | ListFilter::Completed => {
        "Completed"
      }
    }
  }
}

impl TaskFilter for ListFilter {
  fn matches(
    &self,
    task: &Task
  ) -> bool {
    match self {
      | ListFilter::All => true,
      | ListFilter::Urgent => {
        task.priority == Priority::High
          && !task.completed
      }
      | ListFilter::Normal => {
        task.priority
          == Priority::Medium
          && !task.completed
      }
      | ListFilter::Completed => {
        task.completed
      }
    }
  }
}

impl fmt::Display for ListFilter {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>
  ) -> fmt::Result {
    f.write_str(self.label())
  }
}

impl FromStr for ListFilter {
  type Err = anyhow::Error;

  fn from_str(
    s: &str
  ) -> Result<Self, Self::Err> {
    match s
      .trim()
      .to_ascii_lowercase()
      .as_str()
    {
      | "all" => Ok(ListFilter::All),
      | "urgent" => {
        Ok(ListFilter::Urgent)
      }
      | "normal" => {
        Ok(ListFilter::Normal)
      }
      | "completed" | "done" => {
        Ok(ListFilter::Completed)
      }
      | other => Err(anyhow!(
        "unknown list filter: {other} \
         (expected all, urgent, \
         normal or completed)"
      ))
    }
  }
}

/// Two-way split used by the profile
/// view.
#[derive(
  Debug,
  Clone,
  Copy,
  Default,
  PartialEq,
  Eq,
)]
pub enum ProfileFilter {
  #[default]
  Current,
  Completed
}

impl ProfileFilter {
  pub fn from_completed(
    view_completed: bool
  ) -> Self {
    if view_completed {
      ProfileFilter::Completed
    } else {
      ProfileFilter::Current
    }
  }

  pub fn label(self) -> &'static str {
    match self {
      | ProfileFilter::Current => {
        "Current Tasks"
      }
      | ProfileFilter::Completed => {
        "Completed Tasks"
      }
    }
  }
}

impl TaskFilter for ProfileFilter {
  fn matches(
    &self,
    task: &Task
  ) -> bool {
    match self {
      | ProfileFilter::Current => {
        task.is_active()
      }
      | ProfileFilter::Completed => {
        task.completed
      }
    }
  }
}

#[derive(
  Debug,
  Clone,
  Copy,
  Default,
  PartialEq,
  Eq,
  Serialize,
)]
pub struct Counts {
  pub active:    usize,
  pub completed: usize
}

impl Counts {
  pub fn total(self) -> usize {
    self.active + self.completed
  }
}

/// Keeps the tasks accepted by
/// `filter`, in their original order.
#[tracing::instrument(skip(
  tasks, filter
))]
pub fn project<'a, I, F>(
  tasks: I,
  filter: &F
) -> Vec<&'a Task>
where
  I: IntoIterator<Item = &'a Task>,
  F: TaskFilter + ?Sized
{
  let out: Vec<&'a Task> = tasks
    .into_iter()
    .filter(|task| filter.matches(task))
    .collect();
  trace!(
    matched = out.len(),
    "projected task list"
  );
  out
}

pub fn counts<'a, I>(
  tasks: I
) -> Counts
where
  I: IntoIterator<Item = &'a Task>
{
  tasks.into_iter().fold(
    Counts::default(),
    |mut acc, task| {
      if task.completed {
        acc.completed += 1;
      } else {
        acc.active += 1;
      }
      acc
    }
  )
}

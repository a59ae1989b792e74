use std::io::IsTerminal;
use std::path::PathBuf;

use anyhow::anyhow;
use clap::{ArgAction, Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use crate::projection::ListFilter;
use crate::task::Priority;

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
    name = "tasks",
    version,
    about = "Local task list with priorities, due dates and a profile view",
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

    #[arg(long = "config", global = true)]
    pub config: Option<PathBuf>,

    #[arg(long = "data", global = true)]
    pub data: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Show tasks for one filter tab
    List {
        #[arg(short = 'f', long = "filter", value_parser = parse_filter)]
        filter: Option<ListFilter>,
    },

    /// Create a task
    Add {
        title: String,

        #[arg(short = 'd', long = "description", default_value = "")]
        description: String,

        #[arg(short = 'p', long = "priority", value_parser = parse_priority, default_value = "medium")]
        priority: Priority,

        #[arg(long = "due")]
        due: Option<String>,
    },

    /// Edit the fields of an existing task
    Edit {
        id: String,

        #[arg(short = 't', long = "title")]
        title: Option<String>,

        #[arg(short = 'd', long = "description")]
        description: Option<String>,

        #[arg(short = 'p', long = "priority", value_parser = parse_priority)]
        priority: Option<Priority>,

        #[arg(long = "due", conflicts_with = "clear_due")]
        due: Option<String>,

        #[arg(long = "clear-due")]
        clear_due: bool,
    },

    /// Flip a task between active and completed
    Toggle { id: String },

    /// Remove a task
    Delete { id: String },

    /// Greeting, counts and the current or completed tasks
    Profile {
        #[arg(long = "completed")]
        completed: bool,
    },

    /// Save the name used in the profile greeting
    Name { name: String },
}

fn parse_filter(s: &str) -> anyhow::Result<ListFilter> {
    s.parse()
}

fn parse_priority(s: &str) -> anyhow::Result<Priority> {
    s.parse()
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
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_level(true)
        .with_ansi(std::io::stderr().is_terminal())
        .try_init();

    if let Err(err) = init_result {
        debug!(error = %err, "tracing subscriber already set, continuing");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::{Command, GlobalCli};
    use crate::projection::ListFilter;
    use crate::task::Priority;

    #[test]
    fn parses_add_with_options() {
        let cli = GlobalCli::parse_from([
            "tasks", "add", "Buy milk", "-p", "high", "--due", "2026-03-01", "-v",
        ]);
        assert_eq!(cli.verbose, 1);
        match cli.command {
            Some(Command::Add {
                title,
                priority,
                due,
                description,
            }) => {
                assert_eq!(title, "Buy milk");
                assert_eq!(priority, Priority::High);
                assert_eq!(due.as_deref(), Some("2026-03-01"));
                assert_eq!(description, "");
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn parses_list_filter_and_rc_override() {
        let cli = GlobalCli::parse_from([
            "tasks",
            "--rc",
            "color=off",
            "list",
            "--filter",
            "completed",
        ]);
        assert_eq!(cli.rc_overrides[0].key, "color");
        assert_eq!(cli.rc_overrides[0].value, "off");
        assert!(matches!(
            cli.command,
            Some(Command::List {
                filter: Some(ListFilter::Completed)
            })
        ));
    }

    #[test]
    fn due_and_clear_due_conflict() {
        let result = GlobalCli::try_parse_from([
            "tasks", "edit", "1", "--due", "2026-03-01", "--clear-due",
        ]);
        assert!(result.is_err());
    }
}

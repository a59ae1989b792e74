use std::io::{self, IsTerminal, Write};

use chrono::{DateTime, Local, Utc};
use unicode_width::UnicodeWidthStr;

use crate::config::Config;
use crate::projection::Counts;
use crate::task::{Priority, Task};

#[derive(Debug, Clone)]
pub struct Renderer {
    color: bool,
}

impl Renderer {
    pub fn new(cfg: &Config) -> Self {
        Self {
            color: cfg.get_bool("color").unwrap_or(true),
        }
    }

    #[tracing::instrument(skip(self, tasks, now))]
    pub fn print_task_table(&mut self, tasks: &[Task], now: DateTime<Utc>) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();

        if tasks.is_empty() {
            writeln!(out, "No tasks")?;
            return Ok(());
        }

        let headers = vec![
            "ID".to_string(),
            "Pri".to_string(),
            "Due".to_string(),
            "Title".to_string(),
            "Description".to_string(),
        ];

        let mut rows = Vec::with_capacity(tasks.len());

        for task in tasks {
            let due = task
                .due_date
                .map(|date| date.with_timezone(&Local).format("%Y-%m-%d").to_string())
                .unwrap_or_default();

            let due = match task.due_date {
                Some(task_due) if task_due < now && !task.completed => self.paint(&due, "31"),
                _ => due,
            };

            let priority = match task.priority {
                Priority::High => self.paint("H", "31"),
                Priority::Medium => "M".to_string(),
                Priority::Low => "L".to_string(),
            };

            let title = if task.completed {
                self.paint(&task.title, "9")
            } else {
                task.title.clone()
            };

            let id = self.paint(&task.id, "33");
            rows.push(vec![id, priority, due, title, task.description.clone()]);
        }

        write_table(&mut out, headers, rows)?;
        Ok(())
    }

    #[tracing::instrument(skip(self, task))]
    pub fn print_task_info(&mut self, task: &Task) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();

        writeln!(out, "id          {}", task.id)?;
        writeln!(out, "title       {}", task.title)?;
        writeln!(out, "description {}", task.description)?;
        writeln!(out, "priority    {}", task.priority)?;
        if let Some(due) = task.due_date {
            writeln!(out, "due         {}", crate::datetime::format_iso(due))?;
        }
        writeln!(
            out,
            "status      {}",
            if task.completed { "completed" } else { "active" }
        )?;

        Ok(())
    }

    pub fn print_active_count(&mut self, counts: Counts) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        writeln!(out, "{} active", counts.active)?;
        Ok(())
    }

    pub fn print_profile_header(&mut self, name: &str, counts: Counts) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        writeln!(out, "Hello, {}!", self.paint(name, "1"))?;
        writeln!(
            out,
            "Current Tasks: {} | Completed Tasks: {}",
            counts.active, counts.completed
        )?;
        Ok(())
    }

    fn paint(&self, text: &str, code: &str) -> String {
        if !self.color || !io::stdout().is_terminal() {
            return text.to_string();
        }
        format!("\x1b[{code}m{text}\x1b[0m")
    }
}

fn write_table<W: Write>(
    mut writer: W,
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
) -> anyhow::Result<()> {
    let column_count = headers.len();
    let mut widths = vec![0usize; column_count];

    for (idx, header) in headers.iter().enumerate() {
        widths[idx] = widths[idx].max(UnicodeWidthStr::width(header.as_str()));
    }

    for row in &rows {
        for (idx, cell) in row.iter().enumerate() {
            widths[idx] = widths[idx].max(UnicodeWidthStr::width(strip_ansi(cell).as_str()));
        }
    }

    for idx in 0..column_count {
        write!(writer, "{:width$} ", headers[idx], width = widths[idx])?;
    }
    writeln!(writer)?;

    for idx in 0..column_count {
        write!(writer, "{:-<width$} ", "", width = widths[idx])?;
    }
    writeln!(writer)?;

    for row in rows {
        for idx in 0..column_count {
            let cell = &row[idx];
            let visible_width = UnicodeWidthStr::width(strip_ansi(cell).as_str());
            let padding = widths[idx].saturating_sub(visible_width);
            write!(writer, "{}{} ", cell, " ".repeat(padding))?;
        }
        writeln!(writer)?;
    }

    Ok(())
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

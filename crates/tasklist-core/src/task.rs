use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;

use anyhow::anyhow;
use chrono::{DateTime, Utc};
use serde::ser::SerializeSeq;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use tracing::warn;

use crate::datetime::iso_date_serde;
use crate::error::ValidationError;

#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

impl Priority {
    pub const ALL: [Priority; 3] = [Priority::Low, Priority::Medium, Priority::High];

    pub fn as_str(self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
        }
    }

    /// Lenient decoding for stored records: anything unrecognised becomes `Medium`.
    fn from_stored(raw: &str) -> Self {
        match raw.parse() {
            Ok(priority) => priority,
            Err(_) => {
                warn!(value = %raw, "unknown stored priority, defaulting to medium");
                Priority::Medium
            }
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" | "l" => Ok(Priority::Low),
            "medium" | "m" => Ok(Priority::Medium),
            "high" | "h" => Ok(Priority::High),
            other => Err(anyhow!("invalid priority: {other}")),
        }
    }
}

impl<'de> Deserialize<'de> for Priority {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = Option::<String>::deserialize(deserializer)?;
        Ok(raw.as_deref().map(Priority::from_stored).unwrap_or_default())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,

    pub title: String,

    #[serde(default, deserialize_with = "nullable_string")]
    pub description: String,

    #[serde(default)]
    pub priority: Priority,

    #[serde(default, with = "iso_date_serde::option")]
    pub due_date: Option<DateTime<Utc>>,

    #[serde(default, deserialize_with = "nullable_bool")]
    pub completed: bool,

    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl Task {
    /// Builds a fresh, not-yet-completed task from validated input.
    pub fn from_new(id: String, input: NewTask) -> Result<Self, ValidationError> {
        let title = normalize_title(&input.title)?;
        Ok(Self {
            id,
            title,
            description: input.description.trim().to_string(),
            priority: input.priority,
            due_date: input.due_date,
            completed: false,
            extra: BTreeMap::new(),
        })
    }

    pub fn is_active(&self) -> bool {
        !self.completed
    }
}

/// Fields supplied when creating a task. The id and completion flag are never caller-chosen.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewTask {
    pub title: String,
    pub description: String,
    pub priority: Priority,
    pub due_date: Option<DateTime<Utc>>,
}

impl NewTask {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    #[must_use]
    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    #[must_use]
    pub fn with_due_date(mut self, due_date: Option<DateTime<Utc>>) -> Self {
        self.due_date = due_date;
        self
    }
}

pub fn normalize_title(raw: &str) -> Result<String, ValidationError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::EmptyTitle);
    }
    Ok(trimmed.to_string())
}

fn nullable_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

fn nullable_bool<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<bool>::deserialize(deserializer)?.unwrap_or_default())
}

/// Ordered task collection, newest first, with an id index.
///
/// Entries are kept oldest-first internally so that prepending a new task is a push and
/// does not shift the index; iteration reverses them back into display order.
#[derive(Debug, Clone, Default)]
pub struct TaskList {
    entries: Vec<Task>,
    index: HashMap<String, usize>,
}

impl TaskList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a list from tasks in display order (newest first). Duplicate ids are rejected.
    pub fn from_newest_first(tasks: Vec<Task>) -> Result<Self, ValidationError> {
        let mut list = Self {
            entries: Vec::with_capacity(tasks.len()),
            index: HashMap::with_capacity(tasks.len()),
        };
        for task in tasks.into_iter().rev() {
            list.prepend(task)?;
        }
        Ok(list)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &Task> + ExactSizeIterator {
        self.entries.iter().rev()
    }

    pub fn to_vec(&self) -> Vec<Task> {
        self.iter().cloned().collect()
    }

    pub fn get(&self, id: &str) -> Option<&Task> {
        self.index.get(id).map(|&pos| &self.entries[pos])
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    pub fn prepend(&mut self, task: Task) -> Result<(), ValidationError> {
        if self.index.contains_key(&task.id) {
            return Err(ValidationError::DuplicateId(task.id));
        }
        self.index.insert(task.id.clone(), self.entries.len());
        self.entries.push(task);
        Ok(())
    }

    /// Swaps in `task` for the entry with the same id and returns the previous value.
    pub fn replace(&mut self, task: Task) -> Option<Task> {
        let pos = *self.index.get(&task.id)?;
        Some(std::mem::replace(&mut self.entries[pos], task))
    }

    /// Flips the completion flag and returns the new value.
    pub fn toggle_completed(&mut self, id: &str) -> Option<bool> {
        let pos = *self.index.get(id)?;
        let task = &mut self.entries[pos];
        task.completed = !task.completed;
        Some(task.completed)
    }

    pub fn remove(&mut self, id: &str) -> Option<Task> {
        let pos = self.index.remove(id)?;
        let removed = self.entries.remove(pos);
        for (offset, task) in self.entries[pos..].iter().enumerate() {
            self.index.insert(task.id.clone(), pos + offset);
        }
        Some(removed)
    }

    /// Timestamp-derived id (epoch milliseconds). Bumps past values already taken so two
    /// tasks created within the same millisecond still get distinct ids.
    pub fn fresh_id(&self, now: DateTime<Utc>) -> String {
        let mut candidate = now.timestamp_millis();
        loop {
            let id = candidate.to_string();
            if !self.contains(&id) {
                return id;
            }
            candidate += 1;
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn from_json(raw: &str) -> serde_json::Result<Self> {
        serde_json::from_str(raw)
    }
}

impl<'a> IntoIterator for &'a TaskList {
    type Item = &'a Task;
    type IntoIter = std::iter::Rev<std::slice::Iter<'a, Task>>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter().rev()
    }
}

impl PartialEq for TaskList {
    fn eq(&self, other: &Self) -> bool {
        self.entries == other.entries
    }
}

impl Serialize for TaskList {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut seq = serializer.serialize_seq(Some(self.len()))?;
        for task in self.iter() {
            seq.serialize_element(task)?;
        }
        seq.end()
    }
}

impl<'de> Deserialize<'de> for TaskList {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let tasks = Vec::<Task>::deserialize(deserializer)?;
        TaskList::from_newest_first(tasks).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;

    fn task(id: &str, title: &str) -> Task {
        Task::from_new(id.to_string(), NewTask::new(title)).expect("valid task")
    }

    #[test]
    fn from_new_trims_and_defaults() {
        let t = Task::from_new(
            "1".to_string(),
            NewTask::new("  Buy milk ").with_description(" 2 litres  "),
        )
        .expect("valid");
        assert_eq!(t.title, "Buy milk");
        assert_eq!(t.description, "2 litres");
        assert_eq!(t.priority, Priority::Medium);
        assert!(!t.completed);
        assert!(t.due_date.is_none());
    }

    #[test]
    fn blank_title_is_rejected() {
        let err = Task::from_new("1".to_string(), NewTask::new(" \t ")).unwrap_err();
        assert_eq!(err, ValidationError::EmptyTitle);
    }

    #[test]
    fn reads_sparse_legacy_records() {
        let raw = r#"[
            {"id":"2","title":"b","completed":true,"color":"red"},
            {"id":"1","title":"a","description":null,"priority":"urgent","dueDate":null}
        ]"#;
        let list = TaskList::from_json(raw).expect("parse");
        let tasks = list.to_vec();
        assert_eq!(tasks[0].id, "2");
        assert_eq!(tasks[0].priority, Priority::Medium);
        assert!(tasks[0].completed);
        assert_eq!(
            tasks[0].extra.get("color"),
            Some(&serde_json::Value::String("red".to_string()))
        );
        assert_eq!(tasks[1].description, "");
        assert_eq!(tasks[1].priority, Priority::Medium);
        assert!(!tasks[1].completed);
    }

    #[test]
    fn loose_due_dates_and_null_flags_keep_the_list() {
        let raw = r#"[
            {"id":"4","title":"d","completed":null},
            {"id":"3","title":"c","dueDate":"2026-03-01"},
            {"id":"2","title":"b","dueDate":"next week"},
            {"id":"1","title":"a","dueDate":"2026-03-01T09:00:00"}
        ]"#;
        let tasks = TaskList::from_json(raw).expect("parse").to_vec();
        assert_eq!(tasks.len(), 4);
        assert!(!tasks[0].completed);
        assert_eq!(
            tasks[1].due_date,
            Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).single()
        );
        assert_eq!(tasks[2].due_date, None);
        assert_eq!(
            tasks[3].due_date,
            Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).single()
        );
    }

    #[test]
    fn writes_camel_case_with_iso_due_date() {
        let due = Utc.with_ymd_and_hms(2026, 2, 16, 5, 0, 0).single().expect("valid dt");
        let mut t = task("1", "a");
        t.priority = Priority::High;
        t.due_date = Some(due);
        let list = TaskList::from_newest_first(vec![t]).expect("list");
        let value: serde_json::Value =
            serde_json::from_str(&list.to_json().expect("json")).expect("reparse");
        assert_eq!(value[0]["dueDate"], "2026-02-16T05:00:00.000Z");
        assert_eq!(value[0]["priority"], "high");
        assert_eq!(value[0]["completed"], false);
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let err = TaskList::from_newest_first(vec![task("1", "a"), task("1", "b")]).unwrap_err();
        assert_eq!(err, ValidationError::DuplicateId("1".to_string()));
        assert!(TaskList::from_json(r#"[{"id":"1","title":"a"},{"id":"1","title":"b"}]"#).is_err());
    }

    #[test]
    fn prepend_keeps_newest_first() {
        let mut list = TaskList::new();
        list.prepend(task("1", "a")).expect("prepend");
        list.prepend(task("2", "b")).expect("prepend");
        list.prepend(task("3", "c")).expect("prepend");
        let ids: Vec<&str> = list.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["3", "2", "1"]);
    }

    #[test]
    fn remove_reindexes_remaining_entries() {
        let mut list = TaskList::from_newest_first(vec![
            task("4", "d"),
            task("3", "c"),
            task("2", "b"),
            task("1", "a"),
        ])
        .expect("list");
        assert_eq!(list.remove("3").map(|t| t.title), Some("c".to_string()));
        assert!(list.remove("3").is_none());
        assert_eq!(list.toggle_completed("4"), Some(true));
        assert_eq!(list.get("2").map(|t| t.title.as_str()), Some("b"));
        assert_eq!(list.get("4").map(|t| t.completed), Some(true));
        let ids: Vec<&str> = list.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["4", "2", "1"]);
    }

    #[test]
    fn fresh_id_skips_taken_millis() {
        let now = Utc.with_ymd_and_hms(2026, 2, 16, 5, 0, 0).single().expect("valid dt");
        let millis = now.timestamp_millis();
        let list = TaskList::from_newest_first(vec![
            task(&(millis + 1).to_string(), "b"),
            task(&millis.to_string(), "a"),
        ])
        .expect("list");
        assert_eq!(list.fresh_id(now), (millis + 2).to_string());
    }

    #[test]
    fn priority_parses_user_input() {
        assert_eq!("HIGH".parse::<Priority>().expect("parse"), Priority::High);
        assert_eq!("l".parse::<Priority>().expect("parse"), Priority::Low);
        assert!("urgent".parse::<Priority>().is_err());
    }
}

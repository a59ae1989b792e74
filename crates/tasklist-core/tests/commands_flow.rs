use std::sync::Arc;

use tasklist_core::cli::Command;
use tasklist_core::commands::{CommandEnv, dispatch};
use tasklist_core::config::Config;
use tasklist_core::profile::{DEFAULT_USERNAME_KEY, Profile};
use tasklist_core::render::Renderer;
use tasklist_core::repository::{DEFAULT_TASKS_KEY, TaskRepository};
use tasklist_core::store::MemoryStore;
use tasklist_core::task::Priority;

/// Runs one command the way the binary does: fresh repository, load, dispatch.
async fn run(store: &Arc<MemoryStore>, cfg: &Config, command: Option<Command>) -> anyhow::Result<()> {
    let repo = TaskRepository::new(Arc::clone(store));
    let profile = Profile::new(Arc::clone(store));
    let mut renderer = Renderer::new(cfg);
    dispatch(
        CommandEnv {
            repo: &repo,
            profile: &profile,
            cfg,
            renderer: &mut renderer,
        },
        command,
    )
    .await
}

fn add(title: &str, due: Option<&str>) -> Command {
    Command::Add {
        title: title.to_string(),
        description: String::new(),
        priority: Priority::Medium,
        due: due.map(str::to_string),
    }
}

fn edit(id: &str) -> Command {
    Command::Edit {
        id: id.to_string(),
        title: None,
        description: None,
        priority: None,
        due: None,
        clear_due: false,
    }
}

fn stored(store: &MemoryStore) -> serde_json::Value {
    let raw = store.snapshot(DEFAULT_TASKS_KEY).expect("tasks stored");
    serde_json::from_str(&raw).expect("json array")
}

fn first_id(store: &MemoryStore) -> String {
    stored(store)[0]["id"].as_str().expect("id").to_string()
}

fn plain_config() -> Config {
    let mut cfg = Config::default();
    cfg.apply_overrides([("color".to_string(), "off".to_string())]);
    cfg
}

#[tokio::test]
async fn edit_saves_changes_and_refuses_blank_title() {
    let store = Arc::new(MemoryStore::new());
    let cfg = plain_config();
    run(&store, &cfg, Some(add("Buy milk", None))).await.expect("add");
    let id = first_id(&store);

    let mut change = edit(&id);
    if let Command::Edit { description, priority, .. } = &mut change {
        *description = Some(" 2 litres ".to_string());
        *priority = Some(Priority::High);
    }
    run(&store, &cfg, Some(change)).await.expect("edit");

    let value = stored(&store);
    assert_eq!(value[0]["title"], "Buy milk");
    assert_eq!(value[0]["description"], "2 litres");
    assert_eq!(value[0]["priority"], "high");

    let before = store.snapshot(DEFAULT_TASKS_KEY);
    let mut blank = edit(&id);
    if let Command::Edit { title, .. } = &mut blank {
        *title = Some("   ".to_string());
    }
    let err = run(&store, &cfg, Some(blank)).await.unwrap_err();
    assert!(err.to_string().contains("title must not be empty"));
    assert_eq!(store.snapshot(DEFAULT_TASKS_KEY), before);

    assert!(run(&store, &cfg, Some(edit("missing"))).await.is_err());
}

#[tokio::test]
async fn clear_due_removes_the_due_date() {
    let store = Arc::new(MemoryStore::new());
    let cfg = plain_config();
    run(&store, &cfg, Some(add("Report", Some("2026-03-01"))))
        .await
        .expect("add");
    let id = first_id(&store);
    assert_eq!(stored(&store)[0]["dueDate"], "2026-03-01T00:00:00.000Z");

    let mut change = edit(&id);
    if let Command::Edit { clear_due, .. } = &mut change {
        *clear_due = true;
    }
    run(&store, &cfg, Some(change)).await.expect("edit");

    assert!(stored(&store)[0]["dueDate"].is_null());
}

#[tokio::test]
async fn list_without_filter_uses_configured_default() {
    let store = Arc::new(MemoryStore::new());

    let mut cfg = plain_config();
    cfg.apply_overrides([("default.filter".to_string(), "urgent".to_string())]);
    run(&store, &cfg, Some(Command::List { filter: None }))
        .await
        .expect("list");
    run(&store, &cfg, None).await.expect("bare invocation lists");

    cfg.apply_overrides([("default.filter".to_string(), "someday".to_string())]);
    let err = run(&store, &cfg, Some(Command::List { filter: None }))
        .await
        .unwrap_err();
    assert!(format!("{err:#}").contains("default.filter"));
    assert!(run(&store, &cfg, None).await.is_err());
    run(&store, &cfg, Some(Command::List {
        filter: Some("completed".parse().expect("filter")),
    }))
    .await
    .expect("explicit filter wins");

    assert_eq!(store.snapshot(DEFAULT_TASKS_KEY), None);
}

#[tokio::test]
async fn delete_of_unknown_id_writes_nothing() {
    let store = Arc::new(MemoryStore::new());
    let cfg = plain_config();
    run(&store, &cfg, Some(add("keep", None))).await.expect("add");
    let before = store.snapshot(DEFAULT_TASKS_KEY);

    run(&store, &cfg, Some(Command::Delete { id: "nope".to_string() }))
        .await
        .expect("delete is a no-op");
    assert_eq!(store.snapshot(DEFAULT_TASKS_KEY), before);

    let id = first_id(&store);
    run(&store, &cfg, Some(Command::Delete { id })).await.expect("delete");
    assert_eq!(stored(&store), serde_json::json!([]));
}

#[tokio::test]
async fn profile_views_read_without_writing() {
    let store = Arc::new(MemoryStore::new());
    let cfg = plain_config();
    run(&store, &cfg, Some(add("a", None))).await.expect("add");
    let id = first_id(&store);
    run(&store, &cfg, Some(Command::Toggle { id })).await.expect("toggle");
    run(&store, &cfg, Some(Command::Name { name: " Ada ".to_string() }))
        .await
        .expect("name");
    assert_eq!(store.snapshot(DEFAULT_USERNAME_KEY).as_deref(), Some("Ada"));

    let before = store.snapshot(DEFAULT_TASKS_KEY);
    run(&store, &cfg, Some(Command::Profile { completed: true }))
        .await
        .expect("profile completed");
    run(&store, &cfg, Some(Command::Profile { completed: false }))
        .await
        .expect("profile current");
    assert_eq!(store.snapshot(DEFAULT_TASKS_KEY), before);
    assert_eq!(stored(&store)[0]["completed"], true);
}

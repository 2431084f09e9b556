// Integration tests for graph persistence and notification
//
// Tests cover:
// - JSON store persistence across reopen
// - Channel subscriptions as streams
// - Group discovery through search
// - Deletion events

use futures_util::StreamExt;
use graphkit::config::{AppConfig, StorageBackend};
use graphkit::{Change, Entity, EventFilter, Graph, NodeKind, NodeQuery, Value, WatchFilter};
use std::collections::HashSet;
use tempfile::tempdir;

fn json_config(dir: &std::path::Path, name: &str) -> AppConfig {
    let mut config = AppConfig::in_memory(name);
    config.storage.backend = StorageBackend::Json;
    config.storage.data_dir = dir.to_path_buf();
    config
}

// ============ Persistence Tests ============

#[tokio::test]
async fn test_json_graph_survives_reopen() {
    let dir = tempdir().unwrap();
    let config = json_config(dir.path(), "library");

    let graph = Graph::open(&config).await.unwrap();
    let book = Entity::new(&graph, "Book").unwrap();
    book.set("title", "Dune").unwrap();
    book.set("pages", 412i64).unwrap();
    book.add_to_group("shelf").unwrap();
    graph.save().await.unwrap();

    // unsaved edits are not persisted
    book.set("title", "Draft").unwrap();
    drop(graph);

    let reopened = Graph::open(&config).await.unwrap();
    let loaded = reopened.entity(book.id()).unwrap();
    assert_eq!(loaded.get("title"), Some(Value::from("Dune")));
    assert_eq!(loaded.get("pages").and_then(|v| v.as_i64()), Some(412));
    assert!(loaded.member_of_group("shelf"));
    assert!(!reopened.has_changes());
}

#[tokio::test]
async fn test_json_graphs_are_isolated_by_name() {
    let dir = tempdir().unwrap();

    let a = Graph::open(&json_config(dir.path(), "a")).await.unwrap();
    Entity::new(&a, "T").unwrap();
    a.save().await.unwrap();

    let b = Graph::open(&json_config(dir.path(), "b")).await.unwrap();
    assert_eq!(b.summary().entities, 0);
}

// ============ Subscription Tests ============

#[tokio::test]
async fn test_subscription_stream_receives_filtered_events() {
    let graph = Graph::in_memory("stream");
    let subscription = graph.subscribe(
        EventFilter::new().entity(WatchFilter::new().types(["user:*"]).properties(["name"])),
    );
    let mut stream = subscription.into_stream();

    let admin = Entity::new(&graph, "user:admin").unwrap();
    admin.set("name", "ada").unwrap();
    admin.set("ignored", true).unwrap();
    Entity::new(&graph, "book").unwrap();
    graph.save().await.unwrap();

    let first = stream.next().await.unwrap();
    assert_eq!(first.node, NodeKind::Entity);
    assert_eq!(first.id, admin.id());
    assert_eq!(first.change, Change::Inserted);

    let second = stream.next().await.unwrap();
    assert_eq!(
        second.change,
        Change::PropertyInserted {
            key: "name".into(),
            value: Value::from("ada"),
        }
    );

    drop(graph);
    assert!(stream.next().await.is_none());
}

// ============ Group Tests ============

#[tokio::test]
async fn test_group_discovery() {
    let graph = Graph::in_memory("groups");
    let a = Entity::new(&graph, "User").unwrap();
    let b = Entity::new(&graph, "User").unwrap();
    let c = Entity::new(&graph, "User").unwrap();
    a.add_to_group("staff").unwrap();
    b.add_to_group("staff").unwrap();
    b.add_to_group("admin").unwrap();
    c.add_to_group("guests").unwrap();
    graph.save().await.unwrap();

    let staff: HashSet<Entity> = graph
        .search_for_entity(&NodeQuery::new().groups(["staff"]))
        .into_iter()
        .collect();
    assert_eq!(staff, HashSet::from([a.clone(), b.clone()]));

    let summary = graph.summary();
    assert_eq!(summary.groups.get("staff"), Some(&2));
    assert_eq!(summary.groups.get("admin"), Some(&1));

    b.remove_from_group("staff").unwrap();
    let staff = graph.search_for_entity(&NodeQuery::new().groups(["staff"]));
    assert_eq!(staff, vec![a]);
}

// ============ Deletion Tests ============

#[tokio::test]
async fn test_delete_emits_deletion_events() {
    let graph = Graph::in_memory("deletion");
    let n = Entity::new(&graph, "T").unwrap();
    n.set("p", "v").unwrap();
    n.add_to_group("g").unwrap();
    graph.save().await.unwrap();

    let mut subscription = graph.subscribe(EventFilter::all());
    n.delete().unwrap();
    graph.save().await.unwrap();

    let changes: Vec<Change> = subscription.drain().into_iter().map(|e| e.change).collect();
    assert_eq!(
        changes,
        vec![
            Change::Deleted,
            Change::GroupDeleted { group: "g".into() },
            Change::PropertyDeleted {
                key: "p".into(),
                old: Value::from("v"),
            },
        ]
    );
    assert!(graph.entity(n.id()).is_none());
}

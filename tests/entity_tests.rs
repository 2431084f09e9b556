// Integration tests for entities and actions
//
// Tests cover:
// - Entity creation, properties and groups through the public API
// - Save and insert notification through a delegate
// - Completion-style saves
// - Action links and the derived actions view

use graphkit::watch::WatchFilter;
use graphkit::{Action, Entity, Graph, GraphDelegate, NodeId, Value};
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

#[derive(Default)]
struct InsertCounter {
    entities: AtomicUsize,
    actions: AtomicUsize,
    groups: AtomicUsize,
    inserted_ids: Mutex<Vec<NodeId>>,
}

impl GraphDelegate for InsertCounter {
    fn graph_did_insert_entity(&self, _graph: &Graph, entity: &Entity) {
        self.entities.fetch_add(1, Ordering::SeqCst);
        self.inserted_ids.lock().push(entity.id());
    }

    fn graph_did_insert_entity_group(&self, _graph: &Graph, _entity: &Entity, _group: &str) {
        self.groups.fetch_add(1, Ordering::SeqCst);
    }

    fn graph_did_insert_action(&self, _graph: &Graph, _action: &Action) {
        self.actions.fetch_add(1, Ordering::SeqCst);
    }
}

// ============ Entity Tests ============

#[tokio::test]
async fn test_entity_insert_notifies_watcher_once() {
    let graph = Graph::in_memory("entity-insert");
    let counter = Arc::new(InsertCounter::default());
    graph.set_delegate(counter.clone());
    graph.watch_for_entity(WatchFilter::new().types(["T"]));

    let n = Entity::new(&graph, "T").unwrap();
    n.set("p", "v").unwrap();
    n.add_to_group("g").unwrap();

    assert_eq!(n.node_type().as_deref(), Some("T"));
    assert_eq!(n.get("p"), Some(Value::from("v")));
    assert!(n.member_of_group("g"));

    let report = graph.save().await.unwrap();
    assert!(report.persisted);
    assert_eq!(counter.entities.load(Ordering::SeqCst), 1);
    assert_eq!(*counter.inserted_ids.lock(), vec![n.id()]);
    // groups were not watched
    assert_eq!(counter.groups.load(Ordering::SeqCst), 0);

    // nothing new to report on a second save
    graph.save().await.unwrap();
    assert_eq!(counter.entities.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_save_with_completion() {
    let graph = Graph::in_memory("entity-save-with");
    let counter = Arc::new(InsertCounter::default());
    graph.set_delegate(counter.clone());
    graph.watch_for_entity(WatchFilter::new().types(["T"]).groups(["g"]));

    let n = Entity::new(&graph, "T").unwrap();
    n.add_to_group("g").unwrap();

    let (tx, rx) = tokio::sync::oneshot::channel();
    graph
        .save_with(move |success, error| {
            let _ = tx.send((success, error.map(|e| e.to_string())));
        })
        .unwrap();

    let (success, error) = rx.await.unwrap();
    assert!(success);
    assert_eq!(error, None);
    assert_eq!(counter.entities.load(Ordering::SeqCst), 1);
    assert_eq!(counter.groups.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_deleted_entity_handle_is_inert() {
    let graph = Graph::in_memory("entity-delete");
    let n = Entity::new(&graph, "T").unwrap();
    n.set("p", "v").unwrap();
    n.delete().unwrap();

    assert!(n.is_deleted());
    assert_eq!(n.node_type(), None);
    assert_eq!(n.get("p"), None);
    assert!(n.set("p", "w").is_err());
    assert!(n.delete().is_err());
}

// ============ Action Tests ============

#[tokio::test]
async fn test_action_links_are_visible_from_entities() {
    let graph = Graph::in_memory("action-links");
    let counter = Arc::new(InsertCounter::default());
    graph.set_delegate(counter.clone());
    graph.watch_for_action(WatchFilter::new().types(["Read"]));

    let reader = Entity::new(&graph, "User").unwrap();
    let book = Entity::new(&graph, "Book").unwrap();
    let read = Action::new(&graph, "Read").unwrap();

    assert!(read.add_subject(&reader).unwrap());
    assert!(read.add_object(&book).unwrap());
    assert!(!read.add_subject(&reader).unwrap());

    assert_eq!(read.subjects(), vec![reader.clone()]);
    assert_eq!(read.objects(), vec![book.clone()]);
    assert_eq!(reader.actions_as_subject(), vec![read.clone()]);
    assert!(reader.actions_as_object().is_empty());
    assert_eq!(book.actions(), vec![read.clone()]);

    graph.save().await.unwrap();
    assert_eq!(counter.actions.load(Ordering::SeqCst), 1);
    assert_eq!(counter.entities.load(Ordering::SeqCst), 0);

    assert!(read.remove_object(&book).unwrap());
    assert!(book.actions().is_empty());
    assert!(graph.has_changes());
}

#[tokio::test]
async fn test_cross_graph_link_is_rejected() {
    let first = Graph::in_memory("first");
    let second = Graph::in_memory("second");
    let entity = Entity::new(&first, "T").unwrap();
    let action = Action::new(&second, "Read").unwrap();

    assert!(action.add_subject(&entity).is_err());
    assert!(entity.actions().is_empty());
}

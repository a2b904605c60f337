use rusqlite::Connection;
use timetree_core::db::open_db_in_memory;
use timetree_core::db::DbError;
use timetree_core::{Direction, GraphRepoError, GraphStore, SqliteGraphStore};
use uuid::Uuid;

fn setup() -> Connection {
    open_db_in_memory().unwrap()
}

#[test]
fn create_and_get_node_round_trip() {
    let conn = setup();
    let store = SqliteGraphStore::try_new(&conn).unwrap();

    let id = store.create_node("Day", Some(30)).unwrap();
    let node = store.get_node(id).unwrap().unwrap();
    assert_eq!(node.label, "Day");
    assert_eq!(node.unit_value, Some(30));

    assert!(store.get_node(Uuid::new_v4()).unwrap().is_none());
}

#[test]
fn find_nodes_by_label_filters_labels() {
    let conn = setup();
    let store = SqliteGraphStore::try_new(&conn).unwrap();

    let person = store.create_node("Person", None).unwrap();
    store.create_node("Email", None).unwrap();

    let people = store.find_nodes_by_label("Person").unwrap();
    assert_eq!(people.len(), 1);
    assert_eq!(people[0].id, person);
    assert!(store.find_nodes_by_label("Unknown").unwrap().is_empty());
}

#[test]
fn find_child_matches_label_and_unit_value() {
    let conn = setup();
    let store = SqliteGraphStore::try_new(&conn).unwrap();

    let month = store.create_node("Month", Some(7)).unwrap();
    let day_30 = store.create_node("Day", Some(30)).unwrap();
    let day_31 = store.create_node("Day", Some(31)).unwrap();
    store.create_edge(month, day_30, "CHILD").unwrap();
    store.create_edge(month, day_31, "CHILD").unwrap();
    // Not a CHILD edge, so never a match.
    let stray = store.create_node("Day", Some(1)).unwrap();
    store.create_edge(month, stray, "NEXT").unwrap();

    assert_eq!(
        store.find_child(month, "Day", 31).unwrap().map(|n| n.id),
        Some(day_31)
    );
    assert!(store.find_child(month, "Day", 1).unwrap().is_none());
    assert!(store.find_child(month, "Hour", 30).unwrap().is_none());
}

#[test]
fn edges_respect_direction_and_type() {
    let conn = setup();
    let store = SqliteGraphStore::try_new(&conn).unwrap();

    let instant = store.create_node("Day", Some(30)).unwrap();
    let email = store.create_node("Email", None).unwrap();
    let incoming = store.create_edge(email, instant, "SENT_ON").unwrap();
    let outgoing = store.create_edge(instant, email, "MENTIONS").unwrap();

    let ids = |direction: Direction, edge_type: Option<&str>| -> Vec<i64> {
        store
            .edges(instant, edge_type, direction)
            .unwrap()
            .into_iter()
            .map(|edge| edge.id)
            .collect()
    };
    assert_eq!(ids(Direction::Incoming, None), vec![incoming]);
    assert_eq!(ids(Direction::Outgoing, None), vec![outgoing]);
    assert_eq!(ids(Direction::Both, None), vec![incoming, outgoing]);
    assert_eq!(ids(Direction::Both, Some("MENTIONS")), vec![outgoing]);
    assert!(ids(Direction::Incoming, Some("MENTIONS")).is_empty());

    let edge = store
        .single_edge(instant, "SENT_ON", Direction::Incoming)
        .unwrap()
        .unwrap();
    assert_eq!(edge.other(instant), email);
    assert_eq!(edge.direction_from(instant), Direction::Incoming);
}

#[test]
fn parallel_edges_are_kept() {
    let conn = setup();
    let store = SqliteGraphStore::try_new(&conn).unwrap();

    let a = store.create_node("A", None).unwrap();
    let b = store.create_node("B", None).unwrap();
    let first = store.create_edge(a, b, "SEEN").unwrap();
    let second = store.create_edge(a, b, "SEEN").unwrap();

    assert_ne!(first, second);
    assert_eq!(store.edges(a, Some("SEEN"), Direction::Outgoing).unwrap().len(), 2);
}

#[test]
fn create_edge_requires_existing_nodes() {
    let conn = setup();
    let store = SqliteGraphStore::try_new(&conn).unwrap();

    let a = store.create_node("A", None).unwrap();
    let missing = Uuid::new_v4();
    let err = store.create_edge(a, missing, "SEEN").unwrap_err();
    assert!(matches!(err, GraphRepoError::NodeNotFound(id) if id == missing));
}

#[test]
fn delete_edge_removes_once() {
    let conn = setup();
    let store = SqliteGraphStore::try_new(&conn).unwrap();

    let a = store.create_node("A", None).unwrap();
    let b = store.create_node("B", None).unwrap();
    let edge = store.create_edge(a, b, "NEXT").unwrap();

    store.delete_edge(edge).unwrap();
    assert!(store.edges(a, None, Direction::Both).unwrap().is_empty());
    assert!(matches!(
        store.delete_edge(edge),
        Err(GraphRepoError::EdgeNotFound(id)) if id == edge
    ));
}

#[test]
fn try_new_rejects_unmigrated_connection() {
    let conn = Connection::open_in_memory().unwrap();
    let result = SqliteGraphStore::try_new(&conn);
    assert!(matches!(
        result,
        Err(GraphRepoError::Db(DbError::SchemaNotReady {
            actual_version: 0,
            ..
        }))
    ));
}

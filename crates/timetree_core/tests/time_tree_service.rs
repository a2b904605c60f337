use rusqlite::Connection;
use timetree_core::db::open_db_in_memory;
use timetree_core::{
    AttachEventRequest, Direction, EventError, EventQuery, GraphStore, InstantRequest,
    RangeRequest, Resolution, SqliteGraphStore, TimeTreeService, TimeTreeServiceError,
    TimeTreeSettings, TimezoneId, TreeError,
};
use uuid::Uuid;

const DAY_MS: i64 = 86_400_000;
// 2015-07-30T00:00:00Z
const JULY_30_MS: i64 = 1_438_214_400_000;

fn node_count(conn: &Connection) -> i64 {
    conn.query_row("SELECT COUNT(*) FROM graph_nodes;", [], |row| row.get(0))
        .unwrap()
}

fn create_entity(conn: &Connection, label: &str) -> Uuid {
    SqliteGraphStore::try_new(conn)
        .unwrap()
        .create_node(label, None)
        .unwrap()
}

#[test]
fn request_defaults_come_from_settings() {
    let conn = open_db_in_memory().unwrap();
    let settings = TimeTreeSettings {
        default_resolution: Resolution::Hour,
        default_timezone: TimezoneId::parse("Asia/Tokyo").unwrap(),
        ..TimeTreeSettings::default()
    };
    let service = TimeTreeService::new(&conn, settings);

    let node = service
        .get_or_create_instant(&InstantRequest::new(JULY_30_MS))
        .unwrap();
    let stored = SqliteGraphStore::try_new(&conn)
        .unwrap()
        .get_node(node)
        .unwrap()
        .unwrap();
    assert_eq!(stored.label, "Hour");
    // 00:00 UTC is 09:00 in Tokyo.
    assert_eq!(stored.unit_value, Some(9));
}

#[test]
fn read_requests_never_create_nodes() {
    let conn = open_db_in_memory().unwrap();
    let service = TimeTreeService::new(&conn, TimeTreeSettings::default());

    assert_eq!(service.get_instant(&InstantRequest::new(JULY_30_MS)).unwrap(), None);
    assert!(service
        .get_instants(&RangeRequest::new(JULY_30_MS, JULY_30_MS + DAY_MS))
        .unwrap()
        .is_empty());
    assert!(service.events(&EventQuery::at(JULY_30_MS)).unwrap().is_empty());
    assert_eq!(node_count(&conn), 0);
}

#[test]
fn range_requests_round_trip_through_service() {
    let conn = open_db_in_memory().unwrap();
    let service = TimeTreeService::new(&conn, TimeTreeSettings::default());
    let request = RangeRequest::new(JULY_30_MS, JULY_30_MS + 3 * DAY_MS);

    let created = service.get_or_create_instants(&request).unwrap();
    assert_eq!(created.len(), 4);
    assert_eq!(service.get_instants(&request).unwrap(), created);

    let reversed = RangeRequest::new(JULY_30_MS + DAY_MS, JULY_30_MS);
    assert!(matches!(
        service.get_instants(&reversed),
        Err(TimeTreeServiceError::Tree(TreeError::InvalidRange(_)))
    ));
}

#[test]
fn attach_event_defaults_to_incoming_and_is_queryable() {
    let conn = open_db_in_memory().unwrap();
    let service = TimeTreeService::new(&conn, TimeTreeSettings::default());
    let email = create_entity(&conn, "Email");

    let event = service
        .attach_event(&AttachEventRequest::new(email, "SENT_ON", JULY_30_MS))
        .unwrap();
    assert_eq!(event.direction, Direction::Incoming);
    assert_eq!(event.entity, email);

    let at = service.events(&EventQuery::at(JULY_30_MS + 1_000)).unwrap();
    assert_eq!(at, vec![event.clone()]);

    let mut outgoing_only = EventQuery::between(JULY_30_MS - DAY_MS, JULY_30_MS + DAY_MS);
    outgoing_only.direction = Some(Direction::Outgoing);
    assert!(service.events(&outgoing_only).unwrap().is_empty());
}

#[test]
fn attach_event_requires_entity() {
    let conn = open_db_in_memory().unwrap();
    let service = TimeTreeService::new(&conn, TimeTreeSettings::default());
    let mut request = AttachEventRequest::new(Uuid::new_v4(), "SEEN", JULY_30_MS);
    request.entity = None;

    assert!(matches!(
        service.attach_event(&request),
        Err(TimeTreeServiceError::Event(EventError::InvalidEntity(None)))
    ));
    assert_eq!(node_count(&conn), 0);
}

#[test]
fn failed_write_rolls_back_created_instants() {
    let conn = open_db_in_memory().unwrap();
    let service = TimeTreeService::new(&conn, TimeTreeSettings::default());
    let email = create_entity(&conn, "Email");
    let before = node_count(&conn);

    // The instant path is written before the event edge, which this trigger refuses.
    conn.execute_batch(
        "CREATE TEMP TRIGGER refuse_seen BEFORE INSERT ON graph_edges
         WHEN NEW.edge_type = 'SEEN'
         BEGIN SELECT RAISE(ABORT, 'refused'); END;",
    )
    .unwrap();
    let result = service.attach_event(&AttachEventRequest::new(email, "SEEN", JULY_30_MS));
    assert!(matches!(result, Err(TimeTreeServiceError::Event(EventError::Tree(_)))));

    assert_eq!(node_count(&conn), before);
    assert_eq!(service.get_instant(&InstantRequest::new(JULY_30_MS)).unwrap(), None);
}

#[test]
fn attach_event_rejects_both_direction() {
    let conn = open_db_in_memory().unwrap();
    let service = TimeTreeService::new(&conn, TimeTreeSettings::default());
    let email = create_entity(&conn, "Email");

    let mut request = AttachEventRequest::new(email, "SEEN", JULY_30_MS);
    request.direction = Some(Direction::Both);
    assert!(matches!(
        service.attach_event(&request),
        Err(TimeTreeServiceError::Event(EventError::InvalidDirection(
            Direction::Both
        )))
    ));
}

#[test]
fn explicit_root_requests_use_their_own_tree() {
    let conn = open_db_in_memory().unwrap();
    let service = TimeTreeService::new(&conn, TimeTreeSettings::default());
    let user_root = create_entity(&conn, "UserRoot");

    let mut scoped = InstantRequest::new(JULY_30_MS);
    scoped.spec.root = Some(user_root);
    let scoped_node = service.get_or_create_instant(&scoped).unwrap();

    assert_eq!(service.get_instant(&InstantRequest::new(JULY_30_MS)).unwrap(), None);
    assert_eq!(service.get_instant(&scoped).unwrap(), Some(scoped_node));

    let mut unknown = InstantRequest::new(JULY_30_MS);
    unknown.spec.root = Some(Uuid::new_v4());
    assert!(matches!(
        service.get_or_create_instant(&unknown),
        Err(TimeTreeServiceError::Tree(TreeError::RootNotFound(_)))
    ));
}

#[test]
fn requests_deserialize_from_json() {
    let conn = open_db_in_memory().unwrap();
    let service = TimeTreeService::new(&conn, TimeTreeSettings::default());

    let request: InstantRequest = serde_json::from_str(&format!(
        r#"{{"epoch_millis": {JULY_30_MS}, "resolution": "month"}}"#
    ))
    .unwrap();
    let node = service.get_or_create_instant(&request).unwrap();
    let stored = SqliteGraphStore::try_new(&conn)
        .unwrap()
        .get_node(node)
        .unwrap()
        .unwrap();
    assert_eq!(stored.label, "Month");
    assert_eq!(stored.unit_value, Some(7));

    let bad = serde_json::from_str::<InstantRequest>(r#"{"epoch_millis": 0, "timezone": "Mars/Base"}"#);
    assert!(bad.is_err());
}

use nodetree_core::db::{open_db, open_db_in_memory};
use nodetree_core::{
    MemoryRegistryFactory, Predicate, Record, Registry, RegistryError, RegistryFactory,
    RegistryPermission, SqliteRegistryFactory, NODES_COLLECTION, TEMPLATES_COLLECTION,
};
use rusqlite::Connection;
use serde_json::{json, Value};
use uuid::Uuid;

fn record(value: Value) -> Record {
    match value {
        Value::Object(map) => map,
        other => panic!("expected object, got {other}"),
    }
}

fn sqlite_factory() -> SqliteRegistryFactory {
    SqliteRegistryFactory::try_new(open_db_in_memory().unwrap()).unwrap()
}

fn check_crud_contract<F: RegistryFactory>(factory: &F) {
    let registry = factory.get(NODES_COLLECTION, RegistryPermission::ReadWrite);
    let id = Uuid::new_v4();

    assert!(registry.get(id).unwrap().is_none());
    registry
        .create(id, record(json!({"parent": null, "children": []})))
        .unwrap();
    assert!(matches!(
        registry.create(id, record(json!({}))).unwrap_err(),
        RegistryError::DuplicateId(dup) if dup == id
    ));

    let child = Uuid::new_v4();
    registry
        .update(id, record(json!({"children": [child]})))
        .unwrap();
    let stored = registry.get(id).unwrap().unwrap();
    assert_eq!(stored["parent"], Value::Null);
    assert_eq!(stored["children"], json!([child]));

    registry.delete(id).unwrap();
    assert!(registry.get(id).unwrap().is_none());

    let missing = Uuid::new_v4();
    assert!(matches!(
        registry.update(missing, record(json!({}))).unwrap_err(),
        RegistryError::NotFound(nf) if nf == missing
    ));
    assert!(matches!(
        registry.delete(missing).unwrap_err(),
        RegistryError::NotFound(nf) if nf == missing
    ));
}

fn check_read_contract<F: RegistryFactory>(factory: &F) {
    let registry = factory.get(TEMPLATES_COLLECTION, RegistryPermission::ReadWrite);
    let ids: Vec<Uuid> = (0..4).map(|_| Uuid::new_v4()).collect();
    for (index, id) in ids.iter().enumerate() {
        registry
            .create(*id, record(json!({"kind": if index % 2 == 0 { "even" } else { "odd" }})))
            .unwrap();
    }

    let all: Vec<Uuid> = registry
        .read(&Predicate::all())
        .unwrap()
        .into_iter()
        .map(|entry| entry.id)
        .collect();
    assert_eq!(all, ids);

    let odd: Vec<Uuid> = registry
        .read(&Predicate::all().field("kind", "odd"))
        .unwrap()
        .into_iter()
        .map(|entry| entry.id)
        .collect();
    assert_eq!(odd, vec![ids[1], ids[3]]);

    let by_id = registry.read(&Predicate::id(ids[2])).unwrap();
    assert_eq!(by_id.len(), 1);
    assert_eq!(by_id[0].record["kind"], "even");

    let none = registry
        .read(&Predicate::id(ids[2]).field("kind", "odd"))
        .unwrap();
    assert!(none.is_empty());
}

fn check_collections_are_isolated<F: RegistryFactory>(factory: &F) {
    let nodes = factory.get(NODES_COLLECTION, RegistryPermission::ReadWrite);
    let templates = factory.get(TEMPLATES_COLLECTION, RegistryPermission::ReadWrite);
    let id = Uuid::new_v4();

    nodes.create(id, record(json!({"side": "nodes"}))).unwrap();
    templates
        .create(id, record(json!({"side": "templates"})))
        .unwrap();

    assert_eq!(nodes.get(id).unwrap().unwrap()["side"], "nodes");
    assert_eq!(templates.get(id).unwrap().unwrap()["side"], "templates");
    assert_eq!(nodes.read(&Predicate::all()).unwrap().len(), 1);
}

fn check_read_only_handles<F: RegistryFactory>(factory: &F) {
    let writer = factory.get(NODES_COLLECTION, RegistryPermission::ReadWrite);
    let reader = factory.get(NODES_COLLECTION, RegistryPermission::ReadOnly);
    let id = Uuid::new_v4();
    writer.create(id, record(json!({"n": 1}))).unwrap();

    assert_eq!(reader.get(id).unwrap().unwrap()["n"], 1);
    assert!(matches!(
        reader.create(Uuid::new_v4(), record(json!({}))).unwrap_err(),
        RegistryError::PermissionDenied { operation: "create", .. }
    ));
    assert!(matches!(
        reader.update(id, record(json!({"n": 2}))).unwrap_err(),
        RegistryError::PermissionDenied { operation: "update", .. }
    ));
    assert!(matches!(
        reader.delete(id).unwrap_err(),
        RegistryError::PermissionDenied { operation: "delete", .. }
    ));
    assert_eq!(writer.get(id).unwrap().unwrap()["n"], 1);
}

#[test]
fn memory_registry_honours_crud_contract() {
    check_crud_contract(&MemoryRegistryFactory::new());
}

#[test]
fn sqlite_registry_honours_crud_contract() {
    check_crud_contract(&sqlite_factory());
}

#[test]
fn memory_registry_reads_in_insertion_order() {
    check_read_contract(&MemoryRegistryFactory::new());
}

#[test]
fn sqlite_registry_reads_in_insertion_order() {
    check_read_contract(&sqlite_factory());
}

#[test]
fn memory_collections_are_isolated() {
    check_collections_are_isolated(&MemoryRegistryFactory::new());
}

#[test]
fn sqlite_collections_are_isolated() {
    check_collections_are_isolated(&sqlite_factory());
}

#[test]
fn memory_read_only_handles_reject_writes() {
    check_read_only_handles(&MemoryRegistryFactory::new());
}

#[test]
fn sqlite_read_only_handles_reject_writes() {
    check_read_only_handles(&sqlite_factory());
}

#[test]
fn sqlite_records_survive_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nodetree.db");
    let id = Uuid::new_v4();

    {
        let factory = SqliteRegistryFactory::try_new(open_db(&path).unwrap()).unwrap();
        let registry = factory.get(NODES_COLLECTION, RegistryPermission::ReadWrite);
        registry
            .create(id, record(json!({"parent": null, "children": []})))
            .unwrap();
    }

    let factory = SqliteRegistryFactory::try_new(open_db(&path).unwrap()).unwrap();
    let registry = factory.get(NODES_COLLECTION, RegistryPermission::ReadOnly);
    let stored = registry.get(id).unwrap().unwrap();
    assert_eq!(stored["children"], json!([]));
}

#[test]
fn sqlite_factory_rejects_unmigrated_connection() {
    let conn = Connection::open_in_memory().unwrap();

    let err = SqliteRegistryFactory::try_new(conn).unwrap_err();
    assert!(matches!(
        err,
        RegistryError::UninitializedConnection {
            actual_version: 0,
            ..
        }
    ));
}

#[test]
fn sqlite_factory_rejects_missing_registry_table() {
    let conn = open_db_in_memory().unwrap();
    conn.execute_batch("DROP TABLE registry_records;").unwrap();

    let err = SqliteRegistryFactory::try_new(conn).unwrap_err();
    assert!(matches!(
        err,
        RegistryError::MissingRequiredTable("registry_records")
    ));
}

#[test]
fn sqlite_rejects_corrupt_body_on_read() {
    let conn = open_db_in_memory().unwrap();
    let id = Uuid::new_v4();
    conn.execute(
        "INSERT INTO registry_records (collection, record_id, body) VALUES (?1, ?2, ?3);",
        rusqlite::params![NODES_COLLECTION, id.to_string(), "[1, 2]"],
    )
    .unwrap();

    let factory = SqliteRegistryFactory::try_new(conn).unwrap();
    let registry = factory.get(NODES_COLLECTION, RegistryPermission::ReadOnly);
    assert!(matches!(
        registry.get(id).unwrap_err(),
        RegistryError::InvalidData(message) if message.contains("not a JSON object")
    ));
}

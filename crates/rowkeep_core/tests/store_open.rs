mod common;

use common::{count_rows, registry, Contact, Mail};
use rowkeep_core::db::version::SchemaAction;
use rowkeep_core::{
    DbError, FieldDescriptor, FieldType, RegistrationError, RowRepository, SchemaRegistry,
    SqliteRowRepository, Store, StoreConfig, StoreLocation, WriteMode,
};
use std::time::Duration;

fn file_config(path: &std::path::Path) -> StoreConfig {
    StoreConfig::file(path).manual_flush()
}

#[test]
fn file_store_keeps_rows_across_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("rows.db");

    let store = Store::open(file_config(&path), registry()).unwrap();
    assert_eq!(
        store.engine().schema_action(),
        SchemaAction::Created { version: 1 }
    );
    SqliteRowRepository::new(&store)
        .insert(&Contact::new("persisted"), WriteMode::Deferred)
        .unwrap();
    store.close();

    let reopened = Store::open(file_config(&path), registry()).unwrap();
    assert_eq!(
        reopened.engine().schema_action(),
        SchemaAction::Unchanged { version: 1 }
    );
    assert_eq!(count_rows(&reopened, "contact"), 1);
}

#[test]
fn version_bump_recreates_tables() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("rows.db");

    let store = Store::open(file_config(&path), registry()).unwrap();
    SqliteRowRepository::new(&store)
        .insert(&Mail::new("old", 1), WriteMode::Immediate)
        .unwrap();
    store.close();

    let upgraded = Store::open(file_config(&path).with_schema_version(2), registry()).unwrap();
    assert_eq!(
        upgraded.engine().schema_action(),
        SchemaAction::Recreated { from: 1, to: 2 }
    );
    assert_eq!(count_rows(&upgraded, "mail"), 0);
}

#[test]
fn newer_database_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("rows.db");
    Store::open(file_config(&path).with_schema_version(3), registry())
        .unwrap()
        .close();

    let err = Store::open(file_config(&path).with_schema_version(2), registry())
        .err()
        .expect("downgrade must fail");
    assert!(matches!(
        err,
        DbError::UnsupportedSchemaVersion {
            db_version: 3,
            latest_supported: 2
        }
    ));
}

#[test]
fn created_table_has_key_plus_persisted_columns() {
    let store = Store::open(StoreConfig::in_memory().manual_flush(), registry()).unwrap();
    let conn = store.engine().read_handle().unwrap();
    let mut stmt = conn.prepare("PRAGMA table_info(\"mail\")").unwrap();
    let columns: Vec<String> = stmt
        .query_map([], |row| row.get::<_, String>(1))
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap();

    assert_eq!(columns, ["id", "subject", "size", "read", "score"]);
}

#[test]
fn invalid_descriptors_fail_at_registration() {
    let mut registry = SchemaRegistry::new();

    let no_fields = registry.register_fields("empty", "empty", Vec::new());
    assert!(matches!(no_fields, Err(RegistrationError::NoFields { .. })));

    let no_key = registry.register_fields(
        "nokey",
        "nokey",
        vec![FieldDescriptor::column("name", FieldType::Text)],
    );
    assert!(matches!(
        no_key,
        Err(RegistrationError::MissingPrimaryKey { .. })
    ));

    let two_keys = registry.register_fields(
        "twokeys",
        "twokeys",
        vec![
            FieldDescriptor::primary_key("id"),
            FieldDescriptor::primary_key("other_id"),
        ],
    );
    assert!(matches!(
        two_keys,
        Err(RegistrationError::MultiplePrimaryKeys { count: 2, .. })
    ));

    assert!(registry.is_empty());
}

#[test]
fn unregistered_kind_is_reported() {
    let mut only_contacts = SchemaRegistry::new();
    only_contacts.register_entity::<Contact>().unwrap();
    let store = Store::open(StoreConfig::in_memory().manual_flush(), only_contacts).unwrap();

    let err = SqliteRowRepository::new(&store)
        .insert(&Mail::new("nowhere", 1), WriteMode::Immediate)
        .unwrap_err();
    assert!(matches!(err, rowkeep_core::RowError::UnregisteredKind("mail")));
}

#[test]
fn config_deserializes_with_defaults() {
    let config: StoreConfig = serde_json::from_str(
        r#"{"location":{"file":"/tmp/rows.db"},"schema_version":4,"flush_interval_ms":null}"#,
    )
    .unwrap();

    assert_eq!(config.location, StoreLocation::File("/tmp/rows.db".into()));
    assert_eq!(config.schema_version, 4);
    assert_eq!(config.flush_interval(), None);
    assert_eq!(config.busy_timeout(), Duration::from_secs(5));
    assert!(config.flush_on_close);

    let memory: StoreConfig = serde_json::from_str(r#"{"location":"memory"}"#).unwrap();
    assert_eq!(memory.flush_interval(), Some(Duration::from_secs(30)));
}

#[test]
fn invalid_config_is_rejected_before_opening() {
    let err = Store::open(StoreConfig::in_memory().with_schema_version(0), registry())
        .err()
        .expect("version 0 is invalid");
    assert!(matches!(err, DbError::InvalidConfig(_)));
}

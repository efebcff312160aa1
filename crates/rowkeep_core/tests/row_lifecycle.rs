mod common;

use common::{count_rows, open_store, Contact, Mail};
use rowkeep_core::{
    IgnoreItem, LoadError, RowEntity, RowError, RowRepository, SqliteRowRepository, StateError,
    WriteMode,
};
use std::sync::atomic::{AtomicUsize, Ordering};

#[test]
fn immediate_insert_assigns_id_before_returning() {
    let store = open_store();
    let repo = SqliteRowRepository::new(&store);
    let mail = Mail::new("hello", 120);

    let id = repo.insert(&mail, WriteMode::Immediate).unwrap().wait().unwrap();

    assert!(id > 0);
    assert_eq!(mail.id(), id);
    assert_eq!(count_rows(&store, "mail"), 1);
}

#[test]
fn deferred_insert_assigns_id_only_after_flush() {
    let store = open_store();
    let repo = SqliteRowRepository::new(&store);
    let mail = Mail::new("later", 8);

    let outcome = repo.insert(&mail, WriteMode::Deferred).unwrap();
    assert!(outcome.is_queued());
    assert!(mail.id() <= 0);
    assert!(mail.row_id().is_insert_pending());
    assert_eq!(count_rows(&store, "mail"), 0);

    let report = store.flush_now();
    assert!(report.is_clean());
    assert_eq!(report.inserted, 1);

    let id = outcome.wait().unwrap();
    assert!(id > 0);
    assert_eq!(mail.id(), id);
    assert!(!mail.row_id().is_insert_pending());
}

#[test]
fn deferred_ignore_item_loads_back_unchanged() {
    let store = open_store();
    let repo = SqliteRowRepository::new(&store);
    let item = IgnoreItem::new("com.mail", "Mail", "");

    let ticket = repo
        .insert(&item, WriteMode::Deferred)
        .unwrap()
        .into_ticket()
        .unwrap();
    store.flush_now();
    let id = ticket.wait().unwrap();

    let mut loaded = IgnoreItem::with_id(id);
    repo.load(&mut loaded).unwrap();
    assert_eq!(loaded.package_name, "com.mail");
    assert_eq!(loaded.app_name, "Mail");
    assert_eq!(loaded.description, "");
    assert_eq!(loaded.id(), id);
}

#[test]
fn every_field_type_survives_a_roundtrip_and_excluded_fields_are_skipped() {
    let store = open_store();
    let repo = SqliteRowRepository::new(&store);
    let mut mail = Mail::new("typed", 1 << 40);
    mail.read = true;
    mail.score = 0.75;
    mail.scratch = "not stored".to_string();
    repo.insert(&mail, WriteMode::Immediate).unwrap();

    let mut loaded = Mail::with_id(mail.id());
    repo.load(&mut loaded).unwrap();

    assert_eq!(loaded.subject, "typed");
    assert_eq!(loaded.size, 1 << 40);
    assert!(loaded.read);
    assert_eq!(loaded.score, 0.75);
    assert_eq!(loaded.scratch, "");
}

#[test]
fn insert_twice_is_a_state_error() {
    let store = open_store();
    let repo = SqliteRowRepository::new(&store);
    let mail = Mail::new("once", 1);
    repo.insert(&mail, WriteMode::Immediate).unwrap();

    let err = repo.insert(&mail, WriteMode::Immediate).unwrap_err();
    assert!(matches!(
        err,
        RowError::State(StateError::AlreadyPersisted { table: "mail", .. })
    ));
    assert_eq!(count_rows(&store, "mail"), 1);
}

#[test]
fn second_deferred_insert_while_pending_is_rejected() {
    let store = open_store();
    let repo = SqliteRowRepository::new(&store);
    let mail = Mail::new("pending", 1);
    repo.insert(&mail, WriteMode::Deferred).unwrap();

    let err = repo.insert(&mail, WriteMode::Deferred).unwrap_err();
    assert!(matches!(
        err,
        RowError::State(StateError::InsertPending { table: "mail" })
    ));
    assert_eq!(store.queue().pending().inserts, 1);
}

#[test]
fn pending_insert_keeps_its_identity_through_load_matching() {
    let store = open_store();
    let repo = SqliteRowRepository::new(&store);
    let existing = IgnoreItem::new("android", "a", "");
    repo.insert(&existing, WriteMode::Immediate).unwrap();
    let mut queued = IgnoreItem::new("android", "b", "");
    repo.insert(&queued, WriteMode::Deferred).unwrap();

    let err = repo
        .load_matching(&mut queued, &[IgnoreItem::PACKAGE_NAME])
        .unwrap_err();
    assert!(matches!(
        err,
        RowError::State(StateError::InsertPending {
            table: "ignoreitem"
        })
    ));
    let err = repo.load(&mut queued).unwrap_err();
    assert!(matches!(
        err,
        RowError::State(StateError::InsertPending { .. })
    ));
    assert_eq!(queued.id(), 0);

    assert!(store.flush_now().is_clean());
    assert!(queued.id() > existing.id());
    assert_eq!(queued.app_name, "b");

    let mut reloaded = IgnoreItem::with_id(queued.id());
    repo.load(&mut reloaded).unwrap();
    assert_eq!(reloaded.app_name, "b");
}

#[test]
fn racing_inserts_of_one_handle_write_a_single_row() {
    for _ in 0..20 {
        let store = open_store();
        let repo = SqliteRowRepository::new(&store);
        let contact = Contact::new("shared");
        let accepted = AtomicUsize::new(0);

        std::thread::scope(|scope| {
            for mode in [
                WriteMode::Immediate,
                WriteMode::Deferred,
                WriteMode::Immediate,
                WriteMode::Deferred,
            ] {
                let (repo, contact, accepted) = (&repo, &contact, &accepted);
                scope.spawn(move || {
                    if repo.insert(contact, mode).is_ok() {
                        accepted.fetch_add(1, Ordering::SeqCst);
                    }
                });
            }
        });
        store.flush_now();

        assert_eq!(accepted.load(Ordering::SeqCst), 1);
        assert_eq!(count_rows(&store, "contact"), 1);
        assert!(contact.id() > 0);
    }
}

#[test]
fn transient_entity_rejects_update_delete_and_load_without_side_effects() {
    let store = open_store();
    let repo = SqliteRowRepository::new(&store);
    let mut mail = Mail::new("ghost", 0);

    for mode in [WriteMode::Immediate, WriteMode::Deferred] {
        let update = repo.update(&mail, mode).unwrap_err();
        assert!(matches!(
            update,
            RowError::State(StateError::NotPersisted { operation: "update", .. })
        ));
        let delete = repo.delete(&mail, mode).unwrap_err();
        assert!(matches!(
            delete,
            RowError::State(StateError::NotPersisted { operation: "delete", .. })
        ));
    }
    let load = repo.load(&mut mail).unwrap_err();
    assert!(matches!(
        load,
        RowError::State(StateError::NotPersisted { operation: "load", .. })
    ));

    assert_eq!(store.queue().pending().total(), 0);
    assert_eq!(count_rows(&store, "mail"), 0);
}

#[test]
fn update_writes_current_fields() {
    let store = open_store();
    let repo = SqliteRowRepository::new(&store);
    let mut mail = Mail::new("draft", 10);
    repo.insert(&mail, WriteMode::Immediate).unwrap();

    mail.subject = "final".to_string();
    repo.update(&mail, WriteMode::Immediate).unwrap();

    let mut loaded = Mail::with_id(mail.id());
    repo.load(&mut loaded).unwrap();
    assert_eq!(loaded.subject, "final");
}

#[test]
fn delete_removes_row_and_retires_handle() {
    let store = open_store();
    let repo = SqliteRowRepository::new(&store);
    let mail = Mail::new("bye", 3);
    repo.insert(&mail, WriteMode::Immediate).unwrap();

    repo.delete(&mail, WriteMode::Immediate).unwrap();
    assert_eq!(count_rows(&store, "mail"), 0);
    assert!(mail.row_id().is_deleted());

    let err = repo.update(&mail, WriteMode::Immediate).unwrap_err();
    assert!(matches!(err, RowError::State(StateError::Deleted { .. })));
}

#[test]
fn load_of_missing_row_is_not_found() {
    let store = open_store();
    let repo = SqliteRowRepository::new(&store);
    let mut item = IgnoreItem::with_id(404);

    let err = repo.load(&mut item).unwrap_err();
    assert!(matches!(
        err,
        RowError::Load(LoadError::NotFound { table: "ignoreitem", .. })
    ));
}

#[test]
fn load_matching_adopts_single_match() {
    let store = open_store();
    let repo = SqliteRowRepository::new(&store);
    let stored = IgnoreItem::new("com.chat", "Chat", "noisy");
    repo.insert(&stored, WriteMode::Immediate).unwrap();

    let mut probe = IgnoreItem::new("com.chat", "", "");
    repo.load_matching(&mut probe, &[IgnoreItem::PACKAGE_NAME])
        .unwrap();

    assert_eq!(probe.id(), stored.id());
    assert_eq!(probe.app_name, "Chat");
    assert_eq!(probe.description, "noisy");
}

#[test]
fn load_matching_two_rows_is_ambiguous_with_count() {
    let store = open_store();
    let repo = SqliteRowRepository::new(&store);
    repo.insert(&IgnoreItem::new("android", "System-UI", ""), WriteMode::Immediate)
        .unwrap();
    repo.insert(&IgnoreItem::new("android", "Google Search", ""), WriteMode::Immediate)
        .unwrap();

    let mut probe = IgnoreItem::new("android", "", "");
    let err = repo
        .load_matching(&mut probe, &[IgnoreItem::PACKAGE_NAME])
        .unwrap_err();

    assert!(matches!(
        err,
        RowError::Load(LoadError::Ambiguous {
            table: "ignoreitem",
            matches: 2
        })
    ));
    assert_eq!(probe.id(), 0);
}

#[test]
fn load_matching_rejects_unknown_and_empty_columns() {
    let store = open_store();
    let repo = SqliteRowRepository::new(&store);
    let mut probe = IgnoreItem::new("android", "", "");

    let unknown = repo.load_matching(&mut probe, &["color"]).unwrap_err();
    assert!(matches!(unknown, RowError::UnknownColumn { .. }));

    let empty = repo.load_matching(&mut probe, &[]).unwrap_err();
    assert!(matches!(empty, RowError::EmptyMatchColumns { .. }));
}

#[test]
fn exists_in_database_by_columns_adopts_id() {
    let store = open_store();
    let repo = SqliteRowRepository::new(&store);
    let stored = IgnoreItem::new("com.game", "Game", "");
    repo.insert(&stored, WriteMode::Immediate).unwrap();

    let probe = IgnoreItem::new("com.game", "Game", "other text");
    let found = repo
        .exists_in_database(&probe, &[IgnoreItem::PACKAGE_NAME, IgnoreItem::APP_NAME])
        .unwrap();
    assert!(found);
    assert_eq!(probe.id(), stored.id());

    let missing = IgnoreItem::new("com.game", "Other", "");
    assert!(!repo
        .exists_in_database(&missing, &[IgnoreItem::APP_NAME])
        .unwrap());
    assert_eq!(missing.id(), 0);
}

#[test]
fn exists_in_database_without_columns_compares_every_field() {
    let store = open_store();
    let repo = SqliteRowRepository::new(&store);
    repo.insert(&IgnoreItem::new("a", "b", "c"), WriteMode::Immediate)
        .unwrap();

    assert!(repo
        .exists_in_database(&IgnoreItem::new("a", "b", "c"), &[])
        .unwrap());
    assert!(!repo
        .exists_in_database(&IgnoreItem::new("a", "b", "d"), &[])
        .unwrap());
}

#[test]
fn exists_in_database_by_id() {
    let store = open_store();
    let repo = SqliteRowRepository::new(&store);
    let stored = IgnoreItem::new("x", "y", "z");
    repo.insert(&stored, WriteMode::Immediate).unwrap();

    assert!(repo
        .exists_in_database(&IgnoreItem::with_id(stored.id()), &[])
        .unwrap());
    assert!(!repo
        .exists_in_database(&IgnoreItem::with_id(stored.id() + 1), &[])
        .unwrap());
}

#[test]
fn match_values_are_bound_not_spliced() {
    let store = open_store();
    let repo = SqliteRowRepository::new(&store);
    let hostile = IgnoreItem::new("x' OR '1'='1", "app", "");
    repo.insert(&IgnoreItem::new("safe", "app", ""), WriteMode::Immediate)
        .unwrap();

    assert!(!repo
        .exists_in_database(&hostile, &[IgnoreItem::PACKAGE_NAME])
        .unwrap());
    repo.insert(&hostile, WriteMode::Immediate).unwrap();

    let mut probe = IgnoreItem::new("x' OR '1'='1", "", "");
    repo.load_matching(&mut probe, &[IgnoreItem::PACKAGE_NAME])
        .unwrap();
    assert_eq!(probe.id(), hostile.id());
}

#[test]
fn list_all_returns_rows_ordered_by_id() {
    let store = open_store();
    let repo = SqliteRowRepository::new(&store);
    for name in ["first", "second", "third"] {
        repo.insert(&IgnoreItem::new(name, name, ""), WriteMode::Immediate)
            .unwrap();
    }

    let items = repo.list_all::<IgnoreItem>().unwrap();
    let names: Vec<&str> = items.iter().map(|item| item.package_name.as_str()).collect();
    assert_eq!(names, ["first", "second", "third"]);
    assert!(items.windows(2).all(|pair| pair[0].id() < pair[1].id()));
}

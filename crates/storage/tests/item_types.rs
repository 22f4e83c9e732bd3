#![forbid(unsafe_code)]

use rr_core::{EntityKind, JsonMap, document_from_value};
use rr_storage::{
    ItemTypeNames, ItemTypeRequest, ItemTypes, SiteLicenseFlags, SqliteStore, StoreError,
    UnitOfWork,
};
use serde_json::{Value as JsonValue, json};
use tempfile::TempDir;

fn open_store() -> (TempDir, SqliteStore) {
    let dir = TempDir::new().expect("create temp dir");
    let store = SqliteStore::open(dir.path()).expect("open store");
    (dir, store)
}

fn doc(value: JsonValue) -> JsonMap {
    document_from_value(value).expect("object document")
}

fn render(fields: &[&str]) -> JsonValue {
    let meta_list: serde_json::Map<String, JsonValue> = fields
        .iter()
        .map(|field| {
            (
                field.to_string(),
                json!({"input_type": "text", "option": {"multiple": false}}),
            )
        })
        .collect();
    json!({"meta_fix": {"pubdate": {}}, "meta_list": meta_list})
}

fn version_rows(uow: &UnitOfWork<'_>, id: i64) -> i64 {
    uow.conn()
        .query_row(
            "SELECT COUNT(*) FROM record_versions WHERE entity=?1 AND record_id=?2",
            rusqlite::params![EntityKind::ItemType.as_str(), id.to_string()],
            |row| row.get(0),
        )
        .expect("count versions")
}

fn request(name: &str, fields: &[&str]) -> ItemTypeRequest {
    ItemTypeRequest::new(name, doc(json!({"type": "object", "properties": {}})))
        .with_form(json!([{"key": "pubdate"}]))
        .with_render(render(fields))
}

#[test]
fn create_registers_name_and_first_tag() {
    let (_dir, mut store) = open_store();
    let mut uow = store.begin().expect("begin");

    let record = ItemTypes::create(&mut uow, None, request("Journal Article", &["item_1"]))
        .expect("create item type");
    let model = record.model().expect("bound").clone();
    assert_eq!(model.tag, 1);
    assert!(!model.harvesting_type);

    let names = ItemTypes::get_latest(&uow, false).expect("latest");
    assert_eq!(names.len(), 1);
    assert_eq!(names[0].id, model.name_id);
    assert_eq!(names[0].name, "Journal Article");
    assert!(names[0].has_site_license);

    match ItemTypes::create(&mut uow, None, request("  ", &[])).expect_err("empty name") {
        StoreError::InvalidInput(_) => {}
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn create_with_an_existing_name_reuses_the_name_row() {
    let (_dir, mut store) = open_store();
    let mut uow = store.begin().expect("begin");

    let first = ItemTypes::create(&mut uow, None, request("Dataset", &["item_1"])).expect("create");
    let second = ItemTypes::create(&mut uow, None, request("Dataset", &["item_2"])).expect("create");
    let first = first.model().expect("bound").clone();
    let second = second.model().expect("bound").clone();

    assert_eq!(second.name_id, first.name_id);
    assert_eq!((first.tag, second.tag), (1, 2));

    let names = ItemTypes::get_latest(&uow, true).expect("latest");
    assert_eq!(names.len(), 1);
    assert_eq!(names[0].name, "Dataset");
    assert_eq!(
        ItemTypes::get_by_name_id(&uow, first.name_id, false)
            .expect("by name")
            .len(),
        2
    );

    // An inactive name is not picked up.
    let mut name = ItemTypeNames::get_record(&uow, first.name_id, false)
        .expect("lookup")
        .expect("name row");
    name.delete(&mut uow, false).expect("deactivate");
    let third = ItemTypes::create(&mut uow, None, request("Dataset", &["item_1"])).expect("create");
    let third = third.model().expect("bound").clone();
    assert_ne!(third.name_id, first.name_id);
    assert_eq!(third.tag, 1);
}

#[test]
fn compatible_update_happens_in_place() {
    let (_dir, mut store) = open_store();
    let mut uow = store.begin().expect("begin");

    let created =
        ItemTypes::create(&mut uow, None, request("Thesis", &["item_1"])).expect("create");
    let id = *created.id().expect("id");

    let mut relabeled = request("Thesis", &["item_1"]);
    relabeled.schema = doc(json!({"type": "object", "properties": {"title": {"type": "string"}}}));
    relabeled.form = Some(json!([{"key": "title"}]));
    let updated = ItemTypes::update(&mut uow, id, relabeled).expect("update");

    assert_eq!(updated.id(), Some(&id));
    assert_eq!(updated.revision_id(), Some(1));
    let model = ItemTypes::get_by_id(&uow, id, false)
        .expect("lookup")
        .expect("row");
    assert_eq!(model.tag, 1);
    assert_eq!(model.form, Some(json!([{"key": "title"}])));
    assert!(model.schema["properties"].get("title").is_some());
    assert_eq!(ItemTypes::get_all(&uow, false).expect("all").len(), 1);
}

#[test]
fn structural_render_change_forks_a_new_tag() {
    let (_dir, mut store) = open_store();
    let mut uow = store.begin().expect("begin");

    let created =
        ItemTypes::create(&mut uow, None, request("Dataset", &["item_1"])).expect("create");
    let first = created.model().expect("bound").clone();

    let forked = ItemTypes::update(&mut uow, first.id, request("Dataset", &["item_1", "item_2"]))
        .expect("fork");
    let second = forked.model().expect("bound").clone();

    assert_ne!(second.id, first.id);
    assert_eq!(second.name_id, first.name_id);
    assert_eq!(second.tag, 2);
    assert_eq!(forked.revision_id(), Some(0));

    let tags: Vec<i64> = ItemTypes::get_by_name_id(&uow, first.name_id, false)
        .expect("by name")
        .into_iter()
        .map(|model| model.tag)
        .collect();
    assert_eq!(tags, vec![2, 1]);

    let untouched = ItemTypes::get_by_id(&uow, first.id, true)
        .expect("lookup")
        .expect("tag 1 row");
    assert_eq!(untouched.tag, 1);
    assert!(!untouched.is_deleted);
    assert_eq!(untouched.schema, first.schema);
    assert_eq!(untouched.form, first.form);
    assert_eq!(untouched.render, Some(render(&["item_1"])));
    assert_eq!(untouched.meta.version_id, first.meta.version_id);
    assert_eq!(version_rows(&uow, first.id), 1);
}

#[test]
fn custom_upgrade_check_is_consulted() {
    let dir = TempDir::new().expect("create temp dir");
    let mut store = SqliteStore::open(dir.path())
        .expect("open store")
        .with_upgrade_check(|_old: Option<&JsonValue>, _new: Option<&JsonValue>| -> bool { true });
    let mut uow = store.begin().expect("begin");

    let created =
        ItemTypes::create(&mut uow, None, request("Report", &["item_1"])).expect("create");
    let id = *created.id().expect("id");
    let forked = ItemTypes::update(&mut uow, id, request("Report", &["item_1"])).expect("update");
    assert_ne!(forked.id(), Some(&id));
}

#[test]
fn rename_forks_and_rejects_duplicates() {
    let (_dir, mut store) = open_store();
    let mut uow = store.begin().expect("begin");

    let article = ItemTypes::create(&mut uow, None, request("Article", &["item_1"])).expect("create");
    ItemTypes::create(&mut uow, None, request("Book", &["item_1"])).expect("create");
    let article_id = *article.id().expect("id");
    let name_id = article.model().expect("bound").name_id;

    let rows_before = ItemTypes::get_all(&uow, true).expect("all").len();
    let names_before = ItemTypes::get_latest(&uow, true).expect("names");

    let err = ItemTypes::update(&mut uow, article_id, request("Book", &["item_1"]))
        .expect_err("duplicate name");
    assert_eq!(err.user_message(), "invalid name");
    match err {
        StoreError::InvalidName { name } => assert_eq!(name, "Book"),
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(ItemTypes::get_all(&uow, true).expect("all").len(), rows_before);
    assert_eq!(ItemTypes::get_latest(&uow, true).expect("names"), names_before);

    let renamed = ItemTypes::update(&mut uow, article_id, request("Journal Article", &["item_1"]))
        .expect("rename");
    assert_eq!(renamed.model().expect("bound").tag, 2);
    let name = ItemTypeNames::get_record(&uow, name_id, false)
        .expect("lookup")
        .expect("name row");
    assert_eq!(name.name, "Journal Article");
}

#[test]
fn update_rejects_unknown_ids_and_creates_for_zero() {
    let (_dir, mut store) = open_store();
    let mut uow = store.begin().expect("begin");

    let err = ItemTypes::update(&mut uow, 404, request("Ghost", &[])).expect_err("unknown id");
    assert_eq!(err.user_message(), "invalid id");
    match err {
        StoreError::InvalidId { id } => assert_eq!(id, 404),
        other => panic!("unexpected error: {other:?}"),
    }

    let created = ItemTypes::update(&mut uow, 0, request("Fresh", &[])).expect("create via update");
    assert_eq!(created.model().expect("bound").tag, 1);
}

#[test]
fn soft_delete_hides_the_item_type_until_restored() {
    let (_dir, mut store) = open_store();
    let mut uow = store.begin().expect("begin");

    let mut record =
        ItemTypes::create(&mut uow, None, request("Poster", &["item_1"])).expect("create");
    let id = *record.id().expect("id");
    record.delete(&mut uow, false).expect("soft delete");

    assert!(ItemTypes::get_record(&uow, id, false).expect("lookup").is_none());
    let deleted = ItemTypes::get_record(&uow, id, true)
        .expect("lookup")
        .expect("deleted row");
    assert!(deleted.model().expect("bound").is_deleted);
    assert!(ItemTypes::get_latest(&uow, false).expect("latest").is_empty());
    assert_eq!(ItemTypes::get_latest(&uow, true).expect("latest").len(), 1);

    match ItemTypes::update(&mut uow, id, request("Poster", &["item_1"])).expect_err("deleted") {
        StoreError::InvalidId { .. } => {}
        other => panic!("unexpected error: {other:?}"),
    }

    record.restore(&mut uow).expect("restore");
    assert!(ItemTypes::get_record(&uow, id, false).expect("lookup").is_some());
}

#[test]
fn revert_restores_form_and_render() {
    let (_dir, mut store) = open_store();
    let mut uow = store.begin().expect("begin");

    let created =
        ItemTypes::create(&mut uow, None, request("Lecture", &["item_1"])).expect("create");
    let id = *created.id().expect("id");

    let mut edited = request("Lecture", &["item_1"]);
    edited.form = Some(json!([{"key": "changed"}]));
    let mut updated = ItemTypes::update(&mut uow, id, edited).expect("update");
    assert_eq!(
        updated.model().and_then(|model| model.form.clone()),
        Some(json!([{"key": "changed"}]))
    );

    updated.revert(&mut uow, 0).expect("revert");
    let model = ItemTypes::get_by_id(&uow, id, false)
        .expect("lookup")
        .expect("row");
    assert_eq!(model.form, Some(json!([{"key": "pubdate"}])));
    assert_eq!(model.render, Some(render(&["item_1"])));
    assert_eq!(model.meta.version_id, 3);
}

#[test]
fn harvesting_filter_and_name_records() {
    let (_dir, mut store) = open_store();
    let mut uow = store.begin().expect("begin");

    let mut harvested = request("OAI Import", &[]);
    harvested.harvesting_type = true;
    let harvested = ItemTypes::create(&mut uow, None, harvested).expect("create harvested");
    let local = ItemTypes::create(&mut uow, None, request("Local", &[])).expect("create local");
    let harvested_name = harvested.model().expect("bound").name_id;
    let local_name = local.model().expect("bound").name_id;

    let only_harvested =
        ItemTypes::get_latest_custom_harvesting(&uow, false, true).expect("harvesting");
    assert_eq!(
        only_harvested.iter().map(|name| name.id).collect::<Vec<_>>(),
        vec![harvested_name]
    );
    let only_local =
        ItemTypes::get_latest_custom_harvesting(&uow, false, false).expect("harvesting");
    assert_eq!(
        only_local.iter().map(|name| name.id).collect::<Vec<_>>(),
        vec![local_name]
    );

    let names = ItemTypeNames::get_all_by_id(&uow, &[local_name, harvested_name], false)
        .expect("names");
    assert_eq!(names.len(), 2);

    let records = ItemTypes::get_records_by_name_id(&uow, local_name, false).expect("records");
    assert_eq!(records.len(), 1);
    let records = ItemTypes::get_records(&uow, &[*local.id().expect("id")], false).expect("records");
    assert_eq!(records.len(), 1);
}

#[test]
fn name_delete_restore_and_site_license_flags() {
    let (_dir, mut store) = open_store();
    let mut uow = store.begin().expect("begin");

    let a = ItemTypes::create(&mut uow, None, request("A", &[])).expect("create");
    let b = ItemTypes::create(&mut uow, None, request("B", &[])).expect("create");
    let a_name = a.model().expect("bound").name_id;
    let b_name = b.model().expect("bound").name_id;

    let changed = ItemTypeNames::update_site_license(
        &mut uow,
        &SiteLicenseFlags {
            allow: vec![a_name],
            deny: vec![b_name],
        },
    )
    .expect("flags");
    assert_eq!(changed, 2);
    let b_row = ItemTypeNames::get_record(&uow, b_name, false)
        .expect("lookup")
        .expect("row");
    assert!(!b_row.has_site_license);

    let mut a_row = ItemTypeNames::get_record(&uow, a_name, false)
        .expect("lookup")
        .expect("row");
    a_row.delete(&mut uow, false).expect("deactivate");
    assert!(!a_row.is_active);
    assert!(
        ItemTypeNames::get_record(&uow, a_name, false)
            .expect("lookup")
            .is_none()
    );

    // Inactive names are skipped.
    let changed = ItemTypeNames::update_site_license(
        &mut uow,
        &SiteLicenseFlags {
            allow: Vec::new(),
            deny: vec![a_name],
        },
    )
    .expect("flags");
    assert_eq!(changed, 0);

    a_row.restore(&mut uow).expect("restore");
    assert!(
        ItemTypeNames::get_record(&uow, a_name, false)
            .expect("lookup")
            .is_some()
    );
}

#[test]
fn force_delete_removes_the_item_type_and_its_history() {
    let (_dir, mut store) = open_store();
    let mut uow = store.begin().expect("begin");

    let mut record =
        ItemTypes::create(&mut uow, None, request("Slides", &["item_1"])).expect("create");
    let id = *record.id().expect("id");
    let name_id = record.model().expect("bound").name_id;
    record.commit(&mut uow).expect("commit");
    assert_eq!(version_rows(&uow, id), 2);

    record.delete(&mut uow, true).expect("force delete");
    assert!(record.model().is_none());
    assert!(ItemTypes::get_by_id(&uow, id, true).expect("lookup").is_none());
    assert_eq!(version_rows(&uow, id), 0);

    // The name row stays.
    assert!(
        ItemTypeNames::get_record(&uow, name_id, true)
            .expect("lookup")
            .is_some()
    );
}

#[test]
fn force_deleting_a_name_removes_its_item_types() {
    let (_dir, mut store) = open_store();
    let mut uow = store.begin().expect("begin");

    let created = ItemTypes::create(&mut uow, None, request("Map", &["item_1"])).expect("create");
    let first = created.model().expect("bound").clone();
    let forked = ItemTypes::update(&mut uow, first.id, request("Map", &["item_1", "item_2"]))
        .expect("fork");
    let second_id = *forked.id().expect("id");
    let other = ItemTypes::create(&mut uow, None, request("Atlas", &[])).expect("create");
    let other_id = *other.id().expect("id");

    let mut name = ItemTypeNames::get_record(&uow, first.name_id, false)
        .expect("lookup")
        .expect("name row");
    name.delete(&mut uow, true).expect("force delete name");

    assert!(
        ItemTypeNames::get_record(&uow, first.name_id, true)
            .expect("lookup")
            .is_none()
    );
    assert!(
        ItemTypes::get_by_name_id(&uow, first.name_id, true)
            .expect("by name")
            .is_empty()
    );
    assert_eq!(version_rows(&uow, first.id), 0);
    assert_eq!(version_rows(&uow, second_id), 0);

    // Other families are untouched.
    assert!(ItemTypes::get_by_id(&uow, other_id, false).expect("lookup").is_some());
    assert_eq!(version_rows(&uow, other_id), 1);
    assert_eq!(ItemTypes::get_latest(&uow, true).expect("names").len(), 1);
}

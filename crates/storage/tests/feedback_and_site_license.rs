#![forbid(unsafe_code)]

use rr_core::{JsonMap, document_from_value};
use rr_storage::{
    FeedbackMailList, ItemTypeEditHistory, ItemTypeNames, ItemTypeRequest, ItemTypes,
    SiteLicense, SiteLicenseAddress, SiteLicenseFlags, SiteLicenseOrganization, SiteLicenseUpdate,
    SqliteStore,
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

fn octets(ip: &str) -> Vec<String> {
    ip.split('.').map(str::to_string).collect()
}

fn organization(name: &str, mail: Option<&str>, ranges: &[(&str, &str)]) -> SiteLicenseOrganization {
    SiteLicenseOrganization {
        organization_name: name.to_string(),
        receive_mail_flag: Some("T".to_string()),
        mail_address: mail.map(str::to_string),
        domain_name: Some(format!("{}.example.org", name.to_lowercase())),
        addresses: ranges
            .iter()
            .map(|(start, finish)| SiteLicenseAddress {
                start_ip_address: octets(start),
                finish_ip_address: octets(finish),
            })
            .collect(),
    }
}

#[test]
fn feedback_mail_list_upsert_read_delete() {
    let (_dir, mut store) = open_store();
    let mut uow = store.begin().expect("begin");

    assert!(FeedbackMailList::get_mail_list_by_item_id(&uow, "item-1").is_empty());

    let first = vec![json!({"email": "a@example.org", "author_id": "1"})];
    assert!(FeedbackMailList::update(&mut uow, "item-1", &first));
    assert_eq!(FeedbackMailList::get_mail_list_by_item_id(&uow, "item-1"), first);

    let second = vec![
        json!({"email": "b@example.org", "author_id": ""}),
        json!({"email": "c@example.org", "author_id": "7"}),
    ];
    assert!(FeedbackMailList::update(&mut uow, "item-1", &second));
    assert_eq!(FeedbackMailList::get_mail_list_by_item_id(&uow, "item-1"), second);

    assert!(FeedbackMailList::delete(&mut uow, "item-1"));
    assert!(FeedbackMailList::get_mail_list_by_item_id(&uow, "item-1").is_empty());
    assert!(FeedbackMailList::delete(&mut uow, "never-stored"));
}

#[test]
fn feedback_mail_list_reports_failures_as_false() {
    let (_dir, mut store) = open_store();
    let mut uow = store.begin().expect("begin");
    uow.conn()
        .execute_batch("DROP TABLE feedback_mail_lists;")
        .expect("drop table");

    assert!(!FeedbackMailList::update(&mut uow, "item-1", &[json!({"email": "x@example.org"})]));
    assert!(FeedbackMailList::get_mail_list_by_item_id(&uow, "item-1").is_empty());
}

#[test]
fn site_license_update_replaces_organizations() {
    let (_dir, mut store) = open_store();
    let mut uow = store.begin().expect("begin");

    let item_type = ItemTypes::create(
        &mut uow,
        None,
        ItemTypeRequest::new("Journal Article", doc(json!({"type": "object"}))),
    )
    .expect("create item type");
    let name_id = item_type.model().expect("bound").name_id;

    SiteLicense::update(
        &mut uow,
        &SiteLicenseUpdate {
            item_type: Some(SiteLicenseFlags {
                allow: Vec::new(),
                deny: vec![name_id],
            }),
            site_license: Some(vec![
                organization(
                    "Alpha",
                    Some("lib@alpha.example.org"),
                    &[("10.0.0.1", "10.0.0.255"), ("192.168.1.1", "192.168.1.9")],
                ),
                organization("Beta", None, &[]),
            ]),
        },
    )
    .expect("update site license");

    let name = ItemTypeNames::get_record(&uow, name_id, false)
        .expect("lookup")
        .expect("name");
    assert!(!name.has_site_license);

    let records = SiteLicense::get_records(&uow).expect("records");
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].organization_id, 1);
    assert_eq!(records[0].receive_mail_flag, "T");
    assert_eq!(records[0].addresses.len(), 2);
    assert_eq!(records[0].addresses[1].organization_no, 2);
    assert_eq!(records[0].addresses[1].start_ip_address, "192.168.1.1");
    assert_eq!(records[0].addresses[1].finish_ip_address, "192.168.1.9");
    assert_eq!(records[1].organization_id, 2);
    assert_eq!(records[1].receive_mail_flag, "F");
    assert_eq!(records[1].mail_address, None);

    // Flags only: organizations stay.
    SiteLicense::update(
        &mut uow,
        &SiteLicenseUpdate {
            item_type: Some(SiteLicenseFlags {
                allow: vec![name_id],
                deny: Vec::new(),
            }),
            site_license: None,
        },
    )
    .expect("update flags");
    assert_eq!(SiteLicense::get_records(&uow).expect("records").len(), 2);

    SiteLicense::update(
        &mut uow,
        &SiteLicenseUpdate {
            item_type: None,
            site_license: Some(vec![organization("Gamma", Some(""), &[("1.2.3.4", "1.2.3.4")])]),
        },
    )
    .expect("replace organizations");
    let records = SiteLicense::get_records(&uow).expect("records");
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].organization_id, 1);
    assert_eq!(records[0].organization_name, "Gamma");
    assert_eq!(records[0].receive_mail_flag, "F");
    assert_eq!(records[0].addresses.len(), 1);
}

#[test]
fn edit_history_writes_only_changed_notes() {
    let (_dir, mut store) = open_store();
    let mut uow = store.begin().expect("begin");

    let created = ItemTypeEditHistory::create_or_update(
        &mut uow,
        0,
        5,
        1,
        doc(json!({"summary": "added creator"})),
    )
    .expect("create entry");
    assert!(created.id > 0);

    let same = ItemTypeEditHistory::create_or_update(
        &mut uow,
        created.id,
        5,
        1,
        doc(json!({"summary": "added creator"})),
    )
    .expect("unchanged entry");
    assert_eq!(same, created);

    let changed = ItemTypeEditHistory::create_or_update(
        &mut uow,
        created.id,
        5,
        1,
        doc(json!({"summary": "added creator and title"})),
    )
    .expect("changed entry");
    assert_eq!(changed.id, created.id);
    assert_eq!(changed.notes["summary"], json!("added creator and title"));

    let latest = ItemTypeEditHistory::get_by_item_type_id(&uow, 5)
        .expect("lookup")
        .expect("entry");
    assert_eq!(latest.notes, changed.notes);
    assert!(
        ItemTypeEditHistory::get_by_item_type_id(&uow, 6)
            .expect("lookup")
            .is_none()
    );
}

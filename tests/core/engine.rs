use fabqc::core::catalog::TemplateCatalog;
use fabqc::core::error::QcError;
use fabqc::core::external::DirAttachmentStore;
use fabqc::core::instance::InstanceManager;
use fabqc::core::model::{
    ChecklistItemDefinition, ChecklistTemplate, InstanceStatus, ItemCode, ItemStatus, MediaKind,
    Phase, Principal,
};
use fabqc::core::repo::InstanceRepository;
use fabqc::core::sqlite_repo::SqliteStore;
use tempfile::tempdir;

fn def(code: &str, weight: u32, mandatory: bool) -> ChecklistItemDefinition {
    ChecklistItemDefinition {
        code: ItemCode::parse(code).unwrap(),
        title: format!("Check {}", code),
        acceptance_criteria: "Per drawing".to_string(),
        check_method: "Visual".to_string(),
        weight,
        mandatory,
        requires_photo: false,
        requires_value: false,
    }
}

fn seed(store: &SqliteStore) {
    store
        .upsert_phase(
            &Phase {
                id: "ph-weld".to_string(),
                name: "Welding".to_string(),
                order: 10,
            },
            "setup",
        )
        .unwrap();
    store
        .publish_template(
            &ChecklistTemplate {
                id: "tpl-weld".to_string(),
                name: "Weld checklist".to_string(),
                items: vec![
                    def("1.9", 2, true),
                    def("1.10", 2, true),
                    def("2.1", 4, false),
                ],
            },
            "setup",
        )
        .unwrap();
}

fn inspector() -> Principal {
    Principal::new("insp-1", "A. Inspector", "inspector")
}

fn reviewer() -> Principal {
    Principal::new("rev-1", "R. Reviewer", "qa_lead")
}

#[test]
fn test_full_lifecycle_over_sqlite() {
    let tmp = tempdir().unwrap();
    let store = SqliteStore::open(tmp.path()).unwrap();
    seed(&store);
    let attachments = DirAttachmentStore::new(tmp.path().join("attachments")).unwrap();
    let manager = InstanceManager::new(&store, &store, &store, &attachments);

    // 1. Instantiate: template snapshot, everything pending.
    let run = manager
        .instantiate(&inspector(), "proj-1", "ph-weld", "tpl-weld")
        .unwrap();
    assert_eq!(run.status, InstanceStatus::Draft);
    assert_eq!(run.items.len(), 3);

    // 2. Submit gate reports pending mandatory codes in natural order.
    match manager.submit(&inspector(), &run.id) {
        Err(QcError::MissingMandatoryItems(codes)) => {
            assert_eq!(codes, vec!["1.9", "1.10"]);
        }
        other => panic!("expected gate failure, got {:?}", other),
    }

    // 3. Resolve items; score tracks every edit.
    let ids: Vec<String> = run.items.iter().map(|i| i.id.clone()).collect();
    manager
        .set_item_result(&inspector(), &run.id, &ids[0], ItemStatus::Ok, None, None)
        .unwrap();
    manager
        .set_item_result(
            &inspector(),
            &run.id,
            &ids[1],
            ItemStatus::NotOk,
            Some("3mm"),
            Some("undercut"),
        )
        .unwrap();
    let scored = manager
        .set_item_result(&inspector(), &run.id, &ids[2], ItemStatus::Na, None, None)
        .unwrap();
    // weights 2/2 applicable, 2 passed -> 50.0
    assert_eq!(scored.score, 50.0);

    // 4. Sign submits atomically.
    let signed = manager
        .sign(&inspector(), &run.id, "inspector", b"signature-png")
        .unwrap();
    assert_eq!(signed.status, InstanceStatus::Submitted);
    assert!(signed.submitted_at.is_some());
    assert_eq!(signed.signatures.len(), 1);

    // 5. Approve is terminal; later mutations fail.
    manager
        .approve(&reviewer(), &run.id, Some("accepted with minor notes"))
        .unwrap();
    assert!(matches!(
        manager.set_item_result(&inspector(), &run.id, &ids[0], ItemStatus::Ok, None, None),
        Err(QcError::InstanceTerminal(_))
    ));
    assert!(matches!(
        manager.reject(&reviewer(), &run.id, "nope", false),
        Err(QcError::InstanceTerminal(_))
    ));

    // 6. Audit trail recorded every mutating op.
    let log = std::fs::read_to_string(tmp.path().join("inspection.events.jsonl")).unwrap();
    assert!(log.lines().count() >= 6);
    assert!(log.contains("instance.update"));
}

#[test]
fn test_rework_loop_then_final_rejection() {
    let tmp = tempdir().unwrap();
    let store = SqliteStore::open(tmp.path()).unwrap();
    seed(&store);
    let attachments = DirAttachmentStore::new(tmp.path().join("attachments")).unwrap();
    let manager = InstanceManager::new(&store, &store, &store, &attachments);

    let run = manager
        .instantiate(&inspector(), "proj-1", "ph-weld", "tpl-weld")
        .unwrap();
    let ids: Vec<String> = run.items.iter().map(|i| i.id.clone()).collect();
    for id in &ids {
        manager
            .set_item_result(&inspector(), &run.id, id, ItemStatus::Ok, None, None)
            .unwrap();
    }
    manager.submit(&inspector(), &run.id).unwrap();

    // Reopen for rework: behaves as a draft again.
    let reworked = manager
        .reject(&reviewer(), &run.id, "re-check seam 1.10", true)
        .unwrap();
    assert_eq!(reworked.status, InstanceStatus::NeedsRework);
    manager
        .set_item_result(&inspector(), &run.id, &ids[1], ItemStatus::NotOk, None, None)
        .unwrap();
    manager.submit(&inspector(), &run.id).unwrap();

    // Final rejection is terminal.
    let rejected = manager
        .reject(&reviewer(), &run.id, "out of tolerance", false)
        .unwrap();
    assert_eq!(rejected.status, InstanceStatus::Rejected);
    assert!(matches!(
        manager.submit(&inspector(), &run.id),
        Err(QcError::InstanceTerminal(_))
    ));
}

#[test]
fn test_attachments_over_sqlite() {
    let tmp = tempdir().unwrap();
    let store = SqliteStore::open(tmp.path()).unwrap();
    seed(&store);
    let attachments = DirAttachmentStore::new(tmp.path().join("attachments")).unwrap();
    let manager = InstanceManager::new(&store, &store, &store, &attachments);

    let run = manager
        .instantiate(&inspector(), "proj-1", "ph-weld", "tpl-weld")
        .unwrap();
    let item_id = run.items[0].id.clone();

    let att = manager
        .attach_file(
            &inspector(),
            &run.id,
            Some(&item_id),
            b"fake jpeg bytes",
            "seam.jpg",
            MediaKind::Photo,
        )
        .unwrap();
    assert!(std::path::Path::new(&att.storage_path).exists());

    let reloaded = store.get(&run.id).unwrap();
    assert_eq!(reloaded.item(&item_id).unwrap().attachments.len(), 1);

    manager.detach_file(&inspector(), &run.id, &att.id).unwrap();
    assert!(!std::path::Path::new(&att.storage_path).exists());
    let reloaded = store.get(&run.id).unwrap();
    assert!(reloaded.item(&item_id).unwrap().attachments.is_empty());
}

#[test]
fn test_stale_write_is_rejected_end_to_end() {
    let tmp = tempdir().unwrap();
    let store = SqliteStore::open(tmp.path()).unwrap();
    seed(&store);
    let attachments = DirAttachmentStore::new(tmp.path().join("attachments")).unwrap();
    let manager = InstanceManager::new(&store, &store, &store, &attachments);

    let run = manager
        .instantiate(&inspector(), "proj-1", "ph-weld", "tpl-weld")
        .unwrap();

    // Writer B read the instance before writer A's edit landed.
    let stale_copy = store.get(&run.id).unwrap();
    manager
        .set_comments(&inspector(), &run.id, "writer A")
        .unwrap();

    let mut stale = stale_copy;
    stale.comments = "writer B".to_string();
    assert!(matches!(
        store.update(&stale, "insp-2"),
        Err(QcError::ConcurrencyConflict(_))
    ));
    assert_eq!(store.get(&run.id).unwrap().comments, "writer A");
}

#[test]
fn test_unknown_template_and_phase_fail_not_found() {
    let tmp = tempdir().unwrap();
    let store = SqliteStore::open(tmp.path()).unwrap();
    seed(&store);
    let attachments = DirAttachmentStore::new(tmp.path().join("attachments")).unwrap();
    let manager = InstanceManager::new(&store, &store, &store, &attachments);

    assert!(matches!(
        manager.instantiate(&inspector(), "proj-1", "ph-weld", "tpl-ghost"),
        Err(QcError::NotFound(_))
    ));
    assert!(matches!(
        manager.instantiate(&inspector(), "proj-1", "ph-ghost", "tpl-weld"),
        Err(QcError::NotFound(_))
    ));
    assert!(matches!(
        store.get_template("tpl-ghost"),
        Err(QcError::NotFound(_))
    ));
}

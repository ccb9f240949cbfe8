use fabqc::core::external::{NullInsightProvider, StaticInsightProvider};
use fabqc::core::instance::InstanceManager;
use fabqc::core::external::DirAttachmentStore;
use fabqc::core::layout::{BlockKind, LayoutConfig, LayoutPlan};
use fabqc::core::model::{
    ChecklistItemDefinition, ChecklistTemplate, ItemCode, ItemStatus, Phase, Principal,
};
use fabqc::core::report::ReportCompiler;
use fabqc::core::sqlite_repo::SqliteStore;
use std::sync::Arc;
use std::time::Duration;
use tempfile::tempdir;

fn def(code: &str, weight: u32) -> ChecklistItemDefinition {
    ChecklistItemDefinition {
        code: ItemCode::parse(code).unwrap(),
        title: format!("Check {}", code),
        acceptance_criteria: "Per drawing".to_string(),
        check_method: "Visual".to_string(),
        weight,
        mandatory: false,
        requires_photo: false,
        requires_value: false,
    }
}

fn inspector() -> Principal {
    Principal::new("insp-1", "A. Inspector", "inspector")
}

struct World {
    store: SqliteStore,
    attachments: DirAttachmentStore,
    _tmp: tempfile::TempDir,
}

fn world() -> World {
    let tmp = tempdir().unwrap();
    let store = SqliteStore::open(tmp.path()).unwrap();
    for (id, name, order) in [("ph-weld", "Welding", 10), ("ph-paint", "Painting", 20)] {
        store
            .upsert_phase(
                &Phase {
                    id: id.to_string(),
                    name: name.to_string(),
                    order,
                },
                "setup",
            )
            .unwrap();
    }
    store
        .publish_template(
            &ChecklistTemplate {
                id: "tpl-1".to_string(),
                name: "Generic checklist".to_string(),
                items: vec![def("1.9", 1), def("1.10", 1), def("2.1", 1)],
            },
            "setup",
        )
        .unwrap();
    let attachments = DirAttachmentStore::new(tmp.path().join("attachments")).unwrap();
    World {
        store,
        attachments,
        _tmp: tmp,
    }
}

/// Creates a signed run with every item OK.
fn signed_run(w: &World, project: &str, phase: &str) -> String {
    let manager = InstanceManager::new(&w.store, &w.store, &w.store, &w.attachments);
    let run = manager
        .instantiate(&inspector(), project, phase, "tpl-1")
        .unwrap();
    let ids: Vec<String> = run.items.iter().map(|i| i.id.clone()).collect();
    for id in &ids {
        manager
            .set_item_result(&inspector(), &run.id, id, ItemStatus::Ok, None, None)
            .unwrap();
    }
    manager
        .sign(&inspector(), &run.id, "inspector", b"signature-png")
        .unwrap();
    run.id
}

fn blocks_of_kind(plan: &LayoutPlan, kind: BlockKind) -> Vec<&fabqc::core::layout::Block> {
    plan.pages
        .iter()
        .flat_map(|p| p.blocks.iter())
        .filter(|b| b.kind == kind)
        .collect()
}

#[test]
fn test_report_merges_reinspections_latest_wins() {
    let w = world();
    // Two runs against the same phase: the second submission is authoritative
    // metadata, but both item sets appear (audit history).
    signed_run(&w, "proj-1", "ph-weld");
    std::thread::sleep(Duration::from_millis(1100));
    signed_run(&w, "proj-1", "ph-weld");

    let compiler = ReportCompiler::new(
        &w.store,
        &w.store,
        Arc::new(NullInsightProvider),
        LayoutConfig::default(),
        Duration::from_millis(10),
    )
    .unwrap();
    let plan = compiler.compile("proj-1").unwrap();

    // 3 items per run, both runs retained.
    assert_eq!(blocks_of_kind(&plan, BlockKind::TableRow).len(), 6);
    // One signature card: same signer+role across runs de-duplicates.
    assert_eq!(blocks_of_kind(&plan, BlockKind::SignatureCard).len(), 1);
}

#[test]
fn test_report_compiles_all_phases_in_order() {
    let w = world();
    signed_run(&w, "proj-1", "ph-paint");
    signed_run(&w, "proj-1", "ph-weld");

    let compiler = ReportCompiler::new(
        &w.store,
        &w.store,
        Arc::new(NullInsightProvider),
        LayoutConfig::default(),
        Duration::from_millis(10),
    )
    .unwrap();
    let plan = compiler.compile("proj-1").unwrap();
    let headings: Vec<String> = blocks_of_kind(&plan, BlockKind::Heading)
        .iter()
        .map(|b| b.content.clone())
        .collect();
    let weld = headings.iter().position(|h| h.contains("Welding")).unwrap();
    let paint = headings.iter().position(|h| h.contains("Painting")).unwrap();
    assert!(weld < paint);
}

#[test]
fn test_analysis_text_spans_pages_without_losing_lines() {
    let w = world();
    signed_run(&w, "proj-1", "ph-weld");

    // Long analysis: must spill across page boundaries.
    let analysis: Vec<String> = (0..400)
        .map(|i| format!("finding{:03} recorded during inspection", i))
        .collect();
    let analysis = analysis.join(" ");

    let compiler = ReportCompiler::new(
        &w.store,
        &w.store,
        Arc::new(StaticInsightProvider::new(&analysis)),
        LayoutConfig::default(),
        Duration::from_millis(200),
    )
    .unwrap();
    let plan = compiler.compile("proj-1").unwrap();

    let boxes = blocks_of_kind(&plan, BlockKind::TextBox);
    assert!(boxes.len() > 1, "analysis should continue across pages");

    // Every word of the source text appears exactly once, in order.
    let emitted: Vec<String> = boxes
        .iter()
        .flat_map(|b| b.content.split_whitespace())
        .map(|w| w.to_string())
        .collect();
    let expected: Vec<String> = analysis.split_whitespace().map(|w| w.to_string()).collect();
    assert_eq!(emitted, expected);

    // Pages never overflow the configured box.
    let cfg = LayoutConfig::default();
    for page in &plan.pages {
        for block in &page.blocks {
            assert!(block.y >= cfg.margin_top - 1e-9);
            assert!(
                block.y + block.height <= cfg.page_height - cfg.margin_bottom + 1e-9,
                "block of kind {:?} overflows the page",
                block.kind
            );
        }
    }
}

#[test]
fn test_identical_inputs_compile_identical_plans() {
    let w = world();
    signed_run(&w, "proj-1", "ph-weld");

    let compiler = ReportCompiler::new(
        &w.store,
        &w.store,
        Arc::new(StaticInsightProvider::new("Stable analysis text.")),
        LayoutConfig::default(),
        Duration::from_millis(200),
    )
    .unwrap();
    let a = compiler.compile("proj-1").unwrap();
    let b = compiler.compile("proj-1").unwrap();
    assert_eq!(a, b);
}

#[test]
fn test_checklist_table_repeats_header_across_pages() {
    let w = world();
    // One run is enough; a tiny page forces the table to continue.
    signed_run(&w, "proj-1", "ph-weld");

    let mut cfg = LayoutConfig::default();
    cfg.page_height = 220.0;
    cfg.margin_top = 20.0;
    cfg.margin_bottom = 20.0;

    let compiler = ReportCompiler::new(
        &w.store,
        &w.store,
        Arc::new(NullInsightProvider),
        cfg,
        Duration::from_millis(10),
    )
    .unwrap();
    let plan = compiler.compile("proj-1").unwrap();

    let headers = blocks_of_kind(&plan, BlockKind::TableHeader);
    assert!(headers.len() >= 2, "header must repeat on continuation pages");
    assert_eq!(blocks_of_kind(&plan, BlockKind::TableRow).len(), 3);
}

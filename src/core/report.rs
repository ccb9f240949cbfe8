//! Report compilation: phase views + optional analysis + signatures in, one
//! deterministic `LayoutPlan` out.
//!
//! The only I/O on this path is the insight call, and it is bounded: the
//! provider runs on its own thread and the compiler waits at most the
//! configured timeout. Timeout or provider failure just drops the analysis
//! section; a degraded report always beats no report.

use crate::core::aggregate::{PhaseView, aggregate_phase, dedup_signatures};
use crate::core::error::QcError;
use crate::core::external::InsightProvider;
use crate::core::layout::{LayoutConfig, LayoutPlan, PageWriter};
use crate::core::model::{InspectionInstance, ItemStatus, Signature};
use crate::core::output;
use crate::core::repo::{InstanceRepository, PhaseRepository};
use rayon::prelude::*;
use rustc_hash::FxHashMap;
use serde_json::Value as JsonValue;
use std::sync::Arc;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

const COMMENT_PREVIEW_CHARS: usize = 120;

pub struct ReportCompiler<'a> {
    instances: &'a dyn InstanceRepository,
    phases: &'a dyn PhaseRepository,
    insight: Arc<dyn InsightProvider>,
    layout: LayoutConfig,
    insight_timeout: Duration,
}

impl<'a> ReportCompiler<'a> {
    pub fn new(
        instances: &'a dyn InstanceRepository,
        phases: &'a dyn PhaseRepository,
        insight: Arc<dyn InsightProvider>,
        layout: LayoutConfig,
        insight_timeout: Duration,
    ) -> Result<Self, QcError> {
        layout.validate()?;
        Ok(Self {
            instances,
            phases,
            insight,
            layout,
            insight_timeout,
        })
    }

    /// Sole report entry point: compiles every inspection recorded for the
    /// project into an ordered layout plan.
    pub fn compile(&self, project_id: &str) -> Result<LayoutPlan, QcError> {
        let views = self.phase_views(project_id)?;
        let payload = summary_payload(project_id, &views);
        let analysis = self.fetch_analysis(&payload);
        let signatures = dedup_signatures(views.iter().flat_map(|v| v.signatures.iter()));
        self.assemble(project_id, &views, analysis.as_deref(), &signatures)
    }

    /// Independent reports carry no shared mutable state; batch compilation
    /// fans out across the rayon pool.
    pub fn compile_many(&self, project_ids: &[String]) -> Vec<(String, Result<LayoutPlan, QcError>)> {
        project_ids
            .par_iter()
            .map(|id| (id.clone(), self.compile(id)))
            .collect()
    }

    fn phase_views(&self, project_id: &str) -> Result<Vec<PhaseView>, QcError> {
        let runs = self.instances.list_for_project(project_id)?;
        let mut by_phase: FxHashMap<String, Vec<InspectionInstance>> = FxHashMap::default();
        for run in runs {
            by_phase.entry(run.phase_id.clone()).or_default().push(run);
        }
        let mut views = Vec::new();
        for (phase_id, group) in by_phase {
            let phase = self.phases.get_phase(&phase_id)?;
            if let Some(view) = aggregate_phase(&phase, &group) {
                views.push(view);
            }
        }
        views.sort_by(|a, b| {
            a.phase
                .order
                .cmp(&b.phase.order)
                .then_with(|| a.phase.id.cmp(&b.phase.id))
        });
        Ok(views)
    }

    /// Bounded insight call. `None` on timeout, provider error, or blank text.
    fn fetch_analysis(&self, payload: &JsonValue) -> Option<String> {
        let (tx, rx) = mpsc::channel();
        let provider = Arc::clone(&self.insight);
        let payload = payload.clone();
        thread::spawn(move || {
            let _ = tx.send(provider.analyze(&payload));
        });
        match rx.recv_timeout(self.insight_timeout) {
            Ok(Ok(text)) if !text.trim().is_empty() => Some(text),
            _ => None,
        }
    }

    fn assemble(
        &self,
        project_id: &str,
        views: &[PhaseView],
        analysis: Option<&str>,
        signatures: &[Signature],
    ) -> Result<LayoutPlan, QcError> {
        let mut writer = PageWriter::new(&self.layout)?;
        writer.heading(&format!("Inspection report: {}", project_id));

        for view in views {
            writer.gap();
            writer.heading(&format!("Phase: {}", view.phase.name));
            writer.info_row("status", view.status.as_str());
            writer.info_row("score", &output::format_score(view.score));
            writer.info_row("inspector", &view.inspector.display_name);
            writer.info_row(
                "submitted",
                &view
                    .submitted_at
                    .map(|t| format!("{}Z", t))
                    .unwrap_or_else(|| "-".to_string()),
            );
            if !view.comments.is_empty() {
                writer.info_row(
                    "comments",
                    &output::compact_line(&view.comments, COMMENT_PREVIEW_CHARS),
                );
            }
            if let Some(review) = &view.review_comments {
                writer.info_row(
                    "review",
                    &output::compact_line(review, COMMENT_PREVIEW_CHARS),
                );
            }

            let header: Vec<String> = ["code", "title", "status", "value", "notes"]
                .iter()
                .map(|s| s.to_string())
                .collect();
            let rows: Vec<Vec<String>> = view
                .items
                .iter()
                .map(|item| {
                    vec![
                        item.code.as_str().to_string(),
                        item.title.clone(),
                        item.status.as_str().to_string(),
                        item.measured_value.clone().unwrap_or_default(),
                        item.notes.clone().unwrap_or_default(),
                    ]
                })
                .collect();
            writer.table(&header, &rows);
        }

        if let Some(text) = analysis {
            writer.gap();
            writer.heading("Analysis");
            writer.text_block(text);
        }

        if !signatures.is_empty() {
            writer.gap();
            writer.heading("Signatures");
            for sig in signatures {
                writer.signature_card(vec![
                    sig.signer.display_name.clone(),
                    sig.role.clone(),
                    format!("{:?}", sig.status).to_lowercase(),
                    format!("{}Z", sig.signed_at),
                    sig.image_sha256.clone(),
                ]);
            }
        }

        Ok(writer.finish())
    }
}

/// Compact per-phase summary handed to the insight provider.
pub fn summary_payload(project_id: &str, views: &[PhaseView]) -> JsonValue {
    let phases: Vec<JsonValue> = views
        .iter()
        .map(|view| {
            let failed = view
                .items
                .iter()
                .filter(|i| i.status == ItemStatus::NotOk)
                .count();
            serde_json::json!({
                "phase": view.phase.name,
                "status": view.status.as_str(),
                "score": view.score,
                "items_total": view.items.len(),
                "items_failed": failed,
            })
        })
        .collect();
    serde_json::json!({
        "project": project_id,
        "phases": phases,
    })
}

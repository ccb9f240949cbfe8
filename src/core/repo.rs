//! Repository seams for phases and inspection instances.
//!
//! Components receive repositories by reference; nothing in the engine reaches
//! for ambient or global state. Writes are optimistic: `update` checks the
//! version the caller read and fails with `ConcurrencyConflict` on a stale
//! write, persisting nothing.

use crate::core::error::QcError;
use crate::core::model::{InspectionInstance, Phase};
use rustc_hash::FxHashMap;
use std::sync::Mutex;

pub trait PhaseRepository: Send + Sync {
    fn get_phase(&self, phase_id: &str) -> Result<Phase, QcError>;
    fn list_phases(&self) -> Result<Vec<Phase>, QcError>;
}

pub trait InstanceRepository: Send + Sync {
    /// Persists a freshly instantiated run (version 1).
    fn insert(&self, instance: &InspectionInstance, actor: &str) -> Result<(), QcError>;

    fn get(&self, instance_id: &str) -> Result<InspectionInstance, QcError>;

    /// Persists a mutation of `instance` as read at `instance.version`.
    /// Returns the new version; stale versions fail `ConcurrencyConflict`.
    fn update(&self, instance: &InspectionInstance, actor: &str) -> Result<u64, QcError>;

    fn list_for_project(&self, project_id: &str) -> Result<Vec<InspectionInstance>, QcError>;

    fn list_for_phase(
        &self,
        project_id: &str,
        phase_id: &str,
    ) -> Result<Vec<InspectionInstance>, QcError>;
}

/// In-memory repository backing unit tests and ephemeral runs.
#[derive(Default)]
pub struct MemoryRepo {
    phases: Mutex<FxHashMap<String, Phase>>,
    instances: Mutex<FxHashMap<String, InspectionInstance>>,
}

impl MemoryRepo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put_phase(&self, phase: Phase) {
        self.phases.lock().unwrap().insert(phase.id.clone(), phase);
    }
}

impl PhaseRepository for MemoryRepo {
    fn get_phase(&self, phase_id: &str) -> Result<Phase, QcError> {
        self.phases
            .lock()
            .unwrap()
            .get(phase_id)
            .cloned()
            .ok_or_else(|| QcError::NotFound(format!("phase {}", phase_id)))
    }

    fn list_phases(&self) -> Result<Vec<Phase>, QcError> {
        let mut phases: Vec<Phase> = self.phases.lock().unwrap().values().cloned().collect();
        phases.sort_by(|a, b| a.order.cmp(&b.order).then_with(|| a.id.cmp(&b.id)));
        Ok(phases)
    }
}

impl InstanceRepository for MemoryRepo {
    fn insert(&self, instance: &InspectionInstance, _actor: &str) -> Result<(), QcError> {
        let mut map = self.instances.lock().unwrap();
        if map.contains_key(&instance.id) {
            return Err(QcError::Validation(format!(
                "instance {} already exists",
                instance.id
            )));
        }
        map.insert(instance.id.clone(), instance.clone());
        Ok(())
    }

    fn get(&self, instance_id: &str) -> Result<InspectionInstance, QcError> {
        self.instances
            .lock()
            .unwrap()
            .get(instance_id)
            .cloned()
            .ok_or_else(|| QcError::NotFound(format!("instance {}", instance_id)))
    }

    fn update(&self, instance: &InspectionInstance, _actor: &str) -> Result<u64, QcError> {
        let mut map = self.instances.lock().unwrap();
        let stored = map
            .get(&instance.id)
            .ok_or_else(|| QcError::NotFound(format!("instance {}", instance.id)))?;
        if stored.version != instance.version {
            return Err(QcError::ConcurrencyConflict(format!(
                "instance {} is at version {}, write was based on {}",
                instance.id, stored.version, instance.version
            )));
        }
        let mut next = instance.clone();
        next.version += 1;
        let version = next.version;
        map.insert(next.id.clone(), next);
        Ok(version)
    }

    fn list_for_project(&self, project_id: &str) -> Result<Vec<InspectionInstance>, QcError> {
        let mut out: Vec<InspectionInstance> = self
            .instances
            .lock()
            .unwrap()
            .values()
            .filter(|i| i.project_id == project_id)
            .cloned()
            .collect();
        out.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(out)
    }

    fn list_for_phase(
        &self,
        project_id: &str,
        phase_id: &str,
    ) -> Result<Vec<InspectionInstance>, QcError> {
        Ok(self
            .list_for_project(project_id)?
            .into_iter()
            .filter(|i| i.phase_id == phase_id)
            .collect())
    }
}

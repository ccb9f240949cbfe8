//! Template catalog seam.
//!
//! The catalog is read-only from the engine's point of view: once a template is
//! published its item definitions are immutable, and instances only ever see the
//! snapshot taken at instantiation time.

use crate::core::error::QcError;
use crate::core::model::ChecklistTemplate;
use rustc_hash::FxHashMap;
use std::sync::Mutex;

pub trait TemplateCatalog: Send + Sync {
    fn get_template(&self, template_id: &str) -> Result<ChecklistTemplate, QcError>;
}

/// In-memory catalog, used by tests and small deployments.
#[derive(Default)]
pub struct MemoryCatalog {
    templates: Mutex<FxHashMap<String, ChecklistTemplate>>,
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn publish(&self, template: ChecklistTemplate) -> Result<(), QcError> {
        template.validate()?;
        self.templates
            .lock()
            .unwrap()
            .insert(template.id.clone(), template);
        Ok(())
    }
}

impl TemplateCatalog for MemoryCatalog {
    fn get_template(&self, template_id: &str) -> Result<ChecklistTemplate, QcError> {
        self.templates
            .lock()
            .unwrap()
            .get(template_id)
            .cloned()
            .ok_or_else(|| QcError::NotFound(format!("template {}", template_id)))
    }
}

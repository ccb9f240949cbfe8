//! Data model for inspection templates, instances, and signatures.
//!
//! Checklist item definitions are snapshotted into instances at creation time:
//! later template edits never change an existing inspection run. Instances carry
//! an optimistic `version` token that the repositories check on every write.

use crate::core::error::QcError;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Dotted numeric checklist code (`"2.10"`).
///
/// Ordering is natural numeric ordering over the dot-separated segments, so
/// `"1.9" < "1.10" < "2.1"`, not lexicographic string order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemCode(String);

impl ItemCode {
    pub fn parse(raw: &str) -> Result<Self, QcError> {
        let re = Regex::new(r"^\d+(\.\d+)*$").unwrap();
        if !re.is_match(raw) {
            return Err(QcError::Validation(format!(
                "item code '{}' is not a dotted numeric code",
                raw
            )));
        }
        Ok(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn segments(&self) -> impl Iterator<Item = u64> + '_ {
        self.0.split('.').map(|s| s.parse::<u64>().unwrap_or(0))
    }
}

impl Ord for ItemCode {
    fn cmp(&self, other: &Self) -> Ordering {
        self.segments()
            .cmp(other.segments())
            .then_with(|| self.0.cmp(&other.0))
    }
}

impl PartialOrd for ItemCode {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for ItemCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&self.0)
    }
}

/// Acting identity supplied by the caller on every mutating operation.
/// The engine never resolves a "current user" on its own.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub id: String,
    pub display_name: String,
    pub role: String,
}

impl Principal {
    pub fn new(id: &str, display_name: &str, role: &str) -> Self {
        Self {
            id: id.to_string(),
            display_name: display_name.to_string(),
            role: role.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    Pending,
    Ok,
    NotOk,
    Na,
}

impl ItemStatus {
    pub fn parse(raw: &str) -> Result<Self, QcError> {
        match raw {
            "pending" => Ok(ItemStatus::Pending),
            "ok" => Ok(ItemStatus::Ok),
            "not_ok" => Ok(ItemStatus::NotOk),
            "na" => Ok(ItemStatus::Na),
            other => Err(QcError::InvalidStatus(other.to_string())),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ItemStatus::Pending => "pending",
            ItemStatus::Ok => "ok",
            ItemStatus::NotOk => "not_ok",
            ItemStatus::Na => "na",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstanceStatus {
    Draft,
    Submitted,
    Approved,
    Rejected,
    NeedsRework,
}

impl InstanceStatus {
    /// Approved and rejected instances are immutable forever.
    pub fn is_terminal(self) -> bool {
        matches!(self, InstanceStatus::Approved | InstanceStatus::Rejected)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            InstanceStatus::Draft => "draft",
            InstanceStatus::Submitted => "submitted",
            InstanceStatus::Approved => "approved",
            InstanceStatus::Rejected => "rejected",
            InstanceStatus::NeedsRework => "needs_rework",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Photo,
    Video,
    Document,
}

impl MediaKind {
    pub fn parse(raw: &str) -> Result<Self, QcError> {
        match raw {
            "photo" => Ok(MediaKind::Photo),
            "video" => Ok(MediaKind::Video),
            "document" => Ok(MediaKind::Document),
            other => Err(QcError::Validation(format!("unknown media kind '{}'", other))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignatureStatus {
    Approved,
    Rejected,
}

/// Immutable checklist entry of a published template.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChecklistItemDefinition {
    pub code: ItemCode,
    pub title: String,
    pub acceptance_criteria: String,
    pub check_method: String,
    pub weight: u32,
    pub mandatory: bool,
    pub requires_photo: bool,
    pub requires_value: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChecklistTemplate {
    pub id: String,
    pub name: String,
    pub items: Vec<ChecklistItemDefinition>,
}

impl ChecklistTemplate {
    /// Weight must be positive and codes unique within a template.
    pub fn validate(&self) -> Result<(), QcError> {
        let mut seen = std::collections::HashSet::new();
        for def in &self.items {
            if def.weight == 0 {
                return Err(QcError::Validation(format!(
                    "item {} has zero weight",
                    def.code
                )));
            }
            if !seen.insert(def.code.clone()) {
                return Err(QcError::Validation(format!(
                    "duplicate item code {} in template {}",
                    def.code, self.id
                )));
            }
        }
        Ok(())
    }
}

/// Shared master data; `order` defines report sequencing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Phase {
    pub id: String,
    pub name: String,
    pub order: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub id: String,
    pub file_name: String,
    pub storage_path: String,
    pub kind: MediaKind,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Signature {
    pub signer: Principal,
    pub role: String,
    pub status: SignatureStatus,
    pub image_sha256: String,
    pub signed_at: i64,
}

/// One checklist row of an inspection run. Definition fields are copied in at
/// instantiation time (snapshot semantics).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InspectionItem {
    pub id: String,
    pub code: ItemCode,
    pub title: String,
    pub weight: u32,
    pub mandatory: bool,
    pub requires_photo: bool,
    pub requires_value: bool,
    pub status: ItemStatus,
    pub measured_value: Option<String>,
    pub notes: Option<String>,
    pub attachments: Vec<Attachment>,
}

impl InspectionItem {
    pub fn from_definition(id: String, def: &ChecklistItemDefinition) -> Self {
        Self {
            id,
            code: def.code.clone(),
            title: def.title.clone(),
            weight: def.weight,
            mandatory: def.mandatory,
            requires_photo: def.requires_photo,
            requires_value: def.requires_value,
            status: ItemStatus::Pending,
            measured_value: None,
            notes: None,
            attachments: Vec::new(),
        }
    }
}

/// One executed run of a template against a (project, phase) pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InspectionInstance {
    pub id: String,
    pub project_id: String,
    pub phase_id: String,
    pub template_id: String,
    pub inspector: Principal,
    pub status: InstanceStatus,
    pub comments: String,
    pub review_comments: Option<String>,
    pub created_at: i64,
    pub submitted_at: Option<i64>,
    pub score: f64,
    pub items: Vec<InspectionItem>,
    pub signatures: Vec<Signature>,
    pub attachments: Vec<Attachment>,
    pub version: u64,
}

impl InspectionInstance {
    pub fn item(&self, item_id: &str) -> Option<&InspectionItem> {
        self.items.iter().find(|i| i.id == item_id)
    }

    pub fn item_mut(&mut self, item_id: &str) -> Option<&mut InspectionItem> {
        self.items.iter_mut().find(|i| i.id == item_id)
    }

    /// Codes of mandatory items still pending, in natural code order.
    pub fn pending_mandatory_codes(&self) -> Vec<String> {
        let mut codes: Vec<&InspectionItem> = self
            .items
            .iter()
            .filter(|i| i.mandatory && i.status == ItemStatus::Pending)
            .collect();
        codes.sort_by(|a, b| a.code.cmp(&b.code));
        codes.iter().map(|i| i.code.as_str().to_string()).collect()
    }
}

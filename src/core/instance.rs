//! Inspection instance manager.
//!
//! Instantiates checklist runs from templates and applies every mutation as a
//! read-modify-write against the instance repository: validate, mutate a local
//! copy, persist once. A failed validation persists nothing, and the cached
//! score always commits in the same write as the state that produced it.

use crate::core::catalog::TemplateCatalog;
use crate::core::error::QcError;
use crate::core::external::AttachmentStore;
use crate::core::lifecycle::{self, LifecycleOp};
use crate::core::model::{
    Attachment, InspectionInstance, InspectionItem, InstanceStatus, ItemStatus, MediaKind,
    Principal, Signature, SignatureStatus,
};
use crate::core::repo::{InstanceRepository, PhaseRepository};
use crate::core::score::weighted_score;
use crate::core::time;
use sha2::{Digest, Sha256};
use ulid::Ulid;

pub struct InstanceManager<'a> {
    catalog: &'a dyn TemplateCatalog,
    phases: &'a dyn PhaseRepository,
    instances: &'a dyn InstanceRepository,
    attachments: &'a dyn AttachmentStore,
}

impl<'a> InstanceManager<'a> {
    pub fn new(
        catalog: &'a dyn TemplateCatalog,
        phases: &'a dyn PhaseRepository,
        instances: &'a dyn InstanceRepository,
        attachments: &'a dyn AttachmentStore,
    ) -> Self {
        Self {
            catalog,
            phases,
            instances,
            attachments,
        }
    }

    /// Clones every definition of the template into a fresh pending item and
    /// persists the new draft run. Template and phase must exist.
    pub fn instantiate(
        &self,
        principal: &Principal,
        project_id: &str,
        phase_id: &str,
        template_id: &str,
    ) -> Result<InspectionInstance, QcError> {
        let template = self.catalog.get_template(template_id)?;
        self.phases.get_phase(phase_id)?;

        let items: Vec<InspectionItem> = template
            .items
            .iter()
            .map(|def| InspectionItem::from_definition(Ulid::new().to_string(), def))
            .collect();

        let instance = InspectionInstance {
            id: Ulid::new().to_string(),
            project_id: project_id.to_string(),
            phase_id: phase_id.to_string(),
            template_id: template_id.to_string(),
            inspector: principal.clone(),
            status: InstanceStatus::Draft,
            comments: String::new(),
            review_comments: None,
            created_at: time::now_epoch(),
            submitted_at: None,
            score: 0.0,
            items,
            signatures: Vec::new(),
            attachments: Vec::new(),
            version: 1,
        };
        self.instances.insert(&instance, &principal.id)?;
        Ok(instance)
    }

    /// Overwrites the item result in place (no history) and recomputes the
    /// cached score in the same write.
    pub fn set_item_result(
        &self,
        principal: &Principal,
        instance_id: &str,
        item_id: &str,
        status: ItemStatus,
        measured_value: Option<&str>,
        notes: Option<&str>,
    ) -> Result<InspectionInstance, QcError> {
        let mut instance = self.instances.get(instance_id)?;
        lifecycle::check_transition(instance.status, LifecycleOp::Edit)?;

        let item = instance
            .item_mut(item_id)
            .ok_or_else(|| QcError::NotFound(format!("item {}", item_id)))?;
        item.status = status;
        item.measured_value = measured_value.map(str::to_string);
        item.notes = notes.map(str::to_string);

        instance.score = weighted_score(&instance.items);
        self.persist(&mut instance, principal)?;
        Ok(instance)
    }

    /// Inspector comments, editable until the run is terminal.
    pub fn set_comments(
        &self,
        principal: &Principal,
        instance_id: &str,
        comments: &str,
    ) -> Result<InspectionInstance, QcError> {
        let mut instance = self.instances.get(instance_id)?;
        lifecycle::check_transition(instance.status, LifecycleOp::Edit)?;
        instance.comments = comments.to_string();
        self.persist(&mut instance, principal)?;
        Ok(instance)
    }

    /// Uploads the bytes through the attachment store, then records the
    /// reference on the item (or on the instance when `item_id` is `None`).
    /// A store failure surfaces unchanged and no linkage is recorded; if the
    /// linkage write itself fails, the uploaded bytes are removed again.
    pub fn attach_file(
        &self,
        principal: &Principal,
        instance_id: &str,
        item_id: Option<&str>,
        bytes: &[u8],
        file_name: &str,
        kind: MediaKind,
    ) -> Result<Attachment, QcError> {
        let mut instance = self.instances.get(instance_id)?;
        lifecycle::check_transition(instance.status, LifecycleOp::Edit)?;
        if let Some(item_id) = item_id {
            if instance.item(item_id).is_none() {
                return Err(QcError::NotFound(format!("item {}", item_id)));
            }
        }

        let attachment = self.attachments.upload(bytes, file_name, kind)?;
        match item_id {
            Some(item_id) => {
                // Checked above; the item cannot have vanished from the copy.
                if let Some(item) = instance.item_mut(item_id) {
                    item.attachments.push(attachment.clone());
                }
            }
            None => instance.attachments.push(attachment.clone()),
        }

        if let Err(err) = self.persist(&mut instance, principal) {
            let _ = self.attachments.delete(&attachment);
            return Err(err);
        }
        Ok(attachment)
    }

    /// Removes the attachment reference, then deletes the stored bytes.
    pub fn detach_file(
        &self,
        principal: &Principal,
        instance_id: &str,
        attachment_id: &str,
    ) -> Result<(), QcError> {
        let mut instance = self.instances.get(instance_id)?;
        lifecycle::check_transition(instance.status, LifecycleOp::Edit)?;

        let mut removed: Option<Attachment> = None;
        if let Some(pos) = instance.attachments.iter().position(|a| a.id == attachment_id) {
            removed = Some(instance.attachments.remove(pos));
        } else {
            for item in &mut instance.items {
                if let Some(pos) = item.attachments.iter().position(|a| a.id == attachment_id) {
                    removed = Some(item.attachments.remove(pos));
                    break;
                }
            }
        }
        let removed = removed
            .ok_or_else(|| QcError::NotFound(format!("attachment {}", attachment_id)))?;

        self.persist(&mut instance, principal)?;
        self.attachments.delete(&removed)
    }

    /// Mandatory-gate submission: every mandatory item must be resolved
    /// (non-pending), otherwise nothing is mutated and the offending codes are
    /// reported.
    pub fn submit(
        &self,
        principal: &Principal,
        instance_id: &str,
    ) -> Result<InspectionInstance, QcError> {
        let mut instance = self.instances.get(instance_id)?;
        lifecycle::check_transition(instance.status, LifecycleOp::Submit)?;
        Self::check_mandatory(&instance)?;

        instance.score = weighted_score(&instance.items);
        instance.status = InstanceStatus::Submitted;
        instance.submitted_at = Some(time::now_epoch());
        self.persist(&mut instance, principal)?;
        Ok(instance)
    }

    /// Signed submission. The signer's own signature is self-approving: it
    /// records who submitted, not review approval. Signature creation and the
    /// transition to submitted commit as one write.
    pub fn sign(
        &self,
        principal: &Principal,
        instance_id: &str,
        role: &str,
        image: &[u8],
    ) -> Result<InspectionInstance, QcError> {
        let mut instance = self.instances.get(instance_id)?;
        lifecycle::check_transition(instance.status, LifecycleOp::Sign)?;
        if image.is_empty() {
            return Err(QcError::EmptySignature);
        }
        Self::check_mandatory(&instance)?;

        let now = time::now_epoch();
        instance.signatures.push(Signature {
            signer: principal.clone(),
            role: role.to_string(),
            status: SignatureStatus::Approved,
            image_sha256: hex_digest(image),
            signed_at: now,
        });
        instance.score = weighted_score(&instance.items);
        instance.status = InstanceStatus::Submitted;
        instance.submitted_at = Some(now);
        self.persist(&mut instance, principal)?;
        Ok(instance)
    }

    pub fn approve(
        &self,
        principal: &Principal,
        instance_id: &str,
        comments: Option<&str>,
    ) -> Result<InspectionInstance, QcError> {
        let mut instance = self.instances.get(instance_id)?;
        lifecycle::check_transition(instance.status, LifecycleOp::Approve)?;
        instance.status = InstanceStatus::Approved;
        if let Some(comments) = comments {
            instance.review_comments = Some(comments.to_string());
        }
        self.persist(&mut instance, principal)?;
        Ok(instance)
    }

    /// Rejection requires comments. `reopen` sends the run back for rework
    /// (draft-equivalent editing); otherwise the rejection is terminal.
    pub fn reject(
        &self,
        principal: &Principal,
        instance_id: &str,
        comments: &str,
        reopen: bool,
    ) -> Result<InspectionInstance, QcError> {
        let mut instance = self.instances.get(instance_id)?;
        lifecycle::check_transition(instance.status, LifecycleOp::Reject)?;
        if comments.trim().is_empty() {
            return Err(QcError::Validation(
                "rejection requires comments".to_string(),
            ));
        }
        instance.status = lifecycle::reject_target(reopen);
        instance.review_comments = Some(comments.to_string());
        self.persist(&mut instance, principal)?;
        Ok(instance)
    }

    fn check_mandatory(instance: &InspectionInstance) -> Result<(), QcError> {
        let pending = instance.pending_mandatory_codes();
        if pending.is_empty() {
            Ok(())
        } else {
            Err(QcError::MissingMandatoryItems(pending))
        }
    }

    fn persist(
        &self,
        instance: &mut InspectionInstance,
        principal: &Principal,
    ) -> Result<(), QcError> {
        let version = self.instances.update(instance, &principal.id)?;
        instance.version = version;
        Ok(())
    }
}

fn hex_digest(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

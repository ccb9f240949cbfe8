//! Lifecycle state machine for inspection instances.
//!
//! `Draft -> Submitted -> {Approved, Rejected, NeedsRework}`. NeedsRework is
//! not terminal: it reopens the run for editing and behaves exactly like Draft.
//! Approved and Rejected are terminal; every operation against a terminal
//! instance fails with `InstanceTerminal` before anything else is checked.

use crate::core::error::QcError;
use crate::core::model::InstanceStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleOp {
    /// Item edits, comments, attachments.
    Edit,
    /// Mandatory-gate submission without a signature image.
    Submit,
    /// Signed submission (signature image + submit gate).
    Sign,
    Approve,
    Reject,
}

impl LifecycleOp {
    pub fn as_str(self) -> &'static str {
        match self {
            LifecycleOp::Edit => "edit",
            LifecycleOp::Submit => "submit",
            LifecycleOp::Sign => "sign",
            LifecycleOp::Approve => "approve",
            LifecycleOp::Reject => "reject",
        }
    }
}

/// Checks whether `op` is legal from `status`, without mutating anything.
pub fn check_transition(status: InstanceStatus, op: LifecycleOp) -> Result<(), QcError> {
    if status.is_terminal() {
        return Err(QcError::InstanceTerminal(status.as_str().to_string()));
    }
    let allowed = match op {
        // Editing is blocked only by terminal states.
        LifecycleOp::Edit => true,
        LifecycleOp::Submit | LifecycleOp::Sign => matches!(
            status,
            InstanceStatus::Draft | InstanceStatus::NeedsRework
        ),
        LifecycleOp::Approve | LifecycleOp::Reject => status == InstanceStatus::Submitted,
    };
    if allowed {
        Ok(())
    } else {
        Err(QcError::InvalidTransition {
            from: status.as_str().to_string(),
            op: op.as_str().to_string(),
        })
    }
}

/// Target state of a reject decision: reopen sends the run back for rework,
/// otherwise the rejection is final.
pub fn reject_target(reopen: bool) -> InstanceStatus {
    if reopen {
        InstanceStatus::NeedsRework
    } else {
        InstanceStatus::Rejected
    }
}

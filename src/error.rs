//! Error types for the scheduling core
//!
//! Errors are classified the way the UI surfaces them:
//! - Validation: rejected before any write, shown inline
//! - Workflow: an illegal transition or an incomplete wizard
//! - Storage: the write failed and nothing was applied

use thiserror::Error;

use crate::db::DbError;
use crate::types::AppointmentStatus;

/// Error returned by core operations.
#[derive(Debug, Error)]
pub enum CrmError {
    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Cannot move an appointment from {from} to {to}")]
    InvalidTransition {
        from: AppointmentStatus,
        to: AppointmentStatus,
    },

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("Outcome '{outcome}' is not available in the {kind} wizard")]
    WizardOutcomeNotAllowed { kind: String, outcome: String },

    #[error("Wizard is missing data: {0}")]
    WizardIncomplete(String),

    #[error("A completion wizard is already open for appointment {0}")]
    WizardAlreadyOpen(String),

    #[error("Storage error: {0}")]
    Storage(#[from] DbError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Backup error: {0}")]
    Backup(String),
}

impl From<rusqlite::Error> for CrmError {
    fn from(err: rusqlite::Error) -> Self {
        CrmError::Storage(DbError::Sqlite(err))
    }
}

impl CrmError {
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        CrmError::NotFound {
            entity,
            id: id.into(),
        }
    }

    /// True for errors caused by what the user entered.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            CrmError::Validation(_)
                | CrmError::WizardIncomplete(_)
                | CrmError::WizardOutcomeNotAllowed { .. }
        )
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            CrmError::Validation(_)
            | CrmError::WizardIncomplete(_)
            | CrmError::WizardOutcomeNotAllowed { .. } => ErrorKind::Validation,
            CrmError::InvalidTransition { .. }
            | CrmError::NotFound { .. }
            | CrmError::WizardAlreadyOpen(_) => ErrorKind::Workflow,
            CrmError::Storage(_) | CrmError::Backup(_) => ErrorKind::Storage,
            CrmError::Config(_) => ErrorKind::Configuration,
        }
    }

    /// Short hint shown under the inline message.
    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            CrmError::Validation(_) => "Check the highlighted fields and try again.",
            CrmError::InvalidTransition { .. } => {
                "Only scheduled appointments can change status. Create a follow-up instead."
            }
            CrmError::NotFound { .. } => "The record may have been deleted. Reload the list.",
            CrmError::WizardOutcomeNotAllowed { .. } => "Pick one of the listed outcomes.",
            CrmError::WizardIncomplete(_) => "Fill in the remaining wizard fields.",
            CrmError::WizardAlreadyOpen(_) => "Finish or close the open wizard first.",
            CrmError::Storage(_) => "Nothing was saved. Try again.",
            CrmError::Config(_) => "Check ~/.agent-crm/config.json.",
            CrmError::Backup(_) => "Check the backup file and try again.",
        }
    }
}

/// Serializable error representation for UI callers
#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CrmErrorPayload {
    pub message: String,
    pub error_type: ErrorKind,
    pub recovery_suggestion: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorKind {
    Validation,
    Workflow,
    Storage,
    Configuration,
}

impl From<&CrmError> for CrmErrorPayload {
    fn from(err: &CrmError) -> Self {
        CrmErrorPayload {
            message: err.to_string(),
            error_type: err.kind(),
            recovery_suggestion: err.recovery_suggestion().to_string(),
        }
    }
}

//! Ledger domain errors

use thiserror::Error;

use core_kernel::{Money, MoneyError, PortError, ReceivableId, StudentId};

/// Errors that can occur in the ledger domain
///
/// Every variant names the entity it is about so callers can report exactly
/// which receivable, payment or code was at fault.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// Input failed a shape or range check
    #[error("Invalid {field}: {message}")]
    Validation {
        field: String,
        message: String,
    },

    /// A referenced entity does not exist
    #[error("{entity} not found: {id}")]
    NotFound {
        entity: String,
        id: String,
    },

    /// The operation collides with existing data
    #[error("Conflict on {key}: {message}")]
    Conflict {
        key: String,
        message: String,
    },

    /// The receivable is VOID and can no longer change
    #[error("Receivable {0} is void")]
    VoidedAccount(ReceivableId),

    /// The receivable has no pending balance left
    #[error("Receivable {0} is already paid")]
    AlreadyPaid(ReceivableId),

    /// The payment or enrollment was already voided
    #[error("{entity} {id} is already void")]
    AlreadyVoid {
        entity: String,
        id: String,
    },

    /// The amount exceeds what the student owes
    #[error("Payment of {amount} exceeds outstanding debt of {outstanding} for student {student_id}")]
    Overpayment {
        student_id: StudentId,
        amount: Money,
        outstanding: Money,
    },

    /// Storage or arithmetic failure
    #[error("Internal error: {0}")]
    Internal(String),
}

impl LedgerError {
    /// Creates a Validation error for a named field
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        LedgerError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Creates a NotFound error from any ID type
    pub fn not_found(entity: impl Into<String>, id: impl std::fmt::Display) -> Self {
        LedgerError::NotFound {
            entity: entity.into(),
            id: id.to_string(),
        }
    }

    /// Creates a Conflict error
    pub fn conflict(key: impl Into<String>, message: impl Into<String>) -> Self {
        LedgerError::Conflict {
            key: key.into(),
            message: message.into(),
        }
    }

    /// Creates an AlreadyVoid error
    pub fn already_void(entity: impl Into<String>, id: impl std::fmt::Display) -> Self {
        LedgerError::AlreadyVoid {
            entity: entity.into(),
            id: id.to_string(),
        }
    }
}

impl From<PortError> for LedgerError {
    fn from(err: PortError) -> Self {
        match err {
            PortError::NotFound { entity_type, id } => LedgerError::NotFound { entity: entity_type, id },
            PortError::Conflict { key, message } => LedgerError::conflict(key, message),
            other => LedgerError::Internal(other.to_string()),
        }
    }
}

impl From<MoneyError> for LedgerError {
    fn from(err: MoneyError) -> Self {
        match err {
            MoneyError::TooPrecise(amount) => {
                LedgerError::validation("amount", format!("{} has more than two decimal places", amount))
            }
            other => LedgerError::Internal(other.to_string()),
        }
    }
}

impl From<validator::ValidationErrors> for LedgerError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut fields: Vec<&str> = errors.field_errors().keys().copied().collect();
        fields.sort_unstable();
        LedgerError::Validation {
            field: fields.join(", "),
            message: errors.to_string(),
        }
    }
}

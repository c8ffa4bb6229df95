use thiserror::Error;
use uuid::Uuid;

use crate::decimal::Money;
use crate::types::ScheduleStatus;

/// coarse classification callers branch on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Conflict,
    UnprocessableEntity,
    InvalidArgument,
    LockAcquisitionFailed,
    Internal,
}

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("{entity} not found: {id}")]
    NotFound {
        entity: &'static str,
        id: Uuid,
    },

    #[error("repayment schedule already exists for loan {loan_id}")]
    ScheduleAlreadyExists {
        loan_id: Uuid,
    },

    #[error("version conflict on schedule {schedule_id}: expected {expected}, found {actual}")]
    VersionConflict {
        schedule_id: Uuid,
        expected: u64,
        actual: u64,
    },

    #[error("schedule not active: current status is {status}")]
    InactiveSchedule {
        status: ScheduleStatus,
    },

    #[error("insufficient amount: required {required}, provided {provided}")]
    InsufficientAmount {
        required: Money,
        provided: Money,
    },

    #[error("payment exceeds outstanding balance: outstanding {outstanding}, provided {provided}")]
    Overpayment {
        outstanding: Money,
        provided: Money,
    },

    #[error("disbursement {id} is not completed")]
    DisbursementNotCompleted {
        id: Uuid,
    },

    #[error("invalid payment amount: {amount}")]
    InvalidPaymentAmount {
        amount: Money,
    },

    #[error("invalid argument: {message}")]
    InvalidArgument {
        message: String,
    },

    #[error("invalid configuration: {message}")]
    InvalidConfiguration {
        message: String,
    },

    #[error("could not acquire lock {key} after {attempts} attempts")]
    LockAcquisitionFailed {
        key: String,
        attempts: u32,
    },

    #[error("lock lease expired for {key}")]
    LockLeaseExpired {
        key: String,
    },

    #[error("storage error: {message}")]
    Storage {
        message: String,
    },

    #[error("calculation error: {message}")]
    CalculationError {
        message: String,
    },
}

impl LedgerError {
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        LedgerError::InvalidArgument {
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            LedgerError::NotFound { .. } => ErrorKind::NotFound,
            LedgerError::ScheduleAlreadyExists { .. } | LedgerError::VersionConflict { .. } => {
                ErrorKind::Conflict
            }
            LedgerError::InactiveSchedule { .. }
            | LedgerError::InsufficientAmount { .. }
            | LedgerError::Overpayment { .. }
            | LedgerError::DisbursementNotCompleted { .. } => ErrorKind::UnprocessableEntity,
            LedgerError::InvalidPaymentAmount { .. }
            | LedgerError::InvalidArgument { .. }
            | LedgerError::InvalidConfiguration { .. } => ErrorKind::InvalidArgument,
            LedgerError::LockAcquisitionFailed { .. } | LedgerError::LockLeaseExpired { .. } => {
                ErrorKind::LockAcquisitionFailed
            }
            LedgerError::Storage { .. } | LedgerError::CalculationError { .. } => {
                ErrorKind::Internal
            }
        }
    }

    /// stable machine-readable code
    pub fn code(&self) -> &'static str {
        match self {
            LedgerError::NotFound { .. } => "NOT_FOUND",
            LedgerError::ScheduleAlreadyExists { .. } => "SCHEDULE_EXISTS",
            LedgerError::VersionConflict { .. } => "VERSION_CONFLICT",
            LedgerError::InactiveSchedule { .. } => "INACTIVE_SCHEDULE",
            LedgerError::InsufficientAmount { .. } => "INSUFFICIENT_AMOUNT",
            LedgerError::Overpayment { .. } => "OVERPAYMENT",
            LedgerError::DisbursementNotCompleted { .. } => "DISBURSEMENT_NOT_COMPLETED",
            LedgerError::InvalidPaymentAmount { .. } => "INVALID_PAYMENT_AMOUNT",
            LedgerError::InvalidArgument { .. } => "INVALID_ARGUMENT",
            LedgerError::InvalidConfiguration { .. } => "INVALID_CONFIGURATION",
            LedgerError::LockAcquisitionFailed { .. } => "LOCK_NOT_ACQUIRED",
            LedgerError::LockLeaseExpired { .. } => "LOCK_LEASE_EXPIRED",
            LedgerError::Storage { .. } => "STORAGE_ERROR",
            LedgerError::CalculationError { .. } => "CALCULATION_ERROR",
        }
    }

    /// lock and version failures can be retried as a whole operation
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            LedgerError::LockAcquisitionFailed { .. }
                | LedgerError::LockLeaseExpired { .. }
                | LedgerError::VersionConflict { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, LedgerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_errors_are_distinct_from_business_errors() {
        let lock = LedgerError::LockAcquisitionFailed {
            key: "schedule:x".to_string(),
            attempts: 3,
        };
        let version = LedgerError::VersionConflict {
            schedule_id: Uuid::new_v4(),
            expected: 1,
            actual: 2,
        };
        let inactive = LedgerError::InactiveSchedule {
            status: ScheduleStatus::Completed,
        };

        assert!(lock.is_retryable());
        assert!(version.is_retryable());
        assert!(!inactive.is_retryable());

        assert_eq!(lock.kind(), ErrorKind::LockAcquisitionFailed);
        assert_eq!(version.kind(), ErrorKind::Conflict);
        assert_eq!(inactive.kind(), ErrorKind::UnprocessableEntity);
        assert_eq!(inactive.code(), "INACTIVE_SCHEDULE");
    }

    #[test]
    fn test_duplicate_schedule_is_conflict_but_not_retryable() {
        let err = LedgerError::ScheduleAlreadyExists {
            loan_id: Uuid::new_v4(),
        };
        assert_eq!(err.kind(), ErrorKind::Conflict);
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_messages() {
        let err = LedgerError::InsufficientAmount {
            required: Money::from_major(102),
            provided: Money::from_major(100),
        };
        assert_eq!(err.to_string(), "insufficient amount: required 102, provided 100");
        assert_eq!(err.code(), "INSUFFICIENT_AMOUNT");
    }
}

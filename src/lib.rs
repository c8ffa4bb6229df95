pub mod config;
pub mod decimal;
pub mod directory;
pub mod errors;
pub mod events;
pub mod interest;
pub mod ledger;
pub mod lock;
pub mod payments;
pub mod repository;
pub mod serialization;
pub mod state;
pub mod telemetry;
pub mod types;

// re-export key types
pub use config::{LedgerConfig, LockConfig};
pub use decimal::{Money, Rate};
pub use directory::{
    Disbursement, DisbursementStatus, InMemoryLoanDirectory, LoanApplication, LoanDirectory,
};
pub use errors::{ErrorKind, LedgerError, Result};
pub use events::{EventEnvelope, EventSink, EventStore, ScheduleEvent};
pub use interest::{EarlyRepaymentQuote, PrepaymentPenalty};
pub use ledger::{ScheduleLedger, ScheduleLedgerBuilder, EARLY_REPAYMENT_REFERENCE};
pub use lock::{DistributedLock, InMemoryLock, Lease, LockManager};
pub use payments::{
    AllocationResult, AmortizationCalculator, InstallmentAllocation, OverpaymentPolicy,
    PaymentAllocator, PaymentRequest, ScheduleSummary,
};
pub use repository::{InMemoryScheduleRepository, ScheduleRepository};
pub use serialization::ScheduleView;
pub use state::{EarlyRepayment, Installment, RepaymentSchedule, SchedulePatch};
pub use telemetry::init_tracing;
pub use types::{
    Actor, DisbursementId, DueStatus, Frequency, InstallmentStatus, LoanDetails, LoanId, ScheduleId,
    ScheduleStatus,
};

// re-export external dependencies that users will need
pub use chrono;
pub use hourglass_rs::{SafeTimeProvider, TimeSource};
pub use rust_decimal::Decimal;
pub use uuid::Uuid;

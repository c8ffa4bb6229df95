pub mod amortization;
pub mod overpayment;
pub mod summary;
pub mod waterfall;

use serde::{Deserialize, Serialize};

use crate::decimal::Money;
use crate::errors::{LedgerError, Result};
use crate::types::{Actor, ScheduleId};

pub use amortization::AmortizationCalculator;
pub use overpayment::{OverpaymentCheck, OverpaymentHandler, OverpaymentPolicy};
pub use summary::ScheduleSummary;
pub use waterfall::{AllocationResult, InstallmentAllocation, PaymentAllocator};

/// payment request against a schedule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentRequest {
    pub schedule_id: ScheduleId,
    pub amount: Money,
    pub reference: String,
    pub actor: Actor,
}

impl PaymentRequest {
    pub fn new(schedule_id: ScheduleId, amount: Money, reference: impl Into<String>, actor: Actor) -> Self {
        Self {
            schedule_id,
            amount,
            reference: reference.into(),
            actor,
        }
    }

    /// positive whole cents and a non-empty reference
    pub fn validate(&self) -> Result<()> {
        if !self.amount.is_positive() || !self.amount.is_currency_scale() {
            return Err(LedgerError::InvalidPaymentAmount { amount: self.amount });
        }

        if self.reference.trim().is_empty() {
            return Err(LedgerError::invalid_argument("payment reference must not be empty"));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_payment_request_validation() {
        let schedule_id = Uuid::new_v4();

        let zero = PaymentRequest::new(schedule_id, Money::ZERO, "ref", Actor::System);
        assert!(matches!(zero.validate(), Err(LedgerError::InvalidPaymentAmount { .. })));

        let sub_cent = PaymentRequest::new(schedule_id, Money::from_str_exact("299.996").unwrap(), "ref", Actor::System);
        assert!(matches!(sub_cent.validate(), Err(LedgerError::InvalidPaymentAmount { .. })));

        let blank = PaymentRequest::new(schedule_id, Money::from_major(10), "  ", Actor::System);
        assert!(matches!(blank.validate(), Err(LedgerError::InvalidArgument { .. })));

        let ok = PaymentRequest::new(schedule_id, Money::from_major(10), "ref", Actor::System);
        assert!(ok.validate().is_ok());
    }
}

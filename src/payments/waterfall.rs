use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::decimal::Money;
use crate::errors::{LedgerError, Result};
use crate::state::Installment;
use crate::types::InstallmentStatus;

/// money applied to one installment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstallmentAllocation {
    pub installment_number: u32,
    pub amount: Money,
    pub settled: bool,
}

/// outcome of one allocation pass
#[derive(Debug, Clone, PartialEq)]
pub struct AllocationResult {
    /// full list with the payment applied, ordered by installment number
    pub installments: Vec<Installment>,
    pub allocations: Vec<InstallmentAllocation>,
    /// installments that became paid in this pass
    pub installments_paid: u32,
    pub amount_applied: Money,
    /// left over after every installment was settled
    pub remainder: Money,
}

/// oldest-first waterfall across installments
///
/// Each open installment is settled in full before the next one is touched;
/// a payment that cannot settle the current installment leaves it partially
/// paid and stops there. The input slice is never modified.
pub struct PaymentAllocator;

impl PaymentAllocator {
    pub fn allocate(
        installments: &[Installment],
        amount: Money,
        reference: &str,
        paid_at: DateTime<Utc>,
    ) -> Result<AllocationResult> {
        if !amount.is_positive() || !amount.is_currency_scale() {
            return Err(LedgerError::InvalidPaymentAmount { amount });
        }

        let mut updated = installments.to_vec();
        updated.sort_by_key(|i| i.installment_number);

        let mut remaining = amount;
        let mut allocations = Vec::new();
        let mut installments_paid = 0;

        for installment in updated.iter_mut() {
            if remaining.is_zero() {
                break;
            }
            if installment.status == InstallmentStatus::Paid {
                continue;
            }

            let owed = installment.outstanding_amount;
            if remaining >= owed {
                installment.settle(paid_at, reference);
                remaining -= owed;
                installments_paid += 1;
                allocations.push(InstallmentAllocation {
                    installment_number: installment.installment_number,
                    amount: owed,
                    settled: true,
                });
            } else {
                installment.paid_amount += remaining;
                installment.outstanding_amount -= remaining;
                installment.status = InstallmentStatus::PartiallyPaid;
                installment.paid_date = Some(paid_at);
                installment.payment_reference = Some(reference.to_string());
                allocations.push(InstallmentAllocation {
                    installment_number: installment.installment_number,
                    amount: remaining,
                    settled: false,
                });
                remaining = Money::ZERO;
            }
        }

        Ok(AllocationResult {
            installments: updated,
            allocations,
            installments_paid,
            amount_applied: amount - remaining,
            remainder: remaining,
        })
    }
}

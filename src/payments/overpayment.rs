use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::decimal::Money;
use crate::errors::{LedgerError, Result};

/// what happens to money beyond the schedule's outstanding balance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverpaymentPolicy {
    /// refuse the whole payment, nothing is applied
    Reject,
    /// apply what is owed and drop the rest
    Discard,
}

/// screens a payment against the outstanding balance before allocation
#[derive(Debug, Clone, Copy)]
pub struct OverpaymentHandler {
    policy: OverpaymentPolicy,
}

/// amount the allocator may apply and what will be left over
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OverpaymentCheck {
    pub applicable: Money,
    pub excess: Money,
}

impl OverpaymentHandler {
    pub fn new(policy: OverpaymentPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> OverpaymentPolicy {
        self.policy
    }

    pub fn check(&self, amount: Money, outstanding: Money) -> Result<OverpaymentCheck> {
        if amount <= outstanding {
            return Ok(OverpaymentCheck {
                applicable: amount,
                excess: Money::ZERO,
            });
        }

        let excess = amount - outstanding;
        match self.policy {
            OverpaymentPolicy::Reject => Err(LedgerError::Overpayment {
                outstanding,
                provided: amount,
            }),
            OverpaymentPolicy::Discard => {
                warn!(%amount, %outstanding, %excess, "discarding overpayment");
                Ok(OverpaymentCheck {
                    applicable: outstanding,
                    excess,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_within_balance_passes_under_both_policies() {
        for policy in [OverpaymentPolicy::Reject, OverpaymentPolicy::Discard] {
            let check = OverpaymentHandler::new(policy)
                .check(Money::from_major(100), Money::from_major(100))
                .unwrap();
            assert_eq!(check.applicable, Money::from_major(100));
            assert_eq!(check.excess, Money::ZERO);
        }
    }

    #[test]
    fn test_reject_policy() {
        let err = OverpaymentHandler::new(OverpaymentPolicy::Reject)
            .check(Money::from_major(150), Money::from_major(100))
            .unwrap_err();

        assert!(matches!(err, LedgerError::Overpayment { .. }));
        assert_eq!(err.code(), "OVERPAYMENT");
    }

    #[test]
    fn test_discard_policy() {
        let check = OverpaymentHandler::new(OverpaymentPolicy::Discard)
            .check(Money::from_major(150), Money::from_major(100))
            .unwrap();

        assert_eq!(check.applicable, Money::from_major(100));
        assert_eq!(check.excess, Money::from_major(50));
    }
}

use serde::{Deserialize, Serialize};

use crate::decimal::{Money, Rate};
use crate::errors::{LedgerError, Result};

/// flat penalty charged on the outstanding balance at early payoff
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PrepaymentPenalty {
    pub rate: Rate,
}

/// what it takes to close a schedule today
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EarlyRepaymentQuote {
    pub outstanding_amount: Money,
    pub penalty_rate: Rate,
    pub penalty_amount: Money,
    pub total_required: Money,
}

impl PrepaymentPenalty {
    pub fn new(rate: Rate) -> Self {
        Self { rate }
    }

    /// penalty is rounded to cents before it is added to the balance
    pub fn quote(&self, outstanding_amount: Money) -> EarlyRepaymentQuote {
        let penalty_amount = outstanding_amount.apply_rate(self.rate);

        EarlyRepaymentQuote {
            outstanding_amount,
            penalty_rate: self.rate,
            penalty_amount,
            total_required: (outstanding_amount + penalty_amount).round_currency(),
        }
    }
}

impl EarlyRepaymentQuote {
    /// fails unless `amount` covers balance plus penalty
    pub fn ensure_covered_by(&self, amount: Money) -> Result<()> {
        if amount < self.total_required {
            return Err(LedgerError::InsufficientAmount {
                required: self.total_required,
                provided: amount,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_two_percent_penalty() {
        let penalty = PrepaymentPenalty::new(Rate::from_percentage(2));
        let quote = penalty.quote(Money::from_major(50_000));

        assert_eq!(quote.penalty_amount, Money::from_major(1_000));
        assert_eq!(quote.total_required, Money::from_major(51_000));
    }

    #[test]
    fn test_outstanding_alone_is_not_enough() {
        let penalty = PrepaymentPenalty::new(Rate::from_percentage(2));
        let quote = penalty.quote(Money::from_str_exact("10661.85").unwrap());

        assert_eq!(quote.penalty_amount, Money::from_str_exact("213.24").unwrap());
        let err = quote.ensure_covered_by(quote.outstanding_amount).unwrap_err();
        assert!(matches!(err, LedgerError::InsufficientAmount { .. }));
        assert!(quote.ensure_covered_by(quote.total_required).is_ok());
    }

    #[test]
    fn test_zero_balance_needs_nothing() {
        let quote = PrepaymentPenalty::new(Rate::from_percentage(2)).quote(Money::ZERO);
        assert_eq!(quote.total_required, Money::ZERO);
        assert!(quote.ensure_covered_by(Money::ZERO).is_ok());
    }
}

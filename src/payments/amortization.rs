use chrono::{DateTime, Duration, Months, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tracing::debug;

use crate::decimal::{Money, Rate};
use crate::errors::{LedgerError, Result};
use crate::state::Installment;
use crate::types::Frequency;

/// fixed-payment amortization over a monthly rate basis
///
/// Frequency only moves due dates; the rate is always annual / 12 and the
/// number of installments is always `term_months`. Every monetary field is
/// rounded to cents per installment, so schedule totals are sums of rounded
/// figures and the final installment absorbs the principal drift.
pub struct AmortizationCalculator {
    frequency: Frequency,
}

impl AmortizationCalculator {
    pub fn new(frequency: Frequency) -> Self {
        Self { frequency }
    }

    pub fn frequency(&self) -> Frequency {
        self.frequency
    }

    /// calculate the installment plan, all pending
    pub fn calculate_schedule(
        &self,
        principal: Money,
        annual_rate: Rate,
        term_months: u32,
        start_date: DateTime<Utc>,
    ) -> Result<Vec<Installment>> {
        validate_inputs(principal, annual_rate, term_months)?;

        let monthly_rate = annual_rate.monthly_rate().as_decimal();
        let due_dates = due_dates(start_date, self.frequency, term_months)?;

        let installments = if monthly_rate.is_zero() {
            straight_line(principal, &due_dates)
        } else {
            let payment = fixed_payment(principal, monthly_rate, term_months)?;
            debug!(%principal, %annual_rate, term_months, %payment, "amortizing");
            level_payment(principal, monthly_rate, payment, &due_dates)
        };

        Ok(installments)
    }
}

fn validate_inputs(principal: Money, annual_rate: Rate, term_months: u32) -> Result<()> {
    if term_months < 1 {
        return Err(LedgerError::invalid_argument("term must be at least one month"));
    }

    if !principal.is_currency_scale() {
        return Err(LedgerError::invalid_argument(format!(
            "principal must be in whole cents, got {}",
            principal
        )));
    }

    if !principal.is_positive() {
        return Err(LedgerError::invalid_argument(format!(
            "principal must be positive, got {}",
            principal
        )));
    }

    if annual_rate.is_negative() || annual_rate > Rate::ONE {
        return Err(LedgerError::invalid_argument(format!(
            "annual rate must be between 0% and 100%, got {}",
            annual_rate
        )));
    }

    Ok(())
}

/// zero-rate plan: equal principal slices, remainder in the last one
fn straight_line(principal: Money, due_dates: &[DateTime<Utc>]) -> Vec<Installment> {
    let count = due_dates.len();
    let slice = (principal / Decimal::from(count as u64)).round_currency();
    let mut remaining = principal;

    due_dates
        .iter()
        .enumerate()
        .map(|(idx, due_date)| {
            let principal_portion = if idx + 1 == count {
                remaining
            } else {
                slice.min(remaining)
            };
            remaining -= principal_portion;
            Installment::pending((idx + 1) as u32, *due_date, principal_portion, Money::ZERO)
        })
        .collect()
}

/// level-payment plan with the last installment taking whatever principal remains
fn level_payment(
    principal: Money,
    monthly_rate: Decimal,
    payment: Money,
    due_dates: &[DateTime<Utc>],
) -> Vec<Installment> {
    let count = due_dates.len();
    let mut remaining = principal;

    due_dates
        .iter()
        .enumerate()
        .map(|(idx, due_date)| {
            let interest_portion = (remaining * monthly_rate).round_currency();
            let principal_portion = if idx + 1 == count {
                remaining
            } else {
                (payment - interest_portion).max(Money::ZERO).min(remaining)
            };
            remaining -= principal_portion;
            Installment::pending(
                (idx + 1) as u32,
                *due_date,
                principal_portion,
                interest_portion,
            )
        })
        .collect()
}

/// M = P * r * (1 + r)^n / ((1 + r)^n - 1), rounded to cents
pub fn fixed_payment(principal: Money, monthly_rate: Decimal, months: u32) -> Result<Money> {
    if monthly_rate.is_zero() {
        return Ok((principal / Decimal::from(months)).round_currency());
    }

    let base = Decimal::ONE + monthly_rate;
    let mut compound = Decimal::ONE;
    for _ in 0..months {
        compound = compound
            .checked_mul(base)
            .ok_or_else(|| LedgerError::CalculationError {
                message: format!("compound factor overflow over {} periods", months),
            })?;
    }

    let numerator = principal
        .as_decimal()
        .checked_mul(monthly_rate)
        .and_then(|v| v.checked_mul(compound))
        .ok_or_else(|| LedgerError::CalculationError {
            message: "payment numerator overflow".to_string(),
        })?;
    let denominator = compound - Decimal::ONE;

    Ok(Money::from_decimal(numerator / denominator).round_currency())
}

/// one period after `date`
pub fn advance(date: DateTime<Utc>, frequency: Frequency) -> Result<DateTime<Utc>> {
    let next = match frequency {
        Frequency::Weekly => date.checked_add_signed(Duration::days(7)),
        Frequency::BiWeekly => date.checked_add_signed(Duration::days(14)),
        Frequency::Monthly => date.checked_add_months(Months::new(1)),
    };

    next.ok_or_else(|| LedgerError::CalculationError {
        message: format!("due date out of range after {}", date),
    })
}

/// due dates stepping one period at a time from the previous due date
fn due_dates(start_date: DateTime<Utc>, frequency: Frequency, count: u32) -> Result<Vec<DateTime<Utc>>> {
    let mut dates = Vec::with_capacity(count as usize);
    let mut current = start_date;
    for _ in 0..count {
        current = advance(current, frequency)?;
        dates.push(current);
    }
    Ok(dates)
}

/// annual percentage as supplied by loan records (e.g. 12.5)
pub fn annual_rate_from_percent(percent: Decimal) -> Result<Rate> {
    if percent < Decimal::ZERO || percent > dec!(100) {
        return Err(LedgerError::invalid_argument(format!(
            "interest rate must be between 0 and 100 percent, got {}",
            percent
        )));
    }
    Ok(Rate::from_percent(percent))
}

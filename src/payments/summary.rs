use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::decimal::Money;
use crate::state::Installment;
use crate::types::InstallmentStatus;

/// totals derived from an installment list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ScheduleSummary {
    pub total_principal: Money,
    pub total_interest: Money,
    pub total_amount: Money,
    pub paid_amount: Money,
    pub outstanding_amount: Money,
    pub number_of_installments: u32,
    pub completed_installments: u32,
    /// relative to the `as_of` the summary was computed at
    pub overdue_installments: u32,
}

impl ScheduleSummary {
    /// pure fold over the installments; overdue is judged against `as_of`
    pub fn recompute(installments: &[Installment], as_of: DateTime<Utc>) -> Self {
        let mut summary = installments.iter().fold(
            ScheduleSummary::default(),
            |mut acc, installment| {
                acc.total_principal += installment.principal_amount;
                acc.total_interest += installment.interest_amount;
                acc.total_amount += installment.total_amount;
                acc.paid_amount += installment.paid_amount;
                acc.outstanding_amount += installment.outstanding_amount;
                acc.number_of_installments += 1;
                if installment.status == InstallmentStatus::Paid {
                    acc.completed_installments += 1;
                }
                if installment.is_overdue(as_of) {
                    acc.overdue_installments += 1;
                }
                acc
            },
        );

        summary.total_principal = summary.total_principal.round_currency();
        summary.total_interest = summary.total_interest.round_currency();
        summary.total_amount = summary.total_amount.round_currency();
        summary.paid_amount = summary.paid_amount.round_currency();
        summary.outstanding_amount = summary.outstanding_amount.round_currency();
        summary
    }

    pub fn is_fully_paid(&self) -> bool {
        self.number_of_installments > 0
            && self.completed_installments == self.number_of_installments
    }

    /// summary of a schedule closed in one settlement
    pub fn settled(&self) -> Self {
        Self {
            paid_amount: self.total_amount,
            outstanding_amount: Money::ZERO,
            completed_installments: self.number_of_installments,
            overdue_installments: 0,
            ..self.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn installments(now: DateTime<Utc>) -> Vec<Installment> {
        let mut list: Vec<Installment> = (1..=4)
            .map(|n| {
                Installment::pending(
                    n,
                    now + Duration::days(30 * (n as i64 - 2) - 1),
                    Money::from_major(100),
                    Money::from_str_exact("2.50").unwrap(),
                )
            })
            .collect();

        // #1 paid, #2 partially paid and overdue, #3 and #4 in the future
        list[0].settle(now - Duration::days(30), "ref-1");
        list[1].paid_amount = Money::from_major(40);
        list[1].outstanding_amount = Money::from_str_exact("62.50").unwrap();
        list[1].status = InstallmentStatus::PartiallyPaid;
        list
    }

    #[test]
    fn test_totals_and_counts() {
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        let summary = ScheduleSummary::recompute(&installments(now), now);

        assert_eq!(summary.total_principal, Money::from_major(400));
        assert_eq!(summary.total_interest, Money::from_major(10));
        assert_eq!(summary.total_amount, Money::from_major(410));
        assert_eq!(summary.paid_amount, Money::from_str_exact("142.50").unwrap());
        assert_eq!(summary.outstanding_amount, Money::from_str_exact("267.50").unwrap());
        assert_eq!(summary.number_of_installments, 4);
        assert_eq!(summary.completed_installments, 1);
        assert_eq!(summary.overdue_installments, 1);
        assert!(!summary.is_fully_paid());
    }

    #[test]
    fn test_recompute_is_idempotent() {
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        let list = installments(now);

        let first = ScheduleSummary::recompute(&list, now);
        let second = ScheduleSummary::recompute(&list, now);
        assert_eq!(first, second);
    }

    #[test]
    fn test_overdue_tracks_as_of() {
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        let mut list = installments(now);

        let later = ScheduleSummary::recompute(&list, now + Duration::days(31));
        assert_eq!(later.overdue_installments, 2);

        // paying the overdue installment removes it from the count
        list[1].settle(now, "ref-2");
        let after_payment = ScheduleSummary::recompute(&list, now);
        assert_eq!(after_payment.overdue_installments, 0);
        assert_eq!(after_payment.completed_installments, 2);
    }

    #[test]
    fn test_settled_summary() {
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        let summary = ScheduleSummary::recompute(&installments(now), now).settled();

        assert_eq!(summary.paid_amount, summary.total_amount);
        assert_eq!(summary.outstanding_amount, Money::ZERO);
        assert!(summary.is_fully_paid());
    }

    #[test]
    fn test_empty_list() {
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        let summary = ScheduleSummary::recompute(&[], now);
        assert_eq!(summary, ScheduleSummary::default());
        assert!(!summary.is_fully_paid());
    }
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::decimal::{Money, Rate};
use crate::interest::penalty::{EarlyRepaymentQuote, PrepaymentPenalty};
use crate::payments::ScheduleSummary;
use crate::types::{
    DisbursementId, DueStatus, InstallmentStatus, LoanDetails, LoanId, ScheduleId, ScheduleStatus,
};

/// one scheduled payment obligation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Installment {
    /// 1-based position in the schedule
    pub installment_number: u32,
    pub due_date: DateTime<Utc>,
    pub principal_amount: Money,
    pub interest_amount: Money,
    pub total_amount: Money,
    pub paid_amount: Money,
    pub outstanding_amount: Money,
    pub status: InstallmentStatus,
    pub paid_date: Option<DateTime<Utc>>,
    pub payment_reference: Option<String>,
}

impl Installment {
    /// unpaid installment, total = principal + interest
    pub fn pending(
        installment_number: u32,
        due_date: DateTime<Utc>,
        principal_amount: Money,
        interest_amount: Money,
    ) -> Self {
        let total_amount = principal_amount + interest_amount;
        Self {
            installment_number,
            due_date,
            principal_amount,
            interest_amount,
            total_amount,
            paid_amount: Money::ZERO,
            outstanding_amount: total_amount,
            status: InstallmentStatus::Pending,
            paid_date: None,
            payment_reference: None,
        }
    }

    pub fn is_open(&self) -> bool {
        self.status.is_open()
    }

    /// open and due strictly before `as_of`
    pub fn is_overdue(&self, as_of: DateTime<Utc>) -> bool {
        self.is_open() && self.due_date < as_of
    }

    /// status as seen by a reader at `as_of`
    pub fn effective_status(&self, as_of: DateTime<Utc>) -> DueStatus {
        if self.is_overdue(as_of) {
            DueStatus::Overdue
        } else {
            self.status.into()
        }
    }

    /// settle whatever is still owed
    pub(crate) fn settle(&mut self, paid_date: DateTime<Utc>, reference: &str) {
        self.paid_amount = self.total_amount;
        self.outstanding_amount = Money::ZERO;
        self.status = InstallmentStatus::Paid;
        self.paid_date = Some(paid_date);
        self.payment_reference = Some(reference.to_string());
    }
}

/// early payoff record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EarlyRepayment {
    pub is_early_repayment: bool,
    pub early_repayment_date: DateTime<Utc>,
    pub early_repayment_amount: Money,
    pub penalty_amount: Money,
}

/// repayment schedule aggregate, one per loan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepaymentSchedule {
    pub id: ScheduleId,
    pub loan_application_id: LoanId,
    pub disbursement_id: DisbursementId,
    pub loan_details: LoanDetails,
    pub installments: Vec<Installment>,
    pub summary: ScheduleSummary,
    pub status: ScheduleStatus,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub last_payment_date: Option<DateTime<Utc>>,
    pub next_payment_date: Option<DateTime<Utc>>,
    pub early_repayment: Option<EarlyRepayment>,
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl RepaymentSchedule {
    /// fresh active schedule at version 0
    pub fn new(
        loan_application_id: LoanId,
        disbursement_id: DisbursementId,
        loan_details: LoanDetails,
        installments: Vec<Installment>,
        start_date: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Self {
        let summary = ScheduleSummary::recompute(&installments, now);
        let end_date = installments.last().map(|i| i.due_date).unwrap_or(start_date);
        let next_payment_date = next_payment_date(&installments);

        Self {
            id: Uuid::new_v4(),
            loan_application_id,
            disbursement_id,
            loan_details,
            installments,
            summary,
            status: ScheduleStatus::Active,
            start_date,
            end_date,
            last_payment_date: None,
            next_payment_date,
            early_repayment: None,
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == ScheduleStatus::Active
    }

    /// earliest installment still owing money
    pub fn next_due_installment(&self) -> Option<&Installment> {
        self.installments.iter().find(|i| i.is_open())
    }

    pub fn has_overdue_installments(&self, as_of: DateTime<Utc>) -> bool {
        self.installments.iter().any(|i| i.is_overdue(as_of))
    }

    /// true iff every installment is paid
    pub fn all_installments_paid(&self) -> bool {
        self.installments
            .iter()
            .all(|i| i.status == InstallmentStatus::Paid)
    }

    /// amount required to close the schedule today
    pub fn payoff_quote(&self, penalty_rate: Rate) -> EarlyRepaymentQuote {
        PrepaymentPenalty::new(penalty_rate).quote(self.summary.outstanding_amount)
    }
}

/// earliest open installment's due date
pub fn next_payment_date(installments: &[Installment]) -> Option<DateTime<Utc>> {
    installments
        .iter()
        .find(|i| i.is_open())
        .map(|i| i.due_date)
}

/// mutable portion of a schedule, written as a whole under a version check
#[derive(Debug, Clone, PartialEq)]
pub struct SchedulePatch {
    pub expected_version: u64,
    pub installments: Vec<Installment>,
    pub summary: ScheduleSummary,
    pub status: ScheduleStatus,
    pub last_payment_date: Option<DateTime<Utc>>,
    pub next_payment_date: Option<DateTime<Utc>>,
    pub early_repayment: Option<EarlyRepayment>,
    pub updated_at: DateTime<Utc>,
}

impl SchedulePatch {
    /// capture the mutable fields of `updated`, guarded by the version it was read at
    pub fn from_schedule(updated: &RepaymentSchedule, expected_version: u64) -> Self {
        Self {
            expected_version,
            installments: updated.installments.clone(),
            summary: updated.summary.clone(),
            status: updated.status,
            last_payment_date: updated.last_payment_date,
            next_payment_date: updated.next_payment_date,
            early_repayment: updated.early_repayment.clone(),
            updated_at: updated.updated_at,
        }
    }

    /// write onto a stored schedule and bump its version
    pub fn apply_to(self, schedule: &mut RepaymentSchedule) {
        schedule.installments = self.installments;
        schedule.summary = self.summary;
        schedule.status = self.status;
        schedule.last_payment_date = self.last_payment_date;
        schedule.next_payment_date = self.next_payment_date;
        schedule.early_repayment = self.early_repayment;
        schedule.updated_at = self.updated_at;
        schedule.version += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Frequency;
    use chrono::{Duration, TimeZone};

    fn sample_schedule(now: DateTime<Utc>) -> RepaymentSchedule {
        let installments = (1..=3)
            .map(|n| {
                Installment::pending(
                    n,
                    now + Duration::days(30 * n as i64),
                    Money::from_major(100),
                    Money::from_major(5),
                )
            })
            .collect();

        RepaymentSchedule::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            LoanDetails {
                principal_amount: Money::from_major(300),
                interest_rate: Rate::from_percentage(12),
                term_months: 3,
                frequency: Frequency::Monthly,
            },
            installments,
            now,
            now,
        )
    }

    #[test]
    fn test_new_schedule_dates_and_totals() {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let schedule = sample_schedule(now);

        assert_eq!(schedule.status, ScheduleStatus::Active);
        assert_eq!(schedule.version, 0);
        assert_eq!(schedule.end_date, now + Duration::days(90));
        assert_eq!(schedule.next_payment_date, Some(now + Duration::days(30)));
        assert_eq!(schedule.summary.total_amount, Money::from_major(315));
        assert_eq!(schedule.summary.outstanding_amount, Money::from_major(315));
    }

    #[test]
    fn test_effective_status_marks_overdue() {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let schedule = sample_schedule(now);
        let first = &schedule.installments[0];

        assert_eq!(first.effective_status(now), DueStatus::Pending);
        assert_eq!(
            first.effective_status(now + Duration::days(31)),
            DueStatus::Overdue
        );
        assert_eq!(first.status, InstallmentStatus::Pending);
        assert!(schedule.has_overdue_installments(now + Duration::days(31)));
    }

    #[test]
    fn test_patch_bumps_version() {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let mut stored = sample_schedule(now);
        let mut updated = stored.clone();
        updated.installments[0].settle(now, "ref-1");
        updated.next_payment_date = next_payment_date(&updated.installments);

        SchedulePatch::from_schedule(&updated, stored.version).apply_to(&mut stored);

        assert_eq!(stored.version, 1);
        assert_eq!(stored.installments[0].status, InstallmentStatus::Paid);
        assert_eq!(stored.next_payment_date, Some(now + Duration::days(60)));
    }

    #[test]
    fn test_payoff_quote() {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let schedule = sample_schedule(now);
        let quote = schedule.payoff_quote(Rate::from_percentage(2));

        assert_eq!(quote.outstanding_amount, Money::from_major(315));
        assert_eq!(quote.penalty_amount, Money::from_str_exact("6.30").unwrap());
        assert_eq!(quote.total_required, Money::from_str_exact("321.30").unwrap());
    }
}

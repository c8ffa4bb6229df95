/// serializable read models for schedules
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::decimal::{Money, Rate};
use crate::payments::ScheduleSummary;
use crate::state::RepaymentSchedule;
use crate::types::{
    DisbursementId, DueStatus, Frequency, LoanId, ScheduleId, ScheduleStatus,
};

/// schedule as presented to a reader at `as_of`
#[derive(Debug, Serialize, Deserialize)]
pub struct ScheduleView {
    pub id: ScheduleId,
    pub loan_application_id: LoanId,
    pub disbursement_id: DisbursementId,
    pub status: ScheduleStatus,
    pub as_of: DateTime<Utc>,
    pub terms: TermsView,
    pub summary: ScheduleSummary,
    pub installments: Vec<InstallmentView>,
    pub dates: DatesView,
    pub early_repayment: Option<EarlyRepaymentView>,
    pub version: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TermsView {
    pub principal_amount: Money,
    pub interest_rate: Rate,
    pub term_months: u32,
    pub frequency: Frequency,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct InstallmentView {
    pub installment_number: u32,
    pub due_date: DateTime<Utc>,
    pub principal_amount: Money,
    pub interest_amount: Money,
    pub total_amount: Money,
    pub paid_amount: Money,
    pub outstanding_amount: Money,
    /// overdue is derived from `as_of`, never stored
    pub status: DueStatus,
    pub paid_date: Option<DateTime<Utc>>,
    pub payment_reference: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DatesView {
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub last_payment_date: Option<DateTime<Utc>>,
    pub next_payment_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct EarlyRepaymentView {
    pub date: DateTime<Utc>,
    pub amount: Money,
    pub penalty_amount: Money,
}

impl ScheduleView {
    pub fn from_schedule(schedule: &RepaymentSchedule, as_of: DateTime<Utc>) -> Self {
        ScheduleView {
            id: schedule.id,
            loan_application_id: schedule.loan_application_id,
            disbursement_id: schedule.disbursement_id,
            status: schedule.status,
            as_of,
            terms: TermsView {
                principal_amount: schedule.loan_details.principal_amount,
                interest_rate: schedule.loan_details.interest_rate,
                term_months: schedule.loan_details.term_months,
                frequency: schedule.loan_details.frequency,
            },
            summary: ScheduleSummary::recompute(&schedule.installments, as_of),
            installments: schedule
                .installments
                .iter()
                .map(|i| InstallmentView {
                    installment_number: i.installment_number,
                    due_date: i.due_date,
                    principal_amount: i.principal_amount,
                    interest_amount: i.interest_amount,
                    total_amount: i.total_amount,
                    paid_amount: i.paid_amount,
                    outstanding_amount: i.outstanding_amount,
                    status: i.effective_status(as_of),
                    paid_date: i.paid_date,
                    payment_reference: i.payment_reference.clone(),
                })
                .collect(),
            dates: DatesView {
                start_date: schedule.start_date,
                end_date: schedule.end_date,
                last_payment_date: schedule.last_payment_date,
                next_payment_date: schedule.next_payment_date,
                created_at: schedule.created_at,
                updated_at: schedule.updated_at,
            },
            early_repayment: schedule
                .early_repayment
                .as_ref()
                .filter(|e| e.is_early_repayment)
                .map(|e| EarlyRepaymentView {
                    date: e.early_repayment_date,
                    amount: e.early_repayment_amount,
                    penalty_amount: e.penalty_amount,
                }),
            version: schedule.version,
        }
    }

    /// convert to pretty-printed json string
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payments::AmortizationCalculator;
    use crate::types::{InstallmentStatus, LoanDetails};
    use chrono::{Duration, TimeZone};
    use uuid::Uuid;

    fn schedule() -> RepaymentSchedule {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let details = LoanDetails {
            principal_amount: Money::from_major(1_000),
            interest_rate: Rate::from_percentage(0),
            term_months: 3,
            frequency: Frequency::Monthly,
        };
        let installments = AmortizationCalculator::new(Frequency::Monthly)
            .calculate_schedule(details.principal_amount, details.interest_rate, 3, start)
            .unwrap();
        RepaymentSchedule::new(Uuid::new_v4(), Uuid::new_v4(), details, installments, start, start)
    }

    #[test]
    fn test_view_marks_overdue_at_as_of() {
        let schedule = schedule();
        let as_of = schedule.installments[0].due_date + Duration::days(3);
        let view = ScheduleView::from_schedule(&schedule, as_of);

        assert_eq!(view.installments[0].status, DueStatus::Overdue);
        assert_eq!(view.installments[1].status, DueStatus::Pending);
        assert_eq!(view.summary.overdue_installments, 1);
        // stored data is untouched
        assert_eq!(schedule.installments[0].status, InstallmentStatus::Pending);
        assert!(view.early_repayment.is_none());
    }

    #[test]
    fn test_json_uses_decimal_strings() {
        let schedule = schedule();
        let view = ScheduleView::from_schedule(&schedule, schedule.start_date);
        let json: serde_json::Value =
            serde_json::from_str(&view.to_json_pretty().unwrap()).unwrap();

        assert_eq!(json["status"], "active");
        assert_eq!(json["installments"][2]["total_amount"], "333.34");
        assert_eq!(json["terms"]["frequency"], "monthly");
    }
}

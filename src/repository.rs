use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::errors::{LedgerError, Result};
use crate::state::{RepaymentSchedule, SchedulePatch};
use crate::types::{LoanId, ScheduleId};

/// persistence for schedule aggregates
#[async_trait]
pub trait ScheduleRepository: Send + Sync {
    /// `ScheduleAlreadyExists` if the loan already has a schedule
    async fn create(&self, schedule: RepaymentSchedule) -> Result<RepaymentSchedule>;

    async fn find_by_id(&self, id: ScheduleId) -> Result<Option<RepaymentSchedule>>;

    async fn find_by_loan_id(&self, loan_id: LoanId) -> Result<Option<RepaymentSchedule>>;

    /// `Ok(None)` when missing, `VersionConflict` when the stored version moved on
    async fn update(&self, id: ScheduleId, patch: SchedulePatch) -> Result<Option<RepaymentSchedule>>;

    /// active schedules with an open installment due before `as_of`
    async fn find_overdue(&self, as_of: DateTime<Utc>) -> Result<Vec<RepaymentSchedule>>;

    /// active schedules whose next payment falls within `days_ahead` of `as_of`
    async fn find_upcoming(&self, as_of: DateTime<Utc>, days_ahead: u32) -> Result<Vec<RepaymentSchedule>>;
}

/// map-backed repository
#[derive(Debug, Default)]
pub struct InMemoryScheduleRepository {
    schedules: RwLock<HashMap<ScheduleId, RepaymentSchedule>>,
}

impl InMemoryScheduleRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.schedules.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.schedules.read().await.is_empty()
    }
}

fn by_next_payment(mut schedules: Vec<RepaymentSchedule>) -> Vec<RepaymentSchedule> {
    schedules.sort_by_key(|s| (s.next_payment_date, s.id));
    schedules
}

#[async_trait]
impl ScheduleRepository for InMemoryScheduleRepository {
    async fn create(&self, schedule: RepaymentSchedule) -> Result<RepaymentSchedule> {
        let mut schedules = self.schedules.write().await;

        let loan_id = schedule.loan_application_id;
        if schedules.values().any(|s| s.loan_application_id == loan_id) {
            return Err(LedgerError::ScheduleAlreadyExists { loan_id });
        }

        schedules.insert(schedule.id, schedule.clone());
        Ok(schedule)
    }

    async fn find_by_id(&self, id: ScheduleId) -> Result<Option<RepaymentSchedule>> {
        Ok(self.schedules.read().await.get(&id).cloned())
    }

    async fn find_by_loan_id(&self, loan_id: LoanId) -> Result<Option<RepaymentSchedule>> {
        Ok(self
            .schedules
            .read()
            .await
            .values()
            .find(|s| s.loan_application_id == loan_id)
            .cloned())
    }

    async fn update(&self, id: ScheduleId, patch: SchedulePatch) -> Result<Option<RepaymentSchedule>> {
        let mut schedules = self.schedules.write().await;

        let stored = match schedules.get_mut(&id) {
            Some(stored) => stored,
            None => return Ok(None),
        };

        if stored.version != patch.expected_version {
            return Err(LedgerError::VersionConflict {
                schedule_id: id,
                expected: patch.expected_version,
                actual: stored.version,
            });
        }

        patch.apply_to(stored);
        Ok(Some(stored.clone()))
    }

    async fn find_overdue(&self, as_of: DateTime<Utc>) -> Result<Vec<RepaymentSchedule>> {
        let schedules = self.schedules.read().await;
        let overdue = schedules
            .values()
            .filter(|s| s.is_active() && s.has_overdue_installments(as_of))
            .cloned()
            .collect();
        Ok(by_next_payment(overdue))
    }

    async fn find_upcoming(&self, as_of: DateTime<Utc>, days_ahead: u32) -> Result<Vec<RepaymentSchedule>> {
        // windows running past chrono's range cover everything after as_of
        let horizon = as_of
            .checked_add_signed(Duration::days(days_ahead as i64))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        let schedules = self.schedules.read().await;
        let upcoming = schedules
            .values()
            .filter(|s| s.is_active())
            .filter(|s| {
                s.next_payment_date
                    .map(|due| due >= as_of && due <= horizon)
                    .unwrap_or(false)
            })
            .cloned()
            .collect();
        Ok(by_next_payment(upcoming))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decimal::{Money, Rate};
    use crate::payments::AmortizationCalculator;
    use crate::types::{Frequency, LoanDetails, ScheduleStatus};
    use chrono::TimeZone;
    use uuid::Uuid;

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
    }

    fn schedule_starting(start: DateTime<Utc>) -> RepaymentSchedule {
        let details = LoanDetails {
            principal_amount: Money::from_major(1_200),
            interest_rate: Rate::from_percentage(12),
            term_months: 3,
            frequency: Frequency::Monthly,
        };
        let installments = AmortizationCalculator::new(Frequency::Monthly)
            .calculate_schedule(details.principal_amount, details.interest_rate, 3, start)
            .unwrap();
        RepaymentSchedule::new(Uuid::new_v4(), Uuid::new_v4(), details, installments, start, start)
    }

    #[tokio::test]
    async fn test_create_and_find() {
        let repo = InMemoryScheduleRepository::new();
        let schedule = repo.create(schedule_starting(start())).await.unwrap();

        let by_id = repo.find_by_id(schedule.id).await.unwrap().unwrap();
        assert_eq!(by_id, schedule);

        let by_loan = repo.find_by_loan_id(schedule.loan_application_id).await.unwrap().unwrap();
        assert_eq!(by_loan.id, schedule.id);

        assert!(repo.find_by_id(Uuid::new_v4()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_one_schedule_per_loan() {
        let repo = InMemoryScheduleRepository::new();
        let first = repo.create(schedule_starting(start())).await.unwrap();

        let mut duplicate = schedule_starting(start());
        duplicate.loan_application_id = first.loan_application_id;

        let err = repo.create(duplicate).await.unwrap_err();
        assert!(matches!(err, LedgerError::ScheduleAlreadyExists { .. }));
        assert_eq!(repo.len().await, 1);
    }

    #[tokio::test]
    async fn test_update_checks_version() {
        let repo = InMemoryScheduleRepository::new();
        let schedule = repo.create(schedule_starting(start())).await.unwrap();

        let mut changed = schedule.clone();
        changed.status = ScheduleStatus::Completed;

        let updated = repo
            .update(schedule.id, SchedulePatch::from_schedule(&changed, 0))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.version, 1);
        assert_eq!(updated.status, ScheduleStatus::Completed);

        // a writer that read version 0 is now stale
        let err = repo
            .update(schedule.id, SchedulePatch::from_schedule(&changed, 0))
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::VersionConflict { expected: 0, actual: 1, .. }));

        let missing = repo
            .update(Uuid::new_v4(), SchedulePatch::from_schedule(&changed, 0))
            .await
            .unwrap();
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn test_overdue_and_upcoming_queries() {
        let repo = InMemoryScheduleRepository::new();
        let early = repo.create(schedule_starting(start())).await.unwrap();
        let late = repo
            .create(schedule_starting(start() + Duration::days(20)))
            .await
            .unwrap();

        // 2024-02-05: early's first installment (02-01) is overdue, late's (02-21) is not
        let as_of = Utc.with_ymd_and_hms(2024, 2, 5, 0, 0, 0).unwrap();
        let overdue = repo.find_overdue(as_of).await.unwrap();
        assert_eq!(overdue.len(), 1);
        assert_eq!(overdue[0].id, early.id);

        let upcoming = repo.find_upcoming(as_of, 20).await.unwrap();
        assert_eq!(upcoming.len(), 1);
        assert_eq!(upcoming[0].id, late.id);

        assert!(repo.find_upcoming(as_of, 7).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_upcoming_with_unbounded_window() {
        let repo = InMemoryScheduleRepository::new();
        repo.create(schedule_starting(start())).await.unwrap();
        repo.create(schedule_starting(start() + Duration::days(400))).await.unwrap();

        let upcoming = repo.find_upcoming(start(), u32::MAX).await.unwrap();
        assert_eq!(upcoming.len(), 2);
    }
}

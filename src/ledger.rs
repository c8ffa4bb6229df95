use chrono::{DateTime, Utc};
use hourglass_rs::{SafeTimeProvider, TimeSource};
use std::sync::Arc;
use tracing::{info, instrument, warn};

use crate::config::LedgerConfig;
use crate::decimal::Money;
use crate::directory::{DisbursementStatus, LoanDirectory};
use crate::errors::{LedgerError, Result};
use crate::events::{EventEnvelope, EventSink, ScheduleEvent};
use crate::interest::EarlyRepaymentQuote;
use crate::lock::{disbursement_key, schedule_key, DistributedLock, InMemoryLock, Lease, LockManager};
use crate::payments::amortization::annual_rate_from_percent;
use crate::payments::{
    AmortizationCalculator, OverpaymentHandler, PaymentAllocator, PaymentRequest, ScheduleSummary,
};
use crate::repository::ScheduleRepository;
use crate::state::{next_payment_date, EarlyRepayment, RepaymentSchedule, SchedulePatch};
use crate::types::{Actor, DisbursementId, LoanDetails, LoanId, ScheduleId, ScheduleStatus};

/// payment reference stamped on installments closed by an early payoff
pub const EARLY_REPAYMENT_REFERENCE: &str = "early-repayment";

/// what a recorded payment did, for the events emitted after commit
struct PaymentOutcome {
    installments_paid: u32,
    discarded: Money,
    completed: bool,
}

/// stateful front end over the schedule store
///
/// Every mutation of one schedule runs under the `schedule:<id>` lock and
/// commits through a version-checked patch. Events are published after the
/// lock is released; a failed publish is logged and never undoes the write.
pub struct ScheduleLedger {
    repository: Arc<dyn ScheduleRepository>,
    directory: Arc<dyn LoanDirectory>,
    events: Arc<dyn EventSink>,
    locks: LockManager,
    time: Arc<SafeTimeProvider>,
    config: LedgerConfig,
}

impl ScheduleLedger {
    pub fn builder() -> ScheduleLedgerBuilder {
        ScheduleLedgerBuilder::new()
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    fn now(&self) -> DateTime<Utc> {
        self.time.now()
    }

    /// build and persist the schedule for a completed disbursement
    #[instrument(skip(self))]
    pub async fn generate_from_disbursement(
        &self,
        disbursement_id: DisbursementId,
        actor: Actor,
    ) -> Result<RepaymentSchedule> {
        let key = disbursement_key(disbursement_id);
        let schedule = self
            .locks
            .with_lock(&key, |lease| self.create_schedule(disbursement_id, lease))
            .await?;

        info!(
            schedule_id = %schedule.id,
            loan_id = %schedule.loan_application_id,
            installments = schedule.installments.len(),
            "repayment schedule created"
        );

        self.publish(
            ScheduleEvent::Created {
                schedule_id: schedule.id,
                loan_application_id: schedule.loan_application_id,
                disbursement_id,
                number_of_installments: schedule.summary.number_of_installments,
                total_amount: schedule.summary.total_amount,
                timestamp: schedule.created_at,
            },
            &actor,
        )
        .await;

        Ok(schedule)
    }

    async fn create_schedule(
        &self,
        disbursement_id: DisbursementId,
        lease: Lease,
    ) -> Result<RepaymentSchedule> {
        let disbursement = self
            .directory
            .find_disbursement(disbursement_id)
            .await?
            .ok_or(LedgerError::NotFound {
                entity: "disbursement",
                id: disbursement_id,
            })?;

        if disbursement.status != DisbursementStatus::Completed {
            return Err(LedgerError::DisbursementNotCompleted { id: disbursement_id });
        }

        let loan_id = disbursement.loan_application_id;
        let loan = self
            .directory
            .find_loan(loan_id)
            .await?
            .ok_or(LedgerError::NotFound {
                entity: "loan_application",
                id: loan_id,
            })?;

        if self.repository.find_by_loan_id(loan_id).await?.is_some() {
            return Err(LedgerError::ScheduleAlreadyExists { loan_id });
        }

        let interest_rate = annual_rate_from_percent(loan.interest_rate_percent)?;
        let frequency = self.config.schedule_frequency;
        let start_date = disbursement.disbursed_at;

        let installments = AmortizationCalculator::new(frequency).calculate_schedule(
            loan.principal_amount,
            interest_rate,
            loan.term_months,
            start_date,
        )?;

        let details = LoanDetails {
            principal_amount: loan.principal_amount,
            interest_rate,
            term_months: loan.term_months,
            frequency,
        };
        let schedule = RepaymentSchedule::new(
            loan_id,
            disbursement_id,
            details,
            installments,
            start_date,
            self.now(),
        );

        lease.ensure_valid()?;
        self.repository.create(schedule).await
    }

    /// apply a payment oldest installment first
    #[instrument(skip(self))]
    pub async fn record_payment(
        &self,
        schedule_id: ScheduleId,
        amount: Money,
        reference: &str,
        actor: Actor,
    ) -> Result<RepaymentSchedule> {
        let request = PaymentRequest::new(schedule_id, amount, reference, actor);
        request.validate()?;

        let key = schedule_key(schedule_id);
        let (schedule, outcome) = self
            .locks
            .with_lock(&key, |lease| self.apply_payment(&request, lease))
            .await?;

        info!(
            %schedule_id,
            %amount,
            installments_paid = outcome.installments_paid,
            remaining = %schedule.summary.outstanding_amount,
            "payment recorded"
        );

        self.publish(
            ScheduleEvent::PaymentRecorded {
                schedule_id,
                loan_application_id: schedule.loan_application_id,
                amount,
                reference: request.reference.clone(),
                installments_paid: outcome.installments_paid,
                remaining_balance: schedule.summary.outstanding_amount,
                discarded_amount: outcome.discarded,
                timestamp: schedule.updated_at,
            },
            &request.actor,
        )
        .await;

        if outcome.completed {
            info!(%schedule_id, "repayment schedule completed");
            self.publish(
                ScheduleEvent::Completed {
                    schedule_id,
                    loan_application_id: schedule.loan_application_id,
                    total_paid: schedule.summary.paid_amount,
                    timestamp: schedule.updated_at,
                },
                &request.actor,
            )
            .await;
        }

        Ok(schedule)
    }

    async fn apply_payment(
        &self,
        request: &PaymentRequest,
        lease: Lease,
    ) -> Result<(RepaymentSchedule, PaymentOutcome)> {
        let schedule = self.load(request.schedule_id).await?;
        if !schedule.is_active() {
            return Err(LedgerError::InactiveSchedule {
                status: schedule.status,
            });
        }

        let now = self.now();
        let check = OverpaymentHandler::new(self.config.overpayment_policy)
            .check(request.amount, schedule.summary.outstanding_amount)?;
        let allocation = PaymentAllocator::allocate(
            &schedule.installments,
            check.applicable,
            &request.reference,
            now,
        )?;

        let mut updated = schedule.clone();
        updated.installments = allocation.installments;
        updated.summary = ScheduleSummary::recompute(&updated.installments, now);
        updated.next_payment_date = next_payment_date(&updated.installments);
        updated.last_payment_date = Some(now);
        updated.updated_at = now;

        let completed = updated.all_installments_paid();
        if completed {
            updated.status = ScheduleStatus::Completed;
        }

        lease.ensure_valid()?;
        let committed = self.commit(&updated, schedule.version).await?;

        Ok((
            committed,
            PaymentOutcome {
                installments_paid: allocation.installments_paid,
                discarded: check.excess + allocation.remainder,
                completed,
            },
        ))
    }

    /// close the schedule in one payment covering balance plus penalty
    #[instrument(skip(self))]
    pub async fn process_early_repayment(
        &self,
        schedule_id: ScheduleId,
        amount: Money,
        actor: Actor,
    ) -> Result<RepaymentSchedule> {
        if !amount.is_positive() || !amount.is_currency_scale() {
            return Err(LedgerError::InvalidPaymentAmount { amount });
        }

        let key = schedule_key(schedule_id);
        let (schedule, quote) = self
            .locks
            .with_lock(&key, |lease| self.apply_early_repayment(schedule_id, amount, lease))
            .await?;

        info!(
            %schedule_id,
            %amount,
            penalty = %quote.penalty_amount,
            "early repayment processed"
        );

        self.publish(
            ScheduleEvent::EarlyRepayment {
                schedule_id,
                loan_application_id: schedule.loan_application_id,
                amount,
                outstanding_settled: quote.outstanding_amount,
                penalty_amount: quote.penalty_amount,
                timestamp: schedule.updated_at,
            },
            &actor,
        )
        .await;

        Ok(schedule)
    }

    async fn apply_early_repayment(
        &self,
        schedule_id: ScheduleId,
        amount: Money,
        lease: Lease,
    ) -> Result<(RepaymentSchedule, EarlyRepaymentQuote)> {
        let schedule = self.load(schedule_id).await?;
        if !schedule.is_active() {
            return Err(LedgerError::InactiveSchedule {
                status: schedule.status,
            });
        }

        let now = self.now();
        let current = self.with_current_summary(schedule.clone(), now);
        let quote = current.payoff_quote(self.config.early_repayment_penalty_rate);
        quote.ensure_covered_by(amount)?;

        let mut updated = schedule.clone();
        for installment in updated.installments.iter_mut().filter(|i| i.is_open()) {
            installment.settle(now, EARLY_REPAYMENT_REFERENCE);
        }
        updated.summary = ScheduleSummary::recompute(&updated.installments, now).settled();
        updated.status = ScheduleStatus::Completed;
        updated.next_payment_date = None;
        updated.last_payment_date = Some(now);
        updated.early_repayment = Some(EarlyRepayment {
            is_early_repayment: true,
            early_repayment_date: now,
            early_repayment_amount: amount,
            penalty_amount: quote.penalty_amount,
        });
        updated.updated_at = now;

        lease.ensure_valid()?;
        let committed = self.commit(&updated, schedule.version).await?;
        Ok((committed, quote))
    }

    /// amount that would close the schedule right now
    pub async fn payoff_quote(&self, schedule_id: ScheduleId) -> Result<EarlyRepaymentQuote> {
        let schedule = self.get_schedule(schedule_id).await?;
        if !schedule.is_active() {
            return Err(LedgerError::InactiveSchedule {
                status: schedule.status,
            });
        }
        Ok(schedule.payoff_quote(self.config.early_repayment_penalty_rate))
    }

    pub async fn get_schedule(&self, schedule_id: ScheduleId) -> Result<RepaymentSchedule> {
        let schedule = self.load(schedule_id).await?;
        Ok(self.with_current_summary(schedule, self.now()))
    }

    pub async fn get_schedule_by_loan_id(&self, loan_id: LoanId) -> Result<RepaymentSchedule> {
        let schedule = self
            .repository
            .find_by_loan_id(loan_id)
            .await?
            .ok_or(LedgerError::NotFound {
                entity: "repayment_schedule",
                id: loan_id,
            })?;
        Ok(self.with_current_summary(schedule, self.now()))
    }

    /// active schedules with an installment past due as of now
    pub async fn get_overdue_schedules(&self) -> Result<Vec<RepaymentSchedule>> {
        let now = self.now();
        let schedules = self.repository.find_overdue(now).await?;
        Ok(schedules
            .into_iter()
            .map(|s| self.with_current_summary(s, now))
            .collect())
    }

    /// active schedules with a payment due within `days_ahead` days
    pub async fn get_upcoming_payments(&self, days_ahead: u32) -> Result<Vec<RepaymentSchedule>> {
        let now = self.now();
        let schedules = self.repository.find_upcoming(now, days_ahead).await?;
        Ok(schedules
            .into_iter()
            .map(|s| self.with_current_summary(s, now))
            .collect())
    }

    /// upcoming payments over the configured reminder window
    pub async fn get_upcoming_payments_default(&self) -> Result<Vec<RepaymentSchedule>> {
        self.get_upcoming_payments(self.config.upcoming_window_days).await
    }

    async fn load(&self, schedule_id: ScheduleId) -> Result<RepaymentSchedule> {
        self.repository
            .find_by_id(schedule_id)
            .await?
            .ok_or(LedgerError::NotFound {
                entity: "repayment_schedule",
                id: schedule_id,
            })
    }

    async fn commit(&self, updated: &RepaymentSchedule, read_version: u64) -> Result<RepaymentSchedule> {
        let patch = SchedulePatch::from_schedule(updated, read_version);
        self.repository
            .update(updated.id, patch)
            .await?
            .ok_or(LedgerError::NotFound {
                entity: "repayment_schedule",
                id: updated.id,
            })
    }

    /// overdue counts are relative to the reader's clock, not the last write
    fn with_current_summary(&self, mut schedule: RepaymentSchedule, now: DateTime<Utc>) -> RepaymentSchedule {
        schedule.summary = ScheduleSummary::recompute(&schedule.installments, now);
        schedule
    }

    async fn publish(&self, event: ScheduleEvent, actor: &Actor) {
        let event_type = event.event_type();
        let schedule_id = event.schedule_id();

        let envelope = match EventEnvelope::new(&event, *actor) {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!(event_type, %schedule_id, error = %e, "failed to build event");
                return;
            }
        };

        if let Err(e) = self.events.publish(envelope).await {
            warn!(event_type, %schedule_id, error = %e, "event publish failed");
        }
    }
}

/// builder for the ledger
pub struct ScheduleLedgerBuilder {
    repository: Option<Arc<dyn ScheduleRepository>>,
    directory: Option<Arc<dyn LoanDirectory>>,
    events: Option<Arc<dyn EventSink>>,
    lock: Option<Arc<dyn DistributedLock>>,
    time: Option<Arc<SafeTimeProvider>>,
    config: LedgerConfig,
}

impl Default for ScheduleLedgerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ScheduleLedgerBuilder {
    pub fn new() -> Self {
        Self {
            repository: None,
            directory: None,
            events: None,
            lock: None,
            time: None,
            config: LedgerConfig::default(),
        }
    }

    pub fn repository(mut self, repository: Arc<dyn ScheduleRepository>) -> Self {
        self.repository = Some(repository);
        self
    }

    pub fn directory(mut self, directory: Arc<dyn LoanDirectory>) -> Self {
        self.directory = Some(directory);
        self
    }

    pub fn events(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn lock(mut self, lock: Arc<dyn DistributedLock>) -> Self {
        self.lock = Some(lock);
        self
    }

    pub fn set_time(mut self, time: Arc<SafeTimeProvider>) -> Self {
        self.time = Some(time);
        self
    }

    pub fn config(mut self, config: LedgerConfig) -> Self {
        self.config = config;
        self
    }

    /// lock defaults to a process-local one, time to the system clock
    pub fn build(self) -> Result<ScheduleLedger> {
        self.config.validate()?;

        let repository = self.repository.ok_or(LedgerError::InvalidConfiguration {
            message: "schedule repository required".to_string(),
        })?;

        let directory = self.directory.ok_or(LedgerError::InvalidConfiguration {
            message: "loan directory required".to_string(),
        })?;

        let events = self.events.ok_or(LedgerError::InvalidConfiguration {
            message: "event sink required".to_string(),
        })?;

        let lock = self
            .lock
            .unwrap_or_else(|| Arc::new(InMemoryLock::new()) as Arc<dyn DistributedLock>);

        let time = self
            .time
            .unwrap_or_else(|| Arc::new(SafeTimeProvider::new(TimeSource::System)));

        Ok(ScheduleLedger {
            repository,
            directory,
            events,
            locks: LockManager::new(lock, self.config.lock.clone()),
            time,
            config: self.config,
        })
    }
}

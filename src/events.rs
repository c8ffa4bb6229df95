use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Mutex;
use uuid::Uuid;

use crate::decimal::Money;
use crate::errors::{LedgerError, Result};
use crate::types::{Actor, DisbursementId, LoanId, ScheduleId};

/// lifecycle events emitted by the ledger
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ScheduleEvent {
    Created {
        schedule_id: ScheduleId,
        loan_application_id: LoanId,
        disbursement_id: DisbursementId,
        number_of_installments: u32,
        total_amount: Money,
        timestamp: DateTime<Utc>,
    },
    PaymentRecorded {
        schedule_id: ScheduleId,
        loan_application_id: LoanId,
        amount: Money,
        reference: String,
        installments_paid: u32,
        remaining_balance: Money,
        /// dropped under the discard overpayment policy
        discarded_amount: Money,
        timestamp: DateTime<Utc>,
    },
    Completed {
        schedule_id: ScheduleId,
        loan_application_id: LoanId,
        total_paid: Money,
        timestamp: DateTime<Utc>,
    },
    EarlyRepayment {
        schedule_id: ScheduleId,
        loan_application_id: LoanId,
        amount: Money,
        outstanding_settled: Money,
        penalty_amount: Money,
        timestamp: DateTime<Utc>,
    },
}

impl ScheduleEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            ScheduleEvent::Created { .. } => "repayment_schedule.created",
            ScheduleEvent::PaymentRecorded { .. } => "repayment_schedule.payment_recorded",
            ScheduleEvent::Completed { .. } => "repayment_schedule.completed",
            ScheduleEvent::EarlyRepayment { .. } => "repayment_schedule.early_repayment",
        }
    }

    pub fn schedule_id(&self) -> ScheduleId {
        match self {
            ScheduleEvent::Created { schedule_id, .. }
            | ScheduleEvent::PaymentRecorded { schedule_id, .. }
            | ScheduleEvent::Completed { schedule_id, .. }
            | ScheduleEvent::EarlyRepayment { schedule_id, .. } => *schedule_id,
        }
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            ScheduleEvent::Created { timestamp, .. }
            | ScheduleEvent::PaymentRecorded { timestamp, .. }
            | ScheduleEvent::Completed { timestamp, .. }
            | ScheduleEvent::EarlyRepayment { timestamp, .. } => *timestamp,
        }
    }
}

/// wire shape handed to an event sink
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub event_id: Uuid,
    pub event_type: String,
    pub aggregate_id: ScheduleId,
    pub payload: serde_json::Value,
    pub actor: Actor,
    pub occurred_at: DateTime<Utc>,
}

impl EventEnvelope {
    pub fn new(event: &ScheduleEvent, actor: Actor) -> Result<Self> {
        let payload = serde_json::to_value(event).map_err(|e| LedgerError::Storage {
            message: format!("failed to encode {}: {}", event.event_type(), e),
        })?;

        Ok(Self {
            event_id: Uuid::new_v4(),
            event_type: event.event_type().to_string(),
            aggregate_id: event.schedule_id(),
            payload,
            actor,
            occurred_at: event.timestamp(),
        })
    }

    /// decode the typed event back out of the payload
    pub fn event(&self) -> Result<ScheduleEvent> {
        serde_json::from_value(self.payload.clone()).map_err(|e| LedgerError::Storage {
            message: format!("failed to decode {}: {}", self.event_type, e),
        })
    }
}

/// fire-and-forget event delivery
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn publish(&self, envelope: EventEnvelope) -> Result<()>;
}

/// in-memory sink collecting everything published
#[derive(Debug, Default)]
pub struct EventStore {
    events: Mutex<Vec<EventEnvelope>>,
}

impl EventStore {
    pub fn new() -> Self {
        Self {
            events: Mutex::new(Vec::new()),
        }
    }

    pub fn events(&self) -> Vec<EventEnvelope> {
        self.events.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn take_events(&self) -> Vec<EventEnvelope> {
        std::mem::take(&mut *self.events.lock().unwrap_or_else(|e| e.into_inner()))
    }

    pub fn event_types(&self) -> Vec<String> {
        self.events().into_iter().map(|e| e.event_type).collect()
    }

    pub fn clear(&self) {
        self.events.lock().unwrap_or_else(|e| e.into_inner()).clear();
    }
}

#[async_trait]
impl EventSink for EventStore {
    async fn publish(&self, envelope: EventEnvelope) -> Result<()> {
        self.events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(envelope);
        Ok(())
    }
}

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::decimal::{Money, Rate};

/// unique identifier for a repayment schedule
pub type ScheduleId = Uuid;

/// unique identifier for a loan application
pub type LoanId = Uuid;

/// unique identifier for a disbursement
pub type DisbursementId = Uuid;

/// due-date cadence of a schedule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Frequency {
    Weekly,
    BiWeekly,
    Monthly,
}

/// payment progress of a single installment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstallmentStatus {
    Pending,
    PartiallyPaid,
    Paid,
}

impl InstallmentStatus {
    /// still owes money
    pub fn is_open(&self) -> bool {
        matches!(self, InstallmentStatus::Pending | InstallmentStatus::PartiallyPaid)
    }
}

/// installment status as seen by a reader at a point in time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DueStatus {
    Pending,
    PartiallyPaid,
    Paid,
    /// open and past its due date
    Overdue,
}

impl From<InstallmentStatus> for DueStatus {
    fn from(status: InstallmentStatus) -> Self {
        match status {
            InstallmentStatus::Pending => DueStatus::Pending,
            InstallmentStatus::PartiallyPaid => DueStatus::PartiallyPaid,
            InstallmentStatus::Paid => DueStatus::Paid,
        }
    }
}

/// schedule status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScheduleStatus {
    /// accepting payments
    Active,
    /// every installment settled, regular or early payoff
    Completed,
    /// reserved, not driven by the ledger
    Defaulted,
    /// reserved, not driven by the ledger
    Cancelled,
}

impl fmt::Display for ScheduleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ScheduleStatus::Active => "active",
            ScheduleStatus::Completed => "completed",
            ScheduleStatus::Defaulted => "defaulted",
            ScheduleStatus::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

/// who triggered a ledger mutation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Actor {
    /// automated transitions (jobs, workflows)
    System,
    User(Uuid),
}

impl Actor {
    const SYSTEM_LABEL: &'static str = "system";
}

impl fmt::Display for Actor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Actor::System => f.write_str(Self::SYSTEM_LABEL),
            Actor::User(id) => write!(f, "{}", id),
        }
    }
}

impl Serialize for Actor {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Actor {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        if raw == Actor::SYSTEM_LABEL {
            return Ok(Actor::System);
        }
        Uuid::parse_str(&raw)
            .map(Actor::User)
            .map_err(serde::de::Error::custom)
    }
}

/// loan terms a schedule was amortized from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoanDetails {
    pub principal_amount: Money,
    /// annual rate
    pub interest_rate: Rate,
    pub term_months: u32,
    pub frequency: Frequency,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_actor_serialization() {
        let system = serde_json::to_string(&Actor::System).unwrap();
        assert_eq!(system, "\"system\"");

        let id = Uuid::new_v4();
        let user = serde_json::to_string(&Actor::User(id)).unwrap();
        assert_eq!(user, format!("\"{}\"", id));

        let back: Actor = serde_json::from_str(&user).unwrap();
        assert_eq!(back, Actor::User(id));
        let back: Actor = serde_json::from_str(&system).unwrap();
        assert_eq!(back, Actor::System);
    }

    #[test]
    fn test_status_wire_names() {
        assert_eq!(
            serde_json::to_string(&InstallmentStatus::PartiallyPaid).unwrap(),
            "\"partially_paid\""
        );
        assert_eq!(serde_json::to_string(&Frequency::BiWeekly).unwrap(), "\"bi_weekly\"");
        assert_eq!(ScheduleStatus::Completed.to_string(), "completed");
    }

    #[test]
    fn test_open_statuses() {
        assert!(InstallmentStatus::Pending.is_open());
        assert!(InstallmentStatus::PartiallyPaid.is_open());
        assert!(!InstallmentStatus::Paid.is_open());
    }

    #[test]
    fn test_stored_status_rejects_overdue() {
        assert!(serde_json::from_str::<InstallmentStatus>("\"overdue\"").is_err());
        assert_eq!(
            serde_json::from_str::<DueStatus>("\"overdue\"").unwrap(),
            DueStatus::Overdue
        );
        assert_eq!(DueStatus::from(InstallmentStatus::PartiallyPaid), DueStatus::PartiallyPaid);
    }
}

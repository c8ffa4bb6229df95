use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::decimal::Money;
use crate::errors::Result;
use crate::types::{DisbursementId, LoanId};

/// disbursement progress as reported by the disbursement workflow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisbursementStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Disbursement {
    pub id: DisbursementId,
    pub loan_application_id: LoanId,
    pub amount: Money,
    pub disbursed_at: DateTime<Utc>,
    pub status: DisbursementStatus,
}

/// approved loan terms
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoanApplication {
    pub id: LoanId,
    pub principal_amount: Money,
    /// annual rate in percent, 0-100
    pub interest_rate_percent: Decimal,
    pub term_months: u32,
}

/// read access to loans and disbursements owned by other services
#[async_trait]
pub trait LoanDirectory: Send + Sync {
    async fn find_disbursement(&self, id: DisbursementId) -> Result<Option<Disbursement>>;

    async fn find_loan(&self, id: LoanId) -> Result<Option<LoanApplication>>;
}

#[derive(Debug, Default)]
pub struct InMemoryLoanDirectory {
    loans: RwLock<HashMap<LoanId, LoanApplication>>,
    disbursements: RwLock<HashMap<DisbursementId, Disbursement>>,
}

impl InMemoryLoanDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_loan(&self, loan: LoanApplication) {
        self.loans.write().await.insert(loan.id, loan);
    }

    pub async fn insert_disbursement(&self, disbursement: Disbursement) {
        self.disbursements
            .write()
            .await
            .insert(disbursement.id, disbursement);
    }
}

#[async_trait]
impl LoanDirectory for InMemoryLoanDirectory {
    async fn find_disbursement(&self, id: DisbursementId) -> Result<Option<Disbursement>> {
        Ok(self.disbursements.read().await.get(&id).cloned())
    }

    async fn find_loan(&self, id: LoanId) -> Result<Option<LoanApplication>> {
        Ok(self.loans.read().await.get(&id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    #[tokio::test]
    async fn test_lookup() {
        let directory = InMemoryLoanDirectory::new();
        let loan = LoanApplication {
            id: Uuid::new_v4(),
            principal_amount: Money::from_major(5_000),
            interest_rate_percent: dec!(9.5),
            term_months: 24,
        };
        directory.insert_loan(loan.clone()).await;

        assert_eq!(directory.find_loan(loan.id).await.unwrap(), Some(loan));
        assert!(directory.find_disbursement(Uuid::new_v4()).await.unwrap().is_none());
    }

    #[test]
    fn test_disbursement_status_wire_name() {
        let json = serde_json::to_string(&DisbursementStatus::Completed).unwrap();
        assert_eq!(json, "\"completed\"");
    }
}

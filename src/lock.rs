use async_trait::async_trait;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::LockConfig;
use crate::errors::{LedgerError, Result};
use crate::types::{DisbursementId, ScheduleId};

/// lock key shared by every mutation of one schedule
pub fn schedule_key(schedule_id: ScheduleId) -> String {
    format!("schedule:{}", schedule_id)
}

pub fn disbursement_key(disbursement_id: DisbursementId) -> String {
    format!("disbursement:{}", disbursement_id)
}

/// mutual exclusion keyed by string, leases expire after `ttl`
///
/// `owner` identifies the holder so a late release from an expired holder
/// cannot drop a lease someone else has taken since.
#[async_trait]
pub trait DistributedLock: Send + Sync {
    async fn acquire(&self, key: &str, owner: Uuid, ttl: Duration) -> Result<bool>;
    async fn release(&self, key: &str, owner: Uuid) -> Result<()>;
}

/// a held lease
#[derive(Debug, Clone)]
pub struct Lease {
    key: String,
    owner: Uuid,
    acquired_at: Instant,
    ttl: Duration,
}

impl Lease {
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn owner(&self) -> Uuid {
        self.owner
    }

    pub fn is_expired(&self) -> bool {
        self.acquired_at.elapsed() >= self.ttl
    }

    /// fail once the lease has run out; checked right before committing
    pub fn ensure_valid(&self) -> Result<()> {
        if self.is_expired() {
            return Err(LedgerError::LockLeaseExpired {
                key: self.key.clone(),
            });
        }
        Ok(())
    }
}

/// retrying front end over a `DistributedLock`
pub struct LockManager {
    lock: Arc<dyn DistributedLock>,
    config: LockConfig,
}

impl LockManager {
    pub fn new(lock: Arc<dyn DistributedLock>, config: LockConfig) -> Self {
        Self { lock, config }
    }

    /// bounded retries with linear backoff, then `LockAcquisitionFailed`
    pub async fn acquire(&self, key: &str) -> Result<Lease> {
        let owner = Uuid::new_v4();
        let ttl = self.config.ttl();

        for attempt in 1..=self.config.max_attempts {
            let acquired_at = Instant::now();
            if self.lock.acquire(key, owner, ttl).await? {
                debug!(key, attempt, "lock acquired");
                return Ok(Lease {
                    key: key.to_string(),
                    owner,
                    acquired_at,
                    ttl,
                });
            }

            if attempt < self.config.max_attempts {
                tokio::time::sleep(self.config.backoff_for(attempt)).await;
            }
        }

        warn!(key, attempts = self.config.max_attempts, "lock not acquired");
        Err(LedgerError::LockAcquisitionFailed {
            key: key.to_string(),
            attempts: self.config.max_attempts,
        })
    }

    /// release failures are logged, the lease will lapse on its own
    pub async fn release(&self, lease: &Lease) {
        if let Err(e) = self.lock.release(&lease.key, lease.owner).await {
            warn!(key = %lease.key, error = %e, "lock release failed");
        }
    }

    /// run `f` while holding `key`, releasing whatever `f` returns
    pub async fn with_lock<T, F, Fut>(&self, key: &str, f: F) -> Result<T>
    where
        F: FnOnce(Lease) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let lease = self.acquire(key).await?;
        let result = f(lease.clone()).await;
        self.release(&lease).await;
        result
    }
}

#[derive(Debug, Clone, Copy)]
struct HeldLease {
    owner: Uuid,
    expires_at: Instant,
}

/// process-local lock with expiring leases
#[derive(Debug, Default)]
pub struct InMemoryLock {
    leases: Mutex<HashMap<String, HeldLease>>,
}

impl InMemoryLock {
    pub fn new() -> Self {
        Self::default()
    }

    /// true while an unexpired lease exists for `key`
    pub async fn is_held(&self, key: &str) -> bool {
        let leases = self.leases.lock().await;
        leases
            .get(key)
            .map(|held| held.expires_at > Instant::now())
            .unwrap_or(false)
    }
}

#[async_trait]
impl DistributedLock for InMemoryLock {
    async fn acquire(&self, key: &str, owner: Uuid, ttl: Duration) -> Result<bool> {
        let mut leases = self.leases.lock().await;
        let now = Instant::now();

        if let Some(held) = leases.get(key) {
            if held.expires_at > now {
                return Ok(false);
            }
        }

        leases.insert(
            key.to_string(),
            HeldLease {
                owner,
                expires_at: now + ttl,
            },
        );
        Ok(true)
    }

    async fn release(&self, key: &str, owner: Uuid) -> Result<()> {
        let mut leases = self.leases.lock().await;
        if leases.get(key).map(|held| held.owner == owner).unwrap_or(false) {
            leases.remove(key);
        }
        Ok(())
    }
}




/*
    >------------------------------------------------------------------
    | persistence seam of the ledger, the append service only needs a
    | read of the whole ledger and a compare-and-swap append keyed on
    | the version it read
    |
*/

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use async_trait::async_trait;
use log::debug;
use tokio::sync::RwLock;
use crate::error::{LedgerError, StorageError};
use crate::models::{Ledger, LedgerEntry, LedgerRecord, User, UserId};


#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AppendWrite{
    Written{ version: u64 },
    /// the ledger moved on since `expected_version` was read
    Conflict,
}

#[async_trait]
pub trait LedgerStore: Send + Sync + 'static{

    async fn fetch_ledger(&self, user_id: &UserId) -> Result<Ledger, LedgerError>;

    /// Appends `record` only if the ledger is still at `expected_version`.
    async fn conditionally_append(
        &self,
        user_id: &UserId,
        expected_version: u64,
        record: &LedgerRecord,
    ) -> Result<AppendWrite, LedgerError>;

    async fn find_user_by_token(&self, token: &str) -> Result<Option<UserId>, LedgerError>;

}


#[derive(Debug, Default)]
struct Faults{
    failing_writes: u32,
    hanging_writes: u32,
    hang_for: Duration,
    read_delay: Option<Duration>,
    write_attempts: u64,
}

/// In-process store with the same compare-and-swap contract, plus fault
/// injection for tests.
#[derive(Debug, Default)]
pub struct MemoryLedgerStore{
    users: RwLock<HashMap<UserId, User>>,
    faults: Mutex<Faults>,
}

impl MemoryLedgerStore{

    pub fn new() -> Self{
        Self::default()
    }

    /// Every fetch sleeps first so concurrent callers read the same version.
    pub fn with_read_delay(self, delay: Duration) -> Self{
        self.faults().read_delay = Some(delay);
        self
    }

    pub async fn insert_user(&self, user: User){
        self.users.write().await.insert(user.id.clone(), user);
    }

    pub async fn user(&self, user_id: &UserId) -> Option<User>{
        self.users.read().await.get(user_id).cloned()
    }

    /// Pushes a raw entry the way an admin import would, bumping the version.
    pub async fn push_entry(&self, user_id: &UserId, entry: LedgerEntry) -> Result<(), LedgerError>{
        let mut users = self.users.write().await;
        let user = users.get_mut(user_id).ok_or_else(|| LedgerError::UserNotFound(user_id.clone()))?;
        user.ledger.entries.push(entry);
        user.ledger.version += 1;
        Ok(())
    }

    pub fn fail_next_writes(&self, count: u32){
        self.faults().failing_writes = count;
    }

    pub fn hang_next_writes(&self, count: u32, hang_for: Duration){
        let mut faults = self.faults();
        faults.hanging_writes = count;
        faults.hang_for = hang_for;
    }

    pub fn write_attempts(&self) -> u64{
        self.faults().write_attempts
    }

    fn faults(&self) -> std::sync::MutexGuard<'_, Faults>{
        self.faults.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

}

#[async_trait]
impl LedgerStore for MemoryLedgerStore{

    async fn fetch_ledger(&self, user_id: &UserId) -> Result<Ledger, LedgerError>{

        let read_delay = self.faults().read_delay;
        if let Some(delay) = read_delay{
            tokio::time::sleep(delay).await;
        }

        self.users
            .read()
            .await
            .get(user_id)
            .map(|user| user.ledger.clone())
            .ok_or_else(|| LedgerError::UserNotFound(user_id.clone()))
    }

    async fn conditionally_append(
        &self,
        user_id: &UserId,
        expected_version: u64,
        record: &LedgerRecord,
    ) -> Result<AppendWrite, LedgerError>{

        /* decide the fault before awaiting so the guard never crosses an await */
        let (fail, hang) = {
            let mut faults = self.faults();
            faults.write_attempts += 1;
            if faults.failing_writes > 0{
                faults.failing_writes -= 1;
                (true, None)
            } else if faults.hanging_writes > 0{
                faults.hanging_writes -= 1;
                (false, Some(faults.hang_for))
            } else{
                (false, None)
            }
        };

        if fail{
            return Err(StorageError::Unavailable("injected write failure".to_string()).into());
        }
        if let Some(hang_for) = hang{
            tokio::time::sleep(hang_for).await;
        }

        let mut users = self.users.write().await;
        let user = users.get_mut(user_id).ok_or_else(|| LedgerError::UserNotFound(user_id.clone()))?;

        if user.ledger.version != expected_version{
            debug!("ledger of {} is at {}, writer expected {}", user_id, user.ledger.version, expected_version);
            return Ok(AppendWrite::Conflict);
        }

        user.ledger.entries.push(LedgerEntry::Record(record.clone()));
        user.ledger.version += 1;

        Ok(AppendWrite::Written{ version: user.ledger.version })
    }

    async fn find_user_by_token(&self, token: &str) -> Result<Option<UserId>, LedgerError>{
        Ok(
            self.users
                .read()
                .await
                .values()
                .find(|user| user.token == token)
                .map(|user| user.id.clone())
        )
    }

}

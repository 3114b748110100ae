


/*
    >------------------------------------------------------------------
    | the only writer of ledger state. check-then-append is guarded by
    | the store's compare-and-swap on the ledger version: when two
    | claims race for one user the loser sees a conflict, re-reads the
    | ledger and is evaluated again against the winner's record
    |
    | writes run on their own task so a caller dropping the request
    | can't cut a record in half, the caller only stops waiting
    |
*/

use std::sync::Arc;
use std::time::Duration;
use log::{debug, error, info};
use rust_decimal::Decimal;
use timekeeper::{Clock, ReferenceZone};
use crate::error::{LedgerError, StorageError};
use crate::evaluator::{DailyWindow, Decision, DenyReason};
use crate::models::{Ledger, LedgerRecord, PaymentInfo, RecordDraft, UserId};
use crate::store::{AppendWrite, LedgerStore};


#[derive(Clone, Debug)]
pub struct LedgerConfig{
    pub zone: ReferenceZone,
    pub write_timeout: Duration,
    pub max_attempts: u32,
}

impl Default for LedgerConfig{
    fn default() -> Self{
        Self{
            zone: ReferenceZone::default(),
            write_timeout: Duration::from_secs(5),
            max_attempts: 8,
        }
    }
}


#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RejectReason{
    AlreadyClaimedToday,
    InvalidAmount,
}

impl From<DenyReason> for RejectReason{
    fn from(reason: DenyReason) -> Self{
        match reason{
            DenyReason::AlreadyClaimedToday => RejectReason::AlreadyClaimedToday,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum AppendOutcome{
    Appended(LedgerRecord),
    Rejected(RejectReason),
}


#[derive(Clone)]
pub struct LedgerService{
    store: Arc<dyn LedgerStore>,
    clock: Arc<dyn Clock>,
    window: DailyWindow,
    config: LedgerConfig,
}

impl LedgerService{

    pub fn new(store: Arc<dyn LedgerStore>, clock: Arc<dyn Clock>, config: LedgerConfig) -> Self{
        Self{
            window: DailyWindow::new(config.zone),
            store,
            clock,
            config,
        }
    }

    pub fn window(&self) -> &DailyWindow{
        &self.window
    }

    pub async fn resolve_token(&self, token: &str) -> Result<UserId, LedgerError>{
        let lookup = self.store.find_user_by_token(token);
        match self.bounded(lookup).await?{
            Some(user_id) => Ok(user_id),
            None => Err(LedgerError::UserNotFound(UserId::from(format!("token:{}", mask(token))))),
        }
    }

    /// The inbound bonus path; any client supplied time is ignored upstream.
    pub async fn submit_bonus_claim(&self, user_id: &UserId, amount: Decimal, payment: PaymentInfo) -> Result<AppendOutcome, LedgerError>{
        self.append_record(user_id, RecordDraft::bonus_claim(amount).with_payment(payment)).await
    }

    pub async fn append_record(&self, user_id: &UserId, draft: RecordDraft) -> Result<AppendOutcome, LedgerError>{

        if draft.amount < Decimal::ZERO{
            info!(target: "ledger::window", "rejecting {:?} of {} for {}: negative amount", draft.kind, draft.amount, user_id);
            return Ok(AppendOutcome::Rejected(RejectReason::InvalidAmount));
        }

        for attempt in 1..=self.config.max_attempts{

            let ledger = self.fetch(user_id).await?;
            let now = self.clock.now();

            if draft.is_daily_bonus(){
                if let Decision::Deny(reason) = self.window.may_claim_bonus(&ledger.entries, now){
                    info!(target: "ledger::window", "bonus claim of {} rejected: {:?}", user_id, reason);
                    return Ok(AppendOutcome::Rejected(reason.into()));
                }
            }

            let record = draft.clone().into_record(now);
            match self.write(user_id, ledger.version, record.clone()).await?{
                AppendWrite::Written{ version } => {
                    info!("appended {:?} {} to ledger of {} (version {})", record.kind, record.id, user_id, version);
                    return Ok(AppendOutcome::Appended(record));
                },
                AppendWrite::Conflict => {
                    debug!("ledger of {} changed under attempt {}, re-evaluating", user_id, attempt);
                }
            }
        }

        let attempts = self.config.max_attempts;
        error!(target: "ledger::storage", "append for {} kept conflicting after {} attempts", user_id, attempts);
        Err(StorageError::Contention{ attempts }.into())
    }

    /// Well-formed records, newest first.
    pub async fn history(&self, user_id: &UserId) -> Result<Vec<LedgerRecord>, LedgerError>{
        let ledger = self.fetch(user_id).await?;
        let mut records: Vec<LedgerRecord> = ledger.records().cloned().collect();
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(records)
    }

    async fn fetch(&self, user_id: &UserId) -> Result<Ledger, LedgerError>{
        let read = self.store.fetch_ledger(user_id);
        self.bounded(read).await.map_err(|e| report(user_id, e))
    }

    async fn write(&self, user_id: &UserId, expected_version: u64, record: LedgerRecord) -> Result<AppendWrite, LedgerError>{

        let store = Arc::clone(&self.store);
        let owner = user_id.clone();
        let task = tokio::spawn(async move{
            store.conditionally_append(&owner, expected_version, &record).await
        });

        let written = match tokio::time::timeout(self.config.write_timeout, task).await{
            Ok(Ok(result)) => result,
            Ok(Err(join_error)) => Err(StorageError::Task(join_error.to_string()).into()),
            Err(_) => Err(StorageError::Timeout(self.config.write_timeout).into()),
        };

        written.map_err(|e| report(user_id, e))
    }

    async fn bounded<T>(&self, call: impl std::future::Future<Output = Result<T, LedgerError>>) -> Result<T, LedgerError>{
        match tokio::time::timeout(self.config.write_timeout, call).await{
            Ok(result) => result,
            Err(_) => Err(StorageError::Timeout(self.config.write_timeout).into()),
        }
    }

}

fn report(user_id: &UserId, e: LedgerError) -> LedgerError{
    if e.is_retryable(){
        error!(target: "ledger::storage", "ledger storage failure for {}: {}", user_id, e);
    }
    e
}

fn mask(token: &str) -> String{
    let visible: String = token.chars().take(4).collect();
    format!("{}***", visible)
}




/*
   -=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=
        REDEMPTION LEDGER & DAILY BONUS ENGINE
   -=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=
   per user append-only history of deposits, withdrawal requests
   and daily bonus claims

        LedgerService::append_record
            -> LedgerStore::fetch_ledger
            -> DailyWindow::may_claim_bonus (bonus claims only)
            -> LedgerStore::conditionally_append
*/


pub mod error;
pub mod evaluator;
pub mod models;
pub mod mongo;
pub mod service;
pub mod store;

pub use error::{LedgerError, StorageError};
pub use evaluator::{DailyWindow, Decision, DenyReason};
pub use models::{Ledger, LedgerEntry, LedgerRecord, PaymentInfo, RecordDraft, RecordKind, User, UserId};
pub use mongo::MongoLedgerStore;
pub use service::{AppendOutcome, LedgerConfig, LedgerService, RejectReason};
pub use store::{AppendWrite, LedgerStore, MemoryLedgerStore};

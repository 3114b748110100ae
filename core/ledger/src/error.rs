/*
   -=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=
            LEDGER ERROR HANDLER
   -=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=
   business rejections are not errors, they come back as
   AppendOutcome::Rejected, only lookups and infra faults live here
*/


use std::time::Duration;
use thiserror::Error;
use crate::models::UserId;


#[derive(Debug, Error)]
pub enum StorageError{
    #[error("mongodb: {0}")]
    Mongo(#[from] mongodb::error::Error),
    #[error("bson codec: {0}")]
    Bson(String),
    #[error("storage call did not complete within {0:?}")]
    Timeout(Duration),
    #[error("gave up after {attempts} conflicting writes")]
    Contention{ attempts: u32 },
    #[error("storage task aborted: {0}")]
    Task(String),
    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Error)]
pub enum LedgerError{
    #[error("user {0} not found")]
    UserNotFound(UserId),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("malformed ledger record at position {position}: {reason}")]
    MalformedRecord{ position: usize, reason: String },
}

impl LedgerError{

    /// Storage faults may be retried from scratch, everything else may not.
    pub fn is_retryable(&self) -> bool{
        matches!(self, LedgerError::Storage(_))
    }

}

impl From<mongodb::error::Error> for LedgerError{
    fn from(error: mongodb::error::Error) -> Self{
        LedgerError::Storage(StorageError::Mongo(error))
    }
}

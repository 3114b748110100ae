


/*
    >------------------------------------------------------------------
    | one daily bonus per canonical day per user, the day is the civil
    | date in the operator's reference zone. the evaluator only reads,
    | it never fails: bad historical records are logged and skipped
    |
*/

use chrono::{DateTime, Utc};
use log::{info, warn};
use serde::Serialize;
use timekeeper::ReferenceZone;
use crate::models::LedgerEntry;


#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum DenyReason{
    AlreadyClaimedToday,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Decision{
    Allow,
    Deny(DenyReason),
}

impl Decision{
    pub fn is_allowed(&self) -> bool{
        matches!(self, Decision::Allow)
    }
}


#[derive(Clone, Copy, Debug, Default)]
pub struct DailyWindow{
    zone: ReferenceZone,
}

impl DailyWindow{

    pub fn new(zone: ReferenceZone) -> Self{
        Self{ zone }
    }

    pub fn zone(&self) -> ReferenceZone{
        self.zone
    }

    /// Latest anchor among the well-formed daily bonus records.
    pub fn latest_bonus_anchor(&self, entries: &[LedgerEntry]) -> Option<DateTime<Utc>>{

        let mut latest: Option<DateTime<Utc>> = None;
        for (position, entry) in entries.iter().enumerate(){
            let record = match entry{
                LedgerEntry::Record(record) => record,
                LedgerEntry::Malformed{ position, reason } => {
                    warn!(target: "ledger::window", "skipping undecodable ledger entry at {}: {}", position, reason);
                    continue;
                }
            };
            match record.bonus_anchor(position){
                Ok(Some(anchor)) => {
                    if latest.map_or(true, |current| anchor > current){
                        latest = Some(anchor);
                    }
                },
                Ok(None) => {},
                Err(e) => warn!(target: "ledger::window", "treating record as non bonus: {}", e),
            }
        }

        latest
    }

    pub fn may_claim_bonus(&self, entries: &[LedgerEntry], now: DateTime<Utc>) -> Decision{

        let Some(last_claim) = self.latest_bonus_anchor(entries) else{
            return Decision::Allow;
        };

        if self.zone.same_canonical_day(last_claim, now){
            info!(
                target: "ledger::window",
                "bonus already claimed on {} ({}), last anchor {}",
                self.zone.canonical_day(now), self.zone, last_claim
            );
            Decision::Deny(DenyReason::AlreadyClaimedToday)
        } else{
            Decision::Allow
        }
    }

}

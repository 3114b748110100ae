


use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Serialize, Deserialize};
use uuid::Uuid;
use crate::error::LedgerError;



#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub String);

impl UserId{
    pub fn as_str(&self) -> &str{
        &self.0
    }
}

impl std::fmt::Display for UserId{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result{
        f.write_str(&self.0)
    }
}

impl From<&str> for UserId{
    fn from(id: &str) -> Self{
        UserId(id.to_string())
    }
}

impl From<String> for UserId{
    fn from(id: String) -> Self{
        UserId(id)
    }
}


#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind{
    Deposit,
    WithdrawalRequest,
    BonusClaim,
}

/* opaque to the ledger rules, kept for the history tables */
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PaymentInfo{
    pub method: Option<String>, // paymentoption
    pub channel: Option<String>, // paymenttype
    pub external_ref: Option<String>,
    pub btc: Option<String>,
}


#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LedgerRecord{
    pub id: Uuid,
    pub kind: RecordKind,
    pub amount: Decimal,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub is_daily_bonus: bool,
    /* set once at creation, same-day checks never look at created_at */
    #[serde(default)]
    pub bonus_anchor_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub payment: PaymentInfo,
}

impl LedgerRecord{

    /// `Ok(None)` for non bonus records, an error for a bonus record
    /// that lost its anchor.
    pub fn bonus_anchor(&self, position: usize) -> Result<Option<DateTime<Utc>>, LedgerError>{
        match (self.is_daily_bonus, self.bonus_anchor_time){
            (false, _) => Ok(None),
            (true, Some(anchor)) => Ok(Some(anchor)),
            (true, None) => Err(LedgerError::MalformedRecord{
                position,
                reason: format!("daily bonus record {} has no bonus anchor time", self.id),
            }),
        }
    }

}


/// What a caller asks to append; the service stamps the times.
#[derive(Clone, Debug, PartialEq)]
pub struct RecordDraft{
    pub kind: RecordKind,
    pub amount: Decimal,
    pub payment: PaymentInfo,
}

impl RecordDraft{

    pub fn new(kind: RecordKind, amount: Decimal) -> Self{
        Self{ kind, amount, payment: PaymentInfo::default() }
    }

    pub fn deposit(amount: Decimal) -> Self{
        Self::new(RecordKind::Deposit, amount)
    }

    pub fn withdrawal(amount: Decimal) -> Self{
        Self::new(RecordKind::WithdrawalRequest, amount)
    }

    pub fn bonus_claim(amount: Decimal) -> Self{
        Self::new(RecordKind::BonusClaim, amount)
    }

    pub fn with_payment(mut self, payment: PaymentInfo) -> Self{
        self.payment = payment;
        self
    }

    pub fn is_daily_bonus(&self) -> bool{
        self.kind == RecordKind::BonusClaim
    }

    pub fn into_record(self, now: DateTime<Utc>) -> LedgerRecord{
        let is_daily_bonus = self.is_daily_bonus();
        LedgerRecord{
            id: Uuid::new_v4(),
            kind: self.kind,
            amount: self.amount,
            created_at: now,
            is_daily_bonus,
            bonus_anchor_time: is_daily_bonus.then_some(now),
            payment: self.payment,
        }
    }

}


/* a stored entry that could not be decoded stays in place so positions line up */
#[derive(Clone, Debug, PartialEq)]
pub enum LedgerEntry{
    Record(LedgerRecord),
    Malformed{ position: usize, reason: String },
}

impl LedgerEntry{
    pub fn record(&self) -> Option<&LedgerRecord>{
        match self{
            LedgerEntry::Record(record) => Some(record),
            LedgerEntry::Malformed{..} => None,
        }
    }
}


/// Snapshot of a user's ledger together with the version it was read at.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Ledger{
    pub version: u64,
    pub entries: Vec<LedgerEntry>,
}

impl Ledger{

    pub fn records(&self) -> impl Iterator<Item = &LedgerRecord>{
        self.entries.iter().filter_map(LedgerEntry::record)
    }

    pub fn len(&self) -> usize{
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool{
        self.entries.is_empty()
    }

}


#[derive(Clone, Debug, PartialEq)]
pub struct User{
    pub id: UserId,
    pub token: String,
    pub name: String,
    pub ledger: Ledger,
}

impl User{
    pub fn new(id: impl Into<UserId>, token: &str, name: &str) -> Self{
        Self{
            id: id.into(),
            token: token.to_string(),
            name: name.to_string(),
            ledger: Ledger::default(),
        }
    }
}



#[cfg(test)]
mod tests{

    use super::*;

    #[test]
    fn bonus_draft_is_anchored_at_creation(){
        let now = Utc::now();
        let record = RecordDraft::bonus_claim(Decimal::new(500, 2)).into_record(now);
        assert!(record.is_daily_bonus);
        assert_eq!(record.bonus_anchor_time, Some(now));
        assert_eq!(record.created_at, now);

        let record = RecordDraft::withdrawal(Decimal::new(500, 2)).into_record(now);
        assert!(!record.is_daily_bonus);
        assert_eq!(record.bonus_anchor_time, None);
    }

    #[test]
    fn bonus_record_without_anchor_is_malformed(){
        let mut record = RecordDraft::bonus_claim(Decimal::ONE).into_record(Utc::now());
        record.bonus_anchor_time = None;
        assert!(matches!(record.bonus_anchor(3), Err(LedgerError::MalformedRecord{ position: 3, .. })));
    }

    #[test]
    fn legacy_record_without_bonus_fields_decodes(){
        let raw = serde_json::json!({
            "id": Uuid::new_v4(),
            "kind": "withdrawal_request",
            "amount": "12.50",
            "created_at": "2024-01-01T10:00:00Z"
        });
        let record: LedgerRecord = serde_json::from_value(raw).unwrap();
        assert!(!record.is_daily_bonus);
        assert_eq!(record.payment, PaymentInfo::default());
        assert_eq!(record.amount, Decimal::new(1250, 2));
    }

}

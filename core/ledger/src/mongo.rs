


/*
    users collection layout:

        {
            _id: ObjectId,
            token: String,
            name: String,
            ledger: [ LedgerRecord ],
            ledger_version: i64,
            redeem: [ { amount, btc, paymentoption, paymenttype, id,
                        dailyChecked, isBonusInitializeTime, date } ]
        }

    redeem is the history the dashboard wrote before the ledger array
    existed, it is only ever read and comes first in the decoded ledger

    the append is a single update_one filtered on the version the caller
    read, $push and $inc happen together or not at all
*/

use std::str::FromStr;
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use log::{info, warn};
use mongodb::{Client, Collection};
use mongodb::bson::{self, doc, oid::ObjectId, Bson, Document};
use mongodb::options::FindOneOptions;
use rust_decimal::Decimal;
use uuid::Uuid;
use crate::error::{LedgerError, StorageError};
use crate::models::{Ledger, LedgerEntry, LedgerRecord, PaymentInfo, RecordKind, UserId};
use crate::store::{AppendWrite, LedgerStore};


pub const USERS_COLLECTION: &str = "users";


#[derive(Clone, Debug)]
pub struct MongoLedgerStore{
    users: Collection<Document>,
}

impl MongoLedgerStore{

    pub async fn connect(uri: &str, db_name: &str) -> Result<Self, LedgerError>{
        let client = Client::with_uri_str(uri).await?;
        info!("connected to mongodb, ledger lives in {}.{}", db_name, USERS_COLLECTION);
        Ok(Self::from_client(&client, db_name))
    }

    pub fn from_client(client: &Client, db_name: &str) -> Self{
        Self{
            users: client.database(db_name).collection::<Document>(USERS_COLLECTION),
        }
    }

    fn object_id(user_id: &UserId) -> Result<ObjectId, LedgerError>{
        /* an id that can't be an ObjectId can't name a stored user */
        ObjectId::parse_str(user_id.as_str()).map_err(|_| LedgerError::UserNotFound(user_id.clone()))
    }

    pub fn decode_ledger(user_doc: &Document) -> Ledger{

        let version = match user_doc.get("ledger_version"){
            Some(Bson::Int64(v)) => (*v).max(0) as u64,
            Some(Bson::Int32(v)) => (*v).max(0) as u64,
            _ => 0,
        };

        let legacy = user_doc.get_array("redeem").map(Vec::as_slice).unwrap_or_default();
        let current = user_doc.get_array("ledger").map(Vec::as_slice).unwrap_or_default();

        let mut entries = Vec::with_capacity(legacy.len() + current.len());
        entries.extend(legacy.iter().enumerate().map(|(position, raw)| decode_legacy_entry(position, raw)));
        let offset = entries.len();
        entries.extend(current.iter().enumerate().map(|(index, raw)| decode_entry(offset + index, raw)));

        Ledger{ version, entries }
    }

}

fn decode_entry(position: usize, raw: &Bson) -> LedgerEntry{
    match raw{
        Bson::Document(entry_doc) => match bson::from_document::<LedgerRecord>(entry_doc.clone()){
            Ok(record) => LedgerEntry::Record(record),
            Err(e) => {
                warn!(target: "ledger::storage", "ledger entry {} failed to decode: {}", position, e);
                LedgerEntry::Malformed{ position, reason: e.to_string() }
            }
        },
        other => LedgerEntry::Malformed{
            position,
            reason: format!("expected a document, found {:?}", other.element_type()),
        },
    }
}

fn legacy_time(raw: Option<&Bson>) -> Option<DateTime<Utc>>{
    match raw?{
        Bson::DateTime(at) => Utc.timestamp_millis_opt(at.timestamp_millis()).single(),
        Bson::String(at) => DateTime::parse_from_rfc3339(at).ok().map(|at| at.with_timezone(&Utc)),
        Bson::Int64(millis) => Utc.timestamp_millis_opt(*millis).single(),
        _ => None,
    }
}

fn legacy_amount(raw: Option<&Bson>) -> Option<Decimal>{
    match raw?{
        Bson::String(amount) => Decimal::from_str(amount.trim()).ok(),
        Bson::Double(amount) => Decimal::try_from(*amount).ok(),
        Bson::Int32(amount) => Some(Decimal::from(*amount)),
        Bson::Int64(amount) => Some(Decimal::from(*amount)),
        _ => None,
    }
}

fn legacy_text(raw: Option<&Bson>) -> Option<String>{
    match raw?{
        Bson::String(text) => Some(text.clone()),
        Bson::Null => None,
        other => Some(other.to_string()),
    }
}

/* the old rows carry no uuid, derive a stable one so history reads agree */
fn legacy_id(entry_doc: &Document, position: usize) -> Uuid{
    match entry_doc.get_object_id("_id"){
        Ok(oid) => {
            let mut bytes = [0u8; 16];
            bytes[4..].copy_from_slice(&oid.bytes());
            Uuid::from_bytes(bytes)
        },
        Err(_) => Uuid::from_u128(position as u128),
    }
}

fn decode_legacy_entry(position: usize, raw: &Bson) -> LedgerEntry{

    let malformed = |reason: String| {
        warn!(target: "ledger::storage", "legacy redeem entry {} failed to decode: {}", position, reason);
        LedgerEntry::Malformed{ position, reason }
    };

    let Bson::Document(entry_doc) = raw else{
        return malformed(format!("expected a document, found {:?}", raw.element_type()));
    };

    let Some(amount) = legacy_amount(entry_doc.get("amount")) else{
        return malformed("redeem entry has no readable amount".to_string());
    };

    let bonus_initialized_at = legacy_time(entry_doc.get("isBonusInitializeTime"));
    let created_at = legacy_time(entry_doc.get("date"))
        .or_else(|| legacy_time(entry_doc.get("createdAt")))
        .or(bonus_initialized_at)
        .or_else(|| {
            entry_doc
                .get_object_id("_id")
                .ok()
                .and_then(|oid| Utc.timestamp_millis_opt(oid.timestamp().timestamp_millis()).single())
        });
    let Some(created_at) = created_at else{
        return malformed("redeem entry has no date".to_string());
    };

    let is_daily_bonus = entry_doc.get_bool("dailyChecked").unwrap_or(false);

    LedgerEntry::Record(LedgerRecord{
        id: legacy_id(entry_doc, position),
        kind: if is_daily_bonus{ RecordKind::BonusClaim } else{ RecordKind::WithdrawalRequest },
        amount,
        created_at,
        is_daily_bonus,
        bonus_anchor_time: is_daily_bonus.then(|| bonus_initialized_at.unwrap_or(created_at)),
        payment: PaymentInfo{
            method: legacy_text(entry_doc.get("paymentoption")),
            channel: legacy_text(entry_doc.get("paymenttype")),
            external_ref: legacy_text(entry_doc.get("id")),
            btc: legacy_text(entry_doc.get("btc")),
        },
    })
}

#[async_trait]
impl LedgerStore for MongoLedgerStore{

    async fn fetch_ledger(&self, user_id: &UserId) -> Result<Ledger, LedgerError>{
        let oid = Self::object_id(user_id)?;
        match self.users.find_one(doc!{ "_id": oid }, None).await?{
            Some(user_doc) => Ok(Self::decode_ledger(&user_doc)),
            None => Err(LedgerError::UserNotFound(user_id.clone())),
        }
    }

    async fn conditionally_append(
        &self,
        user_id: &UserId,
        expected_version: u64,
        record: &LedgerRecord,
    ) -> Result<AppendWrite, LedgerError>{

        let oid = Self::object_id(user_id)?;
        let record_bson = bson::to_bson(record).map_err(|e| StorageError::Bson(e.to_string()))?;
        let expected = expected_version as i64;

        /* documents created before versioning have no ledger_version yet */
        let filter = if expected == 0{
            doc!{
                "_id": oid,
                "$or": [
                    { "ledger_version": 0_i64 },
                    { "ledger_version": { "$exists": false } }
                ]
            }
        } else{
            doc!{ "_id": oid, "ledger_version": expected }
        };
        let update = doc!{
            "$push": { "ledger": record_bson },
            "$inc": { "ledger_version": 1_i64 }
        };

        let result = self.users.update_one(filter, update, None).await?;
        if result.matched_count == 1{
            return Ok(AppendWrite::Written{ version: expected_version + 1 });
        }

        match self.users.count_documents(doc!{ "_id": oid }, None).await?{
            0 => Err(LedgerError::UserNotFound(user_id.clone())),
            _ => Ok(AppendWrite::Conflict),
        }
    }

    async fn find_user_by_token(&self, token: &str) -> Result<Option<UserId>, LedgerError>{
        let options = FindOneOptions::builder().projection(doc!{ "_id": 1 }).build();
        let found = self.users.find_one(doc!{ "token": token }, options).await?;
        Ok(
            found
                .and_then(|user_doc| user_doc.get_object_id("_id").ok())
                .map(|oid| UserId(oid.to_hex()))
        )
    }

}

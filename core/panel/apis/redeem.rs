


use actix_web::{get, post, web, HttpRequest, http::{header, StatusCode}};
use ledger::{AppendOutcome, LedgerError, LedgerRecord, PaymentInfo, RecordDraft, RecordKind, RejectReason};
use log::error;
use rust_decimal::Decimal;
use serde::Deserialize;
use crate::constants::*;
use crate::misc::AppState;
use crate::resp;


/*
    the redeem form as the dashboard posts it, any timestamp the
    client sends is dropped here and never reaches the ledger
*/
#[derive(Deserialize, Debug, Clone)]
pub struct RedeemRequest{
    pub token: String,
    #[serde(rename = "paymentoption", default)]
    pub payment_option: Option<String>,
    #[serde(rename = "paymenttype", default)]
    pub payment_type: Option<String>,
    pub amount: Decimal,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub btc: Option<String>,
    #[serde(rename = "isChecked", default)]
    pub is_checked: bool,
}

#[derive(Deserialize, Debug, Clone)]
pub struct DepositRequest{
    pub token: String,
    pub amount: Decimal,
    #[serde(rename = "paymentoption", default)]
    pub payment_option: Option<String>,
    #[serde(rename = "paymenttype", default)]
    pub payment_type: Option<String>,
    #[serde(default)]
    pub id: Option<String>,
}


#[post("/redeem")]
pub async fn redeem(
        app_state: web::Data<AppState>,
        redeem_request: web::Json<RedeemRequest>,
    ) -> PanelHttpResponse {

    let redeem_request = redeem_request.into_inner();
    let ledger = &app_state.ledger;

    let user_id = match ledger.resolve_token(&redeem_request.token).await{
        Ok(user_id) => user_id,
        Err(e) => return reply_error(e),
    };

    let payment = PaymentInfo{
        method: redeem_request.payment_option,
        channel: redeem_request.payment_type,
        external_ref: redeem_request.id,
        btc: redeem_request.btc,
    };

    let submitted = if redeem_request.is_checked{
        ledger.submit_bonus_claim(&user_id, redeem_request.amount, payment).await
    } else{
        ledger.append_record(&user_id, RecordDraft::withdrawal(redeem_request.amount).with_payment(payment)).await
    };

    match submitted{
        Ok(outcome) => reply_outcome(outcome),
        Err(e) => reply_error(e),
    }

}

#[post("/deposit")]
pub async fn deposit(
        app_state: web::Data<AppState>,
        deposit_request: web::Json<DepositRequest>,
    ) -> PanelHttpResponse {

    let deposit_request = deposit_request.into_inner();
    let ledger = &app_state.ledger;

    let user_id = match ledger.resolve_token(&deposit_request.token).await{
        Ok(user_id) => user_id,
        Err(e) => return reply_error(e),
    };

    let payment = PaymentInfo{
        method: deposit_request.payment_option,
        channel: deposit_request.payment_type,
        external_ref: deposit_request.id,
        btc: None,
    };

    match ledger.append_record(&user_id, RecordDraft::deposit(deposit_request.amount).with_payment(payment)).await{
        Ok(outcome) => reply_outcome(outcome),
        Err(e) => reply_error(e),
    }

}

#[get("/history")]
pub async fn history(
        req: HttpRequest,
        app_state: web::Data<AppState>,
    ) -> PanelHttpResponse {

    let token = req.headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(|token| token.trim().to_string());

    let Some(token) = token else{
        resp!{
            &[u8],
            &[],
            NOT_AUTH_HEADER,
            StatusCode::UNAUTHORIZED,
        }
    };

    let ledger = &app_state.ledger;
    let user_id = match ledger.resolve_token(&token).await{
        Ok(user_id) => user_id,
        Err(e) => return reply_error(e),
    };

    match ledger.history(&user_id).await{
        Ok(records) => resp!{
            Vec<LedgerRecord>,
            records,
            FETCHED,
            StatusCode::OK,
        },
        Err(e) => reply_error(e),
    }

}


fn reply_outcome(outcome: AppendOutcome) -> PanelHttpResponse{
    match outcome{
        AppendOutcome::Appended(record) => {
            let message = match record.kind{
                RecordKind::BonusClaim => BONUS_CLAIMED,
                RecordKind::WithdrawalRequest => REDEEM_REQUESTED,
                RecordKind::Deposit => DEPOSITED_SUCCESSFULLY,
            };
            resp!{
                LedgerRecord,
                record,
                message,
                StatusCode::OK,
            }
        },
        AppendOutcome::Rejected(reason) => {
            let message = match reason{
                RejectReason::AlreadyClaimedToday => ALREADY_CLAIMED_TODAY,
                RejectReason::InvalidAmount => INVALID_AMOUNT,
            };
            resp!{
                &[u8],
                &[],
                message,
                StatusCode::BAD_REQUEST,
            }
        }
    }
}

fn reply_error(e: LedgerError) -> PanelHttpResponse{
    match e{
        LedgerError::UserNotFound(_) => resp!{
            &[u8],
            &[],
            USER_NOT_FOUND,
            StatusCode::NOT_FOUND,
        },
        LedgerError::MalformedRecord{ position, reason } => {
            error!("ledger record at {} is malformed: {}", position, reason);
            resp!{
                &[u8],
                &[],
                MALFORMED_LEDGER,
                StatusCode::INTERNAL_SERVER_ERROR,
            }
        },
        LedgerError::Storage(e) => {
            error!("ledger storage failed: {}", e);
            resp!{
                &[u8],
                &[],
                STORAGE_ISSUE,
                StatusCode::INTERNAL_SERVER_ERROR,
            }
        }
    }
}


pub mod exports{
    pub use super::redeem;
    pub use super::deposit;
    pub use super::history;
}



#[cfg(test)]
mod tests{

    use std::sync::Arc;
    use actix_web::{test, web::Data, App};
    use chrono::{DateTime, Duration, Utc};
    use ledger::{LedgerConfig, LedgerService, MemoryLedgerStore, User};
    use serde_json::{json, Value};
    use timekeeper::ManualClock;
    use crate::misc::AppState;
    use crate::services;

    fn at(s: &str) -> DateTime<Utc>{
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    async fn state(now: &str) -> (Arc<MemoryLedgerStore>, Arc<ManualClock>, Data<AppState>){
        let store = Arc::new(MemoryLedgerStore::new());
        store.insert_user(User::new("u1", "tok-1", "alice")).await;
        let clock = Arc::new(ManualClock::new(at(now)));
        let ledger = LedgerService::new(store.clone(), clock.clone(), LedgerConfig::default());
        (store, clock, Data::new(AppState{ ledger }))
    }

    fn bonus(token: &str) -> Value{
        json!({
            "token": token,
            "paymentoption": "cashapp",
            "paymenttype": "redeem",
            "amount": "5",
            "id": "$alice",
            "btc": "",
            "isChecked": true,
            "createdAt": "1999-01-01T00:00:00Z"
        })
    }

    #[actix_web::test]
    async fn daily_bonus_follows_the_honolulu_day(){

        /* 10:00 in Honolulu */
        let (_, clock, app_state) = state("2024-01-02T20:00:00Z").await;
        let app = test::init_service(App::new().app_data(app_state).configure(services::init_ledger)).await;

        let res = test::call_service(&app, test::TestRequest::post().uri("/redeem").set_json(bonus("tok-1")).to_request()).await;
        assert_eq!(res.status().as_u16(), 200);
        let body: Value = test::read_body_json(res).await;
        assert_eq!(body["is_error"], false);
        assert_eq!(body["data"]["kind"], "bonus_claim");
        assert_eq!(body["data"]["created_at"], "2024-01-02T20:00:00Z");

        /* 20:00 the same Honolulu day, already past midnight in UTC */
        clock.advance(Duration::hours(10));
        let res = test::call_service(&app, test::TestRequest::post().uri("/redeem").set_json(bonus("tok-1")).to_request()).await;
        assert_eq!(res.status().as_u16(), 400);
        let body: Value = test::read_body_json(res).await;
        assert_eq!(body["is_error"], true);
        assert_eq!(body["message"], crate::constants::ALREADY_CLAIMED_TODAY);

        clock.advance(Duration::hours(5));
        let res = test::call_service(&app, test::TestRequest::post().uri("/redeem").set_json(bonus("tok-1")).to_request()).await;
        assert_eq!(res.status().as_u16(), 200);
    }

    #[actix_web::test]
    async fn unchecked_redeem_is_a_withdrawal_without_the_daily_check(){
        let (store, _, app_state) = state("2024-01-02T20:00:00Z").await;
        let app = test::init_service(App::new().app_data(app_state).configure(services::init_ledger)).await;

        for _ in 0..2{
            let mut payload = bonus("tok-1");
            payload["isChecked"] = json!(false);
            payload["amount"] = json!(12.5);
            let res = test::call_service(&app, test::TestRequest::post().uri("/redeem").set_json(payload).to_request()).await;
            assert_eq!(res.status().as_u16(), 200);
        }

        let user = store.user(&"u1".into()).await.unwrap();
        assert_eq!(user.ledger.len(), 2);
        assert!(user.ledger.records().all(|r| !r.is_daily_bonus && r.payment.method.as_deref() == Some("cashapp")));
    }

    #[actix_web::test]
    async fn unknown_token_and_negative_amount(){
        let (_, _, app_state) = state("2024-01-02T20:00:00Z").await;
        let app = test::init_service(App::new().app_data(app_state).configure(services::init_ledger)).await;

        let res = test::call_service(&app, test::TestRequest::post().uri("/redeem").set_json(bonus("nope")).to_request()).await;
        assert_eq!(res.status().as_u16(), 404);

        let res = test::call_service(
            &app,
            test::TestRequest::post().uri("/deposit").set_json(json!({"token": "tok-1", "amount": "-3"})).to_request()
        ).await;
        assert_eq!(res.status().as_u16(), 400);
        let body: Value = test::read_body_json(res).await;
        assert_eq!(body["message"], crate::constants::INVALID_AMOUNT);
    }

    #[actix_web::test]
    async fn storage_failure_is_a_500(){
        let (store, _, app_state) = state("2024-01-02T20:00:00Z").await;
        let app = test::init_service(App::new().app_data(app_state).configure(services::init_ledger)).await;

        store.fail_next_writes(100);
        let res = test::call_service(&app, test::TestRequest::post().uri("/redeem").set_json(bonus("tok-1")).to_request()).await;
        assert_eq!(res.status().as_u16(), 500);
        let body: Value = test::read_body_json(res).await;
        assert_eq!(body["message"], crate::constants::STORAGE_ISSUE);
    }

    #[actix_web::test]
    async fn history_needs_a_bearer_and_is_newest_first(){
        let (_, clock, app_state) = state("2024-01-02T20:00:00Z").await;
        let app = test::init_service(App::new().app_data(app_state).configure(services::init_ledger)).await;

        let res = test::call_service(&app, test::TestRequest::get().uri("/history").to_request()).await;
        assert_eq!(res.status().as_u16(), 401);

        test::call_service(&app, test::TestRequest::post().uri("/deposit").set_json(json!({"token": "tok-1", "amount": 20})).to_request()).await;
        clock.advance(Duration::minutes(1));
        test::call_service(&app, test::TestRequest::post().uri("/redeem").set_json(bonus("tok-1")).to_request()).await;

        let res = test::call_service(
            &app,
            test::TestRequest::get().uri("/history").insert_header(("Authorization", "Bearer tok-1")).to_request()
        ).await;
        assert_eq!(res.status().as_u16(), 200);
        let body: Value = test::read_body_json(res).await;
        let kinds: Vec<&str> = body["data"].as_array().unwrap().iter().map(|r| r["kind"].as_str().unwrap()).collect();
        assert_eq!(kinds, vec!["bonus_claim", "deposit"]);
    }

}

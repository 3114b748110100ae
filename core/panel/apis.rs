



/*  > ---------------------------------------------------------------------------------------------
    | every api return type is Result<actix_web::HttpResponse, actix_web::Error>
    | and answers with the misc::Response envelope
    |
    |   redeem ---> redeem, deposit and history apis over the ledger service
    |   health ---> all apis related to server health
    |
*/
pub mod redeem;
pub mod health;

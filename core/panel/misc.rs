


use ledger::LedgerService;
use serde::{Serialize, Deserialize};


/* shared between the actix workers through web::Data */
#[derive(Clone)]
pub struct AppState{
    pub ledger: LedgerService,
}


/*
    every api answers with this envelope, the
    message lives as long as the static it points to
*/
#[derive(Serialize, Deserialize, Debug)]
pub struct Response<'m, T>{
    pub data: Option<T>,
    pub message: &'m str,
    pub status: u16,
    pub is_error: bool,
}


#[macro_export]
macro_rules! resp {
    (
        $data_type:ty,
        $data:expr,
        $msg:expr,
        $code:expr,
    ) => {

        {
            use actix_web::HttpResponse;
            use crate::misc::Response;

            let code = $code.as_u16();
            let response_data = Response::<$data_type>{
                data: Some($data),
                message: $msg,
                status: code,
                is_error: code >= 400,
            };

            return Ok(HttpResponse::build($code).json(response_data));
        }
    }
}

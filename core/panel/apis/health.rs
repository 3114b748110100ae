


use actix_web::{get, http::StatusCode};
use serde::{Serialize, Deserialize};
use crate::constants::*;
use crate::resp;


#[derive(Serialize, Deserialize, Clone)]
pub struct Health{
    pub status: String,
}


#[get("/check-server")]
pub async fn index() -> PanelHttpResponse {

    let iam_healthy = Health{
        status: "🥞 Alive".to_string()
    };

    resp!{
        Health, // the data type
        iam_healthy, // response data
        IAM_HEALTHY, // response message
        StatusCode::OK, // status code
    }

}

pub mod exports{
    pub use super::index;
}

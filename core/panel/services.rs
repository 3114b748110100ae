



/*
    route registration per scope, the app factory in
    app.rs mounts each of these on its own prefix
*/



use actix_web::web;
use crate::apis;



/*
     --------------------------------
    |      REGISTER LEDGER ROUTES
    | -------------------------------
    |
    |

*/
pub fn init_ledger(config: &mut web::ServiceConfig){

    config.service(apis::redeem::exports::redeem);
    config.service(apis::redeem::exports::deposit);
    config.service(apis::redeem::exports::history);

}

/*
     --------------------------------
    |      REGISTER HEALTH ROUTES
    | -------------------------------
    |
    |

*/
pub fn init_health(config: &mut web::ServiceConfig){

    config.service(apis::health::exports::index);

}

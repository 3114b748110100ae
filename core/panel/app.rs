


/*
   -=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=
            REDEEM PANEL HTTP SERVER
   -=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=
   thin actix wrapper over the ledger service,
   the ledger crate owns every rule
*/


use std::sync::Arc;
use actix_web::{web, web::Data, App, HttpServer};
use actix_web::middleware::Logger;
use dotenv::dotenv;
use env_logger::Env as LogEnv;
use ledger::{LedgerService, MongoLedgerStore};
use log::{error, info};
use timekeeper::SystemClock;
use constants::APP_NAME;
use misc::AppState;

mod apis;
mod config;
mod constants;
mod misc;
mod services;


#[actix_web::main]
async fn main() -> std::io::Result<()> {

    dotenv().ok();
    env_logger::init_from_env(LogEnv::default().default_filter_or("info"));

    let env = match config::Env::from_env(){
        Ok(env) => env,
        Err(e) => {
            error!("{}", e);
            return Err(std::io::Error::new(std::io::ErrorKind::InvalidInput, e.to_string()));
        }
    };

    info!("➔ 🛢️ switching to mongodb on address: [{}:{}]", env.db_host, env.db_port);
    let store = match MongoLedgerStore::connect(&env.mongodb_uri(), &env.db_name).await{
        Ok(store) => store,
        Err(e) => {
            error!("can't reach mongodb: {}", e);
            return Err(std::io::Error::new(std::io::ErrorKind::ConnectionRefused, e.to_string()));
        }
    };

    info!("➔ 🕰️ daily bonus day is taken in {}", env.ledger.zone);
    let ledger = LedgerService::new(Arc::new(store), Arc::new(SystemClock), env.ledger.clone());
    let shared_state = Data::new(AppState{ ledger });

    info!("➔ 🚀 {} panel HTTP server has launched from [{}:{}] at {}", APP_NAME, env.host, env.port, chrono::Local::now().naive_local());
    HttpServer::new(move ||{
        App::new()
            /*
                SHARED STATE DATA
            */
            .app_data(Data::clone(&shared_state))
            .wrap(Logger::default())
            .wrap(Logger::new("%a %{User-Agent}i %t %P %r %s %b %T %D"))
            /*
                INIT LEDGER SERVICE APIs
            */
            .configure(services::init_ledger)
            /*
                INIT HEALTH SERVICE
            */
            .service(
                web::scope("/health")
                    .configure(services::init_health)
            )
        })
        .bind((env.host.as_str(), env.port))?
        .workers(10)
        .run()
        .await

}

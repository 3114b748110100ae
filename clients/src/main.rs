


/*
    registration submitter, every request goes through the
    admission governor first and its cooldown is kept on disk
    so restarting the process doesn't reopen the window, set
    COOLDOWN_STORE=redis to share it through redis instead

        clients status
        clients register <category> <nickname>
        clients wait
*/


use std::env;
use std::sync::Arc;
use std::time::Duration;
use admission::{
    available_categories, spawn_ticker, Admission, AdmissionError, AdmissionNotifier, CooldownConfig,
    CooldownStore, FileCooldownStore, Governor, LogNotifier, RedisCooldownStore, RedisNotifier, RegistrationError, RegistrationRequest,
    RequestKind, Requester, GAMES, RATE_LIMITED,
};
use dotenv::dotenv;
use env_logger::Env;
use log::{error, info, warn};
use serde::Deserialize;
use thiserror::Error;
use timekeeper::SystemClock;
use tokio::sync::Mutex;


#[derive(Debug, Error)]
enum ClientError{
    #[error("⚠️ no {0} variable set")]
    Missing(&'static str),
    #[error("⚠️ {var} has an invalid value {value:?}")]
    Invalid{ var: &'static str, value: String },
    #[error("usage: clients [status | register <category> <nickname> | wait]")]
    Usage,
    #[error(transparent)]
    Admission(#[from] AdmissionError),
    #[error(transparent)]
    Registration(#[from] RegistrationError),
    #[error("register request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("register endpoint answered {status}: {message}")]
    Rejected{ status: u16, message: String },
}


struct Config{
    register_endpoint: String,
    user_info_endpoint: Option<String>,
    token: String,
    user_id: String,
    user_name: String,
    cooldown: CooldownConfig,
    cooldown_dir: String,
    cooldown_in_redis: bool,
    redis_url: Option<String>,
    register_channel: String,
}

impl Config{

    fn from_env() -> Result<Self, ClientError>{

        let cooldown_seconds = match optional("COOLDOWN_SECONDS"){
            Some(value) => value.parse::<u64>().map_err(|_| ClientError::Invalid{ var: "COOLDOWN_SECONDS", value })?,
            None => 30,
        };

        let redis_url = optional("REDIS_HOST").map(|host| {
            let port = optional("REDIS_PORT").unwrap_or_else(|| "6379".to_string());
            match optional("REDIS_PASSWORD"){
                Some(password) => format!("redis://:{}@{}:{}", password, host, port),
                None => format!("redis://{}:{}", host, port),
            }
        });

        Ok(Self{
            register_endpoint: required("REGISTER_ENDPOINT")?,
            user_info_endpoint: optional("USER_INFO_ENDPOINT"),
            token: required("USER_TOKEN")?,
            user_id: required("USER_ID")?,
            user_name: optional("USER_NAME").unwrap_or_else(|| "player".to_string()),
            cooldown: CooldownConfig{
                duration: Duration::from_secs(cooldown_seconds),
                ..CooldownConfig::default()
            },
            cooldown_dir: optional("COOLDOWN_DIR").unwrap_or_else(|| ".cooldown".to_string()),
            cooldown_in_redis: match optional("COOLDOWN_STORE").as_deref(){
                None | Some("file") => false,
                Some("redis") => true,
                Some(other) => return Err(ClientError::Invalid{ var: "COOLDOWN_STORE", value: other.to_string() }),
            },
            redis_url,
            register_channel: optional("REGISTER_CHANNEL").unwrap_or_else(|| "userRegister".to_string()),
        })
    }

}

fn optional(var: &'static str) -> Option<String>{
    env::var(var).ok().filter(|v| !v.trim().is_empty())
}

fn required(var: &'static str) -> Result<String, ClientError>{
    optional(var).ok_or(ClientError::Missing(var))
}


#[derive(Deserialize)]
struct UserInfo{
    #[serde(default)]
    data: Vec<UserInfoData>,
}

#[derive(Deserialize)]
struct UserInfoData{
    #[serde(default)]
    register: Vec<RegisteredCategory>,
}

#[derive(Deserialize)]
struct RegisteredCategory{
    category: String,
}

async fn registered_categories(http: &reqwest::Client, config: &Config) -> Result<Vec<String>, ClientError>{
    let Some(endpoint) = &config.user_info_endpoint else{
        return Ok(vec![]);
    };
    let info: UserInfo = http
        .get(endpoint)
        .bearer_auth(&config.token)
        .send()
        .await?
        .error_for_status()?
        .json()
        .await?;
    Ok(
        info.data
            .into_iter()
            .next()
            .map(|user| user.register.into_iter().map(|r| r.category).collect())
            .unwrap_or_default()
    )
}

async fn forward(http: &reqwest::Client, config: &Config, request: &RegistrationRequest) -> Result<(), ClientError>{
    let response = http.post(&config.register_endpoint).json(request).send().await?;
    let status = response.status();
    if status.is_success(){
        return Ok(());
    }
    let body: serde_json::Value = response.json().await.unwrap_or_default();
    let message = body["message"].as_str().unwrap_or("register failed").to_string();
    Err(ClientError::Rejected{ status: status.as_u16(), message })
}


async fn run(command: Vec<String>) -> Result<(), ClientError>{

    let config = Config::from_env()?;

    let redis_client = match &config.redis_url{
        Some(url) => match redis::Client::open(url.as_str()){
            Ok(client) => Some(client),
            Err(e) => {
                warn!("redis disabled: {}", e);
                None
            }
        },
        None => None,
    };

    let notifier: Arc<dyn AdmissionNotifier> = match &redis_client{
        Some(client) => Arc::new(RedisNotifier::new(client.clone(), &config.register_channel)),
        None => Arc::new(LogNotifier),
    };

    let store: Arc<dyn CooldownStore> = match (&redis_client, config.cooldown_in_redis){
        (Some(client), true) => Arc::new(RedisCooldownStore::new(client.clone(), &config.user_id)),
        (None, true) => return Err(ClientError::Missing("REDIS_HOST")),
        (_, false) => Arc::new(FileCooldownStore::new(&config.cooldown_dir)),
    };

    let mut governor = Governor::restore(
        RequestKind::UserRegister,
        config.cooldown.clone(),
        store,
        Arc::new(SystemClock),
        notifier,
    ).await?;

    match command.iter().map(String::as_str).collect::<Vec<_>>().as_slice(){
        ["status"] => {
            let state = governor.tick().await;
            if state.active{
                info!("cooling down, {}s left", state.remaining_seconds);
            } else{
                info!("ready to register");
            }
            Ok(())
        },
        ["wait"] => {
            let state = governor.tick().await;
            if state.active{
                info!("waiting {}s for the cooldown to end", state.remaining_seconds);
                let ticker = spawn_ticker(Arc::new(Mutex::new(governor)));
                if let Err(e) = ticker.await{
                    error!("cooldown ticker stopped: {}", e);
                }
            }
            info!("ready to register");
            Ok(())
        },
        ["register", category, nickname] => {
            let http = reqwest::Client::new();
            let registered = registered_categories(&http, &config).await?;
            info!("available games: {:?}", available_categories(GAMES, &registered));

            /* rejected input must not cost the user a cooldown */
            let request = RegistrationRequest::new(category, nickname, &config.token, &config.user_id, GAMES, &registered)?;

            let requester = Requester{ user_id: config.user_id.clone(), name: config.user_name.clone() };
            match governor.submit_with(&requester, || forward(&http, &config, &request)).await?{
                Admission::Throttled{ remaining_seconds } => {
                    warn!("{} {} Seconds", RATE_LIMITED, remaining_seconds);
                    Ok(())
                },
                Admission::Admitted => {
                    info!("register for {} requested as {}", request.category, request.nickname);
                    Ok(())
                }
            }
        },
        _ => Err(ClientError::Usage),
    }

}


#[tokio::main]
async fn main(){

    dotenv().ok();
    env_logger::init_from_env(Env::default().default_filter_or("info"));

    let command: Vec<String> = env::args().skip(1).collect();
    if let Err(e) = run(command).await{
        error!("{}", e);
        std::process::exit(1);
    }

}

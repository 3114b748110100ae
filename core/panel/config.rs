


use std::env;
use std::str::FromStr;
use std::time::Duration;
use ledger::LedgerConfig;
use thiserror::Error;
use timekeeper::{ReferenceZone, TimeError, DEFAULT_REFERENCE_ZONE};


#[derive(Debug, Error)]
pub enum ConfigError{
    #[error("⚠️ no {0} variable set")]
    Missing(&'static str),
    #[error("⚠️ {var} has an invalid value {value:?}")]
    Invalid{ var: &'static str, value: String },
    #[error("⚠️ reference timezone: {0}")]
    Zone(#[from] TimeError),
}


/* everything the panel reads from the environment (or .env) at startup */
#[derive(Clone, Debug)]
pub struct Env{
    pub host: String,
    pub port: u16,
    pub db_engine: String,
    pub db_host: String,
    pub db_port: String,
    pub db_username: String,
    pub db_password: String,
    pub db_name: String,
    pub ledger: LedgerConfig,
}

impl Env{

    pub fn from_env() -> Result<Self, ConfigError>{

        let zone_name = optional("REFERENCE_TIMEZONE").unwrap_or_else(|| DEFAULT_REFERENCE_ZONE.to_string());
        let write_timeout_ms: u64 = parse_or("LEDGER_WRITE_TIMEOUT_MS", 5000)?;
        let max_attempts: u32 = parse_or("LEDGER_MAX_APPEND_ATTEMPTS", 8)?;
        if max_attempts == 0{
            return Err(ConfigError::Invalid{ var: "LEDGER_MAX_APPEND_ATTEMPTS", value: "0".to_string() });
        }

        Ok(Self{
            host: required("HOST")?,
            port: parse_required("PANEL_PORT")?,
            db_engine: optional("MONGODB_ENGINE").unwrap_or_else(|| "mongodb".to_string()),
            db_host: required("MONGODB_HOST")?,
            db_port: required("MONGODB_PORT")?,
            db_username: optional("MONGODB_USERNAME").unwrap_or_default(),
            db_password: optional("MONGODB_PASSWORD").unwrap_or_default(),
            db_name: required("DB_NAME")?,
            ledger: LedgerConfig{
                zone: ReferenceZone::parse(&zone_name)?,
                write_timeout: Duration::from_millis(write_timeout_ms),
                max_attempts,
            },
        })
    }

    /// Credentials are only put in the address when a username is set.
    pub fn mongodb_uri(&self) -> String{
        if self.db_username.is_empty(){
            format!("{}://{}:{}", self.db_engine, self.db_host, self.db_port)
        } else{
            format!("{}://{}:{}@{}:{}", self.db_engine, self.db_username, self.db_password, self.db_host, self.db_port)
        }
    }

}


fn optional(var: &'static str) -> Option<String>{
    env::var(var).ok().filter(|v| !v.trim().is_empty())
}

fn required(var: &'static str) -> Result<String, ConfigError>{
    optional(var).ok_or(ConfigError::Missing(var))
}

fn parse_value<T: FromStr>(var: &'static str, value: String) -> Result<T, ConfigError>{
    value.trim().parse::<T>().map_err(|_| ConfigError::Invalid{ var, value })
}

fn parse_required<T: FromStr>(var: &'static str) -> Result<T, ConfigError>{
    parse_value(var, required(var)?)
}

fn parse_or<T: FromStr>(var: &'static str, default: T) -> Result<T, ConfigError>{
    match optional(var){
        Some(value) => parse_value(var, value),
        None => Ok(default),
    }
}




use thiserror::Error;


#[derive(Debug, Error)]
pub enum AdmissionError{
    #[error("cooldown file io: {0}")]
    Io(#[from] std::io::Error),
    #[error("redis: {0}")]
    Redis(#[from] redis::RedisError),
    #[error("cooldown codec: {0}")]
    Codec(#[from] serde_json::Error),
}

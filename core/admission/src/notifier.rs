


use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::info;
use redis::AsyncCommands;
use serde::Serialize;
use crate::error::AdmissionError;
use crate::governor::{RequestKind, Requester};


#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct AdmissionNotice{
    pub kind: RequestKind,
    pub user_id: String,
    pub message: String,
    pub at: DateTime<Utc>,
}

impl AdmissionNotice{
    pub fn new(kind: RequestKind, requester: &Requester, at: DateTime<Utc>) -> Self{
        let message = match kind{
            RequestKind::UserRegister => format!("{} requested codenumber!", requester.name),
            RequestKind::Redeem => format!("{} requested redeem!", requester.name),
        };
        Self{ kind, user_id: requester.user_id.clone(), message, at }
    }
}


/// Told once per admitted request.
#[async_trait]
pub trait AdmissionNotifier: Send + Sync{
    async fn notify(&self, notice: &AdmissionNotice) -> Result<(), AdmissionError>;
}


#[derive(Clone, Copy, Debug, Default)]
pub struct LogNotifier;

#[async_trait]
impl AdmissionNotifier for LogNotifier{
    async fn notify(&self, notice: &AdmissionNotice) -> Result<(), AdmissionError>{
        info!("{}", notice.message);
        Ok(())
    }
}


/// Publishes every notice as JSON on a redis pubsub channel so the
/// admin side can pick it up.
#[derive(Clone, Debug)]
pub struct RedisNotifier{
    client: redis::Client,
    channel: String,
}

impl RedisNotifier{
    pub fn new(client: redis::Client, channel: &str) -> Self{
        Self{ client, channel: channel.to_string() }
    }
}

#[async_trait]
impl AdmissionNotifier for RedisNotifier{
    async fn notify(&self, notice: &AdmissionNotice) -> Result<(), AdmissionError>{
        let mut conn = self.client.get_async_connection().await?;
        let payload = serde_json::to_string(notice)?;
        let _: () = conn.publish(&self.channel, payload).await?;
        Ok(())
    }
}

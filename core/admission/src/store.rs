


/*
    >------------------------------------------------------------------
    | where the cooldown survives a restart. the file store is what a
    | client process keeps on its own disk, the redis one is the
    | shared flavour of the panel's rate limiter map
    |
*/

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use async_trait::async_trait;
use redis::AsyncCommands;
use crate::error::AdmissionError;
use crate::governor::{PersistedCooldown, RequestKind};


#[async_trait]
pub trait CooldownStore: Send + Sync{
    async fn load(&self, kind: RequestKind) -> Result<Option<PersistedCooldown>, AdmissionError>;
    async fn save(&self, kind: RequestKind, cooldown: &PersistedCooldown) -> Result<(), AdmissionError>;
    async fn clear(&self, kind: RequestKind) -> Result<(), AdmissionError>;
}


#[derive(Debug, Default)]
pub struct MemoryCooldownStore{
    slots: Mutex<HashMap<RequestKind, PersistedCooldown>>,
}

impl MemoryCooldownStore{
    pub fn new() -> Self{
        Self::default()
    }

    fn slots(&self) -> std::sync::MutexGuard<'_, HashMap<RequestKind, PersistedCooldown>>{
        self.slots.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl CooldownStore for MemoryCooldownStore{

    async fn load(&self, kind: RequestKind) -> Result<Option<PersistedCooldown>, AdmissionError>{
        Ok(self.slots().get(&kind).cloned())
    }

    async fn save(&self, kind: RequestKind, cooldown: &PersistedCooldown) -> Result<(), AdmissionError>{
        self.slots().insert(kind, cooldown.clone());
        Ok(())
    }

    async fn clear(&self, kind: RequestKind) -> Result<(), AdmissionError>{
        self.slots().remove(&kind);
        Ok(())
    }

}


/// One JSON file per request kind under `dir`.
#[derive(Clone, Debug)]
pub struct FileCooldownStore{
    dir: PathBuf,
}

impl FileCooldownStore{

    pub fn new(dir: impl AsRef<Path>) -> Self{
        Self{ dir: dir.as_ref().to_path_buf() }
    }

    pub fn path_for(&self, kind: RequestKind) -> PathBuf{
        self.dir.join(format!("cooldown_data.{}.json", kind.name()))
    }

}

#[async_trait]
impl CooldownStore for FileCooldownStore{

    async fn load(&self, kind: RequestKind) -> Result<Option<PersistedCooldown>, AdmissionError>{
        match tokio::fs::read(self.path_for(kind)).await{
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn save(&self, kind: RequestKind, cooldown: &PersistedCooldown) -> Result<(), AdmissionError>{
        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.path_for(kind);
        let staging = path.with_extension("json.tmp");
        tokio::fs::write(&staging, serde_json::to_vec(cooldown)?).await?;
        tokio::fs::rename(&staging, &path).await?;
        Ok(())
    }

    async fn clear(&self, kind: RequestKind) -> Result<(), AdmissionError>{
        match tokio::fs::remove_file(self.path_for(kind)).await{
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

}


#[derive(Clone, Debug)]
pub struct RedisCooldownStore{
    client: redis::Client,
    scope: String,
}

impl RedisCooldownStore{

    /// `scope` separates sessions sharing one redis, e.g. a user id.
    pub fn new(client: redis::Client, scope: &str) -> Self{
        Self{ client, scope: scope.to_string() }
    }

    pub fn key(&self, kind: RequestKind) -> String{
        format!("{}:{}", kind.key(), self.scope)
    }

}

#[async_trait]
impl CooldownStore for RedisCooldownStore{

    async fn load(&self, kind: RequestKind) -> Result<Option<PersistedCooldown>, AdmissionError>{
        let mut conn = self.client.get_async_connection().await?;
        let raw: Option<String> = conn.get(self.key(kind)).await?;
        match raw{
            Some(data) => Ok(Some(serde_json::from_str(&data)?)),
            None => Ok(None),
        }
    }

    async fn save(&self, kind: RequestKind, cooldown: &PersistedCooldown) -> Result<(), AdmissionError>{
        let mut conn = self.client.get_async_connection().await?;
        let data = serde_json::to_string(cooldown)?;
        let _: () = conn.set(self.key(kind), data).await?;
        Ok(())
    }

    async fn clear(&self, kind: RequestKind) -> Result<(), AdmissionError>{
        let mut conn = self.client.get_async_connection().await?;
        let _: () = conn.del(self.key(kind)).await?;
        Ok(())
    }

}




/*
    >------------------------------------------------------------------
    | client side chill zone for repeated submissions of one request
    | kind: Idle -> Cooldown -> Idle
    |
    | the cooldown is stored as a wall clock start plus its length, on
    | a restart the remaining time is recomputed from how much wall
    | clock has passed so a reload never hands back a fresh window.
    | advisory only, the server must still enforce its own limits
    |
*/

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use chrono::{DateTime, Utc};
use log::{error, info, warn};
use serde::{Serialize, Deserialize};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use timekeeper::Clock;
use crate::error::AdmissionError;
use crate::notifier::{AdmissionNotice, AdmissionNotifier};
use crate::store::CooldownStore;


#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestKind{
    UserRegister,
    Redeem,
}

impl RequestKind{

    pub fn name(&self) -> &'static str{
        match self{
            RequestKind::UserRegister => "user_register",
            RequestKind::Redeem => "redeem",
        }
    }

    pub fn key(&self) -> String{
        format!("cooldown_data:{}", self.name())
    }

}


#[derive(Clone, Debug)]
pub struct CooldownConfig{
    pub duration: Duration,
    pub tick_interval: Duration,
}

impl Default for CooldownConfig{
    fn default() -> Self{
        Self{
            duration: Duration::from_secs(30),
            tick_interval: Duration::from_secs(1),
        }
    }
}


/// What lands on disk or in redis. The aliases read the bare
/// `{cooldown, remainingTime}` snapshots older clients wrote.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedCooldown{
    #[serde(alias = "cooldown")]
    pub active: bool,
    #[serde(alias = "remainingTime")]
    pub remaining_seconds: u64,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub duration_seconds: u64,
    #[serde(default)]
    pub saved_at: Option<DateTime<Utc>>,
}


#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct CooldownState{
    pub active: bool,
    pub remaining_seconds: u64,
}

pub const RATE_LIMITED: &str = "Rate Limited, Chill";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Admission{
    Admitted,
    Throttled{ remaining_seconds: u64 },
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Requester{
    pub user_id: String,
    pub name: String,
}


#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Phase{
    Idle,
    Cooldown{ started_at: DateTime<Utc>, deadline: DateTime<Utc> },
}

fn seconds_until(deadline: DateTime<Utc>, now: DateTime<Utc>) -> u64{
    let millis = (deadline - now).num_milliseconds();
    if millis <= 0{
        0
    } else{
        (millis as u64 + 999) / 1000
    }
}

fn window_of(config: &CooldownConfig) -> chrono::Duration{
    chrono::Duration::from_std(config.duration).unwrap_or_else(|_| chrono::Duration::seconds(30))
}

/* stored seconds come from a client-editable file, never trust them past the window */
fn bounded_span(seconds: u64, window: chrono::Duration) -> chrono::Duration{
    i64::try_from(seconds)
        .ok()
        .and_then(chrono::Duration::try_seconds)
        .map_or(window, |span| span.min(window))
}

fn reconcile(persisted: &PersistedCooldown, now: DateTime<Utc>, window: chrono::Duration) -> Phase{

    if !persisted.active{
        return Phase::Idle;
    }

    let (started_at, length) = match (persisted.started_at, persisted.saved_at){
        (Some(started_at), _) if persisted.duration_seconds > 0 => {
            (started_at, bounded_span(persisted.duration_seconds, window))
        },
        (_, Some(saved_at)) => (saved_at, bounded_span(persisted.remaining_seconds, window)),
        /* nothing to measure elapsed time from, resume what was stored */
        _ => (now, bounded_span(persisted.remaining_seconds, window)),
    };

    /* a clock that went backwards must not stretch the window */
    let started_at = started_at.min(now);
    let Some(deadline) = started_at.checked_add_signed(length) else{
        return Phase::Idle;
    };

    if seconds_until(deadline, now) == 0{
        Phase::Idle
    } else{
        Phase::Cooldown{ started_at, deadline }
    }
}


pub struct Governor{
    kind: RequestKind,
    config: CooldownConfig,
    phase: Phase,
    store: Arc<dyn CooldownStore>,
    clock: Arc<dyn Clock>,
    notifier: Arc<dyn AdmissionNotifier>,
}

impl Governor{

    /// Builds the governor for `kind`, resuming any cooldown a previous
    /// process persisted.
    pub async fn restore(
        kind: RequestKind,
        config: CooldownConfig,
        store: Arc<dyn CooldownStore>,
        clock: Arc<dyn Clock>,
        notifier: Arc<dyn AdmissionNotifier>,
    ) -> Result<Self, AdmissionError>{

        let now = clock.now();
        let persisted = store.load(kind).await?;

        let phase = match &persisted{
            Some(snapshot) => reconcile(snapshot, now, window_of(&config)),
            None => Phase::Idle,
        };

        if persisted.is_some() && phase == Phase::Idle{
            store.clear(kind).await?;
        }

        let governor = Self{ kind, config, phase, store, clock, notifier };
        let state = governor.state();
        if state.active{
            info!("{} resumed in cooldown, {}s left", kind.name(), state.remaining_seconds);
        }

        Ok(governor)
    }

    pub fn kind(&self) -> RequestKind{
        self.kind
    }

    pub fn config(&self) -> &CooldownConfig{
        &self.config
    }

    pub fn state(&self) -> CooldownState{
        match self.phase{
            Phase::Idle => CooldownState{ active: false, remaining_seconds: 0 },
            Phase::Cooldown{ deadline, .. } => {
                let remaining_seconds = seconds_until(deadline, self.clock.now());
                CooldownState{ active: remaining_seconds > 0, remaining_seconds }
            }
        }
    }

    /// Admits and announces in one step.
    pub async fn submit(&mut self, requester: &Requester) -> Admission{
        let admission = self.admit(requester).await;
        if admission == Admission::Admitted{
            self.announce(requester).await;
        }
        admission
    }

    /// Admits and runs `forward`; the notice only goes out once `forward`
    /// succeeded. The cooldown stays started either way.
    pub async fn submit_with<F, Fut, E>(&mut self, requester: &Requester, forward: F) -> Result<Admission, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<(), E>>,
    {
        let admission = self.admit(requester).await;
        if admission == Admission::Admitted{
            forward().await?;
            self.announce(requester).await;
        }
        Ok(admission)
    }

    /// Checks the window and starts a fresh cooldown when idle, without
    /// telling the notifier.
    pub async fn admit(&mut self, requester: &Requester) -> Admission{

        let state = self.tick().await;
        if state.active{
            info!("{} from {} throttled, {}s left", self.kind.name(), requester.user_id, state.remaining_seconds);
            return Admission::Throttled{ remaining_seconds: state.remaining_seconds };
        }

        let now = self.clock.now();
        self.phase = Phase::Cooldown{ started_at: now, deadline: now + window_of(&self.config) };
        self.persist().await;

        Admission::Admitted
    }

    async fn announce(&self, requester: &Requester){
        let notice = AdmissionNotice::new(self.kind, requester, self.clock.now());
        if let Err(e) = self.notifier.notify(&notice).await{
            warn!("admission notice for {} was not delivered: {}", self.kind.name(), e);
        }
    }

    /// Recomputes the remaining time; reaching zero goes back to Idle and
    /// drops the persisted state.
    pub async fn tick(&mut self) -> CooldownState{

        let Phase::Cooldown{ .. } = self.phase else{
            return self.state();
        };

        let state = self.state();
        if state.active{
            self.persist().await;
        } else{
            self.phase = Phase::Idle;
            if let Err(e) = self.store.clear(self.kind).await{
                error!("can't clear cooldown of {}: {}", self.kind.name(), e);
            }
        }

        state
    }

    async fn persist(&self){
        let Phase::Cooldown{ started_at, deadline } = self.phase else{
            return;
        };
        let now = self.clock.now();
        let snapshot = PersistedCooldown{
            active: true,
            remaining_seconds: seconds_until(deadline, now),
            started_at: Some(started_at),
            duration_seconds: seconds_until(deadline, started_at),
            saved_at: Some(now),
        };
        /* the in-memory window still throttles if this fails */
        if let Err(e) = self.store.save(self.kind, &snapshot).await{
            error!("can't persist cooldown of {}: {}", self.kind.name(), e);
        }
    }

}


/// Drives `tick` on the configured interval until the governor is idle.
pub fn spawn_ticker(governor: Arc<Mutex<Governor>>) -> JoinHandle<()>{
    tokio::spawn(async move{
        let period = governor.lock().await.config.tick_interval.max(Duration::from_millis(1));
        let mut interval = tokio::time::interval(period);
        interval.tick().await;
        loop{
            interval.tick().await;
            let state = governor.lock().await.tick().await;
            if !state.active{
                break;
            }
        }
    })
}



#[cfg(test)]
mod tests{

    use super::*;
    use chrono::Duration as ChronoDuration;
    use timekeeper::ManualClock;
    use crate::notifier::tests::RecordingNotifier;
    use crate::store::MemoryCooldownStore;

    fn at(s: &str) -> DateTime<Utc>{
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    fn alice() -> Requester{
        Requester{ user_id: "u1".to_string(), name: "alice".to_string() }
    }

    fn config(secs: u64) -> CooldownConfig{
        CooldownConfig{ duration: Duration::from_secs(secs), tick_interval: Duration::from_millis(10) }
    }

    async fn governor(store: Arc<MemoryCooldownStore>, clock: Arc<ManualClock>, notifier: Arc<RecordingNotifier>, secs: u64) -> Governor{
        Governor::restore(RequestKind::UserRegister, config(secs), store, clock, notifier).await.unwrap()
    }

    #[tokio::test]
    async fn admits_then_throttles_then_idles(){
        let store = Arc::new(MemoryCooldownStore::new());
        let clock = Arc::new(ManualClock::new(at("2024-01-01T00:00:00Z")));
        let notifier = Arc::new(RecordingNotifier::default());
        let mut gov = governor(store.clone(), clock.clone(), notifier.clone(), 30).await;

        assert_eq!(gov.state(), CooldownState{ active: false, remaining_seconds: 0 });
        assert_eq!(gov.submit(&alice()).await, Admission::Admitted);
        assert_eq!(notifier.notices().len(), 1);
        assert_eq!(notifier.notices()[0].message, "alice requested codenumber!");

        clock.advance(ChronoDuration::seconds(12));
        assert_eq!(gov.submit(&alice()).await, Admission::Throttled{ remaining_seconds: 18 });
        assert_eq!(notifier.notices().len(), 1);

        clock.advance(ChronoDuration::seconds(18));
        assert_eq!(gov.tick().await, CooldownState{ active: false, remaining_seconds: 0 });
        assert_eq!(store.load(RequestKind::UserRegister).await.unwrap(), None);
        assert_eq!(gov.submit(&alice()).await, Admission::Admitted);
    }

    #[tokio::test]
    async fn reload_resumes_from_elapsed_wall_clock(){
        let store = Arc::new(MemoryCooldownStore::new());
        let clock = Arc::new(ManualClock::new(at("2024-01-01T00:00:00Z")));
        let notifier = Arc::new(RecordingNotifier::default());

        let mut before = governor(store.clone(), clock.clone(), notifier.clone(), 59).await;
        assert_eq!(before.submit(&alice()).await, Admission::Admitted);
        assert_eq!(before.state().remaining_seconds, 59);
        drop(before);

        clock.advance(ChronoDuration::seconds(10));
        let after = governor(store.clone(), clock.clone(), notifier.clone(), 59).await;
        let state = after.state();
        assert!(state.active);
        assert!(state.remaining_seconds <= 49 && state.remaining_seconds > 0);
    }

    #[tokio::test]
    async fn reload_after_expiry_starts_idle_and_clears(){
        let store = Arc::new(MemoryCooldownStore::new());
        let clock = Arc::new(ManualClock::new(at("2024-01-01T00:00:00Z")));
        let notifier = Arc::new(RecordingNotifier::default());

        let mut before = governor(store.clone(), clock.clone(), notifier.clone(), 30).await;
        before.submit(&alice()).await;

        clock.advance(ChronoDuration::seconds(31));
        let after = governor(store.clone(), clock.clone(), notifier.clone(), 30).await;
        assert!(!after.state().active);
        assert_eq!(store.load(RequestKind::UserRegister).await.unwrap(), None);
    }

    #[tokio::test]
    async fn legacy_snapshot_is_resumed(){
        let store = Arc::new(MemoryCooldownStore::new());
        let legacy: PersistedCooldown = serde_json::from_str(r#"{"cooldown":true,"remainingTime":59}"#).unwrap();
        store.save(RequestKind::UserRegister, &legacy).await.unwrap();

        let clock = Arc::new(ManualClock::new(at("2024-01-01T00:00:00Z")));
        let gov = governor(store, clock, Arc::new(RecordingNotifier::default()), 59).await;
        assert_eq!(gov.state(), CooldownState{ active: true, remaining_seconds: 59 });
    }

    #[tokio::test]
    async fn stored_window_longer_than_configured_is_capped(){
        let store = Arc::new(MemoryCooldownStore::new());
        let legacy: PersistedCooldown = serde_json::from_str(r#"{"cooldown":true,"remainingTime":3600}"#).unwrap();
        store.save(RequestKind::UserRegister, &legacy).await.unwrap();

        let clock = Arc::new(ManualClock::new(at("2024-01-01T00:00:00Z")));
        let gov = governor(store, clock, Arc::new(RecordingNotifier::default()), 30).await;
        assert_eq!(gov.state(), CooldownState{ active: true, remaining_seconds: 30 });
    }

    #[tokio::test]
    async fn corrupt_duration_is_capped_not_fatal(){
        let store = Arc::new(MemoryCooldownStore::new());
        let now = at("2024-01-01T00:00:00Z");
        let corrupt = PersistedCooldown{
            active: true,
            remaining_seconds: u64::MAX,
            started_at: Some(now - ChronoDuration::seconds(5)),
            duration_seconds: 10_000_000_000_000,
            saved_at: Some(now),
        };
        store.save(RequestKind::UserRegister, &corrupt).await.unwrap();

        let clock = Arc::new(ManualClock::new(now));
        let gov = governor(store, clock, Arc::new(RecordingNotifier::default()), 30).await;
        assert_eq!(gov.state(), CooldownState{ active: true, remaining_seconds: 25 });
    }

    #[test]
    fn start_at_the_edge_of_time_goes_idle(){
        let persisted = PersistedCooldown{
            active: true,
            remaining_seconds: 30,
            started_at: Some(DateTime::<Utc>::MAX_UTC),
            duration_seconds: 30,
            saved_at: None,
        };
        let now = DateTime::<Utc>::MAX_UTC;
        assert_eq!(reconcile(&persisted, now, ChronoDuration::seconds(30)), Phase::Idle);
    }

    #[tokio::test]
    async fn failed_forward_sends_no_notice(){
        let store = Arc::new(MemoryCooldownStore::new());
        let clock = Arc::new(ManualClock::new(at("2024-01-01T00:00:00Z")));
        let notifier = Arc::new(RecordingNotifier::default());
        let mut gov = governor(store.clone(), clock.clone(), notifier.clone(), 30).await;

        let failed: Result<Admission, &str> = gov.submit_with(&alice(), || async{ Err("endpoint down") }).await;
        assert_eq!(failed, Err("endpoint down"));
        assert!(notifier.notices().is_empty());
        assert!(gov.state().active);

        clock.advance(ChronoDuration::seconds(30));
        let sent: Result<Admission, &str> = gov.submit_with(&alice(), || async{ Ok(()) }).await;
        assert_eq!(sent, Ok(Admission::Admitted));
        assert_eq!(notifier.notices().len(), 1);
        assert_eq!(notifier.notices()[0].message, "alice requested codenumber!");
    }

    #[tokio::test]
    async fn throttled_submission_never_runs_forward(){
        let store = Arc::new(MemoryCooldownStore::new());
        let clock = Arc::new(ManualClock::new(at("2024-01-01T00:00:00Z")));
        let notifier = Arc::new(RecordingNotifier::default());
        let mut gov = governor(store, clock, notifier.clone(), 30).await;
        assert_eq!(gov.admit(&alice()).await, Admission::Admitted);
        assert!(notifier.notices().is_empty());

        let outcome: Result<Admission, &str> = gov.submit_with(&alice(), || async{ Err("must not run") }).await;
        assert_eq!(outcome, Ok(Admission::Throttled{ remaining_seconds: 30 }));
        assert!(notifier.notices().is_empty());
    }

    #[test]
    fn backwards_clock_does_not_stretch_the_window(){
        let persisted = PersistedCooldown{
            active: true,
            remaining_seconds: 20,
            started_at: Some(at("2024-01-01T00:10:00Z")),
            duration_seconds: 30,
            saved_at: Some(at("2024-01-01T00:10:10Z")),
        };
        let now = at("2024-01-01T00:00:00Z");
        match reconcile(&persisted, now, ChronoDuration::seconds(30)){
            Phase::Cooldown{ deadline, .. } => assert_eq!(seconds_until(deadline, now), 30),
            Phase::Idle => panic!("expected cooldown"),
        }
    }

    #[tokio::test]
    async fn ticker_stops_once_idle(){
        let store = Arc::new(MemoryCooldownStore::new());
        let clock = Arc::new(ManualClock::new(at("2024-01-01T00:00:00Z")));
        let mut gov = governor(store.clone(), clock.clone(), Arc::new(RecordingNotifier::default()), 5).await;
        gov.submit(&alice()).await;

        let gov = Arc::new(Mutex::new(gov));
        let ticker = spawn_ticker(gov.clone());

        clock.advance(ChronoDuration::seconds(2));
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!ticker.is_finished());
        assert_eq!(store.load(RequestKind::UserRegister).await.unwrap().map(|p| p.remaining_seconds), Some(3));

        clock.advance(ChronoDuration::seconds(3));
        tokio::time::timeout(Duration::from_secs(2), ticker).await.unwrap().unwrap();
        assert!(!gov.lock().await.state().active);
        assert_eq!(store.load(RequestKind::UserRegister).await.unwrap(), None);
    }

}

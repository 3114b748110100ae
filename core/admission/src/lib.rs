


/*
   -=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=
            REQUEST ADMISSION GOVERNOR
   -=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=
   client side chill zone for registration and redeem requests,
   persisted across restarts and reported on a notifier
*/


pub mod error;
pub mod governor;
pub mod notifier;
pub mod register;
pub mod store;

pub use error::AdmissionError;
pub use governor::{spawn_ticker, Admission, CooldownConfig, CooldownState, Governor, PersistedCooldown, RequestKind, Requester, RATE_LIMITED};
pub use notifier::{AdmissionNotice, AdmissionNotifier, LogNotifier, RedisNotifier};
pub use register::{available_categories, validate_nickname, RegistrationError, RegistrationRequest, GAMES, STATUS_PROCESSING};
pub use store::{CooldownStore, FileCooldownStore, MemoryCooldownStore, RedisCooldownStore};

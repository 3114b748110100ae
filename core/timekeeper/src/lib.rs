


/*
   -=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=
        OPERATOR DAY & CLOCK PRIMITIVES
   -=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=
   every window check in the panel runs against one reference
   timezone for the whole deployment, a bonus day is the civil
   date in that zone and not the user's local date
*/


use std::sync::Mutex;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use chrono_tz::Tz;
use thiserror::Error;


/// Operator day used when no zone is configured.
pub const DEFAULT_REFERENCE_ZONE: &str = "Pacific/Honolulu";


#[derive(Debug, Error, PartialEq, Eq)]
pub enum TimeError{
    #[error("unknown reference timezone `{0}`")]
    UnknownZone(String),
}


/// The single operator-defined timezone canonical days are computed in.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReferenceZone(Tz);

impl ReferenceZone{

    pub fn new(tz: Tz) -> Self{
        Self(tz)
    }

    /// Parses an IANA zone name like `Pacific/Honolulu` or `UTC`.
    pub fn parse(name: &str) -> Result<Self, TimeError>{
        name.trim()
            .parse::<Tz>()
            .map(Self)
            .map_err(|_| TimeError::UnknownZone(name.to_string()))
    }

    pub fn tz(&self) -> Tz{
        self.0
    }

    /// Civil date `instant` falls on in this zone, DST rules included.
    pub fn canonical_day(&self, instant: DateTime<Utc>) -> NaiveDate{
        instant.with_timezone(&self.0).date_naive()
    }

    pub fn same_canonical_day(&self, a: DateTime<Utc>, b: DateTime<Utc>) -> bool{
        self.canonical_day(a) == self.canonical_day(b)
    }

}

impl Default for ReferenceZone{
    fn default() -> Self{
        Self(chrono_tz::Pacific::Honolulu)
    }
}

impl std::fmt::Display for ReferenceZone{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result{
        f.write_str(self.0.name())
    }
}

pub fn canonical_day(instant: DateTime<Utc>, zone: ReferenceZone) -> NaiveDate{
    zone.canonical_day(instant)
}

pub fn same_canonical_day(a: DateTime<Utc>, b: DateTime<Utc>, zone: ReferenceZone) -> bool{
    zone.same_canonical_day(a, b)
}


/*
    the clock is injected everywhere a "now" is needed so day boundary
    and cooldown behaviour can be driven from tests
*/
pub trait Clock: Send + Sync{
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock{
    fn now(&self) -> DateTime<Utc>{
        Utc::now()
    }
}

/// Clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock{
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock{

    pub fn new(start: DateTime<Utc>) -> Self{
        Self{ now: Mutex::new(start) }
    }

    pub fn set(&self, instant: DateTime<Utc>){
        let mut now = self.now.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        *now = instant;
    }

    pub fn advance(&self, by: Duration){
        let mut now = self.now.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        *now = *now + by;
    }

}

impl Clock for ManualClock{
    fn now(&self) -> DateTime<Utc>{
        *self.now.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}



#[cfg(test)]
mod tests{

    use super::*;

    fn at(s: &str) -> DateTime<Utc>{
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    #[test]
    fn utc_midnight_splits_days(){
        let zone = ReferenceZone::parse("UTC").unwrap();
        assert!(!zone.same_canonical_day(at("2024-01-01T23:59:00Z"), at("2024-01-02T00:01:00Z")));
        assert!(zone.same_canonical_day(at("2024-01-02T00:01:00Z"), at("2024-01-02T23:58:00Z")));
    }

    #[test]
    fn honolulu_day_is_offset_from_utc(){
        let zone = ReferenceZone::default();
        assert_eq!(zone.to_string(), DEFAULT_REFERENCE_ZONE);

        /* 09:59Z is still 23:59 of the previous day in HST */
        assert_eq!(zone.canonical_day(at("2024-01-02T09:59:00Z")), NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
        assert_eq!(zone.canonical_day(at("2024-01-02T10:01:00Z")), NaiveDate::from_ymd_opt(2024, 1, 2).unwrap());

        /* same UTC date, different operator days */
        assert!(!same_canonical_day(at("2024-01-02T09:00:00Z"), at("2024-01-02T11:00:00Z"), zone));
    }

    #[test]
    fn dst_transition_keeps_civil_dates(){
        let zone = ReferenceZone::parse("America/New_York").unwrap();
        /* 2024-03-10 spring forward, local day is only 23 hours long */
        let start = at("2024-03-10T05:00:00Z"); // 00:00 EST
        let end = at("2024-03-11T03:59:00Z"); // 23:59 EDT
        assert!(zone.same_canonical_day(start, end));
        assert!(!zone.same_canonical_day(end, at("2024-03-11T04:00:00Z")));
    }

    #[test]
    fn canonical_day_is_pure(){
        let zone = ReferenceZone::parse("Asia/Tokyo").unwrap();
        let t = at("2024-06-30T15:30:00Z");
        assert_eq!(canonical_day(t, zone), canonical_day(t, zone));
        assert_eq!(canonical_day(t, zone), NaiveDate::from_ymd_opt(2024, 7, 1).unwrap());
    }

    #[test]
    fn unknown_zone_is_rejected(){
        assert_eq!(ReferenceZone::parse("Mars/Olympus"), Err(TimeError::UnknownZone("Mars/Olympus".to_string())));
    }

    #[test]
    fn manual_clock_moves_only_on_demand(){
        let clock = ManualClock::new(at("2024-01-01T00:00:00Z"));
        assert_eq!(clock.now(), at("2024-01-01T00:00:00Z"));
        clock.advance(Duration::seconds(10));
        assert_eq!(clock.now(), at("2024-01-01T00:00:10Z"));
        clock.set(at("2025-05-05T05:05:05Z"));
        assert_eq!(clock.now(), at("2025-05-05T05:05:05Z"));
    }

}

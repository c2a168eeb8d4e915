//! Deadline arithmetic.
//!
//! Sessions are defined in studio wall-clock time; every comparison happens in
//! UTC after converting through the studio's offset. Deadlines are derived
//! fresh on every call from `(session, now)` and never cached.

use crate::types::Session;
use chrono::{DateTime, Duration, FixedOffset, NaiveDate, NaiveTime, Offset, Utc};

/// The studio's local time zone.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StudioTime {
    offset: FixedOffset,
}

impl StudioTime {
    /// Studio at a fixed offset from UTC.
    #[must_use]
    pub const fn new(offset: FixedOffset) -> Self {
        Self { offset }
    }

    /// Studio `minutes` east of UTC. `None` if the offset is out of range.
    #[must_use]
    pub fn from_offset_minutes(minutes: i32) -> Option<Self> {
        minutes
            .checked_mul(60)
            .and_then(FixedOffset::east_opt)
            .map(Self::new)
    }

    /// Studio on UTC.
    #[must_use]
    pub fn utc() -> Self {
        Self::new(Utc.fix())
    }

    /// The configured offset.
    #[must_use]
    pub const fn offset(&self) -> FixedOffset {
        self.offset
    }

    /// Calendar date at the studio at `now`.
    #[must_use]
    pub fn today(&self, now: DateTime<Utc>) -> NaiveDate {
        now.with_timezone(&self.offset).date_naive()
    }

    /// UTC instant of a studio wall-clock date and time.
    #[must_use]
    pub fn instant(&self, date: NaiveDate, time: NaiveTime) -> DateTime<Utc> {
        let local = date.and_time(time);
        let utc = local - Duration::seconds(i64::from(self.offset.local_minus_utc()));
        DateTime::from_naive_utc_and_offset(utc, Utc)
    }
}

/// Which actions a session still accepts.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeadlineStatus {
    /// Claims and voluntary cancellations are accepted
    Open,
    /// No new claims (and no voluntary cancellations either)
    RegistrationClosed,
    /// Claims are accepted but claimants can no longer cancel themselves
    CancellationClosed,
}

/// Deadlines of one session, resolved to UTC instants.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Deadlines {
    /// Session start
    pub start: DateTime<Utc>,
    /// Session end
    pub end: DateTime<Utc>,
    /// First instant at which new claims are refused
    pub registration: DateTime<Utc>,
    /// First instant at which claimants can no longer cancel
    pub cancellation: DateTime<Utc>,
}

impl Deadlines {
    /// Resolve the deadlines of `session` in `studio` time.
    #[must_use]
    pub fn for_session(session: &Session, studio: StudioTime) -> Self {
        let start = studio.instant(session.date, session.start_time);
        let end = studio.instant(session.date, session.end_time);
        Self {
            start,
            end,
            registration: start - Duration::minutes(i64::from(session.registration_deadline_minutes)),
            cancellation: start - Duration::minutes(i64::from(session.cancellation_deadline_minutes)),
        }
    }

    /// Whether a new claim is accepted at `now`. The deadline itself is closed.
    #[must_use]
    pub fn registration_open(&self, now: DateTime<Utc>) -> bool {
        now < self.registration && now < self.end
    }

    /// Whether a claimant may still cancel at `now`. The deadline itself is closed.
    #[must_use]
    pub fn cancellation_open(&self, now: DateTime<Utc>) -> bool {
        now < self.cancellation
    }

    /// Summarise both windows. A closed registration window wins.
    #[must_use]
    pub fn status(&self, now: DateTime<Utc>) -> DeadlineStatus {
        if !self.registration_open(now) {
            DeadlineStatus::RegistrationClosed
        } else if !self.cancellation_open(now) {
            DeadlineStatus::CancellationClosed
        } else {
            DeadlineStatus::Open
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::types::SessionId;

    fn evening_class() -> Session {
        Session {
            id: SessionId::new(),
            title: "Yoga".into(),
            trainer: "Mia".into(),
            date: NaiveDate::from_ymd_opt(2025, 3, 10).unwrap(),
            start_time: NaiveTime::from_hms_opt(18, 0, 0).unwrap(),
            end_time: NaiveTime::from_hms_opt(19, 0, 0).unwrap(),
            duration_minutes: 60,
            max_participants: 2,
            registration_deadline_minutes: 60,
            cancellation_deadline_minutes: 120,
            is_cancelled: false,
            cancelled_due_to_low_attendance: false,
        }
    }

    fn utc(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    #[test]
    fn deadlines_follow_the_studio_offset() {
        let cet = StudioTime::from_offset_minutes(60).unwrap();
        let d = Deadlines::for_session(&evening_class(), cet);

        assert_eq!(d.start, utc("2025-03-10T17:00:00Z"));
        assert_eq!(d.end, utc("2025-03-10T18:00:00Z"));
        assert_eq!(d.registration, utc("2025-03-10T16:00:00Z"));
        assert_eq!(d.cancellation, utc("2025-03-10T15:00:00Z"));
    }

    #[test]
    fn registration_deadline_is_inclusive() {
        let d = Deadlines::for_session(&evening_class(), StudioTime::utc());

        assert!(d.registration_open(d.registration - Duration::seconds(1)));
        assert!(!d.registration_open(d.registration));
        assert_eq!(d.status(d.registration), DeadlineStatus::RegistrationClosed);
    }

    #[test]
    fn cancellation_closes_before_registration() {
        let d = Deadlines::for_session(&evening_class(), StudioTime::utc());
        let between = d.cancellation + Duration::minutes(10);

        assert!(!d.cancellation_open(between));
        assert!(d.registration_open(between));
        assert_eq!(d.status(between), DeadlineStatus::CancellationClosed);
        assert_eq!(
            d.status(d.cancellation - Duration::seconds(1)),
            DeadlineStatus::Open
        );
    }

    #[test]
    fn registration_closes_at_end_even_with_zero_deadline() {
        let mut session = evening_class();
        session.registration_deadline_minutes = 0;
        let d = Deadlines::for_session(&session, StudioTime::utc());

        assert!(!d.registration_open(d.start));
        assert!(!d.registration_open(d.end));
    }

    #[test]
    fn studio_today_differs_from_utc_today_near_midnight() {
        let cet = StudioTime::from_offset_minutes(60).unwrap();
        let late = utc("2025-03-10T23:30:00Z");

        assert_eq!(cet.today(late), NaiveDate::from_ymd_opt(2025, 3, 11).unwrap());
        assert_eq!(
            StudioTime::utc().today(late),
            NaiveDate::from_ymd_opt(2025, 3, 10).unwrap()
        );
    }
}

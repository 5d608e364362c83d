use std::convert::TryFrom;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::id::Id;
use crate::error::{self, ValidationError};

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VotingPeriod {
    pub id: Id,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Where a period sits relative to the clock. Independent of `is_active`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Phase {
    NoPeriod,
    Scheduled,
    Active,
    Ended,
}

impl VotingPeriod {
    pub fn new(settings: &PeriodSettings) -> VotingPeriod {
        let now = Utc::now();
        VotingPeriod {
            id: Id::new(),
            start_time: settings.start_time,
            end_time: settings.end_time,
            is_active: settings.is_active.unwrap_or(true),
            created_at: now,
            updated_at: now,
        }
    }

    /// Bounds are inclusive on both ends.
    pub fn contains(&self, now: &DateTime<Utc>) -> bool {
        self.start_time <= *now && *now <= self.end_time
    }

    pub fn phase(&self, now: &DateTime<Utc>) -> Phase {
        if *now < self.start_time {
            Phase::Scheduled
        } else if *now > self.end_time {
            Phase::Ended
        } else {
            Phase::Active
        }
    }
}

pub fn phase(period: Option<&VotingPeriod>, now: &DateTime<Utc>) -> Phase {
    period.map_or(Phase::NoPeriod, |p| p.phase(now))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct UnvalidatedPeriodSettings {
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub is_active: Option<bool>,
}

/// A validated time range. `is_active: None` means "leave as is" on update
/// and "active" on create.
#[derive(Clone, Debug, PartialEq)]
pub struct PeriodSettings {
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub is_active: Option<bool>,
}

impl TryFrom<UnvalidatedPeriodSettings> for PeriodSettings {
    type Error = ValidationError;
    fn try_from(value: UnvalidatedPeriodSettings) -> Result<Self, Self::Error> {
        let (start_time, end_time) = match (value.start_time, value.end_time) {
            (Some(start), Some(end)) => (start, end),
            _ => return Err(error::period_fields_missing()),
        };
        if start_time >= end_time {
            return Err(error::period_range_invalid(&start_time, &end_time));
        }

        Ok(PeriodSettings {
            start_time,
            end_time,
            is_active: value.is_active,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn t(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 10, 18, hour, 0, 0).unwrap()
    }

    fn period(start: u32, end: u32) -> VotingPeriod {
        VotingPeriod::new(&PeriodSettings {
            start_time: t(start),
            end_time: t(end),
            is_active: None,
        })
    }

    #[test]
    fn rejects_inverted_or_empty_ranges() {
        let err = PeriodSettings::try_from(UnvalidatedPeriodSettings {
            start_time: Some(t(12)),
            end_time: Some(t(12)),
            is_active: None,
        })
        .unwrap_err();
        assert!(err.to_string().contains("must end after it starts"));

        assert!(PeriodSettings::try_from(UnvalidatedPeriodSettings {
            start_time: Some(t(13)),
            end_time: Some(t(12)),
            is_active: Some(true),
        })
        .is_err());
    }

    #[test]
    fn requires_both_bounds() {
        let err = PeriodSettings::try_from(UnvalidatedPeriodSettings {
            start_time: Some(t(9)),
            ..Default::default()
        })
        .unwrap_err();
        assert_eq!(err, error::period_fields_missing());
    }

    #[test]
    fn new_periods_default_to_active() {
        assert!(period(9, 17).is_active);
    }

    #[test]
    fn phase_follows_the_clock() {
        let p = period(9, 17);
        assert_eq!(phase(None, &t(10)), Phase::NoPeriod);
        assert_eq!(p.phase(&t(8)), Phase::Scheduled);
        assert_eq!(p.phase(&t(9)), Phase::Active);
        assert_eq!(p.phase(&t(17)), Phase::Active);
        assert_eq!(p.phase(&(t(17) + Duration::seconds(1))), Phase::Ended);
    }

    #[test]
    fn window_is_inclusive() {
        let p = period(9, 17);
        assert!(p.contains(&t(9)));
        assert!(p.contains(&t(17)));
        assert!(!p.contains(&(t(9) - Duration::milliseconds(1))));
    }
}

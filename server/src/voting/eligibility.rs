use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use super::id::Id;
use super::identity::VoterIdentity;
use super::period::VotingPeriod;
use crate::store::{Store, StoreError};

/// Why a vote may not be recorded right now.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Ineligible {
    #[error("Voting is closed: no voting period is active")]
    NoActivePeriod,

    #[error("Voting is outside the active voting window")]
    OutsideWindow,

    #[error("A vote for this project has already been cast")]
    DuplicateVote,
}

/// Checks that an active period exists and that `now` lies inside it.
pub fn check_window<'a>(active: Option<&'a VotingPeriod>, now: &DateTime<Utc>) -> Result<&'a VotingPeriod, Ineligible> {
    let period = active.ok_or(Ineligible::NoActivePeriod)?;
    if !period.contains(now) {
        return Err(Ineligible::OutsideWindow);
    }
    Ok(period)
}

pub fn check(active: Option<&VotingPeriod>, already_voted: bool, now: &DateTime<Utc>) -> Result<(), Ineligible> {
    check_window(active, now)?;
    if already_voted {
        return Err(Ineligible::DuplicateVote);
    }
    Ok(())
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Eligibility {
    pub allowed: bool,
    pub reason: Option<Ineligible>,
    pub message: Option<String>,
}

impl From<Result<(), Ineligible>> for Eligibility {
    fn from(value: Result<(), Ineligible>) -> Self {
        match value {
            Ok(()) => Eligibility { allowed: true, reason: None, message: None },
            Err(reason) => Eligibility {
                allowed: false,
                reason: Some(reason),
                message: Some(reason.to_string()),
            },
        }
    }
}

impl Eligibility {
    pub fn into_result(self) -> Result<(), Ineligible> {
        match self.reason {
            Some(reason) => Err(reason),
            None => Ok(()),
        }
    }
}

/// Decides whether an identity may vote for a project. The active period is
/// read from the store on every call.
pub struct EligibilityChecker<'a, S: ?Sized> {
    store: &'a S,
}

impl<'a, S: Store + ?Sized> EligibilityChecker<'a, S> {
    pub fn new(store: &'a S) -> Self {
        EligibilityChecker { store }
    }

    pub async fn can_vote(&self, identity: &VoterIdentity, project_id: &Id, now: DateTime<Utc>) -> Result<Eligibility, StoreError> {
        let active = self.store.active_period().await?;
        if let Err(reason) = check_window(active.as_ref(), &now) {
            return Ok(Eligibility::from(Err::<(), _>(reason)));
        }

        let already_voted = match identity.key() {
            Some(key) => self.store.find_vote(&key, *project_id).await?.is_some(),
            None => false,
        };
        Ok(check(active.as_ref(), already_voted, &now).into())
    }

    /// Withdrawing only needs the window to be open.
    pub async fn can_withdraw(&self, now: DateTime<Utc>) -> Result<Eligibility, StoreError> {
        let active = self.store.active_period().await?;
        Ok(check_window(active.as_ref(), &now).map(|_| ()).into())
    }
}

use std::ops::RangeInclusive;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::id::Id;
use super::identity::VoterIdentity;
use super::results::ScoringMode;
use crate::error::{self, ValidationError};

pub const SCORE_RANGE: RangeInclusive<i32> = 0..=5;

/// One 0-5 rating per judging dimension.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RubricScores {
    pub planning: i32,
    pub technical: i32,
    pub ui_ux: i32,
    pub process: i32,
    pub ai_utilization: i32,
}

impl RubricScores {
    pub fn dimensions(&self) -> [(&'static str, i32); 5] {
        [
            ("planning", self.planning),
            ("technical", self.technical),
            ("uiUx", self.ui_ux),
            ("process", self.process),
            ("aiUtilization", self.ai_utilization),
        ]
    }

    pub fn validate(self) -> Result<RubricScores, ValidationError> {
        for (dimension, score) in self.dimensions() {
            if !SCORE_RANGE.contains(&score) {
                return Err(error::score_out_of_range(dimension, SCORE_RANGE, score));
            }
        }
        Ok(self)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Vote {
    pub id: Id,
    pub voter: Option<String>,
    pub project_id: Id,
    pub scores: Option<RubricScores>,
    pub created_at: DateTime<Utc>,
}

impl Vote {
    pub fn new(NewVote { voter, project_id, scores }: NewVote) -> Vote {
        Vote {
            id: Id::new(),
            voter,
            project_id,
            scores,
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteRequest {
    pub project_id: Id,
    #[serde(default)]
    pub scores: Option<RubricScores>,
    #[serde(default)]
    pub voter_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WithdrawRequest {
    pub project_id: Id,
    #[serde(default)]
    pub voter_token: Option<String>,
}

/// A vote ready to be stored.
#[derive(Clone, Debug, PartialEq)]
pub struct NewVote {
    pub voter: Option<String>,
    pub project_id: Id,
    pub scores: Option<RubricScores>,
}

impl NewVote {
    /// Scores are mandatory when results are ranked by rubric.
    pub fn build(identity: &VoterIdentity, project_id: Id, scores: Option<RubricScores>, mode: ScoringMode) -> Result<NewVote, ValidationError> {
        let scores = match (scores, mode) {
            (Some(scores), _) => Some(scores.validate()?),
            (None, ScoringMode::Rubric) => return Err(error::scores_required()),
            (None, ScoringMode::Count) => None,
        };

        Ok(NewVote {
            voter: identity.key(),
            project_id,
            scores,
        })
    }
}

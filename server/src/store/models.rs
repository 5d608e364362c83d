use std::convert::TryFrom;

use chrono::{NaiveDateTime, Utc};
use diesel::prelude::*;
use uuid::Uuid;

use super::schema;
use super::StoreError;
use crate::voting;

#[derive(Identifiable, Queryable, Selectable)]
#[diesel(table_name = schema::projects)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Project {
    pub id: Uuid,
    pub name: String,
    pub team_name: String,
    pub description: String,
    pub appeal_point: Option<String>,
    pub demo_url: Option<String>,
    pub image_url: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl From<Project> for voting::Project {
    fn from(row: Project) -> Self {
        voting::Project {
            id: voting::Id(row.id),
            name: row.name,
            team_name: row.team_name,
            description: row.description,
            appeal_point: row.appeal_point,
            demo_url: row.demo_url,
            image_url: row.image_url,
            created_at: row.created_at.and_utc(),
            updated_at: row.updated_at.and_utc(),
        }
    }
}

#[derive(Insertable)]
#[diesel(table_name = schema::projects)]
pub struct NewProject {
    pub id: Uuid,
    pub name: String,
    pub team_name: String,
    pub description: String,
    pub appeal_point: Option<String>,
    pub demo_url: Option<String>,
    pub image_url: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl From<voting::ProjectSettings> for NewProject {
    fn from(voting::ProjectSettings {
        name,
        team_name,
        description,
        appeal_point,
        demo_url,
        image_url,
    }: voting::ProjectSettings) -> Self {
        let now = Utc::now().naive_utc();
        NewProject {
            id: Uuid::new_v4(),
            name,
            team_name,
            description,
            appeal_point,
            demo_url,
            image_url,
            created_at: now,
            updated_at: now,
        }
    }
}

// optional fields are cleared, not skipped, when absent
#[derive(Debug, AsChangeset)]
#[diesel(table_name = schema::projects)]
#[diesel(treat_none_as_null = true)]
pub struct ProjectChanges {
    pub name: String,
    pub team_name: String,
    pub description: String,
    pub appeal_point: Option<String>,
    pub demo_url: Option<String>,
    pub image_url: Option<String>,
    pub updated_at: NaiveDateTime,
}

impl From<voting::ProjectSettings> for ProjectChanges {
    fn from(voting::ProjectSettings {
        name,
        team_name,
        description,
        appeal_point,
        demo_url,
        image_url,
    }: voting::ProjectSettings) -> Self {
        ProjectChanges {
            name,
            team_name,
            description,
            appeal_point,
            demo_url,
            image_url,
            updated_at: Utc::now().naive_utc(),
        }
    }
}

#[derive(Identifiable, Queryable, Selectable)]
#[diesel(table_name = schema::voting_periods)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct VotingPeriod {
    pub id: Uuid,
    pub start_time: NaiveDateTime,
    pub end_time: NaiveDateTime,
    pub is_active: bool,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl From<VotingPeriod> for voting::VotingPeriod {
    fn from(row: VotingPeriod) -> Self {
        voting::VotingPeriod {
            id: voting::Id(row.id),
            start_time: row.start_time.and_utc(),
            end_time: row.end_time.and_utc(),
            is_active: row.is_active,
            created_at: row.created_at.and_utc(),
            updated_at: row.updated_at.and_utc(),
        }
    }
}

#[derive(Insertable)]
#[diesel(table_name = schema::voting_periods)]
pub struct NewVotingPeriod {
    pub id: Uuid,
    pub start_time: NaiveDateTime,
    pub end_time: NaiveDateTime,
    pub is_active: bool,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl From<&voting::VotingPeriod> for NewVotingPeriod {
    fn from(period: &voting::VotingPeriod) -> Self {
        NewVotingPeriod {
            id: period.id.0,
            start_time: period.start_time.naive_utc(),
            end_time: period.end_time.naive_utc(),
            is_active: period.is_active,
            created_at: period.created_at.naive_utc(),
            updated_at: period.updated_at.naive_utc(),
        }
    }
}

#[derive(Debug, AsChangeset)]
#[diesel(table_name = schema::voting_periods)]
pub struct PeriodChanges {
    pub start_time: NaiveDateTime,
    pub end_time: NaiveDateTime,
    pub is_active: Option<bool>,
    pub updated_at: NaiveDateTime,
}

impl From<&voting::PeriodSettings> for PeriodChanges {
    fn from(settings: &voting::PeriodSettings) -> Self {
        PeriodChanges {
            start_time: settings.start_time.naive_utc(),
            end_time: settings.end_time.naive_utc(),
            is_active: settings.is_active,
            updated_at: Utc::now().naive_utc(),
        }
    }
}

#[derive(Identifiable, Queryable, Selectable)]
#[diesel(table_name = schema::votes)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Vote {
    pub id: Uuid,
    pub voter: Option<String>,
    pub project_id: Uuid,
    pub planning: Option<i32>,
    pub technical: Option<i32>,
    pub ui_ux: Option<i32>,
    pub process: Option<i32>,
    pub ai_utilization: Option<i32>,
    pub created_at: NaiveDateTime,
}

impl From<Vote> for voting::Vote {
    fn from(row: Vote) -> Self {
        let scores = match (row.planning, row.technical, row.ui_ux, row.process, row.ai_utilization) {
            (Some(planning), Some(technical), Some(ui_ux), Some(process), Some(ai_utilization)) => {
                Some(voting::RubricScores { planning, technical, ui_ux, process, ai_utilization })
            }
            _ => None,
        };

        voting::Vote {
            id: voting::Id(row.id),
            voter: row.voter,
            project_id: voting::Id(row.project_id),
            scores,
            created_at: row.created_at.and_utc(),
        }
    }
}

#[derive(Insertable)]
#[diesel(table_name = schema::votes)]
pub struct NewVote {
    pub id: Uuid,
    pub voter: Option<String>,
    pub project_id: Uuid,
    pub planning: Option<i32>,
    pub technical: Option<i32>,
    pub ui_ux: Option<i32>,
    pub process: Option<i32>,
    pub ai_utilization: Option<i32>,
    pub created_at: NaiveDateTime,
}

impl From<voting::NewVote> for NewVote {
    fn from(voting::NewVote { voter, project_id, scores }: voting::NewVote) -> Self {
        NewVote {
            id: Uuid::new_v4(),
            voter,
            project_id: project_id.0,
            planning: scores.map(|s| s.planning),
            technical: scores.map(|s| s.technical),
            ui_ux: scores.map(|s| s.ui_ux),
            process: scores.map(|s| s.process),
            ai_utilization: scores.map(|s| s.ai_utilization),
            created_at: Utc::now().naive_utc(),
        }
    }
}

/// Row shape of the grouped tally query: project, count, then one sum per dimension.
pub type TallyRow = (Uuid, i64, Option<i64>, Option<i64>, Option<i64>, Option<i64>, Option<i64>);

pub fn tally_from_row((project_id, vote_count, planning, technical, ui_ux, process, ai_utilization): TallyRow) -> voting::Tally {
    voting::Tally {
        project_id: voting::Id(project_id),
        vote_count,
        planning: planning.unwrap_or(0),
        technical: technical.unwrap_or(0),
        ui_ux: ui_ux.unwrap_or(0),
        process: process.unwrap_or(0),
        ai_utilization: ai_utilization.unwrap_or(0),
    }
}

#[derive(Identifiable, Queryable, Selectable)]
#[diesel(table_name = schema::users)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub role: String,
    pub created_at: NaiveDateTime,
}

impl TryFrom<User> for voting::User {
    type Error = StoreError;
    fn try_from(row: User) -> Result<Self, Self::Error> {
        let role = row
            .role
            .parse()
            .map_err(|e: crate::error::ValidationError| StoreError::InvalidRow(format!("user {}: {e}", row.id)))?;
        Ok(voting::User {
            id: voting::Id(row.id),
            email: row.email,
            role,
            created_at: row.created_at.and_utc(),
        })
    }
}

#[derive(Insertable)]
#[diesel(table_name = schema::users)]
pub struct NewUser<'a> {
    pub id: Uuid,
    pub email: &'a str,
    pub role: &'a str,
    pub created_at: NaiveDateTime,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_score_columns_read_as_unscored() {
        let row = Vote {
            id: Uuid::new_v4(),
            voter: Some(String::from("token:a")),
            project_id: Uuid::new_v4(),
            planning: Some(4),
            technical: None,
            ui_ux: Some(4),
            process: Some(4),
            ai_utilization: Some(4),
            created_at: Utc::now().naive_utc(),
        };
        assert_eq!(voting::Vote::from(row).scores, None);
    }

    #[test]
    fn empty_sums_become_zero() {
        let tally = tally_from_row((Uuid::nil(), 2, Some(9), None, None, None, None));
        assert_eq!(tally.vote_count, 2);
        assert_eq!(tally.planning, 9);
        assert_eq!(tally.technical, 0);
    }

    #[test]
    fn unknown_roles_are_invalid_rows() {
        let row = User {
            id: Uuid::new_v4(),
            email: String::from("a@example.com"),
            role: String::from("owner"),
            created_at: Utc::now().naive_utc(),
        };
        assert!(matches!(voting::User::try_from(row), Err(StoreError::InvalidRow(_))));
    }
}

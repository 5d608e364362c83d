use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use chrono::Utc;

use super::{Store, StoreError};
use crate::voting::{Id, NewVote, PeriodSettings, Project, ProjectSettings, Role, Tally, User, Vote, VotingPeriod};

#[derive(Default)]
struct Tables {
    projects: Vec<Project>,
    periods: Vec<VotingPeriod>,
    votes: Vec<Vote>,
    users: HashMap<Id, User>,
}

impl Tables {
    fn ensure_unique_project(&self, settings: &ProjectSettings, except: Option<Id>) -> Result<(), StoreError> {
        let clash = self.projects.iter().any(|p| {
            Some(p.id) != except && p.name == settings.name && p.team_name == settings.team_name
        });
        if clash {
            return Err(StoreError::UniqueViolation(format!(
                "project ({}, {}) already exists", settings.name, settings.team_name
            )));
        }
        Ok(())
    }

    fn deactivate_periods(&mut self, except: Id) {
        let now = Utc::now();
        for period in self.periods.iter_mut().filter(|p| p.is_active && p.id != except) {
            period.is_active = false;
            period.updated_at = now;
        }
    }
}

/// In-memory store for tests and local runs without a database.
/// Everything is lost when the process exits.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Tables>, StoreError> {
        self.tables.read().map_err(|_| StoreError::Locked)
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Tables>, StoreError> {
        self.tables.write().map_err(|_| StoreError::Locked)
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn list_projects(&self) -> Result<Vec<Project>, StoreError> {
        let mut projects = self.read()?.projects.clone();
        projects.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(projects)
    }

    async fn get_project(&self, id: Id) -> Result<Option<Project>, StoreError> {
        Ok(self.read()?.projects.iter().find(|p| p.id == id).cloned())
    }

    async fn create_project(&self, settings: ProjectSettings) -> Result<Project, StoreError> {
        let mut tables = self.write()?;
        tables.ensure_unique_project(&settings, None)?;
        let project = Project::new(settings);
        tables.projects.push(project.clone());
        Ok(project)
    }

    async fn update_project(&self, id: Id, settings: ProjectSettings) -> Result<Option<Project>, StoreError> {
        let mut tables = self.write()?;
        tables.ensure_unique_project(&settings, Some(id))?;
        let Some(project) = tables.projects.iter_mut().find(|p| p.id == id) else {
            return Ok(None);
        };
        project.apply(settings);
        Ok(Some(project.clone()))
    }

    async fn delete_project(&self, id: Id) -> Result<bool, StoreError> {
        let mut tables = self.write()?;
        let before = tables.projects.len();
        tables.projects.retain(|p| p.id != id);
        if tables.projects.len() == before {
            return Ok(false);
        }
        tables.votes.retain(|v| v.project_id != id);
        Ok(true)
    }

    async fn list_periods(&self) -> Result<Vec<VotingPeriod>, StoreError> {
        let mut periods = self.read()?.periods.clone();
        periods.sort_by(|a, b| b.start_time.cmp(&a.start_time));
        Ok(periods)
    }

    async fn get_period(&self, id: Id) -> Result<Option<VotingPeriod>, StoreError> {
        Ok(self.read()?.periods.iter().find(|p| p.id == id).cloned())
    }

    async fn active_period(&self) -> Result<Option<VotingPeriod>, StoreError> {
        Ok(self.read()?.periods.iter().find(|p| p.is_active).cloned())
    }

    async fn create_period(&self, settings: PeriodSettings) -> Result<VotingPeriod, StoreError> {
        let mut tables = self.write()?;
        let period = VotingPeriod::new(&settings);
        if period.is_active {
            tables.deactivate_periods(period.id);
        }
        tables.periods.push(period.clone());
        Ok(period)
    }

    async fn update_period(&self, id: Id, settings: PeriodSettings) -> Result<Option<VotingPeriod>, StoreError> {
        let mut tables = self.write()?;
        if !tables.periods.iter().any(|p| p.id == id) {
            return Ok(None);
        }
        if settings.is_active == Some(true) {
            tables.deactivate_periods(id);
        }

        let Some(period) = tables.periods.iter_mut().find(|p| p.id == id) else {
            return Ok(None);
        };
        period.start_time = settings.start_time;
        period.end_time = settings.end_time;
        period.is_active = settings.is_active.unwrap_or(period.is_active);
        period.updated_at = Utc::now();
        Ok(Some(period.clone()))
    }

    async fn delete_period(&self, id: Id) -> Result<bool, StoreError> {
        let mut tables = self.write()?;
        let before = tables.periods.len();
        tables.periods.retain(|p| p.id != id);
        Ok(tables.periods.len() != before)
    }

    async fn find_vote(&self, voter: &str, project_id: Id) -> Result<Option<Vote>, StoreError> {
        Ok(self
            .read()?
            .votes
            .iter()
            .find(|v| v.project_id == project_id && v.voter.as_deref() == Some(voter))
            .cloned())
    }

    async fn insert_vote(&self, vote: NewVote) -> Result<Vote, StoreError> {
        let mut tables = self.write()?;
        if !tables.projects.iter().any(|p| p.id == vote.project_id) {
            return Err(StoreError::ForeignKeyViolation(format!("project {} does not exist", vote.project_id)));
        }
        if let Some(voter) = vote.voter.as_deref() {
            let duplicate = tables
                .votes
                .iter()
                .any(|v| v.project_id == vote.project_id && v.voter.as_deref() == Some(voter));
            if duplicate {
                return Err(StoreError::UniqueViolation(format!(
                    "vote ({voter}, {}) already exists", vote.project_id
                )));
            }
        }
        let vote = Vote::new(vote);
        tables.votes.push(vote.clone());
        Ok(vote)
    }

    async fn delete_votes(&self, voter: &str, project_id: Id) -> Result<u64, StoreError> {
        let mut tables = self.write()?;
        let before = tables.votes.len();
        tables
            .votes
            .retain(|v| !(v.project_id == project_id && v.voter.as_deref() == Some(voter)));
        Ok((before - tables.votes.len()) as u64)
    }

    async fn tallies(&self, project_id: Option<Id>) -> Result<Vec<Tally>, StoreError> {
        let tables = self.read()?;
        let mut tallies: HashMap<Id, Tally> = HashMap::new();
        for vote in tables.votes.iter().filter(|v| project_id.map_or(true, |id| v.project_id == id)) {
            tallies
                .entry(vote.project_id)
                .or_insert_with(|| Tally::empty(vote.project_id))
                .add(vote.scores.as_ref());
        }
        Ok(tallies.into_values().collect())
    }

    async fn get_user(&self, id: Id) -> Result<Option<User>, StoreError> {
        Ok(self.read()?.users.get(&id).cloned())
    }

    async fn sync_user(&self, id: Id, email: &str, admin: bool) -> Result<User, StoreError> {
        let mut tables = self.write()?;
        let user = tables.users.entry(id).or_insert_with(|| {
            let role = if admin { Role::Admin } else { Role::Voter };
            User::new(id, email.to_string(), role)
        });
        user.email = email.to_string();
        if admin {
            user.role = Role::Admin;
        }
        Ok(user.clone())
    }
}

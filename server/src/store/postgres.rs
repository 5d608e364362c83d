use std::convert::TryFrom;

use async_trait::async_trait;
use chrono::Utc;
use diesel::dsl::{count, sum};
use diesel::pg::PgConnection;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool};
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use tokio::task;
use tracing::{debug, info};
use uuid::Uuid;

use super::models::{self, tally_from_row, TallyRow};
use super::schema::{projects, users, votes, voting_periods};
use super::{Store, StoreError};
use crate::voting::{self, Id, NewVote, PeriodSettings, Project, ProjectSettings, Role, Tally, User, Vote, VotingPeriod};

const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

pub type PgPool = Pool<ConnectionManager<PgConnection>>;

/// Diesel-backed store. Diesel is synchronous, so every query runs on the
/// blocking pool with its own pooled connection.
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    pub fn connect(database_url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let manager = ConnectionManager::<PgConnection>::new(database_url);
        let pool = Pool::builder().max_size(max_connections).build(manager)?;
        info!(max_connections, "Connected to database");
        Ok(PostgresStore { pool })
    }

    /// Applies pending migrations and returns the versions that ran.
    pub async fn run_migrations(&self) -> Result<Vec<String>, StoreError> {
        self.run(|conn| {
            let versions = conn
                .run_pending_migrations(MIGRATIONS)
                .map_err(|e| StoreError::Migration(e.to_string()))?
                .into_iter()
                .map(|v| v.to_string())
                .collect();
            Ok(versions)
        })
        .await
    }

    async fn run<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&mut PgConnection) -> Result<T, StoreError> + Send + 'static,
    {
        let pool = self.pool.clone();
        task::spawn_blocking(move || {
            let mut conn = pool.get()?;
            f(&mut conn)
        })
        .await?
    }
}

fn deactivate_others(conn: &mut PgConnection, keep: Uuid) -> Result<usize, StoreError> {
    let now = Utc::now().naive_utc();
    let changed = diesel::update(
        voting_periods::table.filter(voting_periods::is_active.eq(true).and(voting_periods::id.ne(keep))),
    )
    .set((voting_periods::is_active.eq(false), voting_periods::updated_at.eq(now)))
    .execute(conn)?;
    Ok(changed)
}

macro_rules! tally_columns {
    () => {
        (
            votes::project_id,
            count(votes::id),
            sum(votes::planning),
            sum(votes::technical),
            sum(votes::ui_ux),
            sum(votes::process),
            sum(votes::ai_utilization),
        )
    };
}

#[async_trait]
impl Store for PostgresStore {
    async fn list_projects(&self) -> Result<Vec<Project>, StoreError> {
        self.run(|conn| {
            let rows = projects::table
                .order((projects::created_at.asc(), projects::id.asc()))
                .select(models::Project::as_select())
                .load(conn)?;
            Ok(rows.into_iter().map(Project::from).collect())
        })
        .await
    }

    async fn get_project(&self, id: Id) -> Result<Option<Project>, StoreError> {
        self.run(move |conn| {
            let row = projects::table
                .find(id.0)
                .select(models::Project::as_select())
                .first(conn)
                .optional()?;
            Ok(row.map(Project::from))
        })
        .await
    }

    async fn create_project(&self, settings: ProjectSettings) -> Result<Project, StoreError> {
        self.run(move |conn| {
            let row = diesel::insert_into(projects::table)
                .values(models::NewProject::from(settings))
                .returning(models::Project::as_returning())
                .get_result(conn)?;
            Ok(Project::from(row))
        })
        .await
    }

    async fn update_project(&self, id: Id, settings: ProjectSettings) -> Result<Option<Project>, StoreError> {
        self.run(move |conn| {
            let row = diesel::update(projects::table.find(id.0))
                .set(models::ProjectChanges::from(settings))
                .returning(models::Project::as_returning())
                .get_result(conn)
                .optional()?;
            Ok(row.map(Project::from))
        })
        .await
    }

    async fn delete_project(&self, id: Id) -> Result<bool, StoreError> {
        self.run(move |conn| {
            conn.transaction::<_, StoreError, _>(|conn| {
                let removed_votes = diesel::delete(votes::table.filter(votes::project_id.eq(id.0))).execute(conn)?;
                let removed = diesel::delete(projects::table.find(id.0)).execute(conn)?;
                debug!(project = %id, removed_votes, "deleted project");
                Ok(removed > 0)
            })
        })
        .await
    }

    async fn list_periods(&self) -> Result<Vec<VotingPeriod>, StoreError> {
        self.run(|conn| {
            let rows = voting_periods::table
                .order(voting_periods::start_time.desc())
                .select(models::VotingPeriod::as_select())
                .load(conn)?;
            Ok(rows.into_iter().map(VotingPeriod::from).collect())
        })
        .await
    }

    async fn get_period(&self, id: Id) -> Result<Option<VotingPeriod>, StoreError> {
        self.run(move |conn| {
            let row = voting_periods::table
                .find(id.0)
                .select(models::VotingPeriod::as_select())
                .first(conn)
                .optional()?;
            Ok(row.map(VotingPeriod::from))
        })
        .await
    }

    async fn active_period(&self) -> Result<Option<VotingPeriod>, StoreError> {
        self.run(|conn| {
            let row = voting_periods::table
                .filter(voting_periods::is_active.eq(true))
                .select(models::VotingPeriod::as_select())
                .first(conn)
                .optional()?;
            Ok(row.map(VotingPeriod::from))
        })
        .await
    }

    async fn create_period(&self, settings: PeriodSettings) -> Result<VotingPeriod, StoreError> {
        self.run(move |conn| {
            conn.transaction::<_, StoreError, _>(|conn| {
                let period = voting::VotingPeriod::new(&settings);
                if period.is_active {
                    let deactivated = deactivate_others(conn, period.id.0)?;
                    debug!(deactivated, "deactivated previous voting periods");
                }
                let row = diesel::insert_into(voting_periods::table)
                    .values(models::NewVotingPeriod::from(&period))
                    .returning(models::VotingPeriod::as_returning())
                    .get_result(conn)?;
                Ok(VotingPeriod::from(row))
            })
        })
        .await
    }

    async fn update_period(&self, id: Id, settings: PeriodSettings) -> Result<Option<VotingPeriod>, StoreError> {
        self.run(move |conn| {
            conn.transaction::<_, StoreError, _>(|conn| {
                let exists: i64 = voting_periods::table.find(id.0).count().get_result(conn)?;
                if exists == 0 {
                    return Ok(None);
                }
                if settings.is_active == Some(true) {
                    deactivate_others(conn, id.0)?;
                }
                let row = diesel::update(voting_periods::table.find(id.0))
                    .set(models::PeriodChanges::from(&settings))
                    .returning(models::VotingPeriod::as_returning())
                    .get_result(conn)
                    .optional()?;
                Ok(row.map(VotingPeriod::from))
            })
        })
        .await
    }

    async fn delete_period(&self, id: Id) -> Result<bool, StoreError> {
        self.run(move |conn| {
            let removed = diesel::delete(voting_periods::table.find(id.0)).execute(conn)?;
            Ok(removed > 0)
        })
        .await
    }

    async fn find_vote(&self, voter: &str, project_id: Id) -> Result<Option<Vote>, StoreError> {
        let voter = voter.to_string();
        self.run(move |conn| {
            let row = votes::table
                .filter(votes::voter.eq(voter).and(votes::project_id.eq(project_id.0)))
                .select(models::Vote::as_select())
                .first(conn)
                .optional()?;
            Ok(row.map(Vote::from))
        })
        .await
    }

    async fn insert_vote(&self, vote: NewVote) -> Result<Vote, StoreError> {
        self.run(move |conn| {
            let row = diesel::insert_into(votes::table)
                .values(models::NewVote::from(vote))
                .returning(models::Vote::as_returning())
                .get_result(conn)?;
            Ok(Vote::from(row))
        })
        .await
    }

    async fn delete_votes(&self, voter: &str, project_id: Id) -> Result<u64, StoreError> {
        let voter = voter.to_string();
        self.run(move |conn| {
            let removed = diesel::delete(
                votes::table.filter(votes::voter.eq(voter).and(votes::project_id.eq(project_id.0))),
            )
            .execute(conn)?;
            Ok(removed as u64)
        })
        .await
    }

    async fn tallies(&self, project_id: Option<Id>) -> Result<Vec<Tally>, StoreError> {
        self.run(move |conn| {
            let rows: Vec<TallyRow> = match project_id {
                Some(id) => votes::table
                    .filter(votes::project_id.eq(id.0))
                    .group_by(votes::project_id)
                    .select(tally_columns!())
                    .load(conn)?,
                None => votes::table
                    .group_by(votes::project_id)
                    .select(tally_columns!())
                    .load(conn)?,
            };
            Ok(rows.into_iter().map(tally_from_row).collect())
        })
        .await
    }

    async fn get_user(&self, id: Id) -> Result<Option<User>, StoreError> {
        self.run(move |conn| {
            let row = users::table
                .find(id.0)
                .select(models::User::as_select())
                .first(conn)
                .optional()?;
            row.map(User::try_from).transpose()
        })
        .await
    }

    async fn sync_user(&self, id: Id, email: &str, admin: bool) -> Result<User, StoreError> {
        let email = email.to_string();
        self.run(move |conn| {
            conn.transaction::<_, StoreError, _>(|conn| {
                let role = if admin { Role::Admin } else { Role::Voter };
                diesel::insert_into(users::table)
                    .values(models::NewUser {
                        id: id.0,
                        email: &email,
                        role: role.as_str(),
                        created_at: Utc::now().naive_utc(),
                    })
                    .on_conflict(users::id)
                    .do_update()
                    .set(users::email.eq(&email))
                    .execute(conn)?;
                if admin {
                    diesel::update(users::table.find(id.0))
                        .set(users::role.eq(Role::Admin.as_str()))
                        .execute(conn)?;
                }

                let row = users::table
                    .find(id.0)
                    .select(models::User::as_select())
                    .first(conn)?;
                User::try_from(row)
            })
        })
        .await
    }
}

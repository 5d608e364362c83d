mod error;
mod memory;
mod models;
mod postgres;
pub mod schema;
mod seed;

use async_trait::async_trait;

use crate::voting::{Id, NewVote, PeriodSettings, Project, ProjectSettings, Tally, User, Vote, VotingPeriod};

pub use error::StoreError;
pub use memory::MemoryStore;
pub use postgres::PostgresStore;
pub use seed::seed_demo;

/// Persistence for the catalog, voting periods, votes and users.
///
/// Implementations must keep two invariants on their own: at most one active
/// voting period, and at most one vote per non-null voter and project
/// (reported as [`StoreError::UniqueViolation`]).
#[async_trait]
pub trait Store: Send + Sync + 'static {
    /// All projects, oldest first.
    async fn list_projects(&self) -> Result<Vec<Project>, StoreError>;
    async fn get_project(&self, id: Id) -> Result<Option<Project>, StoreError>;
    async fn create_project(&self, settings: ProjectSettings) -> Result<Project, StoreError>;
    async fn update_project(&self, id: Id, settings: ProjectSettings) -> Result<Option<Project>, StoreError>;
    /// Removes the project and every vote cast for it. `false` if it did not exist.
    async fn delete_project(&self, id: Id) -> Result<bool, StoreError>;

    /// All periods, latest start first.
    async fn list_periods(&self) -> Result<Vec<VotingPeriod>, StoreError>;
    async fn get_period(&self, id: Id) -> Result<Option<VotingPeriod>, StoreError>;
    async fn active_period(&self) -> Result<Option<VotingPeriod>, StoreError>;
    /// Activating the new period deactivates every other one.
    async fn create_period(&self, settings: PeriodSettings) -> Result<VotingPeriod, StoreError>;
    async fn update_period(&self, id: Id, settings: PeriodSettings) -> Result<Option<VotingPeriod>, StoreError>;
    async fn delete_period(&self, id: Id) -> Result<bool, StoreError>;

    async fn find_vote(&self, voter: &str, project_id: Id) -> Result<Option<Vote>, StoreError>;
    async fn insert_vote(&self, vote: NewVote) -> Result<Vote, StoreError>;
    async fn delete_votes(&self, voter: &str, project_id: Id) -> Result<u64, StoreError>;
    /// Vote counts and score sums per project that has at least one vote.
    async fn tallies(&self, project_id: Option<Id>) -> Result<Vec<Tally>, StoreError>;

    async fn get_user(&self, id: Id) -> Result<Option<User>, StoreError>;
    /// Creates the user on first sight and refreshes the email afterwards.
    /// `admin` promotes the user; it never demotes.
    async fn sync_user(&self, id: Id, email: &str, admin: bool) -> Result<User, StoreError>;
}

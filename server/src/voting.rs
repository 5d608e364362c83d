mod eligibility;
mod id;
mod identity;
mod period;
mod project;
mod results;
mod user;
mod vote;

pub use eligibility::{check_window, EligibilityChecker, Ineligible};
pub use id::Id;
pub use identity::{generate_token, IdentityClaims, IdentitySource, VoterIdentity};
pub use period::{phase, PeriodSettings, Phase, UnvalidatedPeriodSettings, VotingPeriod};
pub use project::{Project, ProjectSettings, ProjectWithVotes, UnvalidatedProjectSettings};
pub use results::{aggregate_results, ScoringMode, Tally};
pub use user::{Role, User};
pub use vote::{NewVote, RubricScores, Vote, VoteRequest, WithdrawRequest};

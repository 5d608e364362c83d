use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info};

use super::{Store, StoreError};
use crate::voting::{Id, NewVote, PeriodSettings, ProjectSettings, RubricScores, VoterIdentity};

const DEMO_VOTERS: usize = 10;
const DEMO_WINDOW_DAYS: i64 = 7;

const DEMO_PROJECTS: [(&str, &str, &str, &str); 5] = [
    (
        "Snapshot Studio",
        "Team A",
        "Photo editing assisted by image models: retouching, background removal and style transfer in one place.",
        "One-tap edits that used to take an hour in a desktop editor.",
    ),
    (
        "Homebase",
        "Team B",
        "Controls lights, heating and appliances from a single dashboard with schedules and presence detection.",
        "Works with devices from several vendors without extra hubs.",
    ),
    (
        "Pulse Diary",
        "Team C",
        "Tracks sleep, meals and exercise and turns the log into weekly health summaries.",
        "Suggestions adapt to the habits the user actually keeps.",
    ),
    (
        "Classroom Anywhere",
        "Team D",
        "Live lessons, recorded courses and homework review on one learning platform.",
        "Teachers get per-student progress without grading spreadsheets.",
    ),
    (
        "Nearby Now",
        "Team E",
        "Finds concerts, markets and meetups around the user, ranked by distance and interests.",
        "Small organizers can list events for free.",
    ),
];

/// What a seeding run created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeedSummary {
    pub admin: Id,
    pub projects: usize,
    pub voters: usize,
    pub votes: usize,
    pub period: Id,
}

fn demo_scores(voter: usize) -> RubricScores {
    let score = |offset: usize| ((voter + offset) % 5 + 1) as i32;
    RubricScores {
        planning: score(0),
        technical: score(1),
        ui_ux: score(2),
        process: score(3),
        ai_utilization: score(4),
    }
}

/// Fills an empty store with an admin, ten voters, five projects, a week-long
/// active voting period starting at `now` and one vote per voter.
///
/// Returns `None` without touching anything when projects already exist.
pub async fn seed_demo<S: Store + ?Sized>(store: &S, admin_email: &str, now: DateTime<Utc>) -> Result<Option<SeedSummary>, StoreError> {
    if !store.list_projects().await?.is_empty() {
        debug!("store already has projects, skipping demo data");
        return Ok(None);
    }

    let admin = store.sync_user(Id::new(), admin_email, true).await?;
    debug!(admin = %admin.id, email = %admin.email, "seeded admin");

    let mut projects = Vec::with_capacity(DEMO_PROJECTS.len());
    for (index, (name, team_name, description, appeal_point)) in DEMO_PROJECTS.iter().enumerate() {
        let number = index + 1;
        let project = store
            .create_project(ProjectSettings {
                name: name.to_string(),
                team_name: team_name.to_string(),
                description: description.to_string(),
                appeal_point: Some(appeal_point.to_string()),
                demo_url: Some(format!("https://example.com/demo{number}")),
                image_url: Some(format!("/projects/project{number}.jpg")),
            })
            .await?;
        projects.push(project.id);
    }

    let period = store
        .create_period(PeriodSettings {
            start_time: now,
            end_time: now + Duration::days(DEMO_WINDOW_DAYS),
            is_active: Some(true),
        })
        .await?;

    for voter in 0..DEMO_VOTERS {
        let user = store.sync_user(Id::new(), &format!("user{}@example.com", voter + 1), false).await?;
        store
            .insert_vote(NewVote {
                voter: VoterIdentity::User(user.id).key(),
                project_id: projects[voter % projects.len()],
                scores: Some(demo_scores(voter)),
            })
            .await?;
    }

    let summary = SeedSummary {
        admin: admin.id,
        projects: projects.len(),
        voters: DEMO_VOTERS,
        votes: DEMO_VOTERS,
        period: period.id,
    };
    info!(projects = summary.projects, votes = summary.votes, period = %summary.period, "Seeded demo data");
    Ok(Some(summary))
}

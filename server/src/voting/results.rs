use std::collections::HashMap;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::id::Id;
use super::project::Project;
use super::vote::RubricScores;
use crate::store::{Store, StoreError};

/// What results are ranked by.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScoringMode {
    Count,
    Rubric,
}

impl FromStr for ScoringMode {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "count" => Ok(ScoringMode::Count),
            "rubric" => Ok(ScoringMode::Rubric),
            other => Err(format!("expected count or rubric, got {other:?}")),
        }
    }
}

/// Raw per-project vote count and score sums, as the store groups them.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Tally {
    pub project_id: Id,
    pub vote_count: i64,
    pub planning: i64,
    pub technical: i64,
    pub ui_ux: i64,
    pub process: i64,
    pub ai_utilization: i64,
}

impl Tally {
    pub fn empty(project_id: Id) -> Tally {
        Tally {
            project_id,
            vote_count: 0,
            planning: 0,
            technical: 0,
            ui_ux: 0,
            process: 0,
            ai_utilization: 0,
        }
    }

    /// Counts one vote. Unscored votes add nothing to the sums.
    pub fn add(&mut self, scores: Option<&RubricScores>) {
        self.vote_count += 1;
        if let Some(s) = scores {
            self.planning += s.planning as i64;
            self.technical += s.technical as i64;
            self.ui_ux += s.ui_ux as i64;
            self.process += s.process as i64;
            self.ai_utilization += s.ai_utilization as i64;
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectResult {
    pub id: Id,
    pub name: String,
    pub team_name: String,
    pub image_url: Option<String>,
    #[serde(skip)]
    pub created_at: DateTime<Utc>,

    pub vote_count: i64,
    pub planning_score: f64,
    pub technical_score: f64,
    pub ui_ux_score: f64,
    pub process_score: f64,
    pub ai_utilization_score: f64,
    pub total_score: f64,
}

fn average(sum: i64, count: i64) -> f64 {
    if count == 0 {
        return 0.0;
    }
    sum as f64 / count as f64
}

impl ProjectResult {
    fn new(project: Project, tally: &Tally) -> ProjectResult {
        let count = tally.vote_count;
        let planning_score = average(tally.planning, count);
        let technical_score = average(tally.technical, count);
        let ui_ux_score = average(tally.ui_ux, count);
        let process_score = average(tally.process, count);
        let ai_utilization_score = average(tally.ai_utilization, count);

        ProjectResult {
            id: project.id,
            name: project.name,
            team_name: project.team_name,
            image_url: project.image_url,
            created_at: project.created_at,
            vote_count: count,
            planning_score,
            technical_score,
            ui_ux_score,
            process_score,
            ai_utilization_score,
            total_score: planning_score + technical_score + ui_ux_score + process_score + ai_utilization_score,
        }
    }
}

/// Joins projects with their tallies and ranks them. Projects without a
/// tally are reported with zero votes.
pub fn aggregate(projects: Vec<Project>, tallies: &[Tally], mode: ScoringMode) -> Vec<ProjectResult> {
    let by_project: HashMap<&Id, &Tally> = tallies.iter().map(|t| (&t.project_id, t)).collect();

    let mut results: Vec<ProjectResult> = projects
        .into_iter()
        .map(|project| {
            let empty = Tally::empty(project.id);
            let tally = by_project.get(&project.id).copied().unwrap_or(&empty);
            ProjectResult::new(project, tally)
        })
        .collect();

    // highest first, older projects win ties, ids make the order total
    results.sort_by(|a, b| {
        let primary = match mode {
            ScoringMode::Rubric => b.total_score.total_cmp(&a.total_score),
            ScoringMode::Count => b.vote_count.cmp(&a.vote_count),
        };
        primary
            .then_with(|| a.created_at.cmp(&b.created_at))
            .then_with(|| a.id.cmp(&b.id))
    });

    results
}

/// Loads projects and tallies from the store and aggregates them.
pub async fn aggregate_results<S: Store + ?Sized>(store: &S, project_id: Option<Id>, mode: ScoringMode) -> Result<Vec<ProjectResult>, StoreError> {
    let projects = match project_id {
        Some(id) => store.get_project(id).await?.into_iter().collect(),
        None => store.list_projects().await?,
    };
    let tallies = store.tallies(project_id).await?;
    Ok(aggregate(projects, &tallies, mode))
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;
    use crate::voting::ProjectSettings;

    fn project(name: &str, age_minutes: i64) -> Project {
        let mut project = Project::new(ProjectSettings {
            name: name.to_string(),
            team_name: format!("Team {name}"),
            description: String::from("demo"),
            appeal_point: None,
            demo_url: None,
            image_url: None,
        });
        project.created_at = Utc::now() - Duration::minutes(age_minutes);
        project
    }

    fn scores(planning: i32, rest: i32) -> RubricScores {
        RubricScores {
            planning,
            technical: rest,
            ui_ux: rest,
            process: rest,
            ai_utilization: rest,
        }
    }

    fn tally(project: &Project, votes: &[RubricScores]) -> Tally {
        let mut tally = Tally::empty(project.id);
        for vote in votes {
            tally.add(Some(vote));
        }
        tally
    }

    #[test]
    fn averages_each_dimension() {
        let p = project("P", 0);
        let t = tally(&p, &[scores(4, 3), scores(4, 3), scores(5, 3)]);

        let results = aggregate(vec![p], &[t], ScoringMode::Rubric);
        assert_eq!(results[0].vote_count, 3);
        assert!((results[0].planning_score - 4.33).abs() < 0.01);
        assert_eq!(results[0].technical_score, 3.0);
        assert!((results[0].total_score - (13.0 / 3.0 + 12.0)).abs() < 1e-9);
    }

    #[test]
    fn projects_without_votes_score_zero() {
        let results = aggregate(vec![project("Quiet", 0)], &[], ScoringMode::Rubric);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].vote_count, 0);
        assert_eq!(results[0].planning_score, 0.0);
        assert_eq!(results[0].total_score, 0.0);
    }

    #[test]
    fn unscored_votes_count_but_add_nothing() {
        let p = project("P", 0);
        let mut t = Tally::empty(p.id);
        t.add(Some(&scores(4, 4)));
        t.add(None);

        let results = aggregate(vec![p], &[t], ScoringMode::Count);
        assert_eq!(results[0].vote_count, 2);
        assert_eq!(results[0].planning_score, 2.0);
    }

    #[test]
    fn rubric_mode_ranks_by_total_score() {
        let low = project("Low", 10);
        let high = project("High", 0);
        let tallies = [
            tally(&low, &[scores(1, 1), scores(1, 1), scores(1, 1)]),
            tally(&high, &[scores(5, 5)]),
        ];

        let results = aggregate(vec![low, high], &tallies, ScoringMode::Rubric);
        let names: Vec<&str> = results.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, ["High", "Low"]);
    }

    #[test]
    fn count_mode_ranks_by_vote_count() {
        let low = project("Low", 10);
        let high = project("High", 0);
        let tallies = [
            tally(&low, &[scores(1, 1), scores(1, 1), scores(1, 1)]),
            tally(&high, &[scores(5, 5)]),
        ];

        let results = aggregate(vec![high, low], &tallies, ScoringMode::Count);
        let names: Vec<&str> = results.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, ["Low", "High"]);
    }

    #[test]
    fn ties_go_to_the_older_project() {
        let newer = project("Newer", 1);
        let older = project("Older", 60);
        let tallies = [tally(&newer, &[scores(3, 3)]), tally(&older, &[scores(3, 3)])];

        let results = aggregate(vec![newer, older], &tallies, ScoringMode::Rubric);
        assert_eq!(results[0].name, "Older");
        assert_eq!(results[1].name, "Newer");
    }

    #[test]
    fn serializes_with_camel_case_scores() {
        let results = aggregate(vec![project("P", 0)], &[], ScoringMode::Rubric);
        let json = serde_json::to_value(&results[0]).unwrap();
        assert_eq!(json["uiUxScore"], 0.0);
        assert_eq!(json["teamName"], "Team P");
        assert!(json.get("createdAt").is_none());
    }

    #[test]
    fn parses_scoring_modes() {
        assert_eq!("Rubric".parse::<ScoringMode>(), Ok(ScoringMode::Rubric));
        assert_eq!("count".parse::<ScoringMode>(), Ok(ScoringMode::Count));
        assert!("median".parse::<ScoringMode>().is_err());
    }
}

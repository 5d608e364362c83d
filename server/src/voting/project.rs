use std::convert::TryFrom;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::id::Id;
use crate::error::{self, ValidationError};

pub const MAX_NAME_LEN: usize = 300;

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: Id,
    pub name: String,
    pub team_name: String,
    pub description: String,
    pub appeal_point: Option<String>,
    pub demo_url: Option<String>,
    pub image_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Project {
    pub fn new(settings: ProjectSettings) -> Project {
        let now = Utc::now();
        let mut project = Project {
            id: Id::new(),
            name: String::new(),
            team_name: String::new(),
            description: String::new(),
            appeal_point: None,
            demo_url: None,
            image_url: None,
            created_at: now,
            updated_at: now,
        };
        project.apply(settings);
        project
    }

    /// Overwrites every editable field, optional ones included.
    pub fn apply(&mut self, ProjectSettings {
        name,
        team_name,
        description,
        appeal_point,
        demo_url,
        image_url,
    }: ProjectSettings) {
        self.name = name;
        self.team_name = team_name;
        self.description = description;
        self.appeal_point = appeal_point;
        self.demo_url = demo_url;
        self.image_url = image_url;
        self.updated_at = Utc::now();
    }
}

/// Catalog listing entry.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectWithVotes {
    #[serde(flatten)]
    pub project: Project,
    pub vote_count: i64,
}

/// Project fields exactly as an admin submitted them.
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct UnvalidatedProjectSettings {
    pub name: Option<String>,
    pub team_name: Option<String>,
    pub description: Option<String>,
    pub appeal_point: Option<String>,
    pub demo_url: Option<String>,
    pub image_url: Option<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ProjectSettings {
    pub name: String,
    pub team_name: String,
    pub description: String,
    pub appeal_point: Option<String>,
    pub demo_url: Option<String>,
    pub image_url: Option<String>,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl TryFrom<UnvalidatedProjectSettings> for ProjectSettings {
    type Error = ValidationError;
    fn try_from(value: UnvalidatedProjectSettings) -> Result<Self, Self::Error> {
        let name = non_blank(value.name);
        let team_name = non_blank(value.team_name);
        let description = non_blank(value.description);

        let (name, team_name, description) = match (name, team_name, description) {
            (Some(n), Some(t), Some(d)) => (n, t, d),
            (name, team_name, description) => {
                let missing: Vec<&str> = [("name", name.is_none()), ("teamName", team_name.is_none()), ("description", description.is_none())]
                    .into_iter()
                    .filter_map(|(field, absent)| absent.then_some(field))
                    .collect();
                return Err(error::project_fields_missing(&missing));
            }
        };

        for (field, text) in [("name", &name), ("teamName", &team_name)] {
            let len = text.chars().count();
            if len > MAX_NAME_LEN {
                return Err(error::project_field_too_long(field, MAX_NAME_LEN, len));
            }
        }

        Ok(ProjectSettings {
            name,
            team_name,
            description,
            appeal_point: non_blank(value.appeal_point),
            demo_url: non_blank(value.demo_url),
            image_url: non_blank(value.image_url),
        })
    }
}

use serde::{Deserialize, Serialize};

use super::de;

/// An exercise as listed by `GET /exercises/bygroup/:group` and detailed
/// by `GET /exercises/:id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct Exercise {
    #[serde(deserialize_with = "de::string_or_number")]
    pub id: String,
    pub name: String,
    pub group: String,
    #[serde(deserialize_with = "de::count")]
    pub series: u32,
    #[serde(deserialize_with = "de::count")]
    pub repetitions: u32,
    #[serde(default)]
    pub demo: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumb: Option<String>,
}

impl Exercise {
    /// One-line description shown on exercise cards.
    pub fn summary(&self) -> String {
        format!("{} series x {} repetitions", self.series, self.repetitions)
    }

    pub fn in_group(&self, group: &str) -> bool {
        same_group(&self.group, group)
    }
}

/// Group names are compared case-insensitively ("Costas" == "COSTAS").
pub fn same_group(a: &str, b: &str) -> bool {
    a.to_lowercase() == b.to_lowercase()
}

/// Exercises of one muscle group.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct GroupExercises {
    pub group: String,
    pub exercises: Vec<Exercise>,
}

/// Every group with its exercises, in the order `GET /groups` returned them.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct Catalog {
    pub groups: Vec<GroupExercises>,
}

impl Catalog {
    pub fn group_names(&self) -> Vec<&str> {
        self.groups.iter().map(|g| g.group.as_str()).collect()
    }

    pub fn exercises_for(&self, group: &str) -> Option<&[Exercise]> {
        self.groups
            .iter()
            .find(|g| same_group(&g.group, group))
            .map(|g| g.exercises.as_slice())
    }

    pub fn find(&self, exercise_id: &str) -> Option<&Exercise> {
        self.groups
            .iter()
            .flat_map(|g| g.exercises.iter())
            .find(|e| e.id == exercise_id)
    }

    pub fn exercise_count(&self) -> usize {
        self.groups.iter().map(|g| g.exercises.len()).sum()
    }
}

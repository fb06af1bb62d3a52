//! Canned catalog content for demos and manual testing.

use serde::Deserialize;
use types::{Mark, Task};

use crate::catalog::CatalogStore;
use crate::error::StoreError;

const SAMPLE_MARKS: &[(f64, f64, &str)] = &[
    (24.1132, 56.9515, "Freedom Monument"),
    (24.1215, 56.9489, "House of the Blackheads"),
    (24.1216, 56.9440, "Central Market"),
    (24.1349, 56.9398, "TV Tower viewpoint"),
    (24.1050, 56.9510, "Canal boat pier"),
    (24.1421, 56.9560, "Old water tower"),
];

const SAMPLE_TASKS: &[(&str, i64)] = &[
    ("Photograph the inscription at the base of the monument", 100),
    ("Count the statues on the facade and report the number", 150),
    ("Find the oldest dated plaque inside the pavilion", 200),
    ("Sketch the skyline visible from the viewpoint", 250),
    ("Note the departure time of the next boat", 50),
];

#[derive(Debug, Clone, Deserialize)]
pub struct MarkSeed {
    pub longitude: f64,
    pub latitude: f64,
    pub name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TaskSeed {
    pub description: String,
    pub reward: Option<i64>,
}

/// A batch of catalog rows, loadable from a JSON fixture file.
#[derive(Debug, Clone, Deserialize)]
pub struct CatalogFixture {
    pub marks: Vec<MarkSeed>,
    pub tasks: Vec<TaskSeed>,
}

impl CatalogFixture {
    /// The built-in seed: six marks around central Riga and five tasks.
    pub fn sample() -> Self {
        CatalogFixture {
            marks: SAMPLE_MARKS
                .iter()
                .map(|(longitude, latitude, name)| MarkSeed {
                    longitude: *longitude,
                    latitude: *latitude,
                    name: Some((*name).to_string()),
                })
                .collect(),
            tasks: SAMPLE_TASKS
                .iter()
                .map(|(description, reward)| TaskSeed {
                    description: (*description).to_string(),
                    reward: Some(*reward),
                })
                .collect(),
        }
    }

    pub fn from_json(json: &str) -> Result<Self, StoreError> {
        Ok(serde_json::from_str(json)?)
    }

    /// A fixture can only drive a game if it seeds at least one mark and
    /// one task.
    pub fn ensure_playable(&self) -> Result<(), StoreError> {
        if self.marks.is_empty() || self.tasks.is_empty() {
            return Err(StoreError::ConstraintViolation(
                "fixture needs at least one mark and one task".to_string(),
            ));
        }
        Ok(())
    }
}

/// Loads a fixture into the catalog through its validated write path and
/// returns the created rows in insertion order.
pub async fn seed_catalog(
    catalog: &CatalogStore,
    fixture: &CatalogFixture,
) -> Result<(Vec<Mark>, Vec<Task>), StoreError> {
    let mut marks = Vec::with_capacity(fixture.marks.len());
    for seed in &fixture.marks {
        marks.push(
            catalog
                .add_mark(seed.longitude, seed.latitude, seed.name.as_deref())
                .await?,
        );
    }
    let mut tasks = Vec::with_capacity(fixture.tasks.len());
    for seed in &fixture.tasks {
        tasks.push(catalog.add_task(&seed.description, seed.reward).await?);
    }
    Ok((marks, tasks))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::memory_pool;

    #[tokio::test]
    async fn test_seeds_every_sample_row() {
        let pool = memory_pool().await;
        let catalog = CatalogStore::new(pool);
        let fixture = CatalogFixture::sample();

        let (marks, tasks) = seed_catalog(&catalog, &fixture)
            .await
            .expect("failed to seed catalog");
        assert_eq!(marks.len(), fixture.marks.len());
        assert_eq!(tasks.len(), fixture.tasks.len());

        let listed = catalog.list_marks().await.expect("failed to list marks");
        assert_eq!(listed, marks);
    }

    #[tokio::test]
    async fn test_seeding_twice_fails_on_duplicate_coordinates() {
        let pool = memory_pool().await;
        let catalog = CatalogStore::new(pool);
        let fixture = CatalogFixture::sample();

        seed_catalog(&catalog, &fixture)
            .await
            .expect("failed to seed catalog");
        let err = seed_catalog(&catalog, &fixture).await.unwrap_err();
        assert!(matches!(err, StoreError::ConstraintViolation(_)));
    }

    #[tokio::test]
    async fn test_parses_and_seeds_a_json_fixture() {
        let pool = memory_pool().await;
        let catalog = CatalogStore::new(pool);

        let fixture = CatalogFixture::from_json(
            r#"{
                "marks": [
                    {"longitude": 24.1, "latitude": 56.9, "name": "Gate"},
                    {"longitude": 24.2, "latitude": 56.8, "name": null}
                ],
                "tasks": [
                    {"description": "Read the gate plaque", "reward": 120},
                    {"description": "Count the arches", "reward": null}
                ]
            }"#,
        )
        .expect("failed to parse fixture");

        let (marks, tasks) = seed_catalog(&catalog, &fixture)
            .await
            .expect("failed to seed catalog");
        assert_eq!(marks[0].name.as_deref(), Some("Gate"));
        assert!(marks[1].name.is_none());
        assert_eq!(tasks[0].reward, 120);
        assert_eq!(tasks[1].reward, 100);
    }

    #[test]
    fn test_malformed_fixture_is_a_serialization_error() {
        let err = CatalogFixture::from_json("{\"marks\": 3}").unwrap_err();
        assert!(matches!(err, StoreError::Serialization(_)));
    }

    #[test]
    fn test_fixture_without_marks_or_tasks_is_unplayable() {
        let no_tasks = CatalogFixture::from_json(
            r#"{"marks": [{"longitude": 24.1, "latitude": 56.9, "name": null}], "tasks": []}"#,
        )
        .expect("failed to parse fixture");
        let err = no_tasks.ensure_playable().unwrap_err();
        assert!(matches!(err, StoreError::ConstraintViolation(_)));

        let no_marks = CatalogFixture::from_json(r#"{"marks": [], "tasks": []}"#)
            .expect("failed to parse fixture");
        assert!(no_marks.ensure_playable().is_err());

        CatalogFixture::sample()
            .ensure_playable()
            .expect("sample fixture should be playable");
    }
}

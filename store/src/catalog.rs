use sqlx::{Row, SqlitePool};
use types::{
    catalog::coordinates_in_range, Mark, MarkId, Task, TaskId, Team, TeamId, DEFAULT_TASK_REWARD,
};

use crate::error::{is_unique_violation, StoreError};

/// Store for the shared catalog of teams, marks, and tasks. Catalog rows
/// carry no game state; games reference them through assignments.
pub struct CatalogStore {
    pool: SqlitePool,
}

impl CatalogStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn add_team(&self, id: TeamId, name: &str) -> Result<Team, StoreError> {
        if name.trim().is_empty() {
            return Err(StoreError::ConstraintViolation(
                "team name must not be empty".to_string(),
            ));
        }
        sqlx::query("INSERT INTO teams (id, name) VALUES (?, ?)")
            .bind(id.to_string())
            .bind(name)
            .execute(&self.pool)
            .await
            .map_err(|e| classify_insert(e, format!("a team with id {id} or name {name:?}")))?;
        Ok(Team {
            id,
            name: name.to_string(),
        })
    }

    pub async fn find_team(&self, id: TeamId) -> Result<Team, StoreError> {
        let row = sqlx::query("SELECT name FROM teams WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some(r) => Ok(Team {
                id,
                name: r.get("name"),
            }),
            None => Err(StoreError::NotFound(format!("team {id}"))),
        }
    }

    pub async fn list_teams(&self) -> Result<Vec<Team>, StoreError> {
        let rows = sqlx::query("SELECT id, name FROM teams ORDER BY name, id")
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter()
            .map(|r| {
                let id: String = r.get("id");
                Ok(Team {
                    id: TeamId::parse(&id)?,
                    name: r.get("name"),
                })
            })
            .collect()
    }

    pub async fn add_mark(
        &self,
        longitude: f64,
        latitude: f64,
        name: Option<&str>,
    ) -> Result<Mark, StoreError> {
        if !coordinates_in_range(longitude, latitude) {
            return Err(StoreError::ConstraintViolation(format!(
                "coordinates out of range: ({longitude}, {latitude})"
            )));
        }
        let result = sqlx::query("INSERT INTO marks (longitude, latitude, name) VALUES (?, ?, ?)")
            .bind(longitude)
            .bind(latitude)
            .bind(name)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                let what = match name {
                    Some(n) => format!("a mark at ({longitude}, {latitude}) or named {n:?}"),
                    None => format!("a mark at ({longitude}, {latitude})"),
                };
                classify_insert(e, what)
            })?;
        Ok(Mark {
            id: MarkId::new(result.last_insert_rowid()),
            longitude,
            latitude,
            name: name.map(str::to_string),
        })
    }

    pub async fn find_mark(&self, id: MarkId) -> Result<Mark, StoreError> {
        let row = sqlx::query("SELECT longitude, latitude, name FROM marks WHERE id = ?")
            .bind(id.as_i64())
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some(r) => Ok(Mark {
                id,
                longitude: r.get("longitude"),
                latitude: r.get("latitude"),
                name: r.get("name"),
            }),
            None => Err(StoreError::NotFound(format!("mark {id}"))),
        }
    }

    pub async fn list_marks(&self) -> Result<Vec<Mark>, StoreError> {
        let rows = sqlx::query("SELECT id, longitude, latitude, name FROM marks ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows
            .into_iter()
            .map(|r| Mark {
                id: MarkId::new(r.get("id")),
                longitude: r.get("longitude"),
                latitude: r.get("latitude"),
                name: r.get("name"),
            })
            .collect())
    }

    pub async fn add_task(
        &self,
        description: &str,
        reward: Option<i64>,
    ) -> Result<Task, StoreError> {
        if description.trim().is_empty() {
            return Err(StoreError::ConstraintViolation(
                "task description must not be empty".to_string(),
            ));
        }
        let reward = reward.unwrap_or(DEFAULT_TASK_REWARD);
        if reward < 0 {
            return Err(StoreError::ConstraintViolation(format!(
                "task reward must not be negative, got {reward}"
            )));
        }
        let result = sqlx::query("INSERT INTO tasks (description, reward) VALUES (?, ?)")
            .bind(description)
            .bind(reward)
            .execute(&self.pool)
            .await
            .map_err(|e| classify_insert(e, format!("a task described {description:?}")))?;
        Ok(Task {
            id: TaskId::new(result.last_insert_rowid()),
            description: description.to_string(),
            reward,
        })
    }

    pub async fn find_task(&self, id: TaskId) -> Result<Task, StoreError> {
        let row = sqlx::query("SELECT description, reward FROM tasks WHERE id = ?")
            .bind(id.as_i64())
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some(r) => Ok(Task {
                id,
                description: r.get("description"),
                reward: r.get("reward"),
            }),
            None => Err(StoreError::NotFound(format!("task {id}"))),
        }
    }

    pub async fn list_tasks(&self) -> Result<Vec<Task>, StoreError> {
        let rows = sqlx::query("SELECT id, description, reward FROM tasks ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows
            .into_iter()
            .map(|r| Task {
                id: TaskId::new(r.get("id")),
                description: r.get("description"),
                reward: r.get("reward"),
            })
            .collect())
    }
}

fn classify_insert(e: sqlx::Error, what: String) -> StoreError {
    if is_unique_violation(&e) {
        return StoreError::ConstraintViolation(format!("{what} already exists"));
    }
    StoreError::from(e)
}

//! PostgreSQL-backed [`RepoStore`].
//!
//! [`PgRepoStore`] wraps a shared `PgPool`; every method is a single statement
//! (the commit batch is a single multi-row INSERT per chunk inside one
//! transaction).

use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Postgres, QueryBuilder};
use tracing::{error, info};

use gitfleet_core::config::PostgresConfig;
use gitfleet_core::{Commit, Repository, RepositoryId, RepositoryPage};

use crate::error::StoreError;
use crate::traits::{page_offset, RepoStore};

/// Rows per INSERT statement; keeps bind parameters well under Postgres' 65535 cap.
const COMMIT_CHUNK: usize = 1000;

const REPOSITORY_COLUMNS: &str = "id, name, owner, description, url, language, forks_count, stars_count, \
     open_issues_count, watchers_count, created_at, updated_at";

/// Create the bounded PostgreSQL pool and run migrations.
///
/// Unlike a best-effort feature store, the repository store is required: any
/// failure here is returned and aborts startup.
pub async fn init_pg_pool(config: &PostgresConfig) -> Result<PgPool, StoreError> {
    let url = config
        .url
        .as_deref()
        .ok_or_else(|| StoreError::NotConfigured("DATABASE_URL is not set".to_string()))?;

    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_idle.min(config.max_connections))
        .max_lifetime(config.max_lifetime())
        .idle_timeout(config.idle_timeout())
        .acquire_timeout(config.acquire_timeout())
        .connect(url)
        .await?;
    info!(
        max_connections = config.max_connections,
        min_idle = config.min_idle,
        "PostgreSQL connected"
    );

    sqlx::migrate!("../../migrations").run(&pool).await?;
    info!("Database migrations applied successfully");

    Ok(pool)
}

/// Stateless CRUD store over a shared pool.
#[derive(Debug, Clone)]
pub struct PgRepoStore {
    pool: PgPool,
}

impl PgRepoStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl RepoStore for PgRepoStore {
    async fn create_repository(&self, repo: &Repository) -> Result<(), StoreError> {
        sqlx::query(&format!(
            "INSERT INTO repositories ({REPOSITORY_COLUMNS})
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)"
        ))
        .bind(repo.id)
        .bind(&repo.name)
        .bind(&repo.owner)
        .bind(&repo.description)
        .bind(&repo.url)
        .bind(&repo.language)
        .bind(repo.forks_count)
        .bind(repo.stars_count)
        .bind(repo.open_issues_count)
        .bind(repo.watchers_count)
        .bind(&repo.created_at)
        .bind(&repo.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_unique_violation(e, &repo.owner, &repo.name))?;
        Ok(())
    }

    async fn update_repository(&self, repo: &Repository) -> Result<(), StoreError> {
        sqlx::query(
            "UPDATE repositories
             SET name = $2, owner = $3, description = $4, url = $5, language = $6,
                 forks_count = $7, stars_count = $8, open_issues_count = $9,
                 watchers_count = $10, created_at = $11, updated_at = $12
             WHERE id = $1",
        )
        .bind(repo.id)
        .bind(&repo.name)
        .bind(&repo.owner)
        .bind(&repo.description)
        .bind(&repo.url)
        .bind(&repo.language)
        .bind(repo.forks_count)
        .bind(repo.stars_count)
        .bind(repo.open_issues_count)
        .bind(repo.watchers_count)
        .bind(&repo.created_at)
        .bind(&repo.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_unique_violation(e, &repo.owner, &repo.name))?;
        Ok(())
    }

    async fn create_commits(&self, commits: &[Commit]) -> Result<(), StoreError> {
        if commits.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await?;
        for chunk in commits.chunks(COMMIT_CHUNK) {
            let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(
                "INSERT INTO commits (id, repo_id, sha, author_name, author_email, message, commit_date) ",
            );
            builder.push_values(chunk, |mut row, c| {
                row.push_bind(c.id)
                    .push_bind(c.repo_id)
                    .push_bind(&c.sha)
                    .push_bind(&c.author_name)
                    .push_bind(&c.author_email)
                    .push_bind(&c.message)
                    .push_bind(c.commit_date);
            });
            builder.build().execute(&mut *tx).await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn find_repository(&self, owner: &str, name: &str) -> Result<Option<Repository>, StoreError> {
        let row = sqlx::query_as::<_, Repository>(&format!(
            "SELECT {REPOSITORY_COLUMNS} FROM repositories WHERE owner = $1 AND name = $2"
        ))
        .bind(owner)
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn list_repositories(&self, page_size: u32, page: u32) -> Result<RepositoryPage, StoreError> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM repositories")
            .fetch_one(&self.pool)
            .await?;

        let repositories = sqlx::query_as::<_, Repository>(&format!(
            "SELECT {REPOSITORY_COLUMNS} FROM repositories
             ORDER BY owner, name
             LIMIT $1 OFFSET $2"
        ))
        .bind(i64::from(page_size))
        .bind(page_offset(page_size, page) as i64)
        .fetch_all(&self.pool)
        .await?;

        Ok(RepositoryPage {
            repositories,
            total: total.max(0) as u64,
        })
    }

    async fn repositories_by_language(&self, language: &str) -> Result<Vec<Repository>, StoreError> {
        let rows = sqlx::query_as::<_, Repository>(&format!(
            "SELECT {REPOSITORY_COLUMNS} FROM repositories WHERE language = $1 ORDER BY owner, name"
        ))
        .bind(language)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn top_repositories_by_stars(&self, n: u32) -> Result<Vec<Repository>, StoreError> {
        let rows = sqlx::query_as::<_, Repository>(&format!(
            "SELECT {REPOSITORY_COLUMNS} FROM repositories ORDER BY stars_count DESC LIMIT $1"
        ))
        .bind(i64::from(n))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn commits_for_repository(&self, repo_id: RepositoryId) -> Result<Vec<Commit>, StoreError> {
        let rows = sqlx::query_as::<_, Commit>(
            "SELECT id, repo_id, sha, author_name, author_email, message, commit_date
             FROM commits WHERE repo_id = $1 ORDER BY commit_date DESC",
        )
        .bind(repo_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}

/// Map a Postgres unique-constraint violation to `StoreError::Duplicate`.
fn map_unique_violation(e: sqlx::Error, owner: &str, name: &str) -> StoreError {
    if let sqlx::Error::Database(ref db_err) = e {
        if db_err.code().as_deref() == Some("23505") {
            return StoreError::Duplicate {
                owner: owner.to_string(),
                name: name.to_string(),
            };
        }
    }
    error!("repository store database error: {}", e);
    StoreError::Database(e)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn init_without_url_is_not_configured() {
        let config = PostgresConfig {
            url: None,
            max_connections: 5,
            min_idle: 1,
            max_lifetime_secs: 60,
            idle_timeout_secs: 60,
            acquire_timeout_secs: 1,
        };
        let err = init_pg_pool(&config).await.unwrap_err();
        assert!(matches!(err, StoreError::NotConfigured(_)));
    }

    #[test]
    fn non_database_errors_pass_through() {
        let err = map_unique_violation(sqlx::Error::RowNotFound, "o", "n");
        assert!(matches!(err, StoreError::Database(sqlx::Error::RowNotFound)));
    }
}

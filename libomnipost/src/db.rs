//! SQLite storage for Omnipost

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqlitePool, SqliteRow};
use sqlx::Row;
use std::path::Path;
use tracing::{debug, info};

use crate::error::{DbError, OmnipostError, Result};
use crate::store::{targets_platform, PostStore};
use crate::types::{PlatformWindow, Post, PostStatus};

const POST_COLUMNS: &str = "id, content, status, scheduled_at, platform_ids, platform_id, \
     media_urls, media_url, retry_count, last_error, created_at";

#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Open (creating if needed) the database, run migrations and seed the
    /// default publish windows into an empty window table
    pub async fn new(db_path: &str) -> Result<Self> {
        // Expand path and create parent directories
        let expanded_path = shellexpand::tilde(db_path).to_string();
        let path = Path::new(&expanded_path);

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(DbError::IoError)?;
        }

        // Forward slashes keep the URL valid on Windows; mode=rwc creates the file
        let db_url = format!("sqlite://{}?mode=rwc", expanded_path.replace('\\', "/"));

        let pool = SqlitePool::connect(&db_url)
            .await
            .map_err(DbError::SqlxError)?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(DbError::MigrationError)?;

        let db = Self { pool };
        db.seed_default_windows().await?;
        Ok(db)
    }

    async fn seed_default_windows(&self) -> Result<()> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM platform_windows")
            .fetch_one(&self.pool)
            .await
            .map_err(DbError::SqlxError)?;

        if count == 0 {
            let defaults = PlatformWindow::defaults();
            for window in &defaults {
                self.upsert_window(window).await?;
            }
            info!(count = defaults.len(), "seeded default publish windows");
        }
        Ok(())
    }

    /// Fail with `NotFound` when an update touched no row
    fn expect_row(result: sqlx::sqlite::SqliteQueryResult, id: &str) -> Result<()> {
        if result.rows_affected() == 0 {
            return Err(OmnipostError::NotFound(format!("post {}", id)));
        }
        Ok(())
    }
}

fn to_millis(at: DateTime<Utc>) -> i64 {
    at.timestamp_millis()
}

fn post_from_row(row: &SqliteRow) -> Result<Post> {
    let id: String = row.try_get("id").map_err(DbError::SqlxError)?;
    let corrupt = |reason: String| DbError::CorruptRow {
        id: id.clone(),
        reason,
    };

    let datetime = |column: &str| -> Result<DateTime<Utc>> {
        let millis: i64 = row.try_get(column).map_err(DbError::SqlxError)?;
        DateTime::from_timestamp_millis(millis)
            .ok_or_else(|| corrupt(format!("{} out of range: {}", column, millis)).into())
    };
    let json_list = |column: &str| -> Result<Vec<String>> {
        let raw: String = row.try_get(column).map_err(DbError::SqlxError)?;
        serde_json::from_str(&raw)
            .map_err(|e| corrupt(format!("{} is not a JSON string array: {}", column, e)).into())
    };

    let status: String = row.try_get("status").map_err(DbError::SqlxError)?;
    let status = status
        .parse::<PostStatus>()
        .map_err(|e| corrupt(e.to_string()))?;
    let retry_count: i64 = row.try_get("retry_count").map_err(DbError::SqlxError)?;
    let retry_count =
        u32::try_from(retry_count).map_err(|_| corrupt(format!("retry_count {}", retry_count)))?;

    Ok(Post {
        content: row.try_get("content").map_err(DbError::SqlxError)?,
        status,
        scheduled_at: datetime("scheduled_at")?,
        platform_ids: json_list("platform_ids")?,
        platform_id: row.try_get("platform_id").map_err(DbError::SqlxError)?,
        media_urls: json_list("media_urls")?,
        media_url: row.try_get("media_url").map_err(DbError::SqlxError)?,
        retry_count,
        last_error: row.try_get("last_error").map_err(DbError::SqlxError)?,
        created_at: datetime("created_at")?,
        id,
    })
}

fn window_from_row(row: &SqliteRow) -> Result<PlatformWindow> {
    let platform_id: String = row.try_get("platform_id").map_err(DbError::SqlxError)?;
    let hour = |column: &str| -> Result<u8> {
        let value: i64 = row.try_get(column).map_err(DbError::SqlxError)?;
        u8::try_from(value).map_err(|_| {
            DbError::CorruptRow {
                id: platform_id.clone(),
                reason: format!("{} {}", column, value),
            }
            .into()
        })
    };
    let min_gap: i64 = row.try_get("min_gap_minutes").map_err(DbError::SqlxError)?;

    Ok(PlatformWindow {
        start_hour: hour("start_hour")?,
        end_hour: hour("end_hour")?,
        enabled: row.try_get("enabled").map_err(DbError::SqlxError)?,
        min_gap_minutes: u32::try_from(min_gap).unwrap_or(0),
        platform_id,
    })
}

fn json_list(values: &[String]) -> Result<String> {
    serde_json::to_string(values)
        .map_err(|e| OmnipostError::InvalidInput(format!("unserializable list: {}", e)))
}

#[async_trait]
impl PostStore for Database {
    async fn due_posts(&self, now: DateTime<Utc>) -> Result<Vec<Post>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM posts WHERE status = 'scheduled' AND scheduled_at <= ? \
             ORDER BY scheduled_at ASC",
            POST_COLUMNS
        ))
        .bind(to_millis(now))
        .fetch_all(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        rows.iter().map(post_from_row).collect()
    }

    async fn mark_publishing(&self, id: &str) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE posts SET status = 'publishing' WHERE id = ? AND status = 'scheduled'",
        )
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        Ok(result.rows_affected() == 1)
    }

    async fn mark_published(&self, id: &str) -> Result<()> {
        let result = sqlx::query(
            "UPDATE posts SET status = 'published', last_error = NULL WHERE id = ?",
        )
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        Self::expect_row(result, id)
    }

    async fn schedule_retry(
        &self,
        id: &str,
        retry_count: u32,
        last_error: &str,
        scheduled_at: DateTime<Utc>,
    ) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE posts
            SET status = 'scheduled', retry_count = ?, last_error = ?, scheduled_at = ?
            WHERE id = ?
            "#,
        )
        .bind(i64::from(retry_count))
        .bind(last_error)
        .bind(to_millis(scheduled_at))
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        Self::expect_row(result, id)
    }

    async fn mark_failed(&self, id: &str, retry_count: u32, last_error: &str) -> Result<()> {
        let result = sqlx::query(
            "UPDATE posts SET status = 'failed', retry_count = ?, last_error = ? WHERE id = ?",
        )
        .bind(i64::from(retry_count))
        .bind(last_error)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        Self::expect_row(result, id)
    }

    async fn windows(&self) -> Result<Vec<PlatformWindow>> {
        let rows = sqlx::query(
            r#"
            SELECT platform_id, start_hour, end_hour, enabled, min_gap_minutes
            FROM platform_windows
            ORDER BY platform_id
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        rows.iter().map(window_from_row).collect()
    }

    async fn upsert_window(&self, window: &PlatformWindow) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO platform_windows (platform_id, start_hour, end_hour, enabled, min_gap_minutes)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(platform_id) DO UPDATE SET
                start_hour = excluded.start_hour,
                end_hour = excluded.end_hour,
                enabled = excluded.enabled,
                min_gap_minutes = excluded.min_gap_minutes
            "#,
        )
        .bind(window.platform_id.to_lowercase())
        .bind(i64::from(window.start_hour))
        .bind(i64::from(window.end_hour))
        .bind(window.enabled)
        .bind(i64::from(window.min_gap_minutes))
        .execute(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        Ok(())
    }

    async fn has_gap_conflict(
        &self,
        platform: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        exclude_id: Option<&str>,
    ) -> Result<bool> {
        // Platform lists are JSON, so narrow by time and status here and match
        // the platform on the decoded rows.
        let rows = sqlx::query(&format!(
            "SELECT {} FROM posts \
             WHERE status IN ('scheduled', 'publishing') \
             AND scheduled_at BETWEEN ? AND ? \
             AND (? IS NULL OR id != ?)",
            POST_COLUMNS
        ))
        .bind(to_millis(from))
        .bind(to_millis(to))
        .bind(exclude_id)
        .bind(exclude_id)
        .fetch_all(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        let platform = platform.to_lowercase();
        for row in &rows {
            if targets_platform(&post_from_row(row)?, &platform) {
                debug!(platform = %platform, "gap conflict found");
                return Ok(true);
            }
        }
        Ok(false)
    }

    async fn create_post(&self, post: &Post) -> Result<()> {
        sqlx::query(&format!(
            "INSERT INTO posts ({}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            POST_COLUMNS
        ))
        .bind(&post.id)
        .bind(&post.content)
        .bind(post.status.as_str())
        .bind(to_millis(post.scheduled_at))
        .bind(json_list(&post.platform_ids)?)
        .bind(&post.platform_id)
        .bind(json_list(&post.media_urls)?)
        .bind(&post.media_url)
        .bind(i64::from(post.retry_count))
        .bind(&post.last_error)
        .bind(to_millis(post.created_at))
        .execute(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        Ok(())
    }

    async fn get_post(&self, id: &str) -> Result<Option<Post>> {
        let row = sqlx::query(&format!("SELECT {} FROM posts WHERE id = ?", POST_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(DbError::SqlxError)?;

        row.as_ref().map(post_from_row).transpose()
    }

    async fn update_schedule(&self, id: &str, scheduled_at: DateTime<Utc>) -> Result<()> {
        let result = sqlx::query(
            "UPDATE posts SET scheduled_at = ?, status = 'scheduled' WHERE id = ?",
        )
        .bind(to_millis(scheduled_at))
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        Self::expect_row(result, id)
    }

    async fn set_status(&self, id: &str, status: PostStatus) -> Result<()> {
        let result = sqlx::query("UPDATE posts SET status = ? WHERE id = ?")
            .bind(status.as_str())
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(DbError::SqlxError)?;

        Self::expect_row(result, id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use tempfile::TempDir;

    async fn create_test_db() -> (Database, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("test.db");
        let db = Database::new(db_path.to_str().unwrap()).await.unwrap();
        (db, temp_dir)
    }

    fn scheduled_post(platform: &str, at: DateTime<Utc>) -> Post {
        Post::scheduled("Test post content".to_string(), vec![platform.to_string()], at)
    }

    #[tokio::test]
    async fn test_database_initialization_with_invalid_path() {
        #[cfg(unix)]
        let invalid_path = "/tmp/test\0invalid.db";

        #[cfg(windows)]
        let invalid_path = "C:\\invalid<>path\\test.db";

        let result = Database::new(invalid_path).await;
        assert!(matches!(result, Err(OmnipostError::Database(_))));
    }

    #[tokio::test]
    async fn test_post_round_trip_preserves_fields() {
        let (db, _temp_dir) = create_test_db().await;
        let mut post = scheduled_post("Instagram", Utc::now())
            .with_media(vec!["https://cdn.example.com/a.png".to_string()]);
        post.platform_id = Some("legacy".to_string());
        post.last_error = Some("rate_limited".to_string());
        post.retry_count = 2;

        db.create_post(&post).await.unwrap();
        let loaded = db.get_post(&post.id).await.unwrap().unwrap();

        assert_eq!(loaded.content, post.content);
        assert_eq!(loaded.status, PostStatus::Scheduled);
        assert_eq!(loaded.platform_ids, vec!["Instagram"]);
        assert_eq!(loaded.platform_id.as_deref(), Some("legacy"));
        assert_eq!(loaded.media_urls, post.media_urls);
        assert_eq!(loaded.retry_count, 2);
        assert_eq!(loaded.last_error.as_deref(), Some("rate_limited"));
        assert_eq!(
            loaded.scheduled_at.timestamp_millis(),
            post.scheduled_at.timestamp_millis()
        );
    }

    #[tokio::test]
    async fn test_get_missing_post() {
        let (db, _temp_dir) = create_test_db().await;
        assert!(db.get_post("nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_due_posts_ordered_and_filtered() {
        let (db, _temp_dir) = create_test_db().await;
        let now = Utc::now();

        let older = scheduled_post("twitter", now - Duration::minutes(10));
        let newer = scheduled_post("twitter", now - Duration::minutes(1));
        let future = scheduled_post("twitter", now + Duration::minutes(10));
        for post in [&newer, &future, &older] {
            db.create_post(post).await.unwrap();
        }

        let due = db.due_posts(now).await.unwrap();
        let ids: Vec<_> = due.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec![older.id.as_str(), newer.id.as_str()]);
    }

    #[tokio::test]
    async fn test_mark_publishing_is_conditional() {
        let (db, _temp_dir) = create_test_db().await;
        let post = scheduled_post("twitter", Utc::now());
        db.create_post(&post).await.unwrap();

        assert!(db.mark_publishing(&post.id).await.unwrap());
        assert!(!db.mark_publishing(&post.id).await.unwrap());

        let loaded = db.get_post(&post.id).await.unwrap().unwrap();
        assert_eq!(loaded.status, PostStatus::Publishing);
        assert!(db.due_posts(Utc::now()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_retry_then_publish() {
        let (db, _temp_dir) = create_test_db().await;
        let post = scheduled_post("twitter", Utc::now());
        db.create_post(&post).await.unwrap();
        db.mark_publishing(&post.id).await.unwrap();

        let next = Utc::now() + Duration::seconds(15);
        db.schedule_retry(&post.id, 1, "rate_limited", next)
            .await
            .unwrap();
        let retried = db.get_post(&post.id).await.unwrap().unwrap();
        assert_eq!(retried.status, PostStatus::Scheduled);
        assert_eq!(retried.retry_count, 1);
        assert_eq!(retried.last_error.as_deref(), Some("rate_limited"));

        db.mark_published(&post.id).await.unwrap();
        let published = db.get_post(&post.id).await.unwrap().unwrap();
        assert_eq!(published.status, PostStatus::Published);
        assert_eq!(published.retry_count, 1);
        assert!(published.last_error.is_none());
    }

    #[tokio::test]
    async fn test_mark_failed_missing_post_is_not_found() {
        let (db, _temp_dir) = create_test_db().await;
        let err = db.mark_failed("missing", 1, "non_retryable").await.unwrap_err();
        assert_eq!(err.exit_code(), 3);
    }

    #[tokio::test]
    async fn test_default_windows_seeded_once() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("windows.db");
        let path = path.to_str().unwrap();

        let db = Database::new(path).await.unwrap();
        assert_eq!(db.windows().await.unwrap().len(), 5);

        let mut twitter = PlatformWindow::new("twitter", 9, 17, 10);
        twitter.enabled = false;
        db.upsert_window(&twitter).await.unwrap();
        drop(db);

        let reopened = Database::new(path).await.unwrap();
        let windows = reopened.windows().await.unwrap();
        assert_eq!(windows.len(), 5);
        let stored = windows.iter().find(|w| w.platform_id == "twitter").unwrap();
        assert_eq!(stored, &twitter);
    }

    #[tokio::test]
    async fn test_gap_conflict_matches_platform_in_json() {
        let (db, _temp_dir) = create_test_db().await;
        let at = Utc::now() + Duration::hours(2);
        let post = Post::scheduled(
            "multi".to_string(),
            vec!["facebook".to_string(), "Twitter".to_string()],
            at,
        );
        db.create_post(&post).await.unwrap();

        let (from, to) = (at - Duration::minutes(5), at + Duration::minutes(5));
        assert!(db.has_gap_conflict("twitter", from, to, None).await.unwrap());
        assert!(!db.has_gap_conflict("linkedin", from, to, None).await.unwrap());
        assert!(!db
            .has_gap_conflict("twitter", from, to, Some(&post.id))
            .await
            .unwrap());

        let later = at + Duration::minutes(30);
        assert!(!db
            .has_gap_conflict("twitter", later - Duration::minutes(5), later, None)
            .await
            .unwrap());
    }
}

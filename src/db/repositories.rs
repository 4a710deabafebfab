//! Postgres-backed camera directory and alert store (tables in `migrations/0001_init.sql`).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

use super::DbPool;
use crate::error::AppResult;
use crate::models::{Alert, CameraCounts, CameraRecord, CameraSummary, NewAlert};
use crate::repositories::{AlertStore, CameraDirectory};

// ---- Cameras ----

#[derive(Debug, FromRow)]
pub struct CameraRow {
    pub id: String,
    pub name: String,
    pub location: String,
    pub is_streaming: bool,
}

impl From<CameraRow> for CameraRecord {
    fn from(row: CameraRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            location: row.location,
            is_streaming: row.is_streaming,
        }
    }
}

// ---- Alerts ----

#[derive(Debug, FromRow)]
pub struct AlertRow {
    pub id: Uuid,
    pub camera_id: String,
    pub description: Option<String>,
    pub thumbnail_url: Option<String>,
    pub metadata: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub camera_name: String,
    pub camera_location: String,
}

impl From<AlertRow> for Alert {
    fn from(row: AlertRow) -> Self {
        Self {
            id: row.id.to_string(),
            camera: Some(CameraSummary {
                id: row.camera_id.clone(),
                name: row.camera_name,
                location: row.camera_location,
            }),
            camera_id: row.camera_id,
            description: row.description,
            thumbnail_url: row.thumbnail_url,
            metadata: row.metadata,
            timestamp: row.created_at,
        }
    }
}

/// Registry and alert tables behind one pool.
#[derive(Clone)]
pub struct PgStore {
    pool: DbPool,
}

impl PgStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CameraDirectory for PgStore {
    async fn find_camera(&self, id: &str) -> AppResult<Option<CameraRecord>> {
        let row = sqlx::query_as::<_, CameraRow>(
            "SELECT id, name, location, is_streaming FROM cameras WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(CameraRecord::from))
    }

    async fn camera_counts(&self) -> AppResult<CameraCounts> {
        let (total_cameras, streaming_cameras) = sqlx::query_as::<_, (i64, i64)>(
            "SELECT COUNT(*), COUNT(*) FILTER (WHERE is_streaming) FROM cameras",
        )
        .fetch_one(&self.pool)
        .await?;
        Ok(CameraCounts {
            total_cameras,
            streaming_cameras,
        })
    }

    async fn set_streaming(&self, id: &str, streaming: bool) -> AppResult<Option<CameraRecord>> {
        let row = sqlx::query_as::<_, CameraRow>(
            r#"
            UPDATE cameras SET is_streaming = $2, updated_at = NOW()
            WHERE id = $1
            RETURNING id, name, location, is_streaming
            "#,
        )
        .bind(id)
        .bind(streaming)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(CameraRecord::from))
    }
}

#[async_trait]
impl AlertStore for PgStore {
    async fn insert_alert(&self, camera: &CameraRecord, alert: NewAlert) -> AppResult<Alert> {
        let row = sqlx::query_as::<_, AlertRow>(
            r#"
            WITH inserted AS (
                INSERT INTO alerts (camera_id, description, thumbnail_url, metadata)
                VALUES ($1, $2, $3, $4)
                RETURNING id, camera_id, description, thumbnail_url, metadata, created_at
            )
            SELECT i.id, i.camera_id, i.description, i.thumbnail_url, i.metadata, i.created_at,
                   c.name AS camera_name, c.location AS camera_location
            FROM inserted i JOIN cameras c ON c.id = i.camera_id
            "#,
        )
        .bind(&camera.id)
        .bind(alert.description)
        .bind(alert.thumbnail_url)
        .bind(alert.metadata)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.into())
    }

    async fn recent_alerts(&self, camera_id: Option<&str>, limit: usize) -> AppResult<Vec<Alert>> {
        let rows = sqlx::query_as::<_, AlertRow>(
            r#"
            SELECT a.id, a.camera_id, a.description, a.thumbnail_url, a.metadata, a.created_at,
                   c.name AS camera_name, c.location AS camera_location
            FROM alerts a JOIN cameras c ON c.id = a.camera_id
            WHERE ($1::text IS NULL OR a.camera_id = $1)
            ORDER BY a.created_at DESC
            LIMIT $2
            "#,
        )
        .bind(camera_id)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Alert::from).collect())
    }
}

//! # Local Offset Store
//!
//! SQLite-backed [`OffsetStore`]. Offsets are keyed directly by the pair of
//! content identities; the `files` table only records the last file name seen
//! for an identity so that `records()` can show something readable.

use crate::db::{self, DatabaseConfig};
use crate::error::{Result, StoreError};
use crate::identity::ContentIdentity;
use crate::store::{OffsetStore, StoreBackend, StoredOffset};
use async_trait::async_trait;
use sqlx::sqlite::{SqlitePool, SqliteRow};
use sqlx::Row;
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument};

/// Offset store kept in a local SQLite database.
pub struct SqliteOffsetStore {
    pool: SqlitePool,
    path: Option<PathBuf>,
}

impl SqliteOffsetStore {
    /// Open the database at `path`.
    ///
    /// A missing file is created with a fresh schema. With `overwrite` set,
    /// an existing file has its tables dropped and recreated. Otherwise the
    /// existing contents are left untouched and must already contain the
    /// offset tables.
    #[instrument(skip_all)]
    pub async fn open(path: impl AsRef<Path>, overwrite: bool) -> Result<Self> {
        let path = path.as_ref();
        let exists = tokio::fs::try_exists(path).await.map_err(|e| {
            StoreError::Database(format!("Cannot access {}: {}", path.display(), e))
        })?;

        let pool = db::create_pool(&DatabaseConfig::new(path)).await?;

        if !exists || overwrite {
            db::initialize_schema(&pool).await?;
        } else {
            db::verify_schema(&pool, path).await?;
        }

        info!(
            path = %path.display(),
            created = !exists || overwrite,
            "Local offset store opened"
        );

        Ok(Self {
            pool,
            path: Some(path.to_path_buf()),
        })
    }

    /// Fresh store in a private in-memory database.
    pub async fn in_memory() -> Result<Self> {
        let pool = db::create_pool(&DatabaseConfig::in_memory()).await?;
        db::initialize_schema(&pool).await?;
        Ok(Self { pool, path: None })
    }

    /// Database file backing this store, `None` when in memory.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Every stored offset with the last seen file names, newest first.
    #[instrument(skip(self))]
    pub async fn records(&self) -> Result<Vec<StoredOffset>> {
        let rows = sqlx::query(
            r#"
            SELECT o.video_identity, o.audio_identity, o.offset_seconds, o.updated_at,
                   v.display_name AS video_name, a.display_name AS audio_name
            FROM offsets o
            LEFT JOIN files v ON v.identity = o.video_identity
            LEFT JOIN files a ON a.identity = o.audio_identity
            ORDER BY o.updated_at DESC, o.rowid DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::row_to_record).collect()
    }

    /// Close the pool, waiting for in-flight statements.
    pub async fn close(&self) {
        self.pool.close().await;
    }

    fn row_to_record(row: &SqliteRow) -> Result<StoredOffset> {
        let identity = |column: &str| -> Result<ContentIdentity> {
            let value: String = row.try_get(column)?;
            ContentIdentity::from_hex(&value).map_err(|e| StoreError::Malformed(e.to_string()))
        };

        Ok(StoredOffset {
            video: identity("video_identity")?,
            audio: identity("audio_identity")?,
            offset_seconds: row.try_get("offset_seconds")?,
            updated_at: row.try_get("updated_at")?,
            video_name: row.try_get("video_name")?,
            audio_name: row.try_get("audio_name")?,
        })
    }
}

#[async_trait]
impl OffsetStore for SqliteOffsetStore {
    #[instrument(skip(self), fields(video = video.short(), audio = audio.short()))]
    async fn get_offset(
        &self,
        video: &ContentIdentity,
        audio: &ContentIdentity,
    ) -> Result<Option<f64>> {
        let row = sqlx::query(
            "SELECT offset_seconds FROM offsets WHERE video_identity = ? AND audio_identity = ?",
        )
        .bind(video.as_str())
        .bind(audio.as_str())
        .fetch_optional(&self.pool)
        .await?;

        let offset = row
            .map(|row| row.try_get::<f64, _>("offset_seconds"))
            .transpose()?;

        debug!(found = offset.is_some(), "Looked up local offset");
        Ok(offset)
    }

    #[instrument(skip(self), fields(video = video.short(), audio = audio.short()))]
    async fn put_offset(
        &self,
        video: &ContentIdentity,
        audio: &ContentIdentity,
        offset_seconds: f64,
    ) -> Result<()> {
        let now = chrono::Utc::now().timestamp();
        let mut tx = self.pool.begin().await?;

        for identity in [video, audio] {
            sqlx::query(
                "INSERT INTO files (identity, display_name, last_seen_at) VALUES (?, NULL, ?) \
                 ON CONFLICT(identity) DO NOTHING",
            )
            .bind(identity.as_str())
            .bind(now)
            .execute(&mut *tx)
            .await?;
        }

        sqlx::query(
            r#"
            INSERT INTO offsets (video_identity, audio_identity, offset_seconds, updated_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(video_identity, audio_identity) DO UPDATE SET
                offset_seconds = excluded.offset_seconds,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(video.as_str())
        .bind(audio.as_str())
        .bind(offset_seconds)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        debug!(offset_seconds, "Stored local offset");
        Ok(())
    }

    #[instrument(skip(self, display_name), fields(identity = identity.short()))]
    async fn remember_file(&self, identity: &ContentIdentity, display_name: &str) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO files (identity, display_name, last_seen_at) VALUES (?, ?, ?)
            ON CONFLICT(identity) DO UPDATE SET
                display_name = excluded.display_name,
                last_seen_at = excluded.last_seen_at
            "#,
        )
        .bind(identity.as_str())
        .bind(display_name)
        .bind(chrono::Utc::now().timestamp())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    fn backend(&self) -> StoreBackend {
        StoreBackend::Local
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::ContentHasher;

    fn identities() -> (ContentIdentity, ContentIdentity) {
        let hasher = ContentHasher::default();
        (hasher.hash_bytes(b"V1"), hasher.hash_bytes(b"A1"))
    }

    #[tokio::test]
    async fn test_unknown_pair_is_none() {
        let store = SqliteOffsetStore::in_memory().await.unwrap();
        let (video, audio) = identities();
        assert_eq!(store.get_offset(&video, &audio).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_put_then_get() {
        let store = SqliteOffsetStore::in_memory().await.unwrap();
        let (video, audio) = identities();

        store.put_offset(&video, &audio, 2.5).await.unwrap();
        assert_eq!(store.get_offset(&video, &audio).await.unwrap(), Some(2.5));
    }

    #[tokio::test]
    async fn test_put_is_upsert() {
        let store = SqliteOffsetStore::in_memory().await.unwrap();
        let (video, audio) = identities();

        store.put_offset(&video, &audio, 2.5).await.unwrap();
        store.put_offset(&video, &audio, -1.25).await.unwrap();

        assert_eq!(store.get_offset(&video, &audio).await.unwrap(), Some(-1.25));
        assert_eq!(store.records().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_pair_order_matters() {
        let store = SqliteOffsetStore::in_memory().await.unwrap();
        let (video, audio) = identities();

        store.put_offset(&video, &audio, 4.0).await.unwrap();
        assert_eq!(store.get_offset(&audio, &video).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_records_carry_display_names() {
        let store = SqliteOffsetStore::in_memory().await.unwrap();
        let (video, audio) = identities();

        store.remember_file(&video, "film.mkv").await.unwrap();
        store.put_offset(&video, &audio, 3.0).await.unwrap();
        store.remember_file(&audio, "riff.mp3").await.unwrap();

        let records = store.records().await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].video, video);
        assert_eq!(records[0].audio, audio);
        assert_eq!(records[0].offset_seconds, 3.0);
        assert_eq!(records[0].video_name.as_deref(), Some("film.mkv"));
        assert_eq!(records[0].audio_name.as_deref(), Some("riff.mp3"));
    }

    #[tokio::test]
    async fn test_backend_is_local() {
        let store = SqliteOffsetStore::in_memory().await.unwrap();
        assert_eq!(store.backend(), StoreBackend::Local);
        assert!(store.path().is_none());
    }
}

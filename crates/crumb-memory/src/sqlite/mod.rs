mod codec;

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};

use crate::error::MemoryError;
use crate::vector_store::{
    BoxFuture, ScoredVectorPoint, VectorFilter, VectorPoint, VectorStore, VectorStoreError,
    check_dimension, matches_filter, rank,
};

/// File name of the database inside the store directory.
pub const DB_FILE_NAME: &str = "index.db";

/// Vector store persisted to a single `SQLite` database under a directory.
///
/// Search is a brute-force cosine scan over the collection, which is fine for
/// the few thousand chunks a single document produces.
#[derive(Debug, Clone)]
pub struct SqliteVectorStore {
    pool: SqlitePool,
    path: PathBuf,
}

impl SqliteVectorStore {
    /// Open (or create) the store rooted at `dir` and run migrations.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created, the database cannot
    /// be opened, or migrations fail.
    pub async fn open(dir: &Path) -> Result<Self, MemoryError> {
        tokio::fs::create_dir_all(dir).await?;
        Self::connect(dir.join(DB_FILE_NAME), true).await
    }

    /// Open the store rooted at `dir` only if its database already exists.
    ///
    /// Returns `Ok(None)` without touching the filesystem when nothing has been
    /// indexed there yet.
    ///
    /// # Errors
    ///
    /// Returns an error if the database exists but cannot be opened or migrated.
    pub async fn open_existing(dir: &Path) -> Result<Option<Self>, MemoryError> {
        let path = dir.join(DB_FILE_NAME);
        if !tokio::fs::try_exists(&path).await? {
            return Ok(None);
        }
        Self::connect(path, false).await.map(Some)
    }

    async fn connect(path: PathBuf, create: bool) -> Result<Self, MemoryError> {
        let opts = SqliteConnectOptions::new()
            .filename(&path)
            .create_if_missing(create)
            .foreign_keys(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(opts)
            .await?;

        sqlx::migrate!("../../migrations").run(&pool).await?;

        tracing::debug!(path = %path.display(), "opened vector store");
        Ok(Self { pool, path })
    }

    /// Path of the database file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn vector_size(&self, collection: &str) -> Result<Option<u64>, sqlx::Error> {
        let size: Option<i64> =
            sqlx::query_scalar("SELECT vector_size FROM collections WHERE name = ?")
                .bind(collection)
                .fetch_optional(&self.pool)
                .await?;
        Ok(size.map(|s| u64::try_from(s).unwrap_or_default()))
    }

    async fn require_vector_size(
        &self,
        collection: &str,
        wrap: fn(String) -> VectorStoreError,
    ) -> Result<u64, VectorStoreError> {
        self.vector_size(collection)
            .await
            .map_err(|e| wrap(e.to_string()))?
            .ok_or_else(|| wrap(format!("collection {collection} not found")))
    }

    async fn load_points(
        &self,
        collection: &str,
    ) -> Result<Vec<(String, Vec<f32>, HashMap<String, serde_json::Value>)>, VectorStoreError>
    {
        let rows: Vec<(String, Vec<u8>, String)> =
            sqlx::query_as("SELECT id, vector, payload FROM points WHERE collection = ?")
                .bind(collection)
                .fetch_all(&self.pool)
                .await
                .map_err(|e| VectorStoreError::Search(e.to_string()))?;

        rows.into_iter()
            .map(|(id, blob, payload)| {
                Ok((
                    id,
                    codec::decode_vector(&blob)?,
                    codec::decode_payload(&payload)?,
                ))
            })
            .collect()
    }

    async fn delete_ids(&self, collection: &str, ids: &[String]) -> Result<(), sqlx::Error> {
        let mut tx = self.pool.begin().await?;
        for id in ids {
            sqlx::query("DELETE FROM points WHERE collection = ? AND id = ?")
                .bind(collection)
                .bind(id)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await
    }
}

impl VectorStore for SqliteVectorStore {
    fn ensure_collection(
        &self,
        collection: &str,
        vector_size: u64,
    ) -> BoxFuture<'_, Result<(), VectorStoreError>> {
        let collection = collection.to_owned();
        Box::pin(async move {
            let existing = self
                .vector_size(&collection)
                .await
                .map_err(|e| VectorStoreError::Collection(e.to_string()))?;
            match existing {
                Some(size) if size != vector_size => Err(VectorStoreError::Collection(format!(
                    "collection {collection} holds {size}-dimensional vectors, got {vector_size}"
                ))),
                Some(_) => Ok(()),
                None => {
                    let size = i64::try_from(vector_size)
                        .map_err(|e| VectorStoreError::Collection(e.to_string()))?;
                    sqlx::query("INSERT INTO collections (name, vector_size) VALUES (?, ?)")
                        .bind(&collection)
                        .bind(size)
                        .execute(&self.pool)
                        .await
                        .map_err(|e| VectorStoreError::Collection(e.to_string()))?;
                    tracing::debug!(%collection, vector_size, "created collection");
                    Ok(())
                }
            }
        })
    }

    fn collection_exists(&self, collection: &str) -> BoxFuture<'_, Result<bool, VectorStoreError>> {
        let collection = collection.to_owned();
        Box::pin(async move {
            self.vector_size(&collection)
                .await
                .map(|s| s.is_some())
                .map_err(|e| VectorStoreError::Collection(e.to_string()))
        })
    }

    fn upsert(
        &self,
        collection: &str,
        points: Vec<VectorPoint>,
    ) -> BoxFuture<'_, Result<(), VectorStoreError>> {
        let collection = collection.to_owned();
        Box::pin(async move {
            let size = self
                .require_vector_size(&collection, VectorStoreError::Upsert)
                .await?;
            for p in &points {
                check_dimension(size, p.vector.len()).map_err(|(want, got)| {
                    VectorStoreError::Upsert(format!(
                        "point {} has {got} dimensions, collection expects {want}",
                        p.id
                    ))
                })?;
            }

            let upsert_err = |e: sqlx::Error| VectorStoreError::Upsert(e.to_string());
            let mut tx = self.pool.begin().await.map_err(upsert_err)?;
            for p in &points {
                sqlx::query(
                    "INSERT INTO points (collection, id, vector, payload) VALUES (?, ?, ?, ?) \
                     ON CONFLICT(collection, id) DO UPDATE SET \
                     vector = excluded.vector, payload = excluded.payload",
                )
                .bind(&collection)
                .bind(&p.id)
                .bind(codec::encode_vector(&p.vector))
                .bind(codec::encode_payload(&p.payload)?)
                .execute(&mut *tx)
                .await
                .map_err(upsert_err)?;
            }
            tx.commit().await.map_err(upsert_err)?;
            Ok(())
        })
    }

    fn search(
        &self,
        collection: &str,
        vector: Vec<f32>,
        limit: u64,
        filter: Option<VectorFilter>,
    ) -> BoxFuture<'_, Result<Vec<ScoredVectorPoint>, VectorStoreError>> {
        let collection = collection.to_owned();
        Box::pin(async move {
            let size = self
                .require_vector_size(&collection, VectorStoreError::Search)
                .await?;
            check_dimension(size, vector.len()).map_err(|(want, got)| {
                VectorStoreError::Search(format!(
                    "query has {got} dimensions, collection expects {want}"
                ))
            })?;

            let points = self.load_points(&collection).await?;
            let candidates = points
                .iter()
                .map(|(id, v, payload)| (id, v.as_slice(), payload));
            Ok(rank(candidates, &vector, limit, filter.as_ref()))
        })
    }

    fn delete_by_filter(
        &self,
        collection: &str,
        filter: VectorFilter,
    ) -> BoxFuture<'_, Result<(), VectorStoreError>> {
        let collection = collection.to_owned();
        Box::pin(async move {
            self.require_vector_size(&collection, VectorStoreError::Delete)
                .await?;
            let ids: Vec<String> = self
                .load_points(&collection)
                .await?
                .into_iter()
                .filter(|(_, _, payload)| matches_filter(payload, &filter))
                .map(|(id, _, _)| id)
                .collect();
            if ids.is_empty() {
                return Ok(());
            }
            tracing::debug!(%collection, removed = ids.len(), "deleting points by filter");
            self.delete_ids(&collection, &ids)
                .await
                .map_err(|e| VectorStoreError::Delete(e.to_string()))
        })
    }

    fn count(&self, collection: &str) -> BoxFuture<'_, Result<u64, VectorStoreError>> {
        let collection = collection.to_owned();
        Box::pin(async move {
            let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM points WHERE collection = ?")
                .bind(&collection)
                .fetch_one(&self.pool)
                .await
                .map_err(|e| VectorStoreError::Search(e.to_string()))?;
            Ok(u64::try_from(n).unwrap_or_default())
        })
    }

    fn close(&self) -> BoxFuture<'_, ()> {
        Box::pin(async move { self.pool.close().await })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point(id: &str, vector: Vec<f32>, source: &str) -> VectorPoint {
        VectorPoint {
            id: id.into(),
            vector,
            payload: HashMap::from([
                ("source".into(), serde_json::json!(source)),
                ("content".into(), serde_json::json!(format!("chunk {id}"))),
            ]),
        }
    }

    #[tokio::test]
    async fn open_creates_directory_and_database() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("nested").join("store");
        let store = SqliteVectorStore::open(&root).await.unwrap();
        assert!(root.join(DB_FILE_NAME).exists());
        assert_eq!(store.path(), root.join(DB_FILE_NAME));
    }

    #[tokio::test]
    async fn wal_journal_mode_enabled() {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteVectorStore::open(dir.path()).await.unwrap();

        let mode: String = sqlx::query_scalar("PRAGMA journal_mode")
            .fetch_one(&store.pool)
            .await
            .unwrap();
        assert_eq!(mode, "wal", "expected WAL journal mode, got: {mode}");
    }

    #[tokio::test]
    async fn ensure_collection_checks_dimension() {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteVectorStore::open(dir.path()).await.unwrap();
        assert!(!store.collection_exists("docs").await.unwrap());
        store.ensure_collection("docs", 3).await.unwrap();
        store.ensure_collection("docs", 3).await.unwrap();
        assert!(store.collection_exists("docs").await.unwrap());
        assert!(matches!(
            store.ensure_collection("docs", 8).await,
            Err(VectorStoreError::Collection(_))
        ));
    }

    #[tokio::test]
    async fn search_returns_closest_first_with_payload() {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteVectorStore::open(dir.path()).await.unwrap();
        store.ensure_collection("docs", 2).await.unwrap();
        store
            .upsert(
                "docs",
                vec![
                    point("far", vec![0.0, 1.0], "a.txt"),
                    point("near", vec![1.0, 0.1], "a.txt"),
                    point("mid", vec![1.0, 1.0], "a.txt"),
                ],
            )
            .await
            .unwrap();

        let hits = store.search("docs", vec![1.0, 0.0], 2, None).await.unwrap();
        let ids: Vec<&str> = hits.iter().map(|h| h.id.as_str()).collect();
        assert_eq!(ids, vec!["near", "mid"]);
        assert_eq!(hits[0].payload["content"], serde_json::json!("chunk near"));
    }

    #[tokio::test]
    async fn data_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = SqliteVectorStore::open(dir.path()).await.unwrap();
            store.ensure_collection("docs", 2).await.unwrap();
            store
                .upsert("docs", vec![point("a", vec![1.0, 0.0], "a.txt")])
                .await
                .unwrap();
            store.close().await;
        }
        let store = SqliteVectorStore::open(dir.path()).await.unwrap();
        assert_eq!(store.count("docs").await.unwrap(), 1);
        let hits = store.search("docs", vec![1.0, 0.0], 3, None).await.unwrap();
        assert_eq!(hits[0].id, "a");
    }

    #[tokio::test]
    async fn upsert_overwrites_existing_id() {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteVectorStore::open(dir.path()).await.unwrap();
        store.ensure_collection("docs", 2).await.unwrap();
        store
            .upsert("docs", vec![point("a", vec![1.0, 0.0], "a.txt")])
            .await
            .unwrap();
        store
            .upsert("docs", vec![point("a", vec![0.0, 1.0], "a.txt")])
            .await
            .unwrap();
        assert_eq!(store.count("docs").await.unwrap(), 1);
        let hits = store.search("docs", vec![0.0, 1.0], 1, None).await.unwrap();
        assert!((hits[0].score - 1.0).abs() < 1e-6);
    }

    #[tokio::test]
    async fn upsert_into_missing_collection_fails() {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteVectorStore::open(dir.path()).await.unwrap();
        assert!(matches!(
            store
                .upsert("docs", vec![point("a", vec![1.0], "a.txt")])
                .await,
            Err(VectorStoreError::Upsert(_))
        ));
    }

    #[tokio::test]
    async fn upsert_wrong_dimension_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteVectorStore::open(dir.path()).await.unwrap();
        store.ensure_collection("docs", 2).await.unwrap();
        let result = store
            .upsert(
                "docs",
                vec![
                    point("ok", vec![1.0, 0.0], "a.txt"),
                    point("bad", vec![1.0, 0.0, 0.0], "a.txt"),
                ],
            )
            .await;
        assert!(result.is_err());
        assert_eq!(store.count("docs").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn delete_by_filter_removes_only_matching_source() {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteVectorStore::open(dir.path()).await.unwrap();
        store.ensure_collection("docs", 2).await.unwrap();
        store
            .upsert(
                "docs",
                vec![
                    point("a", vec![1.0, 0.0], "one.txt"),
                    point("b", vec![0.5, 0.5], "one.txt"),
                    point("c", vec![0.0, 1.0], "two.txt"),
                ],
            )
            .await
            .unwrap();
        store
            .delete_by_filter("docs", VectorFilter::text_eq("source", "one.txt"))
            .await
            .unwrap();
        let hits = store.search("docs", vec![1.0, 0.0], 10, None).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "c");
    }

    #[tokio::test]
    async fn search_missing_collection_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteVectorStore::open(dir.path()).await.unwrap();
        store.ensure_collection("docs", 2).await.unwrap();
        assert!(matches!(
            store.search("other", vec![1.0, 0.0], 3, None).await,
            Err(VectorStoreError::Search(_))
        ));
    }

    #[tokio::test]
    async fn open_existing_skips_missing_database() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("vector_db");
        assert!(SqliteVectorStore::open_existing(&root).await.unwrap().is_none());
        assert!(!root.exists());
    }

    #[tokio::test]
    async fn open_existing_reads_indexed_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteVectorStore::open(dir.path()).await.unwrap();
        store.ensure_collection("docs", 2).await.unwrap();
        store
            .upsert("docs", vec![point("a", vec![1.0, 0.0], "a.txt")])
            .await
            .unwrap();
        store.close().await;

        let store = SqliteVectorStore::open_existing(dir.path())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(store.count("docs").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn open_existing_rejects_corrupt_database() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(DB_FILE_NAME),
            b"this is definitely not an sqlite database file",
        )
        .unwrap();
        assert!(SqliteVectorStore::open_existing(dir.path()).await.is_err());
    }
}

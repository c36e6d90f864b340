//! Tenant vector collection: SQLite with the sqlite-vec extension.
//!
//! A `chunks` table holds the text and scalar metadata; a parallel
//! `chunk_embeddings` table holds the vectors. Similarity search joins the
//! two and orders by `vec_distance_cosine`. The extension is registered
//! process-wide exactly once through `sqlite3_auto_extension`.

use std::mem::transmute;
use std::os::raw::c_char;
use std::path::{Path, PathBuf};
use std::sync::Once;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use rusqlite::{self, params};
use tokio_rusqlite::{Connection, ffi};
use tracing::{debug, info};

use crate::error::DocentError;

/// Scalar metadata stored beside each chunk.
///
/// Values are scalars only (strings, numbers); nested structures never
/// enter the collection.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct ChunkMetadata {
    pub url: Option<String>,
    pub page_title: Option<String>,
    pub content_type: Option<String>,
    pub domain: Option<String>,
    pub source: Option<String>,
    pub chunk_index: Option<i64>,
    pub chunk_length: Option<i64>,
    pub chunk_word_count: Option<i64>,
    pub extraction_timestamp: Option<String>,
    pub resource_id: Option<String>,
}

/// One stored document: id, chunk text, metadata.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ChunkDocument {
    pub id: String,
    pub text: String,
    pub metadata: ChunkMetadata,
}

/// Search hit with cosine similarity (1 − distance).
#[derive(Clone, Debug)]
pub struct ScoredChunk {
    pub document: ChunkDocument,
    pub similarity: f32,
}

#[derive(Clone)]
pub struct VectorCollection {
    conn: Connection,
    path: PathBuf,
    collection_name: String,
}

impl VectorCollection {
    /// Opens (creating if absent) the named collection under `dir`.
    pub async fn open(dir: impl AsRef<Path>, collection_name: &str) -> Result<Self, DocentError> {
        register_sqlite_vec()?;

        let dir = dir.as_ref();
        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|e| DocentError::Backend(format!("create vector store dir: {e}")))?;
        let path = dir.join(format!("{collection_name}.db"));

        let conn = Connection::open(path.clone()).await?;
        conn.call(|conn| {
            conn.execute_batch(
                "CREATE TABLE IF NOT EXISTS chunks (
                     id TEXT PRIMARY KEY,
                     text TEXT NOT NULL,
                     url TEXT,
                     page_title TEXT,
                     content_type TEXT,
                     domain TEXT,
                     source TEXT,
                     chunk_index INTEGER,
                     chunk_length INTEGER,
                     chunk_word_count INTEGER,
                     extraction_timestamp TEXT,
                     resource_id TEXT
                 );
                 CREATE INDEX IF NOT EXISTS chunks_url_idx ON chunks(url);
                 CREATE TABLE IF NOT EXISTS chunk_embeddings (
                     id TEXT PRIMARY KEY,
                     embedding BLOB NOT NULL
                 );
                 CREATE TABLE IF NOT EXISTS collection_meta (
                     key TEXT PRIMARY KEY,
                     value TEXT NOT NULL
                 );
                 INSERT OR IGNORE INTO collection_meta (key, value)
                     VALUES ('distance_metric', 'cosine');",
            )?;
            // Fail fast if the vec extension did not load.
            conn.query_row("SELECT vec_version()", [], |row| row.get::<_, String>(0))?;
            Ok(())
        })
        .await?;

        debug!(path = %path.display(), collection = collection_name, "vector collection open");

        Ok(Self {
            conn,
            path: dir.to_path_buf(),
            collection_name: collection_name.to_string(),
        })
    }

    pub fn store_path(&self) -> &Path {
        &self.path
    }

    pub fn collection_name(&self) -> &str {
        &self.collection_name
    }

    /// Inserts a batch inside one transaction. Fails atomically on
    /// duplicate ids; callers fall back to [`Self::insert_ignoring_duplicates`].
    pub async fn insert_batch(
        &self,
        documents: Vec<(ChunkDocument, Vec<f32>)>,
    ) -> Result<usize, DocentError> {
        if documents.is_empty() {
            return Ok(0);
        }
        let inserted = self
            .conn
            .call(move |conn| {
                let tx = conn.transaction()?;
                let mut count = 0usize;
                for (doc, embedding) in &documents {
                    insert_one(&tx, doc, embedding, false)?;
                    count += 1;
                }
                tx.commit()?;
                Ok(count)
            })
            .await?;
        Ok(inserted)
    }

    /// Per-item insert that skips rows whose id already exists.
    ///
    /// Used as the recovery path when a batch hit duplicate ids.
    pub async fn insert_ignoring_duplicates(
        &self,
        documents: Vec<(ChunkDocument, Vec<f32>)>,
    ) -> Result<usize, DocentError> {
        if documents.is_empty() {
            return Ok(0);
        }
        let inserted = self
            .conn
            .call(move |conn| {
                let mut count = 0usize;
                for (doc, embedding) in &documents {
                    if insert_one(conn, doc, embedding, true)? {
                        count += 1;
                    }
                }
                Ok(count)
            })
            .await?;
        Ok(inserted)
    }

    /// Cosine nearest-neighbour search.
    pub async fn search(
        &self,
        embedding: &[f32],
        limit: usize,
    ) -> Result<Vec<ScoredChunk>, DocentError> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        let query_json = serde_json::to_string(embedding)
            .map_err(|e| DocentError::Backend(e.to_string()))?;
        let hits = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT c.id, c.text, c.url, c.page_title, c.content_type, c.domain,
                            c.source, c.chunk_index, c.chunk_length, c.chunk_word_count,
                            c.extraction_timestamp, c.resource_id,
                            vec_distance_cosine(e.embedding, vec_f32(?1)) AS distance
                     FROM chunks c
                     JOIN chunk_embeddings e ON c.id = e.id
                     ORDER BY distance ASC
                     LIMIT ?2",
                )?;
                let rows = stmt.query_map((&query_json, limit as i64), |row| {
                    let distance: f32 = row.get(12)?;
                    Ok(ScoredChunk {
                        document: ChunkDocument {
                            id: row.get(0)?,
                            text: row.get(1)?,
                            metadata: ChunkMetadata {
                                url: row.get(2)?,
                                page_title: row.get(3)?,
                                content_type: row.get(4)?,
                                domain: row.get(5)?,
                                source: row.get(6)?,
                                chunk_index: row.get(7)?,
                                chunk_length: row.get(8)?,
                                chunk_word_count: row.get(9)?,
                                extraction_timestamp: row.get(10)?,
                                resource_id: row.get(11)?,
                            },
                        },
                        similarity: 1.0 - distance,
                    })
                })?;
                let mut hits = Vec::new();
                for row in rows {
                    hits.push(row?);
                }
                Ok(hits)
            })
            .await?;
        Ok(hits)
    }

    pub async fn count(&self) -> Result<u64, DocentError> {
        let count = self
            .conn
            .call(|conn| {
                let count: i64 =
                    conn.query_row("SELECT COUNT(*) FROM chunks", [], |row| row.get(0))?;
                Ok(count)
            })
            .await?;
        Ok(count as u64)
    }

    /// Closes the underlying connection. All clones of this handle become
    /// unusable afterwards; callers reopen with [`Self::open`].
    pub async fn close_handle(&self) {
        if let Err(err) = self.conn.clone().close().await {
            debug!(error = %err, "vector collection close reported an error");
        }
    }

    /// Destroys the current handle and reopens the same on-disk collection.
    ///
    /// A short delay between close and reopen lets file handles release.
    /// Returns the fresh document count.
    pub async fn reload(&mut self) -> Result<u64, DocentError> {
        info!(path = %self.path.display(), "reloading vector collection from disk");
        self.close_handle().await;
        tokio::time::sleep(Duration::from_millis(200)).await;
        let path = self.path.clone();
        let name = self.collection_name.clone();
        *self = Self::open(&path, &name).await?;
        self.count().await
    }
}

fn insert_one(
    conn: &rusqlite::Connection,
    doc: &ChunkDocument,
    embedding: &[f32],
    ignore_duplicates: bool,
) -> rusqlite::Result<bool> {
    let verb = if ignore_duplicates {
        "INSERT OR IGNORE"
    } else {
        "INSERT"
    };
    let embedding_json =
        serde_json::to_string(embedding).expect("f32 slice always serializes to JSON");
    let changed = conn.execute(
        &format!(
            "{verb} INTO chunks
                 (id, text, url, page_title, content_type, domain, source,
                  chunk_index, chunk_length, chunk_word_count,
                  extraction_timestamp, resource_id)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)"
        ),
        params![
            doc.id,
            doc.text,
            doc.metadata.url,
            doc.metadata.page_title,
            doc.metadata.content_type,
            doc.metadata.domain,
            doc.metadata.source,
            doc.metadata.chunk_index,
            doc.metadata.chunk_length,
            doc.metadata.chunk_word_count,
            doc.metadata.extraction_timestamp,
            doc.metadata.resource_id,
        ],
    )?;
    if changed == 0 {
        return Ok(false);
    }
    conn.execute(
        &format!("{verb} INTO chunk_embeddings (id, embedding) VALUES (?1, vec_f32(?2))"),
        params![doc.id, embedding_json],
    )?;
    Ok(true)
}

fn register_sqlite_vec() -> Result<(), DocentError> {
    use std::sync::Mutex;

    static INIT: Once = Once::new();
    static INIT_RESULT: Mutex<Option<Result<(), String>>> = Mutex::new(None);

    INIT.call_once(|| {
        let result = unsafe {
            type SqliteExtensionInit = unsafe extern "C" fn(
                *mut ffi::sqlite3,
                *mut *mut c_char,
                *const ffi::sqlite3_api_routines,
            ) -> i32;

            let init: unsafe extern "C" fn() = sqlite_vec::sqlite3_vec_init;
            let init_fn: SqliteExtensionInit =
                transmute::<unsafe extern "C" fn(), SqliteExtensionInit>(init);
            let rc = ffi::sqlite3_auto_extension(Some(init_fn));
            if rc != 0 {
                Err(format!("failed to register sqlite-vec extension (code {rc})"))
            } else {
                Ok(())
            }
        };
        *INIT_RESULT.lock().expect("init result mutex poisoned") = Some(result);
    });

    INIT_RESULT
        .lock()
        .expect("init result mutex poisoned")
        .clone()
        .expect("init was called but result not set")
        .map_err(DocentError::Backend)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn doc(id: &str, text: &str, url: &str) -> ChunkDocument {
        ChunkDocument {
            id: id.into(),
            text: text.into(),
            metadata: ChunkMetadata {
                url: Some(url.into()),
                chunk_length: Some(text.len() as i64),
                ..Default::default()
            },
        }
    }

    #[tokio::test]
    async fn insert_search_count_roundtrip() {
        let dir = tempdir().unwrap();
        let collection = VectorCollection::open(dir.path(), "scraped_content")
            .await
            .unwrap();

        collection
            .insert_batch(vec![
                (doc("a", "alpha text", "https://x.test/a"), vec![1.0, 0.0, 0.0]),
                (doc("b", "beta text", "https://x.test/b"), vec![0.0, 1.0, 0.0]),
            ])
            .await
            .unwrap();

        assert_eq!(collection.count().await.unwrap(), 2);

        let hits = collection.search(&[1.0, 0.0, 0.0], 2).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].document.id, "a");
        assert!(hits[0].similarity > hits[1].similarity);
    }

    #[tokio::test]
    async fn duplicate_ids_fail_batch_but_not_ignore_path() {
        let dir = tempdir().unwrap();
        let collection = VectorCollection::open(dir.path(), "scraped_content")
            .await
            .unwrap();

        collection
            .insert_batch(vec![(doc("a", "alpha", "https://x.test/a"), vec![1.0, 0.0])])
            .await
            .unwrap();

        let dup = vec![
            (doc("a", "alpha", "https://x.test/a"), vec![1.0, 0.0]),
            (doc("c", "gamma", "https://x.test/c"), vec![0.5, 0.5]),
        ];
        assert!(collection.insert_batch(dup.clone()).await.is_err());
        // The failed batch rolled back entirely.
        assert_eq!(collection.count().await.unwrap(), 1);

        let inserted = collection.insert_ignoring_duplicates(dup).await.unwrap();
        assert_eq!(inserted, 1);
        assert_eq!(collection.count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn reload_sees_external_writes() {
        let dir = tempdir().unwrap();
        let mut collection = VectorCollection::open(dir.path(), "scraped_content")
            .await
            .unwrap();
        collection
            .insert_batch(vec![(doc("a", "alpha", "https://x.test/a"), vec![1.0])])
            .await
            .unwrap();

        // A second writer appends to the same on-disk collection.
        let writer = VectorCollection::open(dir.path(), "scraped_content")
            .await
            .unwrap();
        writer
            .insert_batch(vec![(doc("b", "beta", "https://x.test/b"), vec![0.5])])
            .await
            .unwrap();
        writer.close_handle().await;

        let count = collection.reload().await.unwrap();
        assert_eq!(count, 2);
    }
}

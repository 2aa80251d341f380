//! SQLite-backed vector backend.
//!
//! Embeddings are stored as little-endian `f32` blobs and scored in process.
//! The embedding space is written to `index_meta` on creation so a restart
//! with a different embedding configuration is refused.

use super::{check_batch, cosine_similarity, top_k, IndexEntry, ScoredEntry, VectorBackend};
use crate::embeddings::EmbeddingSpace;
use crate::types::{Document, DocumentMetadata};
use docqa_core::{AppError, AppResult};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

const SPACE_KEY: &str = "embedding_space";

pub struct SqliteBackend {
    path: PathBuf,
    conn: Mutex<Connection>,
    space: EmbeddingSpace,
    count: usize,
}

impl std::fmt::Debug for SqliteBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteBackend")
            .field("path", &self.path)
            .field("space", &self.space)
            .field("count", &self.count)
            .finish()
    }
}

impl SqliteBackend {
    /// Open or create the database at `path` for `space`.
    ///
    /// Existing rows are kept; the stored space must match.
    pub fn create(path: &Path, space: &EmbeddingSpace) -> AppResult<Self> {
        let conn = init_index(path)?;

        match read_space(&conn)? {
            Some(stored) => stored.validate_consistency(space)?,
            None => write_space(&conn, space)?,
        }

        let count = count_rows(&conn)?;
        Ok(Self {
            path: path.to_path_buf(),
            conn: Mutex::new(conn),
            space: space.clone(),
            count,
        })
    }

    /// Reopen a persisted index if it exists and holds at least one document.
    pub fn open_existing(path: &Path, space: &EmbeddingSpace) -> AppResult<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }

        let conn = init_index(path)?;
        let Some(stored) = read_space(&conn)? else {
            return Ok(None);
        };
        stored.validate_consistency(space)?;

        let count = count_rows(&conn)?;
        if count == 0 {
            return Ok(None);
        }

        tracing::info!(path = %path.display(), documents = count, space = %stored, "Reopened index");

        Ok(Some(Self {
            path: path.to_path_buf(),
            conn: Mutex::new(conn),
            space: stored,
            count,
        }))
    }

    fn lock(&self) -> AppResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| AppError::Storage("SQLite connection lock poisoned".to_string()))
    }
}

impl VectorBackend for SqliteBackend {
    fn name(&self) -> &str {
        "sqlite"
    }

    fn space(&self) -> &EmbeddingSpace {
        &self.space
    }

    fn add_documents(
        &mut self,
        space: &EmbeddingSpace,
        entries: Vec<IndexEntry>,
    ) -> AppResult<()> {
        check_batch(&self.space, space, &entries)?;

        let added = entries.len();
        {
            let mut conn = self.lock()?;
            let tx = conn
                .transaction()
                .map_err(|e| AppError::Storage(format!("Failed to begin transaction: {}", e)))?;

            {
                let mut stmt = tx
                    .prepare(
                        "INSERT INTO documents (page_content, metadata, embedding) VALUES (?1, ?2, ?3)",
                    )
                    .map_err(|e| AppError::Storage(format!("Failed to prepare insert: {}", e)))?;

                for entry in &entries {
                    let metadata_json = serde_json::to_string(entry.document.metadata())?;
                    stmt.execute(params![
                        entry.document.page_content(),
                        metadata_json,
                        embedding_to_bytes(&entry.embedding),
                    ])
                    .map_err(|e| AppError::Storage(format!("Failed to insert document: {}", e)))?;
                }
            }

            tx.commit()
                .map_err(|e| AppError::Storage(format!("Failed to commit documents: {}", e)))?;
        }

        self.count += added;
        tracing::debug!(added, total = self.count, "Appended documents to SQLite index");
        Ok(())
    }

    fn query(&self, embedding: &[f32], limit: usize) -> AppResult<Vec<ScoredEntry>> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare("SELECT page_content, metadata, embedding FROM documents ORDER BY id")
            .map_err(|e| AppError::Storage(format!("Failed to prepare query: {}", e)))?;

        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, Vec<u8>>(2)?,
                ))
            })
            .map_err(|e| AppError::Storage(format!("Failed to query documents: {}", e)))?;

        let mut scored = Vec::with_capacity(self.count);
        for row in rows {
            let (content, metadata_json, bytes) =
                row.map_err(|e| AppError::Storage(format!("Failed to read row: {}", e)))?;
            let metadata: DocumentMetadata = serde_json::from_str(&metadata_json)?;
            let stored = bytes_to_embedding(&bytes)?;
            let score = cosine_similarity(embedding, &stored);

            scored.push(ScoredEntry {
                document: Document::new(content, metadata),
                embedding: stored,
                score,
            });
        }

        Ok(top_k(scored, limit))
    }

    fn len(&self) -> usize {
        self.count
    }
}

/// Initialize the SQLite index database.
fn init_index(db_path: &Path) -> AppResult<Connection> {
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(|e| {
                AppError::Storage(format!("Failed to create index directory: {}", e))
            })?;
        }
    }

    let conn = Connection::open(db_path)
        .map_err(|e| AppError::Storage(format!("Failed to open SQLite index: {}", e)))?;

    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS index_meta (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS documents (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            page_content TEXT NOT NULL,
            metadata TEXT NOT NULL,
            embedding BLOB NOT NULL
        );
        "#,
    )
    .map_err(|e| AppError::Storage(format!("Failed to create tables: {}", e)))?;

    tracing::debug!("Initialized SQLite index at {:?}", db_path);
    Ok(conn)
}

fn read_space(conn: &Connection) -> AppResult<Option<EmbeddingSpace>> {
    let raw: Option<String> = conn
        .query_row(
            "SELECT value FROM index_meta WHERE key = ?1",
            params![SPACE_KEY],
            |row| row.get(0),
        )
        .optional()
        .map_err(|e| AppError::Storage(format!("Failed to read index metadata: {}", e)))?;

    raw.map(|json| serde_json::from_str(&json).map_err(AppError::from))
        .transpose()
}

fn write_space(conn: &Connection, space: &EmbeddingSpace) -> AppResult<()> {
    conn.execute(
        "INSERT OR REPLACE INTO index_meta (key, value) VALUES (?1, ?2)",
        params![SPACE_KEY, serde_json::to_string(space)?],
    )
    .map_err(|e| AppError::Storage(format!("Failed to write index metadata: {}", e)))?;
    Ok(())
}

fn count_rows(conn: &Connection) -> AppResult<usize> {
    conn.query_row("SELECT COUNT(*) FROM documents", [], |row| {
        row.get::<_, i64>(0)
    })
    .map(|n| n as usize)
    .map_err(|e| AppError::Storage(format!("Failed to count documents: {}", e)))
}

/// Convert embedding vector to bytes for storage.
fn embedding_to_bytes(embedding: &[f32]) -> Vec<u8> {
    embedding.iter().flat_map(|v| v.to_le_bytes()).collect()
}

/// Convert bytes back to embedding vector.
fn bytes_to_embedding(bytes: &[u8]) -> AppResult<Vec<f32>> {
    if bytes.len() % 4 != 0 {
        return Err(AppError::Storage(
            "Invalid embedding bytes length".to_string(),
        ));
    }

    Ok(bytes
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect())
}

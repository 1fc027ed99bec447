/*!
 * Per-document translation progress.
 *
 * Progress is keyed by the document's content hash and the target language,
 * so a renamed file resumes and an edited file starts over. Every finished
 * unit is committed in its own transaction before the in-memory view is
 * updated.
 */

use log::{debug, info};
use rusqlite::params;
use serde::Serialize;
use std::collections::HashMap;
use std::path::Path;

use super::connection::DatabaseConnection;
use crate::document::DocumentId;
use crate::errors::PersistenceError;

/// Identifies the progress of one document towards one target language
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CheckpointKey {
    pub document_id: DocumentId,
    pub target_language: String,
}

impl CheckpointKey {
    pub fn new(document_id: impl Into<String>, target_language: impl Into<String>) -> Self {
        Self {
            document_id: document_id.into(),
            target_language: target_language.into(),
        }
    }
}

/// One recorded document, as shown by `list`
#[derive(Debug, Clone, Serialize)]
pub struct CheckpointSummary {
    pub document_id: String,
    pub target_language: String,
    pub path: String,
    pub total_units: usize,
    pub completed_units: usize,
    pub updated_at: String,
}

/// Access to the checkpoint database
#[derive(Clone)]
pub struct CheckpointStore {
    db: DatabaseConnection,
}

impl CheckpointStore {
    /// Open the store at `path`, or at the default location when None
    pub fn open(path: Option<&Path>) -> Result<Self, PersistenceError> {
        let db = match path {
            Some(path) => DatabaseConnection::new(path)?,
            None => DatabaseConnection::new_default()?,
        };
        Ok(Self { db })
    }

    /// Store that lives only as long as the process
    pub fn in_memory() -> Result<Self, PersistenceError> {
        Ok(Self {
            db: DatabaseConnection::new_in_memory()?,
        })
    }

    pub fn database_path(&self) -> &Path {
        self.db.path()
    }

    /// Load prior progress for `key`, empty when there is none
    pub async fn load(&self, key: &CheckpointKey) -> Result<Checkpoint, PersistenceError> {
        let (document_id, target_language) = (key.document_id.clone(), key.target_language.clone());

        let done = self
            .db
            .execute_async(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT unit_index, translated_text FROM units
                     WHERE document_id = ?1 AND target_language = ?2",
                )?;
                let rows = stmt.query_map(params![document_id, target_language], |row| {
                    Ok((row.get::<_, i64>(0)? as usize, row.get::<_, String>(1)?))
                })?;

                let mut done = HashMap::new();
                for row in rows {
                    let (index, text) = row?;
                    done.insert(index, text);
                }
                Ok(done)
            })
            .await?;

        debug!(
            "Loaded checkpoint for {} -> {}: {} units done",
            short_id(&key.document_id),
            key.target_language,
            done.len()
        );

        Ok(Checkpoint {
            key: key.clone(),
            db: self.db.clone(),
            done,
        })
    }

    /// Record which file and how many units a key belongs to
    pub async fn register(&self, key: &CheckpointKey, path: &Path, total_units: usize) -> Result<(), PersistenceError> {
        let (document_id, target_language) = (key.document_id.clone(), key.target_language.clone());
        let path = path.display().to_string();

        self.db
            .transaction_async(move |tx| {
                tx.execute(
                    "INSERT INTO documents (document_id, target_language, path, total_units, created_at, updated_at)
                     VALUES (?1, ?2, ?3, ?4, datetime('now'), datetime('now'))
                     ON CONFLICT(document_id, target_language)
                     DO UPDATE SET path = excluded.path, total_units = excluded.total_units",
                    params![document_id, target_language, path, total_units as i64],
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    /// Forget all progress for `key`, returns how many units were dropped
    pub async fn reset(&self, key: &CheckpointKey) -> Result<usize, PersistenceError> {
        let (document_id, target_language) = (key.document_id.clone(), key.target_language.clone());

        let removed = self
            .db
            .transaction_async(move |tx| {
                let removed = tx.execute(
                    "DELETE FROM units WHERE document_id = ?1 AND target_language = ?2",
                    params![document_id, target_language],
                )?;
                tx.execute(
                    "DELETE FROM documents WHERE document_id = ?1 AND target_language = ?2",
                    params![document_id, target_language],
                )?;
                Ok(removed)
            })
            .await?;

        info!(
            "Reset checkpoint for {} -> {} ({} units dropped)",
            short_id(&key.document_id),
            key.target_language,
            removed
        );
        Ok(removed)
    }

    /// All recorded documents with their completed unit counts, most recent first
    pub async fn list(&self) -> Result<Vec<CheckpointSummary>, PersistenceError> {
        let summaries = self
            .db
            .execute_async(|conn| {
                let mut stmt = conn.prepare(
                    "SELECT d.document_id, d.target_language, d.path, d.total_units, d.updated_at,
                            (SELECT COUNT(*) FROM units u
                              WHERE u.document_id = d.document_id
                                AND u.target_language = d.target_language)
                     FROM documents d
                     ORDER BY d.updated_at DESC, d.path",
                )?;
                let rows = stmt.query_map([], |row| {
                    Ok(CheckpointSummary {
                        document_id: row.get(0)?,
                        target_language: row.get(1)?,
                        path: row.get(2)?,
                        total_units: row.get::<_, i64>(3)? as usize,
                        updated_at: row.get(4)?,
                        completed_units: row.get::<_, i64>(5)? as usize,
                    })
                })?;

                let mut summaries = Vec::new();
                for row in rows {
                    summaries.push(row?);
                }
                Ok(summaries)
            })
            .await?;
        Ok(summaries)
    }
}

/// Progress of one document, mirrored in memory
pub struct Checkpoint {
    key: CheckpointKey,
    db: DatabaseConnection,
    done: HashMap<usize, String>,
}

impl Checkpoint {
    pub fn key(&self) -> &CheckpointKey {
        &self.key
    }

    /// Persist a finished unit; memory is only updated once the write committed
    pub async fn mark_done(&mut self, index: usize, text: &str) -> Result<(), PersistenceError> {
        let (document_id, target_language) = (self.key.document_id.clone(), self.key.target_language.clone());
        let translated = text.to_string();

        self.db
            .transaction_async(move |tx| {
                tx.execute(
                    "INSERT INTO units (document_id, target_language, unit_index, translated_text, updated_at)
                     VALUES (?1, ?2, ?3, ?4, datetime('now'))
                     ON CONFLICT(document_id, target_language, unit_index)
                     DO UPDATE SET translated_text = excluded.translated_text, updated_at = excluded.updated_at",
                    params![document_id, target_language, index as i64, translated],
                )?;
                tx.execute(
                    "UPDATE documents SET updated_at = datetime('now')
                     WHERE document_id = ?1 AND target_language = ?2",
                    params![document_id, target_language],
                )?;
                Ok(())
            })
            .await?;

        self.done.insert(index, text.to_string());
        Ok(())
    }

    pub fn is_done(&self, index: usize) -> bool {
        self.done.contains_key(&index)
    }

    pub fn translated(&self, index: usize) -> Option<&str> {
        self.done.get(&index).map(String::as_str)
    }

    pub fn completed_count(&self) -> usize {
        self.done.len()
    }
}

fn short_id(document_id: &str) -> &str {
    document_id.get(..12).unwrap_or(document_id)
}

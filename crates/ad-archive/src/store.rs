use ad_core::archive::DiffArchive;
use ad_core::error::ArchiveError;
use ad_core::types::{ArchivedScan, ScanResult};
use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, params};
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::debug;

use crate::schema;
use crate::util::{decode_diff, encode_diff, storage_error, to_rfc3339};

/// Card-keyed scan archive in SQLite. One row per card in `card_archives`,
/// one row per matched commit in `archived_commits`.
pub struct SqliteArchive {
    conn: Mutex<Connection>,
}

impl SqliteArchive {
    pub fn new(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
        }
    }

    /// Opens the database file, creating parent directories and tables.
    pub fn open(path: &Path) -> Result<Self, ArchiveError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|err| ArchiveError::Storage {
                message: format!("cannot create {}: {err}", parent.display()),
            })?;
        }
        let conn = schema::open_and_migrate(path).map_err(|err| storage_error(&err))?;
        Ok(Self::new(conn))
    }

    pub fn in_memory() -> Result<Self, ArchiveError> {
        let conn = schema::open_in_memory().map_err(|err| storage_error(&err))?;
        Ok(Self::new(conn))
    }

    fn connection(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl DiffArchive for SqliteArchive {
    fn save(&self, card_id: &str, results: Vec<ScanResult>) -> Result<ArchivedScan, ArchiveError> {
        let archived = ArchivedScan::group(card_id, results);
        let mut conn = self.connection();
        let tx = conn.transaction().map_err(|err| storage_error(&err))?;

        tx.execute("DELETE FROM archived_commits WHERE card_id = ?1", [card_id])
            .map_err(|err| storage_error(&err))?;
        tx.execute(
            "INSERT INTO card_archives (card_id, commit_count, saved_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(card_id) DO UPDATE SET commit_count = excluded.commit_count, saved_at = excluded.saved_at",
            params![
                card_id,
                i64::try_from(archived.commit_count()).unwrap_or(i64::MAX),
                to_rfc3339(&Utc::now())
            ],
        )
        .map_err(|err| storage_error(&err))?;

        {
            let mut stmt = tx
                .prepare(
                    "INSERT INTO archived_commits
                     (card_id, position, repo, sha, message, committed_at, diff_kind, diff_text)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                )
                .map_err(|err| storage_error(&err))?;
            let commits = archived.groups.iter().flat_map(|group| &group.commits);
            for (position, commit) in commits.enumerate() {
                let (kind, text) = encode_diff(&commit.diff);
                stmt.execute(params![
                    card_id,
                    i64::try_from(position).unwrap_or(i64::MAX),
                    commit.repo,
                    commit.sha,
                    commit.message,
                    commit.date,
                    kind,
                    text
                ])
                .map_err(|err| storage_error(&err))?;
            }
        }

        tx.commit().map_err(|err| storage_error(&err))?;
        debug!(card_id, commits = archived.commit_count(), "archive saved");
        Ok(archived)
    }

    fn load(&self, card_id: &str) -> Result<ArchivedScan, ArchiveError> {
        let conn = self.connection();
        let exists = conn
            .query_row(
                "SELECT 1 FROM card_archives WHERE card_id = ?1",
                [card_id],
                |_| Ok(()),
            )
            .optional()
            .map_err(|err| storage_error(&err))?;
        if exists.is_none() {
            return Err(ArchiveError::NotFound {
                card_id: card_id.to_string(),
            });
        }

        let mut stmt = conn
            .prepare(
                "SELECT repo, sha, message, committed_at, diff_kind, diff_text
                 FROM archived_commits WHERE card_id = ?1 ORDER BY position",
            )
            .map_err(|err| storage_error(&err))?;
        let rows = stmt
            .query_map([card_id], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                    row.get::<_, String>(5)?,
                ))
            })
            .map_err(|err| storage_error(&err))?;

        let mut results = Vec::new();
        for row in rows {
            let (repo, sha, message, date, kind, text) = row.map_err(|err| storage_error(&err))?;
            results.push(ScanResult {
                repo,
                sha,
                message,
                date,
                diff: decode_diff(&kind, text)?,
            });
        }
        Ok(ArchivedScan::group(card_id, results))
    }
}

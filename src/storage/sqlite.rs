//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the Storage trait.

use crate::model::{ErrorDetail, Issue, IssueKind, LinkEdge, PageRecord, Severity};
use crate::state::PageStatus;
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{Storage, StorageError, StorageResult};
use crate::storage::{RunRecord, RunStatus};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::collections::HashMap;
use std::path::Path;

const RUN_COLUMNS: &str =
    "id, seed, effective_host, started_at, finished_at, config_hash, status";

/// SQLite storage backend
pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    /// Opens (or creates) the database at `path` and applies the schema
    pub fn new(path: &Path) -> StorageResult<Self> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database
    pub fn new_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }
}

fn run_from_row(row: &Row<'_>) -> rusqlite::Result<RunRecord> {
    Ok(RunRecord {
        id: row.get(0)?,
        seed: row.get(1)?,
        effective_host: row.get(2)?,
        started_at: row.get(3)?,
        finished_at: row.get(4)?,
        config_hash: row.get(5)?,
        status: RunStatus::from_db_string(&row.get::<_, String>(6)?).unwrap_or(RunStatus::Running),
    })
}

fn parse_timestamp(value: &str) -> StorageResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| StorageError::Serialization(format!("bad timestamp '{}': {}", value, e)))
}

/// Raw `pages` row, converted into a [`PageRecord`] outside the row closure
struct PageRow {
    page_id: i64,
    url: String,
    depth: u32,
    status: String,
    status_code: Option<u16>,
    final_url: Option<String>,
    redirect_chain: String,
    content_type: Option<String>,
    title: Option<String>,
    error: Option<String>,
    attempts: u32,
    discovered_at: String,
    fetched_at: Option<String>,
}

impl PageRow {
    fn into_record(self) -> StorageResult<PageRecord> {
        let status = PageStatus::from_db_string(&self.status).ok_or_else(|| {
            StorageError::Serialization(format!("unknown page status '{}'", self.status))
        })?;
        let error: Option<ErrorDetail> = self
            .error
            .as_deref()
            .map(serde_json::from_str)
            .transpose()?;

        Ok(PageRecord {
            id: self.page_id as u64,
            url: self.url,
            depth: self.depth,
            status,
            status_code: self.status_code,
            final_url: self.final_url,
            redirect_chain: serde_json::from_str(&self.redirect_chain)?,
            content_type: self.content_type,
            title: self.title,
            error,
            attempts: self.attempts,
            discovered_at: parse_timestamp(&self.discovered_at)?,
            fetched_at: self.fetched_at.as_deref().map(parse_timestamp).transpose()?,
        })
    }
}

impl Storage for SqliteStorage {
    // ===== Run Management =====

    fn create_run(
        &mut self,
        seed: &str,
        config_hash: &str,
        started_at: DateTime<Utc>,
    ) -> StorageResult<i64> {
        self.conn.execute(
            "INSERT INTO runs (seed, started_at, config_hash, status) VALUES (?1, ?2, ?3, ?4)",
            params![
                seed,
                started_at.to_rfc3339(),
                config_hash,
                RunStatus::Running.to_db_string()
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord> {
        let sql = format!("SELECT {} FROM runs WHERE id = ?1", RUN_COLUMNS);
        self.conn
            .query_row(&sql, params![run_id], run_from_row)
            .optional()?
            .ok_or(StorageError::RunNotFound(run_id))
    }

    fn get_latest_run(&self) -> StorageResult<Option<RunRecord>> {
        let sql = format!("SELECT {} FROM runs ORDER BY id DESC LIMIT 1", RUN_COLUMNS);
        Ok(self.conn.query_row(&sql, [], run_from_row).optional()?)
    }

    fn complete_run(
        &mut self,
        run_id: i64,
        status: RunStatus,
        effective_host: &str,
        finished_at: DateTime<Utc>,
    ) -> StorageResult<()> {
        let updated = self.conn.execute(
            "UPDATE runs SET status = ?1, effective_host = ?2, finished_at = ?3 WHERE id = ?4",
            params![
                status.to_db_string(),
                effective_host,
                finished_at.to_rfc3339(),
                run_id
            ],
        )?;
        if updated == 0 {
            return Err(StorageError::RunNotFound(run_id));
        }
        Ok(())
    }

    // ===== Run Contents =====

    fn save_pages(&mut self, run_id: i64, pages: &[PageRecord]) -> StorageResult<()> {
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO pages (run_id, page_id, url, depth, status, status_code, final_url,
                 redirect_chain, content_type, title, error, attempts, discovered_at, fetched_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
            )?;

            for page in pages {
                let chain = serde_json::to_string(&page.redirect_chain)?;
                let error = page.error.as_ref().map(serde_json::to_string).transpose()?;
                stmt.execute(params![
                    run_id,
                    page.id as i64,
                    page.url,
                    page.depth,
                    page.status.to_db_string(),
                    page.status_code,
                    page.final_url,
                    chain,
                    page.content_type,
                    page.title,
                    error,
                    page.attempts,
                    page.discovered_at.to_rfc3339(),
                    page.fetched_at.map(|t| t.to_rfc3339()),
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn save_links(&mut self, run_id: i64, links: &[LinkEdge]) -> StorageResult<()> {
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO links (run_id, source_url, target_url) VALUES (?1, ?2, ?3)",
            )?;
            for link in links {
                stmt.execute(params![run_id, link.source, link.target])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn save_issues(&mut self, run_id: i64, issues: &[Issue]) -> StorageResult<()> {
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO issues (run_id, position, url, kind, severity, description,
                 source_url, evidence, discovery)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            )?;
            for (position, issue) in issues.iter().enumerate() {
                stmt.execute(params![
                    run_id,
                    position as i64,
                    issue.url,
                    issue.kind.to_db_string(),
                    issue.severity.to_db_string(),
                    issue.description,
                    issue.source_url,
                    issue.evidence,
                    issue.discovery as i64,
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn load_pages(&self, run_id: i64) -> StorageResult<Vec<PageRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT page_id, url, depth, status, status_code, final_url, redirect_chain,
             content_type, title, error, attempts, discovered_at, fetched_at
             FROM pages WHERE run_id = ?1 ORDER BY page_id",
        )?;

        let rows = stmt
            .query_map(params![run_id], |row| {
                Ok(PageRow {
                    page_id: row.get(0)?,
                    url: row.get(1)?,
                    depth: row.get(2)?,
                    status: row.get(3)?,
                    status_code: row.get(4)?,
                    final_url: row.get(5)?,
                    redirect_chain: row.get(6)?,
                    content_type: row.get(7)?,
                    title: row.get(8)?,
                    error: row.get(9)?,
                    attempts: row.get(10)?,
                    discovered_at: row.get(11)?,
                    fetched_at: row.get(12)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter().map(PageRow::into_record).collect()
    }

    fn load_links(&self, run_id: i64) -> StorageResult<Vec<LinkEdge>> {
        let mut stmt = self
            .conn
            .prepare("SELECT source_url, target_url FROM links WHERE run_id = ?1 ORDER BY id")?;

        let links = stmt
            .query_map(params![run_id], |row| {
                Ok(LinkEdge {
                    source: row.get(0)?,
                    target: row.get(1)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(links)
    }

    fn load_issues(&self, run_id: i64) -> StorageResult<Vec<Issue>> {
        let mut stmt = self.conn.prepare(
            "SELECT url, kind, severity, description, source_url, evidence, discovery
             FROM issues WHERE run_id = ?1 ORDER BY position",
        )?;

        let rows = stmt
            .query_map(params![run_id], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, Option<String>>(4)?,
                    row.get::<_, Option<String>>(5)?,
                    row.get::<_, i64>(6)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(
                |(url, kind, severity, description, source_url, evidence, discovery)| {
                    let kind = IssueKind::from_db_string(&kind).ok_or_else(|| {
                        StorageError::Serialization(format!("unknown issue kind '{}'", kind))
                    })?;
                    let severity = Severity::from_db_string(&severity).ok_or_else(|| {
                        StorageError::Serialization(format!("unknown severity '{}'", severity))
                    })?;
                    Ok(Issue {
                        url,
                        kind,
                        severity,
                        description,
                        source_url,
                        evidence,
                        discovery: discovery as u64,
                    })
                },
            )
            .collect()
    }

    // ===== Statistics =====

    fn count_pages_by_status(&self, run_id: i64, status: PageStatus) -> StorageResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM pages WHERE run_id = ?1 AND status = ?2",
            params![run_id, status.to_db_string()],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    fn count_total_pages(&self, run_id: i64) -> StorageResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM pages WHERE run_id = ?1",
            params![run_id],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    fn count_issues_by_severity(&self, run_id: i64) -> StorageResult<HashMap<Severity, u64>> {
        let mut stmt = self
            .conn
            .prepare("SELECT severity, COUNT(*) FROM issues WHERE run_id = ?1 GROUP BY severity")?;

        let rows = stmt.query_map(params![run_id], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?;

        let mut counts = HashMap::new();
        for row in rows {
            let (severity, count) = row?;
            if let Some(severity) = Severity::from_db_string(&severity) {
                counts.insert(severity, count as u64);
            }
        }

        Ok(counts)
    }

    fn count_links(&self, run_id: i64) -> StorageResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM links WHERE run_id = ?1",
            params![run_id],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }
}

//! Database schema definitions
//!
//! One database holds any number of validation runs. Every row below `runs`
//! is keyed by the run it belongs to.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- Track validation runs
CREATE TABLE IF NOT EXISTS runs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    seed TEXT NOT NULL,
    effective_host TEXT,
    started_at TEXT NOT NULL,
    finished_at TEXT,
    config_hash TEXT NOT NULL,
    status TEXT NOT NULL
);

-- One row per discovered URL, keyed by discovery ordinal
CREATE TABLE IF NOT EXISTS pages (
    run_id INTEGER NOT NULL REFERENCES runs(id),
    page_id INTEGER NOT NULL,
    url TEXT NOT NULL,
    depth INTEGER NOT NULL,
    status TEXT NOT NULL,
    status_code INTEGER,
    final_url TEXT,
    redirect_chain TEXT NOT NULL DEFAULT '[]',
    content_type TEXT,
    title TEXT,
    error TEXT,
    attempts INTEGER NOT NULL DEFAULT 0,
    discovered_at TEXT NOT NULL,
    fetched_at TEXT,
    PRIMARY KEY (run_id, page_id),
    UNIQUE (run_id, url)
);

CREATE INDEX IF NOT EXISTS idx_pages_status ON pages(run_id, status);

-- Internal link graph
CREATE TABLE IF NOT EXISTS links (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    run_id INTEGER NOT NULL REFERENCES runs(id),
    source_url TEXT NOT NULL,
    target_url TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_links_target ON links(run_id, target_url);

-- Finalized issues; position preserves the aggregated order
CREATE TABLE IF NOT EXISTS issues (
    run_id INTEGER NOT NULL REFERENCES runs(id),
    position INTEGER NOT NULL,
    url TEXT NOT NULL,
    kind TEXT NOT NULL,
    severity TEXT NOT NULL,
    description TEXT NOT NULL,
    source_url TEXT,
    evidence TEXT,
    discovery INTEGER NOT NULL,
    PRIMARY KEY (run_id, position)
);

CREATE INDEX IF NOT EXISTS idx_issues_severity ON issues(run_id, severity);
"#;

/// Initializes the database schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}

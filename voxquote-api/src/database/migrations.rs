use rusqlite::Connection;

/// Run all database migrations
pub fn run_migrations(conn: &Connection) -> anyhow::Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS intakes (
            id VARCHAR PRIMARY KEY,
            transcript_text VARCHAR NOT NULL,
            stage VARCHAR NOT NULL DEFAULT 'recorded' CHECK (stage IN (
                'recorded', 'transcribing', 'transcribed', 'extracting',
                'extract_done', 'needs_user_review', 'draft_started',
                'draft_done', 'failed'
            )),
            extraction_json VARCHAR,
            user_corrections_json VARCHAR,
            error_message VARCHAR,
            created_at BIGINT NOT NULL,
            updated_at BIGINT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_intakes_stage
            ON intakes(stage, updated_at)",
        [],
    )?;

    // intake_id is UNIQUE: one generation job per intake, ever
    conn.execute(
        "CREATE TABLE IF NOT EXISTS generation_jobs (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            intake_id VARCHAR NOT NULL UNIQUE,
            status VARCHAR NOT NULL DEFAULT 'running' CHECK (status IN ('running', 'complete', 'failed')),
            current_step VARCHAR,
            progress_percent INTEGER NOT NULL DEFAULT 0,
            steps_completed VARCHAR NOT NULL DEFAULT '[]',
            error_message VARCHAR,
            created_at BIGINT NOT NULL,
            updated_at BIGINT NOT NULL,
            FOREIGN KEY (intake_id) REFERENCES intakes (id)
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_generation_jobs_status
            ON generation_jobs(status, updated_at)",
        [],
    )?;

    Ok(())
}

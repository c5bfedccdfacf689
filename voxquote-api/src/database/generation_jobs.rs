use crate::database::AsyncDbConnection;
use anyhow::Result;
use rusqlite::{params, OptionalExtension, Row};
use shared_types::{GenerationJob, GenerationJobStatus};
use uuid::Uuid;

fn map_job(row: &Row) -> rusqlite::Result<GenerationJob> {
    let intake_id_str: String = row.get(1)?;
    let intake_id = Uuid::parse_str(&intake_id_str).unwrap_or_default();

    let status_str: String = row.get(2)?;
    let status = GenerationJobStatus::parse(&status_str).unwrap_or(GenerationJobStatus::Running);

    let steps_json: String = row.get(5)?;
    let steps_completed: Vec<String> = serde_json::from_str(&steps_json).unwrap_or_default();

    Ok(GenerationJob {
        id: row.get(0)?,
        intake_id,
        status,
        current_step: row.get(3)?,
        progress_percent: row.get::<_, i64>(4)? as u8,
        steps_completed,
        error_message: row.get(6)?,
        created_at: row.get(7)?,
        updated_at: row.get(8)?,
    })
}

const JOB_COLUMNS: &str = "id, intake_id, status, current_step, progress_percent,
    steps_completed, error_message, created_at, updated_at";

pub async fn get_job_by_intake(
    conn: AsyncDbConnection,
    intake_id: Uuid,
) -> Result<Option<GenerationJob>> {
    let conn = conn.lock().await;

    let mut stmt = conn.prepare(&format!(
        "SELECT {JOB_COLUMNS} FROM generation_jobs WHERE intake_id = ?"
    ))?;

    let job = stmt
        .query_row([intake_id.to_string()], map_job)
        .optional()?;

    Ok(job)
}

/// Fetch the single job row for an intake, creating it when absent.
/// Lookup precedes insert, and the UNIQUE constraint on intake_id is the
/// backstop against a racing creator: on a constraint failure the row
/// written by the other side is returned instead.
pub async fn get_or_create_job(
    conn: AsyncDbConnection,
    intake_id: Uuid,
) -> Result<GenerationJob> {
    if let Some(job) = get_job_by_intake(conn.clone(), intake_id).await? {
        return Ok(job);
    }

    let now = chrono::Utc::now().timestamp();
    let inserted = {
        let locked = conn.lock().await;
        locked.execute(
            "INSERT INTO generation_jobs (intake_id, status, progress_percent, created_at, updated_at)
             VALUES (?1, 'running', 0, ?2, ?3)",
            params![intake_id.to_string(), now, now],
        )
    };

    match inserted {
        Ok(_) => {}
        Err(rusqlite::Error::SqliteFailure(e, _))
            if e.code == rusqlite::ErrorCode::ConstraintViolation => {}
        Err(e) => return Err(e.into()),
    }

    get_job_by_intake(conn, intake_id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("generation job vanished after insert"))
}

/// Record a completed step. Progress is monotonic: a replayed or
/// out-of-order step never moves the bar backwards, and a step already
/// in steps_completed is not appended again.
pub async fn advance_progress(
    conn: AsyncDbConnection,
    job_id: i64,
    step: &str,
    percent: u8,
) -> Result<GenerationJob> {
    let job = get_job(conn.clone(), job_id).await?;

    let new_percent = job.progress_percent.max(percent);
    let mut steps = job.steps_completed.clone();
    if !steps.iter().any(|s| s == step) {
        steps.push(step.to_string());
    }

    {
        let conn = conn.lock().await;
        let now = chrono::Utc::now().timestamp();

        conn.execute(
            "UPDATE generation_jobs
             SET current_step = ?1, progress_percent = ?2, steps_completed = ?3, updated_at = ?4
             WHERE id = ?5",
            params![
                step,
                new_percent as i64,
                serde_json::to_string(&steps)?,
                now,
                job_id
            ],
        )?;
    }

    get_job(conn, job_id).await
}

pub async fn mark_complete(conn: AsyncDbConnection, job_id: i64) -> Result<()> {
    let conn = conn.lock().await;
    let now = chrono::Utc::now().timestamp();

    conn.execute(
        "UPDATE generation_jobs
         SET status = 'complete', progress_percent = 100, error_message = NULL, updated_at = ?1
         WHERE id = ?2",
        params![now, job_id],
    )?;

    Ok(())
}

pub async fn mark_failed(conn: AsyncDbConnection, job_id: i64, error: &str) -> Result<()> {
    let conn = conn.lock().await;
    let now = chrono::Utc::now().timestamp();

    conn.execute(
        "UPDATE generation_jobs
         SET status = 'failed', error_message = ?1, updated_at = ?2
         WHERE id = ?3",
        params![error, now, job_id],
    )?;

    Ok(())
}

/// Manual retry reuses the single job row: progress is wound back to
/// zero and the row is set running again.
pub async fn reset_for_retry(conn: AsyncDbConnection, job_id: i64) -> Result<GenerationJob> {
    {
        let conn = conn.lock().await;
        let now = chrono::Utc::now().timestamp();

        conn.execute(
            "UPDATE generation_jobs
             SET status = 'running', current_step = NULL, progress_percent = 0,
                 steps_completed = '[]', error_message = NULL, updated_at = ?1
             WHERE id = ?2",
            params![now, job_id],
        )?;
    }

    get_job(conn, job_id).await
}

async fn get_job(conn: AsyncDbConnection, job_id: i64) -> Result<GenerationJob> {
    let conn = conn.lock().await;

    let mut stmt = conn.prepare(&format!(
        "SELECT {JOB_COLUMNS} FROM generation_jobs WHERE id = ?"
    ))?;

    stmt.query_row([job_id], map_job)
        .map_err(|e| anyhow::anyhow!("generation job {job_id} not found: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::{intakes, Database};
    use tempfile::TempDir;

    async fn seeded() -> (TempDir, AsyncDbConnection, Uuid) {
        let dir = TempDir::new().unwrap();
        let db = Database::new(&dir.path().join("test.sqlite3")).unwrap();
        let conn = db.async_connection.clone();
        let intake = intakes::insert_intake(conn.clone(), "fence").await.unwrap();
        (dir, conn, intake.id)
    }

    #[tokio::test]
    async fn get_or_create_returns_the_same_row() {
        let (_dir, conn, intake_id) = seeded().await;

        let first = get_or_create_job(conn.clone(), intake_id).await.unwrap();
        let second = get_or_create_job(conn, intake_id).await.unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(first.status, GenerationJobStatus::Running);
    }

    #[tokio::test]
    async fn progress_is_monotonic_and_steps_do_not_duplicate() {
        let (_dir, conn, intake_id) = seeded().await;
        let job = get_or_create_job(conn.clone(), intake_id).await.unwrap();

        advance_progress(conn.clone(), job.id, "customer", 34).await.unwrap();
        // Replaying an earlier step must not move the bar backwards
        let after = advance_progress(conn.clone(), job.id, "location", 17)
            .await
            .unwrap();
        assert_eq!(after.progress_percent, 34);

        let again = advance_progress(conn, job.id, "customer", 34).await.unwrap();
        assert_eq!(
            again
                .steps_completed
                .iter()
                .filter(|s| s.as_str() == "customer")
                .count(),
            1
        );
    }

    #[tokio::test]
    async fn reset_for_retry_reuses_the_row() {
        let (_dir, conn, intake_id) = seeded().await;
        let job = get_or_create_job(conn.clone(), intake_id).await.unwrap();

        advance_progress(conn.clone(), job.id, "scope", 51).await.unwrap();
        mark_failed(conn.clone(), job.id, "backend 400").await.unwrap();

        let reset = reset_for_retry(conn.clone(), job.id).await.unwrap();
        assert_eq!(reset.id, job.id);
        assert_eq!(reset.status, GenerationJobStatus::Running);
        assert_eq!(reset.progress_percent, 0);
        assert!(reset.steps_completed.is_empty());
        assert!(reset.error_message.is_none());

        let looked_up = get_job_by_intake(conn, intake_id).await.unwrap().unwrap();
        assert_eq!(looked_up.id, job.id);
    }
}

use crate::database::AsyncDbConnection;
use anyhow::Result;
use rusqlite::{params, Row};
use shared_types::{ExtractionResult, Intake, IntakeStage, PipelineError};
use uuid::Uuid;

fn map_intake(row: &Row) -> rusqlite::Result<Intake> {
    let id_str: String = row.get(0)?;
    let id = Uuid::parse_str(&id_str).unwrap_or_default();

    let stage_str: String = row.get(2)?;
    let stage = IntakeStage::parse(&stage_str).unwrap_or(IntakeStage::Recorded);

    let extraction_json: Option<String> = row.get(3)?;
    let extraction_json = extraction_json.and_then(|s| serde_json::from_str(&s).ok());

    let user_corrections_json: Option<String> = row.get(4)?;
    let user_corrections_json = user_corrections_json.and_then(|s| serde_json::from_str(&s).ok());

    Ok(Intake {
        id,
        transcript_text: row.get(1)?,
        stage,
        status: stage.status(),
        extraction_json,
        user_corrections_json,
        error_message: row.get(5)?,
        created_at: row.get(6)?,
        updated_at: row.get(7)?,
    })
}

const INTAKE_COLUMNS: &str = "id, transcript_text, stage, extraction_json,
    user_corrections_json, error_message, created_at, updated_at";

pub async fn insert_intake(conn: AsyncDbConnection, transcript_text: &str) -> Result<Intake> {
    let conn = conn.lock().await;
    let now = chrono::Utc::now().timestamp();
    let id = Uuid::new_v4();

    // A transcript captured at creation skips straight to transcribed
    let stage = if transcript_text.trim().is_empty() {
        IntakeStage::Recorded
    } else {
        IntakeStage::Transcribed
    };

    conn.execute(
        "INSERT INTO intakes (id, transcript_text, stage, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![id.to_string(), transcript_text, stage.as_str(), now, now],
    )?;

    Ok(Intake {
        id,
        transcript_text: transcript_text.to_string(),
        stage,
        status: stage.status(),
        extraction_json: None,
        user_corrections_json: None,
        error_message: None,
        created_at: now,
        updated_at: now,
    })
}

pub async fn get_intake(conn: AsyncDbConnection, id: Uuid) -> Result<Intake> {
    let conn = conn.lock().await;

    let mut stmt = conn.prepare(&format!(
        "SELECT {INTAKE_COLUMNS} FROM intakes WHERE id = ?"
    ))?;

    stmt.query_row([id.to_string()], map_intake)
        .map_err(|_| PipelineError::IntakeNotFound(id).into())
}

pub async fn list_intakes(conn: AsyncDbConnection, limit: usize) -> Result<Vec<Intake>> {
    let conn = conn.lock().await;

    let mut stmt = conn.prepare(&format!(
        "SELECT {INTAKE_COLUMNS} FROM intakes ORDER BY created_at DESC LIMIT ?"
    ))?;

    let intakes = stmt
        .query_map([limit], map_intake)?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(intakes)
}

/// Advance the stage, enforcing the state machine. Setting the current
/// stage again is a no-op; an illegal transition is an error, never a
/// silent write.
pub async fn update_stage(conn: AsyncDbConnection, id: Uuid, next: IntakeStage) -> Result<Intake> {
    let current = get_intake(conn.clone(), id).await?;

    if current.stage == next {
        return Ok(current);
    }

    if !current.stage.can_transition_to(next) {
        return Err(PipelineError::IllegalTransition {
            from: current.stage.as_str().to_string(),
            to: next.as_str().to_string(),
        }
        .into());
    }

    set_stage_unchecked(conn.clone(), id, next).await?;
    get_intake(conn, id).await
}

/// Manual-retry edge: a failed intake may be reopened for extraction.
/// This is the only path back out of `failed`.
pub async fn reopen_for_retry(conn: AsyncDbConnection, id: Uuid) -> Result<Intake> {
    let current = get_intake(conn.clone(), id).await?;

    if current.stage != IntakeStage::Failed {
        return Err(PipelineError::IllegalTransition {
            from: current.stage.as_str().to_string(),
            to: IntakeStage::Extracting.as_str().to_string(),
        }
        .into());
    }

    {
        let conn = conn.lock().await;
        let now = chrono::Utc::now().timestamp();
        conn.execute(
            "UPDATE intakes SET stage = ?1, error_message = NULL, updated_at = ?2 WHERE id = ?3",
            params![IntakeStage::Extracting.as_str(), now, id.to_string()],
        )?;
    }

    get_intake(conn, id).await
}

async fn set_stage_unchecked(conn: AsyncDbConnection, id: Uuid, stage: IntakeStage) -> Result<()> {
    let conn = conn.lock().await;
    let now = chrono::Utc::now().timestamp();

    conn.execute(
        "UPDATE intakes SET stage = ?1, updated_at = ?2 WHERE id = ?3",
        params![stage.as_str(), now, id.to_string()],
    )?;

    Ok(())
}

/// Persist the engine's extraction and move to the post-extraction stage
/// (extract_done, or needs_user_review when the gate requires it).
pub async fn set_extraction(
    conn: AsyncDbConnection,
    id: Uuid,
    extraction: &ExtractionResult,
    next: IntakeStage,
) -> Result<Intake> {
    let current = get_intake(conn.clone(), id).await?;
    if current.stage != next && !current.stage.can_transition_to(next) {
        return Err(PipelineError::IllegalTransition {
            from: current.stage.as_str().to_string(),
            to: next.as_str().to_string(),
        }
        .into());
    }

    {
        let conn = conn.lock().await;
        let now = chrono::Utc::now().timestamp();
        let extraction_json = serde_json::to_string(extraction)?;

        conn.execute(
            "UPDATE intakes SET extraction_json = ?1, stage = ?2, updated_at = ?3 WHERE id = ?4",
            params![extraction_json, next.as_str(), now, id.to_string()],
        )?;
    }

    get_intake(conn, id).await
}

/// Persist raw user corrections on their own. Partial corrections survive
/// the user navigating away; they never imply confirmation.
pub async fn save_corrections(
    conn: AsyncDbConnection,
    id: Uuid,
    corrections: &serde_json::Value,
) -> Result<()> {
    let conn = conn.lock().await;
    let now = chrono::Utc::now().timestamp();

    conn.execute(
        "UPDATE intakes SET user_corrections_json = ?1, updated_at = ?2 WHERE id = ?3",
        params![serde_json::to_string(corrections)?, now, id.to_string()],
    )?;

    Ok(())
}

/// Persist the corrected extraction after a confirmed merge and move
/// needs_user_review back to extract_done. The raw corrections blob is
/// stored unchanged for audit.
pub async fn set_corrected_extraction(
    conn: AsyncDbConnection,
    id: Uuid,
    corrected: &ExtractionResult,
    raw_corrections: &serde_json::Value,
) -> Result<Intake> {
    let current = get_intake(conn.clone(), id).await?;
    if !current.stage.can_transition_to(IntakeStage::ExtractDone) {
        return Err(PipelineError::IllegalTransition {
            from: current.stage.as_str().to_string(),
            to: IntakeStage::ExtractDone.as_str().to_string(),
        }
        .into());
    }

    {
        let conn = conn.lock().await;
        let now = chrono::Utc::now().timestamp();

        conn.execute(
            "UPDATE intakes
             SET extraction_json = ?1, user_corrections_json = ?2, stage = ?3, updated_at = ?4
             WHERE id = ?5",
            params![
                serde_json::to_string(corrected)?,
                serde_json::to_string(raw_corrections)?,
                IntakeStage::ExtractDone.as_str(),
                now,
                id.to_string()
            ],
        )?;
    }

    get_intake(conn, id).await
}

pub async fn mark_failed(conn: AsyncDbConnection, id: Uuid, error: &str) -> Result<()> {
    let conn = conn.lock().await;
    let now = chrono::Utc::now().timestamp();

    conn.execute(
        "UPDATE intakes SET stage = 'failed', error_message = ?1, updated_at = ?2 WHERE id = ?3",
        params![error, now, id.to_string()],
    )?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::Database;
    use tempfile::TempDir;

    fn test_conn() -> (TempDir, AsyncDbConnection) {
        let dir = TempDir::new().unwrap();
        let db = Database::new(&dir.path().join("test.sqlite3")).unwrap();
        let conn = db.async_connection.clone();
        (dir, conn)
    }

    #[tokio::test]
    async fn insert_with_transcript_lands_in_transcribed() {
        let (_dir, conn) = test_conn();

        let intake = insert_intake(conn.clone(), "build a deck").await.unwrap();
        assert_eq!(intake.stage, IntakeStage::Transcribed);

        let empty = insert_intake(conn, "  ").await.unwrap();
        assert_eq!(empty.stage, IntakeStage::Recorded);
    }

    #[tokio::test]
    async fn illegal_transition_is_rejected_and_same_stage_is_a_noop() {
        let (_dir, conn) = test_conn();
        let intake = insert_intake(conn.clone(), "deck").await.unwrap();

        let err = update_stage(conn.clone(), intake.id, IntakeStage::DraftDone)
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<PipelineError>(),
            Some(PipelineError::IllegalTransition { .. })
        ));

        let same = update_stage(conn, intake.id, IntakeStage::Transcribed)
            .await
            .unwrap();
        assert_eq!(same.stage, IntakeStage::Transcribed);
    }

    #[tokio::test]
    async fn reopen_for_retry_only_applies_to_failed() {
        let (_dir, conn) = test_conn();
        let intake = insert_intake(conn.clone(), "deck").await.unwrap();

        assert!(reopen_for_retry(conn.clone(), intake.id).await.is_err());

        mark_failed(conn.clone(), intake.id, "boom").await.unwrap();
        let reopened = reopen_for_retry(conn.clone(), intake.id).await.unwrap();
        assert_eq!(reopened.stage, IntakeStage::Extracting);
        assert!(reopened.error_message.is_none());
    }

    #[tokio::test]
    async fn corrections_persist_without_touching_stage() {
        let (_dir, conn) = test_conn();
        let intake = insert_intake(conn.clone(), "deck").await.unwrap();

        let raw = serde_json::json!({"labour_0_hours": 6});
        save_corrections(conn.clone(), intake.id, &raw).await.unwrap();

        let fetched = get_intake(conn, intake.id).await.unwrap();
        assert_eq!(fetched.stage, IntakeStage::Transcribed);
        assert_eq!(fetched.user_corrections_json, Some(raw));
    }

    #[tokio::test]
    async fn missing_intake_is_not_found() {
        let (_dir, conn) = test_conn();
        let err = get_intake(conn, Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<PipelineError>(),
            Some(PipelineError::IntakeNotFound(_))
        ));
    }
}

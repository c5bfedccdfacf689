use crate::database::{generation_jobs, intakes, AsyncDbConnection};
use crate::sync::{ChangeFeed, ChangeKind};
use anyhow::Result;
use extractors::{parse_extraction, requires_review};
use shared_types::{
    Corrections, ExtractionResult, GenerationJobStatus, IntakeStage, PipelineError,
    EXTRACTION_STEPS,
};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use uuid::Uuid;
use voxquote_agents::quote_extractor::parse_response_json;
use voxquote_agents::{
    build_system_prompt, build_user_content, CompletionRequest, InferenceClient, InferenceError,
};

const MAX_ATTEMPTS: u32 = 3;

#[derive(Debug)]
pub enum ExtractionOutcome {
    /// The model ran and the result was persisted
    Completed {
        extraction: ExtractionResult,
        job_id: i64,
    },
    /// A completed job already existed; the stored result is returned
    /// without touching the model
    Replayed {
        extraction: ExtractionResult,
        job_id: i64,
    },
    /// Another task holds this intake; nothing was started
    AlreadyRunning { job_id: i64 },
}

/// Runs the extraction pipeline for an intake: one generation job per
/// intake, one inference call per attempt, progress published step by
/// step over the change feed.
///
/// Idempotency is two-layered. The in-process active set is the true
/// in-flight marker: a second caller for the same intake gets
/// [`ExtractionOutcome::AlreadyRunning`] and no second model call. The
/// UNIQUE job row makes replays cheap: a completed job returns its
/// stored result. A `running` row with no active entry is a torn
/// attempt and is resumed, never duplicated.
pub struct ExtractionManager {
    db: AsyncDbConnection,
    client: Arc<dyn InferenceClient>,
    feed: ChangeFeed,
    model: String,
    max_tokens: u32,
    /// Cosmetic delay between progress steps
    pacing: Duration,
    /// Linear backoff base for transient failures
    retry_backoff_base: Duration,
    active: Mutex<HashSet<Uuid>>,
}

impl ExtractionManager {
    pub fn new(
        db: AsyncDbConnection,
        client: Arc<dyn InferenceClient>,
        feed: ChangeFeed,
        model: String,
        max_tokens: u32,
        pacing: Duration,
        retry_backoff_base: Duration,
    ) -> Self {
        Self {
            db,
            client,
            feed,
            model,
            max_tokens,
            pacing,
            retry_backoff_base,
            active: Mutex::new(HashSet::new()),
        }
    }

    /// One attempt. Transient backend errors bubble out with the job
    /// left `running` so the retry wrapper can try again against the
    /// same row; permanent errors mark the job and intake failed here.
    pub async fn run_extraction(&self, intake_id: Uuid) -> Result<ExtractionOutcome> {
        let intake = intakes::get_intake(self.db.clone(), intake_id).await?;

        let _guard = match ActiveGuard::acquire(&self.active, intake_id) {
            Some(guard) => guard,
            None => {
                let job = generation_jobs::get_or_create_job(self.db.clone(), intake_id).await?;
                return Ok(ExtractionOutcome::AlreadyRunning { job_id: job.id });
            }
        };

        let job = generation_jobs::get_or_create_job(self.db.clone(), intake_id).await?;

        // Replay: the extraction already exists, either because the
        // draft-builder marked the job complete or because the intake has
        // moved past extraction. Never a second inference call.
        if let Some(extraction) = intake.extraction_json.clone() {
            let past_extraction = matches!(
                intake.stage,
                IntakeStage::ExtractDone
                    | IntakeStage::NeedsUserReview
                    | IntakeStage::DraftStarted
                    | IntakeStage::DraftDone
            );
            if job.status == GenerationJobStatus::Complete || past_extraction {
                tracing::info!(%intake_id, job_id = job.id, "Replaying stored extraction");
                return Ok(ExtractionOutcome::Replayed {
                    extraction,
                    job_id: job.id,
                });
            }
        }

        let job = if job.status == GenerationJobStatus::Failed {
            generation_jobs::reset_for_retry(self.db.clone(), job.id).await?
        } else {
            job
        };

        if intake.stage == IntakeStage::Failed {
            intakes::reopen_for_retry(self.db.clone(), intake_id).await?;
        } else {
            intakes::update_stage(self.db.clone(), intake_id, IntakeStage::Extracting).await?;
        }
        self.feed.publish(intake_id, ChangeKind::IntakeUpdated);
        self.feed.publish(intake_id, ChangeKind::JobUpdated);

        let prior_corrections: Option<Corrections> = intake
            .user_corrections_json
            .as_ref()
            .and_then(|v| serde_json::from_value(v.clone()).ok());

        let request = CompletionRequest {
            system: build_system_prompt(),
            user_content: build_user_content(&intake.transcript_text, prior_corrections.as_ref()),
            model: self.model.clone(),
            max_tokens: self.max_tokens,
        };

        let response = match self.client.complete(request).await {
            Ok(response) => response,
            Err(e) if e.is_transient() => {
                tracing::warn!(%intake_id, error = %e, "Transient inference failure");
                return Err(PipelineError::Transient(e.to_string()).into());
            }
            Err(e) => {
                return Err(self.fail(intake_id, job.id, &classify_backend(e)).await);
            }
        };

        let extraction = match parse_response_json(&response.content)
            .and_then(|value| parse_extraction(&value))
        {
            Ok(extraction) => extraction,
            Err(e) => {
                return Err(self.fail(intake_id, job.id, &e).await);
            }
        };

        for (step, percent) in EXTRACTION_STEPS {
            generation_jobs::advance_progress(self.db.clone(), job.id, step, *percent).await?;
            self.feed.publish(intake_id, ChangeKind::JobUpdated);
            if !self.pacing.is_zero() {
                tokio::time::sleep(self.pacing).await;
            }
        }

        let next_stage = if requires_review(&extraction) {
            IntakeStage::NeedsUserReview
        } else {
            IntakeStage::ExtractDone
        };

        // The job stays running at 100: `complete` belongs to the
        // draft-builder callback, never to the extraction engine
        intakes::set_extraction(self.db.clone(), intake_id, &extraction, next_stage).await?;
        self.feed.publish(intake_id, ChangeKind::IntakeUpdated);
        self.feed.publish(intake_id, ChangeKind::JobUpdated);

        tracing::info!(%intake_id, job_id = job.id, stage = next_stage.as_str(), "Extraction complete");

        Ok(ExtractionOutcome::Completed {
            extraction,
            job_id: job.id,
        })
    }

    /// Caller-side retry: up to three attempts, linear backoff, only
    /// transient errors re-enter. Exhaustion marks the job and intake
    /// failed so the failure is visible to observers.
    pub async fn run_extraction_with_retry(&self, intake_id: Uuid) -> Result<ExtractionOutcome> {
        let mut last_err = None;

        for attempt in 1..=MAX_ATTEMPTS {
            match self.run_extraction(intake_id).await {
                Ok(outcome) => return Ok(outcome),
                Err(e) => {
                    let transient = e
                        .downcast_ref::<PipelineError>()
                        .map(PipelineError::is_transient)
                        .unwrap_or(false);

                    if !transient {
                        return Err(e);
                    }

                    tracing::warn!(%intake_id, attempt, error = %e, "Retrying after transient failure");
                    last_err = Some(e);

                    if attempt < MAX_ATTEMPTS && !self.retry_backoff_base.is_zero() {
                        tokio::time::sleep(self.retry_backoff_base * attempt).await;
                    }
                }
            }
        }

        let err = last_err.unwrap_or_else(|| {
            PipelineError::Transient("retries exhausted".to_string()).into()
        });

        if let Some(job) = generation_jobs::get_job_by_intake(self.db.clone(), intake_id).await? {
            generation_jobs::mark_failed(self.db.clone(), job.id, &err.to_string()).await?;
        }
        intakes::mark_failed(self.db.clone(), intake_id, &err.to_string()).await?;
        self.feed.publish(intake_id, ChangeKind::IntakeUpdated);
        self.feed.publish(intake_id, ChangeKind::JobUpdated);

        Err(err)
    }

    async fn fail(&self, intake_id: Uuid, job_id: i64, error: &PipelineError) -> anyhow::Error {
        let message = error.to_string();
        tracing::error!(%intake_id, job_id, error = %message, "Extraction failed");

        if let Err(e) = generation_jobs::mark_failed(self.db.clone(), job_id, &message).await {
            tracing::error!(job_id, error = %e, "Could not mark job failed");
        }
        if let Err(e) = intakes::mark_failed(self.db.clone(), intake_id, &message).await {
            tracing::error!(%intake_id, error = %e, "Could not mark intake failed");
        }
        self.feed.publish(intake_id, ChangeKind::IntakeUpdated);
        self.feed.publish(intake_id, ChangeKind::JobUpdated);

        error.clone().into()
    }
}

fn classify_backend(e: InferenceError) -> PipelineError {
    match e {
        InferenceError::EmptyResponse => {
            PipelineError::MalformedResponse("backend returned no content".to_string())
        }
        other => PipelineError::Backend(other.to_string()),
    }
}

struct ActiveGuard<'a> {
    set: &'a Mutex<HashSet<Uuid>>,
    id: Uuid,
}

impl<'a> ActiveGuard<'a> {
    fn acquire(set: &'a Mutex<HashSet<Uuid>>, id: Uuid) -> Option<Self> {
        let mut locked = set.lock().expect("active set poisoned");
        if !locked.insert(id) {
            return None;
        }
        Some(Self { set, id })
    }
}

impl Drop for ActiveGuard<'_> {
    fn drop(&mut self) {
        if let Ok(mut locked) = self.set.lock() {
            locked.remove(&self.id);
        }
    }
}

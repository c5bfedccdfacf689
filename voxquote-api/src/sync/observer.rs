use crate::database::{intakes, AsyncDbConnection};
use crate::sync::changefeed::ChangeEvent;
use anyhow::Result;
use shared_types::IntakeStage;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::{interval, Instant};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct ObserverConfig {
    pub poll_interval: Duration,
    pub max_poll_attempts: u32,
    pub stall_timeout: Duration,
}

impl Default for ObserverConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(1000),
            max_poll_attempts: 12,
            stall_timeout: Duration::from_millis(10_000),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PipelineOutcome {
    /// Extraction finished and cleared the confidence gate
    Ready,
    /// Extraction finished but needs the user's eyes before drafting
    NeedsReview,
    Failed {
        message: String,
    },
    /// No observable progress within the stall window
    Stalled {
        has_partial_output: bool,
    },
    /// Pipeline kept moving but never settled within the poll budget
    ExhaustedPolling,
}

/// Watches one intake until its extraction pipeline settles, combining
/// two channels: a steady database poll and push events from the
/// [`crate::sync::ChangeFeed`]. Either channel alone is enough to reach
/// an outcome; push only makes it faster. A closed push channel degrades
/// the observer to polling without failing it.
pub struct PipelineObserver {
    db: AsyncDbConnection,
    config: ObserverConfig,
}

impl PipelineObserver {
    pub fn new(db: AsyncDbConnection, config: ObserverConfig) -> Self {
        Self { db, config }
    }

    pub async fn observe(
        &self,
        intake_id: Uuid,
        mut push: broadcast::Receiver<ChangeEvent>,
    ) -> Result<PipelineOutcome> {
        let mut poll = interval(self.config.poll_interval);
        // The first tick fires immediately; it does not count against
        // the attempt budget
        poll.tick().await;

        let stall = tokio::time::sleep(self.config.stall_timeout);
        tokio::pin!(stall);

        let mut attempts: u32 = 0;
        let mut push_open = true;
        let mut last_seen = self.snapshot(intake_id).await?;

        if let Some(outcome) = Self::settled(&last_seen) {
            return Ok(outcome);
        }

        loop {
            tokio::select! {
                _ = &mut stall => {
                    // Last look before declaring a stall
                    let state = self.snapshot(intake_id).await?;
                    if let Some(outcome) = Self::settled(&state) {
                        return Ok(outcome);
                    }
                    return Ok(PipelineOutcome::Stalled {
                        has_partial_output: state.has_partial_output,
                    });
                }

                _ = poll.tick() => {
                    attempts += 1;
                    let state = self.snapshot(intake_id).await?;
                    if let Some(outcome) = Self::settled(&state) {
                        return Ok(outcome);
                    }
                    if state != last_seen {
                        stall.as_mut().reset(Instant::now() + self.config.stall_timeout);
                        last_seen = state;
                    }
                    if attempts >= self.config.max_poll_attempts {
                        return Ok(PipelineOutcome::ExhaustedPolling);
                    }
                }

                event = push.recv(), if push_open => {
                    match event {
                        Ok(ev) if ev.record_id == intake_id => {
                            let state = self.snapshot(intake_id).await?;
                            if let Some(outcome) = Self::settled(&state) {
                                return Ok(outcome);
                            }
                            if state != last_seen {
                                stall.as_mut().reset(Instant::now() + self.config.stall_timeout);
                                last_seen = state;
                            }
                        }
                        Ok(_) => {}
                        // Missed events cost nothing; the row is re-read
                        Err(broadcast::error::RecvError::Lagged(_)) => {
                            let state = self.snapshot(intake_id).await?;
                            if let Some(outcome) = Self::settled(&state) {
                                return Ok(outcome);
                            }
                            if state != last_seen {
                                stall.as_mut().reset(Instant::now() + self.config.stall_timeout);
                                last_seen = state;
                            }
                        }
                        Err(broadcast::error::RecvError::Closed) => {
                            tracing::debug!(%intake_id, "push channel closed, polling only");
                            push_open = false;
                        }
                    }
                }
            }
        }
    }

    async fn snapshot(&self, intake_id: Uuid) -> Result<ObservedState> {
        let intake = intakes::get_intake(self.db.clone(), intake_id).await?;
        let job = crate::database::generation_jobs::get_job_by_intake(self.db.clone(), intake_id)
            .await?;

        Ok(ObservedState {
            stage: intake.stage,
            error_message: intake.error_message,
            has_partial_output: intake.extraction_json.is_some(),
            job_progress: job.map(|j| j.progress_percent),
        })
    }

    fn settled(state: &ObservedState) -> Option<PipelineOutcome> {
        match state.stage {
            IntakeStage::ExtractDone | IntakeStage::DraftStarted | IntakeStage::DraftDone => {
                Some(PipelineOutcome::Ready)
            }
            IntakeStage::NeedsUserReview => Some(PipelineOutcome::NeedsReview),
            IntakeStage::Failed => Some(PipelineOutcome::Failed {
                message: state
                    .error_message
                    .clone()
                    .unwrap_or_else(|| "extraction failed".to_string()),
            }),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
struct ObservedState {
    stage: IntakeStage,
    error_message: Option<String>,
    has_partial_output: bool,
    job_progress: Option<u8>,
}

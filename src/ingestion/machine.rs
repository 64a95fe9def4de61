//! Upload → poll → ready state machine
//!
//! [`IngestionController`] runs one ingestion at a time. Each run is a
//! spawned task tagged with a generation number; starting a new upload bumps
//! the generation, cancels the previous token and aborts its task, so a late
//! response from a superseded run can never change the published state.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use super::cancel::{CancellationRegistry, CancellationToken};
use super::types::{
    FailureReason, IngestionError, IngestionState, IngestionTask, TaskStatus, DEFAULT_POLL_INTERVAL,
    DEFAULT_POLL_TIMEOUT,
};
use crate::backend::{DocumentBackend, DocumentDescriptor};

/// Leading bytes of every PDF file
const PDF_MAGIC: &[u8] = b"%PDF";

/// Polling cadence and ceiling
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSettings {
    pub interval: Duration,
    pub timeout: Duration,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            timeout: DEFAULT_POLL_TIMEOUT,
        }
    }
}

/// Reject anything that is not a PDF before it is sent anywhere
pub fn validate_upload(file_name: &str, bytes: &[u8]) -> Result<(), IngestionError> {
    let guessed = mime_guess::from_path(file_name).first_or_octet_stream();
    if guessed != mime_guess::mime::APPLICATION_PDF {
        return Err(IngestionError::Validation(format!(
            "{} is not a PDF file (detected {})",
            file_name, guessed
        )));
    }
    if !bytes.starts_with(PDF_MAGIC) {
        return Err(IngestionError::Validation(format!(
            "{} does not contain PDF data",
            file_name
        )));
    }
    Ok(())
}

/// Poll a task until it reaches a terminal status, then fetch the document.
///
/// Polls are strictly sequential: the next sleep starts only after the
/// previous response resolved. The whole loop, including the final fetch,
/// is bounded by `deadline`. `on_status` sees every non-terminal status.
pub async fn poll_until_ready<F>(
    backend: &dyn DocumentBackend,
    task: &IngestionTask,
    interval: Duration,
    deadline: Instant,
    timeout: Duration,
    token: &CancellationToken,
    mut on_status: F,
) -> Result<DocumentDescriptor, IngestionError>
where
    F: FnMut(TaskStatus),
{
    let polling = async {
        loop {
            tokio::time::sleep(interval).await;

            let report = backend.task_status(&task.task_id).await?;
            tracing::debug!(task_id = %task.task_id, status = %report.status, "Polled task");

            match report.status {
                TaskStatus::Success => {
                    let document = backend.fetch_document(&task.document_id).await?;
                    return Ok::<_, IngestionError>(document);
                }
                TaskStatus::Failure => {
                    return Err(IngestionError::ProcessingFailed(report.error));
                }
                status => on_status(status),
            }
        }
    };

    tokio::select! {
        biased;
        _ = token.cancelled() => Err(IngestionError::Cancelled),
        result = tokio::time::timeout_at(deadline, polling) => match result {
            Ok(outcome) => outcome,
            Err(_) => Err(IngestionError::TimedOut(timeout.as_secs())),
        },
    }
}

/// State shared with spawned runs
struct Shared {
    state: watch::Sender<IngestionState>,
    generation: AtomicU64,
}

impl Shared {
    /// Publish `next` if `generation` is still current and the move is legal
    fn transition(&self, generation: u64, next: IngestionState) -> Result<(), IngestionError> {
        let mut outcome = Ok(());
        self.state.send_if_modified(|state| {
            if self.generation.load(Ordering::Acquire) != generation {
                outcome = Err(IngestionError::Cancelled);
                return false;
            }
            if !state.can_transition_to(&next) {
                outcome = Err(IngestionError::InvalidTransition {
                    from: state.name(),
                    to: next.name(),
                });
                return false;
            }
            tracing::info!(generation, from = state.name(), to = next.name(), "Ingestion transition");
            *state = next;
            true
        });
        outcome
    }
}

struct ActiveRun {
    generation: u64,
    token: CancellationToken,
    handle: JoinHandle<()>,
}

/// Drives uploads through processing to a ready document
pub struct IngestionController {
    backend: Arc<dyn DocumentBackend>,
    settings: PollSettings,
    shared: Arc<Shared>,
    registry: Arc<CancellationRegistry>,
    active: Mutex<Option<ActiveRun>>,
}

impl IngestionController {
    pub fn new(backend: Arc<dyn DocumentBackend>, settings: PollSettings) -> Self {
        let (state, _) = watch::channel(IngestionState::Idle);
        Self {
            backend,
            settings,
            shared: Arc::new(Shared {
                state,
                generation: AtomicU64::new(0),
            }),
            registry: Arc::new(CancellationRegistry::new()),
            active: Mutex::new(None),
        }
    }

    pub fn state(&self) -> IngestionState {
        self.shared.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<IngestionState> {
        self.shared.state.subscribe()
    }

    pub fn settings(&self) -> PollSettings {
        self.settings
    }

    /// Number of polling loops currently registered
    pub fn active_polls(&self) -> usize {
        self.registry.active()
    }

    /// Validate and start ingesting a file, superseding any run in flight.
    ///
    /// Returns the run's generation. A file that fails validation leaves the
    /// state untouched.
    pub fn start(&self, file_name: &str, bytes: Vec<u8>) -> Result<u64, IngestionError> {
        validate_upload(file_name, &bytes)?;

        let mut active = self.active.lock();
        if let Some(previous) = active.take() {
            tracing::info!(generation = previous.generation, "Superseding ingestion run");
            previous.token.cancel();
            previous.handle.abort();
            self.registry.cancel_all();
        }

        let generation = self.shared.generation.fetch_add(1, Ordering::AcqRel) + 1;
        self.shared.transition(
            generation,
            IngestionState::Uploading {
                file_name: file_name.to_string(),
            },
        )?;

        let token = CancellationToken::new();
        let handle = tokio::spawn(run(
            Arc::clone(&self.backend),
            Arc::clone(&self.shared),
            Arc::clone(&self.registry),
            self.settings,
            generation,
            token.clone(),
            file_name.to_string(),
            bytes,
        ));
        *active = Some(ActiveRun {
            generation,
            token,
            handle,
        });
        Ok(generation)
    }

    /// Start ingesting and wait for the outcome
    pub async fn ingest(&self, file_name: &str, bytes: Vec<u8>) -> Result<DocumentDescriptor, IngestionError> {
        let mut rx = self.subscribe();
        let generation = self.start(file_name, bytes)?;
        let state = rx
            .wait_for(|s| s.is_terminal() || *s == IngestionState::Idle)
            .await
            .map_err(|_| IngestionError::Cancelled)?
            .clone();
        if self.shared.generation.load(Ordering::Acquire) != generation {
            return Err(IngestionError::Cancelled);
        }
        match state {
            IngestionState::Ready(document) => Ok(document),
            IngestionState::Failed(reason) => Err(reason.into()),
            _ => Err(IngestionError::Cancelled),
        }
    }

    /// Stop the current run and return to `Idle` (document switch)
    pub fn cancel(&self) {
        if let Some(previous) = self.active.lock().take() {
            previous.token.cancel();
            previous.handle.abort();
        }
        self.registry.cancel_all();
        let generation = self.shared.generation.fetch_add(1, Ordering::AcqRel) + 1;
        // Idle is reachable from every state
        let _ = self.shared.transition(generation, IngestionState::Idle);
    }
}

impl Drop for IngestionController {
    fn drop(&mut self) {
        if let Some(active) = self.active.get_mut().take() {
            active.token.cancel();
            active.handle.abort();
        }
    }
}

#[allow(clippy::too_many_arguments)]
async fn run(
    backend: Arc<dyn DocumentBackend>,
    shared: Arc<Shared>,
    registry: Arc<CancellationRegistry>,
    settings: PollSettings,
    generation: u64,
    token: CancellationToken,
    file_name: String,
    bytes: Vec<u8>,
) {
    let upload = tokio::select! {
        biased;
        _ = token.cancelled() => return,
        result = backend.upload(&file_name, bytes) => result,
    };

    let receipt = match upload {
        Ok(receipt) => receipt,
        Err(e) => {
            tracing::warn!(file_name = %file_name, error = %e, "Upload failed");
            let _ = shared.transition(generation, IngestionState::Failed(FailureReason::Transport(e.to_string())));
            return;
        }
    };

    let mut task = IngestionTask::new(receipt.task_id, receipt.document_id);
    if shared
        .transition(generation, IngestionState::Processing(task.clone()))
        .is_err()
    {
        return;
    }
    tracing::info!(task_id = %task.task_id, document_id = %task.document_id, "Processing started");

    let poll_token = registry.register(&task.task_id);
    let polled = task.clone();
    let deadline = Instant::now() + settings.timeout;
    let outcome = tokio::select! {
        biased;
        _ = token.cancelled() => Err(IngestionError::Cancelled),
        outcome = poll_until_ready(
            backend.as_ref(),
            &polled,
            settings.interval,
            deadline,
            settings.timeout,
            &poll_token,
            |status| {
                if status != task.status {
                    task.status = status;
                    let _ = shared.transition(generation, IngestionState::Processing(task.clone()));
                }
            },
        ) => outcome,
    };
    registry.unregister(&task.task_id);

    let next = match outcome {
        Ok(document) => {
            tracing::info!(task_id = %task.task_id, document_id = %document.id, "Document ready");
            IngestionState::Ready(document)
        }
        Err(IngestionError::Cancelled) => {
            tracing::debug!(task_id = %task.task_id, "Polling cancelled");
            return;
        }
        Err(e) => {
            tracing::warn!(task_id = %task.task_id, error = %e, "Ingestion failed");
            IngestionState::Failed(failure_reason(e))
        }
    };
    let _ = shared.transition(generation, next);
}

fn failure_reason(error: IngestionError) -> FailureReason {
    match error {
        IngestionError::ProcessingFailed(detail) => FailureReason::Processing(detail),
        IngestionError::TimedOut(seconds) => FailureReason::TimedOut { seconds },
        other => FailureReason::Transport(other.to_string()),
    }
}

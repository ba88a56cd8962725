use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use axum::http::StatusCode;
use career_intake::error::AppError;
use career_intake::intake::{
    ApplicationPayload, ApplicationRecord, ApplicationRepository, ApplicationWorkflow,
    EmailAddress, FinalResumeRef, NewApplication, Notification, Notifier, NotifyError, RecordId,
    RepositoryError, ResumeOwner, ResumeStore, ResumeStoreError, StagedResumeRef,
};
use metrics_exporter_prometheus::PrometheusHandle;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};
use uuid::Uuid;

const PDF_MIME: &str = "application/pdf";

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
    pub(crate) resumes: Arc<FsResumeStore>,
}

/// Process-local durable store: one map per track, keyed by normalised email.
pub(crate) struct InMemoryApplicationRepository<P> {
    records: Mutex<HashMap<EmailAddress, ApplicationRecord<P>>>,
    sequence: AtomicU64,
}

impl<P> Default for InMemoryApplicationRepository<P> {
    fn default() -> Self {
        Self {
            records: Mutex::new(HashMap::new()),
            sequence: AtomicU64::new(1),
        }
    }
}

impl<P> InMemoryApplicationRepository<P> {
    fn records(
        &self,
    ) -> Result<MutexGuard<'_, HashMap<EmailAddress, ApplicationRecord<P>>>, RepositoryError> {
        self.records
            .lock()
            .map_err(|_| RepositoryError::Unavailable("application store lock poisoned".to_string()))
    }
}

impl<P: ApplicationPayload> ApplicationRepository<P> for InMemoryApplicationRepository<P> {
    fn exists_by_email(&self, email: &EmailAddress) -> Result<bool, RepositoryError> {
        Ok(self.records()?.contains_key(email))
    }

    fn save(&self, application: NewApplication<P>) -> Result<ApplicationRecord<P>, RepositoryError> {
        let mut guard = self.records()?;
        if guard.contains_key(&application.email) {
            return Err(RepositoryError::Conflict);
        }

        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed);
        let id = RecordId(format!("{}-{sequence:06}", P::TRACK.path_segment()));
        let record = ApplicationRecord::from_new(id, application);
        guard.insert(record.email.clone(), record.clone());
        Ok(record)
    }

    fn fetch_by_email(
        &self,
        email: &EmailAddress,
    ) -> Result<Option<ApplicationRecord<P>>, RepositoryError> {
        Ok(self.records()?.get(email).cloned())
    }
}

#[derive(Debug, thiserror::Error)]
pub(crate) enum UploadRejection {
    #[error("resume upload is empty")]
    Empty,
    #[error("only PDF resumes are allowed, got '{0}'")]
    NotPdf(String),
    #[error("resume could not be stored: {0}")]
    Storage(#[from] std::io::Error),
}

impl From<UploadRejection> for AppError {
    fn from(value: UploadRejection) -> Self {
        match value {
            UploadRejection::Storage(err) => AppError::Io(err),
            other => AppError::Io(std::io::Error::new(ErrorKind::InvalidInput, other.to_string())),
        }
    }
}

impl UploadRejection {
    pub(crate) fn status_code(&self) -> StatusCode {
        match self {
            UploadRejection::Empty | UploadRejection::NotPdf(_) => StatusCode::BAD_REQUEST,
            UploadRejection::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Resumes live in `temp_dir` while their application is pending and move to
/// `final_dir` on promotion. Staged refs are bare file names inside `temp_dir`.
///
/// One store serves every track, so it records which pending application each
/// upload is attached to.
#[derive(Debug)]
pub(crate) struct FsResumeStore {
    temp_dir: PathBuf,
    final_dir: PathBuf,
    owners: Mutex<HashMap<String, ResumeOwner>>,
}

impl FsResumeStore {
    pub(crate) fn new(temp_dir: impl Into<PathBuf>, final_dir: impl Into<PathBuf>) -> Self {
        Self {
            temp_dir: temp_dir.into(),
            final_dir: final_dir.into(),
            owners: Mutex::new(HashMap::new()),
        }
    }

    fn owners(&self) -> Result<MutexGuard<'_, HashMap<String, ResumeOwner>>, ResumeStoreError> {
        self.owners
            .lock()
            .map_err(|_| ResumeStoreError::Storage("resume owner lock poisoned".to_string()))
    }

    pub(crate) fn prepare(&self) -> std::io::Result<()> {
        fs::create_dir_all(&self.temp_dir)?;
        fs::create_dir_all(&self.final_dir)
    }

    pub(crate) fn stage_upload(
        &self,
        original_name: &str,
        bytes: &[u8],
    ) -> Result<StagedResumeRef, UploadRejection> {
        if bytes.is_empty() {
            return Err(UploadRejection::Empty);
        }
        if mime_guess::from_path(original_name).first_raw() != Some(PDF_MIME) {
            return Err(UploadRejection::NotPdf(original_name.to_string()));
        }

        let name = format!("{}_{}", Uuid::new_v4(), sanitize_file_name(original_name));
        fs::create_dir_all(&self.temp_dir)?;
        fs::write(self.temp_dir.join(&name), bytes)?;
        debug!(resume = %name, size = bytes.len(), "resume staged");
        Ok(StagedResumeRef(name))
    }
}

/// Rejects refs that could escape the upload directories.
fn checked_name(staged: &StagedResumeRef) -> Result<&str, ResumeStoreError> {
    let name = staged.0.as_str();
    let plain = !name.is_empty()
        && !name.starts_with('.')
        && !name.contains(['/', '\\']);
    if plain {
        Ok(name)
    } else {
        Err(ResumeStoreError::Missing(name.to_string()))
    }
}

pub(crate) fn sanitize_file_name(raw: &str) -> String {
    raw.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

impl ResumeStore for FsResumeStore {
    fn attach(&self, staged: &StagedResumeRef, owner: &ResumeOwner) -> Result<(), ResumeStoreError> {
        let name = checked_name(staged)?;
        let mut owners = self.owners()?;
        if !self.temp_dir.join(name).is_file() {
            return Err(ResumeStoreError::Missing(name.to_string()));
        }
        match owners.get(name) {
            Some(current) if current != owner => Err(ResumeStoreError::InUse(name.to_string())),
            _ => {
                owners.insert(name.to_string(), owner.clone());
                Ok(())
            }
        }
    }

    fn commit(&self, staged: &StagedResumeRef) -> Result<FinalResumeRef, ResumeStoreError> {
        let name = checked_name(staged)?;
        let source = self.temp_dir.join(name);
        let target = self.final_dir.join(name);

        fs::create_dir_all(&self.final_dir)
            .map_err(|err| ResumeStoreError::Storage(err.to_string()))?;

        match fs::rename(&source, &target) {
            Ok(()) => {}
            // Already moved by an earlier attempt.
            Err(err) if err.kind() == ErrorKind::NotFound && target.is_file() => {}
            Err(err) if err.kind() == ErrorKind::NotFound => {
                return Err(ResumeStoreError::Missing(name.to_string()));
            }
            Err(err) => return Err(ResumeStoreError::Storage(err.to_string())),
        }
        self.owners()?.remove(name);

        Ok(FinalResumeRef(target.display().to_string()))
    }

    fn discard(&self, staged: &StagedResumeRef) -> Result<(), ResumeStoreError> {
        let name = checked_name(staged)?;
        let mut owners = self.owners()?;
        match fs::remove_file(self.temp_dir.join(name)) {
            Ok(()) => {}
            Err(err) if err.kind() == ErrorKind::NotFound => {}
            Err(err) => return Err(ResumeStoreError::Storage(err.to_string())),
        }
        owners.remove(name);
        Ok(())
    }
}

/// Stands in for a mail transport: logs each delivery and keeps it in an outbox.
#[derive(Default)]
pub(crate) struct OutboxNotifier {
    outbox: Mutex<Vec<Notification>>,
}

impl OutboxNotifier {
    pub(crate) fn sent(&self) -> Vec<Notification> {
        self.outbox
            .lock()
            .map(|outbox| outbox.clone())
            .unwrap_or_default()
    }
}

impl Notifier for OutboxNotifier {
    fn send(&self, notification: Notification) -> Result<(), NotifyError> {
        info!(to = %notification.to, subject = %notification.subject, "notification queued");
        self.outbox
            .lock()
            .map_err(|_| NotifyError::Transport("outbox lock poisoned".to_string()))?
            .push(notification);
        Ok(())
    }
}

/// Periodically sweep expired drafts for one track.
pub(crate) fn spawn_reaper<P, R, S, N>(
    workflow: Arc<ApplicationWorkflow<P, R, S, N>>,
    every: Duration,
) -> JoinHandle<()>
where
    P: ApplicationPayload,
    R: ApplicationRepository<P> + 'static,
    S: ResumeStore + 'static,
    N: Notifier + 'static,
{
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let purged = workflow.purge_expired();
            debug!(track = P::TRACK.label(), purged, "reaper pass complete");
        }
    })
}

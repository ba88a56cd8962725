use std::sync::Arc;

use axum::http::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::clock::{Clock, SystemClock};
use super::code::{CodeGenerator, OsRngCodeGenerator};
use super::domain::{
    ApplicationPayload, ApplicationRecord, EmailAddress, InvalidEmail, RecordId,
    StagedResumeRef, VerificationEntry,
};
use super::notifications::{self, AssessmentLinks};
use super::promotion::{PromotionCoordinator, PromotionError};
use super::repository::{
    ApplicationRepository, Notification, Notifier, RepositoryError, ResumeOwner, ResumeStore,
    ResumeStoreError,
};
use super::staging::StagingStore;
use super::verification::{code_ttl, VerificationEngine, VerificationRejection};

/// Two-phase intake for one track: `submit` stages and mails a code, `verify` promotes.
pub struct ApplicationWorkflow<P, R, S, N> {
    store: Arc<StagingStore<P>>,
    codes: Arc<dyn CodeGenerator>,
    clock: Arc<dyn Clock>,
    verifier: VerificationEngine<P>,
    promoter: PromotionCoordinator<P, R, S>,
    repository: Arc<R>,
    resumes: Arc<S>,
    notifier: Arc<N>,
    links: AssessmentLinks,
}

impl<P, R, S, N> ApplicationWorkflow<P, R, S, N>
where
    P: ApplicationPayload,
    R: ApplicationRepository<P> + 'static,
    S: ResumeStore + 'static,
    N: Notifier + 'static,
{
    pub fn new(repository: Arc<R>, resumes: Arc<S>, notifier: Arc<N>, links: AssessmentLinks) -> Self {
        Self::with_runtime(
            repository,
            resumes,
            notifier,
            links,
            Arc::new(SystemClock),
            Arc::new(OsRngCodeGenerator),
        )
    }

    /// Build with an explicit clock and code source.
    pub fn with_runtime(
        repository: Arc<R>,
        resumes: Arc<S>,
        notifier: Arc<N>,
        links: AssessmentLinks,
        clock: Arc<dyn Clock>,
        codes: Arc<dyn CodeGenerator>,
    ) -> Self {
        let store = Arc::new(StagingStore::new());
        let verifier = VerificationEngine::new(store.clone(), clock.clone());
        let promoter = PromotionCoordinator::new(repository.clone(), resumes.clone(), clock.clone());

        Self {
            store,
            codes,
            clock,
            verifier,
            promoter,
            repository,
            resumes,
            notifier,
            links,
        }
    }

    /// Stage a draft and mail a fresh code, replacing any draft already pending for
    /// the email. The upload must be staged and not held by another application.
    pub fn submit(
        &self,
        email: &str,
        payload: P,
        resume: StagedResumeRef,
    ) -> Result<SubmitReceipt, SubmitError> {
        let email = EmailAddress::parse(email)?;
        let owner = ResumeOwner {
            track: P::TRACK,
            email: email.clone(),
        };
        self.resumes.attach(&resume, &owner).map_err(|err| {
            info!(%email, resume = %resume.0, error = %err, "submission refused");
            SubmitError::from(err)
        })?;

        let code = self.codes.issue();
        let message = notifications::verification_code(&email, &payload, &code);
        let entry = VerificationEntry {
            code,
            issued_at: self.clock.now(),
        };

        if let Some(displaced) = self.store.stage(email.clone(), payload, resume, entry) {
            self.discard_resume(&displaced);
        }
        info!(%email, track = P::TRACK.label(), "application staged, verification code issued");

        self.dispatch(message);
        Ok(SubmitReceipt::pending())
    }

    /// Check the code and, on a match, promote the staged draft.
    pub fn verify(&self, email: &str, code: &str) -> Result<VerifyReceipt, IntakeError> {
        let email = EmailAddress::parse(email).map_err(|_| IntakeError::NoPendingFlow)?;

        let verified = match self.verifier.verify(&email, code) {
            Ok(verified) => verified,
            Err(VerificationRejection::Expired { staged_resume }) => {
                if let Some(staged_resume) = staged_resume {
                    self.discard_unreferenced(&email, &staged_resume);
                }
                info!(%email, track = P::TRACK.label(), "verification attempted after expiry");
                return Err(IntakeError::Expired);
            }
            Err(rejection) => return Err(rejection.into()),
        };

        let record = match self.promoter.promote(verified) {
            Ok(record) => record,
            Err(PromotionError::DuplicateEmail { staged_resume }) => {
                self.discard_unreferenced(&email, &staged_resume);
                return Err(IntakeError::DuplicateEmail);
            }
            Err(err) => return Err(err.into()),
        };

        for message in notifications::follow_ups(&record, &self.links) {
            self.dispatch(message);
        }

        Ok(VerifyReceipt::success(&record))
    }

    /// Where `email` sits in the two-phase flow.
    pub fn state(&self, email: &str) -> Result<FlowState, IntakeError> {
        let Ok(email) = EmailAddress::parse(email) else {
            return Ok(FlowState::NoFlow);
        };
        if self.store.contains(&email) {
            return Ok(FlowState::Pending);
        }
        match self.repository.fetch_by_email(&email) {
            Ok(Some(_)) => Ok(FlowState::Terminal),
            Ok(None) => Ok(FlowState::NoFlow),
            Err(err) => Err(IntakeError::DurablePersistFailure(err)),
        }
    }

    /// Drop every expired draft and its upload. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let purged = self.store.purge_expired(self.clock.now(), code_ttl());
        for pending in &purged {
            self.discard_resume(&pending.staged_resume);
        }
        if !purged.is_empty() {
            info!(track = P::TRACK.label(), purged = purged.len(), "expired applications purged");
        }
        purged.len()
    }

    pub fn staging(&self) -> &StagingStore<P> {
        &self.store
    }

    fn discard_unreferenced(&self, email: &EmailAddress, staged: &StagedResumeRef) {
        let still_used = self
            .store
            .peek(email)
            .is_some_and(|pending| &pending.staged_resume == staged);
        if !still_used {
            self.discard_resume(staged);
        }
    }

    fn discard_resume(&self, staged: &StagedResumeRef) {
        if let Err(err) = self.resumes.discard(staged) {
            warn!(resume = %staged.0, error = %err, "failed to discard staged resume");
        }
    }

    fn dispatch(&self, message: Notification) {
        let to = message.to.clone();
        let subject = message.subject.clone();
        if let Err(err) = self.notifier.send(message) {
            warn!(%to, %subject, error = %err, "notification not delivered");
        }
    }
}

/// Position of an email in the intake state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowState {
    NoFlow,
    Pending,
    Terminal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmitStatus {
    Pending,
}

/// Response to a successful `submit`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitReceipt {
    pub status: SubmitStatus,
    pub message: String,
}

impl SubmitReceipt {
    fn pending() -> Self {
        Self {
            status: SubmitStatus::Pending,
            message: "Verification code sent to your email.".to_string(),
        }
    }
}

/// Outcome of `verify`, shaped for API responses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum VerifyReceipt {
    Success { record_id: RecordId, message: String },
    Error { kind: String, reason: String },
}

impl VerifyReceipt {
    fn success<P>(record: &ApplicationRecord<P>) -> Self {
        Self::Success {
            record_id: record.id.clone(),
            message: "Your application was submitted successfully. Check your email for next steps."
                .to_string(),
        }
    }
}

impl From<&IntakeError> for VerifyReceipt {
    fn from(err: &IntakeError) -> Self {
        Self::Error {
            kind: err.kind().to_string(),
            reason: err.reason(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SubmitError {
    #[error(transparent)]
    InvalidEmail(#[from] InvalidEmail),
    #[error("resume upload '{0}' was not found, please upload it again")]
    UnknownResume(String),
    #[error("resume upload '{0}' is already attached to another application")]
    ResumeInUse(String),
    #[error("resume upload could not be checked: {0}")]
    ResumeStorage(#[source] ResumeStoreError),
}

impl SubmitError {
    pub const fn kind(&self) -> &'static str {
        match self {
            SubmitError::InvalidEmail(_) => "invalid_email",
            SubmitError::UnknownResume(_) => "unknown_resume",
            SubmitError::ResumeInUse(_) => "resume_in_use",
            SubmitError::ResumeStorage(_) => "resume_storage_failure",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            SubmitError::InvalidEmail(_) | SubmitError::UnknownResume(_) => StatusCode::BAD_REQUEST,
            SubmitError::ResumeInUse(_) => StatusCode::CONFLICT,
            SubmitError::ResumeStorage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<ResumeStoreError> for SubmitError {
    fn from(value: ResumeStoreError) -> Self {
        match value {
            ResumeStoreError::Missing(name) => SubmitError::UnknownResume(name),
            ResumeStoreError::InUse(name) => SubmitError::ResumeInUse(name),
            other => SubmitError::ResumeStorage(other),
        }
    }
}

/// Every way `verify` can fail. None of them are fatal to the process.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IntakeError {
    #[error("no pending application found for this email")]
    NoPendingFlow,
    #[error("verification code expired")]
    Expired,
    #[error("verification code does not match")]
    CodeMismatch,
    #[error("application is already being finalised")]
    PromotionInProgress,
    #[error("an application has already been submitted with this email")]
    DuplicateEmail,
    #[error("resume could not be committed: {0}")]
    ArtifactCommitFailure(#[source] ResumeStoreError),
    #[error("application could not be saved: {0}")]
    DurablePersistFailure(#[source] RepositoryError),
}

impl IntakeError {
    pub const fn kind(&self) -> &'static str {
        match self {
            IntakeError::NoPendingFlow => "no_pending_flow",
            IntakeError::Expired => "expired",
            IntakeError::CodeMismatch => "code_mismatch",
            IntakeError::PromotionInProgress => "promotion_in_progress",
            IntakeError::DuplicateEmail => "duplicate_email",
            IntakeError::ArtifactCommitFailure(_) => "artifact_commit_failure",
            IntakeError::DurablePersistFailure(_) => "durable_persist_failure",
        }
    }

    /// Applicant-facing explanation. Storage details stay in the logs.
    pub fn reason(&self) -> String {
        match self {
            IntakeError::NoPendingFlow => {
                "No pending application found for this email. Please submit the form again."
            }
            IntakeError::Expired => {
                "Your verification code has expired. Please submit the form again."
            }
            IntakeError::CodeMismatch => "Invalid verification code. Please try again.",
            IntakeError::PromotionInProgress => {
                "Your application is already being processed. Please wait a moment."
            }
            IntakeError::DuplicateEmail => {
                "This email has already been used to submit an application."
            }
            IntakeError::ArtifactCommitFailure(_) | IntakeError::DurablePersistFailure(_) => {
                "We could not save your application. Please retry with the same code."
            }
        }
        .to_string()
    }

    /// Whether the staged draft is gone after this error.
    pub const fn clears_staging(&self) -> bool {
        matches!(self, IntakeError::Expired | IntakeError::DuplicateEmail)
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            IntakeError::NoPendingFlow => StatusCode::NOT_FOUND,
            IntakeError::Expired => StatusCode::GONE,
            IntakeError::CodeMismatch => StatusCode::BAD_REQUEST,
            IntakeError::PromotionInProgress | IntakeError::DuplicateEmail => StatusCode::CONFLICT,
            IntakeError::ArtifactCommitFailure(_) | IntakeError::DurablePersistFailure(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl From<VerificationRejection> for IntakeError {
    fn from(value: VerificationRejection) -> Self {
        match value {
            VerificationRejection::NoPendingFlow => IntakeError::NoPendingFlow,
            VerificationRejection::PromotionInProgress => IntakeError::PromotionInProgress,
            VerificationRejection::Expired { .. } => IntakeError::Expired,
            VerificationRejection::CodeMismatch => IntakeError::CodeMismatch,
        }
    }
}

impl From<PromotionError> for IntakeError {
    fn from(value: PromotionError) -> Self {
        match value {
            PromotionError::DuplicateEmail { .. } => IntakeError::DuplicateEmail,
            PromotionError::ArtifactCommit(err) => IntakeError::ArtifactCommitFailure(err),
            PromotionError::Persist(err) => IntakeError::DurablePersistFailure(err),
        }
    }
}

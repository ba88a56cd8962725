use std::marker::PhantomData;
use std::sync::Arc;

use tracing::{info, warn};

use super::clock::Clock;
use super::domain::{ApplicationPayload, ApplicationRecord, NewApplication, StagedResumeRef};
use super::repository::{
    ApplicationRepository, RepositoryError, ResumeStore, ResumeStoreError,
};
use super::staging::Settlement;
use super::verification::VerifiedFlow;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PromotionError {
    /// The flow has been cleared; `staged_resume` is no longer referenced.
    #[error("an application already exists for this email")]
    DuplicateEmail { staged_resume: StagedResumeRef },
    #[error("resume could not be committed: {0}")]
    ArtifactCommit(#[source] ResumeStoreError),
    #[error("application could not be persisted: {0}")]
    Persist(#[source] RepositoryError),
}

/// Moves a verified snapshot into durable storage, exactly once per email.
pub struct PromotionCoordinator<P, R, S> {
    repository: Arc<R>,
    resumes: Arc<S>,
    clock: Arc<dyn Clock>,
    payload: PhantomData<fn() -> P>,
}

impl<P, R, S> PromotionCoordinator<P, R, S>
where
    P: ApplicationPayload,
    R: ApplicationRepository<P>,
    S: ResumeStore,
{
    pub fn new(repository: Arc<R>, resumes: Arc<S>, clock: Arc<dyn Clock>) -> Self {
        Self {
            repository,
            resumes,
            clock,
            payload: PhantomData,
        }
    }

    /// A duplicate ends the flow; commit and persist failures release the claim so the
    /// same code can be retried until it expires. If the email was re-staged while this
    /// ran, the new flow is left alone. A panic in a collaborator releases the claim
    /// when `verified` unwinds.
    pub fn promote(
        &self,
        mut verified: VerifiedFlow<P>,
    ) -> Result<ApplicationRecord<P>, PromotionError> {
        let pending = verified.pending.clone();
        let email = pending.email.clone();

        match self.repository.exists_by_email(&email) {
            Ok(true) => {
                verified.settle(Settlement::Clear);
                info!(%email, track = P::TRACK.label(), "duplicate application rejected");
                return Err(PromotionError::DuplicateEmail {
                    staged_resume: pending.staged_resume,
                });
            }
            Ok(false) => {}
            Err(err) => {
                verified.settle(Settlement::Release);
                warn!(%email, error = %err, "uniqueness check failed");
                return Err(PromotionError::Persist(err));
            }
        }

        let resume = match self.resumes.commit(&pending.staged_resume) {
            Ok(resume) => resume,
            Err(err) => {
                verified.settle(Settlement::Release);
                warn!(%email, error = %err, "resume commit failed");
                return Err(PromotionError::ArtifactCommit(err));
            }
        };

        let application = NewApplication {
            email: email.clone(),
            track: P::TRACK,
            payload: pending.payload,
            resume,
            applied_at: self.clock.now(),
        };

        match self.repository.save(application) {
            Ok(record) => {
                verified.settle(Settlement::Clear);
                info!(%email, track = P::TRACK.label(), record_id = %record.id, "application promoted");
                Ok(record)
            }
            Err(RepositoryError::Conflict) => {
                // Lost a race with another insert for the same email.
                verified.settle(Settlement::Clear);
                info!(%email, track = P::TRACK.label(), "duplicate application rejected at save");
                Err(PromotionError::DuplicateEmail {
                    staged_resume: pending.staged_resume,
                })
            }
            Err(err) => {
                verified.settle(Settlement::Release);
                warn!(%email, error = %err, "application persist failed");
                Err(PromotionError::Persist(err))
            }
        }
    }
}

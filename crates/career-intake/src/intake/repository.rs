use serde::{Deserialize, Serialize};

use super::domain::{
    ApplicationRecord, EmailAddress, FinalResumeRef, NewApplication, StagedResumeRef, Track,
};

/// Durable storage for verified applications of one track.
pub trait ApplicationRepository<P>: Send + Sync {
    fn exists_by_email(&self, email: &EmailAddress) -> Result<bool, RepositoryError>;
    /// Persist a verified application. Implementations report a uniqueness clash as
    /// `Conflict`.
    fn save(&self, application: NewApplication<P>) -> Result<ApplicationRecord<P>, RepositoryError>;
    fn fetch_by_email(
        &self,
        email: &EmailAddress,
    ) -> Result<Option<ApplicationRecord<P>>, RepositoryError>;
}

/// Error enumeration for repository failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RepositoryError {
    #[error("record already exists")]
    Conflict,
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

/// The pending application a staged upload is attached to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResumeOwner {
    pub track: Track,
    pub email: EmailAddress,
}

/// Holds uploaded resumes between submission and verification.
///
/// Stores may be shared by several tracks, so an upload belongs to at most one owner
/// at a time.
pub trait ResumeStore: Send + Sync {
    /// Bind a staged upload to `owner`. Fails with `Missing` when no such upload is
    /// staged and with `InUse` when another owner holds it. Re-attaching to the same
    /// owner succeeds.
    fn attach(&self, staged: &StagedResumeRef, owner: &ResumeOwner) -> Result<(), ResumeStoreError>;
    /// Move a staged upload to permanent storage. Must succeed when repeated after a
    /// previous successful commit of the same ref.
    fn commit(&self, staged: &StagedResumeRef) -> Result<FinalResumeRef, ResumeStoreError>;
    /// Drop an upload that no flow references any more, releasing its owner.
    fn discard(&self, staged: &StagedResumeRef) -> Result<(), ResumeStoreError>;
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResumeStoreError {
    #[error("staged resume {0} not found")]
    Missing(String),
    #[error("staged resume {0} belongs to another application")]
    InUse(String),
    #[error("resume storage failure: {0}")]
    Storage(String),
}

/// Outbound mail hook. Delivery is fire-and-forget from the workflow's point of view.
pub trait Notifier: Send + Sync {
    fn send(&self, notification: Notification) -> Result<(), NotifyError>;
}

/// Plain-text message addressed to an applicant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub to: EmailAddress,
    pub subject: String,
    pub body: String,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NotifyError {
    #[error("mail transport unavailable: {0}")]
    Transport(String),
}

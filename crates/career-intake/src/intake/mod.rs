//! Two-phase application intake: stage a draft behind a one-time email code, then
//! promote it to durable storage once the code is confirmed.
//!
//! One engine serves every hiring track; the track-specific fields travel as an
//! [`ApplicationPayload`].

pub mod clock;
pub mod code;
pub mod domain;
pub mod notifications;
pub mod promotion;
pub mod repository;
pub mod router;
pub mod service;
pub mod staging;
pub mod verification;

#[cfg(test)]
mod tests;

pub use clock::{Clock, ManualClock, SystemClock};
pub use code::{CodeGenerator, InvalidCode, OsRngCodeGenerator, VerificationCode};
pub use domain::{
    ApplicationPayload, ApplicationRecord, CloudDeveloperApplication, DeveloperApplication,
    EmailAddress, FinalResumeRef, InternApplication, InternshipHistory, InvalidEmail,
    NewApplication, PendingApplication, RecordId, StagedResumeRef, Track, VerificationEntry,
};
pub use notifications::AssessmentLinks;
pub use promotion::{PromotionCoordinator, PromotionError};
pub use repository::{
    ApplicationRepository, Notification, Notifier, NotifyError, RepositoryError, ResumeOwner,
    ResumeStore, ResumeStoreError,
};
pub use router::{application_router, FlowStateView, SubmitRequest, VerifyRequest};
pub use service::{
    ApplicationWorkflow, FlowState, IntakeError, SubmitError, SubmitReceipt, SubmitStatus,
    VerifyReceipt,
};
pub use staging::StagingStore;
pub use verification::{
    code_ttl, VerificationEngine, VerificationRejection, VerifiedFlow, CODE_TTL_MINUTES,
};

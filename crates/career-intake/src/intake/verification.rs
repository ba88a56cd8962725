use std::sync::Arc;

use chrono::Duration;
use tracing::debug;

use super::clock::Clock;
use super::domain::{EmailAddress, PendingApplication, StagedResumeRef};
use super::staging::{Settlement, StagingStore};

/// Codes are valid for ten minutes from issuance.
pub const CODE_TTL_MINUTES: i64 = 10;

pub fn code_ttl() -> Duration {
    Duration::minutes(CODE_TTL_MINUTES)
}

/// Snapshot of a staged application whose code matched, plus the claim on its flow.
///
/// The claim is released when the ticket is dropped without being settled, so a
/// promotion that bails out early or unwinds leaves the flow open for a retry.
#[derive(Debug)]
pub struct VerifiedFlow<P> {
    pub pending: PendingApplication<P>,
    generation: u64,
    store: Arc<StagingStore<P>>,
    settled: bool,
}

impl<P> VerifiedFlow<P> {
    /// Finish the claim. Only the first settlement counts.
    pub(crate) fn settle(&mut self, settlement: Settlement) {
        if !self.settled {
            self.settled = true;
            self.store.settle(&self.pending.email, self.generation, settlement);
        }
    }
}

impl<P> Drop for VerifiedFlow<P> {
    fn drop(&mut self) {
        if !self.settled {
            debug!(email = %self.pending.email, "verification ticket dropped unsettled, claim released");
            self.settle(Settlement::Release);
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VerificationRejection {
    #[error("no pending application for this email")]
    NoPendingFlow,
    #[error("application is already being finalised")]
    PromotionInProgress,
    /// `staged_resume` is set when the flow was cleared and its upload is no longer
    /// referenced. An expired flow that is mid-promotion is left to its claim holder.
    #[error("verification code expired")]
    Expired {
        staged_resume: Option<StagedResumeRef>,
    },
    #[error("verification code does not match")]
    CodeMismatch,
}

/// Checks submitted codes against the staging store.
pub struct VerificationEngine<P> {
    store: Arc<StagingStore<P>>,
    clock: Arc<dyn Clock>,
    ttl: Duration,
}

impl<P: Clone> VerificationEngine<P> {
    pub fn new(store: Arc<StagingStore<P>>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            clock,
            ttl: code_ttl(),
        }
    }

    /// Expiry is checked first and is reported even while another request holds the
    /// claim. An unclaimed expired flow is cleared; a mismatch leaves it in place. A
    /// match claims the flow but does not clear it.
    pub fn verify(
        &self,
        email: &EmailAddress,
        submitted: &str,
    ) -> Result<VerifiedFlow<P>, VerificationRejection> {
        let now = self.clock.now();
        let mut flows = self.store.lock();

        let Some(flow) = flows.get_mut(email) else {
            return Err(VerificationRejection::NoPendingFlow);
        };

        if flow.is_expired(now, self.ttl) {
            if flow.promoting {
                return Err(VerificationRejection::Expired {
                    staged_resume: None,
                });
            }
            let staged_resume = flow.pending.staged_resume.clone();
            flows.remove(email);
            debug!(%email, "verification code expired, staged application cleared");
            return Err(VerificationRejection::Expired {
                staged_resume: Some(staged_resume),
            });
        }

        if flow.promoting {
            return Err(VerificationRejection::PromotionInProgress);
        }

        if !flow.entry.code.matches(submitted) {
            debug!(%email, "verification code mismatch");
            return Err(VerificationRejection::CodeMismatch);
        }

        flow.promoting = true;
        let pending = flow.pending.clone();
        let generation = flow.generation;
        drop(flows);

        Ok(VerifiedFlow {
            pending,
            generation,
            store: self.store.clone(),
            settled: false,
        })
    }
}

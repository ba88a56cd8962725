use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Duration, Utc};

use super::domain::{EmailAddress, PendingApplication, StagedResumeRef, VerificationEntry};

/// Draft and code for one email. Held in a single slot so neither can outlive the other.
#[derive(Debug, Clone)]
pub(crate) struct StagedFlow<P> {
    pub(crate) pending: PendingApplication<P>,
    pub(crate) entry: VerificationEntry,
    /// Bumped on every `stage`; lets a finishing promotion detect that it was overwritten.
    pub(crate) generation: u64,
    /// Set while a verified snapshot is being promoted.
    pub(crate) promoting: bool,
}

impl<P> StagedFlow<P> {
    pub(crate) fn is_expired(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        now - self.entry.issued_at > ttl
    }
}

/// What to do with a claimed flow once its promotion has finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Settlement {
    /// Flow is over: promoted or rejected as a duplicate.
    Clear,
    /// Promotion failed; the applicant may retry with the same code.
    Release,
}

/// In-memory holding area for applications awaiting email confirmation.
///
/// All per-email reads and writes go through one mutex, which is never held across
/// collaborator calls, so `stage`, verification, and settlement for an email are
/// linearized while different emails only contend for the map itself.
#[derive(Debug)]
pub struct StagingStore<P> {
    flows: Mutex<HashMap<EmailAddress, StagedFlow<P>>>,
    generations: AtomicU64,
}

impl<P> Default for StagingStore<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P> StagingStore<P> {
    pub fn new() -> Self {
        Self {
            flows: Mutex::new(HashMap::new()),
            generations: AtomicU64::new(1),
        }
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, HashMap<EmailAddress, StagedFlow<P>>> {
        self.flows.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Insert or wholesale replace the flow for `email`.
    ///
    /// Returns the displaced draft's resume when nothing else can still use it: a
    /// draft that is mid-promotion keeps its upload, as does one sharing the new ref.
    pub fn stage(
        &self,
        email: EmailAddress,
        payload: P,
        staged_resume: StagedResumeRef,
        entry: VerificationEntry,
    ) -> Option<StagedResumeRef> {
        let generation = self.generations.fetch_add(1, Ordering::Relaxed);
        let flow = StagedFlow {
            pending: PendingApplication {
                email: email.clone(),
                payload,
                staged_resume,
            },
            entry,
            generation,
            promoting: false,
        };

        let new_resume = flow.pending.staged_resume.clone();
        let displaced = self.lock().insert(email, flow)?;
        if displaced.promoting || displaced.pending.staged_resume == new_resume {
            None
        } else {
            Some(displaced.pending.staged_resume)
        }
    }

    /// Drop the flow for `email`. Clearing an absent email is a no-op.
    pub fn clear(&self, email: &EmailAddress) -> Option<PendingApplication<P>> {
        self.lock().remove(email).map(|flow| flow.pending)
    }

    pub fn contains(&self, email: &EmailAddress) -> bool {
        self.lock().contains_key(email)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Finish a claimed flow, provided it has not been re-staged since the claim.
    ///
    /// Returns the removed draft on `Clear`.
    pub(crate) fn settle(
        &self,
        email: &EmailAddress,
        generation: u64,
        settlement: Settlement,
    ) -> Option<PendingApplication<P>> {
        let mut flows = self.lock();
        let current = flows.get_mut(email)?;
        if current.generation != generation {
            return None;
        }

        match settlement {
            Settlement::Clear => flows.remove(email).map(|flow| flow.pending),
            Settlement::Release => {
                current.promoting = false;
                None
            }
        }
    }

    /// Remove every expired flow that is not mid-promotion.
    pub fn purge_expired(&self, now: DateTime<Utc>, ttl: Duration) -> Vec<PendingApplication<P>> {
        let mut flows = self.lock();
        let expired: Vec<EmailAddress> = flows
            .iter()
            .filter(|(_, flow)| !flow.promoting && flow.is_expired(now, ttl))
            .map(|(email, _)| email.clone())
            .collect();

        expired
            .into_iter()
            .filter_map(|email| flows.remove(&email))
            .map(|flow| flow.pending)
            .collect()
    }
}

impl<P: Clone> StagingStore<P> {
    pub fn peek(&self, email: &EmailAddress) -> Option<PendingApplication<P>> {
        self.lock().get(email).map(|flow| flow.pending.clone())
    }

    pub fn entry(&self, email: &EmailAddress) -> Option<VerificationEntry> {
        self.lock().get(email).map(|flow| flow.entry.clone())
    }
}

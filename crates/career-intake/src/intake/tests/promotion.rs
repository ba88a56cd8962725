use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use chrono::Duration;

use super::common::*;
use crate::intake::{
    Clock, FinalResumeRef, InternApplication, ManualClock, PromotionCoordinator, PromotionError,
    RepositoryError, ResumeStoreError, StagingStore, Track, VerificationCode, VerificationEngine,
    VerificationEntry, VerificationRejection,
};

struct Fixture {
    store: Arc<StagingStore<InternApplication>>,
    clock: Arc<ManualClock>,
    repository: Arc<MemoryRepository<InternApplication>>,
    resumes: Arc<MemoryResumes>,
    verifier: VerificationEngine<InternApplication>,
    promoter: Promoter,
}

type Promoter =
    PromotionCoordinator<InternApplication, MemoryRepository<InternApplication>, MemoryResumes>;

fn fixture() -> Fixture {
    let store = Arc::new(StagingStore::new());
    let clock = Arc::new(ManualClock::new(start_time()));
    let repository = Arc::new(MemoryRepository::default());
    let resumes = Arc::new(MemoryResumes::default());
    let verifier = VerificationEngine::new(store.clone(), clock.clone());
    let promoter = PromotionCoordinator::new(repository.clone(), resumes.clone(), clock.clone());
    Fixture {
        store,
        clock,
        repository,
        resumes,
        verifier,
        promoter,
    }
}

impl Fixture {
    fn stage(&self, address: &str, code: u32, upload: &str, domain: &str) {
        self.store.stage(
            email(address),
            intern(domain),
            resume(upload),
            VerificationEntry {
                code: VerificationCode::new(code).expect("valid code"),
                issued_at: self.clock.now(),
            },
        );
    }

    fn verify_and_promote(
        &self,
        address: &str,
        code: &str,
    ) -> Result<crate::intake::ApplicationRecord<InternApplication>, PromotionError> {
        let verified = self
            .verifier
            .verify(&email(address), code)
            .expect("code accepted");
        self.promoter.promote(verified)
    }
}

#[test]
fn promotion_commits_resume_saves_record_and_clears_flow() {
    let f = fixture();
    f.stage("a@x.com", 123_456, "r1.pdf", "Java");
    f.clock.advance(Duration::minutes(3));

    let record = f
        .verify_and_promote("a@x.com", "123456")
        .expect("promoted");

    assert_eq!(record.email, email("a@x.com"));
    assert_eq!(record.track, Track::Intern);
    assert_eq!(record.resume, FinalResumeRef("final/r1.pdf".to_string()));
    assert_eq!(record.applied_at, start_time() + Duration::minutes(3));
    assert_eq!(f.resumes.committed(), vec![resume("r1.pdf")]);
    assert_eq!(f.repository.records().len(), 1);
    assert!(!f.store.contains(&email("a@x.com")));
}

#[test]
fn duplicate_email_never_reaches_save_and_clears_flow() {
    let f = fixture();
    f.repository.seed(&email("a@x.com"), intern("Python"));
    f.stage("a@x.com", 123_456, "r1.pdf", "Java");

    let err = f
        .verify_and_promote("a@x.com", "123456")
        .expect_err("duplicate");

    assert_eq!(
        err,
        PromotionError::DuplicateEmail {
            staged_resume: resume("r1.pdf")
        }
    );
    assert_eq!(f.repository.save_calls(), 0);
    assert!(f.resumes.committed().is_empty());
    assert!(!f.store.contains(&email("a@x.com")));
}

#[test]
fn commit_failure_releases_claim_for_retry_with_same_code() {
    let f = fixture();
    f.stage("a@x.com", 123_456, "r1.pdf", "Java");
    f.resumes.fail_commits(true);

    let err = f
        .verify_and_promote("a@x.com", "123456")
        .expect_err("commit fails");
    assert_eq!(
        err,
        PromotionError::ArtifactCommit(ResumeStoreError::Storage("disk full".to_string()))
    );
    assert_eq!(f.repository.save_calls(), 0);
    assert!(f.store.contains(&email("a@x.com")));

    f.resumes.fail_commits(false);
    f.verify_and_promote("a@x.com", "123456")
        .expect("retry succeeds");
    assert_eq!(f.repository.records().len(), 1);
}

#[test]
fn persist_failure_releases_claim_for_retry() {
    let f = fixture();
    f.stage("a@x.com", 123_456, "r1.pdf", "Java");
    f.repository.fail_saves(true);

    let err = f
        .verify_and_promote("a@x.com", "123456")
        .expect_err("save fails");
    assert!(matches!(
        err,
        PromotionError::Persist(RepositoryError::Unavailable(_))
    ));
    assert!(f.store.contains(&email("a@x.com")));
    assert!(f.repository.records().is_empty());

    f.repository.fail_saves(false);
    f.verify_and_promote("a@x.com", "123456")
        .expect("retry succeeds");
    assert_eq!(f.repository.records().len(), 1);
    assert!(f.store.is_empty());
}

#[test]
fn conflict_at_save_is_reported_as_duplicate() {
    let f = fixture();
    f.stage("a@x.com", 123_456, "r1.pdf", "Java");
    f.repository.conflict_on_save(true);

    let err = f
        .verify_and_promote("a@x.com", "123456")
        .expect_err("conflict");

    assert!(matches!(err, PromotionError::DuplicateEmail { .. }));
    assert!(!f.store.contains(&email("a@x.com")));
}

#[test]
fn restage_during_promotion_survives_the_promotion() {
    let f = fixture();
    f.stage("a@x.com", 111_111, "r1.pdf", "Java");
    let verified = f
        .verifier
        .verify(&email("a@x.com"), "111111")
        .expect("code accepted");

    f.stage("a@x.com", 222_222, "r2.pdf", "Python");
    let record = f.promoter.promote(verified).expect("snapshot promoted");

    assert_eq!(record.payload.domain, "Java");
    let pending = f.store.peek(&email("a@x.com")).expect("new draft kept");
    assert_eq!(pending.payload.domain, "Python");
    assert_eq!(pending.staged_resume, resume("r2.pdf"));
}

#[test]
fn concurrent_verifications_promote_exactly_once() {
    let f = fixture();
    f.stage("a@x.com", 123_456, "r1.pdf", "Java");

    let outcomes: Vec<bool> = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..8)
            .map(|_| {
                scope.spawn(|| match f.verifier.verify(&email("a@x.com"), "123456") {
                    Ok(verified) => f.promoter.promote(verified).is_ok(),
                    Err(_) => false,
                })
            })
            .collect();
        handles
            .into_iter()
            .map(|handle| handle.join().expect("worker panicked"))
            .collect()
    });

    assert_eq!(outcomes.iter().filter(|ok| **ok).count(), 1);
    assert_eq!(f.repository.records().len(), 1);
    assert_eq!(f.repository.save_calls(), 1);
}

#[test]
fn panicking_commit_releases_the_claim_for_a_retry() {
    let f = fixture();
    f.stage("a@x.com", 123_456, "r1.pdf", "Java");
    f.resumes.panic_next_commit();

    let crashed = catch_unwind(AssertUnwindSafe(|| f.verify_and_promote("a@x.com", "123456")));
    assert!(crashed.is_err());
    assert!(f.store.contains(&email("a@x.com")));

    f.verify_and_promote("a@x.com", "123456")
        .expect("same code works after the crash");
    assert_eq!(f.repository.records().len(), 1);
    assert!(f.store.is_empty());
}

#[test]
fn flow_abandoned_by_a_crash_expires_normally() {
    let f = fixture();
    f.stage("a@x.com", 123_456, "r1.pdf", "Java");
    f.resumes.panic_next_commit();
    let crashed = catch_unwind(AssertUnwindSafe(|| f.verify_and_promote("a@x.com", "123456")));
    assert!(crashed.is_err());

    f.clock.advance(Duration::minutes(30));
    let err = f
        .verifier
        .verify(&email("a@x.com"), "123456")
        .expect_err("expired");
    assert_eq!(
        err,
        VerificationRejection::Expired {
            staged_resume: Some(resume("r1.pdf"))
        }
    );
    assert!(f.repository.records().is_empty());
}

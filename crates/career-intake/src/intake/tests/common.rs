use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use axum::response::Response;
use chrono::{DateTime, TimeZone, Utc};
use serde_json::Value;

use crate::intake::{
    ApplicationPayload, ApplicationRecord, ApplicationRepository, ApplicationWorkflow,
    AssessmentLinks, CloudDeveloperApplication, CodeGenerator, DeveloperApplication,
    EmailAddress, FinalResumeRef, InternApplication, InternshipHistory, ManualClock,
    NewApplication, Notification, Notifier, NotifyError, RecordId, RepositoryError,
    ResumeOwner, ResumeStore, ResumeStoreError, StagedResumeRef, VerificationCode,
};

pub(super) type TestWorkflow<P> =
    ApplicationWorkflow<P, MemoryRepository<P>, MemoryResumes, MemoryNotifier>;

pub(super) fn start_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0)
        .single()
        .expect("valid start time")
}

pub(super) fn email(raw: &str) -> EmailAddress {
    EmailAddress::parse(raw).expect("valid email")
}

pub(super) fn resume(name: &str) -> StagedResumeRef {
    StagedResumeRef(name.to_string())
}

pub(super) fn intern(domain: &str) -> InternApplication {
    InternApplication {
        role: "intern".to_string(),
        first_name: "Asha".to_string(),
        last_name: "Verma".to_string(),
        phone: "555-0100".to_string(),
        qualification: "B.Sc Computer Science".to_string(),
        passout_year: 2025,
        domain: domain.to_string(),
        gender: Some("female".to_string()),
    }
}

pub(super) fn developer(internship_domain: Option<&str>) -> DeveloperApplication {
    DeveloperApplication {
        role: "developer".to_string(),
        first_name: "Ravi".to_string(),
        last_name: "Kumar".to_string(),
        phone: "555-0101".to_string(),
        qualification: "B.Tech".to_string(),
        passout_year: Some(2023),
        internship: internship_domain.map(|domain| InternshipHistory {
            domain: domain.to_string(),
            company_name: "Acme Labs".to_string(),
            stipend: 15000.0,
            duration_months: 6.0,
        }),
        gender: None,
    }
}

pub(super) fn cloud_developer() -> CloudDeveloperApplication {
    CloudDeveloperApplication {
        role: "Cloud Engineer".to_string(),
        first_name: "Mei".to_string(),
        last_name: "Lin".to_string(),
        phone: "555-0102".to_string(),
        qualification: "M.Tech".to_string(),
        experience_years: 4,
        domain: "AWS".to_string(),
        company_name: Some("Skyward".to_string()),
        current_salary: 900000.0,
        expected_salary: 1200000.0,
        duration_at_company: 2.5,
        linkedin_profile: Some("https://linkedin.com/in/meilin".to_string()),
        github_profile: None,
        gender: None,
    }
}

pub(super) struct MemoryRepository<P> {
    records: Mutex<Vec<ApplicationRecord<P>>>,
    sequence: AtomicU32,
    save_calls: AtomicUsize,
    fail_saves: AtomicBool,
    conflict_on_save: AtomicBool,
}

impl<P> Default for MemoryRepository<P> {
    fn default() -> Self {
        Self {
            records: Mutex::new(Vec::new()),
            sequence: AtomicU32::new(1),
            save_calls: AtomicUsize::new(0),
            fail_saves: AtomicBool::new(false),
            conflict_on_save: AtomicBool::new(false),
        }
    }
}

impl<P: ApplicationPayload> MemoryRepository<P> {
    pub(super) fn seed(&self, email: &EmailAddress, payload: P) {
        let id = self.next_id();
        self.records
            .lock()
            .expect("repository mutex poisoned")
            .push(ApplicationRecord {
                id,
                email: email.clone(),
                track: P::TRACK,
                payload,
                resume: FinalResumeRef("seeded.pdf".to_string()),
                applied_at: start_time(),
            });
    }

    pub(super) fn records(&self) -> Vec<ApplicationRecord<P>> {
        self.records.lock().expect("repository mutex poisoned").clone()
    }

    pub(super) fn save_calls(&self) -> usize {
        self.save_calls.load(Ordering::SeqCst)
    }

    pub(super) fn fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }

    pub(super) fn conflict_on_save(&self, conflict: bool) {
        self.conflict_on_save.store(conflict, Ordering::SeqCst);
    }

    fn next_id(&self) -> RecordId {
        let id = self.sequence.fetch_add(1, Ordering::SeqCst);
        RecordId(format!("{}-{id:06}", P::TRACK.path_segment()))
    }
}

impl<P: ApplicationPayload> ApplicationRepository<P> for MemoryRepository<P> {
    fn exists_by_email(&self, email: &EmailAddress) -> Result<bool, RepositoryError> {
        let guard = self.records.lock().expect("repository mutex poisoned");
        Ok(guard.iter().any(|record| &record.email == email))
    }

    fn save(&self, application: NewApplication<P>) -> Result<ApplicationRecord<P>, RepositoryError> {
        self.save_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(RepositoryError::Unavailable("database offline".to_string()));
        }
        if self.conflict_on_save.load(Ordering::SeqCst) {
            return Err(RepositoryError::Conflict);
        }
        let record = ApplicationRecord::from_new(self.next_id(), application);
        self.records
            .lock()
            .expect("repository mutex poisoned")
            .push(record.clone());
        Ok(record)
    }

    fn fetch_by_email(
        &self,
        email: &EmailAddress,
    ) -> Result<Option<ApplicationRecord<P>>, RepositoryError> {
        let guard = self.records.lock().expect("repository mutex poisoned");
        Ok(guard.iter().find(|record| &record.email == email).cloned())
    }
}

#[derive(Default)]
pub(super) struct MemoryResumes {
    owners: Mutex<HashMap<StagedResumeRef, ResumeOwner>>,
    unknown: Mutex<Vec<StagedResumeRef>>,
    committed: Mutex<Vec<StagedResumeRef>>,
    discarded: Mutex<Vec<StagedResumeRef>>,
    fail_commits: AtomicBool,
    panic_next_commit: AtomicBool,
}

impl MemoryResumes {
    pub(super) fn committed(&self) -> Vec<StagedResumeRef> {
        self.committed.lock().expect("resume mutex poisoned").clone()
    }

    pub(super) fn discarded(&self) -> Vec<StagedResumeRef> {
        self.discarded.lock().expect("resume mutex poisoned").clone()
    }

    pub(super) fn owner_of(&self, staged: &StagedResumeRef) -> Option<ResumeOwner> {
        self.owners
            .lock()
            .expect("resume mutex poisoned")
            .get(staged)
            .cloned()
    }

    pub(super) fn fail_commits(&self, fail: bool) {
        self.fail_commits.store(fail, Ordering::SeqCst);
    }

    pub(super) fn panic_next_commit(&self) {
        self.panic_next_commit.store(true, Ordering::SeqCst);
    }

    /// Pretend `staged` was never uploaded.
    pub(super) fn forget_upload(&self, staged: &StagedResumeRef) {
        self.unknown
            .lock()
            .expect("resume mutex poisoned")
            .push(staged.clone());
    }
}

impl ResumeStore for MemoryResumes {
    fn attach(&self, staged: &StagedResumeRef, owner: &ResumeOwner) -> Result<(), ResumeStoreError> {
        if self
            .unknown
            .lock()
            .expect("resume mutex poisoned")
            .contains(staged)
        {
            return Err(ResumeStoreError::Missing(staged.0.clone()));
        }
        let mut owners = self.owners.lock().expect("resume mutex poisoned");
        match owners.get(staged) {
            Some(current) if current != owner => Err(ResumeStoreError::InUse(staged.0.clone())),
            _ => {
                owners.insert(staged.clone(), owner.clone());
                Ok(())
            }
        }
    }

    fn commit(&self, staged: &StagedResumeRef) -> Result<FinalResumeRef, ResumeStoreError> {
        if self.panic_next_commit.swap(false, Ordering::SeqCst) {
            panic!("resume store crashed mid-commit");
        }
        if self.fail_commits.load(Ordering::SeqCst) {
            return Err(ResumeStoreError::Storage("disk full".to_string()));
        }
        self.owners
            .lock()
            .expect("resume mutex poisoned")
            .remove(staged);
        self.committed
            .lock()
            .expect("resume mutex poisoned")
            .push(staged.clone());
        Ok(FinalResumeRef(format!("final/{}", staged.0)))
    }

    fn discard(&self, staged: &StagedResumeRef) -> Result<(), ResumeStoreError> {
        self.owners
            .lock()
            .expect("resume mutex poisoned")
            .remove(staged);
        self.discarded
            .lock()
            .expect("resume mutex poisoned")
            .push(staged.clone());
        Ok(())
    }
}

#[derive(Default)]
pub(super) struct MemoryNotifier {
    sent: Mutex<Vec<Notification>>,
    offline: AtomicBool,
}

impl MemoryNotifier {
    pub(super) fn sent(&self) -> Vec<Notification> {
        self.sent.lock().expect("notifier mutex poisoned").clone()
    }

    pub(super) fn go_offline(&self) {
        self.offline.store(true, Ordering::SeqCst);
    }
}

impl Notifier for MemoryNotifier {
    fn send(&self, notification: Notification) -> Result<(), NotifyError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(NotifyError::Transport("smtp connection refused".to_string()));
        }
        self.sent
            .lock()
            .expect("notifier mutex poisoned")
            .push(notification);
        Ok(())
    }
}

/// Hands out 100000, 100001, ... and remembers what it issued.
pub(super) struct SequenceCodes {
    next: AtomicU32,
    issued: Mutex<Vec<String>>,
}

impl Default for SequenceCodes {
    fn default() -> Self {
        Self {
            next: AtomicU32::new(100_000),
            issued: Mutex::new(Vec::new()),
        }
    }
}

impl SequenceCodes {
    pub(super) fn last(&self) -> String {
        self.issued
            .lock()
            .expect("codes mutex poisoned")
            .last()
            .cloned()
            .expect("a code was issued")
    }
}

impl CodeGenerator for SequenceCodes {
    fn issue(&self) -> VerificationCode {
        let value = self.next.fetch_add(1, Ordering::SeqCst);
        let code = VerificationCode::new(value).expect("sequence stays in range");
        self.issued
            .lock()
            .expect("codes mutex poisoned")
            .push(code.as_str().to_string());
        code
    }
}

pub(super) struct Harness<P: ApplicationPayload> {
    pub(super) workflow: Arc<TestWorkflow<P>>,
    pub(super) repository: Arc<MemoryRepository<P>>,
    pub(super) resumes: Arc<MemoryResumes>,
    pub(super) notifier: Arc<MemoryNotifier>,
    pub(super) clock: Arc<ManualClock>,
    pub(super) codes: Arc<SequenceCodes>,
}

pub(super) fn harness<P: ApplicationPayload>() -> Harness<P> {
    let repository = Arc::new(MemoryRepository::default());
    let resumes = Arc::new(MemoryResumes::default());
    let notifier = Arc::new(MemoryNotifier::default());
    let clock = Arc::new(ManualClock::new(start_time()));
    let codes = Arc::new(SequenceCodes::default());
    let workflow = Arc::new(ApplicationWorkflow::with_runtime(
        repository.clone(),
        resumes.clone(),
        notifier.clone(),
        AssessmentLinks::default(),
        clock.clone(),
        codes.clone(),
    ));

    Harness {
        workflow,
        repository,
        resumes,
        notifier,
        clock,
        codes,
    }
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 16 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}

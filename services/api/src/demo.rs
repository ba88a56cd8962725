use crate::infra::{FsResumeStore, InMemoryApplicationRepository, OutboxNotifier};
use career_intake::error::AppError;
use career_intake::intake::{
    code_ttl, ApplicationPayload, ApplicationWorkflow, AssessmentLinks, CloudDeveloperApplication,
    DeveloperApplication, InternApplication, InternshipHistory, ManualClock, Notification,
    OsRngCodeGenerator, VerifyReceipt,
};
use chrono::{Duration, Utc};
use clap::{Args, ValueEnum};
use std::path::Path;
use std::sync::Arc;
use tracing::warn;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum DemoTrack {
    Intern,
    Developer,
    CloudDeveloper,
}

#[derive(Args, Debug)]
pub(crate) struct DemoArgs {
    /// Track to apply for
    #[arg(long, value_enum, default_value_t = DemoTrack::Intern)]
    pub(crate) track: DemoTrack,
    /// Applicant email
    #[arg(long, default_value = "applicant@example.com")]
    pub(crate) email: String,
    /// Let the code expire before verifying
    #[arg(long)]
    pub(crate) expire: bool,
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let root = std::env::temp_dir().join(format!("career-intake-demo-{}", Uuid::new_v4()));
    let outcome = match args.track {
        DemoTrack::Intern => walk(sample_intern(), &args, &root),
        DemoTrack::Developer => walk(sample_developer(), &args, &root),
        DemoTrack::CloudDeveloper => walk(sample_cloud_developer(), &args, &root),
    };
    if let Err(err) = std::fs::remove_dir_all(&root) {
        warn!(path = %root.display(), error = %err, "demo scratch directory not removed");
    }
    outcome
}

fn walk<P: ApplicationPayload>(payload: P, args: &DemoArgs, root: &Path) -> Result<(), AppError> {
    let resumes = Arc::new(FsResumeStore::new(root.join("uploads_temp"), root.join("uploads")));
    resumes.prepare()?;
    let repository = Arc::new(InMemoryApplicationRepository::<P>::default());
    let notifier = Arc::new(OutboxNotifier::default());
    let clock = Arc::new(ManualClock::new(Utc::now()));
    let workflow = ApplicationWorkflow::with_runtime(
        repository,
        resumes.clone(),
        notifier.clone(),
        AssessmentLinks::default(),
        clock.clone(),
        Arc::new(OsRngCodeGenerator),
    );

    println!("Career intake demo ({} track)", P::TRACK);

    let staged = resumes.stage_upload("resume.pdf", b"%PDF-1.4\n% demo resume\n")?;
    println!("1. Resume staged as {}", staged.0);

    let receipt = match workflow.submit(&args.email, payload, staged) {
        Ok(receipt) => receipt,
        Err(err) => {
            println!("Submission rejected: {err}");
            return Ok(());
        }
    };
    println!("2. Submitted: {}", receipt.message);

    let code = notifier
        .sent()
        .last()
        .and_then(code_in)
        .unwrap_or_default();
    println!("   Code from the verification mail: {code}");

    if args.expire {
        let skipped = code_ttl() + Duration::minutes(1);
        clock.advance(skipped);
        println!("   Simulated {} minutes passing", skipped.num_minutes());
    }

    match workflow.verify(&args.email, &code) {
        Ok(VerifyReceipt::Success { record_id, message }) => {
            println!("3. Verified: {message}");
            println!("   Record id: {record_id}");
        }
        Ok(VerifyReceipt::Error { kind, reason }) => {
            println!("3. Verification failed ({kind}): {reason}");
        }
        Err(err) => {
            println!("3. Verification failed ({}): {}", err.kind(), err.reason());
        }
    }

    println!("\nState for {}: {:?}", args.email, workflow.state(&args.email)?);

    println!("\nNotifications sent");
    for message in notifier.sent() {
        println!("- {} -> {}", message.subject, message.to);
    }

    Ok(())
}

pub(crate) fn code_in(message: &Notification) -> Option<String> {
    message
        .body
        .lines()
        .map(str::trim)
        .find(|line| line.len() == 6 && line.chars().all(|c| c.is_ascii_digit()))
        .map(str::to_string)
}

pub(crate) fn sample_intern() -> InternApplication {
    InternApplication {
        role: "intern".to_string(),
        first_name: "Asha".to_string(),
        last_name: "Verma".to_string(),
        phone: "555-0100".to_string(),
        qualification: "B.Sc Computer Science".to_string(),
        passout_year: 2025,
        domain: "Java".to_string(),
        gender: None,
    }
}

pub(crate) fn sample_developer() -> DeveloperApplication {
    DeveloperApplication {
        role: "developer".to_string(),
        first_name: "Ravi".to_string(),
        last_name: "Kumar".to_string(),
        phone: "555-0101".to_string(),
        qualification: "B.Tech".to_string(),
        passout_year: Some(2023),
        internship: Some(InternshipHistory {
            domain: "Python".to_string(),
            company_name: "Acme Labs".to_string(),
            stipend: 15000.0,
            duration_months: 6.0,
        }),
        gender: None,
    }
}

fn sample_cloud_developer() -> CloudDeveloperApplication {
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
        linkedin_profile: None,
        github_profile: None,
        gender: None,
    }
}

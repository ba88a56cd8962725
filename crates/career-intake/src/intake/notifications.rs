//! Applicant-facing mail content. Delivery belongs to the [`Notifier`](super::Notifier).

use serde::{Deserialize, Serialize};

use super::code::VerificationCode;
use super::domain::{ApplicationPayload, ApplicationRecord, EmailAddress, Track};
use super::repository::Notification;
use super::verification::CODE_TTL_MINUTES;

/// Domains with a coding assessment for the intern and developer tracks.
const ASSESSED_DOMAINS: [&str; 3] = ["Java", "Python", ".NET"];

/// Assessment link per track.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssessmentLinks {
    pub intern: String,
    pub developer: String,
    pub cloud_developer: String,
}

impl Default for AssessmentLinks {
    fn default() -> Self {
        Self {
            intern: "https://assessments.example.com/intern".to_string(),
            developer: "https://assessments.example.com/developer".to_string(),
            cloud_developer: "https://assessments.example.com/cloud-developer".to_string(),
        }
    }
}

impl AssessmentLinks {
    pub fn for_track(&self, track: Track) -> &str {
        match track {
            Track::Intern => &self.intern,
            Track::Developer => &self.developer,
            Track::CloudDeveloper => &self.cloud_developer,
        }
    }
}

pub fn verification_code<P: ApplicationPayload>(
    to: &EmailAddress,
    payload: &P,
    code: &VerificationCode,
) -> Notification {
    Notification {
        to: to.clone(),
        subject: format!("Verify your email for your {} application", P::TRACK),
        body: format!(
            "Hello {},\n\nPlease verify your email by entering this code:\n\n{}\n\nThis code is valid for {} minutes.\n\nHR Team",
            payload.first_name(),
            code.as_str(),
            CODE_TTL_MINUTES
        ),
    }
}

pub fn application_received<P: ApplicationPayload>(record: &ApplicationRecord<P>) -> Notification {
    Notification {
        to: record.email.clone(),
        subject: format!("Application Received - {}", record.payload.role()),
        body: format!(
            "Hello {},\n\nYour {} application has been successfully submitted.\n\nBest regards,\nHR Team",
            record.payload.first_name(),
            P::TRACK
        ),
    }
}

/// At most one invite per application, whatever the domain.
pub fn assessment_invite<P: ApplicationPayload>(
    record: &ApplicationRecord<P>,
    links: &AssessmentLinks,
) -> Option<Notification> {
    let payload = &record.payload;
    let eligible = match P::TRACK {
        Track::CloudDeveloper => true,
        Track::Intern | Track::Developer => {
            payload.role().trim().eq_ignore_ascii_case(P::TRACK.label())
                && payload
                    .domain()
                    .map(|domain| ASSESSED_DOMAINS.contains(&domain))
                    .unwrap_or(false)
        }
    };
    if !eligible {
        return None;
    }

    let domain_line = payload
        .domain()
        .map(|domain| format!("Domain: {domain}\n"))
        .unwrap_or_default();

    Some(Notification {
        to: record.email.clone(),
        subject: format!("Assessment for {} Position", payload.role()),
        body: format!(
            "Hello {},\n\n{}Role: {}\n\nPlease complete the assessment:\n{}\n\nBest regards,\nHR Team",
            payload.first_name(),
            domain_line,
            payload.role(),
            links.for_track(P::TRACK)
        ),
    })
}

/// Everything sent after a successful promotion, in send order.
pub fn follow_ups<P: ApplicationPayload>(
    record: &ApplicationRecord<P>,
    links: &AssessmentLinks,
) -> Vec<Notification> {
    let mut messages = vec![application_received(record)];
    messages.extend(assessment_invite(record, links));
    messages
}

use std::fmt;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::code::VerificationCode;

/// Normalised (trimmed, lower-cased) applicant email. Keys both staging and durable storage.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EmailAddress(String);

impl EmailAddress {
    pub fn parse(raw: &str) -> Result<Self, InvalidEmail> {
        let normalised = raw.trim().to_lowercase();
        if normalised.is_empty() {
            return Err(InvalidEmail::Empty);
        }
        if normalised.chars().any(char::is_whitespace) {
            return Err(InvalidEmail::Malformed(normalised));
        }

        let mut parts = normalised.split('@');
        let (Some(local), Some(domain), None) = (parts.next(), parts.next(), parts.next()) else {
            return Err(InvalidEmail::Malformed(normalised));
        };
        let domain_ok = domain
            .split('.')
            .all(|label| !label.is_empty())
            && domain.contains('.');
        if local.is_empty() || !domain_ok {
            return Err(InvalidEmail::Malformed(normalised));
        }

        Ok(Self(normalised))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EmailAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for EmailAddress {
    type Error = InvalidEmail;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<EmailAddress> for String {
    fn from(value: EmailAddress) -> Self {
        value.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvalidEmail {
    #[error("email address is required")]
    Empty,
    #[error("'{0}' is not a valid email address")]
    Malformed(String),
}

/// Hiring track an application belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Track {
    Intern,
    Developer,
    CloudDeveloper,
}

impl Track {
    pub const ALL: [Track; 3] = [Track::Intern, Track::Developer, Track::CloudDeveloper];

    pub const fn label(self) -> &'static str {
        match self {
            Track::Intern => "intern",
            Track::Developer => "developer",
            Track::CloudDeveloper => "cloud developer",
        }
    }

    /// URL segment under `/api/v1/careers/`.
    pub const fn path_segment(self) -> &'static str {
        match self {
            Track::Intern => "intern",
            Track::Developer => "developer",
            Track::CloudDeveloper => "cloud-developer",
        }
    }
}

impl fmt::Display for Track {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Track-specific application fields carried through staging and promotion untouched.
pub trait ApplicationPayload:
    Clone + fmt::Debug + Serialize + DeserializeOwned + Send + Sync + 'static
{
    const TRACK: Track;

    fn first_name(&self) -> &str;
    fn role(&self) -> &str;
    /// Technology domain used to pick an assessment, if the applicant has one.
    fn domain(&self) -> Option<&str>;
}

/// Upload held in temporary storage until the application is verified.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StagedResumeRef(pub String);

/// Location of a resume after it has been moved to permanent storage.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FinalResumeRef(pub String);

/// Identifier assigned by durable storage.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(pub String);

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Staged, not-yet-durable application.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingApplication<P> {
    pub email: EmailAddress,
    pub payload: P,
    pub staged_resume: StagedResumeRef,
}

/// One-time code bound to an email.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationEntry {
    pub code: VerificationCode,
    pub issued_at: DateTime<Utc>,
}

/// Verified application handed to durable storage for insertion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewApplication<P> {
    pub email: EmailAddress,
    pub track: Track,
    pub payload: P,
    pub resume: FinalResumeRef,
    pub applied_at: DateTime<Utc>,
}

/// Persisted application, unique per email within a track's storage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplicationRecord<P> {
    pub id: RecordId,
    pub email: EmailAddress,
    pub track: Track,
    pub payload: P,
    pub resume: FinalResumeRef,
    pub applied_at: DateTime<Utc>,
}

impl<P> ApplicationRecord<P> {
    pub fn from_new(id: RecordId, application: NewApplication<P>) -> Self {
        Self {
            id,
            email: application.email,
            track: application.track,
            payload: application.payload,
            resume: application.resume,
            applied_at: application.applied_at,
        }
    }
}

/// Intern track form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InternApplication {
    pub role: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: String,
    pub qualification: String,
    pub passout_year: u16,
    pub domain: String,
    #[serde(default)]
    pub gender: Option<String>,
}

impl ApplicationPayload for InternApplication {
    const TRACK: Track = Track::Intern;

    fn first_name(&self) -> &str {
        &self.first_name
    }

    fn role(&self) -> &str {
        &self.role
    }

    fn domain(&self) -> Option<&str> {
        Some(self.domain.as_str()).filter(|domain| !domain.trim().is_empty())
    }
}

/// Prior internship declared on a developer application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InternshipHistory {
    pub domain: String,
    pub company_name: String,
    #[serde(default)]
    pub stipend: f64,
    #[serde(default)]
    pub duration_months: f64,
}

/// Developer track form. The domain comes from the internship, when there was one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeveloperApplication {
    pub role: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: String,
    pub qualification: String,
    #[serde(default)]
    pub passout_year: Option<u16>,
    #[serde(default)]
    pub internship: Option<InternshipHistory>,
    #[serde(default)]
    pub gender: Option<String>,
}

impl ApplicationPayload for DeveloperApplication {
    const TRACK: Track = Track::Developer;

    fn first_name(&self) -> &str {
        &self.first_name
    }

    fn role(&self) -> &str {
        &self.role
    }

    fn domain(&self) -> Option<&str> {
        self.internship
            .as_ref()
            .map(|internship| internship.domain.as_str())
            .filter(|domain| !domain.trim().is_empty())
    }
}

/// Cloud developer track form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CloudDeveloperApplication {
    pub role: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: String,
    pub qualification: String,
    #[serde(default)]
    pub experience_years: u8,
    pub domain: String,
    #[serde(default)]
    pub company_name: Option<String>,
    #[serde(default)]
    pub current_salary: f64,
    #[serde(default)]
    pub expected_salary: f64,
    #[serde(default)]
    pub duration_at_company: f64,
    #[serde(default)]
    pub linkedin_profile: Option<String>,
    #[serde(default)]
    pub github_profile: Option<String>,
    #[serde(default)]
    pub gender: Option<String>,
}

impl ApplicationPayload for CloudDeveloperApplication {
    const TRACK: Track = Track::CloudDeveloper;

    fn first_name(&self) -> &str {
        &self.first_name
    }

    fn role(&self) -> &str {
        &self.role
    }

    fn domain(&self) -> Option<&str> {
        Some(self.domain.as_str()).filter(|domain| !domain.trim().is_empty())
    }
}

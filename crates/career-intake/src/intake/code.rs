use std::fmt;

use rand::rngs::OsRng;
use rand::Rng;

const CODE_MIN: u32 = 100_000;
const CODE_MAX: u32 = 999_999;

/// Six digit one-time code. `Debug` is redacted so codes never reach the logs.
#[derive(Clone, PartialEq, Eq)]
pub struct VerificationCode(String);

impl VerificationCode {
    pub fn new(value: u32) -> Result<Self, InvalidCode> {
        if (CODE_MIN..=CODE_MAX).contains(&value) {
            Ok(Self(value.to_string()))
        } else {
            Err(InvalidCode(value))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Compares without short-circuiting on the first differing byte.
    pub fn matches(&self, submitted: &str) -> bool {
        let submitted = submitted.trim().as_bytes();
        let expected = self.0.as_bytes();
        if submitted.len() != expected.len() {
            return false;
        }
        expected
            .iter()
            .zip(submitted)
            .fold(0u8, |acc, (a, b)| acc | (a ^ b))
            == 0
    }
}

impl fmt::Debug for VerificationCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("VerificationCode(******)")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("verification code {0} is outside the six digit range")]
pub struct InvalidCode(pub u32);

/// Source of one-time codes.
pub trait CodeGenerator: Send + Sync {
    fn issue(&self) -> VerificationCode;
}

/// Draws codes from the operating system CSPRNG.
#[derive(Debug, Default, Clone, Copy)]
pub struct OsRngCodeGenerator;

impl CodeGenerator for OsRngCodeGenerator {
    fn issue(&self) -> VerificationCode {
        let value: u32 = OsRng.gen_range(CODE_MIN..=CODE_MAX);
        VerificationCode(value.to_string())
    }
}

//! Shared-secret gates for the three caller classes.
//!
//! Submitters present the submission secret before `enqueue`, workers
//! present the callback secret before reporting status, and (when
//! configured) the worker secret before `claim`. A gate with no configured
//! secret is open.
//!
//! Secrets are compared by verifying an HMAC-SHA256 tag of the secret under
//! a fixed key, which runs in constant time. Neither the configured nor the presented value ever ends
//! up in an error message.

use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::error::CoreError;

type HmacSha256 = Hmac<Sha256>;

/// Fixed HMAC key; the secret itself is the authenticated message, so two
/// tags match only when the secrets are byte-for-byte equal.
const TAG_KEY: &[u8] = b"codimir-dispatcher-shared-secret";

/// The operation class a secret guards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gate {
    Submission,
    Callback,
    Worker,
}

impl Gate {
    pub fn as_str(self) -> &'static str {
        match self {
            Gate::Submission => "submission",
            Gate::Callback => "callback",
            Gate::Worker => "worker",
        }
    }
}

// ---------------------------------------------------------------------------
// SharedSecret
// ---------------------------------------------------------------------------

/// A configured secret, held only as its HMAC tag.
#[derive(Clone)]
pub struct SharedSecret {
    tag: Vec<u8>,
}

impl SharedSecret {
    pub fn new(secret: &str) -> Self {
        let tag = tag_for(secret)
            .map(|mac| mac.finalize().into_bytes().to_vec())
            .unwrap_or_default();
        Self { tag }
    }

    /// Constant-time comparison against a presented value.
    pub fn matches(&self, presented: &str) -> bool {
        match tag_for(presented) {
            Some(mac) => mac.verify_slice(&self.tag).is_ok(),
            None => false,
        }
    }
}

impl std::fmt::Debug for SharedSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SharedSecret(<redacted>)")
    }
}

fn tag_for(secret: &str) -> Option<HmacSha256> {
    let mut mac = HmacSha256::new_from_slice(TAG_KEY).ok()?;
    mac.update(secret.as_bytes());
    Some(mac)
}

// ---------------------------------------------------------------------------
// AuthGate
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct AuthGate {
    submission: Option<SharedSecret>,
    callback: Option<SharedSecret>,
    worker: Option<SharedSecret>,
}

impl AuthGate {
    /// Build a gate from optional plaintext secrets. Empty strings count as
    /// unset.
    pub fn new(submission: Option<&str>, callback: Option<&str>, worker: Option<&str>) -> Self {
        let configure = |s: Option<&str>| s.filter(|s| !s.is_empty()).map(SharedSecret::new);
        Self {
            submission: configure(submission),
            callback: configure(callback),
            worker: configure(worker),
        }
    }

    /// A gate with every check disabled.
    pub fn open() -> Self {
        Self::default()
    }

    pub fn is_enforced(&self, gate: Gate) -> bool {
        self.secret(gate).is_some()
    }

    /// Check a presented secret for the given operation class.
    pub fn check(&self, gate: Gate, presented: Option<&str>) -> Result<(), CoreError> {
        let Some(expected) = self.secret(gate) else {
            return Ok(());
        };

        match presented {
            None | Some("") => Err(CoreError::Unauthorized(format!(
                "Missing {} secret",
                gate.as_str()
            ))),
            Some(value) if expected.matches(value) => Ok(()),
            Some(_) => Err(CoreError::Unauthorized(format!(
                "Invalid {} secret",
                gate.as_str()
            ))),
        }
    }

    fn secret(&self, gate: Gate) -> Option<&SharedSecret> {
        match gate {
            Gate::Submission => self.submission.as_ref(),
            Gate::Callback => self.callback.as_ref(),
            Gate::Worker => self.worker.as_ref(),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn matching_secret_passes() {
        let gate = AuthGate::new(Some("sub"), Some("cb"), None);
        assert!(gate.check(Gate::Submission, Some("sub")).is_ok());
        assert!(gate.check(Gate::Callback, Some("cb")).is_ok());
    }

    #[test]
    fn only_exact_secret_matches() {
        let secret = SharedSecret::new("s3cret");
        assert!(secret.matches("s3cret"));
        assert!(!secret.matches("s3cret\0"));
        assert!(!secret.matches("s3cre"));
        assert!(!secret.matches(""));

        let long = "k".repeat(100);
        let secret = SharedSecret::new(&long);
        assert!(secret.matches(&long));
        assert!(!secret.matches(&format!("{long}\0")));
    }

    #[test]
    fn secrets_are_independent() {
        let gate = AuthGate::new(Some("sub"), Some("cb"), None);
        assert_matches!(
            gate.check(Gate::Submission, Some("cb")),
            Err(CoreError::Unauthorized(_))
        );
        assert_matches!(
            gate.check(Gate::Callback, Some("sub")),
            Err(CoreError::Unauthorized(_))
        );
    }

    #[test]
    fn missing_secret_is_unauthorized() {
        let gate = AuthGate::new(Some("sub"), None, None);
        assert_matches!(
            gate.check(Gate::Submission, None),
            Err(CoreError::Unauthorized(msg)) if msg == "Missing submission secret"
        );
        assert_matches!(
            gate.check(Gate::Submission, Some("")),
            Err(CoreError::Unauthorized(_))
        );
    }

    #[test]
    fn error_never_echoes_the_secret() {
        let gate = AuthGate::new(Some("s3cr3t-value"), None, None);
        let err = gate
            .check(Gate::Submission, Some("guess-value"))
            .unwrap_err()
            .to_string();
        assert!(!err.contains("s3cr3t-value"));
        assert!(!err.contains("guess-value"));
    }

    #[test]
    fn unset_gate_is_open() {
        let gate = AuthGate::new(None, Some(""), None);
        assert!(!gate.is_enforced(Gate::Submission));
        assert!(!gate.is_enforced(Gate::Callback));
        assert!(gate.check(Gate::Callback, None).is_ok());
        assert!(gate.check(Gate::Worker, Some("anything")).is_ok());
        assert!(AuthGate::open().check(Gate::Submission, None).is_ok());
    }

    #[test]
    fn prefix_of_secret_does_not_match() {
        let secret = SharedSecret::new("abcdef");
        assert!(secret.matches("abcdef"));
        assert!(!secret.matches("abc"));
        assert!(!secret.matches("abcdefg"));
    }

    #[test]
    fn debug_output_is_redacted() {
        let gate = AuthGate::new(Some("hunter2"), None, None);
        assert!(!format!("{gate:?}").contains("hunter2"));
    }
}

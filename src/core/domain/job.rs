//! Cipher jobs.
//!
//! A job is the in-memory record of one encrypt/decrypt/verify request. It is
//! never persisted and never carries a passphrase.

use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::warn;
use uuid::Uuid;

use super::Fingerprint;

/// Opaque job handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct JobId(Uuid);

impl JobId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.simple())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobKind {
    Encrypt,
    Decrypt,
    Verify,
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobKind::Encrypt => f.write_str("encrypt"),
            JobKind::Decrypt => f.write_str("decrypt"),
            JobKind::Verify => f.write_str("verify"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Running,
    Succeeded,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Succeeded | JobStatus::Failed)
    }
}

/// One unit of cipher work.
///
/// Status only moves `Pending → Running → Succeeded | Failed`.
#[derive(Debug, Clone, Serialize)]
pub struct CipherJob {
    id: JobId,
    kind: JobKind,
    input_path: Option<PathBuf>,
    output_path: Option<PathBuf>,
    recipients: Vec<Fingerprint>,
    status: JobStatus,
    created_at: DateTime<Utc>,
}

impl CipherJob {
    pub fn new(kind: JobKind) -> Self {
        Self {
            id: JobId::new(),
            kind,
            input_path: None,
            output_path: None,
            recipients: Vec::new(),
            status: JobStatus::Pending,
            created_at: Utc::now(),
        }
    }

    pub fn with_recipients(mut self, recipients: Vec<Fingerprint>) -> Self {
        self.recipients = recipients;
        self
    }

    pub fn id(&self) -> JobId {
        self.id
    }

    pub fn kind(&self) -> JobKind {
        self.kind
    }

    pub fn status(&self) -> JobStatus {
        self.status
    }

    pub fn recipients(&self) -> &[Fingerprint] {
        &self.recipients
    }

    pub fn input_path(&self) -> Option<&Path> {
        self.input_path.as_deref()
    }

    pub fn output_path(&self) -> Option<&Path> {
        self.output_path.as_deref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub(crate) fn set_paths(&mut self, input: &Path, output: Option<&Path>) {
        self.input_path = Some(input.to_path_buf());
        self.output_path = output.map(Path::to_path_buf);
    }

    /// Move `Pending → Running`. Returns false if the job was not pending.
    pub fn start(&mut self) -> bool {
        self.transition(JobStatus::Pending, JobStatus::Running)
    }

    /// Move `Running → Succeeded`.
    pub fn succeed(&mut self) -> bool {
        self.transition(JobStatus::Running, JobStatus::Succeeded)
    }

    /// Move any non-terminal job to `Failed`.
    pub fn fail(&mut self) -> bool {
        if self.status.is_terminal() {
            warn!(job = %self.id, status = ?self.status, "ignoring failure of finished job");
            return false;
        }
        self.status = JobStatus::Failed;
        true
    }

    fn transition(&mut self, from: JobStatus, to: JobStatus) -> bool {
        if self.status != from {
            warn!(job = %self.id, from = ?self.status, to = ?to, "illegal job transition");
            return false;
        }
        self.status = to;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_happy_path() {
        let mut job = CipherJob::new(JobKind::Encrypt);
        assert_eq!(job.status(), JobStatus::Pending);
        assert!(job.start());
        assert!(job.succeed());
        assert_eq!(job.status(), JobStatus::Succeeded);
    }

    #[test]
    fn test_terminal_states_are_final() {
        let mut job = CipherJob::new(JobKind::Decrypt);
        job.start();
        job.fail();
        assert!(!job.succeed());
        assert!(!job.start());
        assert!(!job.fail());
        assert_eq!(job.status(), JobStatus::Failed);
    }

    #[test]
    fn test_cannot_succeed_without_running() {
        let mut job = CipherJob::new(JobKind::Encrypt);
        assert!(!job.succeed());
        assert_eq!(job.status(), JobStatus::Pending);
        assert!(job.fail());
    }

    #[test]
    fn test_ids_are_unique() {
        let a = CipherJob::new(JobKind::Encrypt);
        let b = CipherJob::new(JobKind::Encrypt);
        assert_ne!(a.id(), b.id());
    }
}

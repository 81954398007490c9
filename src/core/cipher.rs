//! Encryption, decryption and verification jobs.
//!
//! Each request becomes a [`CipherJob`] that stages its input, runs one
//! engine call, and hands back the staged output. Staged inputs never outlive
//! the call; outputs are owned by the returned [`CipherOutcome`] and deleted
//! with it unless persisted.
//!
//! Jobs take a permit from the [`JobLimiter`] and hold the keyring lock in
//! shared mode, so they run in parallel with each other and with key reads
//! but never observe a half-applied import or deletion.

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::{Arc, RwLock, RwLockReadGuard};

use tracing::{debug, info, warn};

use crate::core::config::Config;
use crate::core::domain::{CipherJob, Fingerprint, JobKind, Passphrase, Upload, Verification};
use crate::core::engine::Engine;
use crate::core::limiter::JobLimiter;
use crate::core::staging::{StagedFile, StagingArea};
use crate::core::validation;
use crate::error::{CipherError, Result};

/// Result of a successful encrypt or decrypt job.
#[derive(Debug)]
pub struct CipherOutcome {
    job: CipherJob,
    output: StagedFile,
}

impl CipherOutcome {
    pub fn job(&self) -> &CipherJob {
        &self.job
    }

    /// The staged output. Deleted when the outcome is dropped.
    pub fn output(&self) -> &StagedFile {
        &self.output
    }

    /// Read the output into memory.
    pub fn read_output(&self) -> Result<Vec<u8>> {
        self.output.read()
    }

    /// Move the output to `dest`, returning the finished job.
    pub fn persist(self, dest: &Path) -> Result<CipherJob> {
        self.output.persist(dest)?;
        Ok(self.job)
    }
}

/// Result of a verification job.
#[derive(Debug)]
pub struct VerifyOutcome {
    pub job: CipherJob,
    pub verification: Verification,
}

/// Cipher operations over a shared keyring.
#[derive(Clone)]
pub struct CipherService {
    engine: Arc<dyn Engine>,
    lock: Arc<RwLock<()>>,
    staging: Arc<StagingArea>,
    limiter: JobLimiter,
    max_payload_bytes: u64,
    allowed_extensions: Vec<String>,
}

impl CipherService {
    pub fn new(
        engine: Arc<dyn Engine>,
        lock: Arc<RwLock<()>>,
        staging: Arc<StagingArea>,
        config: &Config,
    ) -> Self {
        Self {
            engine,
            lock,
            staging,
            limiter: JobLimiter::new(config.engine.max_concurrent_jobs),
            max_payload_bytes: config.staging.max_payload_bytes,
            allowed_extensions: config.staging.allowed_extensions.clone(),
        }
    }

    pub fn limiter(&self) -> &JobLimiter {
        &self.limiter
    }

    fn read(&self) -> RwLockReadGuard<'_, ()> {
        self.lock.read().unwrap_or_else(|e| e.into_inner())
    }

    /// Checks that need nothing but the upload itself.
    fn admit(&self, upload: &Upload) -> Result<()> {
        if upload.len() > self.max_payload_bytes {
            return Err(CipherError::PayloadTooLarge {
                size: upload.len(),
                limit: self.max_payload_bytes,
            }
            .into());
        }
        if !self.allowed_extensions.is_empty() {
            validation::validate_extension(upload.name().unwrap_or(""), &self.allowed_extensions)?;
        }
        Ok(())
    }

    /// Encrypt `upload` to every key in `recipients`.
    ///
    /// Duplicate recipients are collapsed. The output is encrypted to exactly
    /// the resolved set or not produced at all.
    ///
    /// # Errors
    ///
    /// - `NoRecipients` for an empty set, before anything is staged
    /// - `PayloadTooLarge` when the upload exceeds the configured bound
    /// - `UnknownRecipient` if any fingerprint is not in the keyring
    /// - `EncryptionFailed` if the engine refuses
    pub fn encrypt_file(&self, upload: &Upload, recipients: &[Fingerprint]) -> Result<CipherOutcome> {
        if recipients.is_empty() {
            return Err(CipherError::NoRecipients.into());
        }
        self.admit(upload)?;

        let recipients: Vec<Fingerprint> = recipients
            .iter()
            .cloned()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let _permit = self.limiter.acquire();
        let _guard = self.read();

        self.resolve_recipients(&recipients)?;

        let mut job = CipherJob::new(JobKind::Encrypt).with_recipients(recipients);
        let (input, output) = match self.stage(&mut job, upload) {
            Ok(files) => files,
            Err(e) => {
                job.fail();
                return Err(e);
            }
        };

        let result = self
            .engine
            .encrypt(input.path(), output.path(), job.recipients());
        self.finish(job, input, output, result)
    }

    /// Decrypt `upload`, using `passphrase` if the private key needs one.
    ///
    /// The passphrase is dropped as soon as the engine call returns.
    ///
    /// # Errors
    ///
    /// `DecryptionFailed` with a coarse reason for a wrong passphrase, a
    /// missing private key, or input that is not OpenPGP data. No output is
    /// left behind in that case.
    pub fn decrypt_file(&self, upload: &Upload, passphrase: Option<Passphrase>) -> Result<CipherOutcome> {
        self.admit(upload)?;

        let _permit = self.limiter.acquire();
        let _guard = self.read();

        let mut job = CipherJob::new(JobKind::Decrypt);
        let (input, output) = match self.stage(&mut job, upload) {
            Ok(files) => files,
            Err(e) => {
                job.fail();
                return Err(e);
            }
        };

        let result = self
            .engine
            .decrypt(input.path(), output.path(), passphrase.as_ref());
        drop(passphrase);

        self.finish(job, input, output, result)
    }

    /// Check a signature, inline or detached.
    ///
    /// A bad or unknown signature is a successful job with a negative
    /// verdict, not an error.
    pub fn verify_file(&self, data: &Upload, signature: Option<&Upload>) -> Result<VerifyOutcome> {
        self.admit(data)?;
        if let Some(signature) = signature {
            self.admit(signature)?;
        }

        let _permit = self.limiter.acquire();
        let _guard = self.read();

        let mut job = CipherJob::new(JobKind::Verify);
        let staged = self.staging.stage(data.content(), "in").and_then(|input| {
            let sig = signature
                .map(|s| self.staging.stage(s.content(), "sig"))
                .transpose()?;
            Ok((input, sig))
        });
        let (input, sig) = match staged {
            Ok(files) => files,
            Err(e) => {
                job.fail();
                return Err(e);
            }
        };
        job.set_paths(input.path(), None);
        job.start();

        match self.engine.verify(input.path(), sig.as_ref().map(StagedFile::path)) {
            Ok(verification) => {
                job.succeed();
                debug!(job = %job.id(), valid = verification.is_valid(), "verification finished");
                Ok(VerifyOutcome { job, verification })
            }
            Err(e) => {
                job.fail();
                warn!(job = %job.id(), kind = ?e.kind(), "verification failed");
                Err(e)
            }
        }
    }

    /// Every recipient must exist and accept encryption.
    ///
    /// Caller must hold the keyring lock.
    fn resolve_recipients(&self, recipients: &[Fingerprint]) -> Result<()> {
        let keys = self.engine.list_keys(false)?;

        for fingerprint in recipients {
            match keys.iter().find(|k| k.fingerprint() == fingerprint) {
                None => return Err(CipherError::UnknownRecipient(fingerprint.to_string()).into()),
                Some(key) if !key.can_encrypt() => {
                    return Err(CipherError::UnusableRecipient(fingerprint.to_string()).into())
                }
                Some(_) => {}
            }
        }
        Ok(())
    }

    fn stage(&self, job: &mut CipherJob, upload: &Upload) -> Result<(StagedFile, StagedFile)> {
        let input = self.staging.stage(upload.content(), "in")?;
        let output = self.staging.allocate("out")?;
        job.set_paths(input.path(), Some(output.path()));
        job.start();
        Ok((input, output))
    }

    /// Settle a job after its engine call. The input is always released; the
    /// output only survives on success.
    fn finish(
        &self,
        mut job: CipherJob,
        mut input: StagedFile,
        mut output: StagedFile,
        result: Result<()>,
    ) -> Result<CipherOutcome> {
        if let Err(e) = input.release() {
            warn!(job = %job.id(), error = %e, "failed to release staged input");
        }

        match result {
            Ok(()) => {
                job.succeed();
                info!(
                    job = %job.id(),
                    kind = %job.kind(),
                    recipients = job.recipients().len(),
                    "cipher job succeeded"
                );
                Ok(CipherOutcome { job, output })
            }
            Err(e) => {
                if let Err(release) = output.release() {
                    warn!(job = %job.id(), error = %release, "failed to release staged output");
                }
                job.fail();
                warn!(job = %job.id(), kind = %job.kind(), error = %e, "cipher job failed");
                Err(e)
            }
        }
    }
}

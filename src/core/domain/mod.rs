//! Domain types.

mod health;
pub mod job;
pub mod key;
mod passphrase;
mod upload;
mod verification;

pub use health::{Health, HealthStatus};
pub use job::{CipherJob, JobId, JobKind, JobStatus};
pub use key::{
    Algorithm, Capabilities, Fingerprint, KeyFormat, KeyParams, KeyRecord, UserId, Validity,
};
pub use passphrase::Passphrase;
pub use upload::Upload;
pub use verification::Verification;

//! Temporary file lifecycle.
//!
//! Every file the engine reads or writes on behalf of a request lives in the
//! staging area under a random name. A [`StagedFile`] owns its path and
//! deletes it when released or dropped, so every exit path of a job cleans
//! up. Files left behind by a crashed process are removed by [`StagingArea::sweep`].

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use tracing::{debug, trace, warn};
use uuid::Uuid;

use crate::error::{Result, StagingError};

/// Attempts at finding an unused name before giving up.
const NAME_ATTEMPTS: usize = 4;

/// The staging directory.
#[derive(Debug)]
pub struct StagingArea {
    dir: PathBuf,
    retention: Duration,
}

impl StagingArea {
    /// Open (creating if needed) a staging directory.
    ///
    /// # Errors
    ///
    /// Returns `StagingError::Prepare` if the directory cannot be created.
    pub fn open(dir: &Path, retention: Duration) -> Result<Self> {
        fs::create_dir_all(dir).map_err(|source| StagingError::Prepare {
            path: dir.display().to_string(),
            source,
        })?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(dir, fs::Permissions::from_mode(0o700)).map_err(|source| {
                StagingError::Prepare {
                    path: dir.display().to_string(),
                    source,
                }
            })?;
        }

        debug!(path = %dir.display(), "staging area ready");

        Ok(Self {
            dir: dir.to_path_buf(),
            retention,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write `content` to a fresh staged file.
    ///
    /// # Errors
    ///
    /// Returns `StagingError::Write` on I/O failure. A partially written file
    /// is removed before returning.
    pub fn stage(&self, content: &[u8], suffix: &str) -> Result<StagedFile> {
        let (mut file, staged) = self.create(suffix)?;

        file.write_all(content)
            .and_then(|_| file.sync_all())
            .map_err(StagingError::Write)?;

        trace!(path = %staged.path.display(), bytes = content.len(), "staged input");
        Ok(staged)
    }

    /// Reserve a fresh, empty staged file for the engine to write into.
    pub fn allocate(&self, suffix: &str) -> Result<StagedFile> {
        let (_, staged) = self.create(suffix)?;
        trace!(path = %staged.path.display(), "allocated output");
        Ok(staged)
    }

    /// Create a new file with a random name. Names never derive from user
    /// input and `create_new` guarantees no two live handles share a path.
    fn create(&self, suffix: &str) -> Result<(File, StagedFile)> {
        let mut last_err = None;

        for _ in 0..NAME_ATTEMPTS {
            let path = self
                .dir
                .join(format!("{}.{}", Uuid::new_v4().simple(), suffix));

            let mut options = OpenOptions::new();
            options.write(true).create_new(true);
            #[cfg(unix)]
            {
                use std::os::unix::fs::OpenOptionsExt;
                options.mode(0o600);
            }

            match options.open(&path) {
                Ok(file) => return Ok((file, StagedFile::new(path))),
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => last_err = Some(e),
                Err(e) => return Err(StagingError::Write(e).into()),
            }
        }

        Err(StagingError::Write(last_err.unwrap_or_else(|| {
            io::Error::new(io::ErrorKind::AlreadyExists, "no unused staging name")
        }))
        .into())
    }

    /// Delete staged files older than the retention window.
    ///
    /// Only files whose names look like staging names are considered. Returns
    /// the number of files removed.
    pub fn sweep(&self) -> Result<usize> {
        let now = SystemTime::now();
        let mut removed = 0;

        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            let path = entry.path();

            if !is_staging_name(&path) {
                continue;
            }

            let modified = match entry.metadata().and_then(|m| m.modified()) {
                Ok(modified) => modified,
                Err(_) => continue,
            };
            let age = now.duration_since(modified).unwrap_or_default();
            if age < self.retention {
                continue;
            }

            match fs::remove_file(&path) {
                Ok(()) => removed += 1,
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => warn!(path = %path.display(), error = %e, "failed to sweep orphan"),
            }
        }

        if removed > 0 {
            debug!(removed, "swept orphaned staged files");
        }
        Ok(removed)
    }

    /// Whether new files can be created here.
    pub fn is_writable(&self) -> bool {
        match self.allocate("probe") {
            Ok(mut probe) => probe.release().is_ok(),
            Err(_) => false,
        }
    }
}

/// `<32 hex>.<suffix>`
fn is_staging_name(path: &Path) -> bool {
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return false;
    };
    match name.split_once('.') {
        Some((stem, suffix)) => {
            stem.len() == 32
                && stem.chars().all(|c| c.is_ascii_hexdigit())
                && !suffix.is_empty()
        }
        None => false,
    }
}

/// Exclusive handle to one staged file.
///
/// Dropping the handle deletes the file unless it was persisted.
#[derive(Debug)]
pub struct StagedFile {
    path: PathBuf,
    released: bool,
}

impl StagedFile {
    fn new(path: PathBuf) -> Self {
        Self {
            path,
            released: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the whole file.
    pub fn read(&self) -> Result<Vec<u8>> {
        Ok(fs::read(&self.path)?)
    }

    /// Current size in bytes.
    pub fn len(&self) -> Result<u64> {
        Ok(fs::metadata(&self.path)?.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Delete the file. Safe to call more than once.
    pub fn release(&mut self) -> Result<()> {
        if self.released {
            return Ok(());
        }
        match fs::remove_file(&self.path) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        self.released = true;
        trace!(path = %self.path.display(), "released staged file");
        Ok(())
    }

    /// Move the file to `dest`, handing ownership to the caller.
    ///
    /// Falls back to copy-then-delete when `dest` is on another filesystem.
    pub fn persist(mut self, dest: &Path) -> Result<()> {
        let persist_err = |source: io::Error| StagingError::Persist {
            path: dest.display().to_string(),
            source,
        };

        if fs::rename(&self.path, dest).is_err() {
            fs::copy(&self.path, dest).map_err(persist_err)?;
            self.release()?;
        }
        self.released = true;
        debug!(path = %dest.display(), "persisted staged file");
        Ok(())
    }
}

impl Drop for StagedFile {
    fn drop(&mut self) {
        if let Err(e) = self.release() {
            warn!(path = %self.path.display(), error = %e, "failed to release staged file");
        }
    }
}

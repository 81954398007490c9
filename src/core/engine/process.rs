//! Bounded subprocess execution.

use std::ffi::OsString;
use std::io::{Read, Write};
use std::path::Path;
use std::process::{Child, Command, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{trace, warn};
use zeroize::Zeroizing;

use crate::error::{EngineError, Result};

const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// One engine invocation.
pub(super) struct Invocation {
    pub operation: &'static str,
    pub args: Vec<OsString>,
    /// Written to the child's stdin, then wiped.
    pub stdin: Option<Zeroizing<Vec<u8>>>,
    pub timeout: Duration,
}

/// Captured result of a finished child.
#[derive(Debug)]
pub(super) struct Finished {
    pub code: Option<i32>,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

impl Finished {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    /// Exit code for error reporting; -1 when killed by a signal.
    pub fn code_or_signal(&self) -> i32 {
        self.code.unwrap_or(-1)
    }
}

/// Run `program` to completion or until the invocation's timeout.
///
/// On timeout the child is killed and reaped before `EngineTimeout` is
/// returned, so no engine process outlives the call.
pub(super) fn run(program: &Path, invocation: Invocation) -> Result<Finished> {
    let Invocation {
        operation,
        args,
        stdin,
        timeout,
    } = invocation;

    trace!(operation, program = %program.display(), "spawning engine");

    let mut child = Command::new(program)
        .args(&args)
        .stdin(if stdin.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        })
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| EngineError::Unavailable(format!("{}: {}", program.display(), e)))?;

    let writer = match (stdin, child.stdin.take()) {
        (Some(data), Some(mut pipe)) => Some(thread::spawn(move || {
            // The child may exit before reading everything; that shows up in
            // its exit status, not here.
            let _ = pipe.write_all(&data);
        })),
        _ => None,
    };
    let stdout = spawn_reader(child.stdout.take());
    let stderr = spawn_reader(child.stderr.take());

    let code = match wait_bounded(&mut child, timeout) {
        Ok(Some(code)) => code,
        Ok(None) => {
            warn!(operation, seconds = timeout.as_secs(), "engine call timed out");
            return Err(EngineError::Timeout {
                operation,
                seconds: timeout.as_secs(),
            }
            .into());
        }
        Err(e) => return Err(e.into()),
    };

    if let Some(writer) = writer {
        let _ = writer.join();
    }

    Ok(Finished {
        code,
        stdout: stdout.join().unwrap_or_default(),
        stderr: stderr.join().unwrap_or_default(),
    })
}

/// Poll the child until it exits. `Ok(None)` means the deadline passed and
/// the child was killed.
fn wait_bounded(child: &mut Child, timeout: Duration) -> std::io::Result<Option<Option<i32>>> {
    let start = Instant::now();
    loop {
        match child.try_wait() {
            Ok(Some(status)) => return Ok(Some(status.code())),
            Ok(None) => {}
            Err(e) => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(e);
            }
        }

        if start.elapsed() >= timeout {
            let _ = child.kill();
            let _ = child.wait();
            return Ok(None);
        }

        thread::sleep(POLL_INTERVAL);
    }
}

fn spawn_reader<R: Read + Send + 'static>(pipe: Option<R>) -> JoinHandle<Vec<u8>> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            let _ = pipe.read_to_end(&mut buf);
        }
        buf
    })
}

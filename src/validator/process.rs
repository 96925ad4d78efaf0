//! Subprocess execution with a wall-clock bound

use std::io::{self, Read};
use std::process::{Child, Command, Stdio};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use thiserror::Error;
use wait_timeout::ChildExt;

#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("Failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("{program} did not finish within {} seconds", timeout.as_secs())]
    Timeout { program: String, timeout: Duration },

    #[error("Failed waiting on {program}: {source}")]
    Wait {
        program: String,
        #[source]
        source: io::Error,
    },
}

/// Captured result of a finished process
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessOutput {
    /// None when the process was terminated by a signal
    pub exit_code: Option<i32>,
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
}

impl ProcessOutput {
    /// First line of the first non-empty stream, trimmed
    pub fn first_line_of_output(&self) -> String {
        let stream = if self.stdout.trim().is_empty() {
            &self.stderr
        } else {
            &self.stdout
        };
        stream.trim().lines().next().unwrap_or_default().trim().to_string()
    }
}

/// Runs `cmd` to completion, killing it once `timeout` has elapsed
///
/// Both output streams are drained on separate threads so a chatty child
/// cannot block on a full pipe.
pub fn run_with_timeout(cmd: &mut Command, timeout: Duration) -> Result<ProcessOutput, ProcessError> {
    let program = cmd.get_program().to_string_lossy().into_owned();

    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    let mut child = cmd.spawn().map_err(|source| ProcessError::Spawn {
        program: program.clone(),
        source,
    })?;

    let stdout_handle = child.stdout.take().map(spawn_reader);
    let stderr_handle = child.stderr.take().map(spawn_reader);

    match child.wait_timeout(timeout) {
        Ok(Some(_)) => {}
        Ok(None) => {
            // Readers are left detached; a grandchild may still hold the pipes
            reap(&mut child);
            return Err(ProcessError::Timeout { program, timeout });
        }
        Err(source) => {
            reap(&mut child);
            return Err(ProcessError::Wait { program, source });
        }
    }

    let status = child.wait().map_err(|source| ProcessError::Wait {
        program: program.clone(),
        source,
    })?;

    let stdout = join_reader(stdout_handle).map_err(|source| ProcessError::Wait {
        program: program.clone(),
        source,
    })?;
    let stderr = join_reader(stderr_handle).map_err(|source| ProcessError::Wait {
        program: program.clone(),
        source,
    })?;

    Ok(ProcessOutput {
        exit_code: status.code(),
        success: status.success(),
        stdout,
        stderr,
    })
}

fn reap(child: &mut Child) {
    let _ = child.kill();
    let _ = child.wait();
}

fn spawn_reader<R: Read + Send + 'static>(mut stream: R) -> JoinHandle<io::Result<Vec<u8>>> {
    thread::spawn(move || {
        let mut buffer = Vec::new();
        stream.read_to_end(&mut buffer)?;
        Ok(buffer)
    })
}

fn join_reader(handle: Option<JoinHandle<io::Result<Vec<u8>>>>) -> io::Result<String> {
    match handle {
        Some(handle) => {
            let bytes = handle
                .join()
                .map_err(|_| io::Error::other("output reader panicked"))??;
            Ok(String::from_utf8_lossy(&bytes).into_owned())
        }
        None => Ok(String::new()),
    }
}

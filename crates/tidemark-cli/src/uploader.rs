//! Upload and credential adapters for the binary
//!
//! The remote protocol lives in an external program named by the
//! `upload_command` state key. Each batch runs it once:
//!
//! - stdin: one path per line
//! - env `TIDEMARK_CREDENTIALS`: the credentials file, when configured
//! - stdout: `{"accepted": {path: id}, "matched": {path: id}, "rejected": {path: reason}}`
//!   or `{"cancelled": true}`
//! - exit status 130, or death by SIGINT: cancelled
//! - any failure after the user pressed Ctrl-C: cancelled
//! - any other non-zero exit: upload failure

use std::fs;
use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, ExitStatus, Stdio};
use std::thread;

use serde_json::Value;
use tidemark_core::{ClassifiedResult, CredentialHandle, CredentialProvider, Error, Result, UploadOutcome, Uploader};

use crate::interrupt::Interrupt;

/// Environment variable carrying the credentials file path
pub const CREDENTIALS_ENV: &str = "TIDEMARK_CREDENTIALS";

/// Exit status meaning "interrupted by the user"
pub const CANCELLED_EXIT: i32 = 130;

/// Credentials stored in a file the upload command reads.
///
/// With no file configured the upload command is trusted to manage its
/// own authentication.
#[derive(Debug, Clone)]
pub struct FileCredentials {
    path: Option<PathBuf>,
}

impl FileCredentials {
    pub fn new(path: Option<PathBuf>) -> Self {
        Self { path }
    }
}

impl CredentialProvider for FileCredentials {
    fn ensure_credentials(&mut self) -> Result<CredentialHandle> {
        let Some(path) = &self.path else {
            tracing::debug!("no credentials file configured");
            return Ok(CredentialHandle::ambient());
        };

        let metadata = fs::metadata(path)
            .map_err(|e| Error::credential(format!("cannot read credentials file {}: {e}", path.display())))?;
        if !metadata.is_file() || metadata.len() == 0 {
            return Err(Error::credential(format!(
                "credentials file {} is empty or not a file",
                path.display()
            )));
        }
        Ok(CredentialHandle::from_file(path))
    }
}

/// [`Uploader`] that shells out to the configured upload command
#[derive(Debug, Clone)]
pub struct CommandUploader {
    argv: Vec<String>,
    interrupt: Interrupt,
}

impl CommandUploader {
    pub fn new(argv: Vec<String>) -> Self {
        Self {
            argv,
            interrupt: Interrupt::new(),
        }
    }

    /// Treat batches as cancelled once `interrupt` has been requested.
    pub fn with_interrupt(mut self, interrupt: Interrupt) -> Self {
        self.interrupt = interrupt;
        self
    }

    pub fn is_configured(&self) -> bool {
        !self.argv.is_empty()
    }
}

impl Uploader for CommandUploader {
    fn upload(&mut self, credentials: &CredentialHandle, paths: &[PathBuf]) -> Result<UploadOutcome> {
        let Some((program, args)) = self.argv.split_first() else {
            return Err(Error::upload(
                "no upload command configured; set one with `tidemark config set upload_command`",
            ));
        };

        if self.interrupt.is_requested() {
            tracing::info!(files = paths.len(), "interrupted; not starting another batch");
            return Ok(UploadOutcome::Cancelled);
        }

        let mut command = Command::new(program);
        command
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(path) = credentials.path() {
            command.env(CREDENTIALS_ENV, path);
        }

        tracing::debug!(program = program.as_str(), files = paths.len(), "starting upload command");
        let mut child = command
            .spawn()
            .map_err(|e| Error::upload(format!("cannot start `{program}`: {e}")))?;

        let input: String = paths.iter().map(|p| format!("{}\n", p.display())).collect();
        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| Error::upload("upload command stdin unavailable"))?;
        // Fed from a thread so a chatty child cannot deadlock on a full pipe
        let feeder = thread::spawn(move || stdin.write_all(input.as_bytes()));

        let output = child.wait_with_output()?;
        match feeder.join() {
            Ok(Ok(())) => {}
            Ok(Err(e)) if e.kind() == std::io::ErrorKind::BrokenPipe => {
                tracing::debug!("upload command closed stdin early");
            }
            Ok(Err(e)) => return Err(Error::Io(e)),
            Err(_) => return Err(Error::upload("stdin writer panicked")),
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        if !stderr.trim().is_empty() {
            tracing::debug!(stderr = stderr.trim(), "upload command stderr");
        }

        if was_interrupted(&output.status) || (!output.status.success() && self.interrupt.is_requested()) {
            tracing::info!(status = %output.status, "upload command interrupted");
            return Ok(UploadOutcome::Cancelled);
        }
        if !output.status.success() {
            let detail = stderr.trim();
            return Err(Error::upload(if detail.is_empty() {
                format!("`{program}` exited with {}", output.status)
            } else {
                format!("`{program}` exited with {}: {detail}", output.status)
            }));
        }

        parse_reply(&output.stdout)
    }
}

fn was_interrupted(status: &ExitStatus) -> bool {
    if status.code() == Some(CANCELLED_EXIT) {
        return true;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if status.signal() == Some(2) {
            return true;
        }
    }
    false
}

/// Decode the command's stdout.
pub fn parse_reply(stdout: &[u8]) -> Result<UploadOutcome> {
    let value: Value = serde_json::from_slice(stdout)
        .map_err(|e| Error::upload(format!("upload command printed invalid JSON: {e}")))?;

    if value.get("cancelled") == Some(&Value::Bool(true)) {
        return Ok(UploadOutcome::Cancelled);
    }
    let result: ClassifiedResult = serde_json::from_value(value)
        .map_err(|e| Error::upload(format!("unexpected upload command reply: {e}")))?;
    Ok(UploadOutcome::Classified(result))
}

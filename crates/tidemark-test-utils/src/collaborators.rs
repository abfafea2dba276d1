//! Scripted stand-ins for the external collaborators.

use std::collections::VecDeque;
use std::path::PathBuf;

use tidemark_core::{
    ClassifiedResult, CredentialHandle, CredentialProvider, Error, InitialSettings, Result, SetupPrompt,
    UploadOutcome, Uploader,
};

/// One scripted answer for [`ScriptedUploader`]
#[derive(Debug, Clone)]
pub enum Reply {
    /// Accept every submitted path
    AcceptAll,
    /// Report every submitted path as matched
    MatchAll,
    /// Reject every submitted path with the same reason
    RejectAll(String),
    /// Reject the listed paths, accept the rest
    Reject { paths: Vec<PathBuf>, reason: String },
    /// Return this result verbatim
    Result(ClassifiedResult),
    /// Signal cancellation
    Cancel,
    /// Fail with an upload error
    Fail(String),
}

impl Reply {
    pub fn reject(paths: impl IntoIterator<Item = impl Into<PathBuf>>, reason: &str) -> Self {
        Self::Reject {
            paths: paths.into_iter().map(Into::into).collect(),
            reason: reason.to_string(),
        }
    }
}

/// Uploader that answers from a script and records every batch.
///
/// Once the script runs out, every batch is accepted.
#[derive(Debug, Default)]
pub struct ScriptedUploader {
    replies: VecDeque<Reply>,
    batches: Vec<Vec<PathBuf>>,
    handles: Vec<CredentialHandle>,
}

impl ScriptedUploader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a reply to the script.
    pub fn then(mut self, reply: Reply) -> Self {
        self.replies.push_back(reply);
        self
    }

    pub fn push(&mut self, reply: Reply) {
        self.replies.push_back(reply);
    }

    /// Every batch received, in call order
    pub fn batches(&self) -> &[Vec<PathBuf>] {
        &self.batches
    }

    pub fn calls(&self) -> usize {
        self.batches.len()
    }

    /// Credential handles passed with each call
    pub fn handles(&self) -> &[CredentialHandle] {
        &self.handles
    }
}

impl Uploader for ScriptedUploader {
    fn upload(&mut self, credentials: &CredentialHandle, paths: &[PathBuf]) -> Result<UploadOutcome> {
        assert!(!paths.is_empty(), "uploader called with an empty batch");
        self.batches.push(paths.to_vec());
        self.handles.push(credentials.clone());

        let outcome = match self.replies.pop_front().unwrap_or(Reply::AcceptAll) {
            Reply::AcceptAll => UploadOutcome::Classified(each(paths, |r, p| r.with_accepted(p.clone(), remote_id(p)))),
            Reply::MatchAll => UploadOutcome::Classified(each(paths, |r, p| r.with_matched(p.clone(), remote_id(p)))),
            Reply::RejectAll(reason) => UploadOutcome::Classified(each(paths, |r, p| r.with_rejected(p.clone(), &reason))),
            Reply::Reject { paths: rejected, reason } => UploadOutcome::Classified(each(paths, |r, p| {
                if rejected.contains(p) {
                    r.with_rejected(p.clone(), &reason)
                } else {
                    r.with_accepted(p.clone(), remote_id(p))
                }
            })),
            Reply::Result(result) => UploadOutcome::Classified(result),
            Reply::Cancel => UploadOutcome::Cancelled,
            Reply::Fail(message) => return Err(Error::upload(message)),
        };
        Ok(outcome)
    }
}

fn each(paths: &[PathBuf], verdict: impl Fn(ClassifiedResult, &PathBuf) -> ClassifiedResult) -> ClassifiedResult {
    paths.iter().fold(ClassifiedResult::new(), verdict)
}

fn remote_id(path: &std::path::Path) -> String {
    format!("remote:{}", path.display())
}

/// Credential provider that always succeeds.
#[derive(Debug, Clone)]
pub struct StaticCredentials {
    handle: CredentialHandle,
    pub calls: usize,
}

impl Default for StaticCredentials {
    fn default() -> Self {
        Self::new(CredentialHandle::ambient())
    }
}

impl StaticCredentials {
    pub fn new(handle: CredentialHandle) -> Self {
        Self { handle, calls: 0 }
    }
}

impl CredentialProvider for StaticCredentials {
    fn ensure_credentials(&mut self) -> Result<CredentialHandle> {
        self.calls += 1;
        Ok(self.handle.clone())
    }
}

/// Credential provider that always fails.
#[derive(Debug, Clone, Default)]
pub struct FailingCredentials {
    pub calls: usize,
}

impl CredentialProvider for FailingCredentials {
    fn ensure_credentials(&mut self) -> Result<CredentialHandle> {
        self.calls += 1;
        Err(Error::credential("scripted credential failure"))
    }
}

/// Setup prompt that returns prepared answers without a terminal.
#[derive(Debug, Default)]
pub struct ScriptedSetup {
    answers: VecDeque<InitialSettings>,
    accept_offered: bool,
    /// The `current` value seen on each call
    pub seen: Vec<InitialSettings>,
}

impl ScriptedSetup {
    pub fn new(answer: InitialSettings) -> Self {
        Self {
            answers: VecDeque::from([answer]),
            ..Self::default()
        }
    }

    /// A setup that answers every prompt with the value it was offered
    pub fn accept_offered() -> Self {
        Self {
            accept_offered: true,
            ..Self::default()
        }
    }

    /// A setup that fails if it is ever asked
    pub fn never() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> usize {
        self.seen.len()
    }
}

impl SetupPrompt for ScriptedSetup {
    fn prompt_initial_settings(&mut self, current: &InitialSettings) -> Result<InitialSettings> {
        self.seen.push(current.clone());
        if self.accept_offered {
            return Ok(current.clone());
        }
        self.answers
            .pop_front()
            .ok_or_else(|| Error::SetupCancelled {
                message: "no scripted answer left".into(),
            })
    }
}

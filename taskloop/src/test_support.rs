//! Test-only helpers: scripted completion clients and workspace fixtures.

use std::cell::RefCell;
use std::collections::VecDeque;

use anyhow::{Result, anyhow};
use tempfile::TempDir;

use crate::io::completion::CompletionClient;
use crate::io::workspace::Workspace;

/// Completion client that replays canned responses in order and records
/// every prompt it was asked.
pub struct ScriptedClient {
    responses: RefCell<VecDeque<String>>,
    prompts: RefCell<Vec<String>>,
}

impl ScriptedClient {
    pub fn new<const N: usize>(responses: [&str; N]) -> Self {
        Self::from_vec(responses.iter().map(ToString::to_string).collect())
    }

    pub fn from_vec(responses: Vec<String>) -> Self {
        Self {
            responses: RefCell::new(responses.into()),
            prompts: RefCell::new(Vec::new()),
        }
    }

    /// Every prompt seen so far, in call order.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.borrow().clone()
    }

    /// Responses not yet consumed.
    pub fn remaining(&self) -> usize {
        self.responses.borrow().len()
    }
}

impl CompletionClient for ScriptedClient {
    fn complete(&self, prompt: &str) -> Result<String> {
        self.prompts.borrow_mut().push(prompt.to_string());
        self.responses
            .borrow_mut()
            .pop_front()
            .ok_or_else(|| anyhow!("scripted client ran out of responses"))
    }
}

/// Temporary directory holding a workspace root, cleaned up on drop.
pub struct TestWorkspace {
    dir: TempDir,
}

impl TestWorkspace {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().expect("tempdir"),
        }
    }

    /// A workspace rooted inside the temp directory, already created.
    pub fn workspace(&self) -> Workspace {
        let workspace = Workspace::new(self.dir.path().join("Workspace"));
        workspace.ensure_exists().expect("create workspace");
        workspace
    }
}

impl Default for TestWorkspace {
    fn default() -> Self {
        Self::new()
    }
}

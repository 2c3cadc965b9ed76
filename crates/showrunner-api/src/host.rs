//! Page host backed by a command queue that the in-page shim polls.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use serde::Serialize;

use showrunner_core::PageHost;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PageCommand {
    Play,
    Navigate { url: String },
}

#[derive(Debug, Default)]
pub struct CommandQueue {
    pending: Mutex<VecDeque<PageCommand>>,
}

impl CommandQueue {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<PageCommand>> {
        self.pending.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Queue a command. Repeated play requests collapse into one.
    pub fn push(&self, command: PageCommand) {
        let mut pending = self.lock();
        if command == PageCommand::Play && pending.back() == Some(&PageCommand::Play) {
            return;
        }
        pending.push_back(command);
    }

    pub fn drain(&self) -> Vec<PageCommand> {
        self.lock().drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

#[async_trait]
impl PageHost for CommandQueue {
    async fn navigate(&self, url: &str) {
        self.push(PageCommand::Navigate {
            url: url.to_string(),
        });
    }

    async fn request_play(&self) {
        self.push(PageCommand::Play);
    }
}

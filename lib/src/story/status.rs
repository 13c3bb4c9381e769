use serde::Serialize;

use crate::{story::Story, story_error::StoryError};

/// What the story is waiting for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StoryStatus {
    /// An error was recorded. Nothing can run until
    /// [`reset_errors`](Story::reset_errors).
    Errored,
    /// Suspended on an unbound external function, see
    /// [`pending_external_call`](Story::pending_external_call).
    AwaitingExternal,
    /// A line is half-produced by a time-limited
    /// [`continue_async`](Story::continue_async).
    Continuing,
    /// Ready to produce the next line.
    Idle,
    /// Waiting for [`choose_choice_index`](Story::choose_choice_index).
    AwaitingChoice,
    /// The story has ended.
    Done,
}

/// A line of output with the tags seen while producing it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Line {
    pub text: String,
    pub tags: Vec<String>,
}

/// # Status
impl Story {
    pub fn status(&self) -> StoryStatus {
        if self.state.has_error() {
            StoryStatus::Errored
        } else if self.pending_external.is_some() {
            StoryStatus::AwaitingExternal
        } else if self.async_continue_active {
            StoryStatus::Continuing
        } else if self.state.can_continue() {
            StoryStatus::Idle
        } else if !self.get_current_choices().is_empty() {
            StoryStatus::AwaitingChoice
        } else {
            StoryStatus::Done
        }
    }

    /// Continues and returns the next line together with its tags.
    pub fn advance(&mut self) -> Result<Line, StoryError> {
        let text = self.cont()?;

        let tags = if self.pending_external.is_some() {
            Vec::new()
        } else {
            self.get_current_tags()?
        };

        Ok(Line { text, tags })
    }
}

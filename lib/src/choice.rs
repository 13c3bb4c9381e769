//! A generated Choice from the story.
use core::fmt;

use crate::{callstack::Thread, path::Path};

/// A choice offered to the player. It carries a copy of the thread that was
/// running when it was generated, so choosing it resumes from there.
#[derive(Debug, Clone, PartialEq)]
pub struct Choice {
    /// The main text to presented to the player for this Choice.
    pub text: String,
    /// Position of the choice in the list returned by
    /// [`get_current_choices`](crate::story::Story::get_current_choices).
    pub index: usize,
    pub tags: Vec<String>,
    /// Path to the choice point that generated this choice.
    pub(crate) source_path: String,
    pub(crate) target_path: Path,
    pub(crate) is_invisible_default: bool,
    pub(crate) original_thread_index: usize,
    pub(crate) thread_at_generation: Option<Thread>,
}

impl Choice {
    pub(crate) fn new(
        target_path: Path,
        source_path: String,
        is_invisible_default: bool,
        tags: Vec<String>,
        thread_at_generation: Thread,
        text: String,
    ) -> Choice {
        Self {
            text,
            index: 0,
            tags,
            source_path,
            target_path,
            is_invisible_default,
            original_thread_index: thread_at_generation.thread_index,
            thread_at_generation: Some(thread_at_generation),
        }
    }

    pub(crate) fn new_from_json(
        path_string_on_choice: &str,
        source_path: String,
        text: &str,
        index: usize,
        original_thread_index: usize,
        tags: Vec<String>,
    ) -> Choice {
        Choice {
            text: text.to_string(),
            index,
            tags,
            source_path,
            target_path: Path::new_with_components_string(path_string_on_choice),
            is_invisible_default: false,
            original_thread_index,
            thread_at_generation: None,
        }
    }

    /// Path of the choice point this choice was generated from.
    pub fn get_source_path(&self) -> &str {
        &self.source_path
    }

    pub fn get_path_string_on_choice(&self) -> String {
        self.target_path.to_string()
    }
}

impl fmt::Display for Choice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.index + 1, self.text)
    }
}

use std::fmt;

use crate::{object::NodeId, path::Path};

/// Generates a [`Choice`](crate::choice::Choice) when reached. The flags
/// describe how the choice text is built and when the choice is offered.
#[derive(Debug, Clone, PartialEq)]
pub struct ChoicePoint {
    has_condition: bool,
    has_start_content: bool,
    has_choice_only_content: bool,
    is_invisible_default: bool,
    once_only: bool,
    path_on_choice: Path,
    // Container the choice leads to, resolved once the tree is loaded.
    pub(crate) choice_target: Option<NodeId>,
}

impl ChoicePoint {
    pub fn new(flags: i32, path_string_on_choice: &str) -> Self {
        Self {
            has_condition: (flags & 1) > 0,
            has_start_content: (flags & 2) > 0,
            has_choice_only_content: (flags & 4) > 0,
            is_invisible_default: (flags & 8) > 0,
            once_only: (flags & 16) > 0,
            path_on_choice: Path::new_with_components_string(path_string_on_choice),
            choice_target: None,
        }
    }

    pub fn get_flags(&self) -> i32 {
        let mut flags = 0;
        if self.has_condition {
            flags |= 1;
        }
        if self.has_start_content {
            flags |= 2;
        }
        if self.has_choice_only_content {
            flags |= 4;
        }
        if self.is_invisible_default {
            flags |= 8;
        }
        if self.once_only {
            flags |= 16;
        }
        flags
    }

    pub fn has_condition(&self) -> bool {
        self.has_condition
    }

    pub fn has_start_content(&self) -> bool {
        self.has_start_content
    }

    pub fn has_choice_only_content(&self) -> bool {
        self.has_choice_only_content
    }

    pub fn is_invisible_default(&self) -> bool {
        self.is_invisible_default
    }

    pub fn once_only(&self) -> bool {
        self.once_only
    }

    /// Target as written in the story file.
    pub fn get_path_on_choice(&self) -> &Path {
        &self.path_on_choice
    }

    pub fn get_choice_target(&self) -> Option<NodeId> {
        self.choice_target
    }
}

impl fmt::Display for ChoicePoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Choice: -> {}", self.path_on_choice)
    }
}

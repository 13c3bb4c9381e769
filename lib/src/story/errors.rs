use std::{cell::RefCell, rc::Rc};

use crate::{story::Story, story_error::StoryError};

/// Defines the method that will be called when an error occurs while executing
/// the story. This is also where the story's warnings are logged.
pub trait ErrorHandler {
    fn error(&mut self, message: &str, error_type: ErrorType);
}

/// Severity of a reported problem.
#[derive(Debug, PartialEq, Clone, Copy)]
pub enum ErrorType {
    /// Problem that is not critical, but should be fixed.
    Warning,
    /// Critical error that can't be recovered from.
    Error,
}

/// # Errors
/// Methods to check for errors.
impl Story {
    /// Assign the error handler for all runtime errors -- i.e. problems
    /// with the story content itself that are only discovered when playing
    /// the story.
    ///
    /// Without a handler, an error makes [`cont`](Story::cont) return an
    /// `Err` describing it, and warnings are only available through
    /// [`get_current_warnings`](Story::get_current_warnings) until the next
    /// continue. With a handler, every message is passed to it.
    ///
    /// Errors are kept either way: the story stays
    /// [`Errored`](crate::story::StoryStatus::Errored) until
    /// [`reset_errors`](Story::reset_errors) is called.
    pub fn set_error_handler(&mut self, err_handler: Rc<RefCell<dyn ErrorHandler>>) {
        self.on_error = Some(err_handler);
    }

    /// Records a fatal error at the current position and ends the flow.
    pub(crate) fn add_error(&mut self, error: StoryError) {
        self.state.add_story_error(error);
    }

    pub(crate) fn add_warning(&mut self, message: &str) {
        self.state.add_error(message, true);
    }

    /// Clears the recorded errors and warnings.
    pub fn reset_errors(&mut self) {
        self.state.reset_errors();
    }

    /// Whether an error was recorded since the last reset.
    pub fn has_error(&self) -> bool {
        self.state.has_error()
    }

    /// Any critical errors generated during evaluation of the `Story`.
    pub fn get_current_errors(&self) -> &Vec<String> {
        self.state.get_current_errors()
    }

    /// Any warnings generated during evaluation of the `Story`.
    pub fn get_current_warnings(&self) -> &Vec<String> {
        self.state.get_current_warnings()
    }
}

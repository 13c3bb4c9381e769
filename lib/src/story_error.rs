//! Errors that happen when loading or running a [`Story`](crate::story::Story).
use thiserror::Error;

/// Error raised by the runtime. Each variant is one error kind; the message
/// describes the offending token, path or operation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StoryError {
    /// Malformed story or save-state JSON.
    #[error("Error parsing JSON: {0}")]
    Decode(String),
    /// A path or name could not be resolved in the content tree.
    #[error("Address error: {0}")]
    Address(String),
    /// An operator was applied to values of incompatible types.
    #[error("Type error: {0}")]
    Type(String),
    /// The runtime was driven into an invalid state (mismatched push/pop,
    /// popping the last thread, choice index out of range...).
    #[error("Invalid story state: {0}")]
    Structural(String),
    /// A story or save-state uses an unsupported format version.
    #[error("Version error: found {found}, {message}")]
    Version { found: i32, message: String },
    /// A method was called with an inappropriate argument.
    #[error("Bad argument: {0}")]
    BadArgument(String),
}

impl StoryError {
    pub(crate) fn get_message(&self) -> String {
        match self {
            StoryError::Decode(msg)
            | StoryError::Address(msg)
            | StoryError::Type(msg)
            | StoryError::Structural(msg)
            | StoryError::BadArgument(msg) => msg.clone(),
            StoryError::Version { message, .. } => message.clone(),
        }
    }

    /// An error of the same kind carrying another message.
    pub(crate) fn with_message(&self, message: String) -> StoryError {
        match self {
            StoryError::Decode(_) => StoryError::Decode(message),
            StoryError::Address(_) => StoryError::Address(message),
            StoryError::Type(_) => StoryError::Type(message),
            StoryError::Structural(_) => StoryError::Structural(message),
            StoryError::Version { found, .. } => StoryError::Version {
                found: *found,
                message,
            },
            StoryError::BadArgument(_) => StoryError::BadArgument(message),
        }
    }

    /// Whether this error belongs to one of the kinds that halt stepping.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, StoryError::BadArgument(_))
    }
}

impl From<serde_json::Error> for StoryError {
    fn from(err: serde_json::Error) -> StoryError {
        StoryError::Decode(err.to_string())
    }
}

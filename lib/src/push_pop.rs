use crate::story_error::StoryError;

/// Kind of call-stack element: what pushed it and therefore which return
/// instruction may pop it.
#[derive(PartialEq, Clone, Copy, Eq, Hash, Debug)]
pub enum PushPopType {
    Tunnel,
    Function,
    FunctionEvaluationFromGame,
}

impl PushPopType {
    pub(crate) fn from_value(value: i64) -> Result<PushPopType, StoryError> {
        match value {
            0 => Ok(PushPopType::Tunnel),
            1 => Ok(PushPopType::Function),
            2 => Ok(PushPopType::FunctionEvaluationFromGame),
            _ => Err(StoryError::Decode(format!(
                "Unexpected PushPopType value {value}"
            ))),
        }
    }

    pub(crate) fn to_value(self) -> i64 {
        match self {
            PushPopType::Tunnel => 0,
            PushPopType::Function => 1,
            PushPopType::FunctionEvaluationFromGame => 2,
        }
    }
}

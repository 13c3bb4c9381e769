use strum::Display;

/// Instructions that act on the evaluation stack, the call stack or the
/// output stream rather than producing content.
#[derive(Debug, PartialEq, Eq, Display, Clone, Copy)]
pub enum CommandType {
    EvalStart,
    EvalOutput,
    EvalEnd,
    Duplicate,
    PopEvaluatedValue,
    PopFunction,
    PopTunnel,
    BeginString,
    EndString,
    NoOp,
    ChoiceCount,
    Turns,
    TurnsSince,
    ReadCount,
    Random,
    SeedRandom,
    VisitIndex,
    SequenceShuffleIndex,
    StartThread,
    Done,
    End,
    ListFromInt,
    ListRange,
    ListRandom,
    BeginTag,
    EndTag,
}

const COMMAND_NAMES: &[(&str, CommandType)] = &[
    ("ev", CommandType::EvalStart),
    ("out", CommandType::EvalOutput),
    ("/ev", CommandType::EvalEnd),
    ("du", CommandType::Duplicate),
    ("pop", CommandType::PopEvaluatedValue),
    ("~ret", CommandType::PopFunction),
    ("->->", CommandType::PopTunnel),
    ("str", CommandType::BeginString),
    ("/str", CommandType::EndString),
    ("nop", CommandType::NoOp),
    ("choiceCnt", CommandType::ChoiceCount),
    ("turn", CommandType::Turns),
    ("turns", CommandType::TurnsSince),
    ("readc", CommandType::ReadCount),
    ("rnd", CommandType::Random),
    ("srnd", CommandType::SeedRandom),
    ("visit", CommandType::VisitIndex),
    ("seq", CommandType::SequenceShuffleIndex),
    ("thread", CommandType::StartThread),
    ("done", CommandType::Done),
    ("end", CommandType::End),
    ("listInt", CommandType::ListFromInt),
    ("range", CommandType::ListRange),
    ("lrnd", CommandType::ListRandom),
    ("#", CommandType::BeginTag),
    ("/#", CommandType::EndTag),
];

impl CommandType {
    pub fn from_name(name: &str) -> Option<CommandType> {
        COMMAND_NAMES
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, c)| *c)
    }

    pub fn get_name(self) -> &'static str {
        COMMAND_NAMES
            .iter()
            .find(|(_, c)| *c == self)
            .map(|(n, _)| *n)
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_command_has_a_unique_name() {
        for (name, command) in COMMAND_NAMES {
            assert_eq!(Some(*command), CommandType::from_name(name));
            assert_eq!(*name, command.get_name());
        }
        assert_eq!(None, CommandType::from_name("^Hello"));
    }
}

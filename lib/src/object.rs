//! Content tree nodes and the runtime objects that flow through the output
//! and evaluation streams.
use std::fmt;

use crate::{
    choice_point::ChoicePoint, container::Container, control_command::CommandType,
    divert::Divert, native_function_call::Op, tag::Tag, value_type::ValueType,
    variable_assignment::VariableAssignment, variable_reference::VariableReference,
};

/// Handle of a node inside a [`ContentTree`](crate::container::ContentTree).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
    pub(crate) fn index(self) -> usize {
        self.0
    }
}

/// A node of the content tree. The parent handle is only a back-reference;
/// the tree arena owns every node.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub parent: Option<NodeId>,
    pub kind: NodeKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    Container(Container),
    ControlCommand(CommandType),
    Divert(Divert),
    ChoicePoint(ChoicePoint),
    Value(ValueType),
    NativeFunctionCall(Op),
    VariableReference(VariableReference),
    VariableAssignment(VariableAssignment),
    Tag(Tag),
    Glue,
    Void,
}

impl NodeKind {
    pub fn as_container(&self) -> Option<&Container> {
        match self {
            NodeKind::Container(c) => Some(c),
            _ => None,
        }
    }

    /// The node as an object that can be pushed to the output or
    /// evaluation stream, if it is one.
    pub(crate) fn to_rtobject(&self) -> Option<RTObject> {
        match self {
            NodeKind::Value(v) => Some(RTObject::Value(v.clone())),
            NodeKind::ControlCommand(c) => Some(RTObject::ControlCommand(*c)),
            NodeKind::Tag(t) => Some(RTObject::Tag(t.clone())),
            NodeKind::Glue => Some(RTObject::Glue),
            NodeKind::Void => Some(RTObject::Void),
            _ => None,
        }
    }
}

/// Object living in the output stream or on the evaluation stack.
#[derive(Debug, Clone, PartialEq)]
pub enum RTObject {
    Value(ValueType),
    ControlCommand(CommandType),
    Tag(Tag),
    Glue,
    Void,
}

impl RTObject {
    pub(crate) fn new_string(s: &str) -> Self {
        RTObject::Value(ValueType::new(s))
    }

    pub(crate) fn into_value(self) -> Option<ValueType> {
        match self {
            RTObject::Value(v) => Some(v),
            _ => None,
        }
    }

    pub(crate) fn is_command(&self, command: CommandType) -> bool {
        matches!(self, RTObject::ControlCommand(c) if *c == command)
    }
}

impl From<ValueType> for RTObject {
    fn from(value: ValueType) -> Self {
        RTObject::Value(value)
    }
}

impl fmt::Display for RTObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RTObject::Value(v) => write!(f, "{v}"),
            RTObject::ControlCommand(c) => write!(f, "{c}"),
            RTObject::Tag(t) => write!(f, "{t}"),
            RTObject::Glue => write!(f, "Glue"),
            RTObject::Void => write!(f, "Void"),
        }
    }
}
